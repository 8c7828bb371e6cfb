use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::validation::{validate_signup, SignupRequest};
use crate::db::models::{NewUser, User, UserProfile, UserSession};
use crate::db::TrackingStore;
use crate::error::{AppError, AuthError};

const TOKEN_BYTES: usize = 32;

pub struct AuthService {
    store: Arc<dyn TrackingStore>,
    session_ttl_hours: i64,
}

impl AuthService {
    pub fn new(store: Arc<dyn TrackingStore>, session_ttl_hours: i64) -> Self {
        Self {
            store,
            session_ttl_hours,
        }
    }

    /// SHA-256 hex digest of whatever credential the client submitted.
    pub fn hash_password(password: &str) -> String {
        format!("{:x}", Sha256::digest(password.as_bytes()))
    }

    /// 32 random bytes as 64 lowercase hex characters.
    pub fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub async fn register(&self, req: &SignupRequest) -> Result<UserProfile, AppError> {
        let valid = validate_signup(req)?;

        if self.store.email_exists(&valid.email).await? {
            return Err(AppError::validation("Email already registered"));
        }
        if self.store.mobile_exists(&valid.mobile).await? {
            return Err(AppError::validation("Mobile number already registered"));
        }

        let new_user = NewUser {
            name: valid.name,
            email: valid.email,
            mobile: valid.mobile,
            password_hash: Self::hash_password(&valid.password),
            role: valid.role,
        };
        let id = self.store.create_user(&new_user).await?;
        info!("Registered user {} ({}) as {}", id, new_user.email, new_user.role);

        Ok(UserProfile {
            id,
            name: new_user.name,
            email: new_user.email,
            mobile: new_user.mobile,
            role: new_user.role,
        })
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(String, UserProfile), AppError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::validation("Email and password are required"));
        }

        let user = self
            .store
            .get_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled.into());
        }
        if user.password != Self::hash_password(password) {
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = Self::generate_token();
        let session = UserSession::new(user.id, token.clone(), self.session_ttl_hours);
        self.store.create_session(&session).await?;

        Ok((token, UserProfile::from(&user)))
    }

    /// Expiry is filtered by the store against the `now` passed in here.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let session = self
            .store
            .get_active_session(token, Utc::now())
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let user = self
            .store
            .get_user_by_id(session.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !user.is_active {
            warn!("Session used by deactivated user {}", user.id);
            return Err(AuthError::AccountDisabled.into());
        }

        Ok(user)
    }

    pub async fn invalidate_token(&self, token: &str) -> Result<(), AppError> {
        self.store.delete_session(token).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        self.store.cleanup_expired_sessions(Utc::now()).await
    }
}
