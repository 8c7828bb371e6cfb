use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::warn;

use crate::db::models::{Role, User};
use crate::error::{AppError, AuthError};
use crate::AppState;

/// Pulls the opaque token out of `Authorization: Bearer <token>`.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// The caller behind a valid, unexpired session.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

impl AuthenticatedUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.user.role == role {
            Ok(())
        } else {
            Err(AuthError::Forbidden(role.to_string()).into())
        }
    }

    /// Staff pages are open to administrators too.
    pub fn require_staff(&self) -> Result<(), AppError> {
        match self.user.role {
            Role::Staff | Role::Admin => Ok(()),
            _ => Err(AuthError::Forbidden("Staff".to_string()).into()),
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let path = req.path().to_string();

        Box::pin(async move {
            let state = state.ok_or_else(|| AppError::InternalError("application state missing".into()))?;
            let token = token.ok_or_else(|| {
                warn!("Missing bearer token on {}", path);
                AppError::from(AuthError::MissingToken)
            })?;

            let user = state.auth_service.validate_token(&token).await.map_err(|e| {
                warn!("Rejected session on {}: {}", path, e);
                e
            })?;

            Ok(AuthenticatedUser { user, token })
        })
    }
}

/// Callers with this role only; anyone else gets 403.
macro_rules! role_extractor {
    ($name:ident, $role:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub AuthenticatedUser);

        impl FromRequest for $name {
            type Error = AppError;
            type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

            fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
                let authenticated = AuthenticatedUser::from_request(req, payload);
                Box::pin(async move {
                    let caller = authenticated.await?;
                    caller.require($role)?;
                    Ok($name(caller))
                })
            }
        }
    };
}

role_extractor!(DriverUser, Role::Driver);
role_extractor!(StudentUser, Role::Student);
role_extractor!(ParentUser, Role::Parent);

#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthenticatedUser);

impl FromRequest for StaffUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let authenticated = AuthenticatedUser::from_request(req, payload);
        Box::pin(async move {
            let caller = authenticated.await?;
            caller.require_staff()?;
            Ok(StaffUser(caller))
        })
    }
}
