use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::extractor::AuthenticatedUser;
use crate::auth::validation::SignupRequest;
use crate::db::UserProfile;
use crate::error::{AppError, AuthError};
use crate::handlers::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: UserProfile,
}

/// Limiter key for a login attempt: the peer IP, or the forwarded client
/// address when `auth.trust_forwarded_for` is set.
fn client_key(req: &HttpRequest, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return addr.to_string();
        }
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 5xx only; validation and credential failures are rejections.
fn is_server_fault(err: &AppError) -> bool {
    err.status_code().is_server_error()
}

fn log_failure(action: &str, email: &str, err: &AppError) {
    if is_server_fault(err) {
        error!("{} failed for email: {}: {}", action, email, err);
    } else {
        warn!("{} rejected for email: {}: {}", action, email, err);
    }
}

pub async fn login(
    http: HttpRequest,
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let client = client_key(&http, state.config.auth.trust_forwarded_for);
    if !state.login_limiter.check_rate_limit(&client).await {
        warn!("Login rate limit hit for {}", client);
        return Err(AuthError::RateLimited.into());
    }

    info!("Received login request for email: {}", req.email);
    match state.auth_service.authenticate(&req.email, &req.password).await {
        Ok((token, user)) => {
            info!("Login successful for email: {} ({})", user.email, user.role);
            Ok(HttpResponse::Ok().json(ApiResponse::with_message(
                "Login successful",
                AuthResponse { token, user },
            )))
        }
        Err(e) => {
            log_failure("Login", &req.email, &e);
            Err(e)
        }
    }
}

pub async fn signup(
    req: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received signup request for email: {:?}", req.email);

    match state.auth_service.register(&req).await {
        Ok(user) => {
            info!("Signup successful for email: {}", user.email);
            Ok(HttpResponse::Created().json(ApiResponse::with_message(
                "User registered successfully",
                SignupResponse { user },
            )))
        }
        Err(e) => {
            log_failure("Signup", req.email.as_deref().unwrap_or(""), &e);
            Err(e)
        }
    }
}

pub async fn logout(
    caller: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.invalidate_token(&caller.token).await?;
    info!("User {} logged out", caller.id());

    Ok(HttpResponse::Ok().json(ApiResponse::message("Successfully logged out")))
}
