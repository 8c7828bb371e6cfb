#[cfg(test)]
#[macro_use]
mod test_support;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod tracking;

use actix_web::{web, HttpResponse};
use chrono::Duration;
use std::sync::Arc;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, RateLimitConfig, RateLimiter};
pub use db::{DbOperations, TrackingStore, User, UserSession};

/// Health check endpoint handler
/// Reports server status plus whether the database answers a trivial query.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = state.store.database_status().await;
    let connected = database.connected;

    let body = serde_json::json!({
        "status": if connected { "healthy" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "database": database,
    });

    if connected {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn TrackingStore>,
    pub auth_service: Arc<AuthService>,
    pub login_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Settings, store: Arc<dyn TrackingStore>) -> Self {
        let auth_service = AuthService::new(store.clone(), config.auth.session_ttl_hours);
        let login_limiter = RateLimiter::new(RateLimitConfig {
            window_size: Duration::minutes(1),
            max_requests: config.auth.login_attempts_per_minute,
        });

        Self {
            config: Arc::new(config),
            store,
            auth_service: Arc::new(auth_service),
            login_limiter: Arc::new(login_limiter),
        }
    }
}
