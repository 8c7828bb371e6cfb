use actix_web::{web, HttpResponse};
use tracing::debug;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::AppState;

/// Only the recipient can mark a notification; anyone else sees a 404.
pub async fn mark_read(
    path: web::Path<i64>,
    caller: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let notification_id = path.into_inner();

    if !state
        .store
        .mark_notification_read(notification_id, caller.id())
        .await?
    {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    debug!("User {} read notification {}", caller.id(), notification_id);
    Ok(HttpResponse::Ok().json(ApiResponse::message("Notification marked as read")))
}
