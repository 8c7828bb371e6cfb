use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::auth::ParentUser;
use crate::db::models::{ChildSummary, DelayRecord, Notification};
use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::AppState;

const DELAY_LIST_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
struct ChildrenPayload {
    children: Vec<ChildSummary>,
}

#[derive(Debug, Serialize)]
struct DelaysPayload {
    delays: Vec<DelayRecord>,
    notifications: Vec<Notification>,
}

pub async fn children(
    ParentUser(parent): ParentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let children = state.store.children_of_parent(parent.id()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(ChildrenPayload { children })))
}

/// Delays on any bus one of the parent's children rides, tagged with the child.
pub async fn delays(
    ParentUser(parent): ParentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let since = Utc::now() - Duration::hours(state.config.tracking.delay_history_hours);

    let delays = state
        .store
        .parent_delays_since(parent.id(), since, DELAY_LIST_LIMIT)
        .await?;
    let notifications = state.store.unread_delay_notifications(parent.id()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(DelaysPayload {
        delays,
        notifications,
    })))
}
