use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::auth::StaffUser;
use crate::db::models::{DelayRecord, FleetBus, FleetStatistics};
use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::tracking::start_of_day;
use crate::AppState;

const DELAY_LIST_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BusesPayload {
    buses: Vec<FleetBus>,
    total_students: i64,
}

#[derive(Debug, Serialize)]
struct DelaysPayload {
    delays: Vec<DelayRecord>,
}

#[derive(Debug, Serialize)]
struct StatisticsPayload {
    statistics: FleetStatistics,
}

pub async fn buses(
    _staff: StaffUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let buses = state.store.all_buses().await?;
    let total_students = state.store.count_active_students().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(BusesPayload {
        buses,
        total_students,
    })))
}

pub async fn delays(
    _staff: StaffUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let since = Utc::now() - Duration::hours(state.config.tracking.delay_history_hours);
    let delays = state.store.all_delays_since(since, DELAY_LIST_LIMIT).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(DelaysPayload { delays })))
}

pub async fn statistics(
    _staff: StaffUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let statistics = state.store.fleet_statistics(start_of_day(Utc::now())).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(StatisticsPayload { statistics })))
}
