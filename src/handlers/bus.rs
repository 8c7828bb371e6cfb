use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{BusPosition, RouteStop};
use crate::error::AppError;
use crate::handlers::{ApiResponse, DelayView, LocationView};
use crate::tracking::route_label;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub bus_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BusSearchView {
    pub id: i64,
    pub bus_number: String,
    pub status: String,
    pub capacity: i32,
    pub current_passengers: i32,
    pub route: String,
    pub route_name: Option<String>,
    pub route_description: Option<String>,
    pub driver_name: String,
    pub driver_id: Option<i64>,
    pub location: Option<LocationView>,
    pub stops: Vec<RouteStop>,
    pub delay: Option<DelayView>,
}

#[derive(Debug, Serialize)]
struct BusPayload<T: Serialize> {
    bus: T,
}

#[derive(Debug, Serialize)]
struct LocationPayload {
    bus_number: String,
    status: String,
    location: Option<LocationView>,
}

#[derive(Debug, Serialize)]
struct FleetPayload {
    buses: Vec<BusPosition>,
}

/// Public lookup used by the Track Bus page; no session needed.
pub async fn search(
    query: web::Query<SearchQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let bus_number = query
        .bus_number
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::validation("Bus number is required"))?;

    let Some(bus) = state.store.get_bus_by_number(bus_number).await? else {
        return Ok(HttpResponse::Ok().json(ApiResponse::failure("Bus not found")));
    };

    let location = state.store.latest_location(bus.id).await?;
    let stops = match bus.route_id {
        Some(route_id) => state.store.route_stops(route_id).await?,
        None => Vec::new(),
    };
    let since = Utc::now() - Duration::hours(state.config.tracking.recent_delay_hours);
    let delay = state.store.latest_delay_since(bus.id, since).await?;

    let view = BusSearchView {
        id: bus.id,
        route: route_label(bus.route_name.as_deref(), bus.route_description.as_deref()),
        bus_number: bus.bus_number,
        status: bus.status,
        capacity: bus.capacity,
        current_passengers: bus.current_passengers,
        route_name: bus.route_name,
        route_description: bus.route_description,
        driver_name: bus.driver_name.unwrap_or_else(|| "Not Assigned".to_string()),
        driver_id: bus.driver_id,
        location: location.map(LocationView::from),
        stops,
        delay: delay.map(DelayView::from),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::ok(BusPayload { bus: view })))
}

pub async fn location(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let bus_number = path.into_inner();
    let bus = state
        .store
        .get_bus_by_number(bus_number.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Bus not found".to_string()))?;

    let location = state.store.latest_location(bus.id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(LocationPayload {
        bus_number: bus.bus_number,
        status: bus.status,
        location: location.map(LocationView::from),
    })))
}

pub async fn fleet_locations(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let buses = state.store.latest_positions().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(FleetPayload { buses })))
}
