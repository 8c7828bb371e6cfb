use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::auth::DriverUser;
use crate::db::models::{AssignedBus, LocationUpdate, RouteStop, TripStart};
use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::tracking::{self, route_label, DelayReport, DelaySeverity};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverBusView {
    pub bus_number: String,
    pub status: String,
    pub route: String,
    pub route_id: Option<i64>,
    pub route_name: Option<String>,
    pub route_description: Option<String>,
    pub stops: Vec<RouteStop>,
    pub driver_name: String,
}

#[derive(Debug, Serialize)]
struct BusPayload {
    bus: Option<DriverBusView>,
}

#[derive(Debug, Serialize)]
struct TripPayload {
    trip_id: i64,
}

#[derive(Debug, Serialize)]
struct DelayPayload {
    delay_id: i64,
    severity: DelaySeverity,
    notified: usize,
}

async fn assigned_bus(state: &AppState, driver_id: i64) -> Result<AssignedBus, AppError> {
    state
        .store
        .driver_assignment(driver_id)
        .await?
        .ok_or_else(|| AppError::validation("No bus assigned to driver"))
}

pub async fn bus_assignment(
    DriverUser(driver): DriverUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(bus) = state.store.driver_assignment(driver.id()).await? else {
        return Ok(HttpResponse::Ok().json(ApiResponse::with_message(
            "No bus assigned",
            BusPayload { bus: None },
        )));
    };

    let stops = match bus.route_id {
        Some(route_id) => state.store.route_stops(route_id).await?,
        None => Vec::new(),
    };

    let view = DriverBusView {
        route: route_label(bus.route_name.as_deref(), bus.route_description.as_deref()),
        bus_number: bus.bus_number,
        status: bus.status,
        route_id: bus.route_id,
        route_name: bus.route_name,
        route_description: bus.route_description,
        stops,
        driver_name: driver.user.name.clone(),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::ok(BusPayload { bus: Some(view) })))
}

pub async fn start_trip(
    DriverUser(driver): DriverUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let bus = assigned_bus(&state, driver.id()).await?;

    // A reloaded dashboard may press start again; hand back the open trip.
    let (message, trip_id) = match state.store.start_trip(driver.id(), bus.bus_id, Utc::now()).await? {
        TripStart::Started(trip_id) => {
            info!("Driver {} started trip {} on bus {}", driver.id(), trip_id, bus.bus_number);
            ("Trip started successfully", trip_id)
        }
        TripStart::AlreadyOnRoute(trip_id) => {
            info!("Driver {} resumed trip {} on bus {}", driver.id(), trip_id, bus.bus_number);
            ("Trip already in progress", trip_id)
        }
    };

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        message,
        TripPayload { trip_id },
    )))
}

pub async fn end_trip(
    DriverUser(driver): DriverUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let bus = assigned_bus(&state, driver.id()).await?;

    let trip_id = state
        .store
        .active_trip(driver.id(), bus.bus_id)
        .await?
        .ok_or_else(|| AppError::validation("No active trip"))?;

    state.store.complete_trip(trip_id, bus.bus_id, Utc::now()).await?;
    info!("Driver {} completed trip {} on bus {}", driver.id(), trip_id, bus.bus_number);

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Trip ended successfully",
        TripPayload { trip_id },
    )))
}

pub async fn update_location(
    DriverUser(driver): DriverUser,
    update: web::Json<LocationUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    tracking::validate_location(&update)?;
    let bus = assigned_bus(&state, driver.id()).await?;

    state.store.insert_location(bus.bus_id, &update, Utc::now()).await?;
    tracing::debug!("Location for bus {} updated by driver {}", bus.bus_number, driver.id());

    Ok(HttpResponse::Ok().json(ApiResponse::message("Location updated successfully")))
}

pub async fn report_delay(
    DriverUser(driver): DriverUser,
    report: web::Json<DelayReport>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let bus = assigned_bus(&state, driver.id()).await?;

    let reported = tracking::report_delay(
        state.store.as_ref(),
        driver.id(),
        bus.bus_id,
        &report,
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Delay reported successfully",
        DelayPayload {
            delay_id: reported.delay_id,
            severity: reported.severity,
            notified: reported.notified,
        },
    )))
}
