//! HTTP handlers, one per endpoint, grouped by the dashboard that polls them.

pub mod bus;
pub mod driver;
pub mod notifications;
pub mod parent;
pub mod staff;
pub mod student;

use actix_web::{web, HttpRequest, HttpResponse, Resource, Route};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::auth::handlers as auth;
use crate::db::models::{BusLocation, DelaySnapshot};
use crate::error::AppError;

/// The `{success, message?, ...payload}` envelope every endpoint answers with.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct Empty {}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

impl ApiResponse<Empty> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_message(message, Empty {})
    }

    /// A handled miss that is not an HTTP error, e.g. an unknown bus number.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: Empty {},
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationView {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl From<BusLocation> for LocationView {
    fn from(location: BusLocation) -> Self {
        Self {
            lat: location.latitude,
            lng: location.longitude,
            timestamp: location.timestamp,
            speed: location.speed.unwrap_or(0.0),
            heading: location.heading,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayView {
    pub reason: String,
    pub minutes: i32,
    pub severity: String,
    pub reported_at: DateTime<Utc>,
}

impl From<DelaySnapshot> for DelayView {
    fn from(delay: DelaySnapshot) -> Self {
        Self {
            reason: delay.delay_reason,
            minutes: delay.delay_minutes,
            severity: delay.severity,
            reported_at: delay.reported_at,
        }
    }
}

async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}

fn endpoint(path: &str, route: Route) -> Resource {
    web::resource(path)
        .route(route)
        .default_service(web::route().to(method_not_allowed))
}

fn json_error(err: actix_web::error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    warn!("Rejected JSON body on {}: {}", req.path(), err);
    AppError::validation("Invalid JSON input").into()
}

fn path_error(err: actix_web::error::PathError, req: &HttpRequest) -> actix_web::Error {
    warn!("Rejected path {}: {}", req.path(), err);
    AppError::validation("Invalid path parameter").into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .service(endpoint("/health", web::get().to(crate::health_check)))
        .service(
            web::scope("/api")
                .service(endpoint("/signup", web::post().to(auth::signup)))
                .service(endpoint("/login", web::post().to(auth::login)))
                .service(endpoint("/logout", web::post().to(auth::logout)))
                .service(endpoint("/bus/search", web::get().to(bus::search)))
                .service(endpoint("/bus/{bus_number}/location", web::get().to(bus::location)))
                .service(endpoint("/buses/locations", web::get().to(bus::fleet_locations)))
                .service(endpoint("/driver/bus-assignment", web::get().to(driver::bus_assignment)))
                .service(endpoint("/driver/start-trip", web::post().to(driver::start_trip)))
                .service(endpoint("/driver/end-trip", web::post().to(driver::end_trip)))
                .service(endpoint("/driver/update-location", web::post().to(driver::update_location)))
                .service(endpoint("/driver/report-delay", web::post().to(driver::report_delay)))
                .service(endpoint("/student/bus-assignment", web::get().to(student::bus_assignment)))
                .service(endpoint("/student/delays", web::get().to(student::delays)))
                .service(endpoint("/parent/children", web::get().to(parent::children)))
                .service(endpoint("/parent/delays", web::get().to(parent::delays)))
                .service(endpoint("/staff/buses", web::get().to(staff::buses)))
                .service(endpoint("/staff/delays", web::get().to(staff::delays)))
                .service(endpoint("/staff/statistics", web::get().to(staff::statistics)))
                .service(endpoint("/notifications/{id}/read", web::post().to(notifications::mark_read))),
        );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_flattens_payload() {
        #[derive(Serialize)]
        struct Payload {
            trip_id: i64,
        }

        let json = serde_json::to_value(ApiResponse::with_message("Trip started successfully", Payload { trip_id: 9 })).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "message": "Trip started successfully", "trip_id": 9})
        );

        let json = serde_json::to_value(ApiResponse::failure("Bus not found")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "message": "Bus not found"}));

        let json = serde_json::to_value(ApiResponse::ok(Payload { trip_id: 1 })).unwrap();
        assert!(json.get("message").is_none());
    }

    #[test]
    fn location_view_defaults_missing_speed() {
        let view = LocationView::from(BusLocation {
            latitude: 12.97,
            longitude: 77.59,
            speed: None,
            heading: Some(90.0),
            timestamp: Utc::now(),
        });
        assert_eq!(view.speed, 0.0);
        assert_eq!(view.heading, Some(90.0));
    }
}
