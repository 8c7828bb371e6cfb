//! Tracking rules shared by the handlers: delay severity and fan-out,
//! route labels, arrival estimates and location checks.

pub mod delays;
mod severity;

use chrono::{DateTime, Duration, Utc};

use crate::db::models::{bus_status, LocationUpdate};
use crate::error::AppError;

pub use delays::{report_delay, DelayReport, ReportedDelay};
pub use severity::DelaySeverity;

pub fn route_label(name: Option<&str>, description: Option<&str>) -> String {
    match (name.filter(|n| !n.is_empty()), description.filter(|d| !d.is_empty())) {
        (Some(name), Some(description)) => format!("{}: {}", name, description),
        (Some(name), None) => name.to_string(),
        (None, _) => "No Route".to_string(),
    }
}

/// Flat estimate: only buses currently on a trip and reporting a position get one.
pub fn estimate_arrival(
    status: &str,
    has_location: bool,
    now: DateTime<Utc>,
    eta_minutes: i64,
) -> Option<DateTime<Utc>> {
    if has_location && status == bus_status::ON_ROUTE {
        Some(now + Duration::minutes(eta_minutes))
    } else {
        None
    }
}

pub fn validate_location(update: &LocationUpdate) -> Result<(), AppError> {
    let (latitude, longitude) = match (update.latitude, update.longitude) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => return Err(AppError::validation("Latitude and longitude are required")),
    };

    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(AppError::validation("Latitude must be between -90 and 90"));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::validation("Longitude must be between -180 and 180"));
    }
    if matches!(update.speed, Some(speed) if speed < 0.0) {
        return Err(AppError::validation("Speed cannot be negative"));
    }
    Ok(())
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn route_label_variants() {
        assert_eq!(route_label(Some("North Loop"), Some("Campus to Station")), "North Loop: Campus to Station");
        assert_eq!(route_label(Some("North Loop"), None), "North Loop");
        assert_eq!(route_label(Some("North Loop"), Some("")), "North Loop");
        assert_eq!(route_label(None, Some("orphan description")), "No Route");
    }

    #[test]
    fn eta_only_for_moving_buses_with_a_fix() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 7, 30, 0).unwrap();
        assert_eq!(
            estimate_arrival("On Route", true, now, 30),
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 8, 0, 0).unwrap())
        );
        assert_eq!(estimate_arrival("On Route", false, now, 30), None);
        assert_eq!(estimate_arrival("Stopped", true, now, 30), None);
    }

    #[test]
    fn location_requires_coordinates_in_range() {
        let ok = LocationUpdate {
            latitude: Some(0.0),
            longitude: Some(77.59),
            ..Default::default()
        };
        assert!(validate_location(&ok).is_ok());

        let missing = LocationUpdate {
            latitude: Some(12.97),
            ..Default::default()
        };
        assert_eq!(
            validate_location(&missing).unwrap_err().to_string(),
            "Latitude and longitude are required"
        );

        let out_of_range = LocationUpdate {
            latitude: Some(91.0),
            longitude: Some(10.0),
            ..Default::default()
        };
        assert!(validate_location(&out_of_range).is_err());

        let negative_speed = LocationUpdate {
            latitude: Some(12.0),
            longitude: Some(77.0),
            speed: Some(-1.0),
            ..Default::default()
        };
        assert!(validate_location(&negative_speed).is_err());
    }

    #[test]
    fn start_of_day_truncates_to_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 17, 45, 12).unwrap();
        assert_eq!(start_of_day(now), Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap());
    }
}
