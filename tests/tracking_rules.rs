use bustrack_server::auth::validation::{normalize_mobile, validate_signup, SignupRequest};
use bustrack_server::db::models::{LocationUpdate, Role};
use bustrack_server::tracking::{
    delays::delay_message, estimate_arrival, route_label, start_of_day, validate_location, DelaySeverity,
};
use chrono::{Duration, TimeZone, Utc};

#[test]
fn test_severity_thresholds() {
    let cases = [
        (0, DelaySeverity::None),
        (4, DelaySeverity::None),
        (5, DelaySeverity::Medium),
        (14, DelaySeverity::Medium),
        (15, DelaySeverity::High),
        (29, DelaySeverity::High),
        (30, DelaySeverity::Critical),
        (120, DelaySeverity::Critical),
    ];
    for (minutes, expected) in cases {
        assert_eq!(DelaySeverity::from_minutes(minutes), expected, "{} minutes", minutes);
    }
}

#[test]
fn test_dashboard_labels() {
    assert_eq!(route_label(Some("South Loop"), Some("Hostel to Library")), "South Loop: Hostel to Library");
    assert_eq!(route_label(None, None), "No Route");
    assert_eq!(
        delay_message("Heavy rain", 25),
        "Your bus is delayed. Reason: Heavy rain (Approx. 25 minutes)"
    );
}

#[test]
fn test_eta_and_day_boundary() {
    let now = Utc.with_ymd_and_hms(2025, 6, 2, 16, 45, 12).unwrap();
    assert_eq!(estimate_arrival("On Route", true, now, 30), Some(now + Duration::minutes(30)));
    assert_eq!(estimate_arrival("On Route", false, now, 30), None);
    assert_eq!(estimate_arrival("Not Started", true, now, 30), None);
    assert_eq!(start_of_day(now), Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());
}

#[test]
fn test_location_bounds() {
    let at = |latitude: f64, longitude: f64| LocationUpdate {
        latitude: Some(latitude),
        longitude: Some(longitude),
        ..Default::default()
    };

    assert!(validate_location(&at(0.0, 0.0)).is_ok());
    assert!(validate_location(&at(-90.0, 180.0)).is_ok());
    assert!(validate_location(&at(90.5, 10.0)).is_err());
    assert!(validate_location(&at(10.0, -181.0)).is_err());
    assert!(validate_location(&LocationUpdate::default()).is_err());
}

#[test]
fn test_signup_rules() {
    let request = SignupRequest {
        name: Some("Ravi Kumar".into()),
        email: Some("RAVI@College.edu".into()),
        mobile: Some("+91 98450-12345".into()),
        role: Some("Driver".into()),
        password: Some("secret".into()),
    };
    // country code makes it twelve digits
    assert!(validate_signup(&request).is_err());

    let request = SignupRequest {
        mobile: Some("98450-12345".into()),
        ..request
    };
    let valid = validate_signup(&request).unwrap();
    assert_eq!(valid.role, Role::Driver);
    assert_eq!(valid.email, "ravi@college.edu");
    assert_eq!(normalize_mobile("(984) 501 2345").as_deref(), Some("9845012345"));
}
