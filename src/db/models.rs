use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Account role; decides which dashboard endpoints a session may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Parent,
    Driver,
    Staff,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Student, Role::Parent, Role::Driver, Role::Staff, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Parent => "Parent",
            Role::Driver => "Driver",
            Role::Staff => "Staff",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

pub mod bus_status {
    pub const NOT_STARTED: &str = "Not Started";
    pub const ON_ROUTE: &str = "On Route";
    pub const STOPPED: &str = "Stopped";
}

pub mod trip_status {
    pub const ON_ROUTE: &str = "On Route";
    pub const COMPLETED: &str = "Completed";
}

pub const DELAY_NOTIFICATION: &str = "delay";

/// Outcome of a start-trip request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripStart {
    Started(i64),
    /// The driver already had an `On Route` trip on this bus; nothing was written.
    AlreadyOnRoute(i64),
}

impl TripStart {
    pub fn trip_id(&self) -> i64 {
        match *self {
            TripStart::Started(id) | TripStart::AlreadyOnRoute(id) => id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
}

/// The user shape returned by login and signup; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub role: Role,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            mobile: user.mobile.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserSession {
    pub user_id: i64,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: i64, session_token: String, expires_in_hours: i64) -> Self {
        Self {
            user_id,
            session_token,
            expires_at: Utc::now() + chrono::Duration::hours(expires_in_hours),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// A bus with its route and currently assigned driver, as looked up by number.
#[derive(Debug, Clone, FromRow)]
pub struct BusDetails {
    pub id: i64,
    pub bus_number: String,
    pub status: String,
    pub capacity: i32,
    pub current_passengers: i32,
    pub route_id: Option<i64>,
    pub route_name: Option<String>,
    pub route_description: Option<String>,
    pub driver_id: Option<i64>,
    pub driver_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct RouteStop {
    pub stop_name: String,
    pub stop_order: i32,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct BusLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Latest fix of one bus, used by the fleet map.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BusPosition {
    pub bus_id: i64,
    pub bus_number: String,
    pub status: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LocationUpdate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DelaySnapshot {
    pub delay_reason: String,
    pub delay_minutes: i32,
    pub severity: String,
    pub reported_at: DateTime<Utc>,
}

/// One row of a delay history list. The student and route columns are only
/// selected by the parent and staff views respectively.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DelayRecord {
    pub id: i64,
    pub delay_reason: String,
    pub delay_minutes: i32,
    pub severity: String,
    pub reported_at: DateTime<Utc>,
    pub driver_name: Option<String>,
    pub bus_number: String,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_name: Option<String>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
}

/// The active driver or student assignment of a bus.
#[derive(Debug, Clone, FromRow)]
pub struct AssignedBus {
    pub bus_id: i64,
    pub bus_number: String,
    pub status: String,
    pub route_id: Option<i64>,
    pub route_name: Option<String>,
    pub route_description: Option<String>,
    pub driver_id: Option<i64>,
    pub driver_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDelay {
    pub trip_id: Option<i64>,
    pub bus_id: i64,
    pub driver_id: i64,
    pub delay_reason: String,
    pub delay_minutes: i32,
    pub severity: String,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub user_id: i64,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ChildSummary {
    pub student_id: i64,
    pub student_name: String,
    pub student_email: String,
    pub student_mobile: String,
    pub bus_number: String,
    pub route_name: String,
    pub driver_name: String,
    pub bus_status: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FleetBus {
    pub id: i64,
    pub bus_number: String,
    pub capacity: i32,
    pub current_passengers: i32,
    pub status: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub bus_type: Option<String>,
    pub route_name: Option<String>,
    pub driver_name: Option<String>,
    pub driver_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStatistics {
    pub total_buses: i64,
    pub active_buses: i64,
    pub total_students: i64,
    pub on_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_only_known_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("student".parse::<Role>().is_err());
        assert!("Teacher".parse::<Role>().is_err());
        assert_eq!(Role::try_from("Driver".to_string()).unwrap(), Role::Driver);
    }

    #[test]
    fn profile_omits_password() {
        let user = User {
            id: 7,
            name: "Asha Rao".into(),
            email: "asha@example.edu".into(),
            mobile: "9876543210".into(),
            password: "deadbeef".into(),
            role: Role::Student,
            is_active: true,
        };
        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();
        assert_eq!(json["role"], "Student");
        assert!(json.get("password").is_none());
    }

    #[test]
    fn session_expiry() {
        let fresh = UserSession::new(1, "abc".into(), 24);
        assert!(!fresh.is_expired());

        let stale = UserSession::new(1, "abc".into(), -1);
        assert!(stale.is_expired());
    }
}
