use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{
    AssignedBus, BusDetails, BusLocation, BusPosition, ChildSummary, DatabaseStatus,
    DelayRecord, DelaySnapshot, FleetBus, FleetStatistics, LocationUpdate, NewDelay,
    NewUser, Notification, NotificationDraft, RouteStop, TripStart, User, UserSession,
};
use crate::error::AppError;

/// Every query the handlers run. `DbOperations` backs it with MySQL; tests
/// substitute the generated `MockTrackingStore`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackingStore: Send + Sync {
    // users & sessions
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn email_exists(&self, email: &str) -> Result<bool, AppError>;
    async fn mobile_exists(&self, mobile: &str) -> Result<bool, AppError>;
    async fn create_user(&self, user: &NewUser) -> Result<i64, AppError>;
    async fn create_session(&self, session: &UserSession) -> Result<(), AppError>;
    async fn get_active_session(&self, token: &str, now: DateTime<Utc>) -> Result<Option<UserSession>, AppError>;
    async fn delete_session(&self, token: &str) -> Result<(), AppError>;
    async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    // buses
    async fn get_bus_by_number(&self, bus_number: &str) -> Result<Option<BusDetails>, AppError>;
    async fn latest_location(&self, bus_id: i64) -> Result<Option<BusLocation>, AppError>;
    async fn latest_positions(&self) -> Result<Vec<BusPosition>, AppError>;
    async fn route_stops(&self, route_id: i64) -> Result<Vec<RouteStop>, AppError>;
    async fn latest_delay_since(&self, bus_id: i64, since: DateTime<Utc>) -> Result<Option<DelaySnapshot>, AppError>;

    // assignments & trips
    async fn driver_assignment(&self, driver_id: i64) -> Result<Option<AssignedBus>, AppError>;
    async fn student_assignment(&self, student_id: i64) -> Result<Option<AssignedBus>, AppError>;
    async fn active_trip(&self, driver_id: i64, bus_id: i64) -> Result<Option<i64>, AppError>;
    /// Reuses the driver's open trip on `bus_id` if there is one.
    async fn start_trip(&self, driver_id: i64, bus_id: i64, now: DateTime<Utc>) -> Result<TripStart, AppError>;
    async fn complete_trip(&self, trip_id: i64, bus_id: i64, now: DateTime<Utc>) -> Result<(), AppError>;
    async fn insert_location(&self, bus_id: i64, update: &LocationUpdate, now: DateTime<Utc>) -> Result<(), AppError>;

    // delays & notifications
    async fn students_on_bus(&self, bus_id: i64) -> Result<Vec<i64>, AppError>;
    async fn parents_of_student(&self, student_id: i64) -> Result<Vec<i64>, AppError>;
    async fn record_delay(&self, delay: &NewDelay, notifications: &[NotificationDraft]) -> Result<i64, AppError>;
    async fn bus_delays_since(&self, bus_id: i64, since: DateTime<Utc>, limit: i64) -> Result<Vec<DelayRecord>, AppError>;
    async fn parent_delays_since(&self, parent_id: i64, since: DateTime<Utc>, limit: i64) -> Result<Vec<DelayRecord>, AppError>;
    async fn all_delays_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<DelayRecord>, AppError>;
    async fn unread_delay_notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError>;
    async fn mark_notification_read(&self, notification_id: i64, user_id: i64) -> Result<bool, AppError>;

    // dashboards
    async fn children_of_parent(&self, parent_id: i64) -> Result<Vec<ChildSummary>, AppError>;
    async fn all_buses(&self) -> Result<Vec<FleetBus>, AppError>;
    async fn count_active_students(&self) -> Result<i64, AppError>;
    async fn fleet_statistics(&self, day_start: DateTime<Utc>) -> Result<FleetStatistics, AppError>;
    async fn database_status(&self) -> DatabaseStatus;
}
