use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, Transaction};
use std::sync::Arc;
use std::time::Duration;

use crate::db::models::{
    bus_status, trip_status, AssignedBus, BusDetails, BusLocation, BusPosition, ChildSummary,
    DatabaseStatus, DelayRecord, DelaySnapshot, FleetBus, FleetStatistics, LocationUpdate,
    NewDelay, NewUser, Notification, NotificationDraft, RouteStop, TripStart, User, UserSession,
    DELAY_NOTIFICATION,
};
use crate::db::store::TrackingStore;
use crate::error::AppError;

const USER_COLUMNS: &str = "id, name, email, mobile, password, role, is_active";

const DELAY_RECORD_COLUMNS: &str = r#"
    d.id, d.delay_reason, d.delay_minutes, d.severity, d.reported_at,
    u.name AS driver_name, b.bus_number
"#;

pub struct DbOperations {
    pool: Arc<MySqlPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<MySqlPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &MySqlPool {
        self.pool.as_ref()
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(self.pool()).await?;
        Ok(())
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, MySql>, AppError> {
        Ok(self.pool.as_ref().begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn record_delay_with_transaction(
        &self,
        delay: &NewDelay,
        notifications: &[NotificationDraft],
        transaction: &mut Transaction<'_, MySql>,
    ) -> Result<i64, AppError> {
        let delay_id = sqlx::query(
            r#"
            INSERT INTO delays (trip_id, bus_id, driver_id, delay_reason, delay_minutes, severity, reported_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(delay.trip_id)
        .bind(delay.bus_id)
        .bind(delay.driver_id)
        .bind(&delay.delay_reason)
        .bind(delay.delay_minutes)
        .bind(&delay.severity)
        .bind(delay.reported_at)
        .execute(&mut **transaction)
        .await?
        .last_insert_id() as i64;

        for draft in notifications {
            sqlx::query(
                r#"
                INSERT INTO notifications (user_id, delay_id, notification_type, title, message, is_read, created_at)
                VALUES (?, ?, ?, ?, ?, FALSE, ?)
                "#,
            )
            .bind(draft.user_id)
            .bind(delay_id)
            .bind(DELAY_NOTIFICATION)
            .bind(&draft.title)
            .bind(&draft.message)
            .bind(delay.reported_at)
            .execute(&mut **transaction)
            .await?;
        }

        Ok(delay_id)
    }

    async fn count(&self, sql: &str) -> Result<i64, AppError> {
        let (total,): (i64,) = sqlx::query_as(sql).fetch_one(self.pool()).await?;
        Ok(total)
    }
}

#[async_trait]
impl TrackingStore for DbOperations {
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ? LIMIT 1")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.is_some())
    }

    async fn mobile_exists(&self, mobile: &str) -> Result<bool, AppError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE mobile = ? LIMIT 1")
            .bind(mobile)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.is_some())
    }

    async fn create_user(&self, user: &NewUser) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, mobile, password, role, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, TRUE, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.mobile)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_id() as i64)
    }

    async fn create_session(&self, session: &UserSession) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (user_id, session_token, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(session.user_id)
        .bind(&session.session_token)
        .bind(session.expires_at)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn get_active_session(&self, token: &str, now: DateTime<Utc>) -> Result<Option<UserSession>, AppError> {
        let session = sqlx::query_as::<_, UserSession>(
            "SELECT user_id, session_token, expires_at FROM sessions WHERE session_token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;

        Ok(session)
    }

    async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE session_token = ?")
            .bind(token)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(now)
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn get_bus_by_number(&self, bus_number: &str) -> Result<Option<BusDetails>, AppError> {
        let bus = sqlx::query_as::<_, BusDetails>(
            r#"
            SELECT
                b.id, b.bus_number, b.status, b.capacity, b.current_passengers,
                r.id AS route_id, r.route_name, r.route_description,
                u.id AS driver_id, u.name AS driver_name
            FROM buses b
            LEFT JOIN routes r ON b.route_id = r.id
            LEFT JOIN driver_bus_assignments dba ON b.id = dba.bus_id AND dba.is_active = TRUE
            LEFT JOIN users u ON dba.driver_id = u.id
            WHERE b.bus_number = ?
            LIMIT 1
            "#,
        )
        .bind(bus_number)
        .fetch_optional(self.pool())
        .await?;

        Ok(bus)
    }

    async fn latest_location(&self, bus_id: i64) -> Result<Option<BusLocation>, AppError> {
        let location = sqlx::query_as::<_, BusLocation>(
            r#"
            SELECT latitude, longitude, speed, heading, timestamp
            FROM bus_locations
            WHERE bus_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(bus_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(location)
    }

    async fn latest_positions(&self) -> Result<Vec<BusPosition>, AppError> {
        let positions = sqlx::query_as::<_, BusPosition>(
            r#"
            SELECT b.id AS bus_id, b.bus_number, b.status,
                   bl.latitude, bl.longitude, bl.speed, bl.heading, bl.timestamp
            FROM buses b
            INNER JOIN bus_locations bl ON bl.id = (
                SELECT l.id FROM bus_locations l
                WHERE l.bus_id = b.id
                ORDER BY l.timestamp DESC, l.id DESC
                LIMIT 1
            )
            ORDER BY b.bus_number
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(positions)
    }

    async fn route_stops(&self, route_id: i64) -> Result<Vec<RouteStop>, AppError> {
        let stops = sqlx::query_as::<_, RouteStop>(
            r#"
            SELECT stop_name, stop_order, latitude, longitude
            FROM route_stops
            WHERE route_id = ?
            ORDER BY stop_order
            "#,
        )
        .bind(route_id)
        .fetch_all(self.pool())
        .await?;

        Ok(stops)
    }

    async fn latest_delay_since(&self, bus_id: i64, since: DateTime<Utc>) -> Result<Option<DelaySnapshot>, AppError> {
        let delay = sqlx::query_as::<_, DelaySnapshot>(
            r#"
            SELECT delay_reason, delay_minutes, severity, reported_at
            FROM delays
            WHERE bus_id = ? AND reported_at >= ?
            ORDER BY reported_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(bus_id)
        .bind(since)
        .fetch_optional(self.pool())
        .await?;

        Ok(delay)
    }

    async fn driver_assignment(&self, driver_id: i64) -> Result<Option<AssignedBus>, AppError> {
        let bus = sqlx::query_as::<_, AssignedBus>(
            r#"
            SELECT
                b.id AS bus_id, b.bus_number, b.status,
                r.id AS route_id, r.route_name, r.route_description,
                u.id AS driver_id, u.name AS driver_name
            FROM driver_bus_assignments dba
            INNER JOIN buses b ON dba.bus_id = b.id
            INNER JOIN users u ON dba.driver_id = u.id
            LEFT JOIN routes r ON b.route_id = r.id
            WHERE dba.driver_id = ? AND dba.is_active = TRUE
            ORDER BY dba.assigned_at DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(bus)
    }

    async fn student_assignment(&self, student_id: i64) -> Result<Option<AssignedBus>, AppError> {
        let bus = sqlx::query_as::<_, AssignedBus>(
            r#"
            SELECT
                b.id AS bus_id, b.bus_number, b.status,
                r.id AS route_id, r.route_name, r.route_description,
                d.id AS driver_id, d.name AS driver_name
            FROM student_bus_assignments sba
            INNER JOIN buses b ON sba.bus_id = b.id
            LEFT JOIN routes r ON b.route_id = r.id
            LEFT JOIN driver_bus_assignments dba ON b.id = dba.bus_id AND dba.is_active = TRUE
            LEFT JOIN users d ON dba.driver_id = d.id
            WHERE sba.student_id = ? AND sba.is_active = TRUE
            ORDER BY sba.assigned_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(bus)
    }

    async fn active_trip(&self, driver_id: i64, bus_id: i64) -> Result<Option<i64>, AppError> {
        let trip: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM trips
            WHERE driver_id = ? AND bus_id = ? AND status = ?
            ORDER BY start_time DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .bind(bus_id)
        .bind(trip_status::ON_ROUTE)
        .fetch_optional(self.pool())
        .await?;

        Ok(trip.map(|(id,)| id))
    }

    async fn start_trip(&self, driver_id: i64, bus_id: i64, now: DateTime<Utc>) -> Result<TripStart, AppError> {
        let mut transaction = self.begin_transaction().await?;

        // Row lock on the bus serialises concurrent starts for it.
        sqlx::query("SELECT id FROM buses WHERE id = ? FOR UPDATE")
            .bind(bus_id)
            .fetch_one(&mut *transaction)
            .await?;

        let open: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM trips
            WHERE driver_id = ? AND bus_id = ? AND status = ?
            ORDER BY start_time DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .bind(bus_id)
        .bind(trip_status::ON_ROUTE)
        .fetch_optional(&mut *transaction)
        .await?;

        if let Some((trip_id,)) = open {
            transaction.commit().await?;
            return Ok(TripStart::AlreadyOnRoute(trip_id));
        }

        let trip_id = sqlx::query(
            r#"
            INSERT INTO trips (bus_id, driver_id, start_time, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(bus_id)
        .bind(driver_id)
        .bind(now)
        .bind(trip_status::ON_ROUTE)
        .bind(now)
        .execute(&mut *transaction)
        .await?
        .last_insert_id() as i64;

        sqlx::query("UPDATE buses SET status = ? WHERE id = ?")
            .bind(bus_status::ON_ROUTE)
            .bind(bus_id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;
        Ok(TripStart::Started(trip_id))
    }

    async fn complete_trip(&self, trip_id: i64, bus_id: i64, now: DateTime<Utc>) -> Result<(), AppError> {
        let mut transaction = self.begin_transaction().await?;

        sqlx::query("UPDATE trips SET status = ?, end_time = ? WHERE id = ?")
            .bind(trip_status::COMPLETED)
            .bind(now)
            .bind(trip_id)
            .execute(&mut *transaction)
            .await?;

        sqlx::query("UPDATE buses SET status = ? WHERE id = ?")
            .bind(bus_status::STOPPED)
            .bind(bus_id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;
        Ok(())
    }

    async fn insert_location(&self, bus_id: i64, update: &LocationUpdate, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO bus_locations (bus_id, latitude, longitude, accuracy, speed, heading, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(bus_id)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(update.accuracy)
        .bind(update.speed)
        .bind(update.heading)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn students_on_bus(&self, bus_id: i64) -> Result<Vec<i64>, AppError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT student_id FROM student_bus_assignments WHERE bus_id = ? AND is_active = TRUE",
        )
        .bind(bus_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn parents_of_student(&self, student_id: i64) -> Result<Vec<i64>, AppError> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT parent_id FROM parent_student_relations WHERE student_id = ?")
            .bind(student_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn record_delay(&self, delay: &NewDelay, notifications: &[NotificationDraft]) -> Result<i64, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = self
            .record_delay_with_transaction(delay, notifications, &mut transaction)
            .await;

        match result {
            Ok(delay_id) => {
                transaction.commit().await?;
                Ok(delay_id)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn bus_delays_since(&self, bus_id: i64, since: DateTime<Utc>, limit: i64) -> Result<Vec<DelayRecord>, AppError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM delays d
            INNER JOIN buses b ON d.bus_id = b.id
            LEFT JOIN users u ON d.driver_id = u.id
            WHERE d.bus_id = ? AND d.reported_at >= ?
            ORDER BY d.reported_at DESC, d.id DESC
            LIMIT ?
            "#,
            DELAY_RECORD_COLUMNS
        );
        let delays = sqlx::query_as::<_, DelayRecord>(&sql)
            .bind(bus_id)
            .bind(since)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(delays)
    }

    async fn parent_delays_since(&self, parent_id: i64, since: DateTime<Utc>, limit: i64) -> Result<Vec<DelayRecord>, AppError> {
        let sql = format!(
            r#"
            SELECT {}, s.name AS student_name
            FROM delays d
            INNER JOIN buses b ON d.bus_id = b.id
            LEFT JOIN users u ON d.driver_id = u.id
            INNER JOIN student_bus_assignments sba ON b.id = sba.bus_id AND sba.is_active = TRUE
            INNER JOIN users s ON sba.student_id = s.id
            INNER JOIN parent_student_relations psr ON s.id = psr.student_id
            WHERE psr.parent_id = ? AND d.reported_at >= ?
            ORDER BY d.reported_at DESC, d.id DESC
            LIMIT ?
            "#,
            DELAY_RECORD_COLUMNS
        );
        let delays = sqlx::query_as::<_, DelayRecord>(&sql)
            .bind(parent_id)
            .bind(since)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(delays)
    }

    async fn all_delays_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<DelayRecord>, AppError> {
        let sql = format!(
            r#"
            SELECT {}, r.route_name
            FROM delays d
            INNER JOIN buses b ON d.bus_id = b.id
            LEFT JOIN users u ON d.driver_id = u.id
            LEFT JOIN routes r ON b.route_id = r.id
            WHERE d.reported_at >= ?
            ORDER BY d.reported_at DESC, d.id DESC
            LIMIT ?
            "#,
            DELAY_RECORD_COLUMNS
        );
        let delays = sqlx::query_as::<_, DelayRecord>(&sql)
            .bind(since)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(delays)
    }

    async fn unread_delay_notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, title, message, notification_type, created_at, is_read
            FROM notifications
            WHERE user_id = ? AND notification_type = ? AND is_read = FALSE
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(DELAY_NOTIFICATION)
        .fetch_all(self.pool())
        .await?;

        Ok(notifications)
    }

    async fn mark_notification_read(&self, notification_id: i64, user_id: i64) -> Result<bool, AppError> {
        // Match on existence rather than rows_affected: re-marking a read row changes nothing.
        let owned: Option<(i64,)> = sqlx::query_as("SELECT id FROM notifications WHERE id = ? AND user_id = ?")
            .bind(notification_id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;

        if owned.is_none() {
            return Ok(false);
        }

        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = ? AND user_id = ?")
            .bind(notification_id)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(true)
    }

    async fn children_of_parent(&self, parent_id: i64) -> Result<Vec<ChildSummary>, AppError> {
        let children = sqlx::query_as::<_, ChildSummary>(
            r#"
            SELECT
                psr.student_id,
                u.name AS student_name,
                u.email AS student_email,
                u.mobile AS student_mobile,
                COALESCE(b.bus_number, '') AS bus_number,
                COALESCE(r.route_name, '') AS route_name,
                COALESCE(d.name, '') AS driver_name,
                COALESCE(b.status, 'Not Assigned') AS bus_status
            FROM parent_student_relations psr
            INNER JOIN users u ON psr.student_id = u.id
            LEFT JOIN student_bus_assignments sba ON u.id = sba.student_id AND sba.is_active = TRUE
            LEFT JOIN buses b ON sba.bus_id = b.id
            LEFT JOIN routes r ON b.route_id = r.id
            LEFT JOIN driver_bus_assignments dba ON b.id = dba.bus_id AND dba.is_active = TRUE
            LEFT JOIN users d ON dba.driver_id = d.id
            WHERE psr.parent_id = ?
            ORDER BY u.name
            "#,
        )
        .bind(parent_id)
        .fetch_all(self.pool())
        .await?;

        Ok(children)
    }

    async fn all_buses(&self) -> Result<Vec<FleetBus>, AppError> {
        let buses = sqlx::query_as::<_, FleetBus>(
            r#"
            SELECT
                b.id, b.bus_number, b.capacity, b.current_passengers, b.status, b.type,
                r.route_name,
                u.name AS driver_name,
                u.id AS driver_id
            FROM buses b
            LEFT JOIN routes r ON b.route_id = r.id
            LEFT JOIN driver_bus_assignments dba ON b.id = dba.bus_id AND dba.is_active = TRUE
            LEFT JOIN users u ON dba.driver_id = u.id
            ORDER BY b.bus_number
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(buses)
    }

    async fn count_active_students(&self) -> Result<i64, AppError> {
        self.count("SELECT COUNT(*) FROM student_bus_assignments WHERE is_active = TRUE").await
    }

    async fn fleet_statistics(&self, day_start: DateTime<Utc>) -> Result<FleetStatistics, AppError> {
        let total_buses = self.count("SELECT COUNT(*) FROM buses").await?;
        let active_buses = self.count("SELECT COUNT(*) FROM buses WHERE status = 'On Route'").await?;
        let total_students = self.count_active_students().await?;

        let (on_time,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT b.id)
            FROM buses b
            LEFT JOIN delays d ON b.id = d.bus_id AND d.reported_at >= ?
            WHERE b.status = ? AND d.id IS NULL
            "#,
        )
        .bind(day_start)
        .bind(bus_status::ON_ROUTE)
        .fetch_one(self.pool())
        .await?;

        Ok(FleetStatistics {
            total_buses,
            active_buses,
            total_students,
            on_time,
        })
    }

    async fn database_status(&self) -> DatabaseStatus {
        match self.count("SELECT COUNT(*) FROM users").await {
            Ok(count) => DatabaseStatus {
                connected: true,
                user_count: Some(count),
            },
            Err(e) => {
                tracing::warn!("Database health check failed: {}", e);
                DatabaseStatus {
                    connected: false,
                    user_count: None,
                }
            }
        }
    }
}
