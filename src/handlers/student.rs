use actix_web::{web, HttpResponse};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::auth::StudentUser;
use crate::db::models::{DelayRecord, Notification, RouteStop};
use crate::error::AppError;
use crate::handlers::{ApiResponse, DelayView, LocationView};
use crate::tracking::{estimate_arrival, route_label};
use crate::AppState;

const DELAY_LIST_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBusView {
    pub bus_number: String,
    pub status: String,
    pub route: String,
    pub route_name: Option<String>,
    pub route_description: Option<String>,
    pub assigned_driver: String,
    pub driver_id: Option<i64>,
    pub stops: Vec<RouteStop>,
    pub location: Option<LocationView>,
    pub eta: Option<DateTime<Utc>>,
    pub delay: Option<DelayView>,
}

#[derive(Debug, Serialize)]
struct BusPayload {
    bus: Option<StudentBusView>,
}

#[derive(Debug, Serialize)]
struct DelaysPayload {
    delays: Vec<DelayRecord>,
    notifications: Vec<Notification>,
}

pub async fn bus_assignment(
    StudentUser(student): StudentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(bus) = state.store.student_assignment(student.id()).await? else {
        return Ok(HttpResponse::Ok().json(ApiResponse::with_message(
            "No bus assigned",
            BusPayload { bus: None },
        )));
    };

    let now = Utc::now();
    let tracking = &state.config.tracking;

    let stops = match bus.route_id {
        Some(route_id) => state.store.route_stops(route_id).await?,
        None => Vec::new(),
    };
    let location = state.store.latest_location(bus.bus_id).await?;
    let delay = state
        .store
        .latest_delay_since(bus.bus_id, now - Duration::hours(tracking.recent_delay_hours))
        .await?;
    let eta = estimate_arrival(&bus.status, location.is_some(), now, tracking.eta_minutes);

    let view = StudentBusView {
        route: route_label(bus.route_name.as_deref(), bus.route_description.as_deref()),
        bus_number: bus.bus_number,
        status: bus.status,
        route_name: bus.route_name,
        route_description: bus.route_description,
        assigned_driver: bus.driver_name.unwrap_or_else(|| "Not Assigned".to_string()),
        driver_id: bus.driver_id,
        stops,
        location: location.map(LocationView::from),
        eta,
        delay: delay.map(DelayView::from),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::ok(BusPayload { bus: Some(view) })))
}

pub async fn delays(
    StudentUser(student): StudentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let since = Utc::now() - Duration::hours(state.config.tracking.delay_history_hours);

    let delays = match state.store.student_assignment(student.id()).await? {
        Some(bus) => {
            state
                .store
                .bus_delays_since(bus.bus_id, since, DELAY_LIST_LIMIT)
                .await?
        }
        None => Vec::new(),
    };
    let notifications = state.store.unread_delay_notifications(student.id()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(DelaysPayload {
        delays,
        notifications,
    })))
}

#[cfg(test)]
mod tests {
    use crate::db::models::{BusLocation, DelayRecord, Notification, Role};
    use crate::db::MockTrackingStore;
    use crate::test_support::{assigned_bus, bearer, sign_in, user_with_role};
    use actix_web::test::TestRequest;
    use chrono::{Duration, Utc};

    fn student_store() -> MockTrackingStore {
        let mut store = MockTrackingStore::new();
        sign_in(&mut store, user_with_role(21, Role::Student));
        store
    }

    fn fix() -> BusLocation {
        BusLocation {
            latitude: 12.97,
            longitude: 77.59,
            speed: None,
            heading: None,
            timestamp: Utc::now(),
        }
    }

    #[actix_web::test]
    async fn moving_bus_gets_an_eta() {
        let mut store = student_store();
        store
            .expect_student_assignment()
            .returning(|student_id| {
                assert_eq!(student_id, 21);
                Ok(Some(assigned_bus(12, "On Route")))
            });
        store.expect_route_stops().returning(|_| Ok(vec![]));
        store.expect_latest_location().returning(|_| Ok(Some(fix())));
        store.expect_latest_delay_since().returning(|_, _| Ok(None));
        let app = test_app!(store);

        let before = Utc::now();
        let (status, body) = call_json!(app, bearer(TestRequest::get().uri("/api/student/bus-assignment"), "tok"));
        assert_eq!(status, 200);
        assert_eq!(body["bus"]["busNumber"], "KA-12");
        assert_eq!(body["bus"]["assignedDriver"], "Ravi Kumar");
        assert_eq!(body["bus"]["driverId"], 5);
        assert_eq!(body["bus"]["location"]["speed"], 0.0);

        let eta: chrono::DateTime<Utc> = serde_json::from_value(body["bus"]["eta"].clone()).unwrap();
        assert!(eta >= before + Duration::minutes(30));
        assert!(eta <= Utc::now() + Duration::minutes(30));
    }

    #[actix_web::test]
    async fn parked_bus_has_no_eta() {
        let mut store = student_store();
        store
            .expect_student_assignment()
            .returning(|_| Ok(Some(assigned_bus(12, "Stopped"))));
        store.expect_route_stops().returning(|_| Ok(vec![]));
        store.expect_latest_location().returning(|_| Ok(Some(fix())));
        store.expect_latest_delay_since().returning(|_, _| Ok(None));
        let app = test_app!(store);

        let (status, body) = call_json!(app, bearer(TestRequest::get().uri("/api/student/bus-assignment"), "tok"));
        assert_eq!(status, 200);
        assert!(body["bus"]["eta"].is_null());
    }

    #[actix_web::test]
    async fn unassigned_student_sees_null_bus() {
        let mut store = student_store();
        store.expect_student_assignment().returning(|_| Ok(None));
        let app = test_app!(store);

        let (status, body) = call_json!(app, bearer(TestRequest::get().uri("/api/student/bus-assignment"), "tok"));
        assert_eq!(status, 200);
        assert!(body["bus"].is_null());
        assert_eq!(body["message"], "No bus assigned");
    }

    #[actix_web::test]
    async fn delays_list_bus_history_and_unread_alerts() {
        let mut store = student_store();
        store
            .expect_student_assignment()
            .returning(|_| Ok(Some(assigned_bus(12, "On Route"))));
        store
            .expect_bus_delays_since()
            .returning(|bus_id, since, limit| {
                assert_eq!(bus_id, 12);
                assert_eq!(limit, 10);
                assert!(since < Utc::now() - Duration::hours(23));
                Ok(vec![DelayRecord {
                    id: 3,
                    delay_reason: "Traffic".into(),
                    delay_minutes: 12,
                    severity: "Medium".into(),
                    reported_at: Utc::now(),
                    driver_name: Some("Ravi Kumar".into()),
                    bus_number: "KA-12".into(),
                    route_name: None,
                    student_name: None,
                }])
            });
        store.expect_unread_delay_notifications().returning(|user_id| {
            assert_eq!(user_id, 21);
            Ok(vec![Notification {
                id: 40,
                title: "Bus Delay Alert".into(),
                message: "Your bus is delayed. Reason: Traffic (Approx. 12 minutes)".into(),
                notification_type: "delay".into(),
                created_at: Utc::now(),
                is_read: false,
            }])
        });
        let app = test_app!(store);

        let (status, body) = call_json!(app, bearer(TestRequest::get().uri("/api/student/delays"), "tok"));
        assert_eq!(status, 200);
        assert_eq!(body["delays"][0]["delay_minutes"], 12);
        assert!(body["delays"][0].get("student_name").is_none());
        assert_eq!(body["notifications"][0]["id"], 40);
    }

    #[actix_web::test]
    async fn delays_without_assignment_still_return_notifications() {
        let mut store = student_store();
        store.expect_student_assignment().returning(|_| Ok(None));
        store.expect_bus_delays_since().never();
        store.expect_unread_delay_notifications().returning(|_| Ok(vec![]));
        let app = test_app!(store);

        let (status, body) = call_json!(app, bearer(TestRequest::get().uri("/api/student/delays"), "tok"));
        assert_eq!(status, 200);
        assert_eq!(body["delays"], serde_json::json!([]));
        assert_eq!(body["notifications"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn parent_cannot_read_student_delays() {
        let mut store = MockTrackingStore::new();
        sign_in(&mut store, user_with_role(30, Role::Parent));
        let app = test_app!(store);

        let (status, body) = call_json!(app, bearer(TestRequest::get().uri("/api/student/delays"), "tok"));
        assert_eq!(status, 403);
        assert_eq!(body["message"], "Access denied. Student role required.");
    }
}
