//! Shared fixtures for handler tests: an app wired to a `MockTrackingStore`.

use actix_web::{test::TestRequest, web};
use std::sync::Arc;

use crate::db::models::{AssignedBus, Role, User, UserSession};
use crate::db::MockTrackingStore;
use crate::{AppState, Settings};

/// Builds the full route table over `store` and initialises it as a test service.
macro_rules! test_app {
    ($store:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($crate::test_support::test_state($store))
                .configure($crate::handlers::configure),
        )
        .await
    };
}

/// Sends a request and returns `(status, json_body)`.
macro_rules! call_json {
    ($app:expr, $req:expr $(,)?) => {{
        let resp = actix_web::test::call_service(&$app, $req.to_request()).await;
        let status = resp.status().as_u16();
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        (status, body)
    }};
}

pub fn test_state(store: MockTrackingStore) -> web::Data<AppState> {
    let config = Settings::new_for_test().expect("Failed to load test config");
    web::Data::new(AppState::new(config, Arc::new(store)))
}

pub fn bearer(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {}", token)))
}

pub fn user_with_role(id: i64, role: Role) -> User {
    User {
        id,
        name: format!("{} {}", role, id),
        email: format!("user{}@college.edu", id),
        mobile: format!("90000000{:02}", id % 100),
        password: String::new(),
        role,
        is_active: true,
    }
}

/// Any bearer token resolves to `user`.
pub fn sign_in(store: &mut MockTrackingStore, user: User) {
    let user_id = user.id;
    store
        .expect_get_active_session()
        .returning(move |token: &str, _| Ok(Some(UserSession::new(user_id, token.to_string(), 1))));
    store
        .expect_get_user_by_id()
        .returning(move |_| Ok(Some(user.clone())));
}

pub fn assigned_bus(bus_id: i64, status: &str) -> AssignedBus {
    AssignedBus {
        bus_id,
        bus_number: format!("KA-{:02}", bus_id),
        status: status.to_string(),
        route_id: Some(4),
        route_name: Some("North Loop".into()),
        route_description: Some("Campus to Station".into()),
        driver_id: Some(5),
        driver_name: Some("Ravi Kumar".into()),
    }
}
