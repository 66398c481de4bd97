use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::{TestRequest, TestResponse, TestServer};
use serde_json::Value;

use crate::{
    AppState, build_router,
    config::Config,
    database_id::UserId,
    ledger::Ledger,
    pool::ConnectionPool,
    resilience::{ConnectionMonitor, RetryPolicy},
};

/// The identity of the user created by [get_test_server].
pub(crate) const TEST_IDENTITY: &str = "user_1";

pub(crate) struct TestApp {
    pub server: TestServer,
    pub ledger: Ledger,
    pub owner: UserId,
}

/// A server for the full router backed by an in-memory database with one
/// user registered as [TEST_IDENTITY].
pub(crate) async fn get_test_server() -> TestApp {
    let ledger = Ledger::new(
        ConnectionPool::open_in_memory().expect("Could not open in-memory pool"),
        ConnectionMonitor::new(RetryPolicy::default()),
    );
    let owner = ledger
        .create_user(TEST_IDENTITY, "Alice")
        .await
        .expect("Could not create test user")
        .id;
    let state = AppState::new(ledger.clone(), &Config::default());
    let server = TestServer::try_new(build_router(state)).expect("Could not create test server.");

    TestApp {
        server,
        ledger,
        owner,
    }
}

pub(crate) fn authorized(request: TestRequest, identity: &str) -> TestRequest {
    let value = HeaderValue::from_str(&format!("Bearer {identity}"))
        .expect("Could not create authorization header");

    request.add_header(AUTHORIZATION, value)
}

/// Assert that the response is a successful envelope and return its data.
#[track_caller]
pub(crate) fn assert_success(response: &TestResponse) -> Value {
    response.assert_status_success();
    let body = response.json::<Value>();

    assert_eq!(body["success"], Value::Bool(true), "body: {body}");
    body["data"].clone()
}

/// Assert that the response is a failed envelope with `status` and return its error.
#[track_caller]
pub(crate) fn assert_failure(response: &TestResponse, status: StatusCode) -> String {
    response.assert_status(status);
    let body = response.json::<Value>();

    assert_eq!(body["success"], Value::Bool(false), "body: {body}");
    body["error"]
        .as_str()
        .expect("Failed response has no error message")
        .to_owned()
}
