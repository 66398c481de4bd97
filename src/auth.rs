//! Identifies the caller of protected routes.
//!
//! The hosted identity provider issues each user an opaque identity which the
//! client sends as `Authorization: Bearer <identity>`. The identity is mapped
//! to a local user before the request reaches a handler.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{database_id::UserId, ledger::Ledger};

/// The user that made a request.
///
/// **Note**: Route handlers behind [auth_guard] can use the function argument
/// `Extension(Owner(owner)): Extension<Owner>` to receive the user ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub UserId);

/// Middleware function that resolves the bearer identity of a request.
///
/// The [Owner] is placed into the request extensions and the request executed
/// normally if the identity belongs to a known user, otherwise an error
/// response is returned and the handler is never called.
pub async fn auth_guard(State(ledger): State<Ledger>, mut request: Request, next: Next) -> Response {
    let identity = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|header| header.token().to_owned());

    let owner = match ledger.resolve_owner(identity).await {
        Ok(owner) => owner,
        Err(error) => {
            tracing::debug!("Rejecting request to {}: {error}", request.uri());
            return error.into_response();
        }
    };

    request.extensions_mut().insert(Owner(owner));
    next.run(request).await
}

#[cfg(test)]
mod auth_guard_tests {
    use axum::{Extension, Router, http::StatusCode, middleware, routing::get};
    use axum_test::TestServer;

    use crate::{
        ApiResponse,
        ledger::Ledger,
        pool::ConnectionPool,
        resilience::{ConnectionMonitor, RetryPolicy},
        test_utils::authorized,
    };

    use super::{Owner, auth_guard};

    async fn test_handler(Extension(Owner(owner)): Extension<Owner>) -> String {
        owner.to_string()
    }

    async fn get_test_server() -> (TestServer, i64) {
        let ledger = Ledger::new(
            ConnectionPool::open_in_memory().unwrap(),
            ConnectionMonitor::new(RetryPolicy::default()),
        );
        let owner = ledger.create_user("user_1", "Alice").await.unwrap().id;

        let app = Router::new()
            .route("/protected", get(test_handler))
            .layer(middleware::from_fn_with_state(ledger.clone(), auth_guard))
            .with_state(ledger);

        (
            TestServer::try_new(app).expect("Could not create test server."),
            owner,
        )
    }

    #[tokio::test]
    async fn known_identity_reaches_handler() {
        let (server, owner) = get_test_server().await;

        let response = authorized(server.get("/protected"), "user_1").await;

        response.assert_status_ok();
        response.assert_text(owner.to_string());
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let (server, _) = get_test_server().await;

        let response = server.get("/protected").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body = response.json::<ApiResponse<()>>();
        assert!(!body.success);
        assert!(body.error.is_some());
    }

    #[tokio::test]
    async fn unknown_identity_is_unauthorized() {
        let (server, _) = get_test_server().await;

        let response = authorized(server.get("/protected"), "user_2").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
