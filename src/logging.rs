//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::response::ApiResponse;

/// Bodies longer than this many bytes are truncated in `info` logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

const REDACTED_AUTHORIZATION: &str = "Bearer ********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// The caller identity in the `Authorization` header is never logged.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    log_request(
        &parts.method,
        &parts.uri,
        &redact_authorization(&parts.headers),
        &String::from_utf8_lossy(&body_bytes),
    );

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };
    log_response(parts.status, &String::from_utf8_lossy(&body_bytes));

    Response::from_parts(parts, Body::from(body_bytes))
}

async fn read_body(body: Body) -> Result<Bytes, Response> {
    axum::body::to_bytes(body, usize::MAX).await.map_err(|error| {
        tracing::error!("Could not read body: {error}");
        (
            StatusCode::BAD_REQUEST,
            ApiResponse::<()>::failure("Could not read the request body"),
        )
            .into_response()
    })
}

fn redact_authorization(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();

    if headers.contains_key(AUTHORIZATION) {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_static(REDACTED_AUTHORIZATION),
        );
    }

    headers
}

/// The longest prefix of `text` that fits in [LOG_BODY_LENGTH_LIMIT] bytes
/// without splitting a character.
fn truncate(text: &str) -> &str {
    let mut end = LOG_BODY_LENGTH_LIMIT.min(text.len());

    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

fn log_request(
    method: &axum::http::Method,
    uri: &axum::http::Uri,
    headers: &HeaderMap,
    body: &str,
) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {method} {uri} {headers:?}\nbody: {:}...",
            truncate(body)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!("Received request: {method} {uri} {headers:?}\nbody: {body:?}");
    }
}

fn log_response(status: StatusCode, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!("Sending response: {status}\nbody: {:}...", truncate(body));
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {status}\nbody: {body:?}");
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        http::{HeaderMap, HeaderValue, header::AUTHORIZATION},
        middleware,
        routing::post,
    };
    use axum_test::TestServer;

    use super::{LOG_BODY_LENGTH_LIMIT, logging_middleware, redact_authorization, truncate};

    #[test]
    fn redacts_bearer_identity() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer user_1"));

        let redacted = redact_authorization(&headers);

        assert_eq!(redacted[AUTHORIZATION], "Bearer ********");
    }

    #[test]
    fn leaves_requests_without_identity_alone() {
        let headers = HeaderMap::new();

        assert!(redact_authorization(&headers).is_empty());
    }

    #[test]
    fn truncates_on_char_boundary() {
        let text = "é".repeat(LOG_BODY_LENGTH_LIMIT);

        let truncated = truncate(&text);

        assert!(truncated.len() <= LOG_BODY_LENGTH_LIMIT);
        assert_eq!(truncated, "é".repeat(LOG_BODY_LENGTH_LIMIT / 2));
    }

    #[tokio::test]
    async fn passes_bodies_through() {
        let app = Router::new()
            .route("/echo", post(|body: String| async move { body }))
            .layer(middleware::from_fn(logging_middleware));
        let server = TestServer::try_new(app).expect("Could not create test server.");
        let body = "a".repeat(LOG_BODY_LENGTH_LIMIT * 2);

        let response = server.post("/echo").text(body.clone()).await;

        response.assert_status_ok();
        response.assert_text(body);
    }
}
