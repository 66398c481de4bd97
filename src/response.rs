//! The JSON envelope shared by every API response.

use std::{future::Future, time::Duration};

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The body of every API response.
///
/// Successful responses serialize as `{"success": true, "data": ...}` and
/// failed responses as `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The result of a successful operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Why the operation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Wrap the result of a successful operation.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Describe a failed operation.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Wait at most `duration` for `operation`.
///
/// The operation is spawned onto the runtime, so it runs to completion even
/// when the caller stops waiting. A store write that outlives the timeout
/// still commits, which is why callers must re-read after [Error::TimedOut].
pub async fn with_timeout<F, T>(duration: Duration, operation: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(operation);

    match tokio::time::timeout(duration, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            tracing::error!("Store operation task failed: {join_error}");
            Err(Error::Internal(join_error.to_string()))
        }
        Err(_) => {
            tracing::warn!("Store operation did not complete within {duration:?}");
            Err(Error::TimedOut(duration))
        }
    }
}
