//! Pennywise is a web service for managing personal bank accounts and the
//! transactions recorded against them.
//!
//! The library keeps every account balance equal to the net effect of the
//! transactions that reference it. All mutations that touch both tables are
//! performed as a single SQLite transaction, store calls are retried with
//! exponential backoff on transient failures, and transaction history is
//! served as filtered, server-side windowed pages.
//!
//! The HTTP API returns JSON in a uniform envelope, see [ApiResponse].

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use rusqlite::ErrorCode;
use tokio::signal;

mod account;
mod aggregation;
mod app_state;
mod auth;
mod config;
mod database_id;
mod db;
pub mod endpoints;
mod ledger;
mod logging;
mod money;
mod pagination;
mod pool;
mod reconcile;
mod resilience;
mod response;
mod routing;
mod timezone;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use account::{Account, AccountKind, AccountWithTransactions, NewAccount, create_account};
pub use aggregation::{ChartData, DailyTotals, DateRangePreset, PeriodTotals, aggregate_daily};
pub use app_state::AppState;
pub use config::Config;
pub use database_id::{AccountId, DatabaseId, TransactionId, UserId};
pub use db::initialize as initialize_db;
pub use ledger::{Ledger, LedgerEvent};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::{PageInfo, PaginationConfig, PaginationIndicator};
pub use pool::{ConnectionPool, PooledConnection};
pub use reconcile::CachedAccountView;
pub use resilience::{ConnectionMonitor, ConnectionStatus, ListenerId, RetryPolicy};
pub use response::ApiResponse;
pub use routing::build_router;
pub use transaction::{
    BulkDeleteOutcome, CategoryFixReport, CategorySuggestion, CreatedTestData,
    CreatedTransaction, DeletedTransaction, NewTransaction, PageRequest, RecurringInterval,
    Transaction, TransactionFilter, TransactionKind, TransactionPage,
    generate_test_transactions, insert_test_transactions,
};
pub use user::{User, create_user};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request did not carry a caller identity, or the identity does not
    /// belong to a known user.
    #[error("the caller could not be identified")]
    Unauthorized,

    /// The requested resource was not found.
    ///
    /// Resources owned by another user are reported the same way so that
    /// callers cannot probe for the existence of other users' data.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The input was malformed, e.g. a non-positive amount or an empty name.
    #[error("invalid input: {0}")]
    ValidationFailed(String),

    /// The store could not be reached or was too busy to serve the request.
    ///
    /// This is the only error that is retried.
    #[error("the database is temporarily unavailable: {0}")]
    Unavailable(String),

    /// Every retry of a store operation failed with a transient error.
    #[error("database operation failed after {attempts} attempts: {message}")]
    StoreUnavailable {
        /// How many times the operation was attempted.
        attempts: u32,
        /// The message of the last failure.
        message: String,
    },

    /// The write conflicts with the current state of the resource.
    ///
    /// Reserved for optimistic concurrency checks.
    #[error("the request conflicts with the current state: {0}")]
    Conflict(String),

    /// The client stopped waiting for the operation.
    ///
    /// The store may still complete the work, callers should re-read rather
    /// than assume the operation failed.
    #[error("the operation did not complete within {0:?}")]
    TimedOut(Duration),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// A background task running a store operation failed.
    #[error("an internal error occurred: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error is caused by a transient connectivity problem and
    /// the operation may succeed if attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unavailable(_) | Error::StoreUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::SqlError(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            rusqlite::Error::SqliteFailure(sql_error, _)
                if matches!(
                    sql_error.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
                ) =>
            {
                Error::Unavailable(sql_error.to_string())
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::ValidationFailed(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::ValidationFailed(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::ValidationFailed(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Error::SqlError(_) | Error::Internal(_) => {
                tracing::error!("An unexpected error occurred: {}", self);
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
            error => error.to_string(),
        };

        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}
