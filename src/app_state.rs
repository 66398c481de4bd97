//! Implements a struct that holds the state of the REST server.

use std::time::Duration;

use axum::extract::FromRef;

use crate::{config::Config, ledger::Ledger, pagination::PaginationConfig};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The store operations.
    pub ledger: Ledger,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The config that controls how to page transactions.
    pub pagination_config: PaginationConfig,

    /// How long a handler waits for the store before answering with a timeout.
    pub operation_timeout: Duration,
}

impl AppState {
    /// Create a new [AppState] from a ledger and the server settings.
    ///
    /// The ledger is switched to the pagination settings in `config`.
    pub fn new(ledger: Ledger, config: &Config) -> Self {
        Self {
            ledger: ledger.with_pagination(config.pagination.clone()),
            local_timezone: config.timezone.clone(),
            pagination_config: config.pagination.clone(),
            operation_timeout: config.operation_timeout,
        }
    }
}

impl FromRef<AppState> for Ledger {
    fn from_ref(state: &AppState) -> Self {
        state.ledger.clone()
    }
}
