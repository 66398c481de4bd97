//! Settings for running the server.

use std::time::Duration;

use crate::{
    Error,
    pagination::PaginationConfig,
    resilience::RetryPolicy,
    timezone::{DEFAULT_TIMEZONE, get_local_offset},
};

/// The resolved settings of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The port to serve the API from.
    pub port: u16,
    /// The number of database connections to keep open.
    pub pool_size: usize,
    /// How many times a store operation is attempted before giving up.
    pub max_retries: u32,
    /// The delay before the first retry, doubled for each retry after it.
    pub retry_base_delay: Duration,
    /// How long a request waits for the store before answering with a timeout.
    pub operation_timeout: Duration,
    /// How often the server checks that the database is reachable.
    pub health_check_interval: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub timezone: String,
    /// The page sizes and defaults for paged queries.
    pub pagination: PaginationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            pool_size: 4,
            max_retries: RetryPolicy::DEFAULT_MAX_RETRIES,
            retry_base_delay: RetryPolicy::DEFAULT_BASE_DELAY,
            operation_timeout: Duration::from_secs(15),
            health_check_interval: Duration::from_secs(30),
            timezone: DEFAULT_TIMEZONE.to_owned(),
            pagination: PaginationConfig::default(),
        }
    }
}

impl Config {
    /// The retry policy for store operations.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay)
    }

    /// Check that the settings can be used to run the server.
    ///
    /// # Errors
    /// Returns [Error::ValidationFailed] if the pool is empty or the timezone is unknown.
    pub fn validate(&self) -> Result<(), Error> {
        if self.pool_size == 0 {
            return Err(Error::ValidationFailed(
                "the connection pool needs at least one connection".to_owned(),
            ));
        }

        if get_local_offset(&self.timezone).is_none() {
            return Err(Error::ValidationFailed(format!(
                "unknown timezone \"{}\"",
                self.timezone
            )));
        }

        Ok(())
    }
}
