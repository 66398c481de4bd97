//! A fixed-size pool of SQLite connections shared by all requests.
//!
//! Connections are checked out for the duration of a single store operation
//! and returned when the [PooledConnection] guard is dropped, even if the
//! operation returns an error or panics.

use std::{
    ops::{Deref, DerefMut},
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rusqlite::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::{
    Error,
    db::{configure_connection, initialize},
};

/// The process-wide pool of database connections.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
    checkout_timeout: Duration,
}

#[derive(Debug)]
struct PoolInner {
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl PoolInner {
    fn idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        // The vector is never left half-updated, so a poisoned lock is still usable.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConnectionPool {
    /// How long [ConnectionPool::get] waits for a free connection by default.
    pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Open `size` connections to the database file at `path` and create the
    /// schema if needed.
    ///
    /// The database is switched to WAL mode so readers do not block the
    /// single writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the schema cannot be created.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self, Error> {
        let size = size.max(1);
        let mut connections = Vec::with_capacity(size);

        for _ in 0..size {
            let connection = Connection::open(path.as_ref())?;
            configure_connection(&connection)?;
            let journal_mode: String = connection.pragma_update_and_check(
                None,
                "journal_mode",
                "WAL",
                |row| row.get(0),
            )?;
            tracing::debug!("opened database connection with journal mode {journal_mode}");
            connections.push(connection);
        }

        initialize(&connections[0])?;

        Ok(Self::from_connections(connections))
    }

    /// Create a pool with a single connection to a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, Error> {
        let connection = Connection::open_in_memory()?;
        configure_connection(&connection)?;
        initialize(&connection)?;

        Ok(Self::from_connections(vec![connection]))
    }

    fn from_connections(connections: Vec<Connection>) -> Self {
        let size = connections.len();

        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(connections),
                permits: Arc::new(Semaphore::new(size)),
                size,
            }),
            checkout_timeout: Self::DEFAULT_CHECKOUT_TIMEOUT,
        }
    }

    /// Set how long [ConnectionPool::get] waits for a free connection.
    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }

    /// The total number of connections in the pool.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// The number of connections that are not checked out.
    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }

    /// Check out a connection.
    ///
    /// # Errors
    /// Returns the transient [Error::Unavailable] if no connection becomes free
    /// within the checkout timeout.
    pub async fn get(&self) -> Result<PooledConnection, Error> {
        let permit = tokio::time::timeout(
            self.checkout_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            Error::Unavailable(format!(
                "no database connection became free within {:?}",
                self.checkout_timeout
            ))
        })?
        .map_err(|_| Error::Unavailable("the connection pool is closed".to_owned()))?;

        let connection = self.inner.idle().pop().ok_or_else(|| {
            Error::Internal("the connection pool is empty while holding a permit".to_owned())
        })?;

        Ok(PooledConnection {
            connection: Some(connection),
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    /// Run `operation` on a checked-out connection on the blocking thread pool.
    ///
    /// The connection is returned to the pool once `operation` finishes.
    ///
    /// # Errors
    /// Returns any error from checking out a connection or from `operation`,
    /// or [Error::Internal] if the blocking task panicked.
    pub async fn interact<F, T>(&self, operation: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Connection) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let mut connection = self.get().await?;

        tokio::task::spawn_blocking(move || operation(&mut connection))
            .await
            .map_err(|error| Error::Internal(format!("database task failed: {error}")))?
    }
}

/// A connection checked out from a [ConnectionPool].
///
/// Dropping the guard returns the connection to the pool.
#[derive(Debug)]
pub struct PooledConnection {
    connection: Option<Connection>,
    pool: Arc<PoolInner>,
    // Dropped after the connection is back in the idle list.
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("connection is only taken when the guard is dropped")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("connection is only taken when the guard is dropped")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.idle().push(connection);
        }
    }
}
