//! Bounded retries with exponential backoff for store operations, and the
//! connectivity status derived from their outcomes.
//!
//! The [ConnectionMonitor] is created once per process and handed to
//! everything that talks to the database. Observers register listeners to be
//! told whenever the status changes.

use std::{
    fmt,
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde::Serialize;
use tokio::{task::JoinHandle, time::sleep};

use crate::{Error, pool::ConnectionPool};

/// How many attempts and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The maximum number of attempts, including the first one.
    pub max_retries: u32,
    /// The delay before the second attempt. Each later delay doubles.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// The number of attempts used when none is configured.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// The first backoff delay used when none is configured.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

    /// Create a policy, clamping `max_retries` to at least one attempt.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    /// The delay to wait after the failed attempt number `attempt` (starting at 1).
    ///
    /// `base_delay * 2^(attempt - 1)`, saturating instead of overflowing.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_BASE_DELAY)
    }
}

/// Whether the database is reachable, as observed by the most recent operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// False once an operation has failed with a transient error and no
    /// operation has succeeded since.
    pub connected: bool,
    /// The number of consecutive failed attempts of the current operation.
    pub attempts: u32,
    /// The message of the most recent failure.
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    /// The status of a healthy connection.
    pub fn connected() -> Self {
        Self {
            connected: true,
            attempts: 0,
            last_error: None,
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::connected()
    }
}

/// A callback that receives every new [ConnectionStatus].
pub type Listener = Arc<dyn Fn(&ConnectionStatus) + Send + Sync>;

/// The handle returned by [ConnectionMonitor::add_listener], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Retries store operations and broadcasts the resulting connectivity status.
///
/// Cloning is cheap, clones share the same status and listeners.
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    policy: RetryPolicy,
    status: Mutex<ConnectionStatus>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("policy", &self.inner.policy)
            .field("status", &*lock(&self.inner.status))
            .field("listeners", &lock(&self.inner.listeners).len())
            .finish()
    }
}

impl ConnectionMonitor {
    /// Create a monitor that starts out connected.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                policy,
                status: Mutex::new(ConnectionStatus::connected()),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    /// The retry policy used by [ConnectionMonitor::retry_operation].
    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// A snapshot of the current status.
    pub fn status(&self) -> ConnectionStatus {
        lock(&self.inner.status).clone()
    }

    /// Register `listener` to be called with every status change.
    ///
    /// Safe to call from inside a listener.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener, returning whether it was registered.
    ///
    /// A broadcast that is already in progress still delivers to the listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let count_before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != count_before
    }

    /// Run `operation`, retrying transient failures per the monitor's [RetryPolicy].
    ///
    /// # Errors
    /// Non-transient errors are returned immediately. Once every attempt has
    /// failed with a transient error, [Error::StoreUnavailable] is returned.
    pub async fn retry_operation<F, Fut, T>(&self, operation: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.retry_operation_with(self.inner.policy.max_retries, operation)
            .await
    }

    /// Like [ConnectionMonitor::retry_operation] with an explicit attempt budget.
    ///
    /// # Errors
    /// See [ConnectionMonitor::retry_operation].
    pub async fn retry_operation_with<F, Fut, T>(
        &self,
        max_retries: u32,
        mut operation: F,
    ) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_retries = max_retries.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    self.mark_connected();
                    return Ok(value);
                }
                Err(error) if !error.is_transient() => return Err(error),
                Err(error) => {
                    let message = error.to_string();
                    tracing::warn!(
                        "Database operation attempt {attempt}/{max_retries} failed: {message}"
                    );
                    self.mark_disconnected(attempt, &message);

                    if attempt >= max_retries {
                        tracing::error!(
                            "Database operation failed after {attempt} attempts: {message}"
                        );
                        return Err(Error::StoreUnavailable {
                            attempts: attempt,
                            message,
                        });
                    }

                    sleep(self.inner.policy.delay_after(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Ping the database and update the status accordingly.
    ///
    /// Returns whether the database answered.
    pub async fn check_connection(&self, pool: &ConnectionPool) -> bool {
        let result = pool
            .interact(|connection| {
                connection
                    .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(Error::from)
            })
            .await;

        match result {
            Ok(_) => {
                self.mark_connected();
                true
            }
            Err(error) => {
                tracing::error!("Database connection check failed: {error}");
                self.update_status(|status| {
                    status.connected = false;
                    status.last_error = Some(error.to_string());
                });
                false
            }
        }
    }

    /// Spawn a task that calls [ConnectionMonitor::check_connection] every `interval`.
    pub fn spawn_health_check(&self, pool: ConnectionPool, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                monitor.check_connection(&pool).await;
            }
        })
    }

    fn mark_connected(&self) {
        let was_connected = lock(&self.inner.status).connected;

        self.update_status(|status| *status = ConnectionStatus::connected());

        if !was_connected {
            tracing::info!("Database connection restored");
        }
    }

    fn mark_disconnected(&self, attempt: u32, message: &str) {
        self.update_status(|status| {
            status.connected = false;
            status.attempts = attempt;
            status.last_error = Some(message.to_owned());
        });
    }

    /// Apply `update` and broadcast the new status if it changed.
    fn update_status(&self, update: impl FnOnce(&mut ConnectionStatus)) {
        let changed = {
            let mut status = lock(&self.inner.status);
            let before = status.clone();
            update(&mut status);
            (*status != before).then(|| status.clone())
        };

        if let Some(status) = changed {
            self.broadcast(&status);
        }
    }

    /// Deliver `status` to the listeners registered when the broadcast starts.
    ///
    /// No lock is held while listeners run, so they may add or remove
    /// listeners, including themselves.
    fn broadcast(&self, status: &ConnectionStatus) {
        let snapshot: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            listener(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };

    use tokio::time::Instant;

    use crate::{Error, pool::ConnectionPool};

    use super::{ConnectionMonitor, ConnectionStatus, ListenerId, RetryPolicy};

    fn record_statuses(monitor: &ConnectionMonitor) -> Arc<Mutex<Vec<ConnectionStatus>>> {
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = statuses.clone();
        monitor.add_listener(move |status| sink.lock().unwrap().push(status.clone()));
        statuses
    }

    fn transient_error() -> Error {
        Error::Unavailable("database is locked".to_owned())
    }

    #[test]
    fn delay_doubles_from_base() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4000));
    }

    #[test]
    fn new_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_and_reconnects() {
        let monitor = ConnectionMonitor::new(RetryPolicy::default());
        let statuses = record_statuses(&monitor);
        let attempts = AtomicU32::new(0);

        let result = monitor
            .retry_operation(|| async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient_error())
                } else {
                    Ok("ok")
                }
            })
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(monitor.status(), ConnectionStatus::connected());

        let statuses = statuses.lock().unwrap();
        let attempt_counts: Vec<_> = statuses.iter().map(|status| status.attempts).collect();
        assert_eq!(attempt_counts, [1, 2, 0]);
        assert!(statuses.last().unwrap().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries_with_exponential_backoff() {
        let monitor = ConnectionMonitor::new(RetryPolicy::default());
        let attempt_times = Mutex::new(Vec::new());
        let start = Instant::now();

        let result: Result<(), Error> = monitor
            .retry_operation(|| async {
                attempt_times.lock().unwrap().push(start.elapsed());
                Err(transient_error())
            })
            .await;

        assert_eq!(
            result,
            Err(Error::StoreUnavailable {
                attempts: 3,
                message: transient_error().to_string(),
            })
        );
        let attempt_times = attempt_times.into_inner().unwrap();
        assert_eq!(
            attempt_times,
            [Duration::ZERO, Duration::from_secs(1), Duration::from_secs(3)]
        );
        let status = monitor.status();
        assert!(!status.connected);
        assert_eq!(status.attempts, 3);
        assert_eq!(status.last_error, Some(transient_error().to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_non_transient_errors() {
        let monitor = ConnectionMonitor::new(RetryPolicy::default());
        let statuses = record_statuses(&monitor);
        let attempts = AtomicU32::new(0);

        let result: Result<(), Error> = monitor
            .retry_operation(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::NotFound)
            })
            .await;

        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(statuses.lock().unwrap().is_empty());
        assert!(monitor.status().connected);
    }

    #[tokio::test]
    async fn success_while_connected_does_not_broadcast() {
        let monitor = ConnectionMonitor::new(RetryPolicy::default());
        let statuses = record_statuses(&monitor);

        let result = monitor.retry_operation(|| async { Ok(1) }).await;

        assert_eq!(result, Ok(1));
        assert!(statuses.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn listener_removed_mid_broadcast_still_receives_snapshot() {
        let monitor = ConnectionMonitor::new(RetryPolicy::new(1, Duration::ZERO));
        let second_calls = Arc::new(AtomicU32::new(0));
        let second_id = Arc::new(Mutex::new(None::<ListenerId>));

        let remover_monitor = monitor.clone();
        let id_to_remove = second_id.clone();
        monitor.add_listener(move |_| {
            if let Some(id) = *id_to_remove.lock().unwrap() {
                remover_monitor.remove_listener(id);
            }
        });
        let counter = second_calls.clone();
        let id = monitor.add_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        *second_id.lock().unwrap() = Some(id);

        let _ = monitor
            .retry_operation(|| async { Err::<(), _>(transient_error()) })
            .await;
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);

        let _ = monitor.retry_operation(|| async { Ok(()) }).await;
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listener_can_register_during_broadcast() {
        let monitor = ConnectionMonitor::new(RetryPolicy::new(1, Duration::ZERO));
        let registering_monitor = monitor.clone();
        let registered = Arc::new(AtomicU32::new(0));
        let counter = registered.clone();
        monitor.add_listener(move |_| {
            registering_monitor.add_listener(|_| {});
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let _ = monitor
            .retry_operation(|| async { Err::<(), _>(transient_error()) })
            .await;

        assert_eq!(registered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_unknown_listener_returns_false() {
        let monitor = ConnectionMonitor::new(RetryPolicy::default());
        let id = monitor.add_listener(|_| {});

        assert!(monitor.remove_listener(id));
        assert!(!monitor.remove_listener(id));
    }

    #[tokio::test]
    async fn check_connection_reports_healthy_database() {
        let monitor = ConnectionMonitor::new(RetryPolicy::default());
        let pool = ConnectionPool::open_in_memory().unwrap();

        assert!(monitor.check_connection(&pool).await);
        assert!(monitor.status().connected);
    }
}
