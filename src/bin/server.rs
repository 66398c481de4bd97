use std::{error::Error, fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt,
};

use pennywise_rs::{
    AppState, Config, ConnectionMonitor, ConnectionPool, Ledger, build_router, graceful_shutdown,
};

/// The REST API server for pennywise_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The number of database connections to keep open.
    #[arg(long, default_value_t = 4)]
    pool_size: usize,

    /// How many times a database operation is attempted before giving up.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// The delay before the first retry in milliseconds, doubled for each later retry.
    #[arg(long, default_value_t = 1000)]
    retry_base_delay_ms: u64,

    /// How long a request waits for the database before timing out, in seconds.
    #[arg(long, default_value_t = 15)]
    operation_timeout_secs: u64,

    /// How often to check that the database is reachable, in seconds.
    #[arg(long, default_value_t = 30)]
    health_check_interval_secs: u64,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    #[arg(long, env = "TIMEZONE", default_value = "Etc/UTC")]
    timezone: String,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            port: self.port,
            pool_size: self.pool_size,
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            operation_timeout: Duration::from_secs(self.operation_timeout_secs),
            health_check_interval: Duration::from_secs(self.health_check_interval_secs),
            timezone: self.timezone,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let args = Args::parse();
    let db_path = args.db_path.clone();
    let config = args.into_config();
    config.validate()?;

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    let pool = ConnectionPool::open(&db_path, config.pool_size)?;
    let monitor = ConnectionMonitor::new(config.retry_policy());
    monitor.spawn_health_check(pool.clone(), config.health_check_interval);

    let state = AppState::new(Ledger::new(pool, monitor), &config);

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(env_filter),
        )
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
