//! Shelfwatch poller - recurring inventory polling daemon.
//!
//! Long-running process that polls the upstream storefront on a fixed
//! interval and diffs product availability per substore. Restocked products
//! turn into notification jobs for the users tracking them; delivery is
//! handled separately by `shelfwatch-worker`.
//!
//! # Architecture
//!
//! - Session client for the storefront handshake and inventory endpoints
//! - `PostgreSQL` for tracking requests, key-value documents and the
//!   delivery queue
//! - Sentry + tracing for error reporting and structured logs

#![cfg_attr(not(test), forbid(unsafe_code))]

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfwatch_poller::config::PollerConfig;
use shelfwatch_poller::db;
use shelfwatch_poller::directory::SubstoreDirectory;
use shelfwatch_poller::kv::PgKvStore;
use shelfwatch_poller::poll::{PollEngine, run_poll_loop};
use shelfwatch_poller::session::SessionClient;
use shelfwatch_poller::snapshot::SnapshotStore;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &PollerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = PollerConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shelfwatch_poller=info".into());

    // Use JSON format on Fly.io for structured log parsing, text format locally
    let is_fly = std::env::var("FLY_APP_NAME").is_ok();
    let json_layer = is_fly.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!is_fly).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p shelfwatch-cli -- migrate

    let client = SessionClient::new(&config.storefront).expect("Failed to build session client");

    let kv = PgKvStore::new(pool.clone());
    let engine = PollEngine::new(
        SubstoreDirectory::new(kv.clone()),
        SnapshotStore::new(kv),
        client,
    );

    tracing::info!(
        interval_secs = config.poll_interval.as_secs(),
        base_url = %config.storefront.base_url,
        "poller starting"
    );

    run_poll_loop(&engine, &pool, config.poll_interval, shutdown_signal()).await;

    tracing::info!("poller stopped");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
