use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use clockwork_core::config::ClockworkConfig;
use clockwork_sandbox::RhaiScriptEngine;
use clockwork_scheduler::dispatch::Dispatcher;
use clockwork_scheduler::{InProcessLocks, SchedulerEngine, TaskService};
use clockwork_store::{LogStore, SqliteConfigStore, SqliteEventStore, TaskStore};

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clockwork_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path via CLOCKWORK_CONFIG > clockwork.toml > defaults
    let config_path = std::env::var("CLOCKWORK_CONFIG").ok();
    let config = ClockworkConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        ClockworkConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    // initialize SQLite database — single file for all stores
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    clockwork_store::db::init_db(&db)?;
    drop(db);
    info!("database migrations complete");

    // build stores — each gets its own connection for thread safety
    let tasks = Arc::new(TaskStore::new(rusqlite::Connection::open(&db_path)?));
    let logs = Arc::new(LogStore::new(rusqlite::Connection::open(&db_path)?));
    let configs = Arc::new(SqliteConfigStore::new(rusqlite::Connection::open(&db_path)?));
    let events = Arc::new(SqliteEventStore::new(rusqlite::Connection::open(&db_path)?));

    let workers = config.scheduler.worker_count();
    info!(workers, "execution pool sized");

    let service = Arc::new(TaskService::new(
        tasks,
        logs,
        configs,
        events,
        Arc::new(InProcessLocks::new()),
        Dispatcher::new(Arc::new(RhaiScriptEngine::new()), workers),
        Vec::new(),
        Duration::from_secs(config.scheduler.test_timeout_secs),
    ));

    // spawn the scheduler timer loop in background
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine = SchedulerEngine::new(
        Arc::clone(&service),
        Duration::from_secs(config.scheduler.tick_secs),
    );
    tokio::spawn(async move { engine.run(shutdown_rx).await });

    let state = Arc::new(app::AppState::new(config, service));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Clockwork gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    // signal scheduler to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
