//! filehub Server
//!
//! HTTP API for accounts and file metadata, plus the background workers that
//! drain the file and user queues.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

use filehub_core::config::load_config;
use filehub_core::tracing_init::{default_filter, init_tracing};

use filehub_server::auth::AuthFlow;
use filehub_server::http::{AppState, build_router};
use filehub_server::jobs::{JobQueue, WorkerPool};
use filehub_server::processors::{LogNotifier, ThumbnailProcessor, WelcomeProcessor};
use filehub_server::session::{SessionStore, spawn_sweeper};
use filehub_server::storage::Store;

/// Which parts of the service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
    /// HTTP API only.
    Api,
    /// Queue workers only.
    Worker,
    /// Both in one process.
    All,
}

impl Role {
    const fn serves_api(self) -> bool {
        matches!(self, Self::Api | Self::All)
    }

    const fn runs_workers(self) -> bool {
        matches!(self, Self::Worker | Self::All)
    }
}

#[derive(Parser, Debug)]
#[command(name = "filehub-server")]
#[command(version, about = "filehub server - accounts, sessions, and file post-processing")]
struct Args {
    /// Path to a JSON settings file.
    #[arg(long, env = "FILEHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the settings file).
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Path to `SQLite` database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Which components to run.
    #[arg(long, value_enum, default_value_t = Role::All)]
    role: Role,

    /// Concurrent jobs per queue.
    #[arg(long)]
    workers: Option<usize>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if let Some(path) = args.db_path {
        config.server.database_path = Some(path);
    }
    if let Some(workers) = args.workers {
        config.queues.concurrency = workers;
    }

    init_tracing(
        &default_filter(env!("CARGO_PKG_NAME"), &config.server.log_level),
        args.log_json,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        role = ?args.role,
        "Starting filehub-server"
    );

    let db_path = match config.server.database_path.clone() {
        Some(path) => path,
        None => default_db_path()?,
    };
    info!(path = %db_path.display(), "Opening store");
    let store = Store::open(&db_path).await;
    if !store.is_alive() {
        warn!("Store is not available; dependent operations will fail until restart");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let queue = JobQueue::new(store.clone(), config.queues.clone());

    let mut tasks = JoinSet::new();
    if args.role.runs_workers() {
        let thumbnails = WorkerPool::new(queue.clone(), ThumbnailProcessor::new(store.clone()));
        let welcomes = WorkerPool::new(
            queue.clone(),
            WelcomeProcessor::new(store.clone(), LogNotifier),
        );
        tasks.spawn(thumbnails.run(shutdown_tx.subscribe()));
        tasks.spawn(welcomes.run(shutdown_tx.subscribe()));
    }

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(true);
    });

    if args.role.serves_api() {
        let sessions = SessionStore::default();
        let sweeper = spawn_sweeper(
            sessions.cache().clone(),
            Duration::from_secs(config.sessions.sweep_interval_secs),
            shutdown_tx.subscribe(),
        );

        let auth = AuthFlow::new(
            store.clone(),
            sessions,
            Duration::from_secs(config.sessions.ttl_secs),
        );
        let app = build_router(AppState {
            store: store.clone(),
            auth,
            queue,
        });

        let listener = tokio::net::TcpListener::bind(config.server.addr).await?;
        info!(addr = %config.server.addr, "HTTP server ready");

        let mut rx = shutdown_rx.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.wait_for(|stop| *stop).await;
            })
            .await?;
        let _ = sweeper.await;
    } else {
        let mut rx = shutdown_rx.clone();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    // Workers finish their in-flight jobs before the store goes away.
    let _ = shutdown_tx.send(true);
    while tasks.join_next().await.is_some() {}
    store.close().await;

    info!("filehub-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm => {
            info!("Received SIGTERM shutdown signal");
        }
    }
}

/// Default database path: ~/.filehub/filehub.db
fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".filehub").join("filehub.db"))
}
