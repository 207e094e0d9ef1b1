use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vodserve_jobs::{CleanupScheduler, JobStore, JobWorkerPool, NoopPublisher, PipelineConfig};
use vodserve_transcoder::{TranscodeInvoker, TranscoderConfig};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let work_dir = env_or("VODSERVE_WORK_DIR", "/tmp/vodserve");
    let ffmpeg_path = env_or("VODSERVE_FFMPEG", "ffmpeg");
    let bind_addr = env_or("VODSERVE_BIND", "0.0.0.0:8097");
    let workers: usize = env_parse("VODSERVE_WORKERS", 2);
    let queue_depth: usize = env_parse("VODSERVE_QUEUE_DEPTH", 64);
    let retention_secs: u64 = env_parse("VODSERVE_RETENTION_SECS", 15 * 60);

    let store = JobStore::new(&work_dir);
    // No job state survives a restart: sweep whatever a previous run left.
    info!(work_dir = %work_dir, "purging work directory");
    store
        .purge_work_dir()
        .await
        .context("failed to purge work directory")?;

    let invoker = TranscodeInvoker::new(TranscoderConfig {
        ffmpeg_path: ffmpeg_path.into(),
        ..Default::default()
    });

    let scheduler = CleanupScheduler::spawn(store.clone());
    let pool = Arc::new(JobWorkerPool::start(
        store.clone(),
        invoker,
        Arc::new(NoopPublisher),
        scheduler.handle(),
        PipelineConfig {
            workers,
            queue_depth,
            retention: Duration::from_secs(retention_secs),
        },
    ));

    let state = vodserve_server::state::AppState {
        store,
        pool: pool.clone(),
    };
    let app = vodserve_server::routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("failed to bind")?;
    info!(addr = %bind_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop accepting work, let in-flight jobs finish, then fire every
    // still-pending removal before the process exits.
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.close().await,
        Err(_) => warn!("worker pool still referenced at shutdown"),
    }
    scheduler.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
