mod config;
mod error;
mod services;

use clap::Parser;
use config::Config;
use joblib::{JobLauncher, LogEntry};
use services::jobservice::{router, AppState, Authorizer};
use std::future::Future;
use std::time::Duration;
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long live jobs get to wind down after a kill at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let token = config::load_token(&config.token_file).map_err(|err| {
        error!(error = %err, "Service failed");
        err
    })?;

    let (sink, log) = mpsc::unbounded_channel();
    let relay = spawn_log_relay(log);
    let launcher = JobLauncher::new(&config.scripts_dir, sink);
    info!(scripts_dir = %launcher.scripts_dir().display(), "looking for job scripts");

    let listener = TcpListener::bind(config.listen).await?;
    let state = AppState::new(launcher.clone(), Authorizer::new(token));
    serve(listener, state, shutdown_signal()).await?;

    stop_live_jobs(&launcher, SHUTDOWN_GRACE).await;
    // jobs that outlived the grace period still hold the sink, so don't wait on them forever
    drop(launcher);
    let _ = tokio::time::timeout(Duration::from_secs(1), relay).await;
    Ok(())
}

async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    info!("Server is listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Write every job log entry through `tracing`, until all launchers are gone.
fn spawn_log_relay(mut log: mpsc::UnboundedReceiver<LogEntry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(entry) = log.recv().await {
            info!(target: "jobs", job_id = entry.job_id, "{}", entry);
        }
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        // without a signal handler we can only run until killed
        error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Kill whatever is still running and give the supervisors a moment to reap and relay.
async fn stop_live_jobs(launcher: &JobLauncher, grace: Duration) {
    let registry = launcher.registry();
    for id in registry.ids() {
        if let Err(err) = launcher.kill(id) {
            warn!(job_id = id, error = %err, "could not kill job at shutdown");
        }
    }
    let drained = tokio::time::timeout(grace, async {
        while !registry.ids().is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!(live = ?registry.ids(), "jobs still running at exit");
    }
}
