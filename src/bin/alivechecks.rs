use alivechecks::clock::{Clock, SystemClock};
use alivechecks::db::{DbStore, MonitorStore};
use alivechecks::metrics::{MetricsSink, TracingMetrics};
use alivechecks::retention::{self, RetentionTask, DEFAULT_RETENTION_DAYS};
use alivechecks::scheduler::{JobQueue, Scheduler, WorkerPool};
use alivechecks::server::{CoreServices, ServerConfig};
use alivechecks::version::VERSION;

use clap::{Parser, Subcommand};
use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Jobs buffered per worker before the scheduler waits.
const QUEUE_DEPTH_PER_WORKER: usize = 64;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler, workers and retention loop (default)
    Run,
    /// Delete uptime check results older than the given number of days, then exit
    Cleanup {
        #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
        days: i64,
    },
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "alivechecks.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info,sea_orm=warn` level if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("alivechecks version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();
    let config = ServerConfig::load(args.config.as_deref())?;

    init_logging(&config.log_dir);
    info!("Starting alivechecks, version: {}", VERSION);

    let mut opt = ConnectOptions::new(config.database_url.to_owned());
    opt.max_connections(10);
    let db = match Database::connect(opt).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to connect to the database.");
            return Err(e.into());
        }
    };
    let store: Arc<dyn MonitorStore> = Arc::new(DbStore::new(db));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match args.command.unwrap_or(Command::Run) {
        Command::Cleanup { days } => {
            let deleted = retention::purge_check_results(store.as_ref(), clock.now(), days).await?;
            println!("Deleted {deleted} uptime check results older than {days} days.");
            Ok(())
        }
        Command::Run => run(config, store, clock).await,
    }
}

async fn run(
    config: ServerConfig,
    store: Arc<dyn MonitorStore>,
    clock: Arc<dyn Clock>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let metrics: Arc<dyn MetricsSink> = Arc::new(TracingMetrics);
    let services = CoreServices::new(&config, store.clone(), clock.clone(), metrics)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // --- Job queue and workers ---
    let (queue, receiver) = JobQueue::new(
        config.worker_count.saturating_mul(QUEUE_DEPTH_PER_WORKER),
        config.job_retry_policy(),
    );
    let mut handles = WorkerPool::new(
        queue.clone(),
        receiver,
        services.job_handler(),
        config.worker_count,
    )
    .spawn(shutdown_rx.clone());

    // --- Due-set scans ---
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        queue,
        clock.clone(),
        config.scan_settings(),
    ));
    handles.push(tokio::spawn(scheduler.run(shutdown_rx.clone())));

    // --- Check result retention ---
    let retention_task = Arc::new(RetentionTask::new(
        store,
        clock,
        config.retention_days,
        config.retention_every(),
    ));
    handles.push(tokio::spawn(retention_task.run(shutdown_rx)));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received; draining workers.");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Background task ended abnormally.");
        }
    }
    services.dispatcher.wait_idle().await;
    info!("Shutdown complete.");
    Ok(())
}
