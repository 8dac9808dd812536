//! SynopticSpread scheduler binary: wires the configuration surface, both
//! stores, and the fetcher registry into an `Orchestrator`, then either
//! runs it once or hands it to the wall-clock cron.

mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use spread_core::{build_fetchers, load_model_schedule_configs, Orchestrator, SpreadConfig};
use spread_storage::{ArrayStore, RelationalStore};

use scheduler::Scheduler;

/// Scheduler-specific CLI surface, layered on top of `SpreadConfig`'s
/// shared configuration surface.
#[derive(Parser, Debug)]
#[command(name = "spread-scheduler")]
#[command(about = "Wall-clock cron dispatching SynopticSpread ingestion jobs")]
struct Args {
    #[command(flatten)]
    config: SpreadConfig,

    /// Run every enabled model's job once for its latest cycle and exit,
    /// instead of running the cron loop.
    #[arg(long)]
    once: bool,

    /// With `--once`, run only this model instead of all configured ones.
    #[arg(long)]
    model: Option<String>,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("starting SynopticSpread scheduler");

    if !args.config.scheduler_enabled && !args.once {
        info!("scheduler_enabled is false; exiting (ingestion is CLI/API-triggered only)");
        return Ok(());
    }

    let relational = RelationalStore::connect(&args.config.database_url).await?;
    relational.migrate().await?;

    let array_store = ArrayStore::new(args.config.data_store_path.to_string_lossy())?;

    let fetchers = build_fetchers(args.config.fetch_timeout_seconds);
    let monitor_points = args.config.monitor_points()?;
    let model_configs = load_model_schedule_configs(&args.config.config_dir)?;

    let orchestrator = Arc::new(Orchestrator::new(
        relational,
        array_store,
        fetchers,
        monitor_points,
        Duration::from_secs(args.config.job_deadline_seconds),
    ));

    let scheduler = Arc::new(Scheduler::new(orchestrator, model_configs));

    if args.once {
        match &args.model {
            Some(model) => scheduler.run_model_once(model).await?,
            None => scheduler.run_all_once().await,
        }
        return Ok(());
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        shutdown_tx_clone.send(()).ok();
    });

    scheduler.run_forever(shutdown_tx.subscribe()).await;

    info!("scheduler exited");
    Ok(())
}
