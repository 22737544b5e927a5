//! # shelfsim-service
//!
//! Worker binary packaging the two inventory jobs of the retail demo:
//!
//! - **Simulation loop**: rewrites a bounded random batch of inventory
//!   documents on a fixed interval (nominally every 12 hours)
//! - **Propagation consumer**: follows the inventory change stream and keeps
//!   every product's denormalized `inventorySummary` in sync
//!
//! ## Modes
//!
//! - **Service Mode**: runs both jobs continuously with HTTP health endpoints
//! - **CLI Mode**: single simulation pass or summary backfill, for debugging
//!   or recovery
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Shallow liveness check (always 200)
//! - `GET /ready` - Readiness check with simulation health status
//!
//! ## Usage
//!
//! ```bash
//! # Run as service (default cadence: every 12 hours)
//! shelfsim-service serve --port 8080
//!
//! # One simulation pass, deterministic for a seed
//! shelfsim-service simulate --seed 7
//!
//! # Rebuild every product summary from current inventory
//! shelfsim-service resync
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::Mutex;

use shelfsim_core::change::{ChangeOperation, InventoryChange};
use shelfsim_core::observability::{LogFormat, init_logging};
use shelfsim_core::store::InventoryStore;
use shelfsim_engine::{BatchSimulator, SimulatorConfig, SummaryPropagator, SyncOutcome};
use shelfsim_mongo::{MongoConfig, MongoStore};

const STREAM_RECONNECT_DELAY_SECS: u64 = 5;

// ============================================================================
// CLI Arguments
// ============================================================================

/// Shelfsim inventory worker.
#[derive(Debug, Parser)]
#[command(name = "shelfsim-service")]
#[command(about = "Simulates retail inventory and propagates product summaries")]
#[command(version)]
struct Args {
    /// MongoDB connection string.
    #[arg(
        long,
        env = "SHELFSIM_MONGODB_URI",
        default_value = "mongodb://localhost:27017",
        global = true
    )]
    mongodb_uri: String,

    /// Database holding the retail collections.
    #[arg(
        long,
        env = "SHELFSIM_DATABASE",
        default_value = "retail-unified-commerce",
        global = true
    )]
    database: String,

    /// Inventory collection name.
    #[arg(
        long,
        env = "SHELFSIM_INVENTORY_COLLECTION",
        default_value = "inventory",
        global = true
    )]
    inventory_collection: String,

    /// Products collection name.
    #[arg(
        long,
        env = "SHELFSIM_PRODUCTS_COLLECTION",
        default_value = "products",
        global = true
    )]
    products_collection: String,

    /// Cycle-counter (meta) collection name.
    #[arg(
        long,
        env = "SHELFSIM_META_COLLECTION",
        default_value = "inventory-sim-meta",
        global = true
    )]
    meta_collection: String,

    /// Maximum documents rewritten per simulation pass.
    #[arg(long, env = "SHELFSIM_BATCH_SIZE", default_value = "500", global = true)]
    batch_size: usize,

    /// Log output format.
    #[arg(long, env = "SHELFSIM_LOG_FORMAT", default_value = "pretty", global = true)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run as a service with health endpoints.
    Serve {
        /// HTTP port for health endpoints.
        #[arg(long, env = "SHELFSIM_PORT", default_value = "8080")]
        port: u16,

        /// Simulation interval in seconds.
        #[arg(long, env = "SHELFSIM_INTERVAL_SECS", default_value = "43200")]
        interval_secs: u64,

        /// Maximum time without a successful pass before unhealthy (seconds).
        #[arg(
            long,
            env = "SHELFSIM_UNHEALTHY_THRESHOLD_SECS",
            default_value = "93600"
        )]
        unhealthy_threshold_secs: u64,
    },

    /// Run a single simulation pass.
    Simulate {
        /// RNG seed for a deterministic pass.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Rebuild every product's inventory summary from current inventory.
    Resync {
        /// Documents per scan page.
        #[arg(long, default_value = "200")]
        page_size: usize,
    },
}

impl Args {
    fn mongo_config(&self) -> MongoConfig {
        MongoConfig {
            uri: self.mongodb_uri.clone(),
            database: self.database.clone(),
            inventory_collection: self.inventory_collection.clone(),
            products_collection: self.products_collection.clone(),
            meta_collection: self.meta_collection.clone(),
        }
    }
}

// ============================================================================
// Health State
// ============================================================================

/// Shared state for tracking simulation health.
#[derive(Debug)]
struct WorkerState {
    /// Whether the service is ready to accept work.
    ready: AtomicBool,
    /// Unix timestamp of last successful simulation pass.
    last_successful_run_ts: AtomicU64,
    /// Total successful simulation passes.
    successful_runs: AtomicU64,
    /// Total failed simulation passes.
    failed_runs: AtomicU64,
    /// Whether a pass is currently running.
    run_in_progress: AtomicBool,
    /// Serializes passes to avoid concurrent runs in one process.
    run_lock: Mutex<()>,
    /// Threshold (seconds) before marking unhealthy.
    unhealthy_threshold_secs: u64,
}

impl WorkerState {
    fn new(unhealthy_threshold_secs: u64) -> Self {
        Self {
            ready: AtomicBool::new(false),
            last_successful_run_ts: AtomicU64::new(0),
            successful_runs: AtomicU64::new(0),
            failed_runs: AtomicU64::new(0),
            run_in_progress: AtomicBool::new(false),
            run_lock: Mutex::new(()),
            unhealthy_threshold_secs,
        }
    }

    fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    fn record_success(&self) {
        let now: u64 = Utc::now().timestamp().try_into().unwrap_or_default();
        self.last_successful_run_ts.store(now, Ordering::Release);
        self.successful_runs.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed_runs.fetch_add(1, Ordering::Relaxed);
    }

    fn is_healthy(&self) -> bool {
        if !self.ready.load(Ordering::Acquire) {
            return false;
        }

        if self.successful_runs.load(Ordering::Acquire) == 0 {
            // Not healthy until the first pass completes: the inventory may
            // still be in whatever state the last deployment left it.
            return false;
        }

        let last = self.last_successful_run_ts.load(Ordering::Acquire);
        if last == 0 {
            return false;
        }

        let now: u64 = Utc::now().timestamp().try_into().unwrap_or_default();
        now.saturating_sub(last) < self.unhealthy_threshold_secs
    }

    fn last_successful_run(&self) -> Option<DateTime<Utc>> {
        let ts = self.last_successful_run_ts.load(Ordering::Acquire);
        if ts == 0 {
            None
        } else {
            let ts = i64::try_from(ts).ok()?;
            DateTime::from_timestamp(ts, 0)
        }
    }
}

/// Shared state for HTTP handlers.
#[derive(Clone)]
struct ServiceState {
    worker: Arc<WorkerState>,
    simulator: Arc<BatchSimulator>,
}

// ============================================================================
// Health Endpoints
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
struct ReadyResponse {
    ready: bool,
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_successful_run: Option<String>,
    successful_runs: u64,
    failed_runs: u64,
    run_in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// GET /health - Shallow liveness check.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /ready - Readiness check with simulation health.
async fn ready(State(state): State<Arc<ServiceState>>) -> impl IntoResponse {
    let ready = state.worker.ready.load(Ordering::Acquire);
    let healthy = state.worker.is_healthy();
    let last_successful = state.worker.last_successful_run();
    let successful_runs = state.worker.successful_runs.load(Ordering::Relaxed);
    let failed_runs = state.worker.failed_runs.load(Ordering::Relaxed);
    let run_in_progress = state.worker.run_in_progress.load(Ordering::Acquire);

    let message = if !ready {
        Some("Service starting up".to_string())
    } else if successful_runs == 0 {
        Some("Waiting for first successful simulation pass".to_string())
    } else if !healthy {
        Some(format!(
            "No successful simulation pass in {} seconds",
            state.worker.unhealthy_threshold_secs
        ))
    } else {
        None
    };

    let status = if ready && healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            ready,
            healthy,
            last_successful_run: last_successful.map(|dt| dt.to_rfc3339()),
            successful_runs,
            failed_runs,
            run_in_progress,
            message,
        }),
    )
}

/// POST /simulate - Trigger a simulation pass on-demand.
///
/// Returns:
/// - `202 Accepted` if a new pass was started
/// - `409 Conflict` if a pass is already in progress
async fn simulate(State(state): State<Arc<ServiceState>>) -> impl IntoResponse {
    if state
        .worker
        .run_in_progress
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "status": "already_running",
                "message": "A simulation pass is already in progress"
            })),
        );
    }

    let worker = Arc::clone(&state.worker);
    let simulator = Arc::clone(&state.simulator);
    tokio::spawn(async move {
        run_pass_guarded(&worker, &simulator).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "started",
            "message": "Simulation pass triggered"
        })),
    )
}

// ============================================================================
// Simulation Loop
// ============================================================================

/// Runs the simulation loop in service mode.
async fn run_simulation_loop(
    worker: Arc<WorkerState>,
    simulator: Arc<BatchSimulator>,
    interval: Duration,
) {
    let mut interval_timer = tokio::time::interval(interval);

    // The first tick completes immediately to align the interval.
    interval_timer.tick().await;
    worker.mark_ready();
    tracing::info!("Worker ready, starting simulation loop");

    // Run a pass immediately on startup so readiness can become healthy
    // without waiting a full interval.
    run_pass_guarded(&worker, &simulator).await;

    loop {
        interval_timer.tick().await;

        tracing::info!("Starting scheduled simulation pass");

        run_pass_guarded(&worker, &simulator).await;
    }
}

async fn run_pass_guarded(worker: &Arc<WorkerState>, simulator: &Arc<BatchSimulator>) {
    let _guard = worker.run_lock.lock().await;

    // If this pass came from the periodic loop, `run_in_progress` may be
    // false; if from `/simulate`, it is already true. Ensure it is true
    // while work runs and reset it at the end.
    worker.run_in_progress.store(true, Ordering::Release);

    let mut rng = StdRng::from_entropy();
    match simulator.run(&mut rng, Utc::now().date_naive()).await {
        Ok(report) => {
            worker.record_success();
            if report.rolled_over {
                tracing::info!(
                    cycle = report.cycle,
                    next_cycle = report.next_cycle,
                    "Simulation pass rolled the cycle over"
                );
            } else {
                tracing::info!(
                    cycle = report.cycle,
                    updated = report.outcome.applied,
                    failed = report.outcome.failed.len(),
                    "Simulation pass completed"
                );
            }
        }
        Err(e) => {
            worker.record_failure();
            tracing::error!(error = %e, "Simulation pass failed");
        }
    }

    worker.run_in_progress.store(false, Ordering::Release);
}

// ============================================================================
// Propagation Consumer
// ============================================================================

/// Follows the inventory change stream, feeding each event to the
/// propagator. Reopens the stream after failures; redelivery between the
/// drop point and the reopen is covered by `resync`.
async fn run_propagation_loop(store: MongoStore, propagator: Arc<SummaryPropagator>) {
    loop {
        match store.watch_inventory().await {
            Ok(mut events) => {
                tracing::info!("Inventory change stream opened");
                loop {
                    match events.next_change().await {
                        Ok(Some(change)) => {
                            if let Err(e) = propagator.handle(&change).await {
                                tracing::error!(error = %e, "Summary propagation failed");
                            }
                        }
                        Ok(None) => {
                            tracing::warn!("Inventory change stream closed");
                            break;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Inventory change stream failed");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not open inventory change stream");
            }
        }

        tokio::time::sleep(Duration::from_secs(STREAM_RECONNECT_DELAY_SECS)).await;
        tracing::info!("Reconnecting inventory change stream");
    }
}

// ============================================================================
// Resync
// ============================================================================

/// Replays every inventory document through the propagator, one scan page at
/// a time, rebuilding all product summaries.
async fn resync(
    store: &Arc<dyn InventoryStore>,
    propagator: &SummaryPropagator,
    database: &str,
    page_size: usize,
) -> Result<()> {
    let mut skip = 0;
    let mut synced = 0_u64;
    let mut skipped = 0_u64;
    let mut missing = 0_u64;

    loop {
        let page = store.scan_inventory(skip, page_size).await?;
        if page.is_empty() {
            break;
        }
        skip += page.len();

        for doc in page {
            let change = InventoryChange {
                operation: ChangeOperation::Replace,
                full_document: Some(doc),
                database: Some(database.to_string()),
            };
            match propagator.handle(&change).await? {
                SyncOutcome::Synced { .. } => synced += 1,
                SyncOutcome::ProductMissing { .. } => missing += 1,
                SyncOutcome::Skipped(_) => skipped += 1,
            }
        }
    }

    tracing::info!(synced, missing, skipped, "Resync completed");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_format.into());

    let store = MongoStore::connect(args.mongo_config()).await?;
    let shared: Arc<dyn InventoryStore> = Arc::new(store.clone());

    match args.command {
        Commands::Serve {
            port,
            interval_secs,
            unhealthy_threshold_secs,
        } => {
            tracing::info!(
                port = port,
                interval_secs = interval_secs,
                unhealthy_threshold_secs = unhealthy_threshold_secs,
                database = %args.database,
                batch_size = args.batch_size,
                "Starting shelfsim worker"
            );

            let simulator = Arc::new(BatchSimulator::new(
                Arc::clone(&shared),
                SimulatorConfig {
                    batch_size: args.batch_size,
                },
            ));
            let propagator = Arc::new(SummaryPropagator::new(Arc::clone(&shared)));

            let worker = Arc::new(WorkerState::new(unhealthy_threshold_secs));
            let state = Arc::new(ServiceState {
                worker: Arc::clone(&worker),
                simulator: Arc::clone(&simulator),
            });

            let router = Router::new()
                .route("/health", get(health))
                .route("/ready", get(ready))
                .route("/simulate", post(simulate))
                .with_state(Arc::clone(&state));

            // Spawn the two jobs: timer-driven simulation, event-driven
            // propagation.
            let interval = Duration::from_secs(interval_secs);
            tokio::spawn(async move {
                run_simulation_loop(worker, simulator, interval).await;
            });
            tokio::spawn(async move {
                run_propagation_loop(store, propagator).await;
            });

            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            tracing::info!(address = %addr, "Starting health server");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }

        Commands::Simulate { seed } => {
            let simulator = BatchSimulator::new(
                Arc::clone(&shared),
                SimulatorConfig {
                    batch_size: args.batch_size,
                },
            );
            let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

            let report = simulator.run(&mut rng, Utc::now().date_naive()).await?;
            if report.rolled_over {
                tracing::info!(
                    cycle = report.cycle,
                    next_cycle = report.next_cycle,
                    "Sweep complete, cycle advanced"
                );
            } else {
                tracing::info!(
                    cycle = report.cycle,
                    sampled = report.sampled,
                    updated = report.outcome.applied,
                    skipped = report.outcome.skipped,
                    failed = report.outcome.failed.len(),
                    "Simulation pass completed"
                );
            }
        }

        Commands::Resync { page_size } => {
            let propagator = SummaryPropagator::new(Arc::clone(&shared));
            resync(&shared, &propagator, &args.database, page_size).await?;
        }
    }

    Ok(())
}
