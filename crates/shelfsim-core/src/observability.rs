//! Observability infrastructure for shelfsim.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors shared by the simulation
//! engine and the service binary. Visibility into the jobs is through logs
//! only: a count of documents updated, the cycle number, or a no-op notice.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `shelfsim_engine=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for one batch-simulation invocation.
#[must_use]
pub fn simulation_span(cycle: i64, batch_size: usize) -> Span {
    tracing::info_span!("simulation", cycle = cycle, batch_size = batch_size)
}

/// Creates a span for one summary-propagation invocation.
#[must_use]
pub fn propagation_span(operation: &str) -> Span {
    tracing::info_span!("propagation", op = operation)
}
