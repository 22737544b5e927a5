//! The batch simulator: one bounded randomized rewrite pass per invocation.
//!
//! Each invocation:
//!
//! 1. Reads the current cycle (creating the counter if needed)
//! 2. Samples up to `batch_size` documents not yet processed this cycle
//! 3. If none remain, advances the cycle and stops (the sweep rolls over)
//! 4. Otherwise regenerates every `storeInventory` entry of every sampled
//!    document and applies the batch as one best-effort bulk update
//!
//! The counter read happens-before the sample, which happens-before the bulk
//! write; the selection set depends on the counter value read. The RNG and
//! the calendar date are injected so runs replay deterministically under
//! test.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use rand::Rng;
use tracing::Instrument as _;

use shelfsim_core::document::{InventoryDocument, StoreInventoryEntry};
use shelfsim_core::error::Result;
use shelfsim_core::observability::simulation_span;
use shelfsim_core::store::{BulkOutcome, InventoryStore, SimulatedUpdate};

use crate::cycle::CycleTracker;

/// Tuning knobs for the batch simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Maximum documents rewritten per invocation.
    pub batch_size: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self { batch_size: 500 }
    }
}

/// What one simulator invocation did.
#[derive(Debug)]
pub struct SimulationReport {
    /// The cycle this invocation ran in.
    pub cycle: i64,
    /// Documents sampled for rewriting.
    pub sampled: usize,
    /// Per-item results of the bulk application.
    pub outcome: BulkOutcome,
    /// Whether the eligible set was empty and the cycle was advanced instead.
    pub rolled_over: bool,
    /// The new cycle number, when this invocation rolled over.
    pub next_cycle: Option<i64>,
}

/// The batch simulation job.
pub struct BatchSimulator {
    store: Arc<dyn InventoryStore>,
    tracker: CycleTracker,
    config: SimulatorConfig,
}

impl BatchSimulator {
    /// Creates a simulator over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>, config: SimulatorConfig) -> Self {
        let tracker = CycleTracker::new(Arc::clone(&store));
        Self {
            store,
            tracker,
            config,
        }
    }

    /// Runs one simulation pass.
    ///
    /// `today` anchors the derived restock/depletion dates; callers pass the
    /// current calendar date in production and a fixed date in tests.
    ///
    /// # Errors
    ///
    /// Counter and sample failures are fatal for the invocation and mutate
    /// nothing. Per-item bulk failures are collected in the report's
    /// [`BulkOutcome`], not returned as `Err`.
    pub async fn run(&self, rng: &mut impl Rng, today: NaiveDate) -> Result<SimulationReport> {
        let cycle = self.tracker.current().await?;
        let span = simulation_span(cycle, self.config.batch_size);

        async {
            let batch = self.store.sample_eligible(cycle, self.config.batch_size).await?;

            if batch.is_empty() {
                let next = self.tracker.advance().await?;
                tracing::info!(cycle, next_cycle = next, "sweep complete, no documents touched");
                return Ok(SimulationReport {
                    cycle,
                    sampled: 0,
                    outcome: BulkOutcome::default(),
                    rolled_over: true,
                    next_cycle: Some(next),
                });
            }

            let sampled = batch.len();
            let updates: Vec<SimulatedUpdate> = batch
                .iter()
                .map(|doc| self.rewrite(doc, &mut *rng, today, cycle))
                .collect();

            let outcome = self.store.apply_simulation(&updates).await?;

            tracing::info!(
                updated = outcome.applied,
                skipped = outcome.skipped,
                failed = outcome.failed.len(),
                cycle,
                "simulation batch applied"
            );
            for item in &outcome.failed {
                tracing::warn!(id = %item.id, error = %item.message, "document update failed");
            }

            Ok(SimulationReport {
                cycle,
                sampled,
                outcome,
                rolled_over: false,
                next_cycle: None,
            })
        }
        .instrument(span)
        .await
    }

    fn rewrite(
        &self,
        doc: &InventoryDocument,
        rng: &mut impl Rng,
        today: NaiveDate,
        cycle: i64,
    ) -> SimulatedUpdate {
        SimulatedUpdate {
            id: doc.id.clone(),
            store_inventory: doc
                .store_inventory
                .iter()
                .map(|entry| simulate_entry(entry, rng, today))
                .collect(),
            cycle,
            updated_at: Utc::now(),
        }
    }
}

/// Regenerates one store entry from scratch.
///
/// Location identifiers are preserved verbatim; every volatile field is
/// replaced with a freshly randomized, internally consistent value.
pub fn simulate_entry(
    entry: &StoreInventoryEntry,
    rng: &mut impl Rng,
    today: NaiveDate,
) -> StoreInventoryEntry {
    let shelf_quantity = rng.gen_range(0..=50);
    let backroom_quantity = rng.gen_range(0..=60);
    let shelf_low_threshold = rng.gen_range(5..=12);
    let total = shelf_quantity + backroom_quantity;

    let weekly = rng.gen_range(20..=120);
    let days_out = depletion_days(total, weekly);

    StoreInventoryEntry {
        store_object_id: entry.store_object_id.clone(),
        store_id: entry.store_id.clone(),
        section_id: entry.section_id.clone(),
        aisle_id: entry.aisle_id.clone(),
        shelf_id: entry.shelf_id.clone(),
        shelf_quantity,
        backroom_quantity,
        shelf_low_threshold,
        in_stock: total > 0,
        near_to_replenishment_in_shelf: shelf_quantity < shelf_low_threshold,
        predicted_consumption_per_week: weekly,
        predicted_stock_depletion: today.checked_add_days(Days::new(days_out)),
        last_restock: today.checked_sub_days(Days::new(rng.gen_range(1..=10))),
        next_restock: today.checked_add_days(Days::new(rng.gen_range(1..=15))),
    }
}

/// Days until predicted depletion: `floor(total / (weekly / 7))`, floored at
/// one day so an empty total never yields a degenerate zero-day date.
#[must_use]
pub fn depletion_days(total: i32, weekly: i32) -> u64 {
    let days = (i64::from(total) * 7) / i64::from(weekly);
    u64::try_from(days.max(1)).unwrap_or(1)
}
