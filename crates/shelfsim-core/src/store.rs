//! The document-store contract every shelfsim backend implements.
//!
//! The engine never talks to a database driver directly; it sees only this
//! trait. The contract is deliberately narrow: an atomic cycle counter, a
//! bounded random sample of eligible documents, a bulk "set fields" update
//! with per-item results, a wholesale summary write, and a paged scan for
//! backfills.
//!
//! # Concurrency contract
//!
//! - The cycle counter is the only shared mutable resource contended across
//!   invocations. Both counter operations must be atomic
//!   update-or-insert-if-absent operations in the backend, never
//!   read-modify-write in application code.
//! - [`InventoryStore::apply_simulation`] must re-check eligibility per
//!   document as part of the write filter, so overlapping invocations cannot
//!   double-process a document within one cycle.
//! - Bulk application is best-effort: one item's failure must not abort its
//!   siblings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::document::{InventoryDocument, InventorySummaryEntry, StoreInventoryEntry};
use crate::error::Result;

/// One document's worth of recomputed simulation output.
#[derive(Debug, Clone)]
pub struct SimulatedUpdate {
    /// Identity of the inventory document to update.
    pub id: String,
    /// Replacement `storeInventory` array, regenerated wholesale.
    pub store_inventory: Vec<StoreInventoryEntry>,
    /// The cycle this document is being stamped with.
    pub cycle: i64,
    /// The `updatedAt` timestamp to set.
    pub updated_at: DateTime<Utc>,
}

/// A single failed item inside a bulk application.
#[derive(Debug, Clone)]
pub struct BulkItemError {
    /// Identity of the document whose update failed.
    pub id: String,
    /// Backend-specific failure description.
    pub message: String,
}

/// Aggregated result of a best-effort bulk application.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    /// Documents actually updated.
    pub applied: u64,
    /// Documents whose write filter matched nothing (already claimed by a
    /// concurrent run, or deleted since sampling). Not failures.
    pub skipped: u64,
    /// Per-item failures. Siblings are unaffected.
    pub failed: Vec<BulkItemError>,
}

impl BulkOutcome {
    /// Whether every submitted item was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.failed.is_empty()
    }
}

/// Result of a summary write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryWrite {
    /// Whether the target product existed. A missing product is a matched-zero
    /// no-op, not an error.
    pub matched: bool,
}

/// Abstract document store for the inventory simulation domain.
///
/// Implemented by the MongoDB backend in production and by
/// [`MemoryStore`](crate::memory::MemoryStore) in tests.
#[async_trait]
pub trait InventoryStore: Send + Sync + 'static {
    /// Atomically reads the singleton cycle counter, creating it with value 1
    /// if absent. Returns the current cycle.
    async fn get_or_init_cycle(&self) -> Result<i64>;

    /// Atomically increments the cycle counter by 1 and returns the new value.
    async fn advance_cycle(&self) -> Result<i64>;

    /// Uniform random sample, without replacement, of up to `limit` inventory
    /// documents not yet processed in `cycle` (`lastSimulationCycle` absent or
    /// `< cycle`). Returns fewer than `limit` documents when the eligible set
    /// is smaller; an empty vec means the sweep is complete.
    async fn sample_eligible(&self, cycle: i64, limit: usize) -> Result<Vec<InventoryDocument>>;

    /// Applies recomputed documents as one best-effort batch.
    ///
    /// For each item the backend sets `storeInventory`, `lastSimulationCycle`,
    /// and `updatedAt`, with the write filter re-checking eligibility for
    /// `item.cycle`. Individual failures are collected in the outcome and do
    /// not abort siblings; only a wholesale storage failure returns `Err`.
    async fn apply_simulation(&self, updates: &[SimulatedUpdate]) -> Result<BulkOutcome>;

    /// Overwrites the product's `inventorySummary` wholesale (full replace,
    /// not merge). A missing product matches zero documents and succeeds.
    async fn write_summary(
        &self,
        product_id: &str,
        summary: &[InventorySummaryEntry],
    ) -> Result<SummaryWrite>;

    /// Pages through inventory documents in stable id order, for backfills.
    async fn scan_inventory(&self, skip: usize, limit: usize) -> Result<Vec<InventoryDocument>>;
}
