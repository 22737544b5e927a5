//! The cycle tracker: ownership of the singleton simulation-cycle counter.
//!
//! The counter is never held as in-process shared state; every access goes
//! through the store's atomic upsert/increment operations, so independent
//! stateless invocations (including concurrent ones) observe a consistent
//! value.

use std::sync::Arc;

use shelfsim_core::error::Result;
use shelfsim_core::store::InventoryStore;

/// Read/advance access to the simulation-cycle counter.
#[derive(Clone)]
pub struct CycleTracker {
    store: Arc<dyn InventoryStore>,
}

impl CycleTracker {
    /// Creates a tracker over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Returns the current cycle, creating the counter at 1 if absent.
    ///
    /// # Errors
    ///
    /// Propagates storage errors; there are no other failure modes.
    pub async fn current(&self) -> Result<i64> {
        self.store.get_or_init_cycle().await
    }

    /// Advances to the next cycle and returns its number.
    ///
    /// Called exactly once per sweep, when the eligible set is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates storage errors; there are no other failure modes.
    pub async fn advance(&self) -> Result<i64> {
        let next = self.store.advance_cycle().await?;
        tracing::info!(next_cycle = next, "cycle counter advanced");
        Ok(next)
    }
}
