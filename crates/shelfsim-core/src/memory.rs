//! In-memory store backend for tests and the demo harness.
//!
//! Thread-safe via `RwLock`. Not suitable for production. Sampling draws
//! from a seedable RNG so flows replay deterministically, and individual
//! document updates can be failure-injected to exercise bulk partial-failure
//! handling.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;

use crate::document::{InventoryDocument, InventorySummaryEntry, ProductDocument};
use crate::error::{Error, Result};
use crate::store::{BulkItemError, BulkOutcome, InventoryStore, SimulatedUpdate, SummaryWrite};

/// In-memory implementation of [`InventoryStore`].
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    cycle: Option<i64>,
    // BTreeMaps for stable scan order.
    inventory: BTreeMap<String, InventoryDocument>,
    products: BTreeMap<String, ProductDocument>,
    rng: StdRng,
    failing_updates: HashSet<String>,
}

impl MemoryStore {
    /// Creates an empty store with a nondeterministic sampling seed.
    #[must_use]
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Creates an empty store whose sampling is deterministic for `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            inner: RwLock::new(Inner {
                cycle: None,
                inventory: BTreeMap::new(),
                products: BTreeMap::new(),
                rng,
                failing_updates: HashSet::new(),
            }),
        }
    }

    /// Inserts (or replaces) an inventory document.
    pub fn seed_inventory(&self, document: InventoryDocument) {
        let mut inner = self.write();
        inner.inventory.insert(document.id.clone(), document);
    }

    /// Inserts (or replaces) a product document.
    pub fn seed_product(&self, product: ProductDocument) {
        let mut inner = self.write();
        inner.products.insert(product.id.clone(), product);
    }

    /// Makes every future update of `id` fail inside bulk application,
    /// simulating a per-item write error.
    pub fn fail_updates_for(&self, id: impl Into<String>) {
        self.write().failing_updates.insert(id.into());
    }

    /// Returns the inventory document with `id`, if present.
    #[must_use]
    pub fn inventory(&self, id: &str) -> Option<InventoryDocument> {
        self.read().inventory.get(id).cloned()
    }

    /// Returns the product document with `id`, if present.
    #[must_use]
    pub fn product(&self, id: &str) -> Option<ProductDocument> {
        self.read().products.get(id).cloned()
    }

    /// Current value of the cycle counter, `None` if never created.
    #[must_use]
    pub fn cycle(&self) -> Option<i64> {
        self.read().cycle
    }

    /// Number of documents still eligible in `cycle`.
    #[must_use]
    pub fn eligible_count(&self, cycle: i64) -> usize {
        self.read()
            .inventory
            .values()
            .filter(|d| d.eligible_for(cycle))
            .count()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn get_or_init_cycle(&self) -> Result<i64> {
        let mut inner = self.write();
        let cycle = *inner.cycle.get_or_insert(1);
        Ok(cycle)
    }

    async fn advance_cycle(&self) -> Result<i64> {
        let mut inner = self.write();
        // Incrementing an absent counter creates it at 1, matching the
        // upsert-$inc semantics of the MongoDB backend.
        let next = inner.cycle.unwrap_or(0) + 1;
        inner.cycle = Some(next);
        Ok(next)
    }

    async fn sample_eligible(&self, cycle: i64, limit: usize) -> Result<Vec<InventoryDocument>> {
        let mut inner = self.write();
        let eligible: Vec<InventoryDocument> = inner
            .inventory
            .values()
            .filter(|d| d.eligible_for(cycle))
            .cloned()
            .collect();
        Ok(eligible.into_iter().choose_multiple(&mut inner.rng, limit))
    }

    async fn apply_simulation(&self, updates: &[SimulatedUpdate]) -> Result<BulkOutcome> {
        let mut inner = self.write();
        let mut outcome = BulkOutcome::default();

        for update in updates {
            if inner.failing_updates.contains(&update.id) {
                outcome.failed.push(BulkItemError {
                    id: update.id.clone(),
                    message: "injected write failure".into(),
                });
                continue;
            }

            match inner.inventory.get_mut(&update.id) {
                // Write filter re-checks eligibility (per-document claim).
                Some(doc) if doc.eligible_for(update.cycle) => {
                    doc.store_inventory = update.store_inventory.clone();
                    doc.last_simulation_cycle = Some(update.cycle);
                    doc.updated_at = Some(update.updated_at);
                    outcome.applied += 1;
                }
                _ => outcome.skipped += 1,
            }
        }

        Ok(outcome)
    }

    async fn write_summary(
        &self,
        product_id: &str,
        summary: &[InventorySummaryEntry],
    ) -> Result<SummaryWrite> {
        let mut inner = self.write();
        match inner.products.get_mut(product_id) {
            Some(product) => {
                product.inventory_summary = summary.to_vec();
                Ok(SummaryWrite { matched: true })
            }
            None => Ok(SummaryWrite { matched: false }),
        }
    }

    async fn scan_inventory(&self, skip: usize, limit: usize) -> Result<Vec<InventoryDocument>> {
        if limit == 0 {
            return Err(Error::InvalidInput("scan limit must be positive".into()));
        }
        let inner = self.read();
        Ok(inner
            .inventory
            .values()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CYCLE_KEY, CycleCounter, StoreInventoryEntry};
    use chrono::Utc;

    fn seeded_doc(id: &str) -> InventoryDocument {
        InventoryDocument {
            id: id.into(),
            product_id: Some(format!("product-{id}")),
            store_inventory: vec![StoreInventoryEntry::at_location("s1", "S1", "A", "1", "X")],
            last_simulation_cycle: None,
            updated_at: None,
        }
    }

    fn update_for(id: &str, cycle: i64) -> SimulatedUpdate {
        SimulatedUpdate {
            id: id.into(),
            store_inventory: vec![StoreInventoryEntry::at_location("s1", "S1", "A", "1", "X")],
            cycle,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cycle_counter_created_lazily_at_one() {
        let store = MemoryStore::with_seed(1);
        assert_eq!(store.cycle(), None);

        assert_eq!(store.get_or_init_cycle().await.unwrap(), 1);
        // Second read does not re-initialize.
        assert_eq!(store.get_or_init_cycle().await.unwrap(), 1);
        assert_eq!(store.cycle(), Some(1));

        // The singleton wire shape the backends persist.
        let counter = CycleCounter {
            id: CYCLE_KEY.into(),
            current_cycle: 1,
        };
        assert_eq!(counter.current_cycle, 1);
    }

    #[tokio::test]
    async fn test_advance_cycle_increments_by_one() {
        let store = MemoryStore::with_seed(1);
        store.get_or_init_cycle().await.unwrap();
        assert_eq!(store.advance_cycle().await.unwrap(), 2);
        assert_eq!(store.advance_cycle().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_or_init_is_race_safe() {
        let store = std::sync::Arc::new(MemoryStore::with_seed(1));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.get_or_init_cycle().await },
            ));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }
        assert_eq!(store.cycle(), Some(1));
    }

    #[tokio::test]
    async fn test_sample_is_bounded_and_eligible_only() {
        let store = MemoryStore::with_seed(42);
        for i in 0..20 {
            let mut doc = seeded_doc(&format!("inv{i:02}"));
            if i < 5 {
                doc.last_simulation_cycle = Some(1); // already processed
            }
            store.seed_inventory(doc);
        }

        let sample = store.sample_eligible(1, 10).await.unwrap();
        assert_eq!(sample.len(), 10);
        assert!(sample.iter().all(|d| d.eligible_for(1)));

        // Fewer eligible than the limit: return them all.
        let sample = store.sample_eligible(1, 100).await.unwrap();
        assert_eq!(sample.len(), 15);
    }

    #[tokio::test]
    async fn test_sampling_is_deterministic_per_seed() {
        let ids = |seed| async move {
            let store = MemoryStore::with_seed(seed);
            for i in 0..50 {
                store.seed_inventory(seeded_doc(&format!("inv{i:02}")));
            }
            let mut ids: Vec<String> = store
                .sample_eligible(1, 5)
                .await
                .unwrap()
                .into_iter()
                .map(|d| d.id)
                .collect();
            ids.sort();
            ids
        };

        assert_eq!(ids(7).await, ids(7).await);
    }

    #[tokio::test]
    async fn test_apply_skips_already_claimed_documents() {
        let store = MemoryStore::with_seed(1);
        let mut doc = seeded_doc("inv1");
        doc.last_simulation_cycle = Some(2);
        store.seed_inventory(doc);
        store.seed_inventory(seeded_doc("inv2"));

        let outcome = store
            .apply_simulation(&[update_for("inv1", 2), update_for("inv2", 2)])
            .await
            .unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.failed.is_empty());
        assert_eq!(store.inventory("inv2").unwrap().last_simulation_cycle, Some(2));
    }

    #[tokio::test]
    async fn test_bulk_partial_failure_does_not_abort_siblings() {
        let store = MemoryStore::with_seed(1);
        store.seed_inventory(seeded_doc("inv1"));
        store.seed_inventory(seeded_doc("inv2"));
        store.seed_inventory(seeded_doc("inv3"));
        store.fail_updates_for("inv2");

        let outcome = store
            .apply_simulation(&[
                update_for("inv1", 1),
                update_for("inv2", 1),
                update_for("inv3", 1),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].id, "inv2");
        assert!(!outcome.is_clean());

        assert_eq!(store.inventory("inv1").unwrap().last_simulation_cycle, Some(1));
        assert_eq!(store.inventory("inv2").unwrap().last_simulation_cycle, None);
        assert_eq!(store.inventory("inv3").unwrap().last_simulation_cycle, Some(1));
    }

    #[tokio::test]
    async fn test_write_summary_missing_product_is_noop() {
        let store = MemoryStore::with_seed(1);
        let write = store.write_summary("ghost", &[]).await.unwrap();
        assert!(!write.matched);
    }

    #[tokio::test]
    async fn test_scan_pages_in_stable_order() {
        let store = MemoryStore::with_seed(1);
        for i in 0..7 {
            store.seed_inventory(seeded_doc(&format!("inv{i}")));
        }

        let first = store.scan_inventory(0, 3).await.unwrap();
        let second = store.scan_inventory(3, 3).await.unwrap();
        let third = store.scan_inventory(6, 3).await.unwrap();

        let ids: Vec<&str> = first
            .iter()
            .chain(&second)
            .chain(&third)
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(ids, ["inv0", "inv1", "inv2", "inv3", "inv4", "inv5", "inv6"]);

        assert!(store.scan_inventory(0, 0).await.is_err());
    }
}
