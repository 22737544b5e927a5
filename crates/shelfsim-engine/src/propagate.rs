//! The summary propagator: inventory → product denormalization.
//!
//! Triggered once per change event on an inventory document. The propagator
//! always regenerates the full summary from the complete current
//! `storeInventory`, never a diff, and overwrites the product's
//! `inventorySummary` wholesale. It performs no retries; redelivery is the
//! event source's responsibility. Out-of-order delivery can let a stale
//! summary overwrite a fresher one; this is accepted as eventual
//! consistency.

use std::sync::Arc;

use tracing::Instrument as _;

use shelfsim_core::change::InventoryChange;
use shelfsim_core::document::InventorySummaryEntry;
use shelfsim_core::error::Result;
use shelfsim_core::observability::propagation_span;
use shelfsim_core::store::InventoryStore;

/// Why an event produced no write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The event carried no document body (e.g. a delete).
    NoDocument,
    /// The document has no `productId` reference to propagate to.
    NoProductRef,
}

/// What one propagation invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The product's summary was overwritten.
    Synced {
        /// The product updated.
        product_id: String,
        /// Number of summary entries written.
        entries: usize,
    },
    /// The referenced product does not exist; the write matched nothing.
    ProductMissing {
        /// The dangling product reference.
        product_id: String,
    },
    /// The event required no propagation.
    Skipped(SkipReason),
}

/// The summary propagation job.
pub struct SummaryPropagator {
    store: Arc<dyn InventoryStore>,
}

impl SummaryPropagator {
    /// Creates a propagator over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Processes one change event.
    ///
    /// Malformed events (no document body) and documents without a product
    /// reference are silent no-ops by contract, not errors.
    ///
    /// # Errors
    ///
    /// Storage failures are surfaced to the caller for its own retry policy.
    pub async fn handle(&self, change: &InventoryChange) -> Result<SyncOutcome> {
        let span = propagation_span(change.operation.as_str());

        async {
            let Some(doc) = &change.full_document else {
                tracing::debug!("event carries no document, nothing to propagate");
                return Ok(SyncOutcome::Skipped(SkipReason::NoDocument));
            };
            let Some(product_id) = &doc.product_id else {
                tracing::debug!(inventory_id = %doc.id, "document has no product reference");
                return Ok(SyncOutcome::Skipped(SkipReason::NoProductRef));
            };

            // Ordered projection, one summary entry per store entry.
            let summary: Vec<InventorySummaryEntry> = doc
                .store_inventory
                .iter()
                .map(InventorySummaryEntry::from_entry)
                .collect();

            let write = self.store.write_summary(product_id, &summary).await?;
            if write.matched {
                tracing::info!(
                    product_id = %product_id,
                    entries = summary.len(),
                    database = change.database.as_deref().unwrap_or("default"),
                    "inventory summary synced"
                );
                Ok(SyncOutcome::Synced {
                    product_id: product_id.clone(),
                    entries: summary.len(),
                })
            } else {
                tracing::debug!(product_id = %product_id, "product not found, write matched nothing");
                Ok(SyncOutcome::ProductMissing {
                    product_id: product_id.clone(),
                })
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsim_core::change::ChangeOperation;
    use shelfsim_core::document::{InventoryDocument, ProductDocument, StoreInventoryEntry};
    use shelfsim_core::memory::MemoryStore;

    fn entry(store_object_id: &str, in_stock: bool) -> StoreInventoryEntry {
        StoreInventoryEntry {
            in_stock,
            near_to_replenishment_in_shelf: !in_stock,
            ..StoreInventoryEntry::at_location(store_object_id, "S1", "A", "1", "X")
        }
    }

    fn inventory_doc(product_id: Option<&str>, entries: Vec<StoreInventoryEntry>) -> InventoryDocument {
        InventoryDocument {
            id: "inv1".into(),
            product_id: product_id.map(Into::into),
            store_inventory: entries,
            last_simulation_cycle: Some(1),
            updated_at: None,
        }
    }

    fn propagator(store: &Arc<MemoryStore>) -> SummaryPropagator {
        SummaryPropagator::new(Arc::clone(store) as Arc<dyn InventoryStore>)
    }

    #[tokio::test]
    async fn test_summary_matches_store_inventory_order() {
        let store = Arc::new(MemoryStore::with_seed(1));
        store.seed_product(ProductDocument::new("p1"));

        let doc = inventory_doc(Some("p1"), vec![entry("s2", true), entry("s1", false)]);
        let change = InventoryChange::with_document(ChangeOperation::Update, doc);

        let outcome = propagator(&store).handle(&change).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Synced {
                product_id: "p1".into(),
                entries: 2
            }
        );

        let summary = store.product("p1").unwrap().inventory_summary;
        assert_eq!(summary.len(), 2);
        // Order preserved, no sorting or deduplication.
        assert_eq!(summary[0].store_object_id, "s2");
        assert_eq!(summary[1].store_object_id, "s1");
        assert!(summary[0].in_stock);
        assert!(summary[1].near_to_replenishment_in_shelf);
    }

    #[tokio::test]
    async fn test_summary_is_replaced_wholesale() {
        let store = Arc::new(MemoryStore::with_seed(1));
        store.seed_product(ProductDocument::new("p1"));
        let p = propagator(&store);

        let three = inventory_doc(
            Some("p1"),
            vec![entry("s1", true), entry("s2", true), entry("s3", true)],
        );
        p.handle(&InventoryChange::with_document(ChangeOperation::Insert, three))
            .await
            .unwrap();
        assert_eq!(store.product("p1").unwrap().inventory_summary.len(), 3);

        // A later event with fewer entries shrinks the summary: full replace,
        // not merge.
        let one = inventory_doc(Some("p1"), vec![entry("s9", false)]);
        p.handle(&InventoryChange::with_document(ChangeOperation::Replace, one))
            .await
            .unwrap();

        let summary = store.product("p1").unwrap().inventory_summary;
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].store_object_id, "s9");
    }

    #[tokio::test]
    async fn test_event_without_document_is_noop() {
        let store = Arc::new(MemoryStore::with_seed(1));
        store.seed_product(ProductDocument::new("p1"));

        let change = InventoryChange {
            operation: ChangeOperation::Update,
            full_document: None,
            database: None,
        };
        let outcome = propagator(&store).handle(&change).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NoDocument));
        assert!(store.product("p1").unwrap().inventory_summary.is_empty());
    }

    #[tokio::test]
    async fn test_document_without_product_ref_is_noop() {
        let store = Arc::new(MemoryStore::with_seed(1));
        store.seed_product(ProductDocument::new("p1"));

        let doc = inventory_doc(None, vec![entry("s1", true)]);
        let change = InventoryChange::with_document(ChangeOperation::Insert, doc);
        let outcome = propagator(&store).handle(&change).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NoProductRef));
        assert!(store.product("p1").unwrap().inventory_summary.is_empty());
    }

    #[tokio::test]
    async fn test_missing_product_is_success_not_error() {
        let store = Arc::new(MemoryStore::with_seed(1));

        let doc = inventory_doc(Some("ghost"), vec![entry("s1", true)]);
        let change = InventoryChange::with_document(ChangeOperation::Update, doc);
        let outcome = propagator(&store).handle(&change).await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::ProductMissing {
                product_id: "ghost".into()
            }
        );
    }
}
