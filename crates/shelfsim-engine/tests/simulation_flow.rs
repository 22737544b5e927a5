//! End-to-end flow tests: simulation sweeps feeding summary propagation.
//!
//! The event source is played by the test itself: after each simulation pass
//! it delivers one update event per rewritten document, in order, the way a
//! sequentially ordered change stream would.

use std::sync::Arc;

use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;

use shelfsim_core::prelude::*;
use shelfsim_engine::{BatchSimulator, SimulatorConfig, SummaryPropagator, SyncOutcome};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 26).unwrap()
}

fn seed(store: &MemoryStore, docs: usize, stores_per_doc: usize) {
    for i in 0..docs {
        let entries = (0..stores_per_doc)
            .map(|s| {
                StoreInventoryEntry::at_location(
                    format!("store-{s}"),
                    format!("S{s}"),
                    "A",
                    "1",
                    format!("X{s}"),
                )
            })
            .collect();
        store.seed_inventory(InventoryDocument {
            id: format!("inv{i:03}"),
            product_id: Some(format!("p{i:03}")),
            store_inventory: entries,
            last_simulation_cycle: None,
            updated_at: None,
        });
        store.seed_product(ProductDocument::new(format!("p{i:03}")));
    }
}

/// Replays every currently stored inventory document through the propagator,
/// as an ordered event stream would after the simulator's bulk write.
async fn deliver_events(store: &Arc<MemoryStore>, propagator: &SummaryPropagator) {
    let mut skip = 0;
    loop {
        let page = store.scan_inventory(skip, 64).await.unwrap();
        if page.is_empty() {
            break;
        }
        skip += page.len();
        for doc in page {
            let change = InventoryChange::with_document(ChangeOperation::Update, doc);
            propagator.handle(&change).await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_sweep_then_propagate_converges() {
    let store = Arc::new(MemoryStore::with_seed(2026));
    seed(&store, 25, 3);

    let simulator = BatchSimulator::new(
        Arc::clone(&store) as Arc<dyn InventoryStore>,
        SimulatorConfig { batch_size: 10 },
    );
    let propagator = SummaryPropagator::new(Arc::clone(&store) as Arc<dyn InventoryStore>);
    let mut rng = StdRng::seed_from_u64(2026);

    // Three passes of 10 clear 25 documents; the fourth rolls over.
    let mut applied = 0;
    for _ in 0..3 {
        let report = simulator.run(&mut rng, today()).await.unwrap();
        applied += report.outcome.applied;
        deliver_events(&store, &propagator).await;
    }
    assert_eq!(applied, 25);

    let report = simulator.run(&mut rng, today()).await.unwrap();
    assert!(report.rolled_over);
    assert_eq!(report.next_cycle, Some(2));

    // After event delivery, every product's summary mirrors its inventory
    // document's storeInventory: same length, same order, matching flags.
    for i in 0..25 {
        let doc = store.inventory(&format!("inv{i:03}")).unwrap();
        assert_eq!(doc.last_simulation_cycle, Some(1));

        let summary = store
            .product(&format!("p{i:03}"))
            .unwrap()
            .inventory_summary;
        assert_eq!(summary.len(), doc.store_inventory.len());
        for (entry, condensed) in doc.store_inventory.iter().zip(&summary) {
            assert_eq!(condensed, &InventorySummaryEntry::from_entry(entry));
        }
    }
}

#[tokio::test]
async fn test_consistency_is_eventual_not_immediate() {
    let store = Arc::new(MemoryStore::with_seed(9));
    seed(&store, 4, 2);

    let simulator = BatchSimulator::new(
        Arc::clone(&store) as Arc<dyn InventoryStore>,
        SimulatorConfig::default(),
    );
    let propagator = SummaryPropagator::new(Arc::clone(&store) as Arc<dyn InventoryStore>);
    let mut rng = StdRng::seed_from_u64(9);

    simulator.run(&mut rng, today()).await.unwrap();

    // Before events are delivered, the summaries are stale (still empty).
    for i in 0..4 {
        assert!(
            store
                .product(&format!("p{i:03}"))
                .unwrap()
                .inventory_summary
                .is_empty()
        );
    }

    deliver_events(&store, &propagator).await;

    for i in 0..4 {
        let summary = store
            .product(&format!("p{i:03}"))
            .unwrap()
            .inventory_summary;
        assert_eq!(summary.len(), 2);
    }
}

#[tokio::test]
async fn test_partial_bulk_failure_leaves_failed_document_eligible() {
    let store = Arc::new(MemoryStore::with_seed(4));
    seed(&store, 3, 1);
    store.fail_updates_for("inv001");

    let simulator = BatchSimulator::new(
        Arc::clone(&store) as Arc<dyn InventoryStore>,
        SimulatorConfig::default(),
    );
    let mut rng = StdRng::seed_from_u64(4);

    let report = simulator.run(&mut rng, today()).await.unwrap();
    assert_eq!(report.outcome.applied, 2);
    assert_eq!(report.outcome.failed.len(), 1);

    // The failed document is still eligible and gets picked up by the next
    // pass of the same cycle; the counter was never touched.
    assert_eq!(store.eligible_count(1), 1);
    assert_eq!(store.cycle(), Some(1));
}

#[tokio::test]
async fn test_propagation_after_manual_edit_round_trips() {
    let store = Arc::new(MemoryStore::with_seed(1));
    seed(&store, 1, 2);
    let propagator = SummaryPropagator::new(Arc::clone(&store) as Arc<dyn InventoryStore>);

    // An externally edited document (as an ops console would produce) flows
    // through the same contract.
    let mut doc = store.inventory("inv000").unwrap();
    doc.store_inventory[0].in_stock = true;
    doc.store_inventory[1].near_to_replenishment_in_shelf = true;
    store.seed_inventory(doc.clone());

    let outcome = propagator
        .handle(&InventoryChange::with_document(ChangeOperation::Replace, doc))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Synced {
            product_id: "p000".into(),
            entries: 2
        }
    );

    let summary = store.product("p000").unwrap().inventory_summary;
    assert!(summary[0].in_stock);
    assert!(summary[1].near_to_replenishment_in_shelf);
}
