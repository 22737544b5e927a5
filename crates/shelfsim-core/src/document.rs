//! Document model for the inventory simulation domain.
//!
//! Field names serialize in the camelCase wire form used by the retail
//! dataset (`storeInventory`, `lastSimulationCycle`, ...), so the same
//! structs round-trip through JSON and BSON backends unchanged.
//!
//! Lifecycle: inventory and product documents are created by external
//! seeding/ingestion. The simulator only rewrites the volatile per-store
//! fields and stamps `lastSimulationCycle`/`updatedAt`; the propagator only
//! writes `inventorySummary` on products.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fixed identity key of the singleton cycle-counter document.
pub const CYCLE_KEY: &str = "cycle";

/// Per-store inventory state for one product.
///
/// The five location identifiers are immutable across simulation; everything
/// else is volatile and regenerated from scratch on every simulation pass.
/// Volatile fields default so that freshly seeded entries (location only)
/// still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInventoryEntry {
    /// Object id of the store document carrying this product.
    pub store_object_id: String,
    /// Human-readable store identifier.
    pub store_id: String,
    /// Section of the store where the product lives.
    pub section_id: String,
    /// Aisle within the section.
    pub aisle_id: String,
    /// Shelf within the aisle.
    pub shelf_id: String,

    /// Units currently on the shelf (0..=50 after simulation).
    #[serde(default)]
    pub shelf_quantity: i32,
    /// Units in the backroom (0..=60 after simulation).
    #[serde(default)]
    pub backroom_quantity: i32,
    /// Shelf quantity below which replenishment is flagged (5..=12).
    #[serde(default)]
    pub shelf_low_threshold: i32,
    /// Whether any units exist at all: `shelf + backroom > 0`.
    #[serde(default)]
    pub in_stock: bool,
    /// Whether the shelf needs replenishment: `shelf < threshold`.
    #[serde(default)]
    pub near_to_replenishment_in_shelf: bool,
    /// Predicted units consumed per week (20..=120).
    #[serde(default)]
    pub predicted_consumption_per_week: i32,
    /// Calendar date on which stock is predicted to run out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_stock_depletion: Option<NaiveDate>,
    /// Calendar date of the last restock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_restock: Option<NaiveDate>,
    /// Calendar date of the next scheduled restock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_restock: Option<NaiveDate>,
}

impl StoreInventoryEntry {
    /// Creates an entry with only its immutable location populated, as
    /// produced by dataset seeding before the first simulation pass.
    #[must_use]
    pub fn at_location(
        store_object_id: impl Into<String>,
        store_id: impl Into<String>,
        section_id: impl Into<String>,
        aisle_id: impl Into<String>,
        shelf_id: impl Into<String>,
    ) -> Self {
        Self {
            store_object_id: store_object_id.into(),
            store_id: store_id.into(),
            section_id: section_id.into(),
            aisle_id: aisle_id.into(),
            shelf_id: shelf_id.into(),
            shelf_quantity: 0,
            backroom_quantity: 0,
            shelf_low_threshold: 0,
            in_stock: false,
            near_to_replenishment_in_shelf: false,
            predicted_consumption_per_week: 0,
            predicted_stock_depletion: None,
            last_restock: None,
            next_restock: None,
        }
    }
}

/// One inventory document: the per-store stock state of a single product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDocument {
    /// Document identity.
    #[serde(rename = "_id")]
    pub id: String,
    /// Reference to the owning product document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// One entry per store carrying this product, order significant.
    #[serde(default)]
    pub store_inventory: Vec<StoreInventoryEntry>,
    /// Simulation cycle this document was last processed in.
    /// Absent means never processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_simulation_cycle: Option<i64>,
    /// Timestamp of the last simulation write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl InventoryDocument {
    /// Whether this document still needs processing in `cycle`.
    #[must_use]
    pub fn eligible_for(&self, cycle: i64) -> bool {
        self.last_simulation_cycle.is_none_or(|c| c < cycle)
    }
}

/// The condensed per-store record denormalized onto product documents.
///
/// Exactly the seven whitelisted fields, nothing more; one summary entry per
/// `storeInventory` entry, order preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummaryEntry {
    /// Object id of the store.
    pub store_object_id: String,
    /// Human-readable store identifier.
    pub store_id: String,
    /// Section of the store.
    pub section_id: String,
    /// Aisle within the section.
    pub aisle_id: String,
    /// Shelf within the aisle.
    pub shelf_id: String,
    /// Whether any units exist at that store.
    pub in_stock: bool,
    /// Whether the shelf needs replenishment at that store.
    pub near_to_replenishment_in_shelf: bool,
}

impl InventorySummaryEntry {
    /// Projects a full store entry down to its summary form.
    #[must_use]
    pub fn from_entry(entry: &StoreInventoryEntry) -> Self {
        Self {
            store_object_id: entry.store_object_id.clone(),
            store_id: entry.store_id.clone(),
            section_id: entry.section_id.clone(),
            aisle_id: entry.aisle_id.clone(),
            shelf_id: entry.shelf_id.clone(),
            in_stock: entry.in_stock,
            near_to_replenishment_in_shelf: entry.near_to_replenishment_in_shelf,
        }
    }
}

/// A product document, reduced to the fields this service touches.
///
/// The full catalog document carries many more static attributes; backends
/// must leave those untouched and overwrite only `inventorySummary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDocument {
    /// Document identity.
    #[serde(rename = "_id")]
    pub id: String,
    /// Denormalized per-store inventory state, kept eventually consistent
    /// with the owning inventory document's `storeInventory`.
    #[serde(default)]
    pub inventory_summary: Vec<InventorySummaryEntry>,
}

impl ProductDocument {
    /// Creates a product with an empty summary.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inventory_summary: Vec::new(),
        }
    }
}

/// The singleton simulation-cycle counter.
///
/// Exactly one such document exists per deployment, keyed by [`CYCLE_KEY`].
/// Created lazily with `currentCycle = 1`; incremented only when a full
/// sweep completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleCounter {
    /// Fixed identity key, always [`CYCLE_KEY`].
    #[serde(rename = "_id")]
    pub id: String,
    /// The current simulation cycle, `>= 1`.
    pub current_cycle: i64,
}
