//! Change events delivered to the summary propagator.
//!
//! One event is delivered per inventory-document mutation. The event source
//! (a change stream in production, direct construction in tests) is
//! responsible for ordering and redelivery-on-failure; the propagator itself
//! never retries. Deletes carry no full document and are ignored by contract.

use serde::{Deserialize, Serialize};

use crate::document::InventoryDocument;

/// The mutation kinds the propagator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    /// A new inventory document was inserted.
    Insert,
    /// An existing inventory document was partially updated.
    Update,
    /// An existing inventory document was replaced wholesale.
    Replace,
}

impl ChangeOperation {
    /// Wire name of the operation, as it appears in event payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Replace => "replace",
        }
    }
}

/// One change event for an inventory document.
///
/// `full_document` is the complete post-change document, not a diff: the
/// propagator always regenerates the whole summary from the current
/// `storeInventory`. A missing document (e.g. the document was deleted
/// between the change and the full-document lookup) makes the event a no-op.
#[derive(Debug, Clone)]
pub struct InventoryChange {
    /// Which mutation produced this event.
    pub operation: ChangeOperation,
    /// The complete post-change document, when available.
    pub full_document: Option<InventoryDocument>,
    /// Logical database the event originated from, when known.
    pub database: Option<String>,
}

impl InventoryChange {
    /// Convenience constructor for an event carrying a full document.
    #[must_use]
    pub fn with_document(operation: ChangeOperation, document: InventoryDocument) -> Self {
        Self {
            operation,
            full_document: Some(document),
            database: None,
        }
    }
}
