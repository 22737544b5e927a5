//! # shelfsim-core
//!
//! Core abstractions for the shelfsim inventory simulation service.
//!
//! This crate provides the foundational types and traits used across all
//! shelfsim components:
//!
//! - **Document Model**: Inventory, product, and cycle-counter documents
//! - **Store Contract**: The abstract document-store interface every backend implements
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Structured-logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `shelfsim-core` is the **only** crate allowed to define shared primitives.
//! The simulation engine and the storage backends interact exclusively through
//! the contracts defined here.
//!
//! ## Example
//!
//! ```rust
//! use shelfsim_core::prelude::*;
//!
//! // In-memory backend, as used by tests and the demo harness.
//! let store = MemoryStore::with_seed(7);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod change;
pub mod document;
pub mod error;
pub mod memory;
pub mod observability;
pub mod store;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use shelfsim_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::change::{ChangeOperation, InventoryChange};
    pub use crate::document::{
        CYCLE_KEY, CycleCounter, InventoryDocument, InventorySummaryEntry, ProductDocument,
        StoreInventoryEntry,
    };
    pub use crate::error::{Error, Result};
    pub use crate::memory::MemoryStore;
    pub use crate::store::{
        BulkItemError, BulkOutcome, InventoryStore, SimulatedUpdate, SummaryWrite,
    };
}
