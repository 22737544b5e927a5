//! # shelfsim-engine
//!
//! The simulation engine for shelfsim: the jobs behind the retail demo's
//! "living" inventory.
//!
//! - **Cycle Tracker**: owns the singleton counter recording the current
//!   simulation cycle
//! - **Batch Simulator**: rewrites a bounded random batch of inventory
//!   documents with freshly randomized, internally consistent stock state
//! - **Summary Propagator**: denormalizes per-store stock flags onto product
//!   documents after every inventory mutation
//!
//! ## Architecture
//!
//! Both jobs are stateless, externally triggered units of work: the
//! simulator runs to completion once per timer firing, the propagator once
//! per change-event delivery. All shared mutable state lives in the store.
//! One full sweep, during which every inventory document is simulated
//! exactly once, is a *cycle*; exhaustion of the eligible set rolls the
//! cycle over.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use shelfsim_core::prelude::*;
//! use shelfsim_engine::{BatchSimulator, SimulatorConfig};
//!
//! # async fn demo() -> shelfsim_core::error::Result<()> {
//! let store = Arc::new(MemoryStore::with_seed(7));
//! let simulator = BatchSimulator::new(Arc::clone(&store) as Arc<dyn InventoryStore>,
//!     SimulatorConfig::default());
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let report = simulator.run(&mut rng, chrono::Utc::now().date_naive()).await?;
//! assert!(report.rolled_over); // empty store: sweep complete immediately
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod cycle;
pub mod propagate;
pub mod simulate;

pub use cycle::CycleTracker;
pub use propagate::{SkipReason, SummaryPropagator, SyncOutcome};
pub use simulate::{BatchSimulator, SimulationReport, SimulatorConfig};
