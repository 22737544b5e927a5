//! # shelfsim-mongo
//!
//! MongoDB backend for the shelfsim inventory store.
//!
//! Maps the abstract store contract onto the official driver:
//!
//! - Cycle counter: atomic `findOneAndUpdate` upserts (`$setOnInsert`/`$inc`)
//! - Eligible batch: `$match` + `$sample` aggregation
//! - Batch application: one unordered client-level `bulkWrite`
//! - Summary propagation: `updateOne` with a wholesale `$set`
//! - Change events: a collection change stream with full-document lookup
//!
//! The bulk write path uses the `bulkWrite` command and therefore requires
//! MongoDB 8.0 or newer.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod events;
pub mod store;

pub use events::InventoryEvents;
pub use store::{MongoConfig, MongoStore};
