//! Inventory change events from a MongoDB change stream.
//!
//! Equivalent of a collection trigger with full-document lookup enabled:
//! insert, update, and replace events arrive with the complete post-change
//! document; deletes carry no document and are filtered out here. Event
//! ordering within the stream is the server's; the driver resumes the stream
//! automatically on resumable errors.

use futures::StreamExt;
use mongodb::bson::Document;
use mongodb::change_stream::ChangeStream;
use mongodb::change_stream::event::{ChangeStreamEvent, OperationType};
use mongodb::options::FullDocumentType;

use shelfsim_core::change::{ChangeOperation, InventoryChange};
use shelfsim_core::error::{Error, Result};

use crate::store::{MongoStore, decode_inventory};

/// A live stream of inventory change events.
pub struct InventoryEvents {
    stream: ChangeStream<ChangeStreamEvent<Document>>,
}

impl MongoStore {
    /// Opens a change stream over the inventory collection.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the stream cannot be opened (change
    /// streams require a replica set or sharded cluster).
    pub async fn watch_inventory(&self) -> Result<InventoryEvents> {
        let stream = self
            .inventory()
            .watch()
            .full_document(FullDocumentType::UpdateLookup)
            .await
            .map_err(|e| Error::storage_with_source("change stream open failed", e))?;
        Ok(InventoryEvents { stream })
    }
}

impl InventoryEvents {
    /// Waits for the next propagation-relevant event.
    ///
    /// Returns `Ok(None)` when the stream closes. Events other than
    /// insert/update/replace are skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the stream fails unresumably.
    pub async fn next_change(&mut self) -> Result<Option<InventoryChange>> {
        while let Some(event) = self.stream.next().await {
            let event =
                event.map_err(|e| Error::storage_with_source("change stream read failed", e))?;

            let operation = match event.operation_type {
                OperationType::Insert => ChangeOperation::Insert,
                OperationType::Update => ChangeOperation::Update,
                OperationType::Replace => ChangeOperation::Replace,
                _ => continue,
            };

            let full_document = event.full_document.map(decode_inventory).transpose()?;
            let database = event.ns.map(|ns| ns.db);

            return Ok(Some(InventoryChange {
                operation,
                full_document,
                database,
            }));
        }
        Ok(None)
    }
}
