//! The MongoDB implementation of [`InventoryStore`].

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc, oid::ObjectId};
use mongodb::error::{ErrorKind, PartialBulkWriteResult};
use mongodb::options::{
    ClientOptions, ReturnDocument, UpdateModifications, UpdateOneModel, WriteModel,
};
use mongodb::{Client, Collection, Namespace};

use shelfsim_core::document::{
    CYCLE_KEY, CycleCounter, InventoryDocument, InventorySummaryEntry,
};
use shelfsim_core::error::{Error, Result};
use shelfsim_core::store::{
    BulkItemError, BulkOutcome, InventoryStore, SimulatedUpdate, SummaryWrite,
};

/// Connection and namespace configuration for the MongoDB backend.
///
/// Defaults follow the retail dataset's deployment: database
/// `retail-unified-commerce` with collections `inventory`, `products`, and
/// `inventory-sim-meta` (the cycle-counter singleton).
#[derive(Debug, Clone)]
pub struct MongoConfig {
    /// Connection string.
    pub uri: String,
    /// Database holding all three collections.
    pub database: String,
    /// Inventory collection name.
    pub inventory_collection: String,
    /// Products collection name.
    pub products_collection: String,
    /// Cycle-counter (meta) collection name.
    pub meta_collection: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".into(),
            database: "retail-unified-commerce".into(),
            inventory_collection: "inventory".into(),
            products_collection: "products".into(),
            meta_collection: "inventory-sim-meta".into(),
        }
    }
}

/// MongoDB-backed [`InventoryStore`].
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    config: MongoConfig,
}

impl MongoStore {
    /// Connects to the cluster described by `config`.
    ///
    /// Driver-level timeouts are bounded so no storage operation blocks
    /// indefinitely; on timeout the invocation fails and is safe to retry.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the connection string is invalid.
    pub async fn connect(config: MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| Error::storage_with_source("invalid connection string", e))?;
        options.app_name = Some("shelfsim".into());
        options.server_selection_timeout = Some(Duration::from_secs(10));
        options.connect_timeout = Some(Duration::from_secs(10));

        let client = Client::with_options(options)
            .map_err(|e| Error::storage_with_source("client construction failed", e))?;
        Ok(Self { client, config })
    }

    /// The configuration this store was built with.
    #[must_use]
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    pub(crate) fn inventory(&self) -> Collection<Document> {
        self.client
            .database(&self.config.database)
            .collection(&self.config.inventory_collection)
    }

    fn products(&self) -> Collection<Document> {
        self.client
            .database(&self.config.database)
            .collection(&self.config.products_collection)
    }

    fn meta(&self) -> Collection<CycleCounter> {
        self.client
            .database(&self.config.database)
            .collection(&self.config.meta_collection)
    }

    fn inventory_namespace(&self) -> Namespace {
        Namespace::new(&self.config.database, &self.config.inventory_collection)
    }
}

/// Filter matching documents not yet processed in `cycle`.
pub(crate) fn eligibility_filter(cycle: i64) -> Document {
    doc! {
        "$or": [
            { "lastSimulationCycle": { "$lt": cycle } },
            { "lastSimulationCycle": { "$exists": false } },
        ]
    }
}

/// Converts a document id from its wire form to the portable string form.
pub(crate) fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Converts a portable string id back to its wire form: object ids where the
/// string parses as one, plain strings otherwise.
pub(crate) fn id_to_bson(id: &str) -> Bson {
    ObjectId::parse_str(id).map_or_else(|_| Bson::String(id.to_string()), Bson::ObjectId)
}

/// Decodes a raw inventory document, normalizing driver-specific field
/// encodings (object ids, BSON datetimes) into the portable model.
pub(crate) fn decode_inventory(mut raw: Document) -> Result<InventoryDocument> {
    let id = raw
        .remove("_id")
        .ok_or_else(|| Error::serialization("inventory document missing _id"))?;
    raw.insert("_id", id_to_string(&id));

    if let Some(product_id) = raw.get("productId").cloned() {
        raw.insert("productId", id_to_string(&product_id));
    }
    if let Some(Bson::DateTime(dt)) = raw.get("updatedAt") {
        let rfc3339 = chrono::DateTime::from_timestamp_millis(dt.timestamp_millis())
            .ok_or_else(|| Error::serialization("updatedAt out of range"))?
            .to_rfc3339();
        raw.insert("updatedAt", rfc3339);
    }

    bson::from_document(raw)
        .map_err(|e| Error::serialization(format!("invalid inventory document: {e}")))
}

fn storage_err(context: &'static str) -> impl FnOnce(mongodb::error::Error) -> Error {
    move |e| Error::storage_with_source(context, e)
}

#[async_trait]
impl InventoryStore for MongoStore {
    async fn get_or_init_cycle(&self) -> Result<i64> {
        let counter = self
            .meta()
            .find_one_and_update(
                doc! { "_id": CYCLE_KEY },
                doc! { "$setOnInsert": { "currentCycle": 1 } },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(storage_err("cycle counter upsert failed"))?
            .ok_or_else(|| Error::internal("cycle counter upsert returned no document"))?;
        Ok(counter.current_cycle)
    }

    async fn advance_cycle(&self) -> Result<i64> {
        let counter = self
            .meta()
            .find_one_and_update(
                doc! { "_id": CYCLE_KEY },
                doc! { "$inc": { "currentCycle": 1 } },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(storage_err("cycle counter increment failed"))?
            .ok_or_else(|| Error::internal("cycle counter increment returned no document"))?;
        Ok(counter.current_cycle)
    }

    async fn sample_eligible(&self, cycle: i64, limit: usize) -> Result<Vec<InventoryDocument>> {
        let size = i64::try_from(limit)
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| Error::InvalidInput("sample limit must be positive".into()))?;

        let pipeline = vec![
            doc! { "$match": eligibility_filter(cycle) },
            doc! { "$sample": { "size": size } },
        ];
        let mut cursor = self
            .inventory()
            .aggregate(pipeline)
            .await
            .map_err(storage_err("eligible sample failed"))?;

        let mut batch = Vec::new();
        while let Some(raw) = cursor
            .try_next()
            .await
            .map_err(storage_err("eligible sample cursor failed"))?
        {
            batch.push(decode_inventory(raw)?);
        }
        Ok(batch)
    }

    async fn apply_simulation(&self, updates: &[SimulatedUpdate]) -> Result<BulkOutcome> {
        if updates.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let namespace = self.inventory_namespace();
        let total = updates.len() as u64;

        let mut models = Vec::with_capacity(updates.len());
        for update in updates {
            // Per-document atomic claim: re-check eligibility in the write
            // filter so overlapping runs cannot double-process.
            let mut filter = eligibility_filter(update.cycle);
            filter.insert("_id", id_to_bson(&update.id));

            let stores = bson::to_bson(&update.store_inventory)
                .map_err(|e| Error::serialization(format!("store inventory encode: {e}")))?;
            let set = doc! {
                "$set": {
                    "storeInventory": stores,
                    "lastSimulationCycle": update.cycle,
                    "updatedAt": bson::DateTime::from_millis(update.updated_at.timestamp_millis()),
                }
            };

            models.push(WriteModel::UpdateOne(
                UpdateOneModel::builder()
                    .namespace(namespace.clone())
                    .filter(filter)
                    .update(UpdateModifications::Document(set))
                    .build(),
            ));
        }

        match self.client.bulk_write(models).ordered(false).await {
            Ok(result) => {
                let applied = u64::try_from(result.matched_count).unwrap_or(0);
                Ok(BulkOutcome {
                    applied,
                    skipped: total.saturating_sub(applied),
                    failed: Vec::new(),
                })
            }
            Err(error) => match *error.kind {
                // Partial failure: siblings were still applied; collect the
                // per-item errors and report counts from the partial result.
                ErrorKind::BulkWrite(ref bulk) if !bulk.write_errors.is_empty() => {
                    let failed: Vec<BulkItemError> = bulk
                        .write_errors
                        .iter()
                        .map(|(index, write_error)| BulkItemError {
                            id: updates
                                .get(*index)
                                .map_or_else(String::new, |u| u.id.clone()),
                            message: write_error.message.clone(),
                        })
                        .collect();
                    let applied = match &bulk.partial_result {
                        Some(PartialBulkWriteResult::Summary(summary)) => {
                            u64::try_from(summary.matched_count).unwrap_or(0)
                        }
                        _ => 0,
                    };
                    Ok(BulkOutcome {
                        applied,
                        skipped: total
                            .saturating_sub(applied)
                            .saturating_sub(failed.len() as u64),
                        failed,
                    })
                }
                _ => Err(Error::storage_with_source("bulk write failed", error)),
            },
        }
    }

    async fn write_summary(
        &self,
        product_id: &str,
        summary: &[InventorySummaryEntry],
    ) -> Result<SummaryWrite> {
        let condensed = bson::to_bson(&summary)
            .map_err(|e| Error::serialization(format!("summary encode: {e}")))?;

        let result = self
            .products()
            .update_one(
                doc! { "_id": id_to_bson(product_id) },
                doc! { "$set": { "inventorySummary": condensed } },
            )
            .await
            .map_err(storage_err("summary write failed"))?;

        Ok(SummaryWrite {
            matched: result.matched_count > 0,
        })
    }

    async fn scan_inventory(&self, skip: usize, limit: usize) -> Result<Vec<InventoryDocument>> {
        let limit = i64::try_from(limit)
            .ok()
            .filter(|l| *l > 0)
            .ok_or_else(|| Error::InvalidInput("scan limit must be positive".into()))?;

        let mut cursor = self
            .inventory()
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .skip(skip as u64)
            .limit(limit)
            .await
            .map_err(storage_err("inventory scan failed"))?;

        let mut page = Vec::new();
        while let Some(raw) = cursor
            .try_next()
            .await
            .map_err(storage_err("inventory scan cursor failed"))?
        {
            page.push(decode_inventory(raw)?);
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trips_object_ids() {
        let oid = ObjectId::new();
        let portable = id_to_string(&Bson::ObjectId(oid));
        assert_eq!(portable, oid.to_hex());
        assert_eq!(id_to_bson(&portable), Bson::ObjectId(oid));
    }

    #[test]
    fn test_id_keeps_plain_strings() {
        assert_eq!(id_to_string(&Bson::String("inv-7".into())), "inv-7");
        assert_eq!(id_to_bson("inv-7"), Bson::String("inv-7".into()));
    }

    #[test]
    fn test_eligibility_filter_covers_both_branches() {
        let filter = eligibility_filter(4);
        let branches = filter.get_array("$or").unwrap();
        assert_eq!(branches.len(), 2);

        let lt = branches[0].as_document().unwrap();
        assert_eq!(
            lt.get_document("lastSimulationCycle").unwrap(),
            &doc! { "$lt": 4_i64 }
        );
        let exists = branches[1].as_document().unwrap();
        assert_eq!(
            exists.get_document("lastSimulationCycle").unwrap(),
            &doc! { "$exists": false }
        );
    }

    #[test]
    fn test_decode_normalizes_wire_encodings() {
        let oid = ObjectId::new();
        let product = ObjectId::new();
        let raw = doc! {
            "_id": oid,
            "productId": product,
            "storeInventory": [{
                "storeObjectId": "s1",
                "storeId": "S1",
                "sectionId": "A",
                "aisleId": "1",
                "shelfId": "X",
            }],
            "lastSimulationCycle": 2_i64,
            "updatedAt": bson::DateTime::from_millis(1_756_166_400_000),
        };

        let decoded = decode_inventory(raw).unwrap();
        assert_eq!(decoded.id, oid.to_hex());
        assert_eq!(decoded.product_id.as_deref(), Some(product.to_hex().as_str()));
        assert_eq!(decoded.last_simulation_cycle, Some(2));
        assert!(decoded.updated_at.is_some());
        assert_eq!(decoded.store_inventory.len(), 1);
        assert_eq!(decoded.store_inventory[0].shelf_quantity, 0);
    }

    #[test]
    fn test_decode_requires_id() {
        let raw = doc! { "productId": "p1" };
        assert!(decode_inventory(raw).is_err());
    }
}
