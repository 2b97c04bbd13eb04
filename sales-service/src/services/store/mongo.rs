use super::{CollectionStore, DeadLetterStore, LedgerStore, RecordStore};
use crate::models::record::{id_filter, legacy_number_filter, number_filter};
use crate::models::{
    CashCollection, DocumentNumber, LegacyRecord, RecordChanges, RecordSchema, SalesEntry,
    StoredRecord, SyncDeadLetter, V2Record,
};
use crate::services::database::MongoDb;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Collection,
};

const DUPLICATE_KEY: i32 = 11000;

pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[derive(Clone)]
pub struct MongoRecordStore {
    legacy: Collection<LegacyRecord>,
    current: Collection<V2Record>,
    db: MongoDb,
}

impl MongoRecordStore {
    pub fn new(db: &MongoDb) -> Self {
        Self {
            legacy: db.legacy_records(),
            current: db.records_v2(),
            db: db.clone(),
        }
    }
}

#[async_trait]
impl RecordStore for MongoRecordStore {
    async fn insert_current(&self, record: &V2Record) -> anyhow::Result<bool> {
        match self.current.insert_one(record, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e).context("Failed to insert record"),
        }
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<StoredRecord>> {
        if let Some(record) = self
            .current
            .find_one(doc! { "_id": id }, None)
            .await
            .context("Failed to query records_v2 by id")?
        {
            return Ok(Some(StoredRecord::Current(record)));
        }
        let legacy = self
            .legacy
            .find_one(id_filter(id), None)
            .await
            .context("Failed to query legacy records by id")?;
        Ok(legacy.map(StoredRecord::Legacy))
    }

    async fn find_by_document_number(
        &self,
        number: &DocumentNumber,
    ) -> anyhow::Result<Option<StoredRecord>> {
        if let Some(record) = self
            .current
            .find_one(number_filter(number.as_str()), None)
            .await
            .context("Failed to query records_v2 by document number")?
        {
            return Ok(Some(StoredRecord::Current(record)));
        }
        let legacy = self
            .legacy
            .find_one(legacy_number_filter(number.as_str()), None)
            .await
            .context("Failed to query legacy records by document number")?;
        Ok(legacy.map(StoredRecord::Legacy))
    }

    async fn update(
        &self,
        id: &str,
        schema: RecordSchema,
        changes: &RecordChanges,
    ) -> anyhow::Result<bool> {
        let update = changes.to_set_document(schema, Utc::now());
        let result = match schema {
            RecordSchema::Current => self.current.update_one(doc! { "_id": id }, update, None).await,
            RecordSchema::Legacy => self.legacy.update_one(id_filter(id), update, None).await,
        }
        .with_context(|| format!("Failed to update record {}", id))?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: &str, schema: RecordSchema) -> anyhow::Result<bool> {
        let result = match schema {
            RecordSchema::Current => self.current.delete_one(doc! { "_id": id }, None).await,
            RecordSchema::Legacy => self.legacy.delete_one(id_filter(id), None).await,
        }
        .with_context(|| format!("Failed to delete record {}", id))?;
        Ok(result.deleted_count > 0)
    }

    async fn scan(&self, include_legacy: bool) -> anyhow::Result<Vec<StoredRecord>> {
        let mut out: Vec<StoredRecord> = self
            .current
            .find(None, None)
            .await
            .context("Failed to scan records_v2")?
            .try_collect::<Vec<_>>()
            .await
            .context("Failed to read records_v2 cursor")?
            .into_iter()
            .map(StoredRecord::Current)
            .collect();

        if include_legacy {
            // Raw documents so one malformed legacy row cannot fail the scan.
            let raw = self.legacy.clone_with_type::<Document>();
            let docs: Vec<Document> = raw
                .find(None, None)
                .await
                .context("Failed to scan legacy records")?
                .try_collect()
                .await
                .context("Failed to read legacy records cursor")?;
            for document in docs {
                match bson::from_document::<LegacyRecord>(document) {
                    Ok(record) => out.push(StoredRecord::Legacy(record)),
                    Err(e) => tracing::warn!(error = %e, "Skipping unreadable legacy record"),
                }
            }
        }

        Ok(out)
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.db
            .health_check()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

#[derive(Clone)]
pub struct MongoLedgerStore {
    sales: Collection<SalesEntry>,
}

impl MongoLedgerStore {
    pub fn new(db: &MongoDb) -> Self {
        Self { sales: db.sales() }
    }
}

#[async_trait]
impl LedgerStore for MongoLedgerStore {
    async fn insert_if_absent(&self, entry: &SalesEntry) -> anyhow::Result<(SalesEntry, bool)> {
        let filter = doc! { "documentNumber": entry.document_number.as_str() };
        let on_insert = bson::to_document(entry).context("Failed to encode sales entry")?;
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let stored = match self
            .sales
            .find_one_and_update(filter.clone(), doc! { "$setOnInsert": on_insert }, options)
            .await
        {
            Ok(stored) => stored,
            // Two concurrent upserts on one number: the loser reads the winner.
            Err(e) if is_duplicate_key(&e) => self
                .sales
                .find_one(filter, None)
                .await
                .context("Failed to read sales entry after upsert race")?,
            Err(e) => return Err(e).context("Failed to upsert sales entry"),
        };

        let stored = stored.with_context(|| {
            format!("Sales entry {} missing after upsert", entry.document_number)
        })?;
        let inserted = stored.id == entry.id;
        Ok((stored, inserted))
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<SalesEntry>> {
        self.sales
            .find_one(doc! { "_id": id }, None)
            .await
            .context("Failed to query sales by id")
    }

    async fn find_by_number(&self, number: &DocumentNumber) -> anyhow::Result<Option<SalesEntry>> {
        self.sales
            .find_one(doc! { "documentNumber": number.as_str() }, None)
            .await
            .context("Failed to query sales by document number")
    }

    async fn replace_if_revision(
        &self,
        entry: &SalesEntry,
        expected_revision: i64,
    ) -> anyhow::Result<bool> {
        let mut next = entry.clone();
        next.revision = expected_revision + 1;
        let result = self
            .sales
            .replace_one(
                doc! {
                    "documentNumber": entry.document_number.as_str(),
                    "revision": expected_revision,
                },
                &next,
                None,
            )
            .await
            .with_context(|| format!("Failed to replace sales entry {}", entry.document_number))?;
        Ok(result.matched_count == 1)
    }

    async fn delete_by_number(&self, number: &DocumentNumber) -> anyhow::Result<bool> {
        let result = self
            .sales
            .delete_one(doc! { "documentNumber": number.as_str() }, None)
            .await
            .with_context(|| format!("Failed to delete sales entry {}", number))?;
        Ok(result.deleted_count > 0)
    }

    async fn scan(&self) -> anyhow::Result<Vec<SalesEntry>> {
        let options = FindOptions::builder().sort(doc! { "date": -1, "_id": 1 }).build();
        self.sales
            .find(None, options)
            .await
            .context("Failed to scan sales")?
            .try_collect()
            .await
            .context("Failed to read sales cursor")
    }
}

#[derive(Clone)]
pub struct MongoCollectionStore {
    collections: Collection<CashCollection>,
}

impl MongoCollectionStore {
    pub fn new(db: &MongoDb) -> Self {
        Self {
            collections: db.cash_collections(),
        }
    }
}

#[async_trait]
impl CollectionStore for MongoCollectionStore {
    async fn insert(&self, collection: &CashCollection) -> anyhow::Result<()> {
        self.collections
            .insert_one(collection, None)
            .await
            .context("Failed to insert cash collection")?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<CashCollection>> {
        self.collections
            .find_one(doc! { "_id": id }, None)
            .await
            .context("Failed to query cash collection")
    }

    async fn replace(&self, collection: &CashCollection) -> anyhow::Result<bool> {
        let result = self
            .collections
            .replace_one(doc! { "_id": collection.id.as_str() }, collection, None)
            .await
            .with_context(|| format!("Failed to replace cash collection {}", collection.id))?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let result = self
            .collections
            .delete_one(doc! { "_id": id }, None)
            .await
            .with_context(|| format!("Failed to delete cash collection {}", id))?;
        Ok(result.deleted_count > 0)
    }

    async fn scan(&self) -> anyhow::Result<Vec<CashCollection>> {
        let options = FindOptions::builder()
            .sort(doc! { "paymentDate": -1, "_id": 1 })
            .build();
        self.collections
            .find(None, options)
            .await
            .context("Failed to scan cash collections")?
            .try_collect()
            .await
            .context("Failed to read cash collections cursor")
    }
}

#[derive(Clone)]
pub struct MongoDeadLetterStore {
    letters: Collection<SyncDeadLetter>,
}

impl MongoDeadLetterStore {
    pub fn new(db: &MongoDb) -> Self {
        Self {
            letters: db.dead_letters(),
        }
    }
}

#[async_trait]
impl DeadLetterStore for MongoDeadLetterStore {
    async fn record(&self, letter: &SyncDeadLetter) -> anyhow::Result<()> {
        self.letters
            .insert_one(letter, None)
            .await
            .context("Failed to write sync dead letter")?;
        Ok(())
    }

    async fn pending(&self, limit: usize) -> anyhow::Result<Vec<SyncDeadLetter>> {
        let options = FindOptions::builder()
            .sort(doc! { "occurredAt": 1 })
            .limit(limit as i64)
            .build();
        self.letters
            .find(doc! { "resolvedAt": null }, options)
            .await
            .context("Failed to query pending dead letters")?
            .try_collect()
            .await
            .context("Failed to read dead letter cursor")
    }

    async fn resolve(&self, id: &str) -> anyhow::Result<()> {
        self.letters
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "resolvedAt": bson::DateTime::from_chrono(Utc::now()) } },
                None,
            )
            .await
            .with_context(|| format!("Failed to resolve dead letter {}", id))?;
        Ok(())
    }

    async fn bump_attempt(&self, id: &str, error: &str) -> anyhow::Result<()> {
        self.letters
            .update_one(
                doc! { "_id": id },
                doc! { "$inc": { "attempts": 1 }, "$set": { "error": error } },
                None,
            )
            .await
            .with_context(|| format!("Failed to update dead letter {}", id))?;
        Ok(())
    }
}
