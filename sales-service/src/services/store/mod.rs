//! Persistence seams. `mongo` backs the running service; `memory` backs tests
//! and local experiments.

pub mod memory;
pub mod mongo;

use crate::models::{
    CashCollection, DocumentNumber, RecordChanges, RecordSchema, SalesEntry, StoredRecord,
    SyncDeadLetter, V2Record,
};
use async_trait::async_trait;

pub use memory::{
    InMemoryCollectionStore, InMemoryDeadLetterStore, InMemoryLedgerStore, InMemoryRecordStore,
};
pub use mongo::{MongoCollectionStore, MongoDeadLetterStore, MongoLedgerStore, MongoRecordStore};

/// Both record collections behind one interface.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert into the V2 collection. `Ok(false)` when the document number is
    /// already taken.
    async fn insert_current(&self, record: &V2Record) -> anyhow::Result<bool>;

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<StoredRecord>>;

    /// Match against all three identifier fields in both collections.
    async fn find_by_document_number(
        &self,
        number: &DocumentNumber,
    ) -> anyhow::Result<Option<StoredRecord>>;

    async fn update(
        &self,
        id: &str,
        schema: RecordSchema,
        changes: &RecordChanges,
    ) -> anyhow::Result<bool>;

    async fn delete(&self, id: &str, schema: RecordSchema) -> anyhow::Result<bool>;

    /// Every record, V2 first. Legacy is skipped when `include_legacy` is false.
    async fn scan(&self, include_legacy: bool) -> anyhow::Result<Vec<StoredRecord>>;

    async fn health_check(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomic insert-if-absent on `documentNumber`. Returns the stored entry
    /// and whether this call created it.
    async fn insert_if_absent(&self, entry: &SalesEntry) -> anyhow::Result<(SalesEntry, bool)>;

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<SalesEntry>>;

    async fn find_by_number(&self, number: &DocumentNumber) -> anyhow::Result<Option<SalesEntry>>;

    /// Compare-and-swap on `revision`. The stored revision becomes
    /// `expected_revision + 1`. `Ok(false)` when another writer got there first.
    async fn replace_if_revision(
        &self,
        entry: &SalesEntry,
        expected_revision: i64,
    ) -> anyhow::Result<bool>;

    async fn delete_by_number(&self, number: &DocumentNumber) -> anyhow::Result<bool>;

    async fn scan(&self) -> anyhow::Result<Vec<SalesEntry>>;
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn insert(&self, collection: &CashCollection) -> anyhow::Result<()>;

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<CashCollection>>;

    async fn replace(&self, collection: &CashCollection) -> anyhow::Result<bool>;

    async fn delete(&self, id: &str) -> anyhow::Result<bool>;

    /// Newest payment first.
    async fn scan(&self) -> anyhow::Result<Vec<CashCollection>>;
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn record(&self, letter: &SyncDeadLetter) -> anyhow::Result<()>;

    /// Unresolved letters, oldest first.
    async fn pending(&self, limit: usize) -> anyhow::Result<Vec<SyncDeadLetter>>;

    async fn resolve(&self, id: &str) -> anyhow::Result<()>;

    async fn bump_attempt(&self, id: &str, error: &str) -> anyhow::Result<()>;
}
