//! In-process stores. Document numbers compare trimmed and a V2 number is
//! unique across all three fields, as the MongoDB lookups and indexes enforce.

use super::{CollectionStore, DeadLetterStore, LedgerStore, RecordStore};
use crate::models::{
    CashCollection, DocumentNumber, LegacyRecord, RecordChanges, RecordSchema, SalesEntry,
    StoredRecord, SyncDeadLetter, V2Record,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn holds_number(fields: [Option<&str>; 3], number: &DocumentNumber) -> bool {
    fields
        .iter()
        .flatten()
        .any(|value| value.trim() == number.as_str())
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    legacy: Mutex<Vec<LegacyRecord>>,
    current: Mutex<Vec<V2Record>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-migration rows only ever arrive through data loads.
    pub fn seed_legacy(&self, record: LegacyRecord) {
        lock(&self.legacy).push(record);
    }

    pub fn legacy_snapshot(&self, id: &str) -> Option<LegacyRecord> {
        lock(&self.legacy).iter().find(|r| r.id == id).cloned()
    }

    pub fn current_count(&self) -> usize {
        lock(&self.current).len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert_current(&self, record: &V2Record) -> anyhow::Result<bool> {
        let mut current = lock(&self.current);
        let taken = [
            record.invoice_number.as_deref(),
            record.cash_sale_number.as_deref(),
            record.quotation_number.as_deref(),
        ]
        .iter()
        .flatten()
        .any(|number| {
            current.iter().any(|existing| {
                [
                    existing.invoice_number.as_deref(),
                    existing.cash_sale_number.as_deref(),
                    existing.quotation_number.as_deref(),
                ]
                .contains(&Some(*number))
            })
        });
        if taken {
            return Ok(false);
        }
        current.push(record.clone());
        Ok(true)
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<StoredRecord>> {
        if let Some(r) = lock(&self.current).iter().find(|r| r.id == id) {
            return Ok(Some(StoredRecord::Current(r.clone())));
        }
        Ok(lock(&self.legacy)
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .map(StoredRecord::Legacy))
    }

    async fn find_by_document_number(
        &self,
        number: &DocumentNumber,
    ) -> anyhow::Result<Option<StoredRecord>> {
        let current = lock(&self.current)
            .iter()
            .find(|r| {
                holds_number(
                    [
                        r.invoice_number.as_deref(),
                        r.cash_sale_number.as_deref(),
                        r.quotation_number.as_deref(),
                    ],
                    number,
                )
            })
            .cloned();
        if let Some(r) = current {
            return Ok(Some(StoredRecord::Current(r)));
        }
        Ok(lock(&self.legacy)
            .iter()
            .find(|r| {
                holds_number(
                    [
                        r.invoice_number.as_deref(),
                        r.cash_sale_number.as_deref(),
                        r.quotation_number.as_deref(),
                    ],
                    number,
                )
            })
            .cloned()
            .map(StoredRecord::Legacy))
    }

    async fn update(
        &self,
        id: &str,
        schema: RecordSchema,
        changes: &RecordChanges,
    ) -> anyhow::Result<bool> {
        match schema {
            RecordSchema::Current => {
                let mut current = lock(&self.current);
                let Some(record) = current.iter_mut().find(|r| r.id == id) else {
                    return Ok(false);
                };
                changes.apply_to_current(record, Utc::now());
            }
            RecordSchema::Legacy => {
                let mut legacy = lock(&self.legacy);
                let Some(record) = legacy.iter_mut().find(|r| r.id == id) else {
                    return Ok(false);
                };
                changes.apply_to_legacy(record);
            }
        }
        Ok(true)
    }

    async fn delete(&self, id: &str, schema: RecordSchema) -> anyhow::Result<bool> {
        let removed = match schema {
            RecordSchema::Current => {
                let mut current = lock(&self.current);
                let before = current.len();
                current.retain(|r| r.id != id);
                before != current.len()
            }
            RecordSchema::Legacy => {
                let mut legacy = lock(&self.legacy);
                let before = legacy.len();
                legacy.retain(|r| r.id != id);
                before != legacy.len()
            }
        };
        Ok(removed)
    }

    async fn scan(&self, include_legacy: bool) -> anyhow::Result<Vec<StoredRecord>> {
        let mut out: Vec<StoredRecord> = lock(&self.current)
            .iter()
            .cloned()
            .map(StoredRecord::Current)
            .collect();
        if include_legacy {
            out.extend(
                lock(&self.legacy)
                    .iter()
                    .cloned()
                    .map(StoredRecord::Legacy),
            );
        }
        Ok(out)
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Ledger keyed by document number. `set_unavailable(true)` makes every call
/// fail, which is how tests exercise the best-effort sync path.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    entries: Mutex<HashMap<DocumentNumber, SalesEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("ledger store unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_if_absent(&self, entry: &SalesEntry) -> anyhow::Result<(SalesEntry, bool)> {
        self.check()?;
        let mut entries = lock(&self.entries);
        if let Some(existing) = entries.get(&entry.document_number) {
            return Ok((existing.clone(), false));
        }
        entries.insert(entry.document_number.clone(), entry.clone());
        Ok((entry.clone(), true))
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<SalesEntry>> {
        self.check()?;
        Ok(lock(&self.entries).values().find(|e| e.id == id).cloned())
    }

    async fn find_by_number(&self, number: &DocumentNumber) -> anyhow::Result<Option<SalesEntry>> {
        self.check()?;
        Ok(lock(&self.entries).get(number).cloned())
    }

    async fn replace_if_revision(
        &self,
        entry: &SalesEntry,
        expected_revision: i64,
    ) -> anyhow::Result<bool> {
        self.check()?;
        let mut entries = lock(&self.entries);
        match entries.get_mut(&entry.document_number) {
            Some(stored) if stored.revision == expected_revision => {
                let mut next = entry.clone();
                next.revision = expected_revision + 1;
                *stored = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_by_number(&self, number: &DocumentNumber) -> anyhow::Result<bool> {
        self.check()?;
        Ok(lock(&self.entries).remove(number).is_some())
    }

    async fn scan(&self) -> anyhow::Result<Vec<SalesEntry>> {
        self.check()?;
        Ok(lock(&self.entries).values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryCollectionStore {
    collections: Mutex<HashMap<String, CashCollection>>,
}

impl InMemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CollectionStore for InMemoryCollectionStore {
    async fn insert(&self, collection: &CashCollection) -> anyhow::Result<()> {
        lock(&self.collections).insert(collection.id.clone(), collection.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<CashCollection>> {
        Ok(lock(&self.collections).get(id).cloned())
    }

    async fn replace(&self, collection: &CashCollection) -> anyhow::Result<bool> {
        let mut collections = lock(&self.collections);
        match collections.get_mut(&collection.id) {
            Some(stored) => {
                *stored = collection.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        Ok(lock(&self.collections).remove(id).is_some())
    }

    async fn scan(&self) -> anyhow::Result<Vec<CashCollection>> {
        let mut all: Vec<CashCollection> = lock(&self.collections).values().cloned().collect();
        all.sort_by(|a, b| {
            b.payment_date
                .cmp(&a.payment_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(all)
    }
}

#[derive(Default)]
pub struct InMemoryDeadLetterStore {
    letters: Mutex<Vec<SyncDeadLetter>>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<SyncDeadLetter> {
        lock(&self.letters).clone()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn record(&self, letter: &SyncDeadLetter) -> anyhow::Result<()> {
        lock(&self.letters).push(letter.clone());
        Ok(())
    }

    async fn pending(&self, limit: usize) -> anyhow::Result<Vec<SyncDeadLetter>> {
        let mut pending: Vec<SyncDeadLetter> = lock(&self.letters)
            .iter()
            .filter(|l| l.resolved_at.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|l| l.occurred_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn resolve(&self, id: &str) -> anyhow::Result<()> {
        if let Some(letter) = lock(&self.letters).iter_mut().find(|l| l.id == id) {
            letter.resolved_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn bump_attempt(&self, id: &str, error: &str) -> anyhow::Result<()> {
        if let Some(letter) = lock(&self.letters).iter_mut().find(|l| l.id == id) {
            letter.attempts += 1;
            letter.error = error.to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentRef, DocumentType, NewRecord};
    use rust_decimal::Decimal;

    fn v2(document_type: DocumentType, number: &str) -> V2Record {
        let now = Utc::now();
        V2Record::new(
            NewRecord {
                customer_name: "Acme".into(),
                document: DocumentRef::new(document_type, DocumentNumber::parse(number).unwrap()),
                facilitator: String::new(),
                amount: Decimal::new(100, 0),
                created_by: "clerk".into(),
                occurred_at: now,
            },
            now,
        )
    }

    #[tokio::test]
    async fn test_number_is_unique_across_fields() {
        let store = InMemoryRecordStore::new();

        assert!(store.insert_current(&v2(DocumentType::Invoice, "N-1")).await.unwrap());
        assert!(!store.insert_current(&v2(DocumentType::CashSale, "N-1")).await.unwrap());
        assert_eq!(store.current_count(), 1);
    }

    #[tokio::test]
    async fn test_padded_legacy_number_is_found() {
        let store = InMemoryRecordStore::new();
        let raw = mongodb::bson::doc! { "_id": "legacy-1", "invoiceNumber": "INV-1 ", "amount": 5_i32 };
        store.seed_legacy(mongodb::bson::from_document(raw).unwrap());

        let found = store
            .find_by_document_number(&DocumentNumber::parse("INV-1").unwrap())
            .await
            .unwrap();

        assert_eq!(found.map(|r| r.id().to_string()), Some("legacy-1".to_string()));
    }
}
