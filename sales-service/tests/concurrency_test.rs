//! Ordering and contention: slow record reads racing record edits, and ledger
//! writers in another process bumping the revision underneath us.

mod common;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use common::{send, state_over, TestResponse};
use rust_decimal::Decimal;
use sales_service::models::{
    DocumentNumber, RecordChanges, RecordSchema, SalesEntry, StoredRecord, V2Record,
};
use sales_service::services::store::{
    InMemoryCollectionStore, InMemoryDeadLetterStore, InMemoryLedgerStore, InMemoryRecordStore,
    LedgerStore, RecordStore,
};
use sales_service::services::RecordUpdate;
use sales_service::{build_router, AppState, Stores};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Record store whose N-th `find_by_id` after `arm` takes its snapshot and
/// then answers late, like a slow network round trip.
#[derive(Default)]
struct SlowReadRecordStore {
    inner: InMemoryRecordStore,
    calls: AtomicUsize,
    slow_call: AtomicUsize,
    stalled: Notify,
}

impl SlowReadRecordStore {
    fn arm(&self, nth_call: usize) {
        self.calls.store(0, Ordering::SeqCst);
        self.slow_call.store(nth_call, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for SlowReadRecordStore {
    async fn insert_current(&self, record: &V2Record) -> anyhow::Result<bool> {
        self.inner.insert_current(record).await
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<StoredRecord>> {
        let snapshot = self.inner.find_by_id(id).await?;
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.slow_call.load(Ordering::SeqCst) {
            self.stalled.notify_one();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(snapshot)
    }

    async fn find_by_document_number(
        &self,
        number: &DocumentNumber,
    ) -> anyhow::Result<Option<StoredRecord>> {
        self.inner.find_by_document_number(number).await
    }

    async fn update(
        &self,
        id: &str,
        schema: RecordSchema,
        changes: &RecordChanges,
    ) -> anyhow::Result<bool> {
        self.inner.update(id, schema, changes).await
    }

    async fn delete(&self, id: &str, schema: RecordSchema) -> anyhow::Result<bool> {
        self.inner.delete(id, schema).await
    }

    async fn scan(&self, include_legacy: bool) -> anyhow::Result<Vec<StoredRecord>> {
        self.inner.scan(include_legacy).await
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Ledger store where another process slips in a 10.00 payment between our
/// read and our compare-and-swap, `interferences` times.
#[derive(Default)]
struct ContendedLedgerStore {
    inner: InMemoryLedgerStore,
    interferences: AtomicU32,
}

impl ContendedLedgerStore {
    fn interfere(&self, times: u32) {
        self.interferences.store(times, Ordering::SeqCst);
    }

    async fn foreign_payment(&self, number: &DocumentNumber) -> anyhow::Result<()> {
        if let Some(mut entry) = self.inner.find_by_number(number).await? {
            let revision = entry.revision;
            entry.apply_payment_delta(Decimal::new(1000, 2), false);
            self.inner.replace_if_revision(&entry, revision).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for ContendedLedgerStore {
    async fn insert_if_absent(&self, entry: &SalesEntry) -> anyhow::Result<(SalesEntry, bool)> {
        self.inner.insert_if_absent(entry).await
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<SalesEntry>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_number(&self, number: &DocumentNumber) -> anyhow::Result<Option<SalesEntry>> {
        self.inner.find_by_number(number).await
    }

    async fn replace_if_revision(
        &self,
        entry: &SalesEntry,
        expected_revision: i64,
    ) -> anyhow::Result<bool> {
        let interfering = self
            .interferences
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if interfering {
            self.foreign_payment(&entry.document_number).await?;
        }
        self.inner.replace_if_revision(entry, expected_revision).await
    }

    async fn delete_by_number(&self, number: &DocumentNumber) -> anyhow::Result<bool> {
        self.inner.delete_by_number(number).await
    }

    async fn scan(&self) -> anyhow::Result<Vec<SalesEntry>> {
        self.inner.scan().await
    }
}

fn stores(records: Arc<dyn RecordStore>, ledger: Arc<dyn LedgerStore>) -> Stores {
    Stores {
        records,
        ledger,
        collections: Arc::new(InMemoryCollectionStore::new()),
        dead_letters: Arc::new(InMemoryDeadLetterStore::new()),
    }
}

async fn create_invoice(state: &AppState, number: &str, amount: &str) -> Value {
    let response = send(
        &build_router(state.clone()),
        Method::POST,
        "/records",
        Some(json!({
            "customerName": "Acme Ltd",
            "invoiceNumber": number,
            "amount": amount,
            "date": "2024-03-10"
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    response.body
}

async fn pay(state: &AppState, number: &str, amount: &str) -> TestResponse {
    send(
        &build_router(state.clone()),
        Method::POST,
        "/cash-collections",
        Some(json!({
            "customerName": "Acme Ltd",
            "documentNumber": number,
            "amountPaid": amount,
            "modeOfPayment": "cash"
        })),
    )
    .await
}

fn amount_update(amount: i64) -> RecordUpdate {
    RecordUpdate {
        amount: Some(Decimal::new(amount, 0)),
        ..Default::default()
    }
}

#[tokio::test]
async fn slow_read_back_cannot_project_a_stale_record() {
    common::init_tracing();
    let records = Arc::new(SlowReadRecordStore::default());
    let state = state_over(stores(records.clone(), Arc::new(InMemoryLedgerStore::new())));
    let record = create_invoice(&state, "INV-1", "50").await;
    let id = record["id"].as_str().unwrap().to_string();

    // The first edit's read-back (its second lookup) is the slow one.
    records.arm(2);
    let first = {
        let service = state.records.clone();
        let id = id.clone();
        tokio::spawn(async move { service.update(&id, amount_update(100)).await })
    };
    records.stalled.notified().await;

    let second = state.records.update(&id, amount_update(200)).await.unwrap();
    first.await.unwrap().unwrap();

    let number = DocumentNumber::parse("INV-1").unwrap();
    let stored = state.records.get(&id).await.unwrap().unwrap();
    let entry = state.ledger.get_by_number(&number).await.unwrap();

    assert_eq!(second.unwrap().amount, Decimal::new(20000, 2));
    assert_eq!(stored.amount, Decimal::new(20000, 2));
    assert_eq!(entry.amount, stored.amount, "ledger diverged from its source record");
    assert_eq!(entry.total_amount, Decimal::new(20000, 2));
    assert_eq!(entry.balance_due, Decimal::new(20000, 2));

    // Replaying the current record is a no-op for the amounts.
    let replayed = state.ledger.on_record_updated(&stored).await.unwrap();
    assert_eq!(replayed.total_amount, entry.total_amount);
    assert_eq!(replayed.revision, entry.revision + 1);
}

#[tokio::test]
async fn lost_revision_race_is_retried_without_double_applying() {
    common::init_tracing();
    let ledger = Arc::new(ContendedLedgerStore::default());
    let state = state_over(stores(Arc::new(InMemoryRecordStore::new()), ledger.clone()));
    create_invoice(&state, "INV-2", "1000").await;

    ledger.interfere(1);
    let response = pay(&state, "INV-2", "400").await;

    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    assert_eq!(response.body["appliedAmount"], "400.00");

    // Our 400 and the foreign 10 each land exactly once.
    let entry = state
        .ledger
        .get_by_number(&DocumentNumber::parse("INV-2").unwrap())
        .await
        .unwrap();
    assert_eq!(entry.paid_amount, Decimal::new(41000, 2));
    assert_eq!(entry.balance_due, Decimal::new(59000, 2));
    assert_eq!(entry.revision, 2);
}

#[tokio::test]
async fn exhausted_retries_surface_as_conflict() {
    common::init_tracing();
    let ledger = Arc::new(ContendedLedgerStore::default());
    let state = state_over(stores(Arc::new(InMemoryRecordStore::new()), ledger.clone()));
    create_invoice(&state, "INV-3", "1000").await;

    ledger.interfere(u32::MAX);
    let response = pay(&state, "INV-3", "400").await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["code"], "conflict");

    ledger.interfere(0);
    let collections = send(
        &build_router(state.clone()),
        Method::GET,
        "/cash-collections?documentNumber=INV-3",
        None,
    )
    .await;
    assert_eq!(collections.body["total"], 0);

    // Only the foreign writer's payments reached the entry.
    let entry = state
        .ledger
        .get_by_number(&DocumentNumber::parse("INV-3").unwrap())
        .await
        .unwrap();
    assert_eq!(entry.paid_amount, Decimal::new(5000, 2));
}
