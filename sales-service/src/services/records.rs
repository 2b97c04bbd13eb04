//! Record store adapter: one logical record over the legacy and V2
//! collections, with the ledger kept in step as a side effect.

use crate::error::{SalesError, SalesResult};
use crate::models::{
    DocumentFields, DocumentNumber, NewRecord, Page, PageRequest, Record, RecordChanges,
    RecordFilter, StoredRecord, SyncOperation, V2Record,
};
use crate::normalizer::{self, parse_date_and_time, parse_time};
use crate::services::dead_letter::DeadLetterLog;
use crate::services::ledger::SalesLedger;
use crate::services::locks::DocumentGuard;
use crate::services::metrics;
use crate::services::store::RecordStore;
use crate::services::summary::RecordSummary;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Intake as received, before validation.
#[derive(Debug, Clone, Default)]
pub struct RecordInput {
    pub customer_name: String,
    pub invoice_number: Option<String>,
    pub cash_sale_number: Option<String>,
    pub quotation_number: Option<String>,
    pub facilitator: String,
    pub amount: Decimal,
    pub created_by: String,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// Editable record fields. Document numbers are not editable; any supplied
/// in `document_numbers` must match the record's own.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub customer_name: Option<String>,
    pub facilitator: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub document_numbers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncReport {
    pub processed: u64,
    pub resolved: u64,
    pub failed: u64,
}

#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    ledger: SalesLedger,
    dead_letters: DeadLetterLog,
    legacy_cutoff: NaiveDate,
}

impl RecordService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ledger: SalesLedger,
        dead_letters: DeadLetterLog,
        legacy_cutoff: NaiveDate,
    ) -> Self {
        Self {
            store,
            ledger,
            dead_letters,
            legacy_cutoff,
        }
    }

    pub async fn health_check(&self) -> SalesResult<()> {
        Ok(self.store.health_check().await?)
    }

    /// Create a record, or return the existing one when its document number is
    /// already known. The flag is `true` only for a fresh insert.
    #[instrument(skip(self, input), fields(customer = %input.customer_name))]
    pub async fn create(&self, input: RecordInput) -> SalesResult<(Record, bool)> {
        let new = validate_input(input)?;
        let number = new.document.number.clone();

        if let Some(existing) = self.existing_by_number(&number).await? {
            return self.idempotent_return(existing).await;
        }

        let v2 = V2Record::new(new, Utc::now());
        if !self.store.insert_current(&v2).await? {
            // Lost an insert race on the unique number index.
            let existing = self
                .existing_by_number(&number)
                .await?
                .ok_or_else(|| SalesError::DuplicateDocument(number.clone()))?;
            return self.idempotent_return(existing).await;
        }

        let record = StoredRecord::Current(v2)
            .normalize()
            .ok_or_else(|| anyhow::anyhow!("Stored record {} has no document number", number))?;
        info!(
            record_id = %record.id,
            document_number = %number,
            document_type = %record.document.document_type,
            "Record created"
        );

        self.sync_created(&record).await;
        Ok((record, true))
    }

    pub async fn get(&self, id: &str) -> SalesResult<Option<Record>> {
        Ok(self
            .store
            .find_by_id(id)
            .await?
            .and_then(|stored| normalize_logged(&stored)))
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, id: &str, update: RecordUpdate) -> SalesResult<Option<Record>> {
        let Some(stored) = self.store.find_by_id(id).await? else {
            return Ok(None);
        };
        let Some(current) = normalize_logged(&stored) else {
            return Err(SalesError::validation(format!(
                "Record {} has no document number and cannot be edited",
                id
            )));
        };

        let changes = build_changes(&current, update)?;
        if changes.is_empty() {
            return Ok(Some(current));
        }

        if !self.store.update(id, stored.schema(), &changes).await? {
            return Ok(None);
        }
        // Read back under the ledger lock so concurrent edits project in the
        // order their reads observed the store.
        let guard = self.ledger.lock(&current.document.number).await;
        let Some(record) = self.get(id).await? else {
            return Ok(None);
        };
        info!(record_id = %id, document_number = %record.document.number, "Record updated");

        self.sync_updated(&guard, &record).await;
        Ok(Some(record))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> SalesResult<Option<Record>> {
        let Some(stored) = self.store.find_by_id(id).await? else {
            return Ok(None);
        };
        // Records without a document number are invisible, here as on reads.
        let Some(record) = normalize_logged(&stored) else {
            return Ok(None);
        };
        if !self.store.delete(id, stored.schema()).await? {
            return Ok(None);
        }
        info!(record_id = %id, document_number = %record.document.number, "Record deleted");

        self.sync_deleted(&record.id, &record.document.number).await;
        Ok(Some(record))
    }

    /// Merged, filtered and ordered across both schemas before paging.
    pub async fn list(&self, filter: &RecordFilter, page: PageRequest) -> SalesResult<Page<Record>> {
        let include_legacy = filter
            .start_date
            .map_or(true, |start| start.date_naive() < self.legacy_cutoff);
        let mut records: Vec<Record> = self
            .store
            .scan(include_legacy)
            .await?
            .iter()
            .filter_map(normalize_logged)
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(Record::list_order);
        Ok(Page::slice(records, page))
    }

    pub async fn summary(&self, now: DateTime<Utc>) -> SalesResult<RecordSummary> {
        let today = now.date_naive();
        let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        let include_legacy = week_start.min(year_start) < self.legacy_cutoff;

        let records: Vec<Record> = self
            .store
            .scan(include_legacy)
            .await?
            .iter()
            .filter_map(normalize_logged)
            .collect();
        Ok(RecordSummary::from_records(&records, today))
    }

    /// Replay failed syncs by re-deriving each ledger entry from current
    /// record state.
    #[instrument(skip(self))]
    pub async fn resync(&self, limit: usize) -> SalesResult<ResyncReport> {
        let letters = self.dead_letters.store().pending(limit).await?;
        let mut report = ResyncReport::default();

        for letter in letters {
            report.processed += 1;
            match self.rebuild_entry(&letter.record_id, &letter.document_number).await {
                Ok(()) => {
                    self.dead_letters.store().resolve(&letter.id).await?;
                    metrics::record_ledger_sync(letter.operation.as_str(), "resynced");
                    report.resolved += 1;
                }
                Err(e) => {
                    warn!(
                        dead_letter_id = %letter.id,
                        document_number = %letter.document_number,
                        error = %e,
                        "Resync attempt failed"
                    );
                    self.dead_letters
                        .store()
                        .bump_attempt(&letter.id, &e.to_string())
                        .await?;
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            resolved = report.resolved,
            failed = report.failed,
            "Ledger resync finished"
        );
        Ok(report)
    }

    async fn rebuild_entry(&self, record_id: &str, number: &DocumentNumber) -> SalesResult<()> {
        let guard = self.ledger.lock(number).await;
        let record = match self.get(record_id).await? {
            Some(record) => Some(record),
            None => self.existing_by_number(number).await?,
        };
        match record {
            Some(record) if record.document.number == *number => {
                self.ledger.project_locked(&guard, &record).await?;
            }
            _ => {
                self.ledger.remove_locked(&guard).await?;
            }
        }
        Ok(())
    }

    async fn existing_by_number(&self, number: &DocumentNumber) -> SalesResult<Option<Record>> {
        Ok(self
            .store
            .find_by_document_number(number)
            .await?
            .and_then(|stored| normalize_logged(&stored)))
    }

    async fn idempotent_return(&self, existing: Record) -> SalesResult<(Record, bool)> {
        info!(
            record_id = %existing.id,
            document_number = %existing.document.number,
            "Document number already recorded, returning existing record"
        );
        metrics::record_duplicate_intake();
        // An earlier create may have lost its ledger sync.
        self.sync_created(&existing).await;
        Ok((existing, false))
    }

    async fn sync_created(&self, record: &Record) {
        match self.ledger.on_record_created(record).await {
            Ok(_) => metrics::record_ledger_sync(SyncOperation::Created.as_str(), "ok"),
            Err(e) => {
                self.dead_letters
                    .record_failure(SyncOperation::Created, &record.id, &record.document.number, e)
                    .await
            }
        }
    }

    async fn sync_updated(&self, guard: &DocumentGuard, record: &Record) {
        match self.ledger.project_locked(guard, record).await {
            Ok(_) => metrics::record_ledger_sync(SyncOperation::Updated.as_str(), "ok"),
            Err(e) => {
                self.dead_letters
                    .record_failure(SyncOperation::Updated, &record.id, &record.document.number, e)
                    .await
            }
        }
    }

    async fn sync_deleted(&self, record_id: &str, number: &DocumentNumber) {
        match self.ledger.on_record_deleted(number).await {
            Ok(_) => metrics::record_ledger_sync(SyncOperation::Deleted.as_str(), "ok"),
            Err(e) => {
                self.dead_letters
                    .record_failure(SyncOperation::Deleted, record_id, number, e)
                    .await
            }
        }
    }
}

fn normalize_logged(stored: &StoredRecord) -> Option<Record> {
    let record = stored.normalize();
    if record.is_none() {
        debug!(record_id = stored.id(), "Skipping record without a document number");
    }
    record
}

fn validate_input(input: RecordInput) -> SalesResult<NewRecord> {
    let customer_name = input.customer_name.trim().to_string();
    if customer_name.is_empty() {
        return Err(SalesError::validation("customerName is required"));
    }
    if input.amount < Decimal::ZERO {
        return Err(SalesError::validation("amount cannot be negative"));
    }

    let document = DocumentFields {
        invoice_number: input.invoice_number.as_deref(),
        cash_sale_number: input.cash_sale_number.as_deref(),
        quotation_number: input.quotation_number.as_deref(),
    }
    .require_exactly_one()?;

    let occurred_at = match input.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(date) => parse_date_and_time(date, input.time.as_deref())
            .ok_or_else(|| SalesError::validation(format!("Unrecognised date: {}", date)))?,
        None => Utc::now(),
    };

    Ok(NewRecord {
        customer_name,
        document,
        facilitator: input.facilitator.trim().to_string(),
        amount: normalizer::money(input.amount),
        created_by: input.created_by.trim().to_string(),
        occurred_at,
    })
}

fn build_changes(current: &Record, update: RecordUpdate) -> SalesResult<RecordChanges> {
    if update
        .document_numbers
        .iter()
        .any(|n| n.trim() != current.document.number.as_str())
    {
        return Err(SalesError::validation("Document numbers cannot be changed"));
    }
    let customer_name = match update.customer_name {
        Some(name) if name.trim().is_empty() => {
            return Err(SalesError::validation("customerName cannot be empty"))
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    if update.amount.is_some_and(|a| a < Decimal::ZERO) {
        return Err(SalesError::validation("amount cannot be negative"));
    }

    let date = update.date.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let time = update.time.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let occurred_at = match (date, time) {
        (Some(date), time) => {
            // A new date without a time keeps the record's current time of day.
            let kept_time = current
                .timestamp()
                .map(|ts| ts.time().format("%H:%M:%S").to_string());
            let time = time.map(str::to_string).or(kept_time);
            Some(
                parse_date_and_time(date, time.as_deref())
                    .ok_or_else(|| SalesError::validation(format!("Unrecognised date: {}", date)))?,
            )
        }
        (None, Some(time)) => {
            let day = current.timestamp().map(|ts| ts.date_naive()).ok_or_else(|| {
                SalesError::validation("date is required when the record has no readable date")
            })?;
            let time_of_day: NaiveTime = parse_time(time)
                .ok_or_else(|| SalesError::validation(format!("Unrecognised time: {}", time)))?;
            Some(day.and_time(time_of_day).and_utc())
        }
        (None, None) => None,
    };

    Ok(RecordChanges {
        customer_name,
        facilitator: update.facilitator.map(|f| f.trim().to_string()),
        amount: update.amount.map(normalizer::money),
        occurred_at,
    })
}
