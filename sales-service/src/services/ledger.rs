//! Sales ledger: record projection plus direct audit edits.
//!
//! Every read-modify-write holds the document's in-process lock and then
//! commits through a revision compare-and-swap, so a concurrent writer in
//! another process forces a re-read instead of losing a delta.

use crate::error::{SalesError, SalesResult};
use crate::models::{
    DocumentNumber, Page, PageRequest, Record, SalesEntry, SalesFilter, SalesPatch,
};
use crate::normalizer::money;
use crate::services::locks::{DocumentGuard, DocumentLocks};
use crate::services::metrics;
use crate::services::store::LedgerStore;
use crate::services::summary::SalesSummary;
use chrono::Utc;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const DEFAULT_MAX_UPDATE_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct SalesLedger {
    store: Arc<dyn LedgerStore>,
    locks: DocumentLocks,
    max_attempts: u32,
}

impl SalesLedger {
    pub fn new(store: Arc<dyn LedgerStore>, locks: DocumentLocks, max_attempts: u32) -> Self {
        Self {
            store,
            locks,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn lock(&self, number: &DocumentNumber) -> DocumentGuard {
        self.locks.acquire(number).await
    }

    // -------------------------------------------------------------------------
    // Record projection
    // -------------------------------------------------------------------------

    /// Create the entry for a new record. A second call for the same number
    /// returns the existing entry untouched.
    #[instrument(skip(self, record), fields(document_number = %record.document.number))]
    pub async fn on_record_created(&self, record: &Record) -> SalesResult<SalesEntry> {
        let _guard = self.lock(&record.document.number).await;
        let (entry, inserted) = self
            .store
            .insert_if_absent(&SalesEntry::from_record(record, Utc::now()))
            .await?;
        if inserted {
            info!(
                document_type = %entry.document_type,
                total = %entry.total_amount,
                status = %entry.payment_status,
                "Ledger entry created"
            );
        }
        Ok(entry)
    }

    /// Propagate record fields, keeping the paid amount. Recreates the entry
    /// if an earlier sync never produced it.
    #[instrument(skip(self, record), fields(document_number = %record.document.number))]
    pub async fn on_record_updated(&self, record: &Record) -> SalesResult<SalesEntry> {
        let guard = self.lock(&record.document.number).await;
        self.project_locked(&guard, record).await
    }

    /// `on_record_updated` for a caller already holding the number's lock.
    /// The record must have been read under that same lock, otherwise an older
    /// snapshot could overwrite a newer one.
    pub async fn project_locked(
        &self,
        guard: &DocumentGuard,
        record: &Record,
    ) -> SalesResult<SalesEntry> {
        match self
            .mutate_locked(guard, |entry| {
                entry.apply_record(record);
                Ok(())
            })
            .await
        {
            Ok((entry, ())) => Ok(entry),
            Err(SalesError::NotFound(_)) => {
                let (entry, inserted) = self
                    .store
                    .insert_if_absent(&SalesEntry::from_record(record, Utc::now()))
                    .await?;
                if inserted {
                    info!("Ledger entry recreated from record update");
                    return Ok(entry);
                }
                let (entry, ()) = self
                    .mutate_locked(guard, |entry| {
                        entry.apply_record(record);
                        Ok(())
                    })
                    .await?;
                Ok(entry)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the entry for a deleted record. Absence is not an error.
    #[instrument(skip(self), fields(document_number = %number))]
    pub async fn on_record_deleted(&self, number: &DocumentNumber) -> SalesResult<bool> {
        let guard = self.lock(number).await;
        self.remove_locked(&guard).await
    }

    pub async fn remove_locked(&self, guard: &DocumentGuard) -> SalesResult<bool> {
        let removed = self.store.delete_by_number(guard.number()).await?;
        if removed {
            info!(document_number = %guard.number(), "Ledger entry deleted");
        }
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Direct operations
    // -------------------------------------------------------------------------

    pub async fn get(&self, id: &str) -> SalesResult<SalesEntry> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| SalesError::not_found(format!("Sales entry {} not found", id)))
    }

    pub async fn get_by_number(&self, number: &DocumentNumber) -> SalesResult<SalesEntry> {
        self.store.find_by_number(number).await?.ok_or_else(|| {
            SalesError::not_found(format!("No sales entry for document {}", number))
        })
    }

    pub async fn list(
        &self,
        filter: &SalesFilter,
        page: PageRequest,
    ) -> SalesResult<Page<SalesEntry>> {
        let mut entries: Vec<SalesEntry> = self
            .store
            .scan()
            .await?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| {
            match (a.date, b.date) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| a.id.cmp(&b.id))
        });
        Ok(Page::slice(entries, page))
    }

    pub async fn summary(&self) -> SalesResult<SalesSummary> {
        let entries = self.store.scan().await?;
        Ok(SalesSummary::from_entries(&entries))
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: &SalesPatch) -> SalesResult<SalesEntry> {
        for (field, value) in [("taxAmount", patch.tax_amount), ("discount", patch.discount)] {
            if value.is_some_and(|v| v < Decimal::ZERO) {
                return Err(SalesError::validation(format!("{} cannot be negative", field)));
            }
        }
        if patch
            .customer_name
            .as_deref()
            .is_some_and(|n| n.trim().is_empty())
        {
            return Err(SalesError::validation("customerName cannot be empty"));
        }

        let number = self.get(id).await?.document_number;
        let guard = self.lock(&number).await;
        let (entry, ()) = self
            .mutate_locked(&guard, |entry| {
                ensure_same_entry(entry, id)?;
                entry.apply_patch(patch);
                Ok(())
            })
            .await?;
        info!(document_number = %entry.document_number, status = %entry.payment_status, "Ledger entry updated");
        Ok(entry)
    }

    /// Manual correction of the paid accumulator.
    #[instrument(skip(self))]
    pub async fn set_paid_amount(&self, id: &str, paid_amount: Decimal) -> SalesResult<SalesEntry> {
        if paid_amount < Decimal::ZERO {
            return Err(SalesError::validation("paidAmount cannot be negative"));
        }

        let number = self.get(id).await?.document_number;
        let guard = self.lock(&number).await;
        let (entry, ()) = self
            .mutate_locked(&guard, |entry| {
                ensure_same_entry(entry, id)?;
                if entry.is_cash_sale() {
                    return Err(SalesError::validation(
                        "Cash-sale entries are always paid in full",
                    ));
                }
                entry.paid_amount = money(paid_amount);
                entry.recompute();
                Ok(())
            })
            .await?;
        info!(document_number = %entry.document_number, paid = %entry.paid_amount, "Paid amount corrected");
        Ok(entry)
    }

    /// Current entry for a number the caller has locked.
    pub async fn find_locked(&self, guard: &DocumentGuard) -> SalesResult<Option<SalesEntry>> {
        Ok(self.store.find_by_number(guard.number()).await?)
    }

    /// Add `delta` to the paid amount of the locked entry. Returns the entry
    /// and the delta actually applied.
    pub async fn apply_payment_delta(
        &self,
        guard: &DocumentGuard,
        delta: Decimal,
        floor_at_zero: bool,
    ) -> SalesResult<(SalesEntry, Decimal)> {
        self.mutate_locked(guard, |entry| {
            Ok(entry.apply_payment_delta(delta, floor_at_zero))
        })
        .await
    }

    /// Read, modify and compare-and-swap until the revision matches or the
    /// attempt budget runs out.
    async fn mutate_locked<T, F>(
        &self,
        guard: &DocumentGuard,
        mut mutate: F,
    ) -> SalesResult<(SalesEntry, T)>
    where
        F: FnMut(&mut SalesEntry) -> SalesResult<T>,
    {
        let number = guard.number();
        for attempt in 1..=self.max_attempts {
            let mut entry = self.store.find_by_number(number).await?.ok_or_else(|| {
                SalesError::not_found(format!("No sales entry for document {}", number))
            })?;
            let expected = entry.revision;
            let out = mutate(&mut entry)?;
            entry.updated_at = Utc::now();

            if self.store.replace_if_revision(&entry, expected).await? {
                entry.revision = expected + 1;
                return Ok((entry, out));
            }

            metrics::record_ledger_conflict();
            warn!(
                document_number = %number,
                attempt,
                expected_revision = expected,
                "Ledger entry changed concurrently, retrying"
            );
        }

        Err(SalesError::Conflict(format!(
            "Sales entry {} is being modified concurrently, try again",
            number
        )))
    }
}

fn ensure_same_entry(entry: &SalesEntry, id: &str) -> SalesResult<()> {
    if entry.id == id {
        Ok(())
    } else {
        Err(SalesError::not_found(format!("Sales entry {} not found", id)))
    }
}
