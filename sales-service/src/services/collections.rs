//! Cash collection reconciliation against ledger entries.
//!
//! A collection remembers the delta it contributed to the ledger
//! (`applied_amount`). Amending or removing it adjusts the ledger by exactly
//! that delta, under the document lock, so two edits can never compute from
//! the same stale value.

use crate::error::{SalesError, SalesResult};
use crate::models::{
    CashCollection, CollectionFilter, CollectionPatch, DocumentNumber, DocumentType,
    NewCollection, Page, PageRequest, PaymentMode,
};
use crate::normalizer::money;
use crate::services::ledger::SalesLedger;
use crate::services::locks::DocumentGuard;
use crate::services::metrics;
use crate::services::store::CollectionStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Payment intake as received.
#[derive(Debug, Clone)]
pub struct CollectionInput {
    pub customer_name: String,
    pub document_number: String,
    pub amount_paid: Decimal,
    pub mode_of_payment: PaymentMode,
    pub mobile_money_reference: Option<String>,
    pub cheque_number: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub collected_by: String,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct CashCollectionService {
    store: Arc<dyn CollectionStore>,
    ledger: SalesLedger,
}

impl CashCollectionService {
    pub fn new(store: Arc<dyn CollectionStore>, ledger: SalesLedger) -> Self {
        Self { store, ledger }
    }

    /// Record a payment and add it to the ledger entry's paid amount. Cash-sale
    /// entries are already paid; their collections are kept for audit only.
    #[instrument(skip(self, input), fields(document_number = %input.document_number))]
    pub async fn apply_payment(&self, input: CollectionInput) -> SalesResult<CashCollection> {
        let number = DocumentNumber::parse(&input.document_number)?;
        let now = Utc::now();
        let mut collection = CashCollection::new(
            NewCollection {
                customer_name: input.customer_name.trim().to_string(),
                document_number: number.clone(),
                amount_paid: money(input.amount_paid),
                mode_of_payment: input.mode_of_payment,
                mobile_money_reference: input.mobile_money_reference,
                cheque_number: input.cheque_number,
                bank_reference: input.bank_reference,
                payment_date: input.payment_date,
                collected_by: input.collected_by,
                notes: input.notes,
            },
            DocumentType::Invoice,
            now,
        );
        collection.validate()?;

        let guard = self.ledger.lock(&number).await;
        let entry = self.ledger.find_locked(&guard).await?.ok_or_else(|| {
            SalesError::not_found(format!("No sales entry for document {}", number))
        })?;
        if entry.is_cancelled() {
            return Err(SalesError::InvalidTransition(format!(
                "Sales entry {} is cancelled",
                number
            )));
        }
        collection.document_type = entry.document_type;

        if entry.is_cash_sale() {
            self.store.insert(&collection).await?;
            metrics::record_collection_event("audit_only");
            info!(collection_id = %collection.id, "Collection recorded against cash sale, ledger unchanged");
            return Ok(collection);
        }

        let (entry, applied) = self
            .ledger
            .apply_payment_delta(&guard, collection.amount_paid, false)
            .await?;
        collection.applied_amount = applied;

        if let Err(e) = self.store.insert(&collection).await {
            self.compensate(&guard, applied).await;
            return Err(e.into());
        }

        metrics::record_collection_event("applied");
        info!(
            collection_id = %collection.id,
            amount = %collection.amount_paid,
            paid = %entry.paid_amount,
            status = %entry.payment_status,
            "Payment applied"
        );
        Ok(collection)
    }

    pub async fn get(&self, id: &str) -> SalesResult<CashCollection> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| SalesError::not_found(format!("Cash collection {} not found", id)))
    }

    pub async fn list(
        &self,
        filter: &CollectionFilter,
        page: PageRequest,
    ) -> SalesResult<Page<CashCollection>> {
        let matching: Vec<CashCollection> = self
            .store
            .scan()
            .await?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();
        Ok(Page::slice(matching, page))
    }

    /// Change amount, references, date or notes. The ledger moves by
    /// `new amount - applied amount`.
    #[instrument(skip(self, patch))]
    pub async fn amend_payment(&self, id: &str, patch: CollectionPatch) -> SalesResult<CashCollection> {
        if patch.amount_paid.is_some_and(|a| a <= Decimal::ZERO) {
            return Err(SalesError::validation("amountPaid must be greater than zero"));
        }

        let (guard, current) = self.lock_collection(id).await?;
        current.ensure_amendable()?;

        let mut updated = current.clone();
        updated.apply_patch(
            &CollectionPatch {
                amount_paid: patch.amount_paid.map(money),
                ..patch
            },
            Utc::now(),
        );
        updated.validate()?;

        let mut moved = Decimal::ZERO;
        if updated.amount_paid != current.amount_paid {
            match self.ledger.find_locked(&guard).await? {
                Some(entry) => {
                    let target = if entry.is_cash_sale() {
                        Decimal::ZERO
                    } else {
                        updated.amount_paid
                    };
                    let delta = target - current.applied_amount;
                    if !delta.is_zero() {
                        let (_, applied) =
                            self.ledger.apply_payment_delta(&guard, delta, true).await?;
                        moved = applied;
                    }
                }
                None => warn!(
                    collection_id = %id,
                    document_number = %current.document_number,
                    "Sales entry missing, amended collection not reconciled"
                ),
            }
        }
        updated.applied_amount = current.applied_amount + moved;

        if let Err(e) = self.persist(&updated).await {
            self.compensate(&guard, moved).await;
            return Err(e);
        }

        metrics::record_collection_event("amended");
        info!(
            collection_id = %id,
            amount = %updated.amount_paid,
            applied = %updated.applied_amount,
            "Collection amended"
        );
        Ok(updated)
    }

    /// Delete a collection and take back what it contributed.
    #[instrument(skip(self))]
    pub async fn reverse_payment(&self, id: &str) -> SalesResult<CashCollection> {
        let (guard, mut collection) = self.lock_collection(id).await?;
        let reversed = self.reverse_applied(&guard, &mut collection).await?;

        match self.store.delete(id).await {
            Ok(true) => {}
            Ok(false) => {
                self.compensate(&guard, -reversed).await;
                return Err(SalesError::not_found(format!("Cash collection {} not found", id)));
            }
            Err(e) => {
                self.compensate(&guard, -reversed).await;
                return Err(e.into());
            }
        }

        metrics::record_collection_event("reversed");
        info!(collection_id = %id, reversed = %reversed, "Collection deleted");
        Ok(collection)
    }

    pub async fn verify(&self, id: &str, verified_by: &str) -> SalesResult<CashCollection> {
        let (_guard, mut collection) = self.lock_collection(id).await?;
        collection.verify(verified_by, Utc::now())?;
        self.persist(&collection).await?;
        metrics::record_collection_event("verified");
        info!(collection_id = %id, verified_by, "Collection verified");
        Ok(collection)
    }

    pub async fn deposit(&self, id: &str) -> SalesResult<CashCollection> {
        let (_guard, mut collection) = self.lock_collection(id).await?;
        collection.deposit(Utc::now())?;
        self.persist(&collection).await?;
        metrics::record_collection_event("deposited");
        info!(collection_id = %id, "Collection deposited");
        Ok(collection)
    }

    /// Cancel and reverse, keeping the collection for audit.
    pub async fn cancel(&self, id: &str) -> SalesResult<CashCollection> {
        let (guard, mut collection) = self.lock_collection(id).await?;
        collection.cancel(Utc::now())?;
        let reversed = self.reverse_applied(&guard, &mut collection).await?;

        if let Err(e) = self.persist(&collection).await {
            self.compensate(&guard, -reversed).await;
            return Err(e);
        }
        metrics::record_collection_event("cancelled");
        info!(collection_id = %id, reversed = %reversed, "Collection cancelled");
        Ok(collection)
    }

    /// Lock the collection's document and re-read it under the lock.
    async fn lock_collection(&self, id: &str) -> SalesResult<(DocumentGuard, CashCollection)> {
        let number = self.get(id).await?.document_number;
        let guard = self.ledger.lock(&number).await;
        let collection = self.get(id).await?;
        Ok((guard, collection))
    }

    /// Subtract `applied_amount` from the ledger and zero it. Returns the
    /// amount taken back. A vanished ledger entry is logged and skipped.
    async fn reverse_applied(
        &self,
        guard: &DocumentGuard,
        collection: &mut CashCollection,
    ) -> SalesResult<Decimal> {
        if collection.applied_amount.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let reversed = match self
            .ledger
            .apply_payment_delta(guard, -collection.applied_amount, true)
            .await
        {
            Ok((_, applied)) => -applied,
            Err(SalesError::NotFound(_)) => {
                warn!(
                    collection_id = %collection.id,
                    document_number = %collection.document_number,
                    "Sales entry already gone, nothing to reverse"
                );
                Decimal::ZERO
            }
            Err(e) => return Err(e),
        };
        collection.applied_amount = Decimal::ZERO;
        Ok(reversed)
    }

    async fn persist(&self, collection: &CashCollection) -> SalesResult<()> {
        if self.store.replace(collection).await? {
            Ok(())
        } else {
            Err(SalesError::not_found(format!(
                "Cash collection {} not found",
                collection.id
            )))
        }
    }

    /// Undo a ledger delta after the collection write failed.
    async fn compensate(&self, guard: &DocumentGuard, applied: Decimal) {
        if applied.is_zero() {
            return;
        }
        if let Err(e) = self.ledger.apply_payment_delta(guard, -applied, true).await {
            error!(
                document_number = %guard.number(),
                delta = %applied,
                error = %e,
                "Failed to roll back ledger delta after collection write failure"
            );
        }
    }
}
