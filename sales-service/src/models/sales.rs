//! Ledger entry: the authoritative financial state of one document number.

use super::document::{DocumentNumber, DocumentType};
use super::record::Record;
use super::{contains_ci, within_range};
use crate::normalizer::money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SALES_COLLECTION: &str = "sales";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            "cancelled" | "canceled" => Ok(PaymentStatus::Cancelled),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// Status from totals alone. Never yields `Cancelled`.
pub fn derive_status(total: Decimal, paid: Decimal) -> PaymentStatus {
    let balance = total - paid;
    if balance <= Decimal::ZERO && total > Decimal::ZERO {
        PaymentStatus::Paid
    } else if paid > Decimal::ZERO && balance > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub document_number: DocumentNumber,
    pub document_type: DocumentType,
    pub customer_name: String,
    #[serde(
        default,
        with = "super::optional_chrono_datetime_as_bson_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<DateTime<Utc>>,
    pub amount: Decimal,
    pub tax_amount: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub payment_status: PaymentStatus,
    pub facilitator: String,
    #[serde(default)]
    pub source_record_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub revision: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl SalesEntry {
    /// Projection of a freshly created record. Cash sales start fully paid.
    pub fn from_record(record: &Record, now: DateTime<Utc>) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4().to_string(),
            document_number: record.document.number.clone(),
            document_type: record.document.document_type,
            customer_name: record.customer_name.clone(),
            date: record.timestamp(),
            amount: money(record.amount),
            tax_amount: Decimal::ZERO,
            discount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            balance_due: Decimal::ZERO,
            payment_status: PaymentStatus::Pending,
            facilitator: record.facilitator.clone(),
            source_record_id: Some(record.id.clone()),
            notes: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        entry.recompute();
        entry
    }

    pub fn is_cash_sale(&self) -> bool {
        self.document_type == DocumentType::CashSale
    }

    pub fn is_cancelled(&self) -> bool {
        self.payment_status == PaymentStatus::Cancelled
    }

    /// Re-derive total, balance and status from the stored inputs.
    pub fn recompute(&mut self) {
        self.total_amount = money(self.amount + self.tax_amount - self.discount);
        if self.is_cash_sale() && !self.is_cancelled() {
            self.paid_amount = self.total_amount;
        }
        self.paid_amount = money(self.paid_amount);
        self.balance_due = self.total_amount - self.paid_amount;
        if !self.is_cancelled() {
            self.payment_status = derive_status(self.total_amount, self.paid_amount);
        }
    }

    /// Propagate source-record fields. `paid_amount` is kept.
    pub fn apply_record(&mut self, record: &Record) {
        self.customer_name = record.customer_name.clone();
        self.date = record.timestamp();
        self.amount = money(record.amount);
        self.facilitator = record.facilitator.clone();
        self.source_record_id = Some(record.id.clone());
        self.recompute();
    }

    /// Add `delta` to the paid accumulator and return the delta actually
    /// applied, which differs from the request only when flooring at zero.
    pub fn apply_payment_delta(&mut self, delta: Decimal, floor_at_zero: bool) -> Decimal {
        let before = self.paid_amount;
        let mut after = money(before + delta);
        if floor_at_zero && after < Decimal::ZERO {
            after = Decimal::ZERO;
        }
        self.paid_amount = after;
        self.recompute();
        after - before
    }

    pub fn set_cancelled(&mut self, cancelled: bool) {
        if cancelled {
            self.payment_status = PaymentStatus::Cancelled;
        } else if self.is_cancelled() {
            self.payment_status = PaymentStatus::Pending;
        }
        self.recompute();
    }

    pub fn apply_patch(&mut self, patch: &SalesPatch) {
        if let Some(name) = &patch.customer_name {
            self.customer_name = name.clone();
        }
        if let Some(facilitator) = &patch.facilitator {
            self.facilitator = facilitator.clone();
        }
        if let Some(tax) = patch.tax_amount {
            self.tax_amount = money(tax);
        }
        if let Some(discount) = patch.discount {
            self.discount = money(discount);
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone()).filter(|n| !n.is_empty());
        }
        match patch.cancelled {
            Some(cancelled) => self.set_cancelled(cancelled),
            None => self.recompute(),
        }
    }
}

/// Direct edits to a ledger entry.
#[derive(Debug, Clone, Default)]
pub struct SalesPatch {
    pub customer_name: Option<String>,
    pub facilitator: Option<String>,
    pub tax_amount: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub notes: Option<String>,
    pub cancelled: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct SalesFilter {
    pub document_type: Option<DocumentType>,
    pub status: Option<PaymentStatus>,
    pub customer: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl SalesFilter {
    pub fn matches(&self, entry: &SalesEntry) -> bool {
        if self.document_type.is_some_and(|t| t != entry.document_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != entry.payment_status) {
            return false;
        }
        if let Some(customer) = self.customer.as_deref().filter(|c| !c.is_empty()) {
            if !contains_ci(&entry.customer_name, customer) {
                return false;
            }
        }
        if let Some(term) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let hit = contains_ci(&entry.customer_name, term)
                || contains_ci(&entry.facilitator, term)
                || contains_ci(entry.document_number.as_str(), term)
                || entry.notes.as_deref().is_some_and(|n| contains_ci(n, term));
            if !hit {
                return false;
            }
        }
        within_range(entry.date, self.start_date, self.end_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentRef;
    use crate::normalizer::NormalizedDate;
    use proptest::prelude::*;

    fn record(document_type: DocumentType, number: &str, amount: i64) -> Record {
        Record {
            id: format!("rec-{}", number),
            customer_name: "Acme".into(),
            document: DocumentRef::new(document_type, DocumentNumber::parse(number).unwrap()),
            facilitator: "Jo".into(),
            amount: Decimal::from(amount),
            created_by: "clerk".into(),
            occurred: NormalizedDate::parsed(Utc::now()),
            created_at: None,
        }
    }

    fn assert_invariants(entry: &SalesEntry) {
        assert_eq!(
            entry.total_amount,
            entry.amount + entry.tax_amount - entry.discount
        );
        assert_eq!(entry.balance_due, entry.total_amount - entry.paid_amount);
    }

    #[test]
    fn test_cash_sale_created_fully_paid() {
        let entry = SalesEntry::from_record(&record(DocumentType::CashSale, "CS-1", 500), Utc::now());
        assert_eq!(entry.paid_amount, Decimal::from(500));
        assert_eq!(entry.balance_due, Decimal::ZERO);
        assert_eq!(entry.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_invoice_created_pending() {
        let entry = SalesEntry::from_record(&record(DocumentType::Invoice, "INV-1", 1000), Utc::now());
        assert_eq!(entry.paid_amount, Decimal::ZERO);
        assert_eq!(entry.balance_due, Decimal::from(1000));
        assert_eq!(entry.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_record_update_keeps_paid_amount() {
        let mut entry = SalesEntry::from_record(&record(DocumentType::Invoice, "INV-2", 1000), Utc::now());
        entry.apply_payment_delta(Decimal::from(400), false);
        entry.apply_record(&record(DocumentType::Invoice, "INV-2", 1200));
        assert_eq!(entry.paid_amount, Decimal::from(400));
        assert_eq!(entry.balance_due, Decimal::from(800));
        assert_eq!(entry.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_floor_at_zero_reports_applied_delta() {
        let mut entry = SalesEntry::from_record(&record(DocumentType::Invoice, "INV-3", 1000), Utc::now());
        entry.apply_payment_delta(Decimal::from(100), false);
        let applied = entry.apply_payment_delta(Decimal::from(-300), true);
        assert_eq!(applied, Decimal::from(-100));
        assert_eq!(entry.paid_amount, Decimal::ZERO);
    }

    #[test]
    fn test_cancelled_is_sticky_until_cleared() {
        let mut entry = SalesEntry::from_record(&record(DocumentType::Invoice, "INV-4", 1000), Utc::now());
        entry.set_cancelled(true);
        entry.apply_payment_delta(Decimal::from(1000), false);
        assert_eq!(entry.payment_status, PaymentStatus::Cancelled);
        entry.set_cancelled(false);
        assert_eq!(entry.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_cash_sale_paid_tracks_total() {
        let mut entry = SalesEntry::from_record(&record(DocumentType::CashSale, "CS-2", 500), Utc::now());
        entry.apply_patch(&SalesPatch {
            tax_amount: Some(Decimal::from(50)),
            ..Default::default()
        });
        assert_eq!(entry.total_amount, Decimal::from(550));
        assert_eq!(entry.paid_amount, Decimal::from(550));
        assert_eq!(entry.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_zero_total_is_pending() {
        assert_eq!(derive_status(Decimal::ZERO, Decimal::ZERO), PaymentStatus::Pending);
        assert_eq!(derive_status(Decimal::from(-5), Decimal::ZERO), PaymentStatus::Pending);
    }

    proptest! {
        #[test]
        fn prop_status_derivation(total in -10_000i64..10_000, paid in 0i64..20_000) {
            let total = Decimal::new(total, 2);
            let paid = Decimal::new(paid, 2);
            let balance = total - paid;
            let expected = if balance <= Decimal::ZERO && total > Decimal::ZERO {
                PaymentStatus::Paid
            } else if paid > Decimal::ZERO && balance > Decimal::ZERO {
                PaymentStatus::Partial
            } else {
                PaymentStatus::Pending
            };
            prop_assert_eq!(derive_status(total, paid), expected);
            prop_assert_ne!(derive_status(total, paid), PaymentStatus::Cancelled);
        }

        #[test]
        fn prop_invariants_hold_after_mutations(
            amount in 0i64..1_000_000,
            ops in proptest::collection::vec((0u8..4, 0i64..500_000), 0..20),
        ) {
            let mut entry = SalesEntry::from_record(
                &record(DocumentType::Invoice, "INV-P", 0),
                Utc::now(),
            );
            entry.amount = Decimal::new(amount, 2);
            entry.recompute();
            for (op, value) in ops {
                let value = Decimal::new(value, 2);
                match op {
                    0 => { entry.apply_payment_delta(value, false); }
                    1 => { entry.apply_payment_delta(-value, true); }
                    2 => entry.apply_patch(&SalesPatch { tax_amount: Some(value), ..Default::default() }),
                    _ => entry.apply_patch(&SalesPatch { discount: Some(value), ..Default::default() }),
                }
                assert_invariants(&entry);
                prop_assert!(entry.paid_amount >= Decimal::ZERO);
            }
        }
    }
}
