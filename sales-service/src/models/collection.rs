//! Cash collections: payment events applied against a ledger entry.

use super::document::{DocumentNumber, DocumentType};
use super::{contains_ci, within_range};
use crate::error::SalesError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const COLLECTIONS_COLLECTION: &str = "cash_collections";

/// Recorded as `verifiedBy` when a collection verifies itself on intake.
pub const AUTO_VERIFIER: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentMode {
    Cash,
    MobileMoney,
    Cheque,
    BankTransfer,
}

impl std::str::FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "cash" => Ok(PaymentMode::Cash),
            "mobilemoney" => Ok(PaymentMode::MobileMoney),
            "cheque" | "check" => Ok(PaymentMode::Cheque),
            "banktransfer" => Ok(PaymentMode::BankTransfer),
            _ => Err(format!("Invalid mode of payment: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    Pending,
    Verified,
    Deposited,
    Cancelled,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Pending => "pending",
            CollectionStatus::Verified => "verified",
            CollectionStatus::Deposited => "deposited",
            CollectionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for CollectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(CollectionStatus::Pending),
            "verified" => Ok(CollectionStatus::Verified),
            "deposited" => Ok(CollectionStatus::Deposited),
            "cancelled" | "canceled" => Ok(CollectionStatus::Cancelled),
            _ => Err(format!("Invalid collection status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashCollection {
    #[serde(rename = "_id")]
    pub id: String,
    pub customer_name: String,
    pub document_number: DocumentNumber,
    pub document_type: DocumentType,
    pub amount_paid: Decimal,
    /// What this collection currently contributes to the ledger's paid amount.
    pub applied_amount: Decimal,
    pub mode_of_payment: PaymentMode,
    #[serde(default)]
    pub mobile_money_reference: Option<String>,
    #[serde(default)]
    pub cheque_number: Option<String>,
    #[serde(default)]
    pub bank_reference: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub payment_date: DateTime<Utc>,
    pub collected_by: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: CollectionStatus,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default, with = "super::optional_chrono_datetime_as_bson_datetime")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, with = "super::optional_chrono_datetime_as_bson_datetime")]
    pub deposited_at: Option<DateTime<Utc>>,
    #[serde(default, with = "super::optional_chrono_datetime_as_bson_datetime")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Validated payment intake.
#[derive(Debug, Clone)]
pub struct NewCollection {
    pub customer_name: String,
    pub document_number: DocumentNumber,
    pub amount_paid: Decimal,
    pub mode_of_payment: PaymentMode,
    pub mobile_money_reference: Option<String>,
    pub cheque_number: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub collected_by: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionPatch {
    pub amount_paid: Option<Decimal>,
    pub mobile_money_reference: Option<String>,
    pub cheque_number: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CashCollection {
    pub fn new(input: NewCollection, document_type: DocumentType, now: DateTime<Utc>) -> Self {
        let mut collection = Self {
            id: Uuid::new_v4().to_string(),
            customer_name: input.customer_name,
            document_number: input.document_number,
            document_type,
            amount_paid: input.amount_paid,
            applied_amount: Decimal::ZERO,
            mode_of_payment: input.mode_of_payment,
            mobile_money_reference: non_blank(input.mobile_money_reference),
            cheque_number: non_blank(input.cheque_number),
            bank_reference: non_blank(input.bank_reference),
            payment_date: input.payment_date.unwrap_or(now),
            collected_by: input.collected_by,
            notes: non_blank(input.notes),
            status: CollectionStatus::Pending,
            verified_by: None,
            verified_at: None,
            deposited_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        collection.auto_verify(now);
        collection
    }

    /// Method-specific reference requirements.
    pub fn validate(&self) -> Result<(), SalesError> {
        if self.amount_paid <= Decimal::ZERO {
            return Err(SalesError::validation("amountPaid must be greater than zero"));
        }
        if self.customer_name.trim().is_empty() {
            return Err(SalesError::validation("customerName is required"));
        }
        match self.mode_of_payment {
            PaymentMode::Cheque if self.cheque_number.is_none() => Err(SalesError::validation(
                "chequeNumber is required for cheque payments",
            )),
            PaymentMode::BankTransfer if self.bank_reference.is_none() => Err(
                SalesError::validation("bankReference is required for bank transfers"),
            ),
            _ => Ok(()),
        }
    }

    /// Mobile-money payments carrying a reference need no manual check.
    pub fn auto_verify(&mut self, now: DateTime<Utc>) {
        if self.status == CollectionStatus::Pending
            && self.mode_of_payment == PaymentMode::MobileMoney
            && self.mobile_money_reference.is_some()
        {
            self.status = CollectionStatus::Verified;
            self.verified_by = Some(AUTO_VERIFIER.to_string());
            self.verified_at = Some(now);
        }
    }

    pub fn ensure_amendable(&self) -> Result<(), SalesError> {
        match self.status {
            CollectionStatus::Pending | CollectionStatus::Verified => Ok(()),
            other => Err(SalesError::InvalidTransition(format!(
                "A {} collection cannot be amended",
                other.as_str()
            ))),
        }
    }

    /// Apply non-amount edits. The amount is reconciled by the caller.
    pub fn apply_patch(&mut self, patch: &CollectionPatch, now: DateTime<Utc>) {
        if let Some(reference) = &patch.mobile_money_reference {
            self.mobile_money_reference = non_blank(Some(reference.clone()));
        }
        if let Some(cheque) = &patch.cheque_number {
            self.cheque_number = non_blank(Some(cheque.clone()));
        }
        if let Some(reference) = &patch.bank_reference {
            self.bank_reference = non_blank(Some(reference.clone()));
        }
        if let Some(date) = patch.payment_date {
            self.payment_date = date;
        }
        if let Some(notes) = &patch.notes {
            self.notes = non_blank(Some(notes.clone()));
        }
        if let Some(amount) = patch.amount_paid {
            self.amount_paid = amount;
        }
        self.updated_at = now;
        self.auto_verify(now);
    }

    pub fn verify(&mut self, by: &str, now: DateTime<Utc>) -> Result<(), SalesError> {
        self.transition(CollectionStatus::Verified, &[CollectionStatus::Pending])?;
        self.verified_by = Some(by.to_string());
        self.verified_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn deposit(&mut self, now: DateTime<Utc>) -> Result<(), SalesError> {
        self.transition(
            CollectionStatus::Deposited,
            &[CollectionStatus::Pending, CollectionStatus::Verified],
        )?;
        self.deposited_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Marks the collection cancelled. Reversing `applied_amount` is the
    /// caller's job.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), SalesError> {
        self.transition(
            CollectionStatus::Cancelled,
            &[CollectionStatus::Pending, CollectionStatus::Verified],
        )?;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn transition(
        &mut self,
        to: CollectionStatus,
        allowed_from: &[CollectionStatus],
    ) -> Result<(), SalesError> {
        if !allowed_from.contains(&self.status) {
            return Err(SalesError::InvalidTransition(format!(
                "Cannot move collection {} from {} to {}",
                self.id,
                self.status.as_str(),
                to.as_str()
            )));
        }
        self.status = to;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionFilter {
    pub document_number: Option<DocumentNumber>,
    pub status: Option<CollectionStatus>,
    pub mode: Option<PaymentMode>,
    pub customer: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl CollectionFilter {
    pub fn matches(&self, c: &CashCollection) -> bool {
        if self
            .document_number
            .as_ref()
            .is_some_and(|n| *n != c.document_number)
        {
            return false;
        }
        if self.status.is_some_and(|s| s != c.status) {
            return false;
        }
        if self.mode.is_some_and(|m| m != c.mode_of_payment) {
            return false;
        }
        if let Some(customer) = self.customer.as_deref().filter(|v| !v.is_empty()) {
            if !contains_ci(&c.customer_name, customer) {
                return false;
            }
        }
        within_range(Some(c.payment_date), self.start_date, self.end_date)
    }
}
