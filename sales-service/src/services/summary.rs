//! Aggregates computed by scanning; nothing here is persisted.

use crate::models::{DocumentType, PaymentStatus, Record, SalesEntry};
use crate::normalizer::money;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTotals {
    pub count: u64,
    pub total: Decimal,
}

impl TypeTotals {
    fn add(&mut self, amount: Decimal) {
        self.count += 1;
        self.total = money(self.total + amount);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub all: TypeTotals,
    pub invoice: TypeTotals,
    pub cash_sale: TypeTotals,
    pub quotation: TypeTotals,
}

impl PeriodTotals {
    fn add(&mut self, document_type: DocumentType, amount: Decimal) {
        self.all.add(amount);
        match document_type {
            DocumentType::Invoice => self.invoice.add(amount),
            DocumentType::CashSale => self.cash_sale.add(amount),
            DocumentType::Quotation => self.quotation.add(amount),
        }
    }
}

/// Record totals for the periods containing `today` (UTC). Weeks are ISO
/// weeks starting Monday.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub as_of: String,
    pub daily: PeriodTotals,
    pub weekly: PeriodTotals,
    pub monthly: PeriodTotals,
    pub yearly: PeriodTotals,
    /// Records left out because their date could not be read.
    pub undated_records: u64,
}

impl RecordSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>, today: NaiveDate) -> Self {
        let mut summary = RecordSummary {
            as_of: today.format("%Y-%m-%d").to_string(),
            ..Default::default()
        };
        let today_week = today.iso_week();

        for record in records {
            let Some(ts) = record.timestamp() else {
                summary.undated_records += 1;
                continue;
            };
            let day = ts.date_naive();
            let document_type = record.document.document_type;

            if day.year() != today.year() {
                // ISO week 1 can start in the previous calendar year.
                if day.iso_week() == today_week {
                    summary.weekly.add(document_type, record.amount);
                }
                continue;
            }
            summary.yearly.add(document_type, record.amount);
            if day.iso_week() == today_week {
                summary.weekly.add(document_type, record.amount);
            }
            if day.month() == today.month() {
                summary.monthly.add(document_type, record.amount);
                if day == today {
                    summary.daily.add(document_type, record.amount);
                }
            }
        }

        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: u64,
    pub partial: u64,
    pub paid: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCounts {
    pub invoice: u64,
    pub cash_sale: u64,
    pub quotation: u64,
}

/// Ledger totals. Money sums skip cancelled entries; counts include them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub entries: u64,
    pub total_amount: Decimal,
    pub total_tax: Decimal,
    pub total_discount: Decimal,
    pub grand_total: Decimal,
    pub total_paid: Decimal,
    pub total_balance: Decimal,
    pub by_status: StatusCounts,
    pub by_type: TypeCounts,
}

impl SalesSummary {
    pub fn from_entries(entries: &[SalesEntry]) -> Self {
        let mut summary = SalesSummary {
            total_amount: money(Decimal::ZERO),
            total_tax: money(Decimal::ZERO),
            total_discount: money(Decimal::ZERO),
            grand_total: money(Decimal::ZERO),
            total_paid: money(Decimal::ZERO),
            total_balance: money(Decimal::ZERO),
            ..Default::default()
        };

        for entry in entries {
            summary.entries += 1;
            match entry.payment_status {
                PaymentStatus::Pending => summary.by_status.pending += 1,
                PaymentStatus::Partial => summary.by_status.partial += 1,
                PaymentStatus::Paid => summary.by_status.paid += 1,
                PaymentStatus::Cancelled => summary.by_status.cancelled += 1,
            }
            match entry.document_type {
                DocumentType::Invoice => summary.by_type.invoice += 1,
                DocumentType::CashSale => summary.by_type.cash_sale += 1,
                DocumentType::Quotation => summary.by_type.quotation += 1,
            }
            if entry.is_cancelled() {
                continue;
            }
            summary.total_amount += entry.amount;
            summary.total_tax += entry.tax_amount;
            summary.total_discount += entry.discount;
            summary.grand_total += entry.total_amount;
            summary.total_paid += entry.paid_amount;
            summary.total_balance += entry.balance_due;
        }

        summary
    }
}
