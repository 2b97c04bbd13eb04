use super::{blank_to_none, parse_range};
use crate::error::SalesError;
use crate::models::{
    DocumentType, Page, PageRequest, PaymentStatus, SalesEntry, SalesFilter, SalesPatch,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSalesRequest {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: Option<String>,
    #[validate(length(max = 200))]
    pub facilitator: Option<String>,
    pub tax_amount: Option<Decimal>,
    pub discount: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub cancelled: Option<bool>,
}

impl From<UpdateSalesRequest> for SalesPatch {
    fn from(req: UpdateSalesRequest) -> Self {
        SalesPatch {
            customer_name: req.customer_name,
            facilitator: req.facilitator,
            tax_amount: req.tax_amount,
            discount: req.discount,
            notes: req.notes,
            cancelled: req.cancelled,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPaidAmountRequest {
    pub paid_amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SalesListParams {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub document_type: Option<String>,
    pub status: Option<String>,
    pub customer: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl SalesListParams {
    pub fn to_query(&self) -> Result<(SalesFilter, PageRequest), SalesError> {
        let (start_date, end_date) =
            parse_range(self.start_date.as_deref(), self.end_date.as_deref())?;
        let document_type = blank_to_none(self.document_type.clone())
            .map(|t| t.parse::<DocumentType>())
            .transpose()?;
        let status = blank_to_none(self.status.clone())
            .map(|s| s.parse::<PaymentStatus>().map_err(SalesError::Validation))
            .transpose()?;
        Ok((
            SalesFilter {
                document_type,
                status,
                customer: blank_to_none(self.customer.clone()),
                search: blank_to_none(self.search.clone()),
                start_date,
                end_date,
            },
            PageRequest::new(self.page, self.limit),
        ))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResyncParams {
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesEntryResponse {
    pub id: String,
    pub document_number: String,
    pub document_type: DocumentType,
    pub customer_name: String,
    pub date: Option<String>,
    pub amount: Decimal,
    pub tax_amount: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub payment_status: PaymentStatus,
    pub facilitator: String,
    pub source_record_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SalesEntry> for SalesEntryResponse {
    fn from(entry: SalesEntry) -> Self {
        Self {
            id: entry.id,
            document_number: entry.document_number.to_string(),
            document_type: entry.document_type,
            customer_name: entry.customer_name,
            date: entry.date.map(|d| d.to_rfc3339()),
            amount: entry.amount,
            tax_amount: entry.tax_amount,
            discount: entry.discount,
            total_amount: entry.total_amount,
            paid_amount: entry.paid_amount,
            balance_due: entry.balance_due,
            payment_status: entry.payment_status,
            facilitator: entry.facilitator,
            source_record_id: entry.source_record_id,
            notes: entry.notes,
            created_at: entry.created_at.to_rfc3339(),
            updated_at: entry.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesListResponse {
    pub sales: Vec<SalesEntryResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl From<Page<SalesEntry>> for SalesListResponse {
    fn from(page: Page<SalesEntry>) -> Self {
        let page = page.map(SalesEntryResponse::from);
        Self {
            sales: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            has_more: page.has_more,
        }
    }
}
