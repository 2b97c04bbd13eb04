use super::{blank_to_none, parse_range};
use crate::error::SalesError;
use crate::models::{DocumentType, Page, PageRequest, Record, RecordFilter};
use crate::services::{RecordInput, RecordUpdate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    #[validate(length(min = 1, max = 200, message = "customerName is required"))]
    pub customer_name: String,
    #[validate(length(max = 64))]
    pub invoice_number: Option<String>,
    #[validate(length(max = 64))]
    pub cash_sale_number: Option<String>,
    #[validate(length(max = 64))]
    pub quotation_number: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub facilitator: String,
    pub amount: Decimal,
    /// Falls back to the `X-User-ID` header.
    pub created_by: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl CreateRecordRequest {
    pub fn into_input(self, acting_user: Option<String>) -> RecordInput {
        RecordInput {
            customer_name: self.customer_name,
            invoice_number: self.invoice_number,
            cash_sale_number: self.cash_sale_number,
            quotation_number: self.quotation_number,
            facilitator: self.facilitator,
            amount: self.amount,
            created_by: blank_to_none(self.created_by)
                .or(acting_user)
                .unwrap_or_default(),
            date: self.date,
            time: self.time,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: Option<String>,
    #[validate(length(max = 200))]
    pub facilitator: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<String>,
    pub time: Option<String>,
    /// Accepted only when unchanged; document numbers are immutable.
    pub invoice_number: Option<String>,
    pub cash_sale_number: Option<String>,
    pub quotation_number: Option<String>,
}

impl From<UpdateRecordRequest> for RecordUpdate {
    fn from(req: UpdateRecordRequest) -> Self {
        RecordUpdate {
            customer_name: req.customer_name,
            facilitator: req.facilitator,
            amount: req.amount,
            date: req.date,
            time: req.time,
            document_numbers: [req.quotation_number, req.cash_sale_number, req.invoice_number]
                .into_iter()
                .filter_map(blank_to_none)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordListParams {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub document_type: Option<String>,
    pub customer: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl RecordListParams {
    pub fn to_query(&self) -> Result<(RecordFilter, PageRequest), SalesError> {
        let (start_date, end_date) =
            parse_range(self.start_date.as_deref(), self.end_date.as_deref())?;
        let document_type = self
            .document_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(str::parse::<DocumentType>)
            .transpose()?;
        Ok((
            RecordFilter {
                document_type,
                customer: blank_to_none(self.customer.clone()),
                search: blank_to_none(self.search.clone()),
                start_date,
                end_date,
            },
            PageRequest::new(self.page, self.limit),
        ))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub id: String,
    pub customer_name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_sale_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quotation_number: Option<String>,
    pub facilitator: String,
    pub amount: Decimal,
    pub created_by: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub timestamp: Option<String>,
    pub date_unparsed: bool,
    pub created_at: Option<String>,
}

impl From<Record> for RecordResponse {
    fn from(record: Record) -> Self {
        Self {
            invoice_number: record.document.invoice_number().map(str::to_string),
            cash_sale_number: record.document.cash_sale_number().map(str::to_string),
            quotation_number: record.document.quotation_number().map(str::to_string),
            document_type: record.document.document_type,
            document_number: record.document.number.to_string(),
            date: record.occurred.date(),
            time: record.occurred.time(),
            timestamp: record.occurred.timestamp.map(|ts| ts.to_rfc3339()),
            date_unparsed: record.occurred.unparsed,
            created_at: record.created_at.map(|ts| ts.to_rfc3339()),
            id: record.id,
            customer_name: record.customer_name,
            facilitator: record.facilitator,
            amount: record.amount,
            created_by: record.created_by,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordListResponse {
    pub records: Vec<RecordResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl From<Page<Record>> for RecordListResponse {
    fn from(page: Page<Record>) -> Self {
        let page = page.map(RecordResponse::from);
        Self {
            records: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            has_more: page.has_more,
        }
    }
}
