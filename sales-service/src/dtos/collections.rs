use super::{blank_to_none, parse_instant, parse_range};
use crate::error::SalesError;
use crate::models::{
    CashCollection, CollectionFilter, CollectionPatch, CollectionStatus, DocumentNumber,
    DocumentType, Page, PageRequest, PaymentMode,
};
use crate::services::CollectionInput;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    #[validate(length(min = 1, max = 200, message = "customerName is required"))]
    pub customer_name: String,
    #[validate(length(min = 1, max = 64, message = "documentNumber is required"))]
    pub document_number: String,
    pub amount_paid: Decimal,
    pub mode_of_payment: PaymentMode,
    #[validate(length(max = 100))]
    pub mobile_money_reference: Option<String>,
    #[validate(length(max = 100))]
    pub cheque_number: Option<String>,
    #[validate(length(max = 100))]
    pub bank_reference: Option<String>,
    pub payment_date: Option<String>,
    pub collected_by: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl CreateCollectionRequest {
    pub fn into_input(self, acting_user: Option<String>) -> Result<CollectionInput, SalesError> {
        Ok(CollectionInput {
            payment_date: parse_instant(self.payment_date.as_deref())?,
            customer_name: self.customer_name,
            document_number: self.document_number,
            amount_paid: self.amount_paid,
            mode_of_payment: self.mode_of_payment,
            mobile_money_reference: self.mobile_money_reference,
            cheque_number: self.cheque_number,
            bank_reference: self.bank_reference,
            collected_by: blank_to_none(self.collected_by)
                .or(acting_user)
                .unwrap_or_default(),
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollectionRequest {
    pub amount_paid: Option<Decimal>,
    #[validate(length(max = 100))]
    pub mobile_money_reference: Option<String>,
    #[validate(length(max = 100))]
    pub cheque_number: Option<String>,
    #[validate(length(max = 100))]
    pub bank_reference: Option<String>,
    pub payment_date: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl UpdateCollectionRequest {
    pub fn into_patch(self) -> Result<CollectionPatch, SalesError> {
        Ok(CollectionPatch {
            payment_date: parse_instant(self.payment_date.as_deref())?,
            amount_paid: self.amount_paid,
            mobile_money_reference: self.mobile_money_reference,
            cheque_number: self.cheque_number,
            bank_reference: self.bank_reference,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCollectionRequest {
    pub verified_by: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CollectionListParams {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
    pub document_number: Option<String>,
    pub status: Option<String>,
    pub mode: Option<String>,
    pub customer: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl CollectionListParams {
    pub fn to_query(&self) -> Result<(CollectionFilter, PageRequest), SalesError> {
        let (start_date, end_date) =
            parse_range(self.start_date.as_deref(), self.end_date.as_deref())?;
        Ok((
            CollectionFilter {
                document_number: blank_to_none(self.document_number.clone())
                    .map(|n| DocumentNumber::parse(&n))
                    .transpose()?,
                status: blank_to_none(self.status.clone())
                    .map(|s| s.parse::<CollectionStatus>().map_err(SalesError::Validation))
                    .transpose()?,
                mode: blank_to_none(self.mode.clone())
                    .map(|m| m.parse::<PaymentMode>().map_err(SalesError::Validation))
                    .transpose()?,
                customer: blank_to_none(self.customer.clone()),
                start_date,
                end_date,
            },
            PageRequest::new(self.page, self.limit),
        ))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    pub id: String,
    pub customer_name: String,
    pub document_number: String,
    pub document_type: DocumentType,
    pub amount_paid: Decimal,
    pub applied_amount: Decimal,
    pub mode_of_payment: PaymentMode,
    pub mobile_money_reference: Option<String>,
    pub cheque_number: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_date: String,
    pub collected_by: String,
    pub notes: Option<String>,
    pub status: CollectionStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<String>,
    pub deposited_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CashCollection> for CollectionResponse {
    fn from(c: CashCollection) -> Self {
        Self {
            id: c.id,
            customer_name: c.customer_name,
            document_number: c.document_number.to_string(),
            document_type: c.document_type,
            amount_paid: c.amount_paid,
            applied_amount: c.applied_amount,
            mode_of_payment: c.mode_of_payment,
            mobile_money_reference: c.mobile_money_reference,
            cheque_number: c.cheque_number,
            bank_reference: c.bank_reference,
            payment_date: c.payment_date.to_rfc3339(),
            collected_by: c.collected_by,
            notes: c.notes,
            status: c.status,
            verified_by: c.verified_by,
            verified_at: c.verified_at.map(|t| t.to_rfc3339()),
            deposited_at: c.deposited_at.map(|t| t.to_rfc3339()),
            cancelled_at: c.cancelled_at.map(|t| t.to_rfc3339()),
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionListResponse {
    pub collections: Vec<CollectionResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl From<Page<CashCollection>> for CollectionListResponse {
    fn from(page: Page<CashCollection>) -> Self {
        let page = page.map(CollectionResponse::from);
        Self {
            collections: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            has_more: page.has_more,
        }
    }
}
