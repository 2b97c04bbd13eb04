//! Transaction records in both stored schemas and the one logical shape
//! callers see.

use super::document::{DocumentFields, DocumentRef, DocumentType};
use super::{contains_ci, within_range};
use crate::normalizer::{self, NormalizedDate, RawDate};
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

pub const LEGACY_COLLECTION: &str = "records";
pub const V2_COLLECTION: &str = "records_v2";
pub const V2_VERSION: i32 = 2;

/// Which physical collection holds a record. Internal to the store adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSchema {
    Legacy,
    Current,
}

/// Pre-migration record. Every field is optional because older writers were
/// inconsistent about what they stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRecord {
    #[serde(rename = "_id", with = "bson_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub cash_sale_number: Option<String>,
    #[serde(default)]
    pub quotation_number: Option<String>,
    #[serde(default)]
    pub facilitator: Option<String>,
    /// Usually a double; strings and integers occur in older data.
    #[serde(default)]
    pub amount: Option<Bson>,
    #[serde(default)]
    pub created_by: Option<String>,
    /// `YYYY-MM-DD` or ISO-8601 string, occasionally a BSON date.
    #[serde(default)]
    pub date: Option<Bson>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(
        default,
        with = "super::optional_chrono_datetime_as_bson_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Record {
    #[serde(rename = "_id")]
    pub id: String,
    pub version: i32,
    pub customer_name: String,
    #[serde(default)]
    pub document_type: Option<DocumentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_sale_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quotation_number: Option<String>,
    /// Whichever of the three numbers is set. Carries the cross-field unique
    /// index; absent on rows written before it existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    pub facilitator: String,
    pub amount: Decimal,
    pub created_by: String,
    #[serde(
        default,
        with = "super::optional_chrono_datetime_as_bson_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Validated intake.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub customer_name: String,
    pub document: DocumentRef,
    pub facilitator: String,
    pub amount: Decimal,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

impl V2Record {
    pub fn new(input: NewRecord, now: DateTime<Utc>) -> Self {
        let occurred = NormalizedDate::parsed(input.occurred_at);
        Self {
            id: Uuid::new_v4().to_string(),
            version: V2_VERSION,
            customer_name: input.customer_name,
            document_type: Some(input.document.document_type),
            invoice_number: input.document.invoice_number().map(str::to_string),
            cash_sale_number: input.document.cash_sale_number().map(str::to_string),
            quotation_number: input.document.quotation_number().map(str::to_string),
            document_number: Some(input.document.number.as_str().to_string()),
            facilitator: input.facilitator,
            amount: normalizer::money(input.amount),
            created_by: input.created_by,
            occurred_at: Some(input.occurred_at),
            date: occurred.date(),
            time: occurred.time(),
            created_at: now,
            updated_at: now,
        }
    }

    fn document_fields(&self) -> DocumentFields<'_> {
        DocumentFields {
            invoice_number: self.invoice_number.as_deref(),
            cash_sale_number: self.cash_sale_number.as_deref(),
            quotation_number: self.quotation_number.as_deref(),
        }
    }
}

impl LegacyRecord {
    fn document_fields(&self) -> DocumentFields<'_> {
        DocumentFields {
            invoice_number: self.invoice_number.as_deref(),
            cash_sale_number: self.cash_sale_number.as_deref(),
            quotation_number: self.quotation_number.as_deref(),
        }
    }

    fn raw_date(&self) -> RawDate<'_> {
        match &self.date {
            Some(Bson::DateTime(dt)) => RawDate {
                timestamp: Some(dt.to_chrono()),
                date: None,
                time: self.time.as_deref(),
            },
            Some(Bson::String(s)) => RawDate {
                timestamp: None,
                date: Some(s.as_str()),
                time: self.time.as_deref(),
            },
            _ => RawDate::default(),
        }
    }
}

/// A record as read from either collection.
#[derive(Debug, Clone)]
pub enum StoredRecord {
    Legacy(LegacyRecord),
    Current(V2Record),
}

impl StoredRecord {
    pub fn id(&self) -> &str {
        match self {
            StoredRecord::Legacy(r) => &r.id,
            StoredRecord::Current(r) => &r.id,
        }
    }

    pub fn schema(&self) -> RecordSchema {
        match self {
            StoredRecord::Legacy(_) => RecordSchema::Legacy,
            StoredRecord::Current(_) => RecordSchema::Current,
        }
    }

    /// Collapse to the logical shape. `None` when no document number can be
    /// resolved; such records are invisible to reads.
    pub fn normalize(&self) -> Option<Record> {
        match self {
            StoredRecord::Legacy(r) => {
                let document = r.document_fields().resolve()?;
                let occurred = normalizer::normalize_date(r.raw_date());
                Some(Record {
                    id: r.id.clone(),
                    customer_name: r.customer_name.clone().unwrap_or_default(),
                    document,
                    facilitator: r.facilitator.clone().unwrap_or_default(),
                    amount: r
                        .amount
                        .as_ref()
                        .and_then(normalizer::amount_from_bson)
                        .unwrap_or(Decimal::ZERO),
                    created_by: r.created_by.clone().unwrap_or_default(),
                    occurred,
                    created_at: r.created_at,
                })
            }
            StoredRecord::Current(r) => {
                let document = r.document_fields().resolve()?;
                let occurred = normalizer::normalize_date(RawDate {
                    timestamp: r.occurred_at,
                    date: r.date.as_deref(),
                    time: r.time.as_deref(),
                });
                Some(Record {
                    id: r.id.clone(),
                    customer_name: r.customer_name.clone(),
                    document,
                    facilitator: r.facilitator.clone(),
                    amount: normalizer::money(r.amount),
                    created_by: r.created_by.clone(),
                    occurred,
                    created_at: Some(r.created_at),
                })
            }
        }
    }
}

/// The unified record every caller works with.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub customer_name: String,
    pub document: DocumentRef,
    pub facilitator: String,
    pub amount: Decimal,
    pub created_by: String,
    pub occurred: NormalizedDate,
    pub created_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.occurred.timestamp
    }

    /// Newest first, undated last, id as tie-breaker.
    pub fn list_order(a: &Record, b: &Record) -> Ordering {
        match (a.timestamp(), b.timestamp()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.id.cmp(&b.id))
    }
}

/// Field changes applied in place to whichever schema holds the record.
#[derive(Debug, Clone, Default)]
pub struct RecordChanges {
    pub customer_name: Option<String>,
    pub facilitator: Option<String>,
    pub amount: Option<Decimal>,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.facilitator.is_none()
            && self.amount.is_none()
            && self.occurred_at.is_none()
    }

    pub fn apply_to_legacy(&self, record: &mut LegacyRecord) {
        if let Some(name) = &self.customer_name {
            record.customer_name = Some(name.clone());
        }
        if let Some(facilitator) = &self.facilitator {
            record.facilitator = Some(facilitator.clone());
        }
        if let Some(amount) = self.amount {
            record.amount = Some(normalizer::amount_to_bson_double(amount));
        }
        if let Some(ts) = self.occurred_at {
            let occurred = NormalizedDate::parsed(ts);
            record.date = occurred.date().map(Bson::String);
            record.time = occurred.time();
        }
    }

    pub fn apply_to_current(&self, record: &mut V2Record, now: DateTime<Utc>) {
        if let Some(name) = &self.customer_name {
            record.customer_name = name.clone();
        }
        if let Some(facilitator) = &self.facilitator {
            record.facilitator = facilitator.clone();
        }
        if let Some(amount) = self.amount {
            record.amount = normalizer::money(amount);
        }
        if let Some(ts) = self.occurred_at {
            let occurred = NormalizedDate::parsed(ts);
            record.occurred_at = Some(ts);
            record.date = occurred.date();
            record.time = occurred.time();
        }
        record.updated_at = now;
    }

    /// `$set` body for the given schema. Legacy keeps its double amount and
    /// string date.
    pub fn to_set_document(&self, schema: RecordSchema, now: DateTime<Utc>) -> Document {
        let mut set = Document::new();
        if let Some(name) = &self.customer_name {
            set.insert("customerName", name.clone());
        }
        if let Some(facilitator) = &self.facilitator {
            set.insert("facilitator", facilitator.clone());
        }
        if let Some(amount) = self.amount {
            let amount = normalizer::money(amount);
            match schema {
                RecordSchema::Legacy => {
                    set.insert("amount", normalizer::amount_to_bson_double(amount));
                }
                RecordSchema::Current => {
                    set.insert("amount", amount.to_string());
                }
            }
        }
        if let Some(ts) = self.occurred_at {
            let occurred = NormalizedDate::parsed(ts);
            set.insert("date", occurred.date());
            set.insert("time", occurred.time());
            if schema == RecordSchema::Current {
                set.insert("occurredAt", bson::DateTime::from_chrono(ts));
            }
        }
        if schema == RecordSchema::Current {
            set.insert("updatedAt", bson::DateTime::from_chrono(now));
        }
        doc! { "$set": set }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub document_type: Option<DocumentType>,
    pub customer: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(t) = self.document_type {
            if record.document.document_type != t {
                return false;
            }
        }
        if let Some(customer) = self.customer.as_deref().filter(|c| !c.is_empty()) {
            if !contains_ci(&record.customer_name, customer) {
                return false;
            }
        }
        if let Some(term) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let hit = [
                record.customer_name.as_str(),
                record.facilitator.as_str(),
                record.document.number.as_str(),
                record.created_by.as_str(),
            ]
            .iter()
            .any(|field| contains_ci(field, term));
            if !hit {
                return false;
            }
        }
        within_range(record.timestamp(), self.start_date, self.end_date)
    }
}

/// `_id` values written by older clients may be ObjectIds; they are carried as
/// their hex string.
pub(crate) mod bson_id {
    use mongodb::bson::Bson;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(id: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(id)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Bson::deserialize(deserializer)? {
            Bson::String(s) => Ok(s),
            Bson::ObjectId(oid) => Ok(oid.to_hex()),
            other => Err(de::Error::custom(format!(
                "unsupported _id type: {:?}",
                other.element_type()
            ))),
        }
    }
}

/// Filter matching an `_id` stored either as a string or as an ObjectId.
pub fn id_filter(id: &str) -> Document {
    match bson::oid::ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": { "$in": [id, oid] } },
        Err(_) => doc! { "_id": id },
    }
}

/// Filter matching any of the three identifier fields. V2 numbers are
/// stored trimmed, so an exact match can use the unique indexes.
pub fn number_filter(number: &str) -> Document {
    doc! {
        "$or": [
            { "invoiceNumber": number },
            { "cashSaleNumber": number },
            { "quotationNumber": number },
        ]
    }
}

/// Legacy rows were written untrimmed; reads trim them, so lookups must too.
pub fn legacy_number_filter(number: &str) -> Document {
    let pattern = padded_number_pattern(number);
    doc! {
        "$or": [
            { "invoiceNumber": { "$regex": pattern.as_str() } },
            { "cashSaleNumber": { "$regex": pattern.as_str() } },
            { "quotationNumber": { "$regex": pattern.as_str() } },
        ]
    }
}

fn padded_number_pattern(number: &str) -> String {
    format!(r"^\s*{}\s*$", regex::escape(number))
}
