use super::document::DocumentNumber;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEAD_LETTER_COLLECTION: &str = "ledger_sync_dead_letters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Created,
    Updated,
    Deleted,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Created => "created",
            SyncOperation::Updated => "updated",
            SyncOperation::Deleted => "deleted",
        }
    }
}

/// A ledger sync side effect that failed and is waiting for a resync sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDeadLetter {
    #[serde(rename = "_id")]
    pub id: String,
    pub operation: SyncOperation,
    pub record_id: String,
    pub document_number: DocumentNumber,
    pub error: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub occurred_at: DateTime<Utc>,
    #[serde(default, with = "super::optional_chrono_datetime_as_bson_datetime")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub attempts: i32,
}

impl SyncDeadLetter {
    pub fn new(
        operation: SyncOperation,
        record_id: &str,
        document_number: &DocumentNumber,
        error: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operation,
            record_id: record_id.to_string(),
            document_number: document_number.clone(),
            error,
            occurred_at: now,
            resolved_at: None,
            attempts: 1,
        }
    }
}
