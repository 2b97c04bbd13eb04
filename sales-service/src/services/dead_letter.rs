use crate::models::{DocumentNumber, SyncDeadLetter, SyncOperation};
use crate::services::metrics;
use crate::services::store::DeadLetterStore;
use chrono::Utc;
use std::fmt::Display;
use std::sync::Arc;

/// Where failed ledger syncs go. Recording never fails the caller.
#[derive(Clone)]
pub struct DeadLetterLog {
    store: Arc<dyn DeadLetterStore>,
}

impl DeadLetterLog {
    pub fn new(store: Arc<dyn DeadLetterStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DeadLetterStore> {
        &self.store
    }

    pub async fn record_failure(
        &self,
        operation: SyncOperation,
        record_id: &str,
        document_number: &DocumentNumber,
        error: impl Display,
    ) {
        let error = error.to_string();
        tracing::warn!(
            operation = operation.as_str(),
            record_id,
            document_number = %document_number,
            error = %error,
            "SyncWarning: ledger sync failed, queued for resync"
        );
        metrics::record_ledger_sync(operation.as_str(), "failed");

        let letter = SyncDeadLetter::new(operation, record_id, document_number, error, Utc::now());
        if let Err(e) = self.store.record(&letter).await {
            tracing::error!(
                record_id,
                document_number = %document_number,
                "Failed to persist sync dead letter: {:#}",
                e
            );
        }
    }
}
