//! Domain error taxonomy for sales-service.

use crate::models::DocumentNumber;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SalesError {
    /// Missing or invalid input (e.g. no document number, or more than one).
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Document-number collision on create. Resolved by idempotent return
    /// inside the record adapter; never rendered to HTTP callers.
    #[error("Document number {0} already exists")]
    DuplicateDocument(DocumentNumber),

    #[error("{0}")]
    InvalidTransition(String),

    /// Optimistic ledger update kept losing to concurrent writers.
    #[error("{0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SalesError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<SalesError> for AppError {
    fn from(err: SalesError) -> Self {
        match err {
            SalesError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            SalesError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            SalesError::DuplicateDocument(number) => AppError::Conflict(anyhow::anyhow!(
                "Document number {} already exists",
                number
            )),
            SalesError::InvalidTransition(msg) => {
                AppError::InvalidTransition(anyhow::anyhow!(msg))
            }
            SalesError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            SalesError::Store(err) => AppError::DatabaseError(err),
        }
    }
}

pub type SalesResult<T> = Result<T, SalesError>;
