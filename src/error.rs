use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Domain error taxonomy. Every failed transition surfaces one of these and
/// leaves the intent and ledger exactly as they were before the call.
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Another request holding the same idempotency key is in flight.
    /// Retryable by design.
    #[error("idempotency key locked by an in-flight request")]
    Locked,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(e: rocksdb::Error) -> Self {
        PaymentError::Persistence(Box::new(e))
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(e: serde_json::Error) -> Self {
        PaymentError::Persistence(Box::new(e))
    }
}
