// ⚠️ Error types for the ATM siting engine

use thiserror::Error;

/// Errors raised by the registry, the analyzer and their collaborators
#[derive(Error, Debug)]
pub enum AtmError {
    #[error("Invalid ATM record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("ATM record has no identity (neither `id` nor `idatm`)")]
    MissingIdentity,

    #[error("Invalid candidate location: {0}")]
    InvalidCandidate(String),

    #[error("Predictor must be trained before the first prediction")]
    PredictorNotTrained,

    #[error("Unknown ATM: {0}")]
    UnknownAtm(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AtmError {
    pub fn invalid_record(id: impl Into<String>, reason: impl Into<String>) -> Self {
        AtmError::InvalidRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for ATM operations
pub type AtmResult<T> = Result<T, AtmError>;
