use crate::classifier::ModelError;
use crate::image_gate::GateReport;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CivicError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Image rejected: {}", .0.errors.join("; "))]
    IntegrityRejected(GateReport),

    #[error("Classifier model error: {0}")]
    Model(#[from] ModelError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification an API layer maps to a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidRequest,
    IntegrityRejected,
    Internal,
}

impl CivicError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. }      => ErrorKind::NotFound,
            Self::Forbidden(_)         => ErrorKind::Forbidden,
            Self::InvalidRequest(_)    => ErrorKind::InvalidRequest,
            Self::IntegrityRejected(_) => ErrorKind::IntegrityRejected,
            Self::Model(_)
            | Self::Database(_)
            | Self::Serialization(_)
            | Self::Other(_)           => ErrorKind::Internal,
        }
    }
}

pub type CivicResult<T> = Result<T, CivicError>;
