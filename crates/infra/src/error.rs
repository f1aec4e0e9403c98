//! Errors surfaced by the service layer.

use thiserror::Error;

use smartstock_core::DomainError;

use crate::store::StoreError;

/// What callers of the services see.
///
/// Forecast-model failures and notification failures never appear here: the
/// former degrade to the baseline model, the latter are logged and dropped.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the error should be reported to callers as a client error.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(what) => Self::NotFound(what),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) | DomainError::Conflict(msg) => {
                Self::Validation(msg)
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
