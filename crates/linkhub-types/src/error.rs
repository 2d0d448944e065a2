use thiserror::Error;

/// Error taxonomy shared by every service operation.
///
/// `NotFound` covers absent or soft-deleted aggregates; `Duplicate` covers
/// registrar uniqueness violations; `Unauthorized` covers visibility and
/// business-rule violations; `Conflict` is an optimistic-version clash that
/// survived its retry budget on a synchronous path.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage backend fault. Not part of the caller-facing taxonomy.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn duplicate(what: impl Into<String>) -> Self {
        Self::Duplicate(what.into())
    }

    pub fn unauthorized(what: impl Into<String>) -> Self {
        Self::Unauthorized(what.into())
    }
}
