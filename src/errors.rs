use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced to callers of the data service.
///
/// Variants mirror the taxonomy the dispatch framework understands; store
/// failures reach it only through [`normalize`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("General error: {0}")]
    GeneralError(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// Shorthand for the error `get` raises when nothing matches `id`.
    #[must_use]
    pub fn not_found(id: &bson::Bson) -> Self {
        Self::NotFound(format!("No record found for id '{}'", crate::types::display_id(id)))
    }

    /// HTTP-style status code the dispatch framework reports for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::BadRequest(_) => 400,
            Self::Conflict(_) => 409,
            Self::Unavailable(_) => 503,
            Self::GeneralError(_) | Self::Config(_) => 500,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Maps a store driver failure onto the service taxonomy.
///
/// Every store-facing call in the service converts through here, either
/// directly or via the `From` impl below.
#[must_use]
pub fn normalize(err: StoreError) -> ServiceError {
    let mapped = match err {
        StoreError::DuplicateKey(key) => {
            ServiceError::Conflict(format!("duplicate key: {key}"))
        }
        StoreError::InvalidFilter(msg) | StoreError::InvalidUpdate(msg) => {
            ServiceError::BadRequest(msg)
        }
        StoreError::Unavailable(msg) => ServiceError::Unavailable(msg),
        StoreError::Internal(msg) => ServiceError::GeneralError(msg),
    };
    log::warn!("store error normalized: {mapped}");
    mapped
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        normalize(err)
    }
}
