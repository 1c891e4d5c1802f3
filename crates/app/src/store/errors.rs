//! Store errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not be reached. Callers treat this as "offline".
    #[error("store unavailable")]
    Unavailable,

    #[error("record not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("store error: {0}")]
    Backend(String),
}
