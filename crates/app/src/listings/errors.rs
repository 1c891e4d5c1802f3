//! Listings service errors.

use thiserror::Error;
use tokio::task::JoinError;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ListingsError {
    #[error("sign in to manage listings")]
    Unauthenticated,

    #[error("only farmers can manage listings")]
    NotPermitted,

    #[error("listing not found")]
    NotFound,

    #[error("listing store error")]
    Store(#[source] StoreError),

    #[error("listing write was interrupted")]
    Interrupted(#[source] JoinError),
}

impl From<StoreError> for ListingsError {
    fn from(error: StoreError) -> Self {
        if matches!(error, StoreError::NotFound) {
            return Self::NotFound;
        }

        Self::Store(error)
    }
}
