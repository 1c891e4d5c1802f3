//! Profiles service errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ProfilesError {
    #[error("profile not found")]
    NotFound,

    #[error("profile store error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for ProfilesError {
    fn from(error: StoreError) -> Self {
        if matches!(error, StoreError::NotFound) {
            return Self::NotFound;
        }

        Self::Store(error)
    }
}
