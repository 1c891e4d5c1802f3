//! Messaging service errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("cannot message yourself")]
    SameParticipant,

    #[error("conversation not found")]
    NotFound,

    #[error("not a participant of this conversation")]
    NotParticipant,

    #[error("conversation store error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for MessagingError {
    fn from(error: StoreError) -> Self {
        if matches!(error, StoreError::NotFound) {
            return Self::NotFound;
        }

        Self::Store(error)
    }
}
