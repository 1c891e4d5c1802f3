//! Auth service errors.

use agrimarket::validation::ValidationErrors;
use thiserror::Error;

use crate::store::{IdentityError, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email already in use")]
    EmailInUse,

    #[error("password is too weak")]
    WeakPassword,

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("no user is signed in")]
    NotSignedIn,

    #[error("no account for this email")]
    UserNotFound,

    #[error("sign-in was cancelled")]
    Cancelled,

    #[error("identity provider unavailable")]
    Unavailable,

    #[error("identity provider error")]
    Identity(#[source] IdentityError),

    #[error("profile store error")]
    Store(#[from] StoreError),
}

impl From<IdentityError> for AuthError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::InvalidCredentials => Self::InvalidCredentials,
            IdentityError::EmailInUse => Self::EmailInUse,
            IdentityError::WeakPassword => Self::WeakPassword,
            IdentityError::UserNotFound => Self::UserNotFound,
            IdentityError::NotSignedIn => Self::NotSignedIn,
            IdentityError::Cancelled => Self::Cancelled,
            IdentityError::Unavailable => Self::Unavailable,
            IdentityError::Backend(_) => Self::Identity(error),
        }
    }
}
