//! Identity provider.

use agrimarket::identity::Identity;
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email already in use")]
    EmailInUse,

    #[error("password rejected as too weak")]
    WeakPassword,

    #[error("no account for this email")]
    UserNotFound,

    #[error("no user is signed in")]
    NotSignedIn,

    /// The user closed the federated provider's consent screen.
    #[error("federated sign-in cancelled")]
    Cancelled,

    #[error("identity provider unavailable")]
    Unavailable,

    #[error("identity provider error: {0}")]
    Backend(String),
}

/// Email/password and federated accounts, and the current session of one client.
#[automock]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register an account and sign it in.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, IdentityError>;

    /// Sign in through the federated provider, registering the account on first use.
    async fn sign_in_with_provider(&self) -> Result<Identity, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError>;

    /// Send a verification link to the signed-in user.
    async fn send_email_verification(&self) -> Result<(), IdentityError>;

    fn current_identity(&self) -> Option<Identity>;

    /// Every sign-in and sign-out, including ones the provider initiates.
    fn identity_changes(&self) -> watch::Receiver<Option<Identity>>;
}
