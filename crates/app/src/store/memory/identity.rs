//! In-memory identity provider.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use agrimarket::{
    identity::{Identity, UserUuid},
    validation::MIN_PASSWORD_LENGTH,
};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::watch;

use crate::store::{IdentityError, IdentityProvider};

use super::{read, write};

/// Emails the provider would have sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    /// Reset link for the account with this email.
    PasswordReset(String),

    /// Verification link to this address.
    Verification(String),
}

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,

    /// `None` for accounts only ever used through the federated provider.
    password: Option<String>,
}

/// What the federated provider's consent screen hands back.
#[derive(Debug, Clone)]
struct FederatedChoice {
    email: String,
    display_name: String,
}

#[derive(Debug, Default)]
struct Directory {
    accounts: RwLock<FxHashMap<String, Account>>,
    outbox: Mutex<Vec<SentEmail>>,
    offline: RwLock<bool>,
}

/// Accounts shared by every session created from the same provider; the signed-in
/// identity is per session.
#[derive(Debug, Clone)]
pub struct MemoryIdentityProvider {
    directory: Arc<Directory>,
    current: Arc<watch::Sender<Option<Identity>>>,
    federated: Arc<RwLock<Option<FederatedChoice>>>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self {
            directory: Arc::default(),
            current: Arc::new(watch::Sender::new(None)),
            federated: Arc::default(),
        }
    }
}

impl MemoryIdentityProvider {
    /// A provider with no accounts, signed out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A second client against the same accounts, starting signed out.
    #[must_use]
    pub fn new_session(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            current: Arc::new(watch::Sender::new(None)),
            federated: Arc::default(),
        }
    }

    /// The account this session's next federated sign-in picks on the consent
    /// screen. Without one, federated sign-in is cancelled.
    pub fn choose_federated_account(&self, email: &str, display_name: &str) {
        *write(&self.federated) = Some(FederatedChoice {
            email: email.trim().to_string(),
            display_name: display_name.trim().to_string(),
        });
    }

    /// Fail every call with [`IdentityError::Unavailable`] while `offline`.
    pub fn set_offline(&self, offline: bool) {
        *write(&self.directory.offline) = offline;
    }

    /// Emails sent so far, oldest first.
    #[must_use]
    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.directory
            .outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sign out from the provider side, as an expired session would.
    pub fn expire_session(&self) {
        self.current.send_replace(None);
    }

    fn check(&self) -> Result<(), IdentityError> {
        if *read(&self.directory.offline) {
            return Err(IdentityError::Unavailable);
        }

        Ok(())
    }

    fn send(&self, email: SentEmail) {
        self.directory
            .outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email);
    }
}

fn account_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, IdentityError> {
        self.check()?;

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(IdentityError::WeakPassword);
        }

        let identity = {
            let mut accounts = write(&self.directory.accounts);
            let key = account_key(email);

            if accounts.contains_key(&key) {
                return Err(IdentityError::EmailInUse);
            }

            let identity = Identity {
                display_name: Some(display_name.trim().to_string()),
                ..Identity::new(UserUuid::new(), email.trim())
            };

            accounts.insert(
                key,
                Account {
                    identity: identity.clone(),
                    password: Some(password.to_string()),
                },
            );

            identity
        };

        self.current.send_replace(Some(identity.clone()));

        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        self.check()?;

        let identity = read(&self.directory.accounts)
            .get(&account_key(email))
            .filter(|account| account.password.as_deref() == Some(password))
            .map(|account| account.identity.clone())
            .ok_or(IdentityError::InvalidCredentials)?;

        self.current.send_replace(Some(identity.clone()));

        Ok(identity)
    }

    async fn sign_in_with_provider(&self) -> Result<Identity, IdentityError> {
        self.check()?;

        let choice = write(&self.federated)
            .take()
            .ok_or(IdentityError::Cancelled)?;

        let identity = write(&self.directory.accounts)
            .entry(account_key(&choice.email))
            .or_insert_with(|| Account {
                identity: Identity {
                    display_name: Some(choice.display_name),
                    ..Identity::new(UserUuid::new(), &choice.email)
                },
                password: None,
            })
            .identity
            .clone();

        self.current.send_replace(Some(identity.clone()));

        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.check()?;

        self.current.send_replace(None);

        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        self.check()?;

        let key = account_key(email);

        if !read(&self.directory.accounts).contains_key(&key) {
            return Err(IdentityError::UserNotFound);
        }

        self.send(SentEmail::PasswordReset(key));

        Ok(())
    }

    async fn send_email_verification(&self) -> Result<(), IdentityError> {
        self.check()?;

        let identity = self.current_identity().ok_or(IdentityError::NotSignedIn)?;

        self.send(SentEmail::Verification(identity.email));

        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}
