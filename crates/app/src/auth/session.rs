//! Auth session.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use agrimarket::{
    identity::Identity,
    profiles::UserProfile,
    roles::Role,
    validation::{validate_sign_in, validate_sign_up},
};
use async_trait::async_trait;
use mockall::automock;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    auth::{AuthError, RoleCache},
    store::{IdentityProvider, ProfilesRepository, StoreError},
};

/// The signed-in identity and the role it is acting as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The signed-in account.
    pub identity: Identity,

    /// `None` until a role has been chosen or resolved.
    pub role: Option<Role>,
}

/// Sign-up, sign-in and the role a client is acting as.
#[automock]
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register an account, store its profile and start acting as `role`.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Sign in through the federated provider.
    ///
    /// A first-time user gets a profile acting as `role`; a returning user keeps the
    /// role stored in their profile.
    async fn sign_in_with_provider(&self, role: Role) -> Result<Identity, AuthError>;

    /// Sign out and forget the cached role.
    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn send_email_verification(&self) -> Result<(), AuthError>;

    /// Act as `role` from now on, on this device and in the profile document.
    async fn set_role(&self, role: Role) -> Result<(), AuthError>;

    /// Forget the chosen role without signing out.
    fn clear_role(&self);

    fn session(&self) -> Option<Session>;

    /// The resolved session, updated on every sign-in, sign-out and role change.
    fn role_changes(&self) -> watch::Receiver<Option<Session>>;
}

struct Inner {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfilesRepository>,
    cache: Arc<dyn RoleCache>,
    session: watch::Sender<Option<Session>>,

    /// Bumped on every identity change and every explicit role choice, so late
    /// reconciliations can tell they are stale.
    generation: AtomicU64,
}

/// [`AuthService`] over an identity provider, the profiles collection and a local
/// role cache.
///
/// On every identity change the cached role is published at once; the profile
/// document is then fetched in the background and, when it disagrees, wins.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Inner>,
}

impl AuthSession {
    /// Session over the given collaborators, starting signed out.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfilesRepository>,
        cache: Arc<dyn RoleCache>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity,
                profiles,
                cache,
                session: watch::Sender::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Resolve the role for a new identity.
    ///
    /// Publishes the cached role immediately and returns the task reconciling it with
    /// the profile document. `None` signs the session out and returns no task.
    pub fn on_identity_changed(&self, identity: Option<Identity>) -> Option<JoinHandle<()>> {
        let generation = self.inner.supersede();

        let Some(identity) = identity else {
            self.inner.session.send_replace(None);

            debug!("session cleared");

            return None;
        };

        let cached = self.inner.cache.load(identity.id);

        debug!(user = %identity.id, ?cached, "publishing cached role");

        self.inner.session.send_replace(Some(Session {
            identity: identity.clone(),
            role: cached,
        }));

        let inner = Arc::clone(&self.inner);

        Some(tokio::spawn(async move {
            inner.reconcile(generation, identity, cached).await;
        }))
    }

    /// Follow identity changes the provider makes on its own, such as an expired
    /// session or a sign-in restored at start-up.
    pub fn follow_identity(&self) -> JoinHandle<()> {
        let session = self.clone();
        let mut changes = self.inner.identity.identity_changes();

        tokio::spawn(async move {
            loop {
                let identity = changes.borrow_and_update().clone();

                let current = session.session().map(|s| s.identity.id);

                if identity.as_ref().map(|i| i.id) != current {
                    session.on_identity_changed(identity);
                }

                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn signed_in(&self) -> Result<Identity, AuthError> {
        self.session()
            .map(|session| session.identity)
            .ok_or(AuthError::NotSignedIn)
    }

    fn publish_role(&self, role: Option<Role>) {
        self.inner.session.send_if_modified(|session| match session {
            Some(session) if session.role != role => {
                session.role = role;
                true
            }
            _ => false,
        });
    }
}

impl Inner {
    /// Start a new generation, returning it.
    fn supersede(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    async fn reconcile(&self, generation: u64, identity: Identity, cached: Option<Role>) {
        let profile = match self.profiles.get_profile(identity.id).await {
            Ok(profile) => profile,
            Err(StoreError::Unavailable) => {
                debug!(user = %identity.id, "profile store offline; keeping cached role");

                return;
            }
            Err(StoreError::NotFound) => {
                debug!(user = %identity.id, "no profile document; keeping cached role");

                return;
            }
            Err(error) => {
                warn!(user = %identity.id, "failed to fetch profile for role: {error}");

                return;
            }
        };

        if cached == Some(profile.role) {
            return;
        }

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(user = %identity.id, "session changed during role lookup; discarding");

            return;
        }

        self.cache.store(identity.id, profile.role);

        self.session.send_if_modified(|session| match session {
            Some(session) if session.identity.id == identity.id => {
                session.role = Some(profile.role);
                true
            }
            _ => false,
        });

        info!(user = %identity.id, role = %profile.role, "role resolved from profile");
    }
}

#[async_trait]
impl AuthService for AuthSession {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<Identity, AuthError> {
        validate_sign_up(email, password, display_name)?;

        let identity = self
            .inner
            .identity
            .create_account(email, password, display_name)
            .await?;

        self.inner
            .profiles
            .put_profile(UserProfile::new(&identity, role))
            .await?;

        self.inner.cache.store(identity.id, role);

        self.on_identity_changed(Some(identity.clone()));

        info!(user = %identity.id, %role, "account created");

        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        validate_sign_in(email, password)?;

        let identity = self.inner.identity.sign_in(email, password).await?;

        self.on_identity_changed(Some(identity.clone()));

        info!(user = %identity.id, "signed in");

        Ok(identity)
    }

    async fn sign_in_with_provider(&self, role: Role) -> Result<Identity, AuthError> {
        let identity = self.inner.identity.sign_in_with_provider().await?;

        let role = match self.inner.profiles.get_profile(identity.id).await {
            Ok(profile) => profile.role,
            Err(StoreError::NotFound) => {
                self.inner
                    .profiles
                    .put_profile(UserProfile::new(&identity, role))
                    .await?;

                info!(user = %identity.id, %role, "profile created on first federated sign-in");

                role
            }
            Err(error) => return Err(error.into()),
        };

        self.inner.cache.store(identity.id, role);

        self.on_identity_changed(Some(identity.clone()));

        info!(user = %identity.id, %role, "signed in with provider");

        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.inner.identity.sign_out().await?;

        self.inner.cache.clear();
        self.on_identity_changed(None);

        info!("signed out");

        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.inner.identity.send_password_reset(email).await?;

        info!("password reset requested");

        Ok(())
    }

    async fn send_email_verification(&self) -> Result<(), AuthError> {
        let identity = self.signed_in()?;

        self.inner.identity.send_email_verification().await?;

        info!(user = %identity.id, "verification email requested");

        Ok(())
    }

    async fn set_role(&self, role: Role) -> Result<(), AuthError> {
        let identity = self.signed_in()?;

        self.inner.supersede();

        let profile = match self.inner.profiles.get_profile(identity.id).await {
            Ok(profile) => UserProfile { role, ..profile },
            Err(StoreError::NotFound) => UserProfile::new(&identity, role),
            Err(error) => return Err(error.into()),
        };

        self.inner.profiles.put_profile(profile).await?;

        self.inner.cache.store(identity.id, role);
        self.publish_role(Some(role));

        info!(user = %identity.id, %role, "role selected");

        Ok(())
    }

    fn clear_role(&self) {
        self.inner.supersede();
        self.inner.cache.clear();
        self.publish_role(None);
    }

    fn session(&self) -> Option<Session> {
        self.inner.session.borrow().clone()
    }

    fn role_changes(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session.subscribe()
    }
}
