//! App Context

use std::sync::Arc;

use agrimarket::compression::CompressionOptions;
use tokio::task::JoinHandle;

use crate::{
    auth::{AuthService, AuthSession, MemoryRoleCache, RoleCache},
    listings::ListingsSync,
    messaging::{MessagingService, StoreMessagingService},
    profiles::{ProfilesService, StoreProfilesService},
    store::{
        ConversationsRepository, IdentityProvider, ListingsRepository, ObjectStorage,
        ProfilesRepository,
        memory::{
            MemoryConversationsRepository, MemoryIdentityProvider, MemoryListingsRepository,
            MemoryObjectStorage, MemoryProfilesRepository,
        },
    },
};

/// The remote collaborators one client session talks to.
#[derive(Clone)]
pub struct Backends {
    /// Accounts and the signed-in identity.
    pub identity: Arc<dyn IdentityProvider>,

    /// Listings collection.
    pub listings: Arc<dyn ListingsRepository>,

    /// Profile documents.
    pub profiles: Arc<dyn ProfilesRepository>,

    /// Conversations and messages.
    pub conversations: Arc<dyn ConversationsRepository>,

    /// Uploaded images.
    pub storage: Arc<dyn ObjectStorage>,

    /// This device's role cache.
    pub role_cache: Arc<dyn RoleCache>,
}

/// In-process stores shared by any number of client sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackends {
    /// Shared accounts.
    pub identity: MemoryIdentityProvider,

    /// Shared listings.
    pub listings: MemoryListingsRepository,

    /// Shared profiles.
    pub profiles: MemoryProfilesRepository,

    /// Shared conversations.
    pub conversations: MemoryConversationsRepository,

    /// Shared image storage.
    pub storage: MemoryObjectStorage,
}

impl MemoryBackends {
    /// Empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backends for a new client: shared documents, its own sign-in and an
    /// in-memory role cache.
    #[must_use]
    pub fn session(&self) -> Backends {
        self.session_with_cache(Arc::new(MemoryRoleCache::new()))
    }

    /// Like [`MemoryBackends::session`], with the given role cache.
    #[must_use]
    pub fn session_with_cache(&self, role_cache: Arc<dyn RoleCache>) -> Backends {
        Backends {
            identity: Arc::new(self.identity.new_session()),
            listings: Arc::new(self.listings.clone()),
            profiles: Arc::new(self.profiles.clone()),
            conversations: Arc::new(self.conversations.clone()),
            storage: Arc::new(self.storage.clone()),
            role_cache,
        }
    }
}

/// Background tasks tied to a context, stopped with its last clone.
#[derive(Debug)]
struct Followers(Vec<JoinHandle<()>>);

impl Drop for Followers {
    fn drop(&mut self) {
        for follower in &self.0 {
            follower.abort();
        }
    }
}

/// Everything a signed-in client works with.
///
/// The listings container follows the auth session: it subscribes once a role is
/// known and empties its views on sign-out.
#[derive(Clone)]
pub struct AppContext {
    /// Sign-in state and role.
    pub auth: Arc<dyn AuthService>,

    /// Listing views kept in sync with the store.
    pub listings: Arc<ListingsSync>,

    /// Buyer-farmer conversations.
    pub messaging: Arc<dyn MessagingService>,

    /// The signed-in user's profile.
    pub profiles: Arc<dyn ProfilesService>,
    _followers: Arc<Followers>,
}

impl AppContext {
    /// Wire services over `backends` and start following the signed-in identity.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(backends: Backends, compression: CompressionOptions) -> Self {
        let auth = AuthSession::new(
            Arc::clone(&backends.identity),
            Arc::clone(&backends.profiles),
            backends.role_cache,
        );

        let listings = Arc::new(ListingsSync::new(
            backends.listings,
            Arc::clone(&backends.storage),
            compression,
        ));

        let followers = Followers(vec![
            auth.follow_identity(),
            listings.follow(auth.role_changes()),
        ]);

        Self {
            listings,
            messaging: Arc::new(StoreMessagingService::new(backends.conversations)),
            profiles: Arc::new(StoreProfilesService::new(
                backends.profiles,
                backends.storage,
                compression,
            )),
            auth: Arc::new(auth),
            _followers: Arc::new(followers),
        }
    }
}

#[cfg(test)]
mod tests {
    use agrimarket::roles::Role;
    use testresult::TestResult;

    use crate::test::helpers::{eventually, waste_draft};

    use super::*;

    #[tokio::test]
    async fn listings_follow_the_signed_in_role() -> TestResult {
        let memory = MemoryBackends::new();
        let app = AppContext::new(memory.session(), CompressionOptions::default());

        app.auth
            .sign_up("ravi@example.com", "secret1", "Ravi", Role::Farmer)
            .await?;

        let mut changes = app.listings.changes();
        eventually(&mut changes, || app.listings.is_subscribed()).await?;

        app.listings
            .create_listing(waste_draft("Rice Husk"))?
            .persisted()
            .await?;

        assert_eq!(app.listings.my_listings().len(), 1);

        app.auth.sign_out().await?;

        eventually(&mut changes, || {
            !app.listings.is_subscribed() && app.listings.my_listings().is_empty()
        })
        .await?;

        assert_eq!(memory.listings.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn sessions_share_documents_but_not_sign_in() -> TestResult {
        let memory = MemoryBackends::new();
        let farmer = AppContext::new(memory.session(), CompressionOptions::default());
        let buyer = AppContext::new(memory.session(), CompressionOptions::default());

        farmer
            .auth
            .sign_up("ravi@example.com", "secret1", "Ravi", Role::Farmer)
            .await?;

        assert!(farmer.auth.session().is_some());
        assert!(buyer.auth.session().is_none());

        let identity = buyer.auth.sign_in("ravi@example.com", "secret1").await?;

        let mut changes = buyer.auth.role_changes();
        changes
            .wait_for(|session| session.as_ref().and_then(|s| s.role) == Some(Role::Farmer))
            .await?;

        assert_eq!(identity.display_name.as_deref(), Some("Ravi"));

        Ok(())
    }
}
