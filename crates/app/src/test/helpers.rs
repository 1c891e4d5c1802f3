//! Test Helpers

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use agrimarket::{
    conversations::{Conversation, ConversationId, Message, Participant},
    identity::UserUuid,
    listings::{Listing, ListingDraft, ListingUpdate, ListingUuid},
    profiles::{ProfileUpdate, UserProfile},
};
use async_trait::async_trait;
use jiff::Timestamp;
use testresult::TestResult;
use tokio::{
    sync::{Notify, Semaphore, watch},
    task::yield_now,
    time::{Instant, timeout},
};

use crate::store::{
    ConversationsRepository, Feed, ListingQuery, ListingsRepository, ProfilesRepository,
    StoreError,
    memory::{MemoryConversationsRepository, MemoryListingsRepository, MemoryProfilesRepository},
};

const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Listings store whose inserts wait until the test lets them through.
#[derive(Debug, Clone)]
pub(crate) struct GatedListingsRepository {
    inner: MemoryListingsRepository,
    gate: Arc<Semaphore>,
}

impl GatedListingsRepository {
    pub(crate) fn new(inner: MemoryListingsRepository) -> Self {
        Self {
            inner,
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let one waiting or future insert through.
    pub(crate) fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl ListingsRepository for GatedListingsRepository {
    fn allocate_id(&self) -> ListingUuid {
        self.inner.allocate_id()
    }

    async fn insert_listing(&self, listing: Listing) -> Result<Listing, StoreError> {
        self.gate
            .acquire()
            .await
            .map_err(|error| StoreError::Backend(error.to_string()))?
            .forget();

        self.inner.insert_listing(listing).await
    }

    async fn update_listing(
        &self,
        listing: ListingUuid,
        update: ListingUpdate,
    ) -> Result<Listing, StoreError> {
        self.inner.update_listing(listing, update).await
    }

    async fn get_listing(&self, listing: ListingUuid) -> Result<Listing, StoreError> {
        self.inner.get_listing(listing).await
    }

    async fn watch_listings(
        &self,
        query: ListingQuery,
        limit: usize,
    ) -> Result<Feed<Listing>, StoreError> {
        self.inner.watch_listings(query, limit).await
    }
}

/// Profiles store whose first read is held back after fetching, until the test
/// releases it.
#[derive(Debug, Clone)]
pub(crate) struct GatedProfilesRepository {
    inner: MemoryProfilesRepository,
    armed: Arc<AtomicBool>,
    blocked: Arc<Notify>,
    gate: Arc<Notify>,
}

impl GatedProfilesRepository {
    pub(crate) fn new(inner: MemoryProfilesRepository) -> Self {
        Self {
            inner,
            armed: Arc::new(AtomicBool::new(true)),
            blocked: Arc::new(Notify::new()),
            gate: Arc::new(Notify::new()),
        }
    }

    /// Resolves once the first read has fetched its snapshot and is waiting.
    pub(crate) async fn first_read_blocked(&self) {
        self.blocked.notified().await;
    }

    pub(crate) fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl ProfilesRepository for GatedProfilesRepository {
    async fn get_profile(&self, user: UserUuid) -> Result<UserProfile, StoreError> {
        let profile = self.inner.get_profile(user).await;

        if self.armed.swap(false, Ordering::SeqCst) {
            self.blocked.notify_one();
            self.gate.notified().await;
        }

        profile
    }

    async fn put_profile(&self, profile: UserProfile) -> Result<(), StoreError> {
        self.inner.put_profile(profile).await
    }

    async fn update_profile(
        &self,
        user: UserUuid,
        update: ProfileUpdate,
    ) -> Result<UserProfile, StoreError> {
        self.inner.update_profile(user, update).await
    }
}

/// Conversations store that yields to the scheduler around every call, so
/// concurrent callers interleave at each await point.
#[derive(Debug, Clone)]
pub(crate) struct YieldingConversationsRepository {
    inner: MemoryConversationsRepository,
}

impl YieldingConversationsRepository {
    pub(crate) fn new(inner: MemoryConversationsRepository) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ConversationsRepository for YieldingConversationsRepository {
    async fn get_conversation(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let snapshot = self.inner.get_conversation(conversation).await;
        yield_now().await;
        snapshot
    }

    async fn record_message(
        &self,
        sender: Participant,
        receiver: Participant,
        body: &str,
        at: Timestamp,
    ) -> Result<Conversation, StoreError> {
        yield_now().await;
        self.inner.record_message(sender, receiver, body, at).await
    }

    async fn reset_unread(
        &self,
        conversation: &ConversationId,
        user: UserUuid,
    ) -> Result<(), StoreError> {
        yield_now().await;
        self.inner.reset_unread(conversation, user).await
    }

    async fn accept(
        &self,
        conversation: &ConversationId,
        at: Timestamp,
    ) -> Result<Conversation, StoreError> {
        yield_now().await;
        self.inner.accept(conversation, at).await
    }

    async fn append_message(&self, message: Message) -> Result<Message, StoreError> {
        let stored = self.inner.append_message(message).await;
        yield_now().await;
        stored
    }

    async fn list_messages(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        self.inner.list_messages(conversation).await
    }

    async fn watch_conversations(&self, user: UserUuid) -> Result<Feed<Conversation>, StoreError> {
        self.inner.watch_conversations(user).await
    }
}

/// Wait until `condition` holds, re-checking on every change and at a short
/// interval, for at most two seconds.
pub(crate) async fn eventually(
    changes: &mut watch::Receiver<u64>,
    condition: impl Fn() -> bool,
) -> TestResult {
    let deadline = Instant::now() + EVENTUALLY_TIMEOUT;

    while !condition() {
        if Instant::now() >= deadline {
            return Err("condition not met in time".into());
        }

        // Either outcome means "check again".
        _ = timeout(POLL_INTERVAL, changes.changed()).await;
    }

    Ok(())
}

pub(crate) fn waste_draft(title: &str) -> ListingDraft {
    ListingDraft {
        title: title.to_string(),
        quantity: "200".to_string(),
        unit: "kg".to_string(),
        price: "4".to_string(),
        description: "Dry, stored under cover".to_string(),
        availability: "Immediate".to_string(),
        quality: "Good".to_string(),
        confidence: Some(88),
        location: "Ludhiana, Punjab".to_string(),
        image: None,
    }
}
