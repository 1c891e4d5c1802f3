//! Listings synchronization.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use agrimarket::{
    compression::CompressionOptions,
    identity::{Identity, UserUuid},
    listings::{ImageSource, Listing, ListingDraft, ListingStatus, ListingUpdate, ListingUuid},
    roles::Role,
};
use jiff::Zoned;
use tokio::{
    sync::watch,
    task::{AbortHandle, JoinHandle},
};
use tracing::{debug, info, warn};

use crate::{
    auth::Session,
    listings::{ListingViews, ListingsError, View},
    store::{
        LISTING_QUERY_LIMIT, ListingQuery, ListingsRepository, ObjectStorage, StoreError,
        upload_compressed,
    },
};

/// The user the container is currently serving.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Caller {
    identity: Identity,
    role: Role,
}

/// Views plus the change counter observers wait on. Shared with background tasks.
#[derive(Debug)]
struct Shared {
    views: RwLock<ListingViews>,
    changed: watch::Sender<u64>,
}

impl Shared {
    fn new() -> Self {
        Self {
            views: RwLock::new(ListingViews::new()),
            changed: watch::Sender::new(0),
        }
    }

    fn update<R>(&self, change: impl FnOnce(&mut ListingViews) -> R) -> R {
        let result = {
            let mut views = self.views.write().unwrap_or_else(PoisonError::into_inner);

            change(&mut views)
        };

        self.changed
            .send_modify(|version| *version = version.wrapping_add(1));

        result
    }

    fn read<R>(&self, query: impl FnOnce(&ListingViews) -> R) -> R {
        query(&self.views.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A listing shown optimistically while its write is in flight.
#[derive(Debug)]
pub struct PendingListing {
    id: ListingUuid,
    handle: JoinHandle<Result<Listing, ListingsError>>,
}

impl PendingListing {
    /// Id of the listing being written.
    #[must_use]
    pub const fn id(&self) -> ListingUuid {
        self.id
    }

    /// Wait for the write to finish.
    ///
    /// # Errors
    ///
    /// Returns the store error that made the write fail. By then the listing has
    /// been removed from both views again.
    pub async fn persisted(self) -> Result<Listing, ListingsError> {
        self.handle.await.map_err(ListingsError::Interrupted)?
    }
}

/// Keeps "my listings" and "marketplace listings" in sync with the store while
/// showing the caller's own writes at once.
///
/// A standing subscription replaces the view matching the caller's role on every
/// snapshot. New listings are inserted locally as pending and persisted in the
/// background; a failed write removes them again.
pub struct ListingsSync {
    repository: Arc<dyn ListingsRepository>,
    storage: Arc<dyn ObjectStorage>,
    compression: CompressionOptions,
    shared: Arc<Shared>,
    caller: RwLock<Option<Caller>>,
    subscription: Mutex<Option<AbortHandle>>,
}

impl ListingsSync {
    /// Container over the given stores, not yet subscribed.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ListingsRepository>,
        storage: Arc<dyn ObjectStorage>,
        compression: CompressionOptions,
    ) -> Self {
        Self {
            repository,
            storage,
            compression,
            shared: Arc::new(Shared::new()),
            caller: RwLock::new(None),
            subscription: Mutex::new(None),
        }
    }

    /// Open the live query for `identity` acting as `role`, replacing any previous one.
    ///
    /// Farmers watch their own listings, buyers every active listing, newest first
    /// and capped at [`LISTING_QUERY_LIMIT`]. Switching user or role empties the views.
    ///
    /// # Errors
    ///
    /// Returns an error when the store refuses to open the query. The caller is
    /// still recorded, so listings can be created while offline.
    pub async fn subscribe(&self, role: Role, identity: Identity) -> Result<(), ListingsError> {
        self.unsubscribe();

        let user = identity.id;
        let caller = Caller { identity, role };

        let previous = self
            .caller
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(caller.clone());

        if previous.as_ref() != Some(&caller) {
            self.shared.update(ListingViews::clear);
        }

        let view = match role {
            Role::Farmer => View::Mine,
            Role::Buyer => View::Marketplace,
        };

        let mut feed = self
            .repository
            .watch_listings(ListingQuery::for_role(role, user), LISTING_QUERY_LIMIT)
            .await?;

        let shared = Arc::clone(&self.shared);

        let task = tokio::spawn(async move {
            while let Some(snapshot) = feed.next().await {
                match snapshot {
                    Ok(listings) => {
                        debug!(?view, count = listings.len(), "listings snapshot");

                        shared.update(|views| views.apply_snapshot(view, listings));
                    }
                    Err(error) => warn!(?view, "listings subscription error: {error}"),
                }
            }

            debug!(?view, "listings feed closed");
        });

        let replaced = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task.abort_handle());

        if let Some(replaced) = replaced {
            replaced.abort();
        }

        info!(%user, %role, "subscribed to listings");

        Ok(())
    }

    /// Tear down the live query. The views keep their last contents.
    pub fn unsubscribe(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(subscription) = subscription {
            subscription.abort();

            debug!("unsubscribed from listings");
        }
    }

    /// Unsubscribe, forget the caller and empty both views.
    pub fn reset(&self) {
        self.unsubscribe();

        *self.caller.write().unwrap_or_else(PoisonError::into_inner) = None;

        self.shared.update(ListingViews::clear);
    }

    /// Track a session: subscribe for its user and role, reset when it ends.
    ///
    /// The task holds only a weak reference and stops once the container is dropped.
    pub fn follow(
        self: &Arc<Self>,
        mut sessions: watch::Receiver<Option<Session>>,
    ) -> JoinHandle<()> {
        let sync = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let session = sessions.borrow_and_update().clone();

                let Some(this) = sync.upgrade() else {
                    break;
                };

                this.apply_session(session).await;

                drop(this);

                if sessions.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    async fn apply_session(&self, session: Option<Session>) {
        let Some(Session {
            identity,
            role: Some(role),
        }) = session
        else {
            self.reset();
            return;
        };

        let unchanged = self
            .caller()
            .is_some_and(|caller| caller.identity.id == identity.id && caller.role == role);

        if unchanged && self.is_subscribed() {
            return;
        }

        if let Err(error) = self.subscribe(role, identity).await {
            warn!("failed to subscribe to listings: {error}");
        }
    }

    /// Offer a new listing.
    ///
    /// The listing is in both views when this returns; the returned handle resolves
    /// once the write has been confirmed or rolled back. Any inline image is
    /// compressed and uploaded before the record is written.
    ///
    /// # Errors
    ///
    /// Returns [`ListingsError::Unauthenticated`] with no caller and
    /// [`ListingsError::NotPermitted`] for buyers.
    pub fn create_listing(&self, draft: ListingDraft) -> Result<PendingListing, ListingsError> {
        let caller = self.farmer()?;

        let id = self.repository.allocate_id();
        let listing = draft.into_listing(id, &caller.identity, Zoned::now().date());

        self.shared.update(|views| views.insert_pending(&listing));

        debug!(%id, "listing shown before write");

        let handle = tokio::spawn(persist(
            Arc::clone(&self.repository),
            Arc::clone(&self.storage),
            Arc::clone(&self.shared),
            self.compression,
            listing,
        ));

        Ok(PendingListing { id, handle })
    }

    /// Apply a partial update in the store. Local views change once the
    /// subscription delivers the result.
    ///
    /// # Errors
    ///
    /// Returns an error when the caller is not a farmer, the listing is unknown, or
    /// the image upload or the write fails.
    pub async fn update_listing(
        &self,
        listing: ListingUuid,
        mut update: ListingUpdate,
    ) -> Result<(), ListingsError> {
        let caller = self.farmer()?;

        if update.is_empty() {
            debug!(%listing, "ignoring empty listing update");

            return Ok(());
        }

        update.image = upload_inline_image(
            self.storage.as_ref(),
            self.compression,
            listing,
            update.image.take(),
        )
        .await?;

        self.repository.update_listing(listing, update).await?;

        info!(%listing, user = %caller.identity.id, "listing updated");

        Ok(())
    }

    /// Take a listing off the marketplace by setting it back to draft.
    ///
    /// # Errors
    ///
    /// See [`ListingsSync::update_listing`].
    pub async fn withdraw_listing(&self, listing: ListingUuid) -> Result<(), ListingsError> {
        self.update_listing(listing, ListingUpdate::status(ListingStatus::Draft))
            .await
    }

    /// Flip the local bookmark on a marketplace listing. Returns the new flag.
    ///
    /// # Errors
    ///
    /// Returns [`ListingsError::NotFound`] if the listing is not in the marketplace view.
    pub fn toggle_bookmark(&self, listing: ListingUuid) -> Result<bool, ListingsError> {
        self.shared
            .update(|views| views.toggle_bookmark(listing))
            .ok_or(ListingsError::NotFound)
    }

    /// The signed-in farmer's listings, newest first.
    #[must_use]
    pub fn my_listings(&self) -> Vec<Listing> {
        self.shared.read(|views| views.listings(View::Mine))
    }

    /// Active listings as buyers see them, newest first.
    #[must_use]
    pub fn marketplace_listings(&self) -> Vec<Listing> {
        self.shared.read(|views| views.listings(View::Marketplace))
    }

    /// Marketplace listings the caller has bookmarked.
    #[must_use]
    pub fn bookmarked_listings(&self) -> Vec<Listing> {
        self.shared.read(ListingViews::bookmarked)
    }

    /// Listings in "my listings" owned by `farmer`.
    #[must_use]
    pub fn listings_by_farmer(&self, farmer: UserUuid) -> Vec<Listing> {
        self.shared.read(|views| views.owned_by(farmer))
    }

    /// Ticks on every change to either view.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.changed.subscribe()
    }

    /// Whether a live subscription is running.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|subscription| !subscription.is_finished())
    }

    fn caller(&self) -> Option<Caller> {
        self.caller
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn farmer(&self) -> Result<Caller, ListingsError> {
        let caller = self.caller().ok_or(ListingsError::Unauthenticated)?;

        if caller.role != Role::Farmer {
            return Err(ListingsError::NotPermitted);
        }

        Ok(caller)
    }
}

impl Debug for ListingsSync {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ListingsSync")
            .field("compression", &self.compression)
            .field("caller", &self.caller())
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}

impl Drop for ListingsSync {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn persist(
    repository: Arc<dyn ListingsRepository>,
    storage: Arc<dyn ObjectStorage>,
    shared: Arc<Shared>,
    compression: CompressionOptions,
    listing: Listing,
) -> Result<Listing, ListingsError> {
    let id = listing.id;

    match write_listing(repository.as_ref(), storage.as_ref(), compression, listing).await {
        Ok(stored) => {
            shared.update(|views| views.confirm(&stored));

            info!(%id, "listing created");

            Ok(stored)
        }
        Err(error) => {
            shared.update(|views| views.rollback(id));

            warn!(%id, "listing write failed, removed from views: {error}");

            Err(error.into())
        }
    }
}

async fn write_listing(
    repository: &dyn ListingsRepository,
    storage: &dyn ObjectStorage,
    compression: CompressionOptions,
    mut listing: Listing,
) -> Result<Listing, StoreError> {
    listing.image = upload_inline_image(storage, compression, listing.id, listing.image.take())
        .await?;

    repository.insert_listing(listing).await
}

/// Swap an inline image for the reference URL of its uploaded copy.
async fn upload_inline_image(
    storage: &dyn ObjectStorage,
    compression: CompressionOptions,
    listing: ListingUuid,
    image: Option<ImageSource>,
) -> Result<Option<ImageSource>, StoreError> {
    match image {
        Some(ImageSource::Inline(data_url)) => {
            let path = format!("listings/{listing}/image");
            let url = upload_compressed(storage, &path, data_url, compression).await?;

            Ok(Some(ImageSource::Stored(url)))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use agrimarket::listings::ListingStatus;
    use testresult::TestResult;

    use crate::{
        store::{Feed, MockListingsRepository, memory::MemoryObjectStorage},
        test::{
            TestContext,
            helpers::{GatedListingsRepository, eventually, waste_draft},
        },
    };

    use super::*;

    #[tokio::test]
    async fn new_listing_is_in_both_views_before_the_write_completes() -> TestResult {
        let ctx = TestContext::new();
        let gated = GatedListingsRepository::new(ctx.memory.listings.clone());

        let sync = ListingsSync::new(
            Arc::new(gated.clone()),
            Arc::new(ctx.memory.storage.clone()),
            CompressionOptions::default(),
        );

        let farmer = ctx.sign_up_farmer().await?;
        sync.subscribe(Role::Farmer, farmer).await?;

        let pending = sync.create_listing(waste_draft("Rice Husk"))?;
        let id = pending.id();

        assert!(sync.my_listings().iter().any(|l| l.id == id));
        assert!(sync.marketplace_listings().iter().any(|l| l.id == id));
        assert!(ctx.memory.listings.is_empty());

        gated.release();

        let stored = pending.persisted().await?;

        assert_eq!(stored.id, id);
        assert!(stored.created_at.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn farmer_sees_exactly_one_active_listing_right_after_create() -> TestResult {
        let ctx = TestContext::new();
        let farmer = ctx.sign_up_farmer().await?;

        ctx.listings.subscribe(Role::Farmer, farmer.clone()).await?;

        let pending = ctx.listings.create_listing(ListingDraft {
            quantity: "500".to_string(),
            unit: "kg".to_string(),
            price: "5".to_string(),
            ..waste_draft("Rice Husk")
        })?;

        let mine = ctx.listings.my_listings();

        assert_eq!(mine.len(), 1);

        let listing = mine.first().ok_or("expected one listing")?;

        assert_eq!(listing.id, pending.id());
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.inquiries, Some(0));
        assert_eq!(listing.quantity, "500");
        assert_eq!(listing.farmer_id, farmer.id);
        assert_eq!(listing.farmer_name, "Ravi");

        pending.persisted().await?;

        let mut changes = ctx.listings.changes();
        eventually(&mut changes, || {
            ctx.listings
                .my_listings()
                .iter()
                .all(|listing| !listing.is_unconfirmed())
        })
        .await?;

        assert_eq!(ctx.listings.my_listings().len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn failed_write_removes_listing_from_both_views() -> TestResult {
        let ctx = TestContext::new();

        let mut repository = MockListingsRepository::new();
        repository.expect_allocate_id().returning(ListingUuid::new);
        repository
            .expect_watch_listings()
            .returning(|_, _| Ok(Feed::channel(1).1));
        repository
            .expect_insert_listing()
            .returning(|_| Err(StoreError::Unavailable));

        let sync = ListingsSync::new(
            Arc::new(repository),
            Arc::new(ctx.memory.storage.clone()),
            CompressionOptions::default(),
        );

        let farmer = ctx.sign_up_farmer().await?;
        sync.subscribe(Role::Farmer, farmer).await?;

        let pending = sync.create_listing(waste_draft("Rice Husk"))?;
        let id = pending.id();

        let result = pending.persisted().await;

        assert!(
            matches!(result, Err(ListingsError::Store(StoreError::Unavailable))),
            "expected Store(Unavailable), got {result:?}"
        );
        assert!(sync.my_listings().iter().all(|l| l.id != id));
        assert!(sync.marketplace_listings().iter().all(|l| l.id != id));

        Ok(())
    }

    #[tokio::test]
    async fn failed_image_upload_rolls_back_without_writing() -> TestResult {
        let ctx = TestContext::new();
        let storage = MemoryObjectStorage::new();
        storage.set_offline(true);

        let sync = ListingsSync::new(
            Arc::new(ctx.memory.listings.clone()),
            Arc::new(storage),
            CompressionOptions::default(),
        );

        let farmer = ctx.sign_up_farmer().await?;
        sync.subscribe(Role::Farmer, farmer).await?;

        let pending = sync.create_listing(ListingDraft {
            image: Some(ImageSource::Inline(
                "data:image/png;base64,bm90IGFuIGltYWdl".to_string(),
            )),
            ..waste_draft("Rice Husk")
        })?;

        assert!(pending.persisted().await.is_err());
        assert!(ctx.memory.listings.is_empty());
        assert!(sync.my_listings().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn creating_requires_a_signed_in_farmer() -> TestResult {
        let ctx = TestContext::new();

        let anonymous = ctx.listings.create_listing(waste_draft("Rice Husk"));

        assert!(
            matches!(anonymous, Err(ListingsError::Unauthenticated)),
            "expected Unauthenticated, got {anonymous:?}"
        );

        let buyer = ctx.sign_up_buyer().await?;
        ctx.listings.subscribe(Role::Buyer, buyer).await?;

        let as_buyer = ctx.listings.create_listing(waste_draft("Rice Husk"));

        assert!(
            matches!(as_buyer, Err(ListingsError::NotPermitted)),
            "expected NotPermitted, got {as_buyer:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn inline_image_is_uploaded_and_replaced_by_reference() -> TestResult {
        let ctx = TestContext::new();
        let farmer = ctx.sign_up_farmer().await?;

        ctx.listings.subscribe(Role::Farmer, farmer).await?;

        let inline = "data:image/png;base64,bm90IGFuIGltYWdl".to_string();

        let stored = ctx
            .listings
            .create_listing(ListingDraft {
                image: Some(ImageSource::Inline(inline.clone())),
                ..waste_draft("Rice Husk")
            })?
            .persisted()
            .await?;

        let Some(ImageSource::Stored(url)) = stored.image else {
            return Err("expected a stored image reference".into());
        };

        assert_eq!(ctx.memory.storage.get(&url), Some(inline));

        Ok(())
    }

    #[tokio::test]
    async fn updates_arrive_through_the_subscription() -> TestResult {
        let ctx = TestContext::new();
        let farmer = ctx.sign_up_farmer().await?;

        ctx.listings.subscribe(Role::Farmer, farmer).await?;

        let id = ctx
            .listings
            .create_listing(waste_draft("Rice Husk"))?
            .persisted()
            .await?
            .id;

        ctx.listings
            .update_listing(
                id,
                ListingUpdate {
                    price: Some("7".to_string()),
                    ..ListingUpdate::default()
                },
            )
            .await?;

        let mut changes = ctx.listings.changes();
        eventually(&mut changes, || {
            ctx.listings
                .my_listings()
                .iter()
                .any(|listing| listing.id == id && listing.price == "7")
        })
        .await?;

        Ok(())
    }

    #[tokio::test]
    async fn update_of_unknown_listing_is_not_found() -> TestResult {
        let ctx = TestContext::new();
        let farmer = ctx.sign_up_farmer().await?;

        ctx.listings.subscribe(Role::Farmer, farmer).await?;

        let result = ctx.listings.withdraw_listing(ListingUuid::new()).await;

        assert!(
            matches!(result, Err(ListingsError::NotFound)),
            "expected NotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn withdrawn_listing_leaves_the_marketplace() -> TestResult {
        let farmer_ctx = TestContext::new();
        let buyer_ctx = farmer_ctx.new_session();

        let farmer = farmer_ctx.sign_up_farmer().await?;
        let buyer = buyer_ctx.sign_up_buyer().await?;

        farmer_ctx.listings.subscribe(Role::Farmer, farmer).await?;
        buyer_ctx.listings.subscribe(Role::Buyer, buyer).await?;

        let id = farmer_ctx
            .listings
            .create_listing(waste_draft("Wheat Straw"))?
            .persisted()
            .await?
            .id;

        let mut changes = buyer_ctx.listings.changes();

        eventually(&mut changes, || {
            buyer_ctx.listings.marketplace_listings().iter().any(|l| l.id == id)
        })
        .await?;

        assert!(buyer_ctx.listings.toggle_bookmark(id)?);

        farmer_ctx.listings.withdraw_listing(id).await?;

        eventually(&mut changes, || {
            buyer_ctx.listings.marketplace_listings().is_empty()
        })
        .await?;

        assert!(buyer_ctx.listings.bookmarked_listings().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn subscription_errors_keep_the_last_snapshot() -> TestResult {
        let ctx = TestContext::new();
        let farmer = ctx.sign_up_farmer().await?;

        ctx.listings.subscribe(Role::Farmer, farmer).await?;
        ctx.listings
            .create_listing(waste_draft("Rice Husk"))?
            .persisted()
            .await?;

        ctx.memory.listings.set_offline(true);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(ctx.listings.my_listings().len(), 1);
        assert!(ctx.listings.is_subscribed());

        Ok(())
    }

    #[tokio::test]
    async fn listings_by_farmer_filters_my_listings() -> TestResult {
        let ctx = TestContext::new();
        let farmer = ctx.sign_up_farmer().await?;

        ctx.listings.subscribe(Role::Farmer, farmer.clone()).await?;
        ctx.listings.create_listing(waste_draft("Rice Husk"))?;

        assert_eq!(ctx.listings.listings_by_farmer(farmer.id).len(), 1);
        assert!(ctx.listings.listings_by_farmer(UserUuid::new()).is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn bookmarking_a_listing_outside_the_marketplace_is_not_found() {
        let ctx = TestContext::new();

        let result = ctx.listings.toggle_bookmark(ListingUuid::new());

        assert!(
            matches!(result, Err(ListingsError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn dropping_the_container_does_not_cancel_pending_writes() -> TestResult {
        let ctx = TestContext::new();
        let gated = GatedListingsRepository::new(ctx.memory.listings.clone());

        let sync = ListingsSync::new(
            Arc::new(gated.clone()),
            Arc::new(ctx.memory.storage.clone()),
            CompressionOptions::default(),
        );

        let farmer = ctx.sign_up_farmer().await?;
        sync.subscribe(Role::Farmer, farmer).await?;

        let pending = sync.create_listing(waste_draft("Rice Husk"))?;

        drop(sync);
        gated.release();

        pending.persisted().await?;

        assert_eq!(ctx.memory.listings.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn following_a_session_subscribes_and_resets() -> TestResult {
        let ctx = TestContext::new();
        let farmer = ctx.sign_up_farmer().await?;

        let (sessions, receiver) = watch::channel(None);
        let follower = ctx.listings.follow(receiver);

        sessions.send_replace(Some(Session {
            identity: farmer,
            role: Some(Role::Farmer),
        }));

        let mut changes = ctx.listings.changes();
        eventually(&mut changes, || ctx.listings.is_subscribed()).await?;

        ctx.listings.create_listing(waste_draft("Rice Husk"))?;

        sessions.send_replace(None);

        eventually(&mut changes, || {
            !ctx.listings.is_subscribed() && ctx.listings.my_listings().is_empty()
        })
        .await?;

        follower.abort();

        Ok(())
    }
}
