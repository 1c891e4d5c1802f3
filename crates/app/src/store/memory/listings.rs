//! In-memory listings collection.

use std::sync::{Arc, RwLock};

use agrimarket::listings::{Listing, ListingUpdate, ListingUuid, sort_newest_first};
use async_trait::async_trait;
use jiff::Timestamp;

use crate::store::{Feed, ListingQuery, ListingsRepository, StoreError};

use super::{Availability, Changes, read, spawn_feed, write};

#[derive(Debug, Default)]
struct Inner {
    listings: RwLock<Vec<Listing>>,
    changes: Changes,
    availability: Availability,
}

impl Inner {
    fn query(&self, query: ListingQuery, limit: usize) -> Result<Vec<Listing>, StoreError> {
        self.availability.check()?;

        let mut listings: Vec<Listing> = read(&self.listings)
            .iter()
            .filter(|listing| query.matches(listing))
            .cloned()
            .collect();

        sort_newest_first(&mut listings);
        listings.truncate(limit);

        Ok(listings)
    }
}

/// In-memory [`ListingsRepository`].
#[derive(Debug, Clone, Default)]
pub struct MemoryListingsRepository {
    inner: Arc<Inner>,
}

impl MemoryListingsRepository {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with [`StoreError::Unavailable`], or recover.
    pub fn set_offline(&self, offline: bool) {
        self.inner.availability.set_offline(offline);

        // Wake live queries so they report the outage.
        self.inner.changes.bump();
    }

    /// Number of stored listings.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.inner.listings).len()
    }

    /// Whether no listing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ListingsRepository for MemoryListingsRepository {
    fn allocate_id(&self) -> ListingUuid {
        ListingUuid::new()
    }

    async fn insert_listing(&self, mut listing: Listing) -> Result<Listing, StoreError> {
        self.inner.availability.check()?;

        {
            let mut listings = write(&self.inner.listings);

            if listings.iter().any(|stored| stored.id == listing.id) {
                return Err(StoreError::Backend(format!(
                    "listing {} already exists",
                    listing.id
                )));
            }

            listing.created_at = Some(Timestamp::now());
            listing.is_bookmarked = false;
            listings.push(listing.clone());
        }

        self.inner.changes.bump();

        Ok(listing)
    }

    async fn update_listing(
        &self,
        listing: ListingUuid,
        update: ListingUpdate,
    ) -> Result<Listing, StoreError> {
        self.inner.availability.check()?;

        let updated = {
            let mut listings = write(&self.inner.listings);

            let stored = listings
                .iter_mut()
                .find(|stored| stored.id == listing)
                .ok_or(StoreError::NotFound)?;

            update.apply(stored);

            stored.clone()
        };

        self.inner.changes.bump();

        Ok(updated)
    }

    async fn get_listing(&self, listing: ListingUuid) -> Result<Listing, StoreError> {
        self.inner.availability.check()?;

        read(&self.inner.listings)
            .iter()
            .find(|stored| stored.id == listing)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn watch_listings(
        &self,
        query: ListingQuery,
        limit: usize,
    ) -> Result<Feed<Listing>, StoreError> {
        self.inner.availability.check()?;

        let inner = Arc::clone(&self.inner);

        Ok(spawn_feed(self.inner.changes.subscribe(), move || {
            inner.query(query, limit)
        }))
    }
}
