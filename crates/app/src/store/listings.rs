//! Listings collection.

use agrimarket::{
    identity::UserUuid,
    listings::{Listing, ListingStatus, ListingUpdate, ListingUuid},
    roles::Role,
};
use async_trait::async_trait;
use mockall::automock;

use crate::store::{Feed, StoreError};

/// Most listings a live query returns.
pub const LISTING_QUERY_LIMIT: usize = 100;

/// What a live listings query selects. Results are always newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingQuery {
    /// Every listing owned by one farmer, whatever its status.
    OwnedBy(UserUuid),

    /// Every active listing.
    Active,
}

impl ListingQuery {
    /// The query a user acting as `role` watches.
    #[must_use]
    pub const fn for_role(role: Role, user: UserUuid) -> Self {
        match role {
            Role::Farmer => Self::OwnedBy(user),
            Role::Buyer => Self::Active,
        }
    }

    /// Whether `listing` belongs in this query's results.
    #[must_use]
    pub fn matches(&self, listing: &Listing) -> bool {
        match self {
            Self::OwnedBy(owner) => listing.farmer_id == *owner,
            Self::Active => listing.status == ListingStatus::Active,
        }
    }
}

/// The listings collection.
#[automock]
#[async_trait]
pub trait ListingsRepository: Send + Sync {
    /// Reserve an id for a listing that has not been written yet.
    fn allocate_id(&self) -> ListingUuid;

    /// Write a new listing. The stored copy carries the server creation time.
    async fn insert_listing(&self, listing: Listing) -> Result<Listing, StoreError>;

    /// Apply a partial update and return the stored result.
    async fn update_listing(
        &self,
        listing: ListingUuid,
        update: ListingUpdate,
    ) -> Result<Listing, StoreError>;

    async fn get_listing(&self, listing: ListingUuid) -> Result<Listing, StoreError>;

    /// Open a live query returning at most `limit` listings.
    async fn watch_listings(
        &self,
        query: ListingQuery,
        limit: usize,
    ) -> Result<Feed<Listing>, StoreError>;
}
