//! Listing Ordering

use std::cmp::Reverse;

use jiff::Timestamp;

use crate::listings::Listing;

/// Sort key for listings.
///
/// A listing whose server timestamp has not arrived yet counts as newer than every
/// confirmed listing, so a freshly created lot stays pinned at the top until the
/// store acknowledges it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EffectiveTimestamp {
    /// Server-assigned creation time.
    Confirmed(Timestamp),

    /// Write still in flight.
    Pending,
}

impl EffectiveTimestamp {
    /// Key for `listing`.
    #[must_use]
    pub fn of(listing: &Listing) -> Self {
        listing.created_at.map_or(Self::Pending, Self::Confirmed)
    }

    /// Sort key placing `listing` newest first, pending writes on top.
    #[must_use]
    pub fn newest_first(listing: &Listing) -> Reverse<Self> {
        Reverse(Self::of(listing))
    }
}

/// Sort newest first. Stable, so equal keys keep their relative order.
pub fn sort_newest_first(listings: &mut [Listing]) {
    listings.sort_by_key(EffectiveTimestamp::newest_first);
}
