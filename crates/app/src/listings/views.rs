//! Client-side listing views.

use agrimarket::{
    identity::UserUuid,
    listings::{EffectiveTimestamp, Listing, ListingUuid},
};
use rustc_hash::FxHashSet;

/// Which of the two views a snapshot or query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// The signed-in farmer's own listings.
    Mine,

    /// Every active listing, as buyers see it.
    Marketplace,
}

#[derive(Debug, Clone)]
struct Entry {
    listing: Listing,

    /// Inserted locally and not yet confirmed or rolled back.
    pending: bool,
}

/// "My listings" and "marketplace listings", plus the buyer's bookmarks.
///
/// Both views stay sorted newest first. Bookmarks live outside the records so a
/// snapshot replacing a view does not reset them.
#[derive(Debug, Default)]
pub struct ListingViews {
    mine: Vec<Entry>,
    marketplace: Vec<Entry>,
    bookmarks: FxHashSet<ListingUuid>,
}

impl ListingViews {
    /// Empty views.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a listing whose write is still in flight, in both views.
    pub fn insert_pending(&mut self, listing: &Listing) {
        for view in [View::Mine, View::Marketplace] {
            let entries = self.entries_mut(view);

            entries.retain(|entry| entry.listing.id != listing.id);
            entries.push(Entry {
                listing: listing.clone(),
                pending: true,
            });

            sort(entries);
        }
    }

    /// Replace a pending entry with the stored record.
    pub fn confirm(&mut self, confirmed: &Listing) {
        for view in [View::Mine, View::Marketplace] {
            let entries = self.entries_mut(view);

            if let Some(entry) = entries.iter_mut().find(|e| e.listing.id == confirmed.id) {
                entry.listing = confirmed.clone();
                entry.pending = false;
            }

            sort(entries);
        }
    }

    /// Remove a pending entry from both views. Returns whether anything was removed.
    pub fn rollback(&mut self, id: ListingUuid) -> bool {
        let mut removed = false;

        for view in [View::Mine, View::Marketplace] {
            let entries = self.entries_mut(view);
            let before = entries.len();

            entries.retain(|entry| !(entry.pending && entry.listing.id == id));

            removed |= entries.len() != before;
        }

        removed
    }

    /// Replace a view with a snapshot from the live query.
    ///
    /// Pending entries the snapshot does not contain yet are kept. Bookmarks on
    /// listings that left the marketplace are dropped.
    pub fn apply_snapshot(&mut self, view: View, snapshot: Vec<Listing>) {
        let arrived: FxHashSet<ListingUuid> = snapshot.iter().map(|l| l.id).collect();

        let entries = self.entries_mut(view);

        let mut next: Vec<Entry> = entries
            .drain(..)
            .filter(|entry| entry.pending && !arrived.contains(&entry.listing.id))
            .collect();

        next.extend(snapshot.into_iter().map(|listing| Entry {
            listing,
            pending: false,
        }));

        sort(&mut next);

        *entries = next;

        if view == View::Marketplace {
            let present: FxHashSet<ListingUuid> =
                self.marketplace.iter().map(|e| e.listing.id).collect();

            self.bookmarks.retain(|id| present.contains(id));
        }
    }

    /// Flip the bookmark on a marketplace listing.
    ///
    /// Returns the new flag, or `None` if the listing is not in the marketplace view.
    pub fn toggle_bookmark(&mut self, id: ListingUuid) -> Option<bool> {
        if !self.contains(View::Marketplace, id) {
            return None;
        }

        if self.bookmarks.remove(&id) {
            Some(false)
        } else {
            self.bookmarks.insert(id);
            Some(true)
        }
    }

    /// Whether `view` shows the listing `id`.
    #[must_use]
    pub fn contains(&self, view: View, id: ListingUuid) -> bool {
        self.entries(view).iter().any(|entry| entry.listing.id == id)
    }

    /// Whether the listing `id` is still waiting for its write.
    #[must_use]
    pub fn is_pending(&self, id: ListingUuid) -> bool {
        [View::Mine, View::Marketplace]
            .into_iter()
            .flat_map(|view| self.entries(view))
            .any(|entry| entry.pending && entry.listing.id == id)
    }

    /// Copy of a view, newest first, with bookmark flags filled in.
    #[must_use]
    pub fn listings(&self, view: View) -> Vec<Listing> {
        self.entries(view)
            .iter()
            .map(|entry| self.present(entry))
            .collect()
    }

    /// The signed-in farmer's listings owned by `farmer`.
    #[must_use]
    pub fn owned_by(&self, farmer: UserUuid) -> Vec<Listing> {
        self.mine
            .iter()
            .filter(|entry| entry.listing.farmer_id == farmer)
            .map(|entry| self.present(entry))
            .collect()
    }

    /// Bookmarked marketplace listings, newest first.
    #[must_use]
    pub fn bookmarked(&self) -> Vec<Listing> {
        self.marketplace
            .iter()
            .filter(|entry| self.bookmarks.contains(&entry.listing.id))
            .map(|entry| self.present(entry))
            .collect()
    }

    /// Forget everything, e.g. after sign-out.
    pub fn clear(&mut self) {
        self.mine.clear();
        self.marketplace.clear();
        self.bookmarks.clear();
    }

    fn present(&self, entry: &Entry) -> Listing {
        let mut listing = entry.listing.clone();
        listing.is_bookmarked = self.bookmarks.contains(&listing.id);

        listing
    }

    fn entries(&self, view: View) -> &[Entry] {
        match view {
            View::Mine => &self.mine,
            View::Marketplace => &self.marketplace,
        }
    }

    fn entries_mut(&mut self, view: View) -> &mut Vec<Entry> {
        match view {
            View::Mine => &mut self.mine,
            View::Marketplace => &mut self.marketplace,
        }
    }
}

fn sort(entries: &mut [Entry]) {
    entries.sort_by_key(|entry| EffectiveTimestamp::newest_first(&entry.listing));
}
