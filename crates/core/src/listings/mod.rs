//! Listings

use std::fmt::{Display, Formatter, Result as FmtResult};

use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Serialize};

use crate::{
    identity::{Identity, UserUuid},
    uuids::TypedUuid,
};

pub mod ordering;

pub use ordering::{EffectiveTimestamp, sort_newest_first};

/// Listing UUID
pub type ListingUuid = TypedUuid<Listing>;

/// Lifecycle status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    /// Visible to buyers.
    #[default]
    Active,

    /// Sold and no longer on offer.
    Sold,

    /// Withdrawn by the farmer.
    Draft,
}

impl ListingStatus {
    /// Stable lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Sold => "sold",
            Self::Draft => "draft",
        }
    }
}

impl Display for ListingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Where a listing's picture lives.
///
/// Farmers attach pictures as inline `data:` URLs; once uploaded to object storage
/// the listing only keeps the returned reference URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageSource {
    /// Inline `data:` URL awaiting upload.
    Inline(String),

    /// Reference URL returned by object storage.
    Stored(String),
}

impl ImageSource {
    /// The raw URL, inline or stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline(url) | Self::Stored(url) => url,
        }
    }

    /// Whether the image still has to be uploaded.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

impl From<String> for ImageSource {
    fn from(value: String) -> Self {
        if value.starts_with("data:") {
            Self::Inline(value)
        } else {
            Self::Stored(value)
        }
    }
}

impl From<ImageSource> for String {
    fn from(value: ImageSource) -> Self {
        match value {
            ImageSource::Inline(url) | ImageSource::Stored(url) => url,
        }
    }
}

/// One lot of agricultural waste offered for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Store-allocated id, known before the first write.
    pub id: ListingUuid,

    /// Waste type, e.g. "Rice Husk".
    pub title: String,

    /// Amount on offer, in `unit`.
    pub quantity: String,

    /// Unit of `quantity`, e.g. "kg" or "tonnes".
    pub unit: String,

    /// Asking price per unit, as entered.
    pub price: String,

    /// Free-text description.
    pub description: String,

    /// When the lot can be collected.
    pub availability: String,

    /// Quality grade, e.g. "Good".
    pub quality: String,

    /// Classifier confidence in percent, when the listing came from an analysis.
    pub confidence: Option<u8>,

    /// Pickup location.
    pub location: String,

    /// Owner's display name at creation time.
    pub farmer_name: String,

    /// Owning farmer. Never changes after creation.
    pub farmer_id: UserUuid,

    /// Calendar date the listing was created on.
    pub date: Date,

    /// Server-assigned creation time; `None` while the first write is in flight.
    pub created_at: Option<Timestamp>,

    /// Whether buyers can see the listing.
    pub status: ListingStatus,

    /// Photo of the lot.
    pub image: Option<ImageSource>,

    /// Buyer-local bookmark flag.
    #[serde(default)]
    pub is_bookmarked: bool,

    /// Number of buyer inquiries, when tracked.
    pub inquiries: Option<u32>,
}

impl Listing {
    /// Whether the server has not yet acknowledged this listing.
    #[must_use]
    pub const fn is_unconfirmed(&self) -> bool {
        self.created_at.is_none()
    }
}

/// Fields a farmer fills in when offering a new lot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    /// Waste type.
    pub title: String,

    /// Amount on offer.
    pub quantity: String,

    /// Unit of `quantity`.
    pub unit: String,

    /// Asking price per unit.
    pub price: String,

    /// Free-text description.
    pub description: String,

    /// When the lot can be collected.
    pub availability: String,

    /// Quality grade.
    pub quality: String,

    /// Classifier confidence, when filled in from an analysis.
    pub confidence: Option<u8>,

    /// Pickup location.
    pub location: String,

    /// Photo; inline images are compressed and uploaded on create.
    pub image: Option<ImageSource>,
}

impl ListingDraft {
    /// Complete the draft into a full record owned by `owner`.
    ///
    /// New listings start `active` with no inquiries and no server timestamp.
    #[must_use]
    pub fn into_listing(self, id: ListingUuid, owner: &Identity, date: Date) -> Listing {
        Listing {
            id,
            title: self.title,
            quantity: self.quantity,
            unit: self.unit,
            price: self.price,
            description: self.description,
            availability: self.availability,
            quality: self.quality,
            confidence: self.confidence,
            location: self.location,
            farmer_name: owner.owner_display_name(),
            farmer_id: owner.id,
            date,
            created_at: None,
            status: ListingStatus::Active,
            image: self.image,
            is_bookmarked: false,
            inquiries: Some(0),
        }
    }
}

/// Partial update of a listing. `None` leaves a field untouched.
///
/// There is deliberately no owner field: ownership is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingUpdate {
    /// New waste type.
    pub title: Option<String>,

    /// New amount.
    pub quantity: Option<String>,

    /// New unit.
    pub unit: Option<String>,

    /// New price.
    pub price: Option<String>,

    /// New description.
    pub description: Option<String>,

    /// New availability.
    pub availability: Option<String>,

    /// New quality grade.
    pub quality: Option<String>,

    /// New pickup location.
    pub location: Option<String>,

    /// New visibility.
    pub status: Option<ListingStatus>,

    /// New photo.
    pub image: Option<ImageSource>,
}

impl ListingUpdate {
    /// Update that only changes the status.
    #[must_use]
    pub fn status(status: ListingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether the update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the present fields to `listing`.
    pub fn apply(self, listing: &mut Listing) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut listing.title, self.title);
        set(&mut listing.quantity, self.quantity);
        set(&mut listing.unit, self.unit);
        set(&mut listing.price, self.price);
        set(&mut listing.description, self.description);
        set(&mut listing.availability, self.availability);
        set(&mut listing.quality, self.quality);
        set(&mut listing.location, self.location);
        set(&mut listing.status, self.status);

        if let Some(image) = self.image {
            listing.image = Some(image);
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use testresult::TestResult;

    use super::*;

    fn farmer() -> Identity {
        Identity {
            id: UserUuid::new(),
            display_name: Some("Ravi".to_string()),
            email: "ravi@example.com".to_string(),
            email_verified: true,
        }
    }

    #[test]
    fn draft_becomes_active_listing_owned_by_caller() {
        let owner = farmer();
        let id = ListingUuid::new();

        let listing = ListingDraft {
            title: "Rice Husk".to_string(),
            quantity: "500".to_string(),
            unit: "kg".to_string(),
            price: "5".to_string(),
            ..ListingDraft::default()
        }
        .into_listing(id, &owner, date(2026, 3, 1));

        assert_eq!(listing.id, id);
        assert_eq!(listing.farmer_id, owner.id);
        assert_eq!(listing.farmer_name, "Ravi");
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.inquiries, Some(0));
        assert!(listing.is_unconfirmed());
    }

    #[test]
    fn update_only_touches_present_fields() {
        let mut listing = ListingDraft {
            title: "Wheat Straw".to_string(),
            price: "4".to_string(),
            description: "Baled".to_string(),
            ..ListingDraft::default()
        }
        .into_listing(ListingUuid::new(), &farmer(), date(2026, 3, 1));

        ListingUpdate {
            price: Some("6".to_string()),
            status: Some(ListingStatus::Sold),
            ..ListingUpdate::default()
        }
        .apply(&mut listing);

        assert_eq!(listing.price, "6");
        assert_eq!(listing.status, ListingStatus::Sold);
        assert_eq!(listing.description, "Baled");
        assert_eq!(listing.title, "Wheat Straw");
    }

    #[test]
    fn image_source_serializes_as_plain_url() -> TestResult {
        let inline: ImageSource = "data:image/jpeg;base64,AAAA".to_string().into();
        let stored: ImageSource = "https://cdn.example.com/a.jpg".to_string().into();

        assert!(inline.is_inline());
        assert!(!stored.is_inline());
        assert_eq!(
            serde_json::to_string(&stored)?,
            "\"https://cdn.example.com/a.jpg\""
        );

        Ok(())
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(ListingUpdate::default().is_empty());
        assert!(!ListingUpdate::status(ListingStatus::Draft).is_empty());
    }
}
