//! User Profiles

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    identity::{Identity, UserUuid},
    roles::Role,
};

/// The `users` document kept for every account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Same as the account id.
    pub id: UserUuid,

    /// Authoritative marketplace role.
    pub role: Role,

    /// Name shown to other users.
    pub display_name: String,

    /// Contact email.
    pub email: String,

    /// Uploaded profile photo.
    pub photo_url: Option<String>,

    /// Contact phone number.
    pub phone: Option<String>,

    /// Home town or region.
    pub location: Option<String>,

    /// Farm or company name.
    pub organisation: Option<String>,

    /// Free-text introduction.
    pub bio: Option<String>,

    /// Server time of the last update.
    pub updated_at: Option<Timestamp>,
}

impl UserProfile {
    /// Fresh profile for a newly registered identity.
    #[must_use]
    pub fn new(identity: &Identity, role: Role) -> Self {
        Self {
            id: identity.id,
            role,
            display_name: identity.display_name.clone().unwrap_or_default(),
            email: identity.email.clone(),
            photo_url: None,
            phone: None,
            location: None,
            organisation: None,
            bio: None,
            updated_at: None,
        }
    }
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    /// New display name.
    pub display_name: Option<String>,

    /// New photo; inline images are compressed and uploaded.
    pub photo_url: Option<String>,

    /// New phone number.
    pub phone: Option<String>,

    /// New location.
    pub location: Option<String>,

    /// New farm or company name.
    pub organisation: Option<String>,

    /// New introduction.
    pub bio: Option<String>,
}

impl ProfileUpdate {
    /// Apply the present fields to `profile` and stamp it with `at`.
    pub fn apply(self, profile: &mut UserProfile, at: Timestamp) {
        if let Some(display_name) = self.display_name {
            profile.display_name = display_name;
        }

        for (target, value) in [
            (&mut profile.photo_url, self.photo_url),
            (&mut profile.phone, self.phone),
            (&mut profile.location, self.location),
            (&mut profile.organisation, self.organisation),
            (&mut profile.bio, self.bio),
        ] {
            if value.is_some() {
                *target = value;
            }
        }

        profile.updated_at = Some(at);
    }
}
