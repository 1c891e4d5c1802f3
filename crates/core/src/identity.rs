//! Signed-in Identity

use serde::{Deserialize, Serialize};

use crate::uuids::TypedUuid;

/// User UUID, as issued by the identity provider.
pub type UserUuid = TypedUuid<Identity>;

/// Display name used for listings when the owner has neither a name nor an email.
pub const ANONYMOUS_FARMER: &str = "Anonymous Farmer";

/// The authenticated account behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Provider-issued unique id.
    pub id: UserUuid,

    /// Display name, when one was set.
    pub display_name: Option<String>,

    /// Sign-in email.
    pub email: String,

    /// Whether the email address has been verified.
    pub email_verified: bool,
}

impl Identity {
    /// Unverified identity with no display name.
    #[must_use]
    pub fn new(id: UserUuid, email: impl Into<String>) -> Self {
        Self {
            id,
            display_name: None,
            email: email.into(),
            email_verified: false,
        }
    }

    /// Name shown to buyers on this identity's listings.
    ///
    /// Falls back to the email address, then to [`ANONYMOUS_FARMER`].
    #[must_use]
    pub fn owner_display_name(&self) -> String {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| Some(self.email.trim()).filter(|email| !email.is_empty()))
            .unwrap_or(ANONYMOUS_FARMER)
            .to_string()
    }
}
