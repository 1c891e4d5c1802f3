//! Profiles collection.

use agrimarket::{
    identity::UserUuid,
    profiles::{ProfileUpdate, UserProfile},
};
use async_trait::async_trait;
use mockall::automock;

use crate::store::StoreError;

/// The `users` collection.
#[automock]
#[async_trait]
pub trait ProfilesRepository: Send + Sync {
    async fn get_profile(&self, user: UserUuid) -> Result<UserProfile, StoreError>;

    /// Create or replace a profile document.
    async fn put_profile(&self, profile: UserProfile) -> Result<(), StoreError>;

    /// Apply a partial update, stamping the server time.
    async fn update_profile(
        &self,
        user: UserUuid,
        update: ProfileUpdate,
    ) -> Result<UserProfile, StoreError>;
}
