//! In-memory profiles collection.

use std::sync::{Arc, RwLock};

use agrimarket::{
    identity::UserUuid,
    profiles::{ProfileUpdate, UserProfile},
};
use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashMap;

use crate::store::{ProfilesRepository, StoreError};

use super::{Availability, read, write};

#[derive(Debug, Default)]
struct Inner {
    profiles: RwLock<FxHashMap<UserUuid, UserProfile>>,
    availability: Availability,
}

/// In-memory [`ProfilesRepository`].
#[derive(Debug, Clone, Default)]
pub struct MemoryProfilesRepository {
    inner: Arc<Inner>,
}

impl MemoryProfilesRepository {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with [`StoreError::Unavailable`] while `offline`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.availability.set_offline(offline);
    }
}

#[async_trait]
impl ProfilesRepository for MemoryProfilesRepository {
    async fn get_profile(&self, user: UserUuid) -> Result<UserProfile, StoreError> {
        self.inner.availability.check()?;

        read(&self.inner.profiles)
            .get(&user)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn put_profile(&self, mut profile: UserProfile) -> Result<(), StoreError> {
        self.inner.availability.check()?;

        profile.updated_at = Some(Timestamp::now());

        write(&self.inner.profiles).insert(profile.id, profile);

        Ok(())
    }

    async fn update_profile(
        &self,
        user: UserUuid,
        update: ProfileUpdate,
    ) -> Result<UserProfile, StoreError> {
        self.inner.availability.check()?;

        let mut profiles = write(&self.inner.profiles);
        let profile = profiles.get_mut(&user).ok_or(StoreError::NotFound)?;

        update.apply(profile, Timestamp::now());

        Ok(profile.clone())
    }
}
