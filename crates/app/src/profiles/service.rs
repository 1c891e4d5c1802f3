//! Profiles service.

use std::sync::Arc;

use agrimarket::{
    compression::CompressionOptions,
    identity::UserUuid,
    profiles::{ProfileUpdate, UserProfile},
};
use async_trait::async_trait;
use mockall::automock;
use tracing::{info, warn};

use crate::{
    profiles::ProfilesError,
    store::{ObjectStorage, ProfilesRepository, StoreError, upload_compressed},
};

/// [`ProfilesService`] over the profiles collection and image storage.
#[derive(Clone)]
pub struct StoreProfilesService {
    repository: Arc<dyn ProfilesRepository>,
    storage: Arc<dyn ObjectStorage>,
    compression: CompressionOptions,
}

impl StoreProfilesService {
    /// Service compressing uploaded photos with `compression`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ProfilesRepository>,
        storage: Arc<dyn ObjectStorage>,
        compression: CompressionOptions,
    ) -> Self {
        Self {
            repository,
            storage,
            compression,
        }
    }
}

#[async_trait]
impl ProfilesService for StoreProfilesService {
    async fn get_profile(&self, user: UserUuid) -> Result<Option<UserProfile>, ProfilesError> {
        match self.repository.get_profile(user).await {
            Ok(profile) => Ok(Some(profile)),
            Err(StoreError::Unavailable) => {
                warn!(%user, "profile store offline; no profile available");

                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn update_profile(
        &self,
        user: UserUuid,
        update: ProfileUpdate,
    ) -> Result<UserProfile, ProfilesError> {
        let profile = self.repository.update_profile(user, update).await?;

        info!(%user, "profile updated");

        Ok(profile)
    }

    async fn upload_photo(
        &self,
        user: UserUuid,
        data_url: &str,
    ) -> Result<UserProfile, ProfilesError> {
        let path = format!("profiles/{user}/photo");

        let url = upload_compressed(
            self.storage.as_ref(),
            &path,
            data_url.to_string(),
            self.compression,
        )
        .await?;

        self.update_profile(
            user,
            ProfileUpdate {
                photo_url: Some(url),
                ..ProfileUpdate::default()
            },
        )
        .await
    }
}

/// Reading and editing user profiles.
#[automock]
#[async_trait]
pub trait ProfilesService: Send + Sync {
    /// Fetch a profile. `None` when the store is offline.
    async fn get_profile(&self, user: UserUuid) -> Result<Option<UserProfile>, ProfilesError>;

    /// Apply a partial update and stamp the update time.
    async fn update_profile(
        &self,
        user: UserUuid,
        update: ProfileUpdate,
    ) -> Result<UserProfile, ProfilesError>;

    /// Compress and upload a profile photo, then store its reference on the profile.
    async fn upload_photo(
        &self,
        user: UserUuid,
        data_url: &str,
    ) -> Result<UserProfile, ProfilesError>;
}
