//! Object storage.

use agrimarket::compression::{CompressionOptions, compress_data_url_or_original};
use async_trait::async_trait;
use mockall::automock;
use tokio::task;
use tracing::debug;

use crate::store::StoreError;

/// Blob storage for uploaded images.
#[automock]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the image in `data_url` under `path` and return its reference URL.
    async fn upload_data_url(&self, path: &str, data_url: &str) -> Result<String, StoreError>;
}

/// Compress an inline image off the async runtime, then upload it.
///
/// Images that cannot be decoded are uploaded as they are.
///
/// # Errors
///
/// Returns the storage error, or [`StoreError::Backend`] if the compression task
/// could not complete.
pub async fn upload_compressed(
    storage: &dyn ObjectStorage,
    path: &str,
    data_url: String,
    options: CompressionOptions,
) -> Result<String, StoreError> {
    let original_len = data_url.len();

    let compressed =
        task::spawn_blocking(move || compress_data_url_or_original(&data_url, &options))
            .await
            .map_err(|error| StoreError::Backend(format!("image compression failed: {error}")))?;

    debug!(
        path,
        original_len,
        compressed_len = compressed.len(),
        "uploading image"
    );

    storage.upload_data_url(path, &compressed).await
}
