//! In-memory object storage.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::store::{ObjectStorage, StoreError};

use super::{Availability, read, write};

const URL_SCHEME: &str = "memory://";

#[derive(Debug, Default)]
struct Inner {
    objects: RwLock<FxHashMap<String, String>>,
    availability: Availability,
}

/// Keeps uploaded images keyed by path and hands out `memory://<path>` references.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStorage {
    inner: Arc<Inner>,
}

impl MemoryObjectStorage {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail uploads with [`StoreError::Unavailable`] while `offline`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.availability.set_offline(offline);
    }

    /// The data URL stored behind a reference URL.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<String> {
        let path = url.strip_prefix(URL_SCHEME)?;

        read(&self.inner.objects).get(path).cloned()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.inner.objects).len()
    }

    /// Whether nothing has been uploaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload_data_url(&self, path: &str, data_url: &str) -> Result<String, StoreError> {
        self.inner.availability.check()?;

        write(&self.inner.objects).insert(path.to_string(), data_url.to_string());

        Ok(format!("{URL_SCHEME}{path}"))
    }
}
