//! Local role cache.
//!
//! The role a user last acted as is kept on the device so it can be shown before the
//! profile document has been fetched. The cache is best effort: read failures count
//! as a miss and write failures are logged.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use agrimarket::{identity::UserUuid, roles::Role};
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Device-local memory of the last role chosen, keyed by user.
#[automock]
pub trait RoleCache: Send + Sync {
    /// The cached role of `user`, if any.
    fn load(&self, user: UserUuid) -> Option<Role>;

    fn store(&self, user: UserUuid, role: Role);

    fn clear(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CachedRole {
    user: UserUuid,
    role: Role,
}

/// Keeps the role as a small JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileRoleCache {
    path: PathBuf,
}

impl FileRoleCache {
    /// Cache backed by the JSON file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<CachedRole> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(path = %self.path.display(), "failed to read role cache: {error}");

                return None;
            }
        };

        serde_json::from_slice(&contents)
            .inspect_err(|error| {
                warn!(path = %self.path.display(), "ignoring corrupt role cache: {error}");
            })
            .ok()
    }

    fn write(&self, entry: CachedRole) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, serde_json::to_vec(&entry)?)
    }
}

impl RoleCache for FileRoleCache {
    fn load(&self, user: UserUuid) -> Option<Role> {
        self.read()
            .filter(|entry| entry.user == user)
            .map(|entry| entry.role)
    }

    fn store(&self, user: UserUuid, role: Role) {
        match self.write(CachedRole { user, role }) {
            Ok(()) => debug!(%user, %role, "cached role"),
            Err(error) => {
                warn!(path = %self.path.display(), "failed to write role cache: {error}");
            }
        }
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(path = %self.path.display(), "failed to clear role cache: {error}");
            }
        }
    }
}

/// Process-local role cache.
#[derive(Debug, Default)]
pub struct MemoryRoleCache {
    entry: Mutex<Option<CachedRole>>,
}

impl MemoryRoleCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoleCache for MemoryRoleCache {
    fn load(&self, user: UserUuid) -> Option<Role> {
        let entry = *self.entry.lock().unwrap_or_else(PoisonError::into_inner);

        entry
            .filter(|entry| entry.user == user)
            .map(|entry| entry.role)
    }

    fn store(&self, user: UserUuid, role: Role) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedRole { user, role });
    }

    fn clear(&self) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn file_cache_round_trips_for_the_same_user_only() -> TestResult {
        let dir = tempfile::tempdir()?;
        let cache = FileRoleCache::new(dir.path().join("nested").join("role.json"));

        let user = UserUuid::new();

        assert_eq!(cache.load(user), None);

        cache.store(user, Role::Buyer);

        assert_eq!(cache.load(user), Some(Role::Buyer));
        assert_eq!(cache.load(UserUuid::new()), None);

        cache.clear();

        assert_eq!(cache.load(user), None);

        Ok(())
    }

    #[test]
    fn corrupt_file_is_a_miss() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("role.json");

        fs::write(&path, b"{not json")?;

        assert_eq!(FileRoleCache::new(&path).load(UserUuid::new()), None);

        Ok(())
    }

    #[test]
    fn memory_cache_keeps_one_entry() {
        let cache = MemoryRoleCache::new();
        let first = UserUuid::new();
        let second = UserUuid::new();

        cache.store(first, Role::Farmer);
        cache.store(second, Role::Buyer);

        assert_eq!(cache.load(first), None);
        assert_eq!(cache.load(second), Some(Role::Buyer));
    }
}
