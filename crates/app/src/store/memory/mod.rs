//! In-process backends.
//!
//! Each store keeps its documents behind a lock and bumps a version counter on every
//! write; live queries re-run whenever the counter moves. Every store can be switched
//! offline, after which calls fail with [`StoreError::Unavailable`].

use std::sync::{
    PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::watch;

use crate::store::{Feed, StoreError};

mod conversations;
mod identity;
mod listings;
mod objects;
mod profiles;

pub use conversations::MemoryConversationsRepository;
pub use identity::{MemoryIdentityProvider, SentEmail};
pub use listings::MemoryListingsRepository;
pub use objects::MemoryObjectStorage;
pub use profiles::MemoryProfilesRepository;

/// Snapshots buffered per live query before the publisher waits.
const FEED_CAPACITY: usize = 16;

#[derive(Debug, Default)]
struct Availability(AtomicBool);

impl Availability {
    fn set_offline(&self, offline: bool) {
        self.0.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.0.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }

        Ok(())
    }
}

/// Write version shared between a store and its live queries.
#[derive(Debug)]
struct Changes(watch::Sender<u64>);

impl Default for Changes {
    fn default() -> Self {
        Self(watch::Sender::new(0))
    }
}

impl Changes {
    fn bump(&self) {
        self.0.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.0.subscribe()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Publish `snapshot()` now and again after every change, until the feed is dropped.
fn spawn_feed<T, F>(mut changes: watch::Receiver<u64>, snapshot: F) -> Feed<T>
where
    T: Send + 'static,
    F: Fn() -> Result<Vec<T>, StoreError> + Send + 'static,
{
    let (sender, feed) = Feed::channel(FEED_CAPACITY);

    tokio::spawn(async move {
        loop {
            if sender.send(snapshot()).await.is_err() {
                break;
            }

            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = sender.closed() => break,
            }
        }
    });

    feed
}
