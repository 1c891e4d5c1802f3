//! Live query feeds.

use tokio::sync::mpsc;

use crate::store::StoreError;

/// Sending half of a [`Feed`].
pub type FeedSender<T> = mpsc::Sender<Result<Vec<T>, StoreError>>;

/// A standing query. Every item is a complete snapshot of the result set, or the
/// error the backend reported instead of one.
///
/// The feed ends when the backend stops publishing. Dropping it cancels the query.
#[derive(Debug)]
pub struct Feed<T> {
    receiver: mpsc::Receiver<Result<Vec<T>, StoreError>>,
}

impl<T> Feed<T> {
    /// Create a feed and the sender a backend publishes snapshots through.
    #[must_use]
    pub fn channel(capacity: usize) -> (FeedSender<T>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);

        (sender, Self { receiver })
    }

    /// Wait for the next snapshot. `None` once the backend has gone away.
    pub async fn next(&mut self) -> Option<Result<Vec<T>, StoreError>> {
        self.receiver.recv().await
    }
}
