//! Conversations and messages collections.
//!
//! Conversation documents only change through field-level operations, so concurrent
//! writers never overwrite each other's counters.

use agrimarket::{
    conversations::{Conversation, ConversationId, Message, Participant},
    identity::UserUuid,
};
use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;

use crate::store::{Feed, StoreError};

/// Conversation documents and their messages.
#[automock]
#[async_trait]
pub trait ConversationsRepository: Send + Sync {
    async fn get_conversation(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Record a message from `sender` to `receiver` in one step: open the
    /// conversation if it does not exist yet, otherwise refresh the preview and
    /// increment the receiver's unread counter.
    async fn record_message(
        &self,
        sender: Participant,
        receiver: Participant,
        body: &str,
        at: Timestamp,
    ) -> Result<Conversation, StoreError>;

    /// Set `user`'s unread counter to zero, leaving every other field alone.
    async fn reset_unread(
        &self,
        conversation: &ConversationId,
        user: UserUuid,
    ) -> Result<(), StoreError>;

    /// Mark the conversation accepted at `at`.
    async fn accept(
        &self,
        conversation: &ConversationId,
        at: Timestamp,
    ) -> Result<Conversation, StoreError>;

    /// Append a message to its conversation. The stored copy carries the server send time.
    async fn append_message(&self, message: Message) -> Result<Message, StoreError>;

    /// Messages of a conversation, oldest first.
    async fn list_messages(&self, conversation: &ConversationId)
    -> Result<Vec<Message>, StoreError>;

    /// Open a live query over every conversation `user` takes part in, most recent first.
    async fn watch_conversations(&self, user: UserUuid) -> Result<Feed<Conversation>, StoreError>;
}
