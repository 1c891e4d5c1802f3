//! In-memory conversations and messages.

use std::{
    cmp::Reverse,
    sync::{Arc, RwLock},
};

use agrimarket::{
    conversations::{Conversation, ConversationId, Message, Participant},
    identity::UserUuid,
};
use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashMap;

use crate::store::{ConversationsRepository, Feed, StoreError};

use super::{Availability, Changes, read, spawn_feed, write};

#[derive(Debug, Default)]
struct Inner {
    conversations: RwLock<FxHashMap<ConversationId, Conversation>>,
    messages: RwLock<FxHashMap<ConversationId, Vec<Message>>>,
    changes: Changes,
    availability: Availability,
}

impl Inner {
    fn conversations_of(&self, user: UserUuid) -> Result<Vec<Conversation>, StoreError> {
        self.availability.check()?;

        let mut conversations: Vec<Conversation> = read(&self.conversations)
            .values()
            .filter(|conversation| conversation.includes(user))
            .cloned()
            .collect();

        conversations.sort_by_key(|conversation| Reverse(conversation.last_message_time));

        Ok(conversations)
    }
}

/// In-memory [`ConversationsRepository`].
#[derive(Debug, Clone, Default)]
pub struct MemoryConversationsRepository {
    inner: Arc<Inner>,
}

impl MemoryConversationsRepository {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with [`StoreError::Unavailable`] while `offline`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.availability.set_offline(offline);
        self.inner.changes.bump();
    }
}

#[async_trait]
impl ConversationsRepository for MemoryConversationsRepository {
    async fn get_conversation(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        self.inner.availability.check()?;

        Ok(read(&self.inner.conversations).get(conversation).cloned())
    }

    async fn record_message(
        &self,
        sender: Participant,
        receiver: Participant,
        body: &str,
        at: Timestamp,
    ) -> Result<Conversation, StoreError> {
        self.inner.availability.check()?;

        let receiver_id = receiver.id;

        let conversation = write(&self.inner.conversations)
            .entry(ConversationId::between(sender.id, receiver.id))
            .and_modify(|conversation| conversation.record_message(receiver_id, body, at))
            .or_insert_with(|| Conversation::open(sender, receiver, body, at))
            .clone();

        self.inner.changes.bump();

        Ok(conversation)
    }

    async fn reset_unread(
        &self,
        conversation: &ConversationId,
        user: UserUuid,
    ) -> Result<(), StoreError> {
        self.inner.availability.check()?;

        write(&self.inner.conversations)
            .get_mut(conversation)
            .ok_or(StoreError::NotFound)?
            .mark_read(user);

        self.inner.changes.bump();

        Ok(())
    }

    async fn accept(
        &self,
        conversation: &ConversationId,
        at: Timestamp,
    ) -> Result<Conversation, StoreError> {
        self.inner.availability.check()?;

        let accepted = {
            let mut conversations = write(&self.inner.conversations);
            let conversation = conversations
                .get_mut(conversation)
                .ok_or(StoreError::NotFound)?;

            conversation.accept(at);
            conversation.clone()
        };

        self.inner.changes.bump();

        Ok(accepted)
    }

    async fn append_message(&self, mut message: Message) -> Result<Message, StoreError> {
        self.inner.availability.check()?;

        message.sent_at = Some(Timestamp::now());

        write(&self.inner.messages)
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());

        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        self.inner.availability.check()?;

        Ok(read(&self.inner.messages)
            .get(conversation)
            .cloned()
            .unwrap_or_default())
    }

    async fn watch_conversations(&self, user: UserUuid) -> Result<Feed<Conversation>, StoreError> {
        self.inner.availability.check()?;

        let inner = Arc::clone(&self.inner);

        Ok(spawn_feed(self.inner.changes.subscribe(), move || {
            inner.conversations_of(user)
        }))
    }
}
