//! Messaging service.

use std::sync::Arc;

use agrimarket::{
    conversations::{Conversation, ConversationId, Message, Participant},
    identity::UserUuid,
};
use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::info;

use crate::{
    messaging::MessagingError,
    store::{ConversationsRepository, Feed},
};

/// [`MessagingService`] over a conversations repository.
#[derive(Clone)]
pub struct StoreMessagingService {
    repository: Arc<dyn ConversationsRepository>,
}

impl StoreMessagingService {
    /// Service writing to `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn ConversationsRepository>) -> Self {
        Self { repository }
    }

    async fn participant_conversation(
        &self,
        user: UserUuid,
        conversation: &ConversationId,
    ) -> Result<Conversation, MessagingError> {
        let conversation = self
            .repository
            .get_conversation(conversation)
            .await?
            .ok_or(MessagingError::NotFound)?;

        if !conversation.includes(user) {
            return Err(MessagingError::NotParticipant);
        }

        Ok(conversation)
    }
}

#[async_trait]
impl MessagingService for StoreMessagingService {
    async fn send_message(
        &self,
        sender: Participant,
        receiver: Participant,
        body: &str,
    ) -> Result<Message, MessagingError> {
        let body = body.trim();

        if body.is_empty() {
            return Err(MessagingError::EmptyMessage);
        }

        if sender.id == receiver.id {
            return Err(MessagingError::SameParticipant);
        }

        let message = self
            .repository
            .append_message(Message::new(&sender, &receiver, body))
            .await?;

        let sent_at = message.sent_at.unwrap_or_else(Timestamp::now);

        let conversation = self
            .repository
            .record_message(sender, receiver, body, sent_at)
            .await?;

        info!(
            conversation = %conversation.id,
            sender = %message.sender_id,
            receiver_unread = conversation.unread_for(message.receiver_id),
            "message sent"
        );

        Ok(message)
    }

    async fn mark_read(
        &self,
        user: UserUuid,
        conversation: &ConversationId,
    ) -> Result<(), MessagingError> {
        let snapshot = self.participant_conversation(user, conversation).await?;

        if snapshot.unread_for(user) == 0 {
            return Ok(());
        }

        self.repository.reset_unread(conversation, user).await?;

        Ok(())
    }

    async fn accept_request(
        &self,
        user: UserUuid,
        conversation: &ConversationId,
    ) -> Result<Conversation, MessagingError> {
        self.participant_conversation(user, conversation).await?;

        let conversation = self
            .repository
            .accept(conversation, Timestamp::now())
            .await?;

        info!(conversation = %conversation.id, %user, "contact request accepted");

        Ok(conversation)
    }

    async fn conversations_for(&self, user: UserUuid) -> Result<Feed<Conversation>, MessagingError> {
        Ok(self.repository.watch_conversations(user).await?)
    }

    async fn messages_for(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, MessagingError> {
        let mut messages = self.repository.list_messages(conversation).await?;

        messages.sort_by_key(|message| message.sent_at);

        Ok(messages)
    }
}

/// Buyer-farmer messaging.
#[automock]
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Send a message, opening the conversation on first contact.
    ///
    /// A new conversation starts `pending` with one unread message for the receiver;
    /// an existing one gets a fresh preview and the receiver's counter goes up.
    async fn send_message(
        &self,
        sender: Participant,
        receiver: Participant,
        body: &str,
    ) -> Result<Message, MessagingError>;

    /// Reset `user`'s unread counter.
    async fn mark_read(
        &self,
        user: UserUuid,
        conversation: &ConversationId,
    ) -> Result<(), MessagingError>;

    /// Accept a pending contact request on behalf of `user`.
    async fn accept_request(
        &self,
        user: UserUuid,
        conversation: &ConversationId,
    ) -> Result<Conversation, MessagingError>;

    /// Live list of `user`'s conversations, most recent first.
    async fn conversations_for(&self, user: UserUuid) -> Result<Feed<Conversation>, MessagingError>;

    /// Messages of a conversation, oldest first.
    async fn messages_for(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, MessagingError>;
}

#[cfg(test)]
mod tests {
    use agrimarket::{conversations::ConversationStatus, roles::Role};
    use testresult::TestResult;

    use crate::{
        store::{MockConversationsRepository, StoreError, memory::MemoryConversationsRepository},
        test::{TestContext, helpers::YieldingConversationsRepository},
    };

    use super::*;

    fn participant(role: Role, name: &str) -> Participant {
        Participant {
            id: UserUuid::new(),
            role,
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn first_message_opens_a_pending_conversation() -> TestResult {
        let ctx = TestContext::new();
        let buyer = participant(Role::Buyer, "Mills Ltd");
        let farmer = participant(Role::Farmer, "Ravi");

        let message = ctx
            .messaging
            .send_message(buyer.clone(), farmer.clone(), "  Is the husk still available?  ")
            .await?;

        assert_eq!(message.body, "Is the husk still available?");
        assert!(message.sent_at.is_some());

        let mut feed = ctx.messaging.conversations_for(farmer.id).await?;
        let conversations = feed.next().await.ok_or("feed closed")??;
        let conversation = conversations.first().ok_or("expected a conversation")?;

        assert_eq!(conversation.id, message.conversation_id);
        assert_eq!(conversation.status, ConversationStatus::Pending);
        assert_eq!(conversation.unread_for(farmer.id), 1);
        assert_eq!(conversation.unread_for(buyer.id), 0);

        Ok(())
    }

    #[tokio::test]
    async fn replies_bump_the_receivers_counter_until_read() -> TestResult {
        let ctx = TestContext::new();
        let buyer = participant(Role::Buyer, "Mills Ltd");
        let farmer = participant(Role::Farmer, "Ravi");

        let first = ctx
            .messaging
            .send_message(buyer.clone(), farmer.clone(), "Hello")
            .await?;
        ctx.messaging
            .send_message(buyer.clone(), farmer.clone(), "Price?")
            .await?;
        ctx.messaging
            .send_message(farmer.clone(), buyer.clone(), "₹4 per kg")
            .await?;

        let id = first.conversation_id;

        let conversation = ctx
            .memory
            .conversations
            .get_conversation(&id)
            .await?
            .ok_or("expected a conversation")?;

        assert_eq!(conversation.unread_for(farmer.id), 2);
        assert_eq!(conversation.unread_for(buyer.id), 1);
        assert_eq!(conversation.last_message, "₹4 per kg");

        ctx.messaging.mark_read(farmer.id, &id).await?;

        let conversation = ctx
            .memory
            .conversations
            .get_conversation(&id)
            .await?
            .ok_or("expected a conversation")?;

        assert_eq!(conversation.unread_for(farmer.id), 0);

        let bodies: Vec<String> = ctx
            .messaging
            .messages_for(&id)
            .await?
            .into_iter()
            .map(|message| message.body)
            .collect();

        assert_eq!(bodies, ["Hello", "Price?", "₹4 per kg"]);

        Ok(())
    }

    fn interleaving_service() -> (StoreMessagingService, MemoryConversationsRepository) {
        let store = MemoryConversationsRepository::new();
        let service = StoreMessagingService::new(Arc::new(YieldingConversationsRepository::new(
            store.clone(),
        )));

        (service, store)
    }

    #[tokio::test]
    async fn concurrent_sends_keep_every_unread_increment() -> TestResult {
        let (service, store) = interleaving_service();
        let buyer = participant(Role::Buyer, "Mills Ltd");
        let farmer = participant(Role::Farmer, "Ravi");

        let first = service
            .send_message(buyer.clone(), farmer.clone(), "Hello")
            .await?;

        let (second, third) = tokio::join!(
            service.send_message(buyer.clone(), farmer.clone(), "Price?"),
            service.send_message(buyer.clone(), farmer.clone(), "Pickup date?"),
        );
        second?;
        third?;

        let conversation = store
            .get_conversation(&first.conversation_id)
            .await?
            .ok_or("expected a conversation")?;

        assert_eq!(conversation.unread_for(farmer.id), 3);
        assert_eq!(conversation.unread_for(buyer.id), 0);

        Ok(())
    }

    #[tokio::test]
    async fn simultaneous_first_messages_open_one_conversation() -> TestResult {
        let (service, store) = interleaving_service();
        let buyer = participant(Role::Buyer, "Mills Ltd");
        let farmer = participant(Role::Farmer, "Ravi");

        let (from_buyer, from_farmer) = tokio::join!(
            service.send_message(buyer.clone(), farmer.clone(), "Interested in your husk"),
            service.send_message(farmer.clone(), buyer.clone(), "Looking for buyers"),
        );
        let id = from_buyer?.conversation_id;

        assert_eq!(from_farmer?.conversation_id, id);

        let conversation = store
            .get_conversation(&id)
            .await?
            .ok_or("expected a conversation")?;

        assert_eq!(conversation.unread_for(farmer.id), 1);
        assert_eq!(conversation.unread_for(buyer.id), 1);
        assert_eq!(conversation.status, ConversationStatus::Pending);
        assert_eq!(service.messages_for(&id).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn reading_while_a_message_arrives_keeps_its_preview() -> TestResult {
        let (service, store) = interleaving_service();
        let buyer = participant(Role::Buyer, "Mills Ltd");
        let farmer = participant(Role::Farmer, "Ravi");

        let first = service
            .send_message(buyer.clone(), farmer.clone(), "Hello")
            .await?;
        let id = first.conversation_id;

        let (read, reply) = tokio::join!(
            service.mark_read(farmer.id, &id),
            service.send_message(buyer.clone(), farmer.clone(), "Price?"),
        );
        read?;
        reply?;

        let conversation = store
            .get_conversation(&id)
            .await?
            .ok_or("expected a conversation")?;

        assert_eq!(conversation.last_message, "Price?");
        assert_eq!(conversation.unread_for(buyer.id), 0);
        assert!(conversation.unread_for(farmer.id) <= 1);

        Ok(())
    }

    #[tokio::test]
    async fn accepting_a_request_marks_it_accepted() -> TestResult {
        let ctx = TestContext::new();
        let buyer = participant(Role::Buyer, "Mills Ltd");
        let farmer = participant(Role::Farmer, "Ravi");

        let message = ctx
            .messaging
            .send_message(buyer, farmer.clone(), "Hello")
            .await?;

        let accepted = ctx
            .messaging
            .accept_request(farmer.id, &message.conversation_id)
            .await?;

        assert_eq!(accepted.status, ConversationStatus::Accepted);

        Ok(())
    }

    #[tokio::test]
    async fn outsiders_cannot_touch_a_conversation() -> TestResult {
        let ctx = TestContext::new();
        let buyer = participant(Role::Buyer, "Mills Ltd");
        let farmer = participant(Role::Farmer, "Ravi");

        let message = ctx.messaging.send_message(buyer, farmer, "Hello").await?;

        let result = ctx
            .messaging
            .mark_read(UserUuid::new(), &message.conversation_id)
            .await;

        assert!(
            matches!(result, Err(MessagingError::NotParticipant)),
            "expected NotParticipant, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let ctx = TestContext::new();

        let result = ctx
            .messaging
            .send_message(
                participant(Role::Buyer, "Mills Ltd"),
                participant(Role::Farmer, "Ravi"),
                "   ",
            )
            .await;

        assert!(
            matches!(result, Err(MessagingError::EmptyMessage)),
            "expected EmptyMessage, got {result:?}"
        );
    }

    #[tokio::test]
    async fn store_failures_are_propagated() {
        let mut repository = MockConversationsRepository::new();
        repository
            .expect_append_message()
            .returning(|_| Err(StoreError::PermissionDenied));

        let service = StoreMessagingService::new(Arc::new(repository));

        let result = service
            .send_message(
                participant(Role::Buyer, "Mills Ltd"),
                participant(Role::Farmer, "Ravi"),
                "Hello",
            )
            .await;

        assert!(
            matches!(result, Err(MessagingError::Store(StoreError::PermissionDenied))),
            "expected Store(PermissionDenied), got {result:?}"
        );
    }
}
