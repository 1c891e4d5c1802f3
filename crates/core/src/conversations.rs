//! Conversations

use std::fmt::{Display, Formatter, Result as FmtResult};

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{identity::UserUuid, roles::Role, uuids::TypedUuid};

/// Message UUID
pub type MessageUuid = TypedUuid<Message>;

/// Conversation id: the two participant ids, sorted, joined with `_`.
///
/// Either participant derives the same id without a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Id of the conversation between `a` and `b`.
    #[must_use]
    pub fn between(a: UserUuid, b: UserUuid) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };

        Self(format!("{first}_{second}"))
    }

    /// The id as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// One side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Account id.
    pub id: UserUuid,

    /// Role at the time the conversation was opened.
    pub role: Role,

    /// Display name.
    pub name: String,
}

/// Whether the recipient has accepted the contact request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Waiting for the recipient.
    #[default]
    Pending,

    /// The recipient agreed to talk.
    Accepted,
}

/// A buyer-farmer thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Derived from the participants, see [`ConversationId::between`].
    pub id: ConversationId,

    /// Initiator first.
    pub participants: [Participant; 2],

    /// Preview of the latest message.
    pub last_message: String,

    /// Time of the latest message or acceptance.
    pub last_message_time: Timestamp,

    /// Contact request state.
    pub status: ConversationStatus,

    /// Unread counter per participant.
    pub unread: FxHashMap<UserUuid, u32>,
}

impl Conversation {
    /// Open a conversation with its first message from `sender`.
    #[must_use]
    pub fn open(sender: Participant, receiver: Participant, body: &str, at: Timestamp) -> Self {
        let mut unread = FxHashMap::default();

        unread.insert(sender.id, 0);
        unread.insert(receiver.id, 1);

        Self {
            id: ConversationId::between(sender.id, receiver.id),
            participants: [sender, receiver],
            last_message: body.to_string(),
            last_message_time: at,
            status: ConversationStatus::Pending,
            unread,
        }
    }

    /// Whether `user` takes part.
    #[must_use]
    pub fn includes(&self, user: UserUuid) -> bool {
        self.participants.iter().any(|p| p.id == user)
    }

    /// The participant who is not `user`.
    #[must_use]
    pub fn counterpart(&self, user: UserUuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id != user)
    }

    /// Messages `user` has not read yet.
    #[must_use]
    pub fn unread_for(&self, user: UserUuid) -> u32 {
        self.unread.get(&user).copied().unwrap_or(0)
    }

    /// Record a new message: update the preview and bump the receiver's counter.
    pub fn record_message(&mut self, receiver: UserUuid, body: &str, at: Timestamp) {
        self.last_message = body.to_string();
        self.last_message_time = at;

        let counter = self.unread.entry(receiver).or_insert(0);
        *counter = counter.saturating_add(1);
    }

    /// Reset `user`'s unread counter.
    pub fn mark_read(&mut self, user: UserUuid) {
        self.unread.insert(user, 0);
    }

    /// Accept the contact request. Refreshes the time so it sorts to the top.
    pub fn accept(&mut self, at: Timestamp) {
        self.status = ConversationStatus::Accepted;
        self.last_message_time = at;
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id.
    pub id: MessageUuid,

    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,

    /// Author.
    pub sender_id: UserUuid,

    /// Recipient.
    pub receiver_id: UserUuid,

    /// Author's role.
    pub sender_role: Role,

    /// Recipient's role.
    pub receiver_role: Role,

    /// Trimmed message text.
    pub body: String,

    /// Server-assigned send time.
    pub sent_at: Option<Timestamp>,

    /// Whether the recipient has read it.
    pub read: bool,
}

impl Message {
    /// Unsent message from `sender` to `receiver`.
    #[must_use]
    pub fn new(sender: &Participant, receiver: &Participant, body: &str) -> Self {
        Self {
            id: MessageUuid::new(),
            conversation_id: ConversationId::between(sender.id, receiver.id),
            sender_id: sender.id,
            receiver_id: receiver.id,
            sender_role: sender.role,
            receiver_role: receiver.role,
            body: body.to_string(),
            sent_at: None,
            read: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(role: Role, name: &str) -> Participant {
        Participant {
            id: UserUuid::new(),
            role,
            name: name.to_string(),
        }
    }

    #[test]
    fn id_is_independent_of_argument_order() {
        let a = UserUuid::new();
        let b = UserUuid::new();

        assert_eq!(ConversationId::between(a, b), ConversationId::between(b, a));
        assert!(ConversationId::between(a, b).as_str().contains('_'));
    }

    #[test]
    fn opening_starts_pending_with_one_unread_for_receiver() {
        let buyer = participant(Role::Buyer, "Mills Ltd");
        let farmer = participant(Role::Farmer, "Ravi");

        let conversation = Conversation::open(buyer.clone(), farmer.clone(), "Hi", Timestamp::now());

        assert_eq!(conversation.status, ConversationStatus::Pending);
        assert_eq!(conversation.unread_for(buyer.id), 0);
        assert_eq!(conversation.unread_for(farmer.id), 1);
        assert_eq!(conversation.counterpart(buyer.id), Some(&farmer));
    }

    #[test]
    fn recording_and_reading_adjust_counters() {
        let buyer = participant(Role::Buyer, "Mills Ltd");
        let farmer = participant(Role::Farmer, "Ravi");

        let mut conversation =
            Conversation::open(buyer.clone(), farmer.clone(), "Hi", Timestamp::now());

        conversation.record_message(farmer.id, "Still available?", Timestamp::now());
        conversation.record_message(buyer.id, "Yes", Timestamp::now());

        assert_eq!(conversation.unread_for(farmer.id), 2);
        assert_eq!(conversation.unread_for(buyer.id), 1);
        assert_eq!(conversation.last_message, "Yes");

        conversation.mark_read(farmer.id);

        assert_eq!(conversation.unread_for(farmer.id), 0);
        assert_eq!(conversation.unread_for(buyer.id), 1);
    }
}
