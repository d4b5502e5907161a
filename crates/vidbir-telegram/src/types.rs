//! Inbound update payload model.
//!
//! Only the fields this service reads are modeled; everything else in the
//! Bot API payloads is ignored during deserialization.

use serde::Deserialize;
use serde_json::Value;

use vidbir_core::{ChatId, MessageId, MessageKind, ThreadId};

/// One long-poll update envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub message_reaction: Option<MessageReactionUpdated>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub chat_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    #[serde(default)]
    pub message_thread_id: Option<ThreadId>,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<Value>>,
    #[serde(default)]
    pub document: Option<Value>,
    #[serde(default)]
    pub voice: Option<Value>,
    #[serde(default)]
    pub video: Option<Value>,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
}

impl Message {
    /// Broad content classification used for the message log.
    pub fn kind(&self) -> MessageKind {
        if self.photo.is_some() {
            MessageKind::Photo
        } else if self.document.is_some() {
            MessageKind::Document
        } else if self.voice.is_some() {
            MessageKind::Voice
        } else if self.video.is_some() {
            MessageKind::Video
        } else if self.text.is_some() {
            MessageKind::Text
        } else {
            MessageKind::Other
        }
    }

    /// True when the text body is a bot command (`/start`, `/cancel`, ...).
    pub fn is_command(&self) -> bool {
        self.text
            .as_deref()
            .map(str::trim_start)
            .is_some_and(|text| text.starts_with('/'))
    }

    /// The command name without arguments or the `@botname` suffix.
    pub fn command(&self) -> Option<String> {
        let text = self.text.as_deref()?.trim_start();
        if !text.starts_with('/') {
            return None;
        }
        let first = text.split_whitespace().next().unwrap_or(text);
        let name = first.split('@').next().unwrap_or(first);
        Some(name.to_string())
    }

    pub fn sender_id(&self) -> Option<i64> {
        self.from.as_ref().map(|user| user.id)
    }

    pub fn from_bot(&self) -> bool {
        self.from.as_ref().is_some_and(|user| user.is_bot)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionType {
    #[serde(rename = "type")]
    pub reaction_type: String,
    #[serde(default)]
    pub emoji: Option<String>,
}

/// `message_reaction` update payload: a user changed their reaction on a
/// message the bot can see.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageReactionUpdated {
    pub chat: Chat,
    pub message_id: MessageId,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub old_reaction: Vec<ReactionType>,
    #[serde(default)]
    pub new_reaction: Vec<ReactionType>,
}

impl MessageReactionUpdated {
    /// First plain-emoji entry of a reaction list, if any.
    pub fn emoji_of(reactions: &[ReactionType]) -> Option<&str> {
        reactions
            .iter()
            .find(|reaction| reaction.reaction_type == "emoji")
            .and_then(|reaction| reaction.emoji.as_deref())
    }
}
