//! Chat - a realtime message room built on a live mirror.
//!
//! A [`ChatRoom`] is what a chat view holds while it is mounted: it seeds the
//! message list from the `messages` collection, keeps it live through the
//! platform's change stream and sends new messages through the platform.
//! Sent messages appear in the list only when their INSERT comes back.

mod room;

use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::record::{Insertable, Timestamp};

pub use room::{ChatRoom, ChatUser};

/// Shown when a message has no author email.
pub const ANONYMOUS_AUTHOR: &str = "User";

/// One row of the `messages` collection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, crate::Record)]
#[record(collection = "messages")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl ChatMessage {
    /// The author's email, or a generic label.
    pub fn author_label(&self) -> &str {
        self.user_email.as_deref().unwrap_or(ANONYMOUS_AUTHOR)
    }

    /// Whether `user_id` wrote this message.
    pub fn is_from(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// A message the client wants to send; the store assigns id and timestamp.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NewChatMessage {
    pub user_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl NewChatMessage {
    pub fn new(
        user_id: impl Into<String>,
        content: impl Into<String>,
        user_email: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            content: content.into(),
            user_email,
        }
    }

    /// Reject drafts that would post an empty message.
    pub fn validate(&self) -> Result<(), SubmitError> {
        if self.user_id.is_empty() {
            return Err(SubmitError::Invalid("message has no author".into()));
        }
        if self.content.trim().is_empty() {
            return Err(SubmitError::Invalid("message content is empty".into()));
        }
        Ok(())
    }
}

impl Insertable for ChatMessage {
    type Draft = NewChatMessage;

    fn materialize(id: String, created_at: Timestamp, draft: NewChatMessage) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            content: draft.content,
            created_at,
            user_email: draft.user_email,
        }
    }
}
