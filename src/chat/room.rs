use std::sync::Arc;

use log::info;

use super::{ChatMessage, NewChatMessage};
use crate::config::SyncConfig;
use crate::error::{FetchError, SubmitError};
use crate::platform::CollectionSource;
use crate::stream::ChangeStream;
use crate::sync::{LiveCollectionSync, SubscriptionHandle, SubscriptionStats};

/// The signed-in user a room sends messages as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    pub email: Option<String>,
}

impl ChatUser {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }
}

/// A mounted chat view: live message list plus a way to post.
///
/// Opening a room opens the platform's change stream before the bulk fetch and
/// starts consuming it right after, so a change made in between is not missed
/// (seeing it twice is harmless). Closing or dropping the room releases the
/// subscription.
pub struct ChatRoom<P> {
    platform: Arc<P>,
    user: ChatUser,
    sync: LiveCollectionSync<ChatMessage>,
    subscription: Option<SubscriptionHandle>,
}

impl<P> ChatRoom<P>
where
    P: CollectionSource<ChatMessage, Draft = NewChatMessage>,
{
    /// Seed the message list and start following changes.
    ///
    /// A failed fetch closes the stream again and is returned as is.
    pub fn open<F>(
        platform: Arc<P>,
        user: ChatUser,
        config: SyncConfig,
        observer: F,
    ) -> Result<Self, FetchError>
    where
        F: Fn(&[ChatMessage]) + Send + Sync + 'static,
    {
        let sync = LiveCollectionSync::with_config(config, observer);
        let stream = platform.changes();

        if let Err(err) = sync.initialize_from(platform.as_ref()) {
            stream.close();
            return Err(err);
        }
        let subscription = sync.subscribe(stream);

        info!("chat room opened for user {}", user.id);
        Ok(Self {
            platform,
            user,
            sync,
            subscription: Some(subscription),
        })
    }

    /// Post a message as the room's user.
    ///
    /// Blank messages are rejected locally. The message shows up in
    /// `messages()` once the platform delivers its INSERT.
    pub fn send(&self, text: &str) -> Result<(), SubmitError> {
        let draft = NewChatMessage::new(self.user.id.clone(), text, self.user.email.clone());
        draft.validate()?;
        self.sync.publish_to(self.platform.as_ref(), draft)
    }

    /// Current messages, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.sync.snapshot()
    }

    /// Whether the message was written by this room's user.
    pub fn is_own(&self, message: &ChatMessage) -> bool {
        message.is_from(&self.user.id)
    }

    pub fn user(&self) -> &ChatUser {
        &self.user
    }

    /// Whether the room still follows changes.
    pub fn is_open(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// Release the subscription and return its counters.
    pub fn close(&mut self) -> SubscriptionStats {
        match self.subscription.take() {
            Some(handle) => {
                let stats = handle.stop();
                info!("chat room closed for user {}", self.user.id);
                stats
            }
            None => SubscriptionStats::default(),
        }
    }
}
