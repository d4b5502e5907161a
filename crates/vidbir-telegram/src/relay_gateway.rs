//! `RelayGateway` implementation over the Bot API client.

use anyhow::Result;
use async_trait::async_trait;

use vidbir_core::{ChatId, MessageId, ThreadId};
use vidbir_relay::{Destination, RelayGateway};

use crate::api_client::TelegramApiClient;

/// Binds the generic relay seam to Telegram: the staff group is one fixed
/// forum-enabled chat, and an applicant's private chat id equals their user
/// id.
#[derive(Clone)]
pub struct TelegramRelayGateway {
    client: TelegramApiClient,
    group_id: ChatId,
}

impl TelegramRelayGateway {
    pub fn new(client: TelegramApiClient, group_id: ChatId) -> Self {
        Self { client, group_id }
    }

    fn chat_id(&self, destination: Destination) -> ChatId {
        match destination {
            Destination::StaffGroup => self.group_id,
            Destination::Applicant(applicant_id) => applicant_id,
        }
    }
}

#[async_trait]
impl RelayGateway for TelegramRelayGateway {
    async fn create_topic(&self, title: &str) -> Result<ThreadId> {
        self.client.create_forum_topic(self.group_id, title).await
    }

    async fn delete_topic(&self, thread_id: ThreadId) -> Result<()> {
        self.client
            .delete_forum_topic(self.group_id, thread_id)
            .await
    }

    async fn copy_message(
        &self,
        to: Destination,
        thread_id: Option<ThreadId>,
        from: Destination,
        message_id: MessageId,
    ) -> Result<MessageId> {
        self.client
            .copy_message(self.chat_id(to), thread_id, self.chat_id(from), message_id)
            .await
    }

    async fn edit_text(&self, at: Destination, message_id: MessageId, text: &str) -> Result<()> {
        self.client
            .edit_message_text(self.chat_id(at), message_id, text)
            .await
    }

    async fn edit_caption(
        &self,
        at: Destination,
        message_id: MessageId,
        caption: &str,
    ) -> Result<()> {
        self.client
            .edit_message_caption(self.chat_id(at), message_id, caption)
            .await
    }

    async fn delete_message(&self, at: Destination, message_id: MessageId) -> Result<()> {
        self.client
            .delete_message(self.chat_id(at), message_id)
            .await
    }

    async fn set_reaction(
        &self,
        at: Destination,
        message_id: MessageId,
        reaction: Option<&str>,
    ) -> Result<()> {
        self.client
            .set_message_reaction(self.chat_id(at), message_id, reaction)
            .await
    }
}
