//! Platform seam consumed by the relay engine.

use anyhow::Result;
use async_trait::async_trait;

use vidbir_core::{ApplicantId, MessageId, ThreadId};

/// Where a message lives (or should land): the staff group or one
/// applicant's private chat. An applicant's chat id equals their user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    StaffGroup,
    Applicant(ApplicantId),
}

/// Remote chat-platform operations the engine needs. Implemented by the
/// Telegram client; tests substitute a scripted recorder. Every call is
/// remote, fallible, and rate-limited — callers decide per call site
/// whether a failure aborts the event or is swallowed.
#[async_trait]
pub trait RelayGateway: Send + Sync {
    /// Creates a forum topic in the staff group and returns its thread id.
    async fn create_topic(&self, title: &str) -> Result<ThreadId>;

    /// Deletes a forum topic together with its messages.
    async fn delete_topic(&self, thread_id: ThreadId) -> Result<()>;

    /// Copies a message, preserving its content type and media, and returns
    /// the id of the copy. `thread_id` targets a topic when the destination
    /// is the staff group.
    async fn copy_message(
        &self,
        to: Destination,
        thread_id: Option<ThreadId>,
        from: Destination,
        message_id: MessageId,
    ) -> Result<MessageId>;

    /// Replaces the text of a previously sent message.
    async fn edit_text(&self, at: Destination, message_id: MessageId, text: &str) -> Result<()>;

    /// Replaces the caption of a previously sent media message.
    async fn edit_caption(
        &self,
        at: Destination,
        message_id: MessageId,
        caption: &str,
    ) -> Result<()>;

    /// Deletes a single message.
    async fn delete_message(&self, at: Destination, message_id: MessageId) -> Result<()>;

    /// Sets (or, with `None`, clears) the bot's reaction on a message.
    async fn set_reaction(
        &self,
        at: Destination,
        message_id: MessageId,
        reaction: Option<&str>,
    ) -> Result<()>;
}
