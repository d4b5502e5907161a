//! Bidirectional message mirroring between applicant chats and staff topics.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use vidbir_core::{
    current_unix_timestamp, ApplicantId, MessageId, MessageKind, NewLogEntry, ThreadId,
};
use vidbir_storage::IntakeStore;

use crate::gateway::{Destination, RelayGateway};

/// An inbound platform message reduced to what mirroring needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub kind: MessageKind,
}

/// A successfully mirrored message: the original id, its copy, and the
/// mapping it was routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirroredMessage {
    pub source_id: MessageId,
    pub mirrored_id: MessageId,
    pub applicant_id: ApplicantId,
    pub thread_id: ThreadId,
}

/// Copies messages across the bridge and records the resulting id pair.
#[derive(Clone)]
pub struct MessageMirror {
    store: Arc<dyn IntakeStore>,
    gateway: Arc<dyn RelayGateway>,
}

impl MessageMirror {
    pub fn new(store: Arc<dyn IntakeStore>, gateway: Arc<dyn RelayGateway>) -> Self {
        Self { store, gateway }
    }

    /// Mirrors an applicant's private-chat message into their staff topic.
    ///
    /// Returns `None` when the applicant has no open thread: until staff
    /// explicitly starts a chat there is no destination, and relaying
    /// untriaged content into the group is undesirable, so the message is
    /// dropped silently. A gateway failure is an error for this event; no
    /// log entry is written for a copy that does not exist.
    pub async fn relay_from_applicant(
        &self,
        applicant_id: ApplicantId,
        message: InboundMessage,
    ) -> Result<Option<MirroredMessage>> {
        let Some(mapping) = self.store.mapping_by_applicant(applicant_id).await? else {
            debug!(applicant_id, "no open thread, dropping applicant message");
            return Ok(None);
        };

        let mirrored_id = self
            .gateway
            .copy_message(
                Destination::StaffGroup,
                Some(mapping.thread_id),
                Destination::Applicant(applicant_id),
                message.message_id,
            )
            .await
            .context("failed to copy applicant message into topic")?;

        self.store
            .insert_log_entry(
                NewLogEntry {
                    staff_message_id: mirrored_id,
                    applicant_message_id: message.message_id,
                    telegram_id: applicant_id,
                    thread_id: mapping.thread_id,
                    kind: message.kind,
                },
                current_unix_timestamp(),
            )
            .await?;

        Ok(Some(MirroredMessage {
            source_id: message.message_id,
            mirrored_id,
            applicant_id,
            thread_id: mapping.thread_id,
        }))
    }

    /// Mirrors a staff message posted in an applicant topic into that
    /// applicant's private chat.
    ///
    /// Returns `None` when the topic is not mapped (message posted outside
    /// any applicant thread). On success the applicant's status flips
    /// `New -> In Progress` — the first-contact transition; applicant-origin
    /// traffic never changes status.
    pub async fn relay_from_staff(
        &self,
        thread_id: ThreadId,
        message: InboundMessage,
    ) -> Result<Option<MirroredMessage>> {
        let Some(mapping) = self.store.mapping_by_thread(thread_id).await? else {
            debug!(thread_id, "message outside any applicant thread, dropping");
            return Ok(None);
        };
        let applicant_id = mapping.telegram_id;

        let mirrored_id = self
            .gateway
            .copy_message(
                Destination::Applicant(applicant_id),
                None,
                Destination::StaffGroup,
                message.message_id,
            )
            .await
            .context("failed to copy staff message to applicant")?;

        self.store
            .insert_log_entry(
                NewLogEntry {
                    staff_message_id: message.message_id,
                    applicant_message_id: mirrored_id,
                    telegram_id: applicant_id,
                    thread_id,
                    kind: message.kind,
                },
                current_unix_timestamp(),
            )
            .await?;

        self.store.mark_in_progress(applicant_id).await?;

        Ok(Some(MirroredMessage {
            source_id: message.message_id,
            mirrored_id,
            applicant_id,
            thread_id,
        }))
    }
}
