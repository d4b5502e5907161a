//! Edit, reaction, and delete propagation across mirrored pairs.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use vidbir_core::{MessageId, PairLookup, ReactionRecord, ReactionSide};
use vidbir_storage::IntakeStore;

use crate::gateway::{Destination, RelayGateway};

/// Marker prepended to applicant-origin edits when they land in the staff
/// topic, so applicant voice stays distinguishable in the shared transcript.
pub const APPLICANT_EDIT_PREFIX: &str = "👤 ";

/// New content carried by an edit event. Text and captioned media are the
/// two supported shapes; anything else is ignored upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditContent<'a> {
    Text(&'a str),
    Caption(&'a str),
}

/// Applies edits, reactions, and deletes to the counterpart of a previously
/// mirrored message. All operations are no-ops for untracked ids.
#[derive(Clone)]
pub struct Propagator {
    store: Arc<dyn IntakeStore>,
    gateway: Arc<dyn RelayGateway>,
}

impl Propagator {
    pub fn new(store: Arc<dyn IntakeStore>, gateway: Arc<dyn RelayGateway>) -> Self {
        Self { store, gateway }
    }

    /// Mirrors an edit onto the other side of the pair.
    ///
    /// Applicant-origin edits receive the person-glyph prefix; staff-origin
    /// edits are applied verbatim. A platform rejection (message too old,
    /// deleted, ...) is logged and leaves the log entry intact for future
    /// edits and reactions.
    pub async fn propagate_edit(
        &self,
        edited_message_id: MessageId,
        content: EditContent<'_>,
    ) -> Result<()> {
        let Some(pair) = self.store.find_pair(edited_message_id).await? else {
            debug!(edited_message_id, "edit for untracked message, ignoring");
            return Ok(());
        };

        let (destination, counterpart_id, rendered);
        match &pair {
            // Staff edited the topic copy; apply verbatim in the private chat.
            PairLookup::Staff(entry) => {
                destination = Destination::Applicant(entry.telegram_id);
                counterpart_id = entry.applicant_message_id;
                rendered = match content {
                    EditContent::Text(text) => text.to_string(),
                    EditContent::Caption(caption) => caption.to_string(),
                };
            }
            // The applicant edited their original; mark the voice in the topic.
            PairLookup::Applicant(entry) => {
                destination = Destination::StaffGroup;
                counterpart_id = entry.staff_message_id;
                rendered = match content {
                    EditContent::Text(text) => format!("{APPLICANT_EDIT_PREFIX}{text}"),
                    EditContent::Caption(caption) => format!("{APPLICANT_EDIT_PREFIX}{caption}"),
                };
            }
        }

        let applied = match content {
            EditContent::Text(_) => {
                self.gateway
                    .edit_text(destination, counterpart_id, &rendered)
                    .await
            }
            EditContent::Caption(_) => {
                self.gateway
                    .edit_caption(destination, counterpart_id, &rendered)
                    .await
            }
        };
        if let Err(error) = applied {
            warn!(
                edited_message_id,
                counterpart_id,
                error = %error,
                "failed to propagate edit"
            );
        }
        Ok(())
    }

    /// Mirrors a reaction change onto the counterpart message and records it.
    ///
    /// `new_reaction = None` clears the counterpart reaction and drops the
    /// record. Cosmetic mirroring only: failures never touch applicant or
    /// thread state.
    pub async fn propagate_reaction(
        &self,
        message_id: MessageId,
        reactor_id: i64,
        new_reaction: Option<&str>,
        old_reaction: Option<&str>,
    ) -> Result<()> {
        let Some(pair) = self.store.find_pair(message_id).await? else {
            debug!(message_id, "reaction for untracked message, ignoring");
            return Ok(());
        };

        let (destination, counterpart_id, side) = match &pair {
            PairLookup::Staff(entry) => (
                Destination::Applicant(entry.telegram_id),
                entry.applicant_message_id,
                ReactionSide::Staff,
            ),
            PairLookup::Applicant(entry) => (
                Destination::StaffGroup,
                entry.staff_message_id,
                ReactionSide::Applicant,
            ),
        };

        if let Err(error) = self
            .gateway
            .set_reaction(destination, counterpart_id, new_reaction)
            .await
        {
            warn!(message_id, counterpart_id, error = %error, "failed to mirror reaction");
        }

        match new_reaction {
            Some(reaction) => {
                let inserted = self
                    .store
                    .upsert_reaction(ReactionRecord {
                        message_id,
                        reactor_id,
                        reaction: reaction.to_string(),
                        side,
                    })
                    .await?;
                debug!(
                    message_id,
                    reactor_id,
                    changed = old_reaction.is_some(),
                    inserted,
                    "recorded reaction"
                );
            }
            None => {
                self.store.delete_reaction(message_id, reactor_id).await?;
            }
        }
        Ok(())
    }

    /// Deletes the counterpart of a mirrored message and retires the pair.
    ///
    /// The log entry is removed even when the remote delete fails: a pair
    /// half of which is gone would misdirect future edits, which is worse
    /// than a leftover message.
    pub async fn propagate_delete(&self, message_id: MessageId) -> Result<()> {
        let Some(pair) = self.store.find_pair(message_id).await? else {
            debug!(message_id, "delete for untracked message, ignoring");
            return Ok(());
        };

        let (destination, counterpart_id) = match &pair {
            PairLookup::Staff(entry) => (
                Destination::Applicant(entry.telegram_id),
                entry.applicant_message_id,
            ),
            PairLookup::Applicant(entry) => {
                (Destination::StaffGroup, entry.staff_message_id)
            }
        };

        if let Err(error) = self
            .gateway
            .delete_message(destination, counterpart_id)
            .await
        {
            warn!(message_id, counterpart_id, error = %error, "failed to delete counterpart");
        }
        self.store
            .delete_log_entry(pair.entry().staff_message_id)
            .await?;
        Ok(())
    }
}
