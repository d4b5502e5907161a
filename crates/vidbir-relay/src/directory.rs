//! Applicant ↔ topic mapping authority.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use vidbir_core::{current_unix_timestamp, ApplicantId, ThreadId};
use vidbir_storage::{IntakeStore, StoreError};

use crate::gateway::RelayGateway;

/// Owns the per-applicant thread lifecycle: `NoThread -(open)-> ThreadOpen
/// -(close)-> NoThread`, with `open` idempotent on an already-open thread.
#[derive(Clone)]
pub struct ThreadDirectory {
    store: Arc<dyn IntakeStore>,
    gateway: Arc<dyn RelayGateway>,
}

impl ThreadDirectory {
    pub fn new(store: Arc<dyn IntakeStore>, gateway: Arc<dyn RelayGateway>) -> Self {
        Self { store, gateway }
    }

    /// Thread for an applicant, if one is open.
    pub async fn resolve(&self, applicant_id: ApplicantId) -> Result<Option<ThreadId>> {
        Ok(self
            .store
            .mapping_by_applicant(applicant_id)
            .await?
            .map(|mapping| mapping.thread_id))
    }

    /// Applicant owning a thread, if the thread is mapped.
    pub async fn resolve_applicant(&self, thread_id: ThreadId) -> Result<Option<ApplicantId>> {
        Ok(self
            .store
            .mapping_by_thread(thread_id)
            .await?
            .map(|mapping| mapping.telegram_id))
    }

    /// Returns the applicant's thread, creating one when none exists.
    ///
    /// Calling `open` on an already-open thread returns the existing id
    /// unchanged. A concurrent double-open is resolved by the storage
    /// uniqueness constraint: the loser re-reads the winning mapping and
    /// best-effort deletes its now-redundant remote topic.
    pub async fn open(&self, applicant_id: ApplicantId) -> Result<ThreadId> {
        if let Some(mapping) = self.store.mapping_by_applicant(applicant_id).await? {
            return Ok(mapping.thread_id);
        }

        let applicant = self
            .store
            .get_applicant(applicant_id)
            .await?
            .with_context(|| format!("applicant {applicant_id} not found"))?;
        let title = format!("Чат: {}", applicant.display_title());

        let thread_id = match self.gateway.create_topic(&title).await {
            Ok(thread_id) => thread_id,
            Err(error) => {
                // The platform may report the topic as already existing when
                // an earlier create half-succeeded; the mapping is the
                // authority, so fall back to it before giving up.
                if let Some(mapping) = self.store.mapping_by_applicant(applicant_id).await? {
                    warn!(applicant_id, error = %error, "topic create failed, reusing mapped thread");
                    return Ok(mapping.thread_id);
                }
                return Err(error.context("failed to create forum topic"));
            }
        };

        match self
            .store
            .insert_mapping(applicant_id, thread_id, current_unix_timestamp())
            .await
        {
            Ok(()) => Ok(thread_id),
            Err(StoreError::MappingExists(_)) => {
                let existing = self
                    .store
                    .mapping_by_applicant(applicant_id)
                    .await?
                    .with_context(|| {
                        format!("mapping for applicant {applicant_id} vanished after insert race")
                    })?;
                if existing.thread_id != thread_id {
                    if let Err(error) = self.gateway.delete_topic(thread_id).await {
                        warn!(applicant_id, thread_id, error = %error, "failed to delete redundant topic");
                    }
                }
                debug!(applicant_id, thread_id = existing.thread_id, "open lost race, reusing mapping");
                Ok(existing.thread_id)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Tears an applicant's thread down.
    ///
    /// Remote deletion is best-effort: a stale local mapping would misroute
    /// future messages to a dead thread, so the mapping is removed even when
    /// the platform call fails. No-op when no thread is open.
    pub async fn close(&self, applicant_id: ApplicantId) -> Result<()> {
        let Some(mapping) = self.store.mapping_by_applicant(applicant_id).await? else {
            return Ok(());
        };
        if let Err(error) = self.gateway.delete_topic(mapping.thread_id).await {
            warn!(
                applicant_id,
                thread_id = mapping.thread_id,
                error = %error,
                "failed to delete topic, removing mapping anyway"
            );
        }
        self.store.delete_mapping(applicant_id).await?;
        Ok(())
    }
}
