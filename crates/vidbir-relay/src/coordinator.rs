//! Applicant status transitions and their thread side effects.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use vidbir_core::{
    AcceptanceDetails, AcceptanceParseError, ApplicantId, ApplicantStatus, OperatorId,
    PendingAction, PendingKind,
};
use vidbir_storage::IntakeStore;

use crate::directory::ThreadDirectory;

/// Result of feeding an operator reply into the two-phase acceptance flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptanceOutcome {
    /// The acceptance was committed and the thread torn down.
    Committed {
        applicant_id: ApplicantId,
        details: AcceptanceDetails,
    },
    /// The reply did not parse; the pending state is untouched so the
    /// operator can retry.
    InvalidInput(AcceptanceParseError),
    /// The operator has no live pending acceptance (never started, already
    /// finished, or expired).
    NoPending,
}

/// Single chokepoint for every status change, whatever entry point triggered
/// it — inline button, metadata reply, delete command, or the web panel.
/// Guarantees thread teardown on each terminal transition.
#[derive(Clone)]
pub struct StatusCoordinator {
    store: Arc<dyn IntakeStore>,
    directory: ThreadDirectory,
}

impl StatusCoordinator {
    pub fn new(store: Arc<dyn IntakeStore>, directory: ThreadDirectory) -> Self {
        Self { store, directory }
    }

    pub fn directory(&self) -> &ThreadDirectory {
        &self.directory
    }

    /// Applies a direct status transition. Terminal statuses close the
    /// thread and clear any pending flows targeting the applicant; repeating
    /// a terminal status is a no-op on the already-closed thread.
    pub async fn set_status(
        &self,
        applicant_id: ApplicantId,
        status: ApplicantStatus,
    ) -> Result<()> {
        if status.is_terminal() {
            self.store.delete_pending_for_applicant(applicant_id).await?;
        }
        self.store.update_status(applicant_id, status).await?;
        if status.is_terminal() {
            self.directory.close(applicant_id).await?;
        }
        info!(applicant_id, status = %status, "applicant status updated");
        Ok(())
    }

    /// Declines an application.
    pub async fn decline(&self, applicant_id: ApplicantId) -> Result<()> {
        self.set_status(applicant_id, ApplicantStatus::Declined).await
    }

    /// Phase one of acceptance: records that `operator_id` owes acceptance
    /// metadata for `applicant_id`. Nothing changes on the applicant row
    /// yet. A second start by the same operator overwrites the first.
    pub async fn begin_acceptance(
        &self,
        operator_id: OperatorId,
        applicant_id: ApplicantId,
        now_unix: u64,
        ttl_seconds: u64,
    ) -> Result<()> {
        self.store
            .upsert_pending(PendingAction {
                operator_id,
                applicant_id,
                kind: PendingKind::Acceptance,
                created_at_unix: now_unix,
                expires_at_unix: now_unix.saturating_add(ttl_seconds),
            })
            .await?;
        debug!(operator_id, applicant_id, "acceptance pending metadata");
        Ok(())
    }

    /// Phase two: parses the operator's `місто:РРРР-ММ-ДД` reply and, on
    /// success, commits status and metadata in one write, then closes the
    /// thread. Malformed input leaves the pending state for a retry; no
    /// partial acceptance is ever persisted.
    pub async fn complete_acceptance(
        &self,
        operator_id: OperatorId,
        reply: &str,
        now_unix: u64,
    ) -> Result<AcceptanceOutcome> {
        let Some(pending) = self.store.get_pending(operator_id).await? else {
            return Ok(AcceptanceOutcome::NoPending);
        };
        if pending.expires_at_unix <= now_unix {
            self.store.delete_pending(operator_id).await?;
            return Ok(AcceptanceOutcome::NoPending);
        }

        let details = match AcceptanceDetails::parse(reply) {
            Ok(details) => details,
            Err(error) => return Ok(AcceptanceOutcome::InvalidInput(error)),
        };

        // Pending state goes first; the applicant-row commit and thread
        // close follow. A crash in between loses only the pending marker.
        self.store.delete_pending(operator_id).await?;
        self.store
            .commit_acceptance(pending.applicant_id, &details)
            .await?;
        self.directory.close(pending.applicant_id).await?;
        info!(
            applicant_id = pending.applicant_id,
            city = %details.city,
            date = %details.date,
            "application accepted"
        );
        Ok(AcceptanceOutcome::Committed {
            applicant_id: pending.applicant_id,
            details,
        })
    }

    /// Applies a status update arriving from the web panel. Acceptance
    /// requires metadata and bypasses the two-phase chat flow; other
    /// statuses go through the usual transition path.
    pub async fn apply_panel_update(
        &self,
        applicant_id: ApplicantId,
        status: ApplicantStatus,
        details: Option<AcceptanceDetails>,
    ) -> Result<()> {
        match (status, details) {
            (ApplicantStatus::Accepted, Some(details)) => {
                self.store.delete_pending_for_applicant(applicant_id).await?;
                self.store.commit_acceptance(applicant_id, &details).await?;
                self.directory.close(applicant_id).await?;
                Ok(())
            }
            (ApplicantStatus::Accepted, None) => {
                anyhow::bail!("acceptance requires city and date")
            }
            (status, _) => self.set_status(applicant_id, status).await,
        }
    }

    /// Deletes an application entirely: thread teardown, pending flows,
    /// then the row itself. Log entries are left behind; with the mapping
    /// gone they are unreachable, which is the accepted tradeoff.
    pub async fn delete_applicant(&self, applicant_id: ApplicantId) -> Result<()> {
        self.directory.close(applicant_id).await?;
        self.store.delete_pending_for_applicant(applicant_id).await?;
        self.store.delete_applicant(applicant_id).await?;
        info!(applicant_id, "applicant deleted");
        Ok(())
    }
}
