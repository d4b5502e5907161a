//! Intake store abstractions and in-memory backend.
//!
//! Storage is the sole source of truth for applicants, thread mappings, the
//! message log, mirrored reactions, panel tokens, pending staff actions, and
//! runtime settings. Every consumer re-derives its decisions from here, so
//! the backends enforce the uniqueness invariants (one open thread per
//! applicant, one active pair per message id) and surface violations as
//! typed errors callers can recover from.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use vidbir_core::{
    AcceptanceDetails, Applicant, ApplicantId, ApplicantStatus, MessageId, MessageLogEntry,
    NewApplicant, NewLogEntry, OperatorId, PairLookup, PendingAction, ReactionRecord, ThreadId,
    ThreadMapping,
};

mod sqlite;

pub use sqlite::SqliteIntakeStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("applicant {0} already exists")]
    ApplicantExists(ApplicantId),
    #[error("applicant {0} not found")]
    ApplicantNotFound(ApplicantId),
    #[error("applicant {0} already has an open thread")]
    MappingExists(ApplicantId),
    #[error("a log pair already references message {0}")]
    LogPairExists(MessageId),
    #[error("invalid persisted value for '{field}': {value}")]
    InvalidPersistedValue { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Async store contract shared by the relay engine, the bot runtime, and the
/// web panel.
#[async_trait]
pub trait IntakeStore: Send + Sync {
    // Applicants.
    async fn create_applicant(&self, profile: NewApplicant) -> StoreResult<()>;
    async fn applicant_exists(&self, applicant_id: ApplicantId) -> StoreResult<bool>;
    async fn get_applicant(&self, applicant_id: ApplicantId) -> StoreResult<Option<Applicant>>;
    async fn list_applicants(
        &self,
        status: Option<ApplicantStatus>,
    ) -> StoreResult<Vec<Applicant>>;
    async fn update_status(
        &self,
        applicant_id: ApplicantId,
        status: ApplicantStatus,
    ) -> StoreResult<()>;
    /// First-contact transition: flips `New` to `In Progress` in a single
    /// conditional write. Returns whether a row changed.
    async fn mark_in_progress(&self, applicant_id: ApplicantId) -> StoreResult<bool>;
    /// All-or-nothing acceptance commit: status, city, and date in one write.
    async fn commit_acceptance(
        &self,
        applicant_id: ApplicantId,
        details: &AcceptanceDetails,
    ) -> StoreResult<()>;
    async fn delete_applicant(&self, applicant_id: ApplicantId) -> StoreResult<()>;

    // Thread mappings.
    async fn insert_mapping(
        &self,
        applicant_id: ApplicantId,
        thread_id: ThreadId,
        created_at_unix: u64,
    ) -> StoreResult<()>;
    async fn mapping_by_applicant(
        &self,
        applicant_id: ApplicantId,
    ) -> StoreResult<Option<ThreadMapping>>;
    async fn mapping_by_thread(&self, thread_id: ThreadId) -> StoreResult<Option<ThreadMapping>>;
    async fn delete_mapping(&self, applicant_id: ApplicantId) -> StoreResult<()>;

    // Message log.
    async fn insert_log_entry(&self, entry: NewLogEntry, created_at_unix: u64) -> StoreResult<()>;
    /// Looks a raw id up against both sides of the log and tags which side
    /// matched.
    async fn find_pair(&self, message_id: MessageId) -> StoreResult<Option<PairLookup>>;
    async fn delete_log_entry(&self, staff_message_id: MessageId) -> StoreResult<()>;

    // Reactions.
    /// Returns true when a new record was inserted, false on update.
    async fn upsert_reaction(&self, record: ReactionRecord) -> StoreResult<bool>;
    async fn delete_reaction(&self, message_id: MessageId, reactor_id: i64) -> StoreResult<()>;

    // Panel tokens.
    async fn insert_admin_token(
        &self,
        token: &str,
        issued_to: OperatorId,
        created_at_unix: u64,
    ) -> StoreResult<()>;
    /// Resolves a token to its operator, purging every expired token first.
    async fn resolve_admin_token(
        &self,
        token: &str,
        now_unix: u64,
        ttl_seconds: u64,
    ) -> StoreResult<Option<OperatorId>>;

    // Pending staff actions.
    async fn upsert_pending(&self, action: PendingAction) -> StoreResult<()>;
    async fn get_pending(&self, operator_id: OperatorId) -> StoreResult<Option<PendingAction>>;
    async fn delete_pending(&self, operator_id: OperatorId) -> StoreResult<()>;
    async fn delete_pending_for_applicant(&self, applicant_id: ApplicantId) -> StoreResult<()>;

    // Runtime settings.
    async fn get_setting(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// In-memory implementation for tests and local experimentation.
#[derive(Debug, Default)]
pub struct InMemoryIntakeStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    applicants: HashMap<ApplicantId, Applicant>,
    mappings: Vec<ThreadMapping>,
    log: Vec<MessageLogEntry>,
    reactions: HashMap<(MessageId, i64), ReactionRecord>,
    tokens: HashMap<String, (OperatorId, u64)>,
    pending: HashMap<OperatorId, PendingAction>,
    settings: HashMap<String, String>,
}

impl InMemoryIntakeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntakeStore for InMemoryIntakeStore {
    async fn create_applicant(&self, profile: NewApplicant) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.applicants.contains_key(&profile.telegram_id) {
            return Err(StoreError::ApplicantExists(profile.telegram_id));
        }
        inner.applicants.insert(
            profile.telegram_id,
            Applicant {
                telegram_id: profile.telegram_id,
                name: profile.name,
                age: profile.age,
                city: profile.city,
                username: profile.username,
                phone: profile.phone,
                status: ApplicantStatus::New,
                accepted_city: None,
                accepted_date: None,
            },
        );
        Ok(())
    }

    async fn applicant_exists(&self, applicant_id: ApplicantId) -> StoreResult<bool> {
        Ok(self.inner.read().await.applicants.contains_key(&applicant_id))
    }

    async fn get_applicant(&self, applicant_id: ApplicantId) -> StoreResult<Option<Applicant>> {
        Ok(self.inner.read().await.applicants.get(&applicant_id).cloned())
    }

    async fn list_applicants(
        &self,
        status: Option<ApplicantStatus>,
    ) -> StoreResult<Vec<Applicant>> {
        let inner = self.inner.read().await;
        let mut rows = inner
            .applicants
            .values()
            .filter(|applicant| status.map_or(true, |wanted| applicant.status == wanted))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by_key(|applicant| applicant.telegram_id);
        Ok(rows)
    }

    async fn update_status(
        &self,
        applicant_id: ApplicantId,
        status: ApplicantStatus,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let applicant = inner
            .applicants
            .get_mut(&applicant_id)
            .ok_or(StoreError::ApplicantNotFound(applicant_id))?;
        applicant.status = status;
        Ok(())
    }

    async fn mark_in_progress(&self, applicant_id: ApplicantId) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.applicants.get_mut(&applicant_id) {
            Some(applicant) if applicant.status == ApplicantStatus::New => {
                applicant.status = ApplicantStatus::InProgress;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit_acceptance(
        &self,
        applicant_id: ApplicantId,
        details: &AcceptanceDetails,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let applicant = inner
            .applicants
            .get_mut(&applicant_id)
            .ok_or(StoreError::ApplicantNotFound(applicant_id))?;
        applicant.status = ApplicantStatus::Accepted;
        applicant.accepted_city = Some(details.city.clone());
        applicant.accepted_date = Some(details.date);
        Ok(())
    }

    async fn delete_applicant(&self, applicant_id: ApplicantId) -> StoreResult<()> {
        self.inner.write().await.applicants.remove(&applicant_id);
        Ok(())
    }

    async fn insert_mapping(
        &self,
        applicant_id: ApplicantId,
        thread_id: ThreadId,
        created_at_unix: u64,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner
            .mappings
            .iter()
            .any(|mapping| mapping.telegram_id == applicant_id || mapping.thread_id == thread_id)
        {
            return Err(StoreError::MappingExists(applicant_id));
        }
        inner.mappings.push(ThreadMapping {
            telegram_id: applicant_id,
            thread_id,
            created_at_unix,
        });
        Ok(())
    }

    async fn mapping_by_applicant(
        &self,
        applicant_id: ApplicantId,
    ) -> StoreResult<Option<ThreadMapping>> {
        Ok(self
            .inner
            .read()
            .await
            .mappings
            .iter()
            .find(|mapping| mapping.telegram_id == applicant_id)
            .cloned())
    }

    async fn mapping_by_thread(&self, thread_id: ThreadId) -> StoreResult<Option<ThreadMapping>> {
        Ok(self
            .inner
            .read()
            .await
            .mappings
            .iter()
            .find(|mapping| mapping.thread_id == thread_id)
            .cloned())
    }

    async fn delete_mapping(&self, applicant_id: ApplicantId) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .mappings
            .retain(|mapping| mapping.telegram_id != applicant_id);
        Ok(())
    }

    async fn insert_log_entry(&self, entry: NewLogEntry, created_at_unix: u64) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        for existing in &inner.log {
            for id in [entry.staff_message_id, entry.applicant_message_id] {
                if existing.staff_message_id == id || existing.applicant_message_id == id {
                    return Err(StoreError::LogPairExists(id));
                }
            }
        }
        inner.log.push(MessageLogEntry {
            staff_message_id: entry.staff_message_id,
            applicant_message_id: entry.applicant_message_id,
            telegram_id: entry.telegram_id,
            thread_id: entry.thread_id,
            kind: entry.kind,
            created_at_unix,
        });
        Ok(())
    }

    async fn find_pair(&self, message_id: MessageId) -> StoreResult<Option<PairLookup>> {
        let inner = self.inner.read().await;
        for entry in &inner.log {
            if entry.staff_message_id == message_id {
                return Ok(Some(PairLookup::Staff(entry.clone())));
            }
            if entry.applicant_message_id == message_id {
                return Ok(Some(PairLookup::Applicant(entry.clone())));
            }
        }
        Ok(None)
    }

    async fn delete_log_entry(&self, staff_message_id: MessageId) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .log
            .retain(|entry| entry.staff_message_id != staff_message_id);
        Ok(())
    }

    async fn upsert_reaction(&self, record: ReactionRecord) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let key = (record.message_id, record.reactor_id);
        Ok(inner.reactions.insert(key, record).is_none())
    }

    async fn delete_reaction(&self, message_id: MessageId, reactor_id: i64) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .reactions
            .remove(&(message_id, reactor_id));
        Ok(())
    }

    async fn insert_admin_token(
        &self,
        token: &str,
        issued_to: OperatorId,
        created_at_unix: u64,
    ) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .tokens
            .insert(token.to_string(), (issued_to, created_at_unix));
        Ok(())
    }

    async fn resolve_admin_token(
        &self,
        token: &str,
        now_unix: u64,
        ttl_seconds: u64,
    ) -> StoreResult<Option<OperatorId>> {
        let mut inner = self.inner.write().await;
        inner
            .tokens
            .retain(|_, (_, created_at)| created_at.saturating_add(ttl_seconds) > now_unix);
        Ok(inner.tokens.get(token).map(|(operator, _)| *operator))
    }

    async fn upsert_pending(&self, action: PendingAction) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .pending
            .insert(action.operator_id, action);
        Ok(())
    }

    async fn get_pending(&self, operator_id: OperatorId) -> StoreResult<Option<PendingAction>> {
        Ok(self.inner.read().await.pending.get(&operator_id).cloned())
    }

    async fn delete_pending(&self, operator_id: OperatorId) -> StoreResult<()> {
        self.inner.write().await.pending.remove(&operator_id);
        Ok(())
    }

    async fn delete_pending_for_applicant(&self, applicant_id: ApplicantId) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .pending
            .retain(|_, action| action.applicant_id != applicant_id);
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.read().await.settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidbir_core::{MessageKind, PendingKind, ReactionSide};

    fn profile(id: ApplicantId) -> NewApplicant {
        NewApplicant {
            telegram_id: id,
            name: "Олена".to_string(),
            age: 20,
            city: "Львів".to_string(),
            username: Some("olena_l".to_string()),
            phone: Some("+380501112233".to_string()),
        }
    }

    #[tokio::test]
    async fn duplicate_applicant_is_rejected() {
        let store = InMemoryIntakeStore::new();
        store.create_applicant(profile(1)).await.expect("create");
        assert!(matches!(
            store.create_applicant(profile(1)).await,
            Err(StoreError::ApplicantExists(1))
        ));
        assert!(store.applicant_exists(1).await.expect("exists"));
    }

    #[tokio::test]
    async fn mapping_uniqueness_covers_both_columns() {
        let store = InMemoryIntakeStore::new();
        store.insert_mapping(1, 100, 0).await.expect("insert");
        assert!(matches!(
            store.insert_mapping(1, 200, 0).await,
            Err(StoreError::MappingExists(1))
        ));
        assert!(matches!(
            store.insert_mapping(2, 100, 0).await,
            Err(StoreError::MappingExists(2))
        ));
        let by_thread = store.mapping_by_thread(100).await.expect("lookup");
        assert_eq!(by_thread.map(|mapping| mapping.telegram_id), Some(1));
    }

    #[tokio::test]
    async fn find_pair_tags_the_matching_side() {
        let store = InMemoryIntakeStore::new();
        store
            .insert_log_entry(
                NewLogEntry {
                    staff_message_id: 10,
                    applicant_message_id: 20,
                    telegram_id: 1,
                    thread_id: 100,
                    kind: MessageKind::Text,
                },
                0,
            )
            .await
            .expect("insert");

        assert!(matches!(
            store.find_pair(10).await.expect("staff lookup"),
            Some(PairLookup::Staff(_))
        ));
        assert!(matches!(
            store.find_pair(20).await.expect("applicant lookup"),
            Some(PairLookup::Applicant(_))
        ));
        assert!(store.find_pair(30).await.expect("miss").is_none());
    }

    #[tokio::test]
    async fn log_pair_ids_are_unique_across_entries() {
        let store = InMemoryIntakeStore::new();
        let entry = NewLogEntry {
            staff_message_id: 10,
            applicant_message_id: 20,
            telegram_id: 1,
            thread_id: 100,
            kind: MessageKind::Photo,
        };
        store.insert_log_entry(entry.clone(), 0).await.expect("insert");
        let mut duplicate = entry;
        duplicate.staff_message_id = 11;
        assert!(matches!(
            store.insert_log_entry(duplicate, 0).await,
            Err(StoreError::LogPairExists(20))
        ));
    }

    #[tokio::test]
    async fn reaction_upsert_reports_insert_vs_update() {
        let store = InMemoryIntakeStore::new();
        let record = ReactionRecord {
            message_id: 10,
            reactor_id: 5,
            reaction: "👍".to_string(),
            side: ReactionSide::Staff,
        };
        assert!(store.upsert_reaction(record.clone()).await.expect("insert"));
        assert!(!store.upsert_reaction(record).await.expect("update"));
    }

    #[tokio::test]
    async fn expired_tokens_are_purged_on_validation() {
        let store = InMemoryIntakeStore::new();
        store
            .insert_admin_token("vb_old", 7, 1_000)
            .await
            .expect("insert");
        store
            .insert_admin_token("vb_new", 8, 2_000)
            .await
            .expect("insert");

        let resolved = store
            .resolve_admin_token("vb_new", 2_500, 600)
            .await
            .expect("resolve");
        assert_eq!(resolved, Some(8));
        // The old token fell out during the purge above.
        let resolved = store
            .resolve_admin_token("vb_old", 2_500, 600)
            .await
            .expect("resolve");
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn pending_actions_replace_per_operator() {
        let store = InMemoryIntakeStore::new();
        let first = PendingAction {
            operator_id: 9,
            applicant_id: 1,
            kind: PendingKind::Acceptance,
            created_at_unix: 0,
            expires_at_unix: 100,
        };
        let mut second = first.clone();
        second.applicant_id = 2;
        store.upsert_pending(first).await.expect("insert");
        store.upsert_pending(second.clone()).await.expect("replace");
        assert_eq!(
            store.get_pending(9).await.expect("get"),
            Some(second)
        );
        store.delete_pending_for_applicant(2).await.expect("delete");
        assert_eq!(store.get_pending(9).await.expect("get"), None);
    }
}
