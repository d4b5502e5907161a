//! SQLite-backed `IntakeStore` implementation with durable persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use vidbir_core::{
    AcceptanceDetails, Applicant, ApplicantId, ApplicantStatus, MessageId, MessageKind,
    MessageLogEntry, NewApplicant, NewLogEntry, OperatorId, PairLookup, PendingAction,
    PendingKind, ReactionRecord, ThreadId, ThreadMapping,
};

use crate::{IntakeStore, StoreError, StoreResult};

/// Persistent SQLite store. The service is the sole writer; WAL mode keeps
/// the bot process and the admin panel readable side by side.
#[derive(Debug)]
pub struct SqliteIntakeStore {
    db_path: PathBuf,
}

impl SqliteIntakeStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { db_path };
        let connection = store.open_connection()?;
        initialize_schema(&connection)?;
        Ok(store)
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(connection)
    }
}

fn initialize_schema(connection: &Connection) -> StoreResult<()> {
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS applicants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            telegram_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            city TEXT NOT NULL,
            username TEXT NULL,
            phone TEXT NULL,
            status TEXT NOT NULL DEFAULT 'New',
            accepted_city TEXT NULL,
            accepted_date TEXT NULL,
            created_at_unix INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS topic_mappings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            telegram_id INTEGER NOT NULL UNIQUE,
            thread_id INTEGER NOT NULL UNIQUE,
            created_at_unix INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS message_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            staff_message_id INTEGER NOT NULL UNIQUE,
            applicant_message_id INTEGER NOT NULL UNIQUE,
            telegram_id INTEGER NOT NULL,
            thread_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            created_at_unix INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_message_log_applicant
            ON message_log (telegram_id, created_at_unix);

        CREATE TABLE IF NOT EXISTS message_reactions (
            message_id INTEGER NOT NULL,
            reactor_id INTEGER NOT NULL,
            reaction TEXT NOT NULL,
            side TEXT NOT NULL,
            PRIMARY KEY (message_id, reactor_id)
        );

        CREATE TABLE IF NOT EXISTS admin_tokens (
            token TEXT PRIMARY KEY,
            issued_to INTEGER NOT NULL,
            created_at_unix INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pending_actions (
            operator_id INTEGER PRIMARY KEY,
            applicant_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            created_at_unix INTEGER NOT NULL,
            expires_at_unix INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bot_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn status_from_db(raw: &str) -> StoreResult<ApplicantStatus> {
    ApplicantStatus::parse(raw).ok_or(StoreError::InvalidPersistedValue {
        field: "applicants.status",
        value: raw.to_string(),
    })
}

fn kind_from_db(raw: &str) -> StoreResult<MessageKind> {
    MessageKind::parse(raw).ok_or(StoreError::InvalidPersistedValue {
        field: "message_log.kind",
        value: raw.to_string(),
    })
}

fn pending_kind_from_db(raw: &str) -> StoreResult<PendingKind> {
    PendingKind::parse(raw).ok_or(StoreError::InvalidPersistedValue {
        field: "pending_actions.kind",
        value: raw.to_string(),
    })
}

fn date_from_db(raw: Option<String>) -> StoreResult<Option<NaiveDate>> {
    match raw {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| StoreError::InvalidPersistedValue {
                field: "applicants.accepted_date",
                value,
            }),
    }
}

struct ApplicantRow {
    telegram_id: ApplicantId,
    name: String,
    age: i64,
    city: String,
    username: Option<String>,
    phone: Option<String>,
    status: String,
    accepted_city: Option<String>,
    accepted_date: Option<String>,
}

const APPLICANT_COLUMNS: &str =
    "telegram_id, name, age, city, username, phone, status, accepted_city, accepted_date";

fn read_applicant_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApplicantRow> {
    Ok(ApplicantRow {
        telegram_id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        city: row.get(3)?,
        username: row.get(4)?,
        phone: row.get(5)?,
        status: row.get(6)?,
        accepted_city: row.get(7)?,
        accepted_date: row.get(8)?,
    })
}

fn applicant_from_row(row: ApplicantRow) -> StoreResult<Applicant> {
    Ok(Applicant {
        telegram_id: row.telegram_id,
        name: row.name,
        age: row.age,
        city: row.city,
        username: row.username,
        phone: row.phone,
        status: status_from_db(&row.status)?,
        accepted_city: row.accepted_city,
        accepted_date: date_from_db(row.accepted_date)?,
    })
}

fn read_mapping_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadMapping> {
    Ok(ThreadMapping {
        telegram_id: row.get(0)?,
        thread_id: row.get(1)?,
        created_at_unix: row.get::<_, i64>(2)? as u64,
    })
}

fn read_log_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(MessageLogEntry, String)> {
    let kind: String = row.get(4)?;
    Ok((
        MessageLogEntry {
            staff_message_id: row.get(0)?,
            applicant_message_id: row.get(1)?,
            telegram_id: row.get(2)?,
            thread_id: row.get(3)?,
            kind: MessageKind::Other,
            created_at_unix: row.get::<_, i64>(5)? as u64,
        },
        kind,
    ))
}

#[async_trait]
impl IntakeStore for SqliteIntakeStore {
    async fn create_applicant(&self, profile: NewApplicant) -> StoreResult<()> {
        let connection = self.open_connection()?;
        let created_at = vidbir_core::current_unix_timestamp() as i64;
        let result = connection.execute(
            r#"
            INSERT INTO applicants (telegram_id, name, age, city, username, phone, status, created_at_unix)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'New', ?7)
            "#,
            params![
                profile.telegram_id,
                profile.name,
                profile.age,
                profile.city,
                profile.username,
                profile.phone,
                created_at,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(error) if is_constraint_violation(&error) => {
                Err(StoreError::ApplicantExists(profile.telegram_id))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn applicant_exists(&self, applicant_id: ApplicantId) -> StoreResult<bool> {
        let connection = self.open_connection()?;
        let found = connection
            .query_row(
                "SELECT 1 FROM applicants WHERE telegram_id = ?1",
                params![applicant_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn get_applicant(&self, applicant_id: ApplicantId) -> StoreResult<Option<Applicant>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!("SELECT {APPLICANT_COLUMNS} FROM applicants WHERE telegram_id = ?1"),
                params![applicant_id],
                read_applicant_row,
            )
            .optional()?;
        row.map(applicant_from_row).transpose()
    }

    async fn list_applicants(
        &self,
        status: Option<ApplicantStatus>,
    ) -> StoreResult<Vec<Applicant>> {
        let connection = self.open_connection()?;
        let rows = match status {
            Some(status) => {
                let mut statement = connection.prepare(&format!(
                    "SELECT {APPLICANT_COLUMNS} FROM applicants WHERE status = ?1 ORDER BY id DESC"
                ))?;
                let collected = statement
                    .query_map(params![status.as_str()], read_applicant_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                collected
            }
            None => {
                let mut statement = connection.prepare(&format!(
                    "SELECT {APPLICANT_COLUMNS} FROM applicants ORDER BY id DESC"
                ))?;
                let collected = statement
                    .query_map([], read_applicant_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                collected
            }
        };
        rows.into_iter().map(applicant_from_row).collect()
    }

    async fn update_status(
        &self,
        applicant_id: ApplicantId,
        status: ApplicantStatus,
    ) -> StoreResult<()> {
        let connection = self.open_connection()?;
        let changed = connection.execute(
            "UPDATE applicants SET status = ?1 WHERE telegram_id = ?2",
            params![status.as_str(), applicant_id],
        )?;
        if changed == 0 {
            return Err(StoreError::ApplicantNotFound(applicant_id));
        }
        Ok(())
    }

    async fn mark_in_progress(&self, applicant_id: ApplicantId) -> StoreResult<bool> {
        let connection = self.open_connection()?;
        let changed = connection.execute(
            "UPDATE applicants SET status = ?1 WHERE telegram_id = ?2 AND status = ?3",
            params![
                ApplicantStatus::InProgress.as_str(),
                applicant_id,
                ApplicantStatus::New.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    async fn commit_acceptance(
        &self,
        applicant_id: ApplicantId,
        details: &AcceptanceDetails,
    ) -> StoreResult<()> {
        let connection = self.open_connection()?;
        let changed = connection.execute(
            r#"
            UPDATE applicants
            SET status = ?1, accepted_city = ?2, accepted_date = ?3
            WHERE telegram_id = ?4
            "#,
            params![
                ApplicantStatus::Accepted.as_str(),
                details.city,
                details.date.format("%Y-%m-%d").to_string(),
                applicant_id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::ApplicantNotFound(applicant_id));
        }
        Ok(())
    }

    async fn delete_applicant(&self, applicant_id: ApplicantId) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "DELETE FROM applicants WHERE telegram_id = ?1",
            params![applicant_id],
        )?;
        Ok(())
    }

    async fn insert_mapping(
        &self,
        applicant_id: ApplicantId,
        thread_id: ThreadId,
        created_at_unix: u64,
    ) -> StoreResult<()> {
        let connection = self.open_connection()?;
        let result = connection.execute(
            "INSERT INTO topic_mappings (telegram_id, thread_id, created_at_unix) VALUES (?1, ?2, ?3)",
            params![applicant_id, thread_id, created_at_unix as i64],
        );
        match result {
            Ok(_) => Ok(()),
            Err(error) if is_constraint_violation(&error) => {
                Err(StoreError::MappingExists(applicant_id))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn mapping_by_applicant(
        &self,
        applicant_id: ApplicantId,
    ) -> StoreResult<Option<ThreadMapping>> {
        let connection = self.open_connection()?;
        Ok(connection
            .query_row(
                "SELECT telegram_id, thread_id, created_at_unix FROM topic_mappings WHERE telegram_id = ?1",
                params![applicant_id],
                read_mapping_row,
            )
            .optional()?)
    }

    async fn mapping_by_thread(&self, thread_id: ThreadId) -> StoreResult<Option<ThreadMapping>> {
        let connection = self.open_connection()?;
        Ok(connection
            .query_row(
                "SELECT telegram_id, thread_id, created_at_unix FROM topic_mappings WHERE thread_id = ?1",
                params![thread_id],
                read_mapping_row,
            )
            .optional()?)
    }

    async fn delete_mapping(&self, applicant_id: ApplicantId) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "DELETE FROM topic_mappings WHERE telegram_id = ?1",
            params![applicant_id],
        )?;
        Ok(())
    }

    async fn insert_log_entry(&self, entry: NewLogEntry, created_at_unix: u64) -> StoreResult<()> {
        let connection = self.open_connection()?;
        let result = connection.execute(
            r#"
            INSERT INTO message_log (staff_message_id, applicant_message_id, telegram_id, thread_id, kind, created_at_unix)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.staff_message_id,
                entry.applicant_message_id,
                entry.telegram_id,
                entry.thread_id,
                entry.kind.as_str(),
                created_at_unix as i64,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(error) if is_constraint_violation(&error) => {
                Err(StoreError::LogPairExists(entry.staff_message_id))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn find_pair(&self, message_id: MessageId) -> StoreResult<Option<PairLookup>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                r#"
                SELECT staff_message_id, applicant_message_id, telegram_id, thread_id, kind, created_at_unix
                FROM message_log
                WHERE staff_message_id = ?1 OR applicant_message_id = ?1
                "#,
                params![message_id],
                read_log_row,
            )
            .optional()?;
        let Some((mut entry, raw_kind)) = row else {
            return Ok(None);
        };
        entry.kind = kind_from_db(&raw_kind)?;
        if entry.staff_message_id == message_id {
            Ok(Some(PairLookup::Staff(entry)))
        } else {
            Ok(Some(PairLookup::Applicant(entry)))
        }
    }

    async fn delete_log_entry(&self, staff_message_id: MessageId) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "DELETE FROM message_log WHERE staff_message_id = ?1",
            params![staff_message_id],
        )?;
        Ok(())
    }

    async fn upsert_reaction(&self, record: ReactionRecord) -> StoreResult<bool> {
        let connection = self.open_connection()?;
        let existing = connection
            .query_row(
                "SELECT 1 FROM message_reactions WHERE message_id = ?1 AND reactor_id = ?2",
                params![record.message_id, record.reactor_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        connection.execute(
            r#"
            INSERT INTO message_reactions (message_id, reactor_id, reaction, side)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (message_id, reactor_id) DO UPDATE SET reaction = excluded.reaction
            "#,
            params![
                record.message_id,
                record.reactor_id,
                record.reaction,
                record.side.as_str(),
            ],
        )?;
        Ok(existing.is_none())
    }

    async fn delete_reaction(&self, message_id: MessageId, reactor_id: i64) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "DELETE FROM message_reactions WHERE message_id = ?1 AND reactor_id = ?2",
            params![message_id, reactor_id],
        )?;
        Ok(())
    }

    async fn insert_admin_token(
        &self,
        token: &str,
        issued_to: OperatorId,
        created_at_unix: u64,
    ) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "INSERT INTO admin_tokens (token, issued_to, created_at_unix) VALUES (?1, ?2, ?3)",
            params![token, issued_to, created_at_unix as i64],
        )?;
        Ok(())
    }

    async fn resolve_admin_token(
        &self,
        token: &str,
        now_unix: u64,
        ttl_seconds: u64,
    ) -> StoreResult<Option<OperatorId>> {
        let connection = self.open_connection()?;
        let cutoff = now_unix.saturating_sub(ttl_seconds) as i64;
        connection.execute(
            "DELETE FROM admin_tokens WHERE created_at_unix <= ?1",
            params![cutoff],
        )?;
        Ok(connection
            .query_row(
                "SELECT issued_to FROM admin_tokens WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn upsert_pending(&self, action: PendingAction) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            r#"
            INSERT INTO pending_actions (operator_id, applicant_id, kind, created_at_unix, expires_at_unix)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (operator_id) DO UPDATE SET
                applicant_id = excluded.applicant_id,
                kind = excluded.kind,
                created_at_unix = excluded.created_at_unix,
                expires_at_unix = excluded.expires_at_unix
            "#,
            params![
                action.operator_id,
                action.applicant_id,
                action.kind.as_str(),
                action.created_at_unix as i64,
                action.expires_at_unix as i64,
            ],
        )?;
        Ok(())
    }

    async fn get_pending(&self, operator_id: OperatorId) -> StoreResult<Option<PendingAction>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                r#"
                SELECT operator_id, applicant_id, kind, created_at_unix, expires_at_unix
                FROM pending_actions
                WHERE operator_id = ?1
                "#,
                params![operator_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((operator_id, applicant_id, raw_kind, created_at, expires_at)) = row else {
            return Ok(None);
        };
        Ok(Some(PendingAction {
            operator_id,
            applicant_id,
            kind: pending_kind_from_db(&raw_kind)?,
            created_at_unix: created_at as u64,
            expires_at_unix: expires_at as u64,
        }))
    }

    async fn delete_pending(&self, operator_id: OperatorId) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "DELETE FROM pending_actions WHERE operator_id = ?1",
            params![operator_id],
        )?;
        Ok(())
    }

    async fn delete_pending_for_applicant(&self, applicant_id: ApplicantId) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "DELETE FROM pending_actions WHERE applicant_id = ?1",
            params![applicant_id],
        )?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        let connection = self.open_connection()?;
        Ok(connection
            .query_row(
                "SELECT value FROM bot_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            r#"
            INSERT INTO bot_settings (key, value) VALUES (?1, ?2)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use vidbir_core::ReactionSide;

    fn profile(id: ApplicantId) -> NewApplicant {
        NewApplicant {
            telegram_id: id,
            name: "Олена".to_string(),
            age: 20,
            city: "Львів".to_string(),
            username: Some("olena_l".to_string()),
            phone: None,
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> SqliteIntakeStore {
        SqliteIntakeStore::new(dir.path().join("vidbir.db")).expect("open store")
    }

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("vidbir.db");
        SqliteIntakeStore::new(&path).expect("first open");
        SqliteIntakeStore::new(&path).expect("second open");
    }

    #[tokio::test]
    async fn applicant_round_trip_preserves_profile() {
        let dir = tempdir().expect("tempdir");
        let store = open_store(&dir);
        store.create_applicant(profile(7)).await.expect("create");

        let applicant = store
            .get_applicant(7)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(applicant.name, "Олена");
        assert_eq!(applicant.status, ApplicantStatus::New);
        assert_eq!(applicant.accepted_city, None);

        assert!(matches!(
            store.create_applicant(profile(7)).await,
            Err(StoreError::ApplicantExists(7))
        ));
    }

    #[tokio::test]
    async fn acceptance_commit_writes_status_and_metadata_together() {
        let dir = tempdir().expect("tempdir");
        let store = open_store(&dir);
        store.create_applicant(profile(7)).await.expect("create");

        let details = AcceptanceDetails::parse("Львів:2025-09-01").expect("parse");
        store.commit_acceptance(7, &details).await.expect("commit");

        let applicant = store
            .get_applicant(7)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(applicant.status, ApplicantStatus::Accepted);
        assert_eq!(applicant.accepted_city.as_deref(), Some("Львів"));
        assert_eq!(
            applicant.accepted_date.map(|date| date.to_string()),
            Some("2025-09-01".to_string())
        );
    }

    #[tokio::test]
    async fn mark_in_progress_only_moves_new_rows() {
        let dir = tempdir().expect("tempdir");
        let store = open_store(&dir);
        store.create_applicant(profile(7)).await.expect("create");

        assert!(store.mark_in_progress(7).await.expect("first"));
        assert!(!store.mark_in_progress(7).await.expect("second"));
        let applicant = store
            .get_applicant(7)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(applicant.status, ApplicantStatus::InProgress);
    }

    #[tokio::test]
    async fn duplicate_mapping_insert_fails_cleanly() {
        let dir = tempdir().expect("tempdir");
        let store = open_store(&dir);
        store.insert_mapping(7, 100, 1).await.expect("insert");

        assert!(matches!(
            store.insert_mapping(7, 200, 2).await,
            Err(StoreError::MappingExists(7))
        ));
        assert!(matches!(
            store.insert_mapping(8, 100, 3).await,
            Err(StoreError::MappingExists(8))
        ));

        // The original row survives the failed inserts.
        let mapping = store
            .mapping_by_applicant(7)
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(mapping.thread_id, 100);
        assert_eq!(
            store
                .mapping_by_thread(100)
                .await
                .expect("lookup")
                .map(|mapping| mapping.telegram_id),
            Some(7)
        );
    }

    #[tokio::test]
    async fn pair_lookup_is_bidirectional_and_unique() {
        let dir = tempdir().expect("tempdir");
        let store = open_store(&dir);
        store
            .insert_log_entry(
                NewLogEntry {
                    staff_message_id: 10,
                    applicant_message_id: 20,
                    telegram_id: 7,
                    thread_id: 100,
                    kind: MessageKind::Photo,
                },
                1,
            )
            .await
            .expect("insert");

        match store.find_pair(10).await.expect("staff side") {
            Some(PairLookup::Staff(entry)) => assert_eq!(entry.kind, MessageKind::Photo),
            other => panic!("expected staff-side match, got {other:?}"),
        }
        match store.find_pair(20).await.expect("applicant side") {
            Some(PairLookup::Applicant(entry)) => assert_eq!(entry.applicant_message_id, 20),
            other => panic!("expected applicant-side match, got {other:?}"),
        }

        assert!(matches!(
            store
                .insert_log_entry(
                    NewLogEntry {
                        staff_message_id: 11,
                        applicant_message_id: 20,
                        telegram_id: 7,
                        thread_id: 100,
                        kind: MessageKind::Text,
                    },
                    2,
                )
                .await,
            Err(StoreError::LogPairExists(11))
        ));

        store.delete_log_entry(10).await.expect("delete");
        assert!(store.find_pair(10).await.expect("gone").is_none());
    }

    #[tokio::test]
    async fn reaction_upsert_updates_in_place() {
        let dir = tempdir().expect("tempdir");
        let store = open_store(&dir);
        let mut record = ReactionRecord {
            message_id: 10,
            reactor_id: 5,
            reaction: "👍".to_string(),
            side: ReactionSide::Applicant,
        };
        assert!(store.upsert_reaction(record.clone()).await.expect("insert"));
        record.reaction = "❤".to_string();
        assert!(!store.upsert_reaction(record).await.expect("update"));
        store.delete_reaction(10, 5).await.expect("delete");
    }

    #[tokio::test]
    async fn tokens_expire_after_ttl() {
        let dir = tempdir().expect("tempdir");
        let store = open_store(&dir);
        store
            .insert_admin_token("vb_abc", 9, 1_000)
            .await
            .expect("insert");

        assert_eq!(
            store
                .resolve_admin_token("vb_abc", 1_100, 600)
                .await
                .expect("fresh"),
            Some(9)
        );
        assert_eq!(
            store
                .resolve_admin_token("vb_abc", 1_700, 600)
                .await
                .expect("expired"),
            None
        );
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let dir = tempdir().expect("tempdir");
        let store = open_store(&dir);
        assert_eq!(store.get_setting("updates_offset").await.expect("get"), None);
        store
            .set_setting("updates_offset", "41")
            .await
            .expect("set");
        store
            .set_setting("updates_offset", "42")
            .await
            .expect("overwrite");
        assert_eq!(
            store.get_setting("updates_offset").await.expect("get"),
            Some("42".to_string())
        );
    }
}
