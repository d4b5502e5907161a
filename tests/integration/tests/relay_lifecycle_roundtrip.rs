//! End-to-end relay lifecycle against the durable SQLite store: open a
//! thread, mirror both directions, accept, and verify teardown.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc, Mutex,
};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::tempdir;

use vidbir_core::{
    ApplicantStatus, MessageKind, NewApplicant, PairLookup, ThreadId,
};
use vidbir_relay::{
    AcceptanceOutcome, Destination, InboundMessage, MessageMirror, RelayGateway,
    StatusCoordinator, ThreadDirectory,
};
use vidbir_storage::{IntakeStore, SqliteIntakeStore};

/// Minimal scripted platform: sequential ids, remembers deleted topics.
#[derive(Default)]
struct FakePlatform {
    next_thread_id: AtomicI64,
    next_message_id: AtomicI64,
    deleted_topics: Mutex<Vec<ThreadId>>,
}

#[async_trait]
impl RelayGateway for FakePlatform {
    async fn create_topic(&self, _title: &str) -> Result<ThreadId> {
        Ok(self.next_thread_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn delete_topic(&self, thread_id: ThreadId) -> Result<()> {
        self.deleted_topics
            .lock()
            .expect("deleted lock")
            .push(thread_id);
        Ok(())
    }

    async fn copy_message(
        &self,
        _to: Destination,
        _thread_id: Option<ThreadId>,
        _from: Destination,
        _message_id: i64,
    ) -> Result<i64> {
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn edit_text(&self, _at: Destination, _message_id: i64, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn edit_caption(
        &self,
        _at: Destination,
        _message_id: i64,
        _caption: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn delete_message(&self, _at: Destination, _message_id: i64) -> Result<()> {
        Ok(())
    }

    async fn set_reaction(
        &self,
        _at: Destination,
        _message_id: i64,
        _reaction: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn full_lifecycle_over_sqlite() {
    let dir = tempdir().expect("tempdir");
    let store: Arc<dyn IntakeStore> =
        Arc::new(SqliteIntakeStore::new(dir.path().join("vidbir.db")).expect("store"));
    let platform = Arc::new(FakePlatform {
        next_thread_id: AtomicI64::new(500),
        next_message_id: AtomicI64::new(9_000),
        ..FakePlatform::default()
    });
    let gateway: Arc<dyn RelayGateway> = platform.clone();

    let directory = ThreadDirectory::new(store.clone(), gateway.clone());
    let mirror = MessageMirror::new(store.clone(), gateway.clone());
    let coordinator = StatusCoordinator::new(store.clone(), directory.clone());

    // Intake created the applicant; status starts at New.
    store
        .create_applicant(NewApplicant {
            telegram_id: 7,
            name: "Олена".to_string(),
            age: 20,
            city: "Львів".to_string(),
            username: Some("olena_l".to_string()),
            phone: Some("+380501112233".to_string()),
        })
        .await
        .expect("create applicant");

    // Staff opens the chat; a second open is a no-op.
    let thread = directory.open(7).await.expect("open");
    assert_eq!(directory.open(7).await.expect("reopen"), thread);

    // Applicant writes before staff; staff replies with a photo.
    let inbound = mirror
        .relay_from_applicant(
            7,
            InboundMessage {
                message_id: 42,
                kind: MessageKind::Text,
            },
        )
        .await
        .expect("relay")
        .expect("mirrored");
    let reply = mirror
        .relay_from_staff(
            thread,
            InboundMessage {
                message_id: 43,
                kind: MessageKind::Photo,
            },
        )
        .await
        .expect("relay")
        .expect("mirrored");

    let applicant = store.get_applicant(7).await.expect("get").expect("row");
    assert_eq!(applicant.status, ApplicantStatus::InProgress);

    // Two-phase acceptance through the coordinator.
    coordinator
        .begin_acceptance(9, 7, 1_000, 900)
        .await
        .expect("begin");
    let outcome = coordinator
        .complete_acceptance(9, "Львів:2025-09-01", 1_010)
        .await
        .expect("complete");
    assert!(matches!(outcome, AcceptanceOutcome::Committed { .. }));

    // Terminal state: row updated, mapping gone, remote topic deleted.
    let applicant = store.get_applicant(7).await.expect("get").expect("row");
    assert_eq!(applicant.status, ApplicantStatus::Accepted);
    assert_eq!(applicant.accepted_city.as_deref(), Some("Львів"));
    assert!(store
        .mapping_by_applicant(7)
        .await
        .expect("mapping")
        .is_none());
    assert_eq!(
        platform.deleted_topics.lock().expect("deleted lock").as_slice(),
        &[thread]
    );

    // The log pairs survive but are unreachable through the thread lookup.
    assert!(matches!(
        store.find_pair(inbound.source_id).await.expect("pair"),
        Some(PairLookup::Applicant(_))
    ));
    assert!(matches!(
        store.find_pair(reply.source_id).await.expect("pair"),
        Some(PairLookup::Staff(_))
    ));
    assert!(store
        .mapping_by_thread(thread)
        .await
        .expect("mapping")
        .is_none());

    // Accepting again is idempotent on the already-closed thread.
    coordinator
        .set_status(7, ApplicantStatus::Accepted)
        .await
        .expect("repeat accept");
}
