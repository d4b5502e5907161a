//! Tests for bridge runtime dispatch, the intake form, and staff actions.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use vidbir_core::{ApplicantStatus, PairLookup};
use vidbir_relay::RelayGateway;
use vidbir_storage::{InMemoryIntakeStore, IntakeStore};
use vidbir_telegram::{TelegramApiClient, TelegramApiConfig, TelegramRelayGateway, Update};

use super::staff_actions::{generate_admin_token, parse_staff_action, topic_link, StaffAction};
use super::{BridgeRuntime, BridgeRuntimeConfig};

const GROUP_ID: i64 = -1001234567890;
const BOT_ID: i64 = 1_000;

struct TestBridge {
    runtime: Arc<BridgeRuntime>,
    store: Arc<InMemoryIntakeStore>,
    _server: MockServer,
}

/// Catch-all happy-path mocks for the Bot API endpoints the runtime touches.
fn mock_api(server: &MockServer) {
    for (method, result) in [
        ("sendMessage", json!({"message_id": 900})),
        ("copyMessage", json!({"message_id": 1001})),
        ("createForumTopic", json!({"message_thread_id": 555})),
        ("deleteForumTopic", json!(true)),
        ("editMessageText", json!(true)),
        ("editMessageCaption", json!(true)),
        ("editMessageReplyMarkup", json!(true)),
        ("deleteMessage", json!(true)),
        ("setMessageReaction", json!(true)),
        ("answerCallbackQuery", json!(true)),
    ] {
        server.mock(|when, then| {
            when.method(POST).path(format!("/bottest-token/{method}"));
            then.status(200).json_body(json!({"ok": true, "result": result}));
        });
    }
}

async fn test_bridge() -> TestBridge {
    let server = MockServer::start();
    mock_api(&server);
    let client = TelegramApiClient::new(TelegramApiConfig {
        api_base: server.base_url(),
        bot_token: "test-token".to_string(),
        request_timeout_ms: 3_000,
        retry_max_attempts: 1,
        retry_base_delay_ms: 1,
    })
    .expect("client");
    let store = Arc::new(InMemoryIntakeStore::new());
    let store_dyn: Arc<dyn IntakeStore> = store.clone();
    let gateway: Arc<dyn RelayGateway> =
        Arc::new(TelegramRelayGateway::new(client.clone(), GROUP_ID));
    let runtime = BridgeRuntime::new(
        BridgeRuntimeConfig {
            group_id: GROUP_ID,
            admin_id: 9,
            public_base_url: Some("https://panel.example".to_string()),
            poll_timeout_seconds: 0,
            poll_retry_delay: Duration::from_millis(1),
            admin_token_ttl_seconds: 600,
            acceptance_ttl_seconds: 900,
        },
        client,
        store_dyn,
        gateway,
        Some(BOT_ID),
    )
    .await
    .expect("runtime");
    TestBridge {
        runtime: Arc::new(runtime),
        store,
        _server: server,
    }
}

fn update(value: serde_json::Value) -> Update {
    serde_json::from_value(value).expect("update")
}

fn private_text(applicant_id: i64, message_id: i64, text: &str) -> Update {
    update(json!({
        "update_id": message_id,
        "message": {
            "message_id": message_id,
            "from": {"id": applicant_id, "is_bot": false, "first_name": "Олена", "username": "olena_l"},
            "chat": {"id": applicant_id, "type": "private"},
            "text": text
        }
    }))
}

fn group_text(operator_id: i64, message_id: i64, thread_id: Option<i64>, text: &str) -> Update {
    let mut message = json!({
        "message_id": message_id,
        "from": {"id": operator_id, "is_bot": false, "first_name": "Admin"},
        "chat": {"id": GROUP_ID, "type": "supergroup"},
        "text": text
    });
    if let Some(thread_id) = thread_id {
        message["message_thread_id"] = json!(thread_id);
    }
    update(json!({"update_id": message_id, "message": message}))
}

async fn run_intake(bridge: &TestBridge, applicant_id: i64) {
    for (offset, text) in [
        (1, "/start"),
        (2, "Олена"),
        (3, "20"),
        (4, "Львів"),
        (5, "+380501112233"),
    ] {
        bridge
            .runtime
            .handle_update(private_text(applicant_id, offset, text))
            .await
            .expect("form step");
    }
}

#[tokio::test]
async fn intake_form_round_trip_creates_applicant() {
    let bridge = test_bridge().await;
    run_intake(&bridge, 7).await;

    let applicant = bridge
        .store
        .get_applicant(7)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(applicant.name, "Олена");
    assert_eq!(applicant.age, 20);
    assert_eq!(applicant.city, "Львів");
    assert_eq!(applicant.phone.as_deref(), Some("+380501112233"));
    assert_eq!(applicant.username.as_deref(), Some("olena_l"));
    assert_eq!(applicant.status, ApplicantStatus::New);
}

#[tokio::test]
async fn underage_applicant_leaves_no_row() {
    let bridge = test_bridge().await;
    for (offset, text) in [(1, "/start"), (2, "Іван"), (3, "15")] {
        bridge
            .runtime
            .handle_update(private_text(8, offset, text))
            .await
            .expect("form step");
    }
    assert!(!bridge.store.applicant_exists(8).await.expect("exists"));
    // The conversation ended; later text is ordinary (dropped) traffic, not
    // an age retry that suddenly completes the form.
    bridge
        .runtime
        .handle_update(private_text(8, 4, "17"))
        .await
        .expect("post-form message");
    assert!(!bridge.store.applicant_exists(8).await.expect("exists"));
}

#[tokio::test]
async fn non_numeric_age_is_retried() {
    let bridge = test_bridge().await;
    for (offset, text) in [
        (1, "/start"),
        (2, "Олена"),
        (3, "двадцять"),
        (4, "20"),
        (5, "Львів"),
        (6, "без номера"),
    ] {
        bridge
            .runtime
            .handle_update(private_text(7, offset, text))
            .await
            .expect("form step");
    }
    let applicant = bridge
        .store
        .get_applicant(7)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(applicant.age, 20);
}

#[tokio::test]
async fn duplicate_start_does_not_reenter_the_form() {
    let bridge = test_bridge().await;
    run_intake(&bridge, 7).await;
    bridge
        .runtime
        .handle_update(private_text(7, 10, "/start"))
        .await
        .expect("restart");
    // Still one applicant, answers unchanged.
    let applicant = bridge
        .store
        .get_applicant(7)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(applicant.name, "Олена");
}

#[tokio::test]
async fn staff_thread_message_relays_and_flips_status() {
    let bridge = test_bridge().await;
    run_intake(&bridge, 7).await;
    bridge.store.insert_mapping(7, 555, 0).await.expect("map");

    bridge
        .runtime
        .handle_update(group_text(9, 50, Some(555), "Доброго дня!"))
        .await
        .expect("relay");

    assert!(matches!(
        bridge.store.find_pair(50).await.expect("pair"),
        Some(PairLookup::Staff(entry)) if entry.applicant_message_id == 1001
    ));
    let applicant = bridge
        .store
        .get_applicant(7)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(applicant.status, ApplicantStatus::InProgress);
}

#[tokio::test]
async fn applicant_message_without_thread_is_dropped_silently() {
    let bridge = test_bridge().await;
    run_intake(&bridge, 7).await;

    bridge
        .runtime
        .handle_update(private_text(7, 42, "є хтось?"))
        .await
        .expect("drop");
    assert!(bridge.store.find_pair(42).await.expect("pair").is_none());
}

#[tokio::test]
async fn accept_button_then_metadata_reply_commits() {
    let bridge = test_bridge().await;
    run_intake(&bridge, 7).await;
    bridge.store.insert_mapping(7, 555, 0).await.expect("map");

    bridge
        .runtime
        .handle_update(update(json!({
            "update_id": 60,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 9, "is_bot": false, "first_name": "Admin"},
                "data": "set_status:7:Accepted",
                "message": {"message_id": 70, "chat": {"id": GROUP_ID, "type": "supergroup"}}
            }
        })))
        .await
        .expect("button");

    // Phase one: pending only, no applicant change.
    assert!(bridge.store.get_pending(9).await.expect("pending").is_some());
    let applicant = bridge
        .store
        .get_applicant(7)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(applicant.status, ApplicantStatus::New);

    // Malformed reply keeps the pending state.
    bridge
        .runtime
        .handle_update(group_text(9, 61, None, "просто текст"))
        .await
        .expect("bad reply");
    assert!(bridge.store.get_pending(9).await.expect("pending").is_some());

    // Valid reply commits and tears the thread down.
    bridge
        .runtime
        .handle_update(group_text(9, 62, None, "Львів:2025-09-01"))
        .await
        .expect("good reply");

    let applicant = bridge
        .store
        .get_applicant(7)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(applicant.status, ApplicantStatus::Accepted);
    assert_eq!(applicant.accepted_city.as_deref(), Some("Львів"));
    assert!(bridge
        .store
        .mapping_by_applicant(7)
        .await
        .expect("mapping")
        .is_none());
    assert!(bridge.store.get_pending(9).await.expect("pending").is_none());
}

#[tokio::test]
async fn decline_button_closes_thread() {
    let bridge = test_bridge().await;
    run_intake(&bridge, 7).await;
    bridge.store.insert_mapping(7, 555, 0).await.expect("map");

    bridge
        .runtime
        .handle_update(update(json!({
            "update_id": 80,
            "callback_query": {
                "id": "cb2",
                "from": {"id": 9, "is_bot": false, "first_name": "Admin"},
                "data": "set_status:7:Declined",
                "message": {"message_id": 81, "chat": {"id": GROUP_ID, "type": "supergroup"}}
            }
        })))
        .await
        .expect("decline");

    let applicant = bridge
        .store
        .get_applicant(7)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(applicant.status, ApplicantStatus::Declined);
    assert!(bridge
        .store
        .mapping_by_applicant(7)
        .await
        .expect("mapping")
        .is_none());
}

#[tokio::test]
async fn delete_command_retires_the_replied_pair() {
    let bridge = test_bridge().await;
    run_intake(&bridge, 7).await;
    bridge.store.insert_mapping(7, 555, 0).await.expect("map");
    bridge
        .store
        .insert_log_entry(
            vidbir_core::NewLogEntry {
                staff_message_id: 90,
                applicant_message_id: 91,
                telegram_id: 7,
                thread_id: 555,
                kind: vidbir_core::MessageKind::Text,
            },
            0,
        )
        .await
        .expect("log");

    bridge
        .runtime
        .handle_update(update(json!({
            "update_id": 95,
            "message": {
                "message_id": 95,
                "message_thread_id": 555,
                "from": {"id": 9, "is_bot": false, "first_name": "Admin"},
                "chat": {"id": GROUP_ID, "type": "supergroup"},
                "text": "/delete",
                "reply_to_message": {
                    "message_id": 90,
                    "chat": {"id": GROUP_ID, "type": "supergroup"}
                }
            }
        })))
        .await
        .expect("delete command");

    assert!(bridge.store.find_pair(90).await.expect("pair").is_none());
}

#[tokio::test]
async fn panel_command_issues_a_token_for_the_admin() {
    let server = MockServer::start();
    let panel_reply = server.mock(|when, then| {
        when.method(POST)
            .path("/bottest-token/sendMessage")
            .body_includes("token=vb_");
        then.status(200)
            .json_body(json!({"ok": true, "result": {"message_id": 900}}));
    });
    let client = TelegramApiClient::new(TelegramApiConfig {
        api_base: server.base_url(),
        bot_token: "test-token".to_string(),
        request_timeout_ms: 3_000,
        retry_max_attempts: 1,
        retry_base_delay_ms: 1,
    })
    .expect("client");
    let store = Arc::new(InMemoryIntakeStore::new());
    let store_dyn: Arc<dyn IntakeStore> = store.clone();
    let gateway: Arc<dyn RelayGateway> =
        Arc::new(TelegramRelayGateway::new(client.clone(), GROUP_ID));
    let runtime = Arc::new(
        BridgeRuntime::new(
            BridgeRuntimeConfig {
                group_id: GROUP_ID,
                admin_id: 9,
                public_base_url: Some("https://panel.example".to_string()),
                poll_timeout_seconds: 0,
                poll_retry_delay: Duration::from_millis(1),
                admin_token_ttl_seconds: 600,
                acceptance_ttl_seconds: 900,
            },
            client,
            store_dyn,
            gateway,
            Some(BOT_ID),
        )
        .await
        .expect("runtime"),
    );

    runtime
        .handle_update(group_text(9, 99, None, "/panel"))
        .await
        .expect("panel");
    panel_reply.assert();
}

#[tokio::test]
async fn edited_applicant_message_reaches_the_propagator() {
    let bridge = test_bridge().await;
    run_intake(&bridge, 7).await;
    bridge.store.insert_mapping(7, 555, 0).await.expect("map");
    bridge
        .store
        .insert_log_entry(
            vidbir_core::NewLogEntry {
                staff_message_id: 110,
                applicant_message_id: 42,
                telegram_id: 7,
                thread_id: 555,
                kind: vidbir_core::MessageKind::Text,
            },
            0,
        )
        .await
        .expect("log");

    bridge
        .runtime
        .handle_update(update(json!({
            "update_id": 120,
            "edited_message": {
                "message_id": 42,
                "from": {"id": 7, "is_bot": false, "first_name": "Олена"},
                "chat": {"id": 7, "type": "private"},
                "text": "виправлено"
            }
        })))
        .await
        .expect("edit");
    // The pair is intact after the propagated edit.
    assert!(bridge.store.find_pair(42).await.expect("pair").is_some());
}

#[tokio::test]
async fn reaction_updates_are_recorded() {
    let bridge = test_bridge().await;
    run_intake(&bridge, 7).await;
    bridge
        .store
        .insert_log_entry(
            vidbir_core::NewLogEntry {
                staff_message_id: 130,
                applicant_message_id: 42,
                telegram_id: 7,
                thread_id: 555,
                kind: vidbir_core::MessageKind::Text,
            },
            0,
        )
        .await
        .expect("log");

    bridge
        .runtime
        .handle_update(update(json!({
            "update_id": 140,
            "message_reaction": {
                "chat": {"id": 7, "type": "private"},
                "message_id": 42,
                "user": {"id": 7, "is_bot": false, "first_name": "Олена"},
                "old_reaction": [],
                "new_reaction": [{"type": "emoji", "emoji": "👍"}]
            }
        })))
        .await
        .expect("reaction");
}

#[test]
fn staff_action_parsing_covers_every_button() {
    assert_eq!(
        parse_staff_action("start_chat:7"),
        Some(StaffAction::StartChat(7))
    );
    assert_eq!(
        parse_staff_action("delete_user:7"),
        Some(StaffAction::DeleteUser(7))
    );
    assert_eq!(
        parse_staff_action("set_status:7:Accepted"),
        Some(StaffAction::SetStatus(7, ApplicantStatus::Accepted))
    );
    assert_eq!(
        parse_staff_action("set_status:7:Declined"),
        Some(StaffAction::SetStatus(7, ApplicantStatus::Declined))
    );
    assert_eq!(parse_staff_action("set_status:7:Nonsense"), None);
    assert_eq!(parse_staff_action("set_status:abc:Accepted"), None);
    assert_eq!(parse_staff_action("unknown:7"), None);
}

#[test]
fn topic_links_strip_the_supergroup_prefix() {
    assert_eq!(
        topic_link(-1001234567890, 555),
        "https://t.me/c/1234567890/555"
    );
}

#[test]
fn admin_tokens_are_unique_and_prefixed() {
    let first = generate_admin_token(9);
    let second = generate_admin_token(9);
    assert!(first.starts_with("vb_"));
    assert_ne!(first, second);
    assert_eq!(first.len(), "vb_".len() + 32);
}
