//! Inline-button actions on applicant summary cards, plus panel token
//! issuance.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

use vidbir_core::{
    current_unix_timestamp, current_unix_timestamp_ms, ApplicantId, ApplicantStatus, OperatorId,
};
use vidbir_telegram::CallbackQuery;

use super::BridgeRuntime;

/// A parsed summary-card button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum StaffAction {
    StartChat(ApplicantId),
    DeleteUser(ApplicantId),
    SetStatus(ApplicantId, ApplicantStatus),
}

/// Parses callback data such as `start_chat:7` or `set_status:7:Accepted`.
pub(super) fn parse_staff_action(data: &str) -> Option<StaffAction> {
    let mut parts = data.split(':');
    let action = parts.next()?;
    let applicant_id = parts.next()?.parse::<ApplicantId>().ok()?;
    match action {
        "start_chat" => Some(StaffAction::StartChat(applicant_id)),
        "delete_user" => Some(StaffAction::DeleteUser(applicant_id)),
        "set_status" => {
            let status = ApplicantStatus::parse(parts.next()?)?;
            Some(StaffAction::SetStatus(applicant_id, status))
        }
        _ => None,
    }
}

/// Inline keyboard attached to every new summary card.
pub(super) fn summary_keyboard(applicant_id: ApplicantId) -> Value {
    json!({
        "inline_keyboard": [
            [
                { "text": "💬 Почати чат", "callback_data": format!("start_chat:{applicant_id}") },
                { "text": "🗑️ Видалити", "callback_data": format!("delete_user:{applicant_id}") }
            ],
            [
                { "text": "✅ Прийняти", "callback_data": format!("set_status:{applicant_id}:Accepted") },
                { "text": "❌ Відхилити", "callback_data": format!("set_status:{applicant_id}:Declined") }
            ]
        ]
    })
}

/// Deep link into a topic of a private supergroup.
pub(super) fn topic_link(group_id: i64, thread_id: i64) -> String {
    let suffix = group_id
        .to_string()
        .trim_start_matches("-100")
        .to_string();
    format!("https://t.me/c/{suffix}/{thread_id}")
}

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Derives a fresh panel token from the issue time, a process-unique
/// counter, and the operator identity.
pub(super) fn generate_admin_token(operator_id: OperatorId) -> String {
    let counter = TOKEN_COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut hasher = Sha256::new();
    hasher.update(operator_id.to_le_bytes());
    hasher.update(current_unix_timestamp_ms().to_le_bytes());
    hasher.update(counter.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let digest = hasher.finalize();
    let hex = digest
        .iter()
        .take(16)
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    format!("vb_{hex}")
}

pub(super) async fn handle_callback(
    runtime: &BridgeRuntime,
    query: CallbackQuery,
) -> Result<()> {
    let Some(action) = query.data.as_deref().and_then(parse_staff_action) else {
        runtime.client.answer_callback_query(&query.id, None).await?;
        return Ok(());
    };
    let operator_id = query.from.id;
    let card = query.message.as_ref();

    match action {
        StaffAction::StartChat(applicant_id) => {
            if !runtime.store.applicant_exists(applicant_id).await? {
                runtime
                    .client
                    .answer_callback_query(&query.id, Some("❌ Користувача не знайдено."))
                    .await?;
                return Ok(());
            }
            let thread_id = runtime.coordinator.directory().open(applicant_id).await?;
            let applicant = runtime.store.get_applicant(applicant_id).await?;
            let title = applicant
                .map(|applicant| applicant.display_title())
                .unwrap_or_else(|| applicant_id.to_string());
            runtime
                .client
                .send_message(
                    runtime.config.group_id,
                    &format!("🔗 Почато чат з {title} (ID: {applicant_id})"),
                    Some(thread_id),
                    Some(json!({
                        "inline_keyboard": [[{
                            "text": "➡️ Перейти до чату",
                            "url": topic_link(runtime.config.group_id, thread_id),
                        }]]
                    })),
                )
                .await?;
            runtime
                .client
                .answer_callback_query(&query.id, Some("💬 Чат відкрито"))
                .await?;
        }
        StaffAction::SetStatus(applicant_id, ApplicantStatus::Accepted) => {
            if !runtime.store.applicant_exists(applicant_id).await? {
                runtime
                    .client
                    .answer_callback_query(&query.id, Some("❌ Користувача не знайдено."))
                    .await?;
                return Ok(());
            }
            runtime
                .coordinator
                .begin_acceptance(
                    operator_id,
                    applicant_id,
                    current_unix_timestamp(),
                    runtime.config.acceptance_ttl_seconds,
                )
                .await?;
            if let Some(card) = card {
                update_card(
                    runtime,
                    card.message_id,
                    "⏳ Очікую дані прийняття (Місто:РРРР-ММ-ДД)",
                )
                .await;
            }
            runtime
                .client
                .send_message(
                    runtime.config.group_id,
                    "✍️ Введи місто та дату одним повідомленням у форматі Місто:РРРР-ММ-ДД",
                    None,
                    None,
                )
                .await?;
            runtime.client.answer_callback_query(&query.id, None).await?;
        }
        StaffAction::SetStatus(applicant_id, status) => {
            runtime.coordinator.set_status(applicant_id, status).await?;
            if let Some(card) = card {
                update_card(
                    runtime,
                    card.message_id,
                    &format!("✅ Статус оновлено: {status}"),
                )
                .await;
            }
            runtime.client.answer_callback_query(&query.id, None).await?;
        }
        StaffAction::DeleteUser(applicant_id) => {
            runtime.coordinator.delete_applicant(applicant_id).await?;
            if let Some(card) = card {
                update_card(runtime, card.message_id, "🗑️ Заявку видалено.").await;
            }
            runtime.client.answer_callback_query(&query.id, None).await?;
        }
    }
    Ok(())
}

/// Replaces a summary card with a resolution note and drops its buttons.
/// Card cosmetics are never worth failing the action over.
async fn update_card(runtime: &BridgeRuntime, message_id: i64, text: &str) {
    if let Err(error) = runtime
        .client
        .edit_message_reply_markup(runtime.config.group_id, message_id, None)
        .await
    {
        warn!(message_id, error = %error, "failed to clear card buttons");
    }
    if let Err(error) = runtime
        .client
        .edit_message_text(runtime.config.group_id, message_id, text)
        .await
    {
        warn!(message_id, error = %error, "failed to update card text");
    }
}
