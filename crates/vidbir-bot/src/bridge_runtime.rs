//! Bridge runtime that polls Telegram updates and orchestrates intake,
//! staff actions, and relaying.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vidbir_core::{current_unix_timestamp, ApplicantId, ChatId, OperatorId};
use vidbir_relay::{
    AcceptanceOutcome, EditContent, InboundMessage, MessageMirror, Propagator, RelayGateway,
    StatusCoordinator, ThreadDirectory,
};
use vidbir_storage::{IntakeStore, StoreError};
use vidbir_telegram::{
    Message, MessageReactionUpdated, TelegramApiClient, Update,
};

mod form_flow;
mod staff_actions;
#[cfg(test)]
mod tests;

use form_flow::{FormState, StepOutcome, ALREADY_APPLIED_REPLY, CANCELLED_REPLY, START_REPLY};

/// Storage key for the last confirmed long-poll offset.
const UPDATES_OFFSET_KEY: &str = "updates_offset";

/// Runtime configuration for the bridge transport loop.
#[derive(Debug, Clone)]
pub struct BridgeRuntimeConfig {
    pub group_id: ChatId,
    pub admin_id: OperatorId,
    pub public_base_url: Option<String>,
    pub poll_timeout_seconds: u64,
    pub poll_retry_delay: Duration,
    pub admin_token_ttl_seconds: u64,
    pub acceptance_ttl_seconds: u64,
}

/// Runs the bridge loop until ctrl-c.
pub async fn run_bridge(
    config: BridgeRuntimeConfig,
    client: TelegramApiClient,
    store: Arc<dyn IntakeStore>,
    gateway: Arc<dyn RelayGateway>,
) -> Result<()> {
    let runtime = BridgeRuntime::new(config, client, store, gateway, None).await?;
    Arc::new(runtime).run().await
}

/// Shared, immutable handler state. Every update is handled by an
/// independently spawned task over this struct; the only mutable piece is
/// the per-chat intake form map, which never outlives a conversation.
pub struct BridgeRuntime {
    config: BridgeRuntimeConfig,
    client: TelegramApiClient,
    store: Arc<dyn IntakeStore>,
    mirror: MessageMirror,
    propagator: Propagator,
    coordinator: StatusCoordinator,
    forms: Mutex<HashMap<ChatId, FormState>>,
    bot_user_id: i64,
}

impl BridgeRuntime {
    pub async fn new(
        config: BridgeRuntimeConfig,
        client: TelegramApiClient,
        store: Arc<dyn IntakeStore>,
        gateway: Arc<dyn RelayGateway>,
        bot_user_id: Option<i64>,
    ) -> Result<Self> {
        let bot_user_id = match bot_user_id {
            Some(id) => id,
            None => {
                client
                    .get_me()
                    .await
                    .context("failed to resolve bot identity")?
                    .id
            }
        };
        let directory = ThreadDirectory::new(store.clone(), gateway.clone());
        Ok(Self {
            config,
            client,
            mirror: MessageMirror::new(store.clone(), gateway.clone()),
            propagator: Propagator::new(store.clone(), gateway),
            coordinator: StatusCoordinator::new(store.clone(), directory),
            store,
            forms: Mutex::new(HashMap::new()),
            bot_user_id,
        })
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut offset = self.load_offset().await?;
        info!(group_id = self.config.group_id, "bridge connected");
        loop {
            let updates = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("bridge shutdown requested");
                    return Ok(());
                }
                result = self.client.get_updates(offset, self.config.poll_timeout_seconds) => {
                    match result {
                        Ok(updates) => updates,
                        Err(error) => {
                            warn!(error = %error, "getUpdates failed, backing off");
                            tokio::time::sleep(self.config.poll_retry_delay).await;
                            continue;
                        }
                    }
                }
            };

            if updates.is_empty() {
                continue;
            }
            debug!(count = updates.len(), "dispatching updates");
            for update in updates {
                let next_offset = update.update_id.saturating_add(1);
                offset = Some(offset.map_or(next_offset, |current| current.max(next_offset)));
                let runtime = Arc::clone(&self);
                // Handlers are independent; one event's failure never blocks
                // or corrupts another applicant's flow.
                tokio::spawn(async move {
                    let update_id = update.update_id;
                    if let Err(error) = runtime.handle_update(update).await {
                        warn!(update_id, error = %error, "update handler failed");
                    }
                });
            }
            if let Some(offset) = offset {
                self.store
                    .set_setting(UPDATES_OFFSET_KEY, &offset.to_string())
                    .await?;
            }
        }
    }

    async fn load_offset(&self) -> Result<Option<i64>> {
        let Some(raw) = self.store.get_setting(UPDATES_OFFSET_KEY).await? else {
            return Ok(None);
        };
        match raw.parse::<i64>() {
            Ok(offset) => Ok(Some(offset)),
            Err(_) => {
                warn!(raw = %raw, "ignoring unparsable stored offset");
                Ok(None)
            }
        }
    }

    pub async fn handle_update(&self, update: Update) -> Result<()> {
        if let Some(query) = update.callback_query {
            return self.handle_callback(query).await;
        }
        if let Some(reaction) = update.message_reaction {
            return self.handle_reaction(reaction).await;
        }
        if let Some(message) = update.edited_message {
            return self.handle_edited(message).await;
        }
        if let Some(message) = update.message {
            return self.handle_message(message).await;
        }
        Ok(())
    }

    async fn handle_reaction(&self, reaction: MessageReactionUpdated) -> Result<()> {
        let Some(user) = reaction.user.as_ref().filter(|user| !user.is_bot) else {
            return Ok(());
        };
        let new = MessageReactionUpdated::emoji_of(&reaction.new_reaction);
        let old = MessageReactionUpdated::emoji_of(&reaction.old_reaction);
        self.propagator
            .propagate_reaction(reaction.message_id, user.id, new, old)
            .await
    }

    async fn handle_edited(&self, message: Message) -> Result<()> {
        if message.from_bot() {
            return Ok(());
        }
        // Text and captioned media are the supported edit shapes.
        if let Some(text) = message.text.as_deref() {
            return self
                .propagator
                .propagate_edit(message.message_id, EditContent::Text(text))
                .await;
        }
        if let Some(caption) = message.caption.as_deref() {
            return self
                .propagator
                .propagate_edit(message.message_id, EditContent::Caption(caption))
                .await;
        }
        Ok(())
    }

    async fn handle_message(&self, message: Message) -> Result<()> {
        if message.from_bot() || message.sender_id() == Some(self.bot_user_id) {
            return Ok(());
        }
        if message.chat.id == self.config.group_id {
            return self.handle_group_message(message).await;
        }
        if message.chat.chat_type == "private" {
            return self.handle_private_message(message).await;
        }
        Ok(())
    }

    async fn handle_group_message(&self, message: Message) -> Result<()> {
        match message.command().as_deref() {
            Some("/delete") => return self.handle_delete_command(&message).await,
            Some("/panel") => return self.handle_panel_command(&message).await,
            Some(_) => return Ok(()),
            None => {}
        }

        if let Some(thread_id) = message.message_thread_id {
            self.mirror
                .relay_from_staff(
                    thread_id,
                    InboundMessage {
                        message_id: message.message_id,
                        kind: message.kind(),
                    },
                )
                .await?;
            return Ok(());
        }

        // General topic: the only traffic the bridge reads here is an
        // acceptance-metadata reply from an operator mid-flow.
        let Some(operator_id) = message.sender_id() else {
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        match self
            .coordinator
            .complete_acceptance(operator_id, text, current_unix_timestamp())
            .await?
        {
            AcceptanceOutcome::Committed {
                applicant_id,
                details,
            } => {
                self.client
                    .send_message(
                        self.config.group_id,
                        &format!(
                            "✅ Заявку прийнято: {}, {}",
                            details.city, details.date
                        ),
                        None,
                        None,
                    )
                    .await?;
                // Congratulating the applicant is best-effort; the
                // acceptance itself is already committed.
                if let Err(error) = self
                    .client
                    .send_message(
                        applicant_id,
                        &format!(
                            "🎉 Вітаємо! Тебе прийнято. Місто: {}, дата початку: {}.",
                            details.city, details.date
                        ),
                        None,
                        None,
                    )
                    .await
                {
                    warn!(applicant_id, error = %error, "failed to notify accepted applicant");
                }
            }
            AcceptanceOutcome::InvalidInput(error) => {
                self.client
                    .send_message(
                        self.config.group_id,
                        &format!("❌ {error}. Спробуй ще раз: Місто:РРРР-ММ-ДД"),
                        None,
                        None,
                    )
                    .await?;
            }
            AcceptanceOutcome::NoPending => {}
        }
        Ok(())
    }

    /// `/delete` replied to a mirrored message inside a topic removes both
    /// sides of the pair.
    async fn handle_delete_command(&self, message: &Message) -> Result<()> {
        let Some(reply) = message.reply_to_message.as_deref() else {
            self.client
                .send_message(
                    self.config.group_id,
                    "❌ Відповідай командою /delete на повідомлення, яке треба видалити.",
                    message.message_thread_id,
                    None,
                )
                .await?;
            return Ok(());
        };

        self.propagator.propagate_delete(reply.message_id).await?;
        // Drop the topic copy and the command message; both are cosmetic.
        for message_id in [reply.message_id, message.message_id] {
            if let Err(error) = self
                .client
                .delete_message(self.config.group_id, message_id)
                .await
            {
                debug!(message_id, error = %error, "failed to delete group message");
            }
        }
        Ok(())
    }

    async fn handle_panel_command(&self, message: &Message) -> Result<()> {
        let Some(operator_id) = message.sender_id() else {
            return Ok(());
        };
        if !self.operator_may_administer(operator_id).await {
            self.client
                .send_message(
                    self.config.group_id,
                    "❌ Панель доступна лише адміністраторам.",
                    message.message_thread_id,
                    None,
                )
                .await?;
            return Ok(());
        }

        let token = staff_actions::generate_admin_token(operator_id);
        self.store
            .insert_admin_token(&token, operator_id, current_unix_timestamp())
            .await?;
        let reply = match self.config.public_base_url.as_deref() {
            Some(base_url) => format!(
                "🔐 Панель: {}/?token={} (дійсний {} хв)",
                base_url.trim_end_matches('/'),
                token,
                self.config.admin_token_ttl_seconds / 60
            ),
            None => format!("🔐 Токен панелі: {token}"),
        };
        self.client
            .send_message(self.config.group_id, &reply, message.message_thread_id, None)
            .await?;
        Ok(())
    }

    async fn operator_may_administer(&self, operator_id: OperatorId) -> bool {
        if operator_id == self.config.admin_id {
            return true;
        }
        match self
            .client
            .get_chat_member(self.config.group_id, operator_id)
            .await
        {
            Ok(status) => matches!(status.as_str(), "creator" | "administrator"),
            Err(error) => {
                warn!(operator_id, error = %error, "membership check failed");
                false
            }
        }
    }

    async fn handle_private_message(&self, message: Message) -> Result<()> {
        let Some(applicant_id) = message.sender_id() else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        match message.command().as_deref() {
            Some("/start") => return self.handle_start(applicant_id, chat_id).await,
            Some("/cancel") => {
                self.forms.lock().await.remove(&chat_id);
                self.client
                    .send_message(chat_id, CANCELLED_REPLY, None, None)
                    .await?;
                return Ok(());
            }
            Some(_) => return Ok(()),
            None => {}
        }

        let form_state = self.forms.lock().await.get(&chat_id).cloned();
        if let Some(state) = form_state {
            return self.advance_form(state, message).await;
        }

        // Not in the form: ordinary applicant traffic goes over the bridge.
        self.mirror
            .relay_from_applicant(
                applicant_id,
                InboundMessage {
                    message_id: message.message_id,
                    kind: message.kind(),
                },
            )
            .await?;
        Ok(())
    }

    async fn handle_start(&self, applicant_id: ApplicantId, chat_id: ChatId) -> Result<()> {
        if self.store.applicant_exists(applicant_id).await? {
            self.client
                .send_message(chat_id, ALREADY_APPLIED_REPLY, None, None)
                .await?;
            return Ok(());
        }
        self.forms
            .lock()
            .await
            .insert(chat_id, FormState::AwaitingName);
        self.client
            .send_message(chat_id, START_REPLY, None, None)
            .await?;
        Ok(())
    }

    async fn advance_form(&self, state: FormState, message: Message) -> Result<()> {
        let chat_id = message.chat.id;
        let Some(applicant_id) = message.sender_id() else {
            return Ok(());
        };

        match form_flow::advance(state, &message) {
            StepOutcome::Prompt {
                next,
                reply,
                request_contact,
            } => {
                self.forms.lock().await.insert(chat_id, next);
                let markup = request_contact.then(form_flow::contact_keyboard);
                self.client
                    .send_message(chat_id, &reply, None, markup)
                    .await?;
            }
            StepOutcome::Rejected { reply } => {
                self.forms.lock().await.remove(&chat_id);
                self.client.send_message(chat_id, &reply, None, None).await?;
            }
            StepOutcome::Completed { profile } => {
                self.forms.lock().await.remove(&chat_id);
                let profile = profile.into_new_applicant(
                    applicant_id,
                    message.from.as_ref().and_then(|user| user.username.clone()),
                );
                match self.store.create_applicant(profile.clone()).await {
                    Ok(()) => {}
                    Err(StoreError::ApplicantExists(_)) => {
                        self.client
                            .send_message(chat_id, ALREADY_APPLIED_REPLY, None, None)
                            .await?;
                        return Ok(());
                    }
                    Err(error) => return Err(error.into()),
                }

                self.client
                    .send_message(
                        self.config.group_id,
                        &form_flow::render_summary(&profile),
                        None,
                        Some(staff_actions::summary_keyboard(applicant_id)),
                    )
                    .await?;
                self.client
                    .send_message(chat_id, form_flow::SUBMITTED_REPLY, None, None)
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_callback(&self, query: vidbir_telegram::CallbackQuery) -> Result<()> {
        staff_actions::handle_callback(self, query).await
    }
}
