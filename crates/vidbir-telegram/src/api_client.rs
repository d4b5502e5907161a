//! Typed Bot API client used by the bridge runtime and the relay gateway.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use vidbir_core::{ChatId, MessageId, ThreadId};

use crate::telegram_helpers::{
    is_retryable_error_code, is_retryable_transport_error, retry_delay, truncate_for_error,
};
use crate::types::{Update, User};

/// Connection settings for the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramApiConfig {
    pub api_base: String,
    pub bot_token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for TelegramApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            request_timeout_ms: 90_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct MessageIdEnvelope {
    message_id: MessageId,
}

#[derive(Debug, Clone, Deserialize)]
struct ForumTopicEnvelope {
    message_thread_id: ThreadId,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMemberEnvelope {
    status: String,
}

/// Bot API client. Transient failures (flood control, 5xx, transport) are
/// retried with backoff honoring the platform's `retry_after` hint; every
/// other failure surfaces to the caller as terminal for that operation.
#[derive(Clone)]
pub struct TelegramApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl TelegramApiClient {
    pub fn new(config: TelegramApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create telegram api client")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.trim().to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    /// The bot's own identity; used to skip self-authored group traffic.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", json!({})).await
    }

    /// Long-polls for updates after `offset`. The HTTP timeout must exceed
    /// `timeout_seconds`, which the constructor's default accommodates.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": timeout_seconds,
            "allowed_updates": ["message", "edited_message", "callback_query", "message_reaction"],
        });
        if let Some(offset) = offset {
            payload["offset"] = Value::from(offset);
        }
        self.call("getUpdates", payload).await
    }

    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        thread_id: Option<ThreadId>,
        reply_markup: Option<Value>,
    ) -> Result<MessageId> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(thread_id) = thread_id {
            payload["message_thread_id"] = Value::from(thread_id);
        }
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = markup;
        }
        let message: MessageIdEnvelope = self.call("sendMessage", payload).await?;
        Ok(message.message_id)
    }

    /// Copies a message without the forward header, preserving media by
    /// reference. Returns the id of the copy.
    pub async fn copy_message(
        &self,
        chat_id: ChatId,
        thread_id: Option<ThreadId>,
        from_chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<MessageId> {
        let mut payload = json!({
            "chat_id": chat_id,
            "from_chat_id": from_chat_id,
            "message_id": message_id,
        });
        if let Some(thread_id) = thread_id {
            payload["message_thread_id"] = Value::from(thread_id);
        }
        let copied: MessageIdEnvelope = self.call("copyMessage", payload).await?;
        Ok(copied.message_id)
    }

    pub async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<()> {
        let _: Value = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "text": text,
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn edit_message_caption(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        caption: &str,
    ) -> Result<()> {
        let _: Value = self
            .call(
                "editMessageCaption",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "caption": caption,
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn edit_message_reply_markup(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        reply_markup: Option<Value>,
    ) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = markup;
        }
        let _: Value = self.call("editMessageReplyMarkup", payload).await?;
        Ok(())
    }

    pub async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        let _: Value = self
            .call(
                "deleteMessage",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                }),
            )
            .await?;
        Ok(())
    }

    /// Sets the bot's reaction; `None` clears it.
    pub async fn set_message_reaction(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        emoji: Option<&str>,
    ) -> Result<()> {
        let reaction = match emoji {
            Some(emoji) => json!([{ "type": "emoji", "emoji": emoji }]),
            None => json!([]),
        };
        let _: Value = self
            .call(
                "setMessageReaction",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "reaction": reaction,
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn create_forum_topic(&self, chat_id: ChatId, name: &str) -> Result<ThreadId> {
        let topic: ForumTopicEnvelope = self
            .call(
                "createForumTopic",
                json!({
                    "chat_id": chat_id,
                    "name": name,
                }),
            )
            .await?;
        Ok(topic.message_thread_id)
    }

    pub async fn delete_forum_topic(&self, chat_id: ChatId, thread_id: ThreadId) -> Result<()> {
        let _: Value = self
            .call(
                "deleteForumTopic",
                json!({
                    "chat_id": chat_id,
                    "message_thread_id": thread_id,
                }),
            )
            .await?;
        Ok(())
    }

    /// Membership status of a user in a chat: `creator`, `administrator`,
    /// `member`, `left`, `kicked`, ...
    pub async fn get_chat_member(&self, chat_id: ChatId, user_id: i64) -> Result<String> {
        let member: ChatMemberEnvelope = self
            .call(
                "getChatMember",
                json!({
                    "chat_id": chat_id,
                    "user_id": user_id,
                }),
            )
            .await?;
        Ok(member.status)
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<()> {
        let mut payload = json!({ "callback_query_id": callback_query_id });
        if let Some(text) = text {
            payload["text"] = Value::from(text);
        }
        let _: Value = self.call("answerCallbackQuery", payload).await?;
        Ok(())
    }

    async fn call<T>(&self, method: &str, payload: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = self.http.post(&url).json(&payload).send().await;
            let response = match response {
                Ok(response) => response,
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("telegram api {method} request failed"));
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .with_context(|| format!("failed to read telegram {method} response"))?;
            let envelope = match serde_json::from_str::<ApiResponse<T>>(&body) {
                Ok(envelope) => envelope,
                Err(error) => {
                    if attempt < self.retry_max_attempts && status.is_server_error() {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(anyhow!(error)).with_context(|| {
                        format!(
                            "failed to decode telegram {method} response: {}",
                            truncate_for_error(&body, 320)
                        )
                    });
                }
            };

            if envelope.ok {
                return envelope
                    .result
                    .ok_or_else(|| anyhow!("telegram {method} response missing result"));
            }

            let error_code = envelope.error_code.unwrap_or_else(|| status.as_u16().into());
            let retry_after = envelope
                .parameters
                .as_ref()
                .and_then(|parameters| parameters.retry_after);
            if attempt < self.retry_max_attempts && is_retryable_error_code(error_code) {
                tokio::time::sleep(retry_delay(
                    self.retry_base_delay_ms,
                    attempt,
                    retry_after,
                ))
                .await;
                continue;
            }

            bail!(
                "telegram api {method} failed with code {error_code}: {}",
                envelope
                    .description
                    .unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
