//! Telegram Bot API gateway.
//!
//! Thin typed client over the HTTPS Bot API plus the inbound update payload
//! model. The relay engine consumes it through the `RelayGateway` seam; the
//! bot runtime drives `get_updates` long polling and the staff-facing send
//! helpers directly.

pub mod api_client;
pub mod relay_gateway;
pub mod telegram_helpers;
pub mod types;

pub use api_client::{TelegramApiClient, TelegramApiConfig};
pub use relay_gateway::TelegramRelayGateway;
pub use types::{
    CallbackQuery, Chat, Contact, Message, MessageReactionUpdated, ReactionType, Update, User,
};
