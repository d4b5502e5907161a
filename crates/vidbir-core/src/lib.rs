//! Shared domain types for the vidbir intake service.
//!
//! Holds the applicant/thread/message identifier aliases, the applicant
//! status machine, acceptance-metadata parsing, and the model structs the
//! storage layer persists. Crates above this one add behavior, not types.

pub mod acceptance;
pub mod model;
pub mod status;
pub mod time_utils;

pub use acceptance::{AcceptanceDetails, AcceptanceParseError};
pub use model::{
    AdminToken, Applicant, MessageKind, MessageLogEntry, NewApplicant, NewLogEntry, PairLookup,
    PendingAction, PendingKind, ReactionRecord, ReactionSide, ThreadMapping,
};
pub use status::ApplicantStatus;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, is_expired_unix};

/// Telegram user id of an applicant; also the id of their private chat.
pub type ApplicantId = i64;
/// Forum-topic thread id inside the staff group.
pub type ThreadId = i64;
/// Telegram message id, scoped to the chat it was posted in.
pub type MessageId = i64;
/// Telegram chat id (group or private).
pub type ChatId = i64;
/// Telegram user id of a staff member acting in the group.
pub type OperatorId = i64;
