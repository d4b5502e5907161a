//! Persisted model structs shared by the store backends and the relay engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{ApplicantId, ApplicantStatus, MessageId, OperatorId, ThreadId};

/// One submitted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub telegram_id: ApplicantId,
    pub name: String,
    pub age: i64,
    pub city: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub status: ApplicantStatus,
    pub accepted_city: Option<String>,
    pub accepted_date: Option<NaiveDate>,
}

impl Applicant {
    /// Title used for the applicant's forum topic and staff-facing messages.
    pub fn display_title(&self) -> String {
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => format!("{} (@{})", self.name, username),
            _ => self.name.clone(),
        }
    }
}

/// Profile captured by the intake form; becomes an `Applicant` with
/// status `New`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplicant {
    pub telegram_id: ApplicantId,
    pub name: String,
    pub age: i64,
    pub city: String,
    pub username: Option<String>,
    pub phone: Option<String>,
}

/// Active applicant ↔ forum-topic pairing. At most one per applicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMapping {
    pub telegram_id: ApplicantId,
    pub thread_id: ThreadId,
    pub created_at_unix: u64,
}

/// Broad content classification of a mirrored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Photo,
    Document,
    Voice,
    Video,
    Other,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
            Self::Document => "document",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(Self::Text),
            "photo" => Some(Self::Photo),
            "document" => Some(Self::Document),
            "voice" => Some(Self::Voice),
            "video" => Some(Self::Video),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Kinds whose mirrored copy carries a caption rather than a text body.
    pub fn is_media(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// One mirrored message: a pair of ids, one per side of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLogEntry {
    pub staff_message_id: MessageId,
    pub applicant_message_id: MessageId,
    pub telegram_id: ApplicantId,
    pub thread_id: ThreadId,
    pub kind: MessageKind,
    pub created_at_unix: u64,
}

/// Input for a new log pair; the store stamps `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub staff_message_id: MessageId,
    pub applicant_message_id: MessageId,
    pub telegram_id: ApplicantId,
    pub thread_id: ThreadId,
    pub kind: MessageKind,
}

/// Which side of a log pair a raw message id matched.
///
/// Always carried alongside the entry so callers never compare ids
/// positionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairLookup {
    /// The id was the staff-topic copy; the counterpart lives in the
    /// applicant's private chat.
    Staff(MessageLogEntry),
    /// The id was the applicant-side original; the counterpart lives in the
    /// staff topic.
    Applicant(MessageLogEntry),
}

impl PairLookup {
    pub fn entry(&self) -> &MessageLogEntry {
        match self {
            Self::Staff(entry) | Self::Applicant(entry) => entry,
        }
    }
}

/// Side tag recorded with a mirrored reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionSide {
    Staff,
    Applicant,
}

impl ReactionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Applicant => "applicant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "staff" => Some(Self::Staff),
            "applicant" => Some(Self::Applicant),
            _ => None,
        }
    }
}

/// Mirrored reaction state, keyed by `(message_id, reactor_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRecord {
    pub message_id: MessageId,
    pub reactor_id: i64,
    pub reaction: String,
    pub side: ReactionSide,
}

/// What a pending staff action is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Acceptance,
}

impl PendingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acceptance => "acceptance",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "acceptance" => Some(Self::Acceptance),
            _ => None,
        }
    }
}

/// Persisted two-phase action state, keyed by the operator who started it.
/// Replaces any in-process map so a restart (or second process) sees the
/// same pending flow; a repeated start by the same operator overwrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub operator_id: OperatorId,
    pub applicant_id: ApplicantId,
    pub kind: PendingKind,
    pub created_at_unix: u64,
    pub expires_at_unix: u64,
}

/// Short-lived credential for the web panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminToken {
    pub token: String,
    pub issued_to: OperatorId,
    pub created_at_unix: u64,
}
