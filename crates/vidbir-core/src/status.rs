//! Applicant status machine.

use serde::{Deserialize, Serialize};

/// Review state of an application.
///
/// Stored and displayed as the human-readable strings the staff panel shows
/// (`"In Progress"` carries the space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicantStatus {
    #[serde(rename = "New")]
    New,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Declined")]
    Declined,
}

impl ApplicantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::InProgress => "In Progress",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "New" => Some(Self::New),
            "In Progress" => Some(Self::InProgress),
            "Accepted" => Some(Self::Accepted),
            "Declined" => Some(Self::Declined),
            _ => None,
        }
    }

    /// Accepted and Declined end the review; both tear the thread down.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined)
    }

    /// Legal transitions. Re-applying the current status is always allowed
    /// so terminal transitions stay idempotent.
    pub fn can_transition_to(&self, to: Self) -> bool {
        if *self == to {
            return true;
        }
        match self {
            Self::New => true,
            Self::InProgress => to.is_terminal(),
            Self::Accepted | Self::Declined => false,
        }
    }
}

impl std::fmt::Display for ApplicantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
