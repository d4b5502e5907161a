//! Acceptance metadata supplied by staff when an application is accepted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// City and start date recorded on an accepted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceDetails {
    pub city: String,
    pub date: NaiveDate,
}

/// Why a metadata reply could not be parsed. Rendered back to the operator
/// as a corrective prompt; nothing is persisted until parsing succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcceptanceParseError {
    #[error("expected 'місто:РРРР-ММ-ДД', missing ':' delimiter")]
    MissingDelimiter,
    #[error("city must not be empty")]
    EmptyCity,
    #[error("invalid date '{0}', expected РРРР-ММ-ДД")]
    InvalidDate(String),
}

impl AcceptanceDetails {
    /// Parses a single delimited reply such as `Львів:2025-09-01`.
    pub fn parse(raw: &str) -> Result<Self, AcceptanceParseError> {
        let (city, date) = raw
            .trim()
            .split_once(':')
            .ok_or(AcceptanceParseError::MissingDelimiter)?;
        let city = city.trim();
        if city.is_empty() {
            return Err(AcceptanceParseError::EmptyCity);
        }
        let date = date.trim();
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| AcceptanceParseError::InvalidDate(date.to_string()))?;
        Ok(Self {
            city: city.to_string(),
            date,
        })
    }
}
