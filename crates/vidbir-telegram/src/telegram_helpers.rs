//! Retry and error-shaping helpers for Bot API calls.

use std::time::Duration;

const MAX_BACKOFF_SHIFT: u32 = 6;

/// Error codes worth another attempt: flood control and server-side faults.
/// Everything else (blocked by user, message too old, bad request) is
/// terminal for the operation.
pub(crate) fn is_retryable_error_code(code: i64) -> bool {
    code == 429 || (500..=599).contains(&code)
}

/// Transport faults that may clear on their own. A timed-out call is a
/// failure, not a retry candidate: the request may have gone through, and
/// repeating a copy would duplicate the message.
pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_connect()
}

/// Backoff before attempt `attempt + 1`: the platform's `retry_after` hint
/// when present, exponential on the base delay otherwise.
pub(crate) fn retry_delay(
    base_delay_ms: u64,
    attempt: usize,
    retry_after_seconds: Option<u64>,
) -> Duration {
    if let Some(seconds) = retry_after_seconds {
        return Duration::from_secs(seconds.max(1));
    }
    let shift = u32::try_from(attempt.saturating_sub(1))
        .unwrap_or(MAX_BACKOFF_SHIFT)
        .min(MAX_BACKOFF_SHIFT);
    Duration::from_millis(base_delay_ms.saturating_mul(1_u64 << shift))
}

/// Clips an error body for log lines.
pub(crate) fn truncate_for_error(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let clipped = value.chars().take(max_chars).collect::<String>();
    format!("{clipped}…")
}
