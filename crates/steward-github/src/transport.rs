use std::time::Duration;

use chrono::{DateTime, Utc};

/// Statuses worth a bounded retry: secondary rate limits and server faults.
pub fn is_retryable_github_status(status: u16) -> bool {
    status == 429 || status >= 500
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at.signed_duration_since(Utc::now()).num_milliseconds();
    if delay_ms <= 0 {
        return Some(Duration::ZERO);
    }
    u64::try_from(delay_ms).ok().map(Duration::from_millis)
}

/// Exponential backoff from `base_delay_ms`, floored by any Retry-After hint.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    let shift = attempt.min(6) as u32;
    let backoff = Duration::from_millis(base_delay_ms.max(1).saturating_mul(1_u64 << shift));
    match retry_after {
        Some(hint) => backoff.max(hint),
        None => backoff,
    }
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let prefix: String = trimmed.chars().take(max_chars).collect();
    format!("{prefix}...")
}
