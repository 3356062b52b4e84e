//! HTTP boundary: turns reqwest outcomes into [`MediaError`] values.
//!
//! Classification relies only on explicit discriminants (status code,
//! `is_timeout`, `is_connect`, `is_decode`), never on message text.

use std::time::Duration;

use agrimedia_common::MediaError;
use chrono::{TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::quota::QuotaWindow;

const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";
const RETRY_AFTER: &str = "retry-after";

/// Map a transport-level reqwest error.
pub fn from_transport(provider: &str, err: &reqwest::Error, timeout: Duration) -> MediaError {
    if err.is_timeout() {
        MediaError::Timeout {
            provider: provider.to_string(),
            after_ms: timeout.as_millis() as u64,
        }
    } else if err.is_decode() {
        MediaError::Decode {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    } else if let Some(status) = err.status() {
        from_status(provider, status, None)
    } else if err.is_connect() {
        MediaError::network(provider, format!("connect failed: {err}"))
    } else {
        MediaError::network(provider, err.to_string())
    }
}

/// Map a non-success HTTP status.
pub fn from_status(provider: &str, status: StatusCode, retry_after_secs: Option<u64>) -> MediaError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MediaError::AuthenticationFailed {
            provider: provider.to_string(),
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => MediaError::QuotaExceeded {
            provider: provider.to_string(),
            retry_after_secs,
        },
        s if s.is_server_error() => MediaError::ProviderUnavailable {
            provider: provider.to_string(),
            status: Some(s.as_u16()),
        },
        s => MediaError::validation(format!(
            "{provider} rejected the request with HTTP {}",
            s.as_u16()
        )),
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Seconds from a `Retry-After` header (integer form only).
pub fn retry_after(headers: &HeaderMap) -> Option<u64> {
    header_u64(headers, RETRY_AFTER)
}

/// Feed `X-Ratelimit-*` headers into the quota window, when present.
pub fn record_reported_quota(headers: &HeaderMap, quota: &QuotaWindow) {
    let Some(remaining) = header_u64(headers, RATELIMIT_REMAINING) else {
        return;
    };
    let limit = header_u64(headers, RATELIMIT_LIMIT).map(|l| l as u32);
    let reset_at = header_u64(headers, RATELIMIT_RESET)
        .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single());

    quota.update_reported(remaining as u32, limit, reset_at);
}

/// Send a request and decode a JSON body, mapping every failure mode.
pub async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
    quota: &QuotaWindow,
    timeout: Duration,
) -> Result<T, MediaError> {
    let response = request
        .send()
        .await
        .map_err(|e| from_transport(provider, &e, timeout))?;

    record_reported_quota(response.headers(), quota);

    let status = response.status();
    if !status.is_success() {
        return Err(from_status(provider, status, retry_after(response.headers())));
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            from_transport(provider, &e, timeout)
        } else {
            MediaError::Decode {
                provider: provider.to_string(),
                message: e.to_string(),
            }
        }
    })
}
