//! Record types held by the [`MetricsLog`](super::MetricsLog).

use std::collections::BTreeMap;

use agrimedia_common::{ErrorCode, Provenance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Structured log entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Where a log entry came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContext {
    pub operation: String,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl LogContext {
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            component: component.into(),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub context: LogContext,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Time-stamped event collections
// ---------------------------------------------------------------------------

/// A finished start/end operation pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub component: String,
    pub duration_ms: u64,
    pub success: bool,
}

/// One adapter call as seen by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCall {
    pub provider: String,
    pub operation: String,
    pub success: bool,
    pub duration_ms: u64,
    /// Results that survived filtering.
    pub results: usize,
    pub quota_remaining: Option<u32>,
    pub error_code: Option<ErrorCode>,
}

impl ProviderCall {
    pub fn succeeded(
        provider: impl Into<String>,
        operation: impl Into<String>,
        duration_ms: u64,
        results: usize,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation: operation.into(),
            success: true,
            duration_ms,
            results,
            quota_remaining: None,
            error_code: None,
        }
    }

    pub fn failed(
        provider: impl Into<String>,
        operation: impl Into<String>,
        duration_ms: u64,
        code: ErrorCode,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation: operation.into(),
            success: false,
            duration_ms,
            results: 0,
            quota_remaining: None,
            error_code: Some(code),
        }
    }

    pub fn with_quota(mut self, remaining: u32) -> Self {
        self.quota_remaining = Some(remaining);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub call: ProviderCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOutcome {
    Hit,
    Miss,
    Write,
    Eviction,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEvent {
    pub timestamp: DateTime<Utc>,
    pub key: String,
    pub outcome: CacheOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub operation: String,
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}
