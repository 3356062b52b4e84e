//! Point-in-time reports in several text formats.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use agrimedia_common::MediaError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::health::HealthReport;
use super::rules::Alert;
use crate::cache::CacheStats;
use crate::metrics::{CacheSummary, ErrorSummary, PerformanceSummary, ProviderSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
    Markdown,
    Csv,
}

impl FromStr for ReportFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "txt" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            "csv" => Ok(Self::Csv),
            other => Err(MediaError::validation(format!(
                "unknown report format '{other}' (expected json, text, markdown, csv)"
            ))),
        }
    }
}

/// What goes into a report.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub format: ReportFormat,
    pub window: Duration,
    pub include_health: bool,
    pub include_performance: bool,
    pub include_providers: bool,
    pub include_cache: bool,
    pub include_errors: bool,
    pub include_alerts: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            format: ReportFormat::Json,
            window: Duration::hours(1),
            include_health: true,
            include_performance: true,
            include_providers: true,
            include_cache: true,
            include_errors: true,
            include_alerts: true,
        }
    }
}

impl ReportOptions {
    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub window_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<BTreeMap<String, ProviderSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_stats: Option<CacheStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<Alert>>,
}

impl Report {
    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Json => serde_json::to_string_pretty(self)
                .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize report: {e}\"}}")),
            ReportFormat::Text => self.render_text(),
            ReportFormat::Markdown => self.render_markdown(),
            ReportFormat::Csv => self.render_csv(),
        }
    }

    /// Flat `(section, metric, value)` rows shared by the text formats.
    pub fn rows(&self) -> Vec<(String, String, String)> {
        let mut rows = Vec::new();
        let mut push = |section: &str, metric: String, value: String| {
            rows.push((section.to_string(), metric, value));
        };

        if let Some(h) = &self.health {
            push("health", "overall".into(), h.status.to_string());
            for c in &h.components {
                push("health", c.name.clone(), format!("{} ({})", c.status, c.message));
            }
            push("health", "active_alerts".into(), h.active_alerts.to_string());
        }
        if let Some(p) = &self.performance {
            push("performance", "total_operations".into(), p.total_operations.to_string());
            push("performance", "success_rate".into(), format!("{:.3}", p.success_rate));
            push(
                "performance",
                "average_duration_ms".into(),
                format!("{:.1}", p.average_duration_ms),
            );
            for (name, op) in &p.by_operation {
                push(
                    "performance",
                    format!("{name}.count"),
                    op.count.to_string(),
                );
                push(
                    "performance",
                    format!("{name}.average_ms"),
                    format!("{:.1}", op.average_ms),
                );
            }
        }
        if let Some(providers) = &self.providers {
            for (name, s) in providers {
                push("providers", format!("{name}.requests"), s.requests.to_string());
                push("providers", format!("{name}.error_rate"), format!("{:.3}", s.error_rate));
                push(
                    "providers",
                    format!("{name}.average_response_ms"),
                    format!("{:.1}", s.average_response_ms),
                );
                if let Some(q) = s.quota_remaining {
                    push("providers", format!("{name}.quota_remaining"), q.to_string());
                }
            }
        }
        if let Some(c) = &self.cache {
            push("cache", "hits".into(), c.hits.to_string());
            push("cache", "misses".into(), c.misses.to_string());
            push("cache", "hit_rate".into(), format!("{:.3}", c.hit_rate));
            push("cache", "evictions".into(), c.evictions.to_string());
        }
        if let Some(s) = &self.cache_stats {
            push("cache", "size".into(), format!("{}/{}", s.size, s.max_size));
            push("cache", "utilization_pct".into(), format!("{:.1}", s.utilization_pct));
        }
        if let Some(e) = &self.errors {
            push("errors", "total".into(), e.total.to_string());
            for (code, n) in &e.by_code {
                push("errors", code.clone(), n.to_string());
            }
        }
        if let Some(alerts) = &self.alerts {
            for a in alerts {
                let state = if a.resolved { "resolved" } else { "active" };
                push(
                    "alerts",
                    a.rule_id.clone(),
                    format!("{} {state}: {}", a.severity, a.message),
                );
            }
        }
        rows
    }

    fn render_text(&self) -> String {
        let mut out = format!(
            "Media engine report ({}s window, generated {})\n",
            self.window_secs,
            self.generated_at.to_rfc3339()
        );
        let mut current = String::new();
        for (section, metric, value) in self.rows() {
            if section != current {
                let _ = writeln!(out, "\n[{section}]");
                current = section;
            }
            let _ = writeln!(out, "  {metric:<32} {value}");
        }
        out
    }

    fn render_markdown(&self) -> String {
        let mut out = format!(
            "# Media engine report\n\n_Window: {}s, generated {}_\n",
            self.window_secs,
            self.generated_at.to_rfc3339()
        );
        let mut current = String::new();
        for (section, metric, value) in self.rows() {
            if section != current {
                let _ = write!(out, "\n## {section}\n\n| Metric | Value |\n| --- | --- |\n");
                current = section;
            }
            let _ = writeln!(out, "| {metric} | {} |", value.replace('|', "\\|"));
        }
        out
    }

    fn render_csv(&self) -> String {
        let mut out = String::from("section,metric,value\n");
        for (section, metric, value) in self.rows() {
            let _ = writeln!(out, "{},{},{}", csv_field(&section), csv_field(&metric), csv_field(&value));
        }
        out
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
