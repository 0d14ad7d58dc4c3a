//! Response and request types shared across resources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `{ "status": { ... } }` wrapper used by every long-running operation.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusEnvelope<T> {
    pub status: T,
}

/// Progress of a long-running backend operation (scan, download, training).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OperationStatus {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub is_active: bool,
    /// Percentage in `0.0..=100.0`.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub current_step: Option<u64>,
    #[serde(default)]
    pub total_steps: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl OperationStatus {
    /// Whether the operation is still in progress.
    pub fn is_active(&self) -> bool {
        self.is_running || self.is_active
    }
}

/// One GPU in a metrics sample.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GpuStat {
    pub index: u32,
    pub name: String,
    /// Utilization percent.
    #[serde(default)]
    pub utilization: f64,
    /// MiB.
    #[serde(default)]
    pub memory_used: u64,
    /// MiB.
    #[serde(default)]
    pub memory_total: u64,
    /// Celsius.
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// GPU metrics sample.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct GpuMetrics {
    #[serde(default)]
    pub gpus: Vec<GpuStat>,
    #[serde(default)]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

/// Filter and pagination parameters for log listings.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq, Hash)]
pub struct LogQuery {
    pub limit: u32,
    pub offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// ISO date, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// ISO date, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl LogQuery {
    /// Flatten into `(name, value)` pairs, skipping unset filters.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        let optional = [
            ("action", &self.action),
            ("resource", &self.resource),
            ("user", &self.user),
            ("backend", &self.backend),
            ("from", &self.from),
            ("to", &self.to),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                pairs.push((name, value.clone()));
            }
        }
        pairs
    }
}

/// Page of log entries: `{ "logs": [...], "total": n }`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogPage<T> {
    pub logs: Vec<T>,
    #[serde(default)]
    pub total: u64,
}

/// Result of a retention cleanup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanupResult {
    #[serde(default, alias = "deleted_count")]
    pub deleted: u64,
}

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// File extension for saved exports.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unsupported export format: {}", other)),
        }
    }
}
