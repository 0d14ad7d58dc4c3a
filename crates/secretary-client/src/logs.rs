//! Audit and usage logs.

use crate::client::SecretaryClient;
use crate::error::ClientError;
use crate::types::{CleanupResult, ExportFormat, LogPage, LogQuery};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, instrument};

/// Administrative action recorded by the backend.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// One LLM/TTS request accounted by the backend.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UsageEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    /// Milliseconds.
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UsageStats {
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub by_backend: HashMap<String, u64>,
}

#[derive(Clone)]
pub struct AuditApi {
    client: SecretaryClient,
}

impl AuditApi {
    #[instrument(skip(self))]
    pub async fn logs(&self, query: &LogQuery) -> Result<LogPage<AuditEntry>, ClientError> {
        self.client.get_query("/admin/audit/logs", query).await
    }

    #[instrument(skip(self))]
    pub async fn export(&self, format: ExportFormat) -> Result<Vec<u8>, ClientError> {
        self.client
            .get_bytes("/admin/audit/export", &[("format", format.as_str())])
            .await
    }

    /// Delete entries older than `days`.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, days: u32) -> Result<CleanupResult, ClientError> {
        let result: CleanupResult = self
            .client
            .post(&format!("/admin/audit/cleanup?days={}", days), &serde_json::json!({}))
            .await?;
        info!("Audit cleanup removed {} entries", result.deleted);
        Ok(result)
    }
}

#[derive(Clone)]
pub struct UsageApi {
    client: SecretaryClient,
}

impl UsageApi {
    #[instrument(skip(self))]
    pub async fn logs(&self, query: &LogQuery) -> Result<LogPage<UsageEntry>, ClientError> {
        self.client.get_query("/admin/usage/logs", query).await
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<UsageStats, ClientError> {
        self.client.get("/admin/usage/stats").await
    }

    #[instrument(skip(self))]
    pub async fn export(&self, format: ExportFormat) -> Result<Vec<u8>, ClientError> {
        self.client
            .get_bytes("/admin/usage/export", &[("format", format.as_str())])
            .await
    }

    #[instrument(skip(self))]
    pub async fn cleanup(&self, days: u32) -> Result<CleanupResult, ClientError> {
        let result: CleanupResult = self
            .client
            .post(&format!("/admin/usage/cleanup?days={}", days), &serde_json::json!({}))
            .await?;
        info!("Usage cleanup removed {} entries", result.deleted);
        Ok(result)
    }
}

impl SecretaryClient {
    pub fn audit(&self) -> AuditApi {
        AuditApi {
            client: self.clone(),
        }
    }

    pub fn usage(&self) -> UsageApi {
        UsageApi {
            client: self.clone(),
        }
    }
}
