//! Local model management and fine-tuning jobs.

use crate::client::SecretaryClient;
use crate::error::ClientError;
use crate::stream::Subscription;
use crate::types::{OperationStatus, StatusEnvelope};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Bytes.
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct DownloadRequest<'a> {
    repo_id: &'a str,
}

#[derive(Clone)]
pub struct ModelsApi {
    client: SecretaryClient,
}

impl ModelsApi {
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<ModelInfo>, ClientError> {
        self.client
            .get::<ModelsResponse>("/admin/models")
            .await
            .map(|r| r.models)
    }

    #[instrument(skip(self))]
    pub async fn start_scan(&self) -> Result<(), ClientError> {
        let empty: [(&str, &str); 0] = [];
        self.client.post_action("/admin/models/scan", &empty).await
    }

    #[instrument(skip(self))]
    pub async fn scan_status(&self) -> Result<OperationStatus, ClientError> {
        self.client
            .get::<StatusEnvelope<OperationStatus>>("/admin/models/scan/status")
            .await
            .map(|r| r.status)
    }

    #[instrument(skip(self))]
    pub async fn download(&self, repo_id: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .client
            .post("/admin/models/download", &DownloadRequest { repo_id })
            .await?;
        info!("Requested download of {}", repo_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn download_status(&self) -> Result<OperationStatus, ClientError> {
        self.client
            .get::<StatusEnvelope<OperationStatus>>("/admin/models/download/status")
            .await
            .map(|r| r.status)
    }
}

#[derive(Clone)]
pub struct FinetuneApi {
    client: SecretaryClient,
}

impl FinetuneApi {
    /// Saved training configuration, `None` until one has been stored.
    #[instrument(skip(self))]
    pub async fn config(&self) -> Result<Option<serde_json::Value>, ClientError> {
        self.client.get_optional("/admin/finetune/config").await
    }

    #[instrument(skip(self, config))]
    pub async fn start_training(&self, config: &serde_json::Value) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .client
            .post("/admin/finetune/train/start", config)
            .await?;
        info!("Training started");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop_training(&self) -> Result<(), ClientError> {
        let empty: [(&str, &str); 0] = [];
        self.client
            .post_action("/admin/finetune/train/stop", &empty)
            .await
    }

    #[instrument(skip(self))]
    pub async fn training_status(&self) -> Result<OperationStatus, ClientError> {
        self.client
            .get::<StatusEnvelope<OperationStatus>>("/admin/finetune/train/status")
            .await
            .map(|r| r.status)
    }

    /// Tail the training log.
    pub async fn tail_log(&self) -> Result<Subscription, ClientError> {
        self.client
            .subscribe(Method::GET, "/admin/finetune/train/log", None)
            .await
    }
}

impl SecretaryClient {
    pub fn models(&self) -> ModelsApi {
        ModelsApi {
            client: self.clone(),
        }
    }

    pub fn finetune(&self) -> FinetuneApi {
        FinetuneApi {
            client: self.clone(),
        }
    }
}
