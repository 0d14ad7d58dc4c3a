//! LLM backend selection, personas and TTS presets.

use crate::client::SecretaryClient;
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LlmBackendInfo {
    pub backend: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub available_backends: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TtsPreset {
    pub name: String,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
struct SetBackendRequest<'a> {
    backend: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PersonasResponse {
    personas: Vec<Persona>,
}

#[derive(Debug, Deserialize)]
struct PresetsResponse {
    presets: Vec<TtsPreset>,
}

#[derive(Clone)]
pub struct LlmApi {
    client: SecretaryClient,
}

impl LlmApi {
    #[instrument(skip(self))]
    pub async fn backend(&self) -> Result<LlmBackendInfo, ClientError> {
        self.client.get("/admin/llm/backend").await
    }

    #[instrument(skip(self))]
    pub async fn set_backend(
        &self,
        backend: &str,
        model: Option<&str>,
    ) -> Result<LlmBackendInfo, ClientError> {
        let info: LlmBackendInfo = self
            .client
            .post("/admin/llm/backend", &SetBackendRequest { backend, model })
            .await?;
        info!("LLM backend switched to {}", info.backend);
        Ok(info)
    }

    #[instrument(skip(self))]
    pub async fn personas(&self) -> Result<Vec<Persona>, ClientError> {
        self.client
            .get::<PersonasResponse>("/admin/llm/personas")
            .await
            .map(|r| r.personas)
    }
}

#[derive(Clone)]
pub struct TtsApi {
    client: SecretaryClient,
}

impl TtsApi {
    #[instrument(skip(self))]
    pub async fn presets(&self) -> Result<Vec<TtsPreset>, ClientError> {
        self.client
            .get::<PresetsResponse>("/admin/tts/presets")
            .await
            .map(|r| r.presets)
    }

    #[instrument(skip(self))]
    pub async fn select_preset(&self, name: &str) -> Result<(), ClientError> {
        self.client
            .post_action("/admin/tts/preset", &[("name", name)])
            .await
    }
}

impl SecretaryClient {
    pub fn llm(&self) -> LlmApi {
        LlmApi {
            client: self.clone(),
        }
    }

    pub fn tts(&self) -> TtsApi {
        TtsApi {
            client: self.clone(),
        }
    }
}
