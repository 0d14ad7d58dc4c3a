//! Authentication, GSM telephony status and GPU monitoring.

use crate::client::SecretaryClient;
use crate::error::ClientError;
use crate::stream::Subscription;
use crate::types::GpuMetrics;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Clone)]
pub struct AuthApi {
    client: SecretaryClient,
}

impl AuthApi {
    /// Exchange credentials for a bearer token and install it on the client.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let response: LoginResponse = self
            .client
            .post("/admin/auth/login", &LoginRequest { username, password })
            .await?;
        self.client.set_token(Some(response.access_token.clone()));
        info!("Logged in as {}", username);
        Ok(response)
    }

    pub fn logout(&self) {
        self.client.set_token(None);
    }
}

/// Modem/call state as reported by the GSM service.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GsmStatus {
    /// e.g. `"idle"`, `"ringing"`, `"in_call"`, `"offline"`.
    pub state: String,
    #[serde(default)]
    pub signal_strength: Option<u8>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub active_call: Option<GsmCall>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GsmCall {
    pub number: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

#[derive(Clone)]
pub struct GsmApi {
    client: SecretaryClient,
}

impl GsmApi {
    #[instrument(skip(self))]
    pub async fn status(&self) -> Result<GsmStatus, ClientError> {
        self.client.get("/admin/gsm/status").await
    }
}

#[derive(Clone)]
pub struct MonitorApi {
    client: SecretaryClient,
}

impl MonitorApi {
    #[instrument(skip(self))]
    pub async fn gpu(&self) -> Result<GpuMetrics, ClientError> {
        self.client.get("/admin/monitor/gpu").await
    }

    /// Live GPU samples as `metrics` events.
    pub async fn gpu_stream(&self) -> Result<Subscription, ClientError> {
        self.client
            .subscribe(Method::GET, "/admin/monitor/gpu/stream", None)
            .await
    }
}

impl SecretaryClient {
    pub fn auth(&self) -> AuthApi {
        AuthApi {
            client: self.clone(),
        }
    }

    pub fn gsm(&self) -> GsmApi {
        GsmApi {
            client: self.clone(),
        }
    }

    pub fn monitor(&self) -> MonitorApi {
        MonitorApi {
            client: self.clone(),
        }
    }
}
