//! Chat sessions and token streaming.

use crate::client::{segment, SecretaryClient};
use crate::error::ClientError;
use crate::stream::Subscription;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message_count: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionDetail {
    pub session: ChatSession,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct SessionsResponse {
    sessions: Vec<ChatSession>,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(Clone)]
pub struct ChatApi {
    client: SecretaryClient,
}

impl ChatApi {
    #[instrument(skip(self))]
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>, ClientError> {
        self.client
            .get::<SessionsResponse>("/admin/chat/sessions")
            .await
            .map(|r| r.sessions)
    }

    #[instrument(skip(self))]
    pub async fn create_session(&self, title: Option<&str>) -> Result<ChatSession, ClientError> {
        self.client
            .post("/admin/chat/sessions", &CreateSessionRequest { title })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_session(&self, id: &str) -> Result<SessionDetail, ClientError> {
        self.client
            .get(&format!("/admin/chat/sessions/{}", segment(id)))
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_session(&self, id: &str) -> Result<(), ClientError> {
        self.client
            .delete(&format!("/admin/chat/sessions/{}", segment(id)))
            .await
    }

    /// Send a user message and stream the assistant reply as `chunk` events.
    #[instrument(skip(self, content), fields(length = content.len()))]
    pub async fn stream_message(&self, id: &str, content: &str) -> Result<Subscription, ClientError> {
        self.client
            .subscribe(
                Method::POST,
                &format!("/admin/chat/sessions/{}/stream", segment(id)),
                Some(serde_json::json!({ "content": content })),
            )
            .await
    }
}

impl SecretaryClient {
    pub fn chat(&self) -> ChatApi {
        ChatApi {
            client: self.clone(),
        }
    }
}
