//! Bot instances: Telegram bots, WhatsApp bots and web widgets.
//!
//! The three channels share one lifecycle and most of their configuration.
//! Each channel endpoint speaks a flat JSON object; the client decodes it into
//! [`BotInstance`] with the channel-specific part held in [`ChannelSettings`].

use crate::client::{segment, SecretaryClient};
use crate::error::ClientError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

/// Messaging channel an instance is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Telegram,
    WhatsApp,
    Widget,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Telegram, ChannelKind::WhatsApp, ChannelKind::Widget];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Telegram => "telegram",
            ChannelKind::WhatsApp => "whatsapp",
            ChannelKind::Widget => "widget",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "telegram" | "tg" => Ok(ChannelKind::Telegram),
            "whatsapp" | "wa" => Ok(ChannelKind::WhatsApp),
            "widget" | "web" => Ok(ChannelKind::Widget),
            other => Err(format!("unknown channel: {}", other)),
        }
    }
}

/// LLM routing for an instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AiSettings {
    #[serde(default)]
    pub llm_backend: Option<String>,
    #[serde(default)]
    pub llm_persona: Option<String>,
    /// Overrides the persona's prompt when set.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Voice replies for an instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VoiceSettings {
    #[serde(default)]
    pub tts_enabled: bool,
    #[serde(default)]
    pub tts_engine: Option<String>,
    #[serde(default)]
    pub tts_voice: Option<String>,
    #[serde(default)]
    pub tts_preset: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TelegramSettings {
    /// Masked preview of the bot token, e.g. `"1234...wxyz"`.
    #[serde(default)]
    pub bot_token_masked: Option<String>,
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    #[serde(default)]
    pub blocked_users: Vec<i64>,
    /// Users with in-bot admin commands.
    #[serde(default)]
    pub admin_users: Vec<i64>,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub unauthorized_message: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub typing_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WhatsAppSettings {
    #[serde(default)]
    pub access_token_masked: Option<String>,
    #[serde(default)]
    pub verify_token_masked: Option<String>,
    #[serde(default)]
    pub app_secret_masked: Option<String>,
    #[serde(default)]
    pub phone_number_id_masked: Option<String>,
    #[serde(default)]
    pub waba_id: Option<String>,
    #[serde(default)]
    pub webhook_port: Option<u16>,
    #[serde(default)]
    pub allowed_phones: Vec<String>,
    #[serde(default)]
    pub blocked_phones: Vec<String>,
    /// Messages allowed per sender within `rate_limit_window` seconds.
    #[serde(default)]
    pub rate_limit_count: Option<u32>,
    #[serde(default)]
    pub rate_limit_window: Option<u32>,
}

/// Side of the page the widget button sits on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetPosition {
    Left,
    #[default]
    Right,
}

impl FromStr for WidgetPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(WidgetPosition::Left),
            "right" => Ok(WidgetPosition::Right),
            other => Err(format!("position must be left or right, got {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WidgetSettings {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub greeting: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub position: WidgetPosition,
    /// Empty means the widget may be embedded anywhere.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub tunnel_url: Option<String>,
}

/// Channel-specific configuration, tagged by channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSettings {
    Telegram(TelegramSettings),
    WhatsApp(WhatsAppSettings),
    Widget(WidgetSettings),
}

impl ChannelSettings {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelSettings::Telegram(_) => ChannelKind::Telegram,
            ChannelSettings::WhatsApp(_) => ChannelKind::WhatsApp,
            ChannelSettings::Widget(_) => ChannelKind::Widget,
        }
    }

    /// Masked credential previews as `(field, preview)`.
    pub fn masked_secrets(&self) -> Vec<(&'static str, &str)> {
        let candidates: Vec<(&'static str, &Option<String>)> = match self {
            ChannelSettings::Telegram(t) => vec![("bot_token", &t.bot_token_masked)],
            ChannelSettings::WhatsApp(w) => vec![
                ("access_token", &w.access_token_masked),
                ("verify_token", &w.verify_token_masked),
                ("app_secret", &w.app_secret_masked),
                ("phone_number_id", &w.phone_number_id_masked),
            ],
            ChannelSettings::Widget(_) => Vec::new(),
        };
        candidates
            .into_iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
            .collect()
    }
}

impl From<TelegramSettings> for ChannelSettings {
    fn from(s: TelegramSettings) -> Self {
        ChannelSettings::Telegram(s)
    }
}

impl From<WhatsAppSettings> for ChannelSettings {
    fn from(s: WhatsAppSettings) -> Self {
        ChannelSettings::WhatsApp(s)
    }
}

impl From<WidgetSettings> for ChannelSettings {
    fn from(s: WidgetSettings) -> Self {
        ChannelSettings::Widget(s)
    }
}

/// A configured bot or widget deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct BotInstance {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Administrative on/off switch.
    pub enabled: bool,
    /// Process liveness as reported by the backend.
    pub running: bool,
    pub auto_start: bool,
    pub ai: AiSettings,
    pub voice: VoiceSettings,
    pub settings: ChannelSettings,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BotInstance {
    pub fn kind(&self) -> ChannelKind {
        self.settings.kind()
    }
}

#[derive(Debug, Deserialize)]
struct InstanceHead {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    running: bool,
    #[serde(default)]
    auto_start: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireInstance<S> {
    #[serde(flatten)]
    head: InstanceHead,
    #[serde(flatten)]
    ai: AiSettings,
    #[serde(flatten)]
    voice: VoiceSettings,
    #[serde(flatten)]
    settings: S,
}

impl<S: Into<ChannelSettings>> WireInstance<S> {
    fn into_instance(self) -> BotInstance {
        BotInstance {
            id: self.head.id,
            name: self.head.name,
            description: self.head.description,
            enabled: self.head.enabled,
            running: self.head.running,
            auto_start: self.head.auto_start,
            ai: self.ai,
            voice: self.voice,
            settings: self.settings.into(),
            created_at: self.head.created_at,
            updated_at: self.head.updated_at,
        }
    }
}

fn decode_as<S>(value: serde_json::Value) -> Result<BotInstance, ClientError>
where
    S: DeserializeOwned + Into<ChannelSettings>,
{
    let wire: WireInstance<S> = serde_json::from_value(value)?;
    Ok(wire.into_instance())
}

/// Decode one flat instance object returned by a channel endpoint.
pub fn decode_instance(kind: ChannelKind, value: serde_json::Value) -> Result<BotInstance, ClientError> {
    match kind {
        ChannelKind::Telegram => decode_as::<TelegramSettings>(value),
        ChannelKind::WhatsApp => decode_as::<WhatsAppSettings>(value),
        ChannelKind::Widget => decode_as::<WidgetSettings>(value),
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TelegramPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    pub allowed_users: Vec<i64>,
    pub blocked_users: Vec<i64>,
    pub admin_users: Vec<i64>,
    pub welcome_message: Option<String>,
    pub unauthorized_message: Option<String>,
    pub error_message: Option<String>,
    pub typing_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct WhatsAppPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    pub waba_id: Option<String>,
    pub webhook_port: Option<u16>,
    pub allowed_phones: Vec<String>,
    pub blocked_phones: Vec<String>,
    pub rate_limit_count: Option<u32>,
    pub rate_limit_window: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct WidgetPayload {
    pub title: Option<String>,
    pub greeting: Option<String>,
    pub placeholder: Option<String>,
    pub primary_color: Option<String>,
    pub position: WidgetPosition,
    pub allowed_domains: Vec<String>,
    pub tunnel_url: Option<String>,
}

/// Channel part of a create/update body, serialized flat.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SettingsPayload {
    Telegram(TelegramPayload),
    WhatsApp(WhatsAppPayload),
    Widget(WidgetPayload),
}

impl SettingsPayload {
    pub fn kind(&self) -> ChannelKind {
        match self {
            SettingsPayload::Telegram(_) => ChannelKind::Telegram,
            SettingsPayload::WhatsApp(_) => ChannelKind::WhatsApp,
            SettingsPayload::Widget(_) => ChannelKind::Widget,
        }
    }
}

/// Create/update body. Update replaces every editable field; credentials
/// left as `None` are omitted so the stored secret is kept.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InstancePayload {
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub auto_start: bool,
    #[serde(flatten)]
    pub ai: AiSettings,
    #[serde(flatten)]
    pub voice: VoiceSettings,
    #[serde(flatten)]
    pub settings: SettingsPayload,
}

/// Liveness report for a single instance.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct InstanceStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstancesResponse {
    instances: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InstanceResponse {
    Wrapped { instance: serde_json::Value },
    Bare(serde_json::Value),
}

impl InstanceResponse {
    fn into_value(self) -> serde_json::Value {
        match self {
            InstanceResponse::Wrapped { instance } => instance,
            InstanceResponse::Bare(value) => value,
        }
    }
}

/// Instance endpoints of one channel.
#[derive(Clone)]
pub struct InstancesApi {
    client: SecretaryClient,
    kind: ChannelKind,
}

impl InstancesApi {
    pub(crate) fn new(client: SecretaryClient, kind: ChannelKind) -> Self {
        Self { client, kind }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn collection(&self) -> String {
        format!("/admin/{}/instances", self.kind)
    }

    fn item(&self, id: &str) -> String {
        format!("{}/{}", self.collection(), segment(id))
    }

    #[instrument(skip(self), fields(channel = %self.kind))]
    pub async fn list(&self) -> Result<Vec<BotInstance>, ClientError> {
        let response: InstancesResponse = self.client.get(&self.collection()).await?;
        response
            .instances
            .into_iter()
            .map(|value| decode_instance(self.kind, value))
            .collect()
    }

    #[instrument(skip(self), fields(channel = %self.kind))]
    pub async fn get(&self, id: &str) -> Result<BotInstance, ClientError> {
        let response: InstanceResponse = self.client.get(&self.item(id)).await?;
        decode_instance(self.kind, response.into_value())
    }

    #[instrument(skip(self, payload), fields(channel = %self.kind, name = %payload.name))]
    pub async fn create(&self, payload: &InstancePayload) -> Result<BotInstance, ClientError> {
        let response: InstanceResponse = self.client.post(&self.collection(), payload).await?;
        let instance = decode_instance(self.kind, response.into_value())?;
        info!("Created {} instance {}", self.kind, instance.id);
        Ok(instance)
    }

    #[instrument(skip(self, payload), fields(channel = %self.kind))]
    pub async fn update(&self, id: &str, payload: &InstancePayload) -> Result<BotInstance, ClientError> {
        let response: InstanceResponse = self.client.put(&self.item(id), payload).await?;
        decode_instance(self.kind, response.into_value())
    }

    #[instrument(skip(self), fields(channel = %self.kind))]
    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.client.delete(&self.item(id)).await?;
        info!("Deleted {} instance {}", self.kind, id);
        Ok(())
    }

    pub async fn start(&self, id: &str) -> Result<(), ClientError> {
        self.action(id, "start").await
    }

    pub async fn stop(&self, id: &str) -> Result<(), ClientError> {
        self.action(id, "stop").await
    }

    pub async fn restart(&self, id: &str) -> Result<(), ClientError> {
        self.action(id, "restart").await
    }

    #[instrument(skip(self), fields(channel = %self.kind))]
    pub async fn status(&self, id: &str) -> Result<InstanceStatus, ClientError> {
        self.client.get(&format!("{}/status", self.item(id))).await
    }

    #[instrument(skip(self), fields(channel = %self.kind))]
    async fn action(&self, id: &str, action: &str) -> Result<(), ClientError> {
        let empty: [(&str, &str); 0] = [];
        self.client
            .post_action(&format!("{}/{}", self.item(id), action), &empty)
            .await
    }
}

impl SecretaryClient {
    /// Instance endpoints for a channel.
    pub fn instances(&self, kind: ChannelKind) -> InstancesApi {
        InstancesApi::new(self.clone(), kind)
    }
}
