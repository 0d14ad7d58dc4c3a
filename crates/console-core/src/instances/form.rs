//! Create/edit form for an instance.
//!
//! Fields are set by name from operator input. Credentials are write-only:
//! an edit form starts with every secret `Unchanged`, and an unchanged
//! secret is left out of the payload so the backend keeps the stored value.

use super::access::normalize_domain;
use crate::error::ValidationError;
use secrecy::{ExposeSecret, SecretString};
use secretary_client::{
    AiSettings, BotInstance, ChannelKind, ChannelSettings, InstancePayload, SettingsPayload,
    TelegramPayload, VoiceSettings, WhatsAppPayload, WidgetPayload, WidgetPosition,
};
use std::str::FromStr;

const DEFAULT_WIDGET_COLOR: &str = "#6366f1";

/// A credential field as typed by the operator.
#[derive(Debug, Default)]
pub enum SecretInput {
    /// Blank input; keep whatever the backend stores.
    #[default]
    Unchanged,
    Replace(SecretString),
}

impl SecretInput {
    pub fn from_input(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            SecretInput::Unchanged
        } else {
            SecretInput::Replace(SecretString::new(value.to_string()))
        }
    }

    fn reveal(&self) -> Option<String> {
        match self {
            SecretInput::Unchanged => None,
            SecretInput::Replace(secret) => Some(secret.expose_secret().clone()),
        }
    }
}

#[derive(Debug)]
pub struct TelegramForm {
    pub bot_token: SecretInput,
    pub allowed_users: Vec<i64>,
    pub blocked_users: Vec<i64>,
    pub admin_users: Vec<i64>,
    pub welcome_message: Option<String>,
    pub unauthorized_message: Option<String>,
    pub error_message: Option<String>,
    pub typing_enabled: bool,
}

impl Default for TelegramForm {
    fn default() -> Self {
        Self {
            bot_token: SecretInput::Unchanged,
            allowed_users: Vec::new(),
            blocked_users: Vec::new(),
            admin_users: Vec::new(),
            welcome_message: None,
            unauthorized_message: None,
            error_message: None,
            typing_enabled: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct WhatsAppForm {
    pub access_token: SecretInput,
    pub verify_token: SecretInput,
    pub app_secret: SecretInput,
    pub phone_number_id: SecretInput,
    pub waba_id: Option<String>,
    pub webhook_port: Option<u16>,
    pub allowed_phones: Vec<String>,
    pub blocked_phones: Vec<String>,
    pub rate_limit_count: Option<u32>,
    pub rate_limit_window: Option<u32>,
}

#[derive(Debug)]
pub struct WidgetForm {
    pub title: Option<String>,
    pub greeting: Option<String>,
    pub placeholder: Option<String>,
    pub primary_color: Option<String>,
    pub position: WidgetPosition,
    pub allowed_domains: Vec<String>,
    pub tunnel_url: Option<String>,
}

impl Default for WidgetForm {
    fn default() -> Self {
        Self {
            title: None,
            greeting: None,
            placeholder: None,
            primary_color: Some(DEFAULT_WIDGET_COLOR.to_string()),
            position: WidgetPosition::Right,
            allowed_domains: Vec::new(),
            tunnel_url: None,
        }
    }
}

#[derive(Debug)]
pub enum ChannelForm {
    Telegram(TelegramForm),
    WhatsApp(WhatsAppForm),
    Widget(WidgetForm),
}

impl ChannelForm {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelForm::Telegram(_) => ChannelKind::Telegram,
            ChannelForm::WhatsApp(_) => ChannelKind::WhatsApp,
            ChannelForm::Widget(_) => ChannelKind::Widget,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        match self {
            ChannelForm::Telegram(t) => match field {
                "bot_token" => t.bot_token = SecretInput::from_input(value),
                "allowed_users" => t.allowed_users = id_list(field, value)?,
                "blocked_users" => t.blocked_users = id_list(field, value)?,
                "admin_users" => t.admin_users = id_list(field, value)?,
                "welcome_message" => t.welcome_message = text(value),
                "unauthorized_message" => t.unauthorized_message = text(value),
                "error_message" => t.error_message = text(value),
                "typing_enabled" => t.typing_enabled = flag(field, value)?,
                _ => return Err(ValidationError::UnknownField(field.to_string())),
            },
            ChannelForm::WhatsApp(w) => match field {
                "access_token" => w.access_token = SecretInput::from_input(value),
                "verify_token" => w.verify_token = SecretInput::from_input(value),
                "app_secret" => w.app_secret = SecretInput::from_input(value),
                "phone_number_id" => w.phone_number_id = SecretInput::from_input(value),
                "waba_id" => w.waba_id = text(value),
                "webhook_port" => w.webhook_port = number(field, value)?,
                "allowed_phones" => w.allowed_phones = list(value),
                "blocked_phones" => w.blocked_phones = list(value),
                "rate_limit_count" => w.rate_limit_count = number(field, value)?,
                "rate_limit_window" => w.rate_limit_window = number(field, value)?,
                _ => return Err(ValidationError::UnknownField(field.to_string())),
            },
            ChannelForm::Widget(w) => match field {
                "title" => w.title = text(value),
                "greeting" => w.greeting = text(value),
                "placeholder" => w.placeholder = text(value),
                "primary_color" => w.primary_color = text(value),
                "position" => {
                    w.position = WidgetPosition::from_str(value.trim()).map_err(|message| {
                        ValidationError::InvalidValue {
                            field: field.to_string(),
                            message,
                        }
                    })?
                }
                "allowed_domains" => {
                    w.allowed_domains = list(value)
                        .iter()
                        .map(|d| normalize_domain(d))
                        .filter(|d| !d.is_empty())
                        .collect()
                }
                "tunnel_url" => w.tunnel_url = text(value),
                _ => return Err(ValidationError::UnknownField(field.to_string())),
            },
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ChannelForm::Telegram(_) => Ok(()),
            ChannelForm::WhatsApp(w) => {
                if w.webhook_port == Some(0) {
                    return Err(ValidationError::InvalidValue {
                        field: "webhook_port".into(),
                        message: "port must be between 1 and 65535".into(),
                    });
                }
                if w.rate_limit_count.is_some() && w.rate_limit_window.unwrap_or(0) == 0 {
                    return Err(ValidationError::InvalidValue {
                        field: "rate_limit_window".into(),
                        message: "required when rate_limit_count is set".into(),
                    });
                }
                Ok(())
            }
            ChannelForm::Widget(w) => match &w.primary_color {
                Some(color) if !is_hex_color(color) => Err(ValidationError::InvalidColor(color.clone())),
                _ => Ok(()),
            },
        }
    }

    fn to_payload(&self) -> SettingsPayload {
        match self {
            ChannelForm::Telegram(t) => SettingsPayload::Telegram(TelegramPayload {
                bot_token: t.bot_token.reveal(),
                allowed_users: t.allowed_users.clone(),
                blocked_users: t.blocked_users.clone(),
                admin_users: t.admin_users.clone(),
                welcome_message: t.welcome_message.clone(),
                unauthorized_message: t.unauthorized_message.clone(),
                error_message: t.error_message.clone(),
                typing_enabled: t.typing_enabled,
            }),
            ChannelForm::WhatsApp(w) => SettingsPayload::WhatsApp(WhatsAppPayload {
                access_token: w.access_token.reveal(),
                verify_token: w.verify_token.reveal(),
                app_secret: w.app_secret.reveal(),
                phone_number_id: w.phone_number_id.reveal(),
                waba_id: w.waba_id.clone(),
                webhook_port: w.webhook_port,
                allowed_phones: w.allowed_phones.clone(),
                blocked_phones: w.blocked_phones.clone(),
                rate_limit_count: w.rate_limit_count,
                rate_limit_window: w.rate_limit_window,
            }),
            ChannelForm::Widget(w) => SettingsPayload::Widget(WidgetPayload {
                title: w.title.clone(),
                greeting: w.greeting.clone(),
                placeholder: w.placeholder.clone(),
                primary_color: w.primary_color.clone(),
                position: w.position,
                allowed_domains: w.allowed_domains.clone(),
                tunnel_url: w.tunnel_url.clone(),
            }),
        }
    }
}

/// Editable state of one instance.
#[derive(Debug)]
pub struct InstanceForm {
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub auto_start: bool,
    pub ai: AiSettings,
    pub voice: VoiceSettings,
    pub channel: ChannelForm,
}

impl InstanceForm {
    /// Blank form for a new instance.
    pub fn new(kind: ChannelKind) -> Self {
        let channel = match kind {
            ChannelKind::Telegram => ChannelForm::Telegram(TelegramForm::default()),
            ChannelKind::WhatsApp => ChannelForm::WhatsApp(WhatsAppForm::default()),
            ChannelKind::Widget => ChannelForm::Widget(WidgetForm::default()),
        };

        Self {
            name: String::new(),
            description: None,
            enabled: true,
            auto_start: false,
            ai: AiSettings::default(),
            voice: VoiceSettings::default(),
            channel,
        }
    }

    /// Form prefilled from an existing instance. Secrets are never prefilled.
    pub fn edit(instance: &BotInstance) -> Self {
        let channel = match &instance.settings {
            ChannelSettings::Telegram(t) => ChannelForm::Telegram(TelegramForm {
                bot_token: SecretInput::Unchanged,
                allowed_users: t.allowed_users.clone(),
                blocked_users: t.blocked_users.clone(),
                admin_users: t.admin_users.clone(),
                welcome_message: t.welcome_message.clone(),
                unauthorized_message: t.unauthorized_message.clone(),
                error_message: t.error_message.clone(),
                typing_enabled: t.typing_enabled,
            }),
            ChannelSettings::WhatsApp(w) => ChannelForm::WhatsApp(WhatsAppForm {
                waba_id: w.waba_id.clone(),
                webhook_port: w.webhook_port,
                allowed_phones: w.allowed_phones.clone(),
                blocked_phones: w.blocked_phones.clone(),
                rate_limit_count: w.rate_limit_count,
                rate_limit_window: w.rate_limit_window,
                ..Default::default()
            }),
            ChannelSettings::Widget(w) => ChannelForm::Widget(WidgetForm {
                title: w.title.clone(),
                greeting: w.greeting.clone(),
                placeholder: w.placeholder.clone(),
                primary_color: w.primary_color.clone(),
                position: w.position,
                allowed_domains: w.allowed_domains.clone(),
                tunnel_url: w.tunnel_url.clone(),
            }),
        };

        Self {
            name: instance.name.clone(),
            description: instance.description.clone(),
            enabled: instance.enabled,
            auto_start: instance.auto_start,
            ai: instance.ai.clone(),
            voice: instance.voice.clone(),
            channel,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.channel.kind()
    }

    /// Set one field from operator input.
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        match field {
            "name" => self.name = value.to_string(),
            "description" => self.description = text(value),
            "enabled" => self.enabled = flag(field, value)?,
            "auto_start" => self.auto_start = flag(field, value)?,
            "llm_backend" => self.ai.llm_backend = text(value),
            "llm_persona" => self.ai.llm_persona = text(value),
            "system_prompt" => self.ai.system_prompt = text(value),
            "tts_enabled" => self.voice.tts_enabled = flag(field, value)?,
            "tts_engine" => self.voice.tts_engine = text(value),
            "tts_voice" => self.voice.tts_voice = text(value),
            "tts_preset" => self.voice.tts_preset = text(value),
            _ => return self.channel.set(field, value),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        self.channel.validate()
    }

    /// Validated request body.
    pub fn to_payload(&self) -> Result<InstancePayload, ValidationError> {
        self.validate()?;

        Ok(InstancePayload {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            enabled: self.enabled,
            auto_start: self.auto_start,
            ai: self.ai.clone(),
            voice: self.voice.clone(),
            settings: self.channel.to_payload(),
        })
    }
}

fn text(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn flag(field: &str, value: &str) -> Result<bool, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("expected true or false, got {}", value),
        }),
    }
}

fn number<T: FromStr>(field: &str, value: &str) -> Result<Option<T>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ValidationError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn list(value: &str) -> Vec<String> {
    value
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn id_list(field: &str, value: &str) -> Result<Vec<i64>, ValidationError> {
    value
        .split([',', ';', '\n', ' '])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse().map_err(|_| ValidationError::InvalidNumber {
                field: field.to_string(),
                value: item.to_string(),
            })
        })
        .collect()
}

fn is_hex_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
