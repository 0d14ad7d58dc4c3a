//! Bot instances across Telegram, WhatsApp and the web widget.

mod access;
mod api;
mod detail;
mod form;
mod manager;
mod state;

pub use access::{admits, allows, domain_allowed, normalize_domain, normalize_phone, AccessSummary};
pub use api::InstanceApi;
pub use detail::InstanceDetail;
pub use form::{ChannelForm, InstanceForm, SecretInput, TelegramForm, WhatsAppForm, WidgetForm};
pub use manager::InstanceManager;
pub use state::{BadgeColor, InstanceAction, InstanceState, StatusBadge, TransitionError};
