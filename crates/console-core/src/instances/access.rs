//! Who may talk to an instance.
//!
//! Block-lists always win. An empty allow-list admits everyone.

use crate::error::ValidationError;
use secretary_client::ChannelSettings;

/// Allow/block check over one identity list pair.
pub fn allows<T: PartialEq>(allowed: &[T], blocked: &[T], identity: &T) -> bool {
    !blocked.contains(identity) && (allowed.is_empty() || allowed.contains(identity))
}

/// Digits only, so `+7 (912) 000-11-22` and `79120001122` compare equal.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Host part of a domain entry or origin: lowercase, no scheme, port, path
/// or trailing dot.
pub fn normalize_domain(input: &str) -> String {
    let trimmed = input.trim().to_ascii_lowercase();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed.as_str());
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = host.rsplit_once('@').map(|(_, h)| h).unwrap_or(host);
    let host = host.split(':').next().unwrap_or_default();
    host.trim_end_matches('.').to_string()
}

/// Whether a page at `origin` may embed a widget restricted to `allowed`.
///
/// Entries match the exact host and its subdomains.
pub fn domain_allowed(allowed: &[String], origin: &str) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let host = normalize_domain(origin);
    if host.is_empty() {
        return false;
    }

    allowed.iter().map(|d| normalize_domain(d)).any(|domain| {
        !domain.is_empty() && (host == domain || host.ends_with(&format!(".{}", domain)))
    })
}

/// Counts shown in the detail view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessSummary {
    pub allowed: usize,
    pub blocked: usize,
    pub admins: usize,
    pub domains: usize,
}

impl AccessSummary {
    pub fn of(settings: &ChannelSettings) -> Self {
        match settings {
            ChannelSettings::Telegram(t) => Self {
                allowed: t.allowed_users.len(),
                blocked: t.blocked_users.len(),
                admins: t.admin_users.len(),
                domains: 0,
            },
            ChannelSettings::WhatsApp(w) => Self {
                allowed: w.allowed_phones.len(),
                blocked: w.blocked_phones.len(),
                ..Default::default()
            },
            ChannelSettings::Widget(w) => Self {
                domains: w.allowed_domains.len(),
                ..Default::default()
            },
        }
    }

    /// Nobody is filtered out by an allow-list.
    pub fn is_open(&self, settings: &ChannelSettings) -> bool {
        match settings {
            ChannelSettings::Widget(_) => self.domains == 0,
            _ => self.allowed == 0,
        }
    }
}

/// Check an external identity against an instance's lists.
///
/// The identity is a Telegram user id, a phone number or a page origin
/// depending on the channel.
pub fn admits(settings: &ChannelSettings, identity: &str) -> Result<bool, ValidationError> {
    match settings {
        ChannelSettings::Telegram(t) => {
            let user: i64 = identity
                .trim()
                .parse()
                .map_err(|_| ValidationError::InvalidNumber {
                    field: "user".into(),
                    value: identity.to_string(),
                })?;
            Ok(allows(&t.allowed_users, &t.blocked_users, &user))
        }
        ChannelSettings::WhatsApp(w) => {
            let phone = normalize_phone(identity);
            if phone.is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "phone".into(),
                    message: format!("{} has no digits", identity),
                });
            }
            let allowed: Vec<String> = w.allowed_phones.iter().map(|p| normalize_phone(p)).collect();
            let blocked: Vec<String> = w.blocked_phones.iter().map(|p| normalize_phone(p)).collect();
            Ok(allows(&allowed, &blocked, &phone))
        }
        ChannelSettings::Widget(w) => Ok(domain_allowed(&w.allowed_domains, identity)),
    }
}
