//! Shared state behind every console command.

use crate::config::{Config, StreamConfig};
use crate::error::{AppError, AppResult};
use crate::token::TokenStore;
use anyhow::Context;
use console_core::{
    keys, InstanceManager, LogBrowser, Locale, Notifier, OperationWatcher, RecordingNotifier,
    SettingsManager, Toast,
};
use query_cache::QueryCache;
use secretary_client::{AuditApi, ChannelKind, SecretaryClient, UsageApi};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

/// Collects toasts so each command can print its notifications.
#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier {
    recorded: RecordingNotifier,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toasts raised since the last call.
    pub fn drain(&self) -> Vec<Toast> {
        self.recorded.drain()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, toast: Toast) {
        debug!(level = ?toast.level, "{}", toast.message);
        self.recorded.notify(toast);
    }
}

/// Client, cache and view-models for one console session.
pub struct Console {
    pub client: SecretaryClient,
    pub cache: QueryCache,
    pub notifier: ConsoleNotifier,
    pub locale: Locale,
    pub tokens: TokenStore,
    pub operations: OperationWatcher,
    pub settings: SettingsManager,
    pub audit: AsyncMutex<LogBrowser<AuditApi>>,
    pub usage: AsyncMutex<LogBrowser<UsageApi>>,
    pub stream: StreamConfig,
    pub export_dir: PathBuf,
    telegram: InstanceManager,
    whatsapp: InstanceManager,
    widget: InstanceManager,
    channel: Mutex<ChannelKind>,
}

impl Console {
    /// Build the session from configuration, restoring a saved token.
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let client = SecretaryClient::new(&config.api.base_url, config.api.timeout)
            .context("Failed to create admin API client")?;

        let tokens = TokenStore::new(&config.auth.token_path);
        let token = match &config.auth.token {
            Some(token) => Some(token.expose_secret().clone()),
            None => tokens
                .load()
                .await?
                .map(|token| token.expose_secret().clone()),
        };
        if token.is_some() {
            info!("Using stored admin token");
        }
        client.set_token(token);

        Ok(Self::new(client, tokens, config).await)
    }

    /// Build the session around an existing client.
    pub async fn new(client: SecretaryClient, tokens: TokenStore, config: &Config) -> Self {
        let cache = QueryCache::new(config.cache.clone());
        keys::register_dependencies(&cache).await;

        let notifier = ConsoleNotifier::new();
        let shared: Arc<dyn Notifier> = Arc::new(notifier.clone());
        let locale = config.console.locale;

        let manager = |kind: ChannelKind| {
            InstanceManager::new(
                Arc::new(client.instances(kind)),
                cache.clone(),
                shared.clone(),
                locale,
            )
            .with_status_interval(config.poll.status_interval)
        };
        let telegram = manager(ChannelKind::Telegram);
        let whatsapp = manager(ChannelKind::WhatsApp);
        let widget = manager(ChannelKind::Widget);

        let page_size = config.console.page_size;
        let audit = LogBrowser::new(client.audit(), cache.clone(), shared.clone(), locale)
            .with_page_size(page_size);
        let usage = LogBrowser::new(client.usage(), cache.clone(), shared.clone(), locale)
            .with_page_size(page_size);

        Self {
            operations: OperationWatcher::new(
                client.clone(),
                cache.clone(),
                shared.clone(),
                locale,
                config.poll.active_interval,
            ),
            settings: SettingsManager::new(client.clone(), cache.clone(), shared, locale),
            audit: AsyncMutex::new(audit),
            usage: AsyncMutex::new(usage),
            stream: config.stream.clone(),
            export_dir: config.console.export_dir.clone(),
            telegram,
            whatsapp,
            widget,
            channel: Mutex::new(ChannelKind::Telegram),
            client,
            cache,
            notifier,
            locale,
            tokens,
        }
    }

    pub fn manager(&self, kind: ChannelKind) -> &InstanceManager {
        match kind {
            ChannelKind::Telegram => &self.telegram,
            ChannelKind::WhatsApp => &self.whatsapp,
            ChannelKind::Widget => &self.widget,
        }
    }

    /// Channel instance commands act on when none is named.
    pub fn channel(&self) -> ChannelKind {
        *self.channel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_channel(&self, kind: ChannelKind) {
        *self.channel.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = kind;
    }

    /// Manager for the current channel.
    pub fn current(&self) -> &InstanceManager {
        self.manager(self.channel())
    }

    /// Instance id from the command, or the current selection.
    pub fn target(&self, id: Option<&str>) -> AppResult<String> {
        match id {
            Some(id) => Ok(id.to_string()),
            None => self
                .current()
                .selected()
                .ok_or(AppError::Core(console_core::CoreError::NoSelection)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn console() -> Console {
        let client = SecretaryClient::new("http://localhost:1", Duration::from_secs(1)).unwrap();
        let dir = std::env::temp_dir().join("secretary-console-context-test");
        Console::new(client, TokenStore::new(dir), &Config::default()).await
    }

    #[tokio::test]
    async fn test_managers_per_channel() {
        let console = console().await;
        for kind in ChannelKind::ALL {
            assert_eq!(console.manager(kind).channel(), kind);
        }
        assert_eq!(console.current().channel(), ChannelKind::Telegram);

        console.set_channel(ChannelKind::Widget);
        assert_eq!(console.current().channel(), ChannelKind::Widget);
    }

    #[tokio::test]
    async fn test_target_needs_selection() {
        let console = console().await;
        assert_eq!(console.target(Some("tg-1")).unwrap(), "tg-1");
        assert!(matches!(
            console.target(None),
            Err(AppError::Core(console_core::CoreError::NoSelection))
        ));
    }

    #[test]
    fn test_notifier_drains() {
        let notifier = ConsoleNotifier::new();
        notifier.notify(Toast::success("done"));
        assert_eq!(notifier.drain(), vec![Toast::success("done")]);
        assert!(notifier.drain().is_empty());
    }
}
