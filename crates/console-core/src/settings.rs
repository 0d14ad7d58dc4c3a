//! Assistant settings: LLM backend, personas, TTS presets and telephony status.

use crate::error::{to_query_error, CoreError, CoreResult};
use crate::keys;
use crate::messages::{Locale, Text};
use crate::notify::{Notifier, Toast, ToastLevel};
use query_cache::QueryCache;
use secretary_client::{ClientError, GsmStatus, LlmBackendInfo, Persona, SecretaryClient, TtsPreset};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SettingsManager {
    client: SecretaryClient,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    locale: Locale,
}

impl SettingsManager {
    pub fn new(client: SecretaryClient, cache: QueryCache, notifier: Arc<dyn Notifier>, locale: Locale) -> Self {
        Self {
            client,
            cache,
            notifier,
            locale,
        }
    }

    fn toast(&self, level: ToastLevel, text: Text<'_>) {
        self.notifier.notify(Toast::new(level, self.locale.render(text)));
    }

    fn failed(&self, error: ClientError) -> CoreError {
        let error = to_query_error(error);
        self.toast(ToastLevel::Error, Text::SettingsFailed(&error.message));
        error.into()
    }

    pub async fn backend(&self) -> CoreResult<LlmBackendInfo> {
        let llm = self.client.llm();
        let snapshot = self
            .cache
            .fetch(&keys::llm_backend(), move || async move {
                llm.backend().await.map_err(to_query_error)
            })
            .await;
        Ok(snapshot.into_result()?)
    }

    /// Switch the active backend. Personas depend on the backend, so both
    /// keys are marked stale.
    pub async fn set_backend(&self, backend: &str, model: Option<&str>) -> CoreResult<LlmBackendInfo> {
        let llm = self.client.llm();
        let result = self
            .cache
            .mutate(
                llm.set_backend(backend, model),
                &[keys::llm_backend(), keys::personas()],
            )
            .await;

        match result {
            Ok(info) => {
                self.toast(ToastLevel::Success, Text::BackendSwitched(&info.backend));
                Ok(info)
            }
            Err(e) => Err(self.failed(e)),
        }
    }

    pub async fn personas(&self) -> CoreResult<Vec<Persona>> {
        let llm = self.client.llm();
        let snapshot = self
            .cache
            .fetch(&keys::personas(), move || async move {
                llm.personas().await.map_err(to_query_error)
            })
            .await;
        Ok(snapshot.into_result()?)
    }

    pub async fn presets(&self) -> CoreResult<Vec<TtsPreset>> {
        let tts = self.client.tts();
        let snapshot = self
            .cache
            .fetch(&keys::tts_presets(), move || async move {
                tts.presets().await.map_err(to_query_error)
            })
            .await;
        Ok(snapshot.into_result()?)
    }

    pub async fn select_preset(&self, name: &str) -> CoreResult<()> {
        let tts = self.client.tts();
        match self.cache.mutate(tts.select_preset(name), &[keys::tts_presets()]).await {
            Ok(()) => {
                debug!(preset = name, "TTS preset selected");
                self.toast(ToastLevel::Success, Text::PresetSelected(name));
                Ok(())
            }
            Err(e) => Err(self.failed(e)),
        }
    }

    /// Telephony status is live, so it always refetches.
    pub async fn gsm(&self) -> CoreResult<GsmStatus> {
        let gsm = self.client.gsm();
        let snapshot = self
            .cache
            .refetch(&keys::gsm_status(), move || async move {
                gsm.status().await.map_err(to_query_error)
            })
            .await;
        Ok(snapshot.into_result()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use query_cache::CacheConfig;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings(server: &MockServer) -> (SettingsManager, RecordingNotifier) {
        let client = SecretaryClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let notifier = RecordingNotifier::new();
        let settings = SettingsManager::new(
            client,
            QueryCache::new(CacheConfig::default()),
            Arc::new(notifier.clone()),
            Locale::En,
        );
        (settings, notifier)
    }

    #[tokio::test]
    async fn test_failed_backend_switch_raises_error_toast() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/llm/backend"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "backend": "vllm" })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/admin/llm/backend"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(serde_json::json!({ "detail": "vLLM is not reachable" })),
            )
            .mount(&server)
            .await;

        let (settings, notifier) = test_settings(&server);
        assert_eq!(settings.backend().await.unwrap().backend, "vllm");

        assert!(settings.set_backend("gemini", None).await.is_err());
        assert_eq!(
            notifier.toasts(),
            vec![Toast::error("Failed to apply settings: vLLM is not reachable")]
        );

        // The failed switch left the cached backend fresh.
        assert_eq!(settings.backend().await.unwrap().backend, "vllm");
    }

    #[tokio::test]
    async fn test_selecting_preset_refreshes_presets() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/tts/presets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "presets": [{ "name": "calm" }, { "name": "bright" }]
            })))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/admin/tts/preset"))
            .and(query_param("name", "calm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let (settings, notifier) = test_settings(&server);

        assert_eq!(settings.presets().await.unwrap().len(), 2);
        settings.select_preset("calm").await.unwrap();
        assert_eq!(notifier.last(), Some(Toast::success("TTS preset \"calm\" selected")));
        assert_eq!(settings.presets().await.unwrap().len(), 2);
    }
}
