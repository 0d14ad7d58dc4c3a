//! Long-running backend jobs: model scan, model download, fine-tune training.

use crate::error::{to_query_error, CoreResult};
use crate::keys;
use crate::messages::{Locale, Text};
use crate::notify::{Notifier, Toast, ToastLevel};
use query_cache::{PollHandle, QueryCache, RefetchInterval};
use secretary_client::{ClientError, OperationStatus, SecretaryClient};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ModelScan,
    ModelDownload,
    Training,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ModelScan => "scan",
            Operation::ModelDownload => "download",
            Operation::Training => "training",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scan" => Ok(Operation::ModelScan),
            "download" => Ok(Operation::ModelDownload),
            "training" | "train" | "finetune" => Ok(Operation::Training),
            other => Err(format!("unknown operation: {}", other)),
        }
    }
}

async fn fetch_status(client: &SecretaryClient, operation: Operation) -> Result<OperationStatus, ClientError> {
    match operation {
        Operation::ModelScan => client.models().scan_status().await,
        Operation::ModelDownload => client.models().download_status().await,
        Operation::Training => client.finetune().training_status().await,
    }
}

/// Starts jobs and follows their progress until the backend reports idle.
#[derive(Clone)]
pub struct OperationWatcher {
    client: SecretaryClient,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    locale: Locale,
    interval: Duration,
}

impl OperationWatcher {
    pub fn new(
        client: SecretaryClient,
        cache: QueryCache,
        notifier: Arc<dyn Notifier>,
        locale: Locale,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            notifier,
            locale,
            interval,
        }
    }

    fn toast(&self, level: ToastLevel, text: Text<'_>) {
        self.notifier.notify(Toast::new(level, self.locale.render(text)));
    }

    /// Send a job mutation, marking the job status stale on success.
    async fn mutate<T>(
        &self,
        operation: Operation,
        request: impl Future<Output = Result<T, ClientError>>,
        done: Text<'_>,
    ) -> CoreResult<T> {
        match self
            .cache
            .mutate(request, &[keys::operation(operation.as_str())])
            .await
        {
            Ok(value) => {
                self.toast(ToastLevel::Success, done);
                Ok(value)
            }
            Err(e) => {
                let error = to_query_error(e);
                self.toast(ToastLevel::Error, Text::JobFailed(operation, &error.message));
                Err(error.into())
            }
        }
    }

    /// Current status, bypassing the cache.
    pub async fn status(&self, operation: Operation) -> CoreResult<OperationStatus> {
        let client = self.client.clone();
        let snapshot = self
            .cache
            .refetch(&keys::operation(operation.as_str()), move || async move {
                fetch_status(&client, operation).await.map_err(to_query_error)
            })
            .await;
        Ok(snapshot.into_result()?)
    }

    /// Poll `operation` every interval while it is active; stops by itself
    /// once the backend reports it idle.
    pub fn watch(&self, operation: Operation) -> PollHandle<OperationStatus> {
        let client = self.client.clone();
        let interval = self.interval;

        self.cache.poll(
            keys::operation(operation.as_str()),
            RefetchInterval::conditional(move |status: Option<&OperationStatus>| {
                status.filter(|s| s.is_active()).map(|_| interval)
            }),
            move || {
                let client = client.clone();
                async move { fetch_status(&client, operation).await.map_err(to_query_error) }
            },
        )
    }

    pub async fn start_scan(&self) -> CoreResult<PollHandle<OperationStatus>> {
        let operation = Operation::ModelScan;
        self.mutate(operation, self.client.models().start_scan(), Text::JobStarted(operation))
            .await?;
        info!("Model scan started");
        Ok(self.watch(operation))
    }

    pub async fn start_download(&self, repo_id: &str) -> CoreResult<PollHandle<OperationStatus>> {
        let operation = Operation::ModelDownload;
        self.mutate(operation, self.client.models().download(repo_id), Text::JobStarted(operation))
            .await?;
        info!("Download of {} started", repo_id);
        Ok(self.watch(operation))
    }

    /// Start training with the stored configuration, or `config` if given.
    pub async fn start_training(&self, config: Option<serde_json::Value>) -> CoreResult<PollHandle<OperationStatus>> {
        let operation = Operation::Training;
        let finetune = self.client.finetune();
        let request = async move {
            let config = match config {
                Some(config) => config,
                None => finetune.config().await?.unwrap_or_else(|| serde_json::json!({})),
            };
            finetune.start_training(&config).await
        };

        self.mutate(operation, request, Text::JobStarted(operation)).await?;
        Ok(self.watch(operation))
    }

    pub async fn stop_training(&self) -> CoreResult<()> {
        let operation = Operation::Training;
        self.mutate(operation, self.client.finetune().stop_training(), Text::JobStopped(operation))
            .await
    }
}

/// One-line progress summary, e.g. `running 42% (step 17/40) saving checkpoint`.
pub fn describe(status: &OperationStatus) -> String {
    let mut line = String::from(if status.is_active() { "running" } else { "idle" });

    if let Some(progress) = status.progress {
        line.push_str(&format!(" {:.0}%", progress));
    }
    match (status.current_step, status.total_steps) {
        (Some(current), Some(total)) => line.push_str(&format!(" (step {}/{})", current, total)),
        (Some(current), None) => line.push_str(&format!(" (step {})", current)),
        _ => {}
    }
    if let Some(message) = &status.message {
        line.push(' ');
        line.push_str(message);
    }
    if let Some(error) = &status.error {
        line.push_str(&format!(" [error: {}]", error));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use query_cache::CacheConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Reports the scan as running for the first `active` requests.
    struct ScanProgress {
        calls: Arc<AtomicUsize>,
        active: usize,
    }

    impl Respond for ScanProgress {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let running = n <= self.active;
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": { "is_running": running, "progress": if running { n * 25 } else { 100 } }
            }))
        }
    }

    fn test_watcher(server: &MockServer) -> (OperationWatcher, RecordingNotifier) {
        let client = SecretaryClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let notifier = RecordingNotifier::new();
        let watcher = OperationWatcher::new(
            client,
            QueryCache::new(CacheConfig::default()),
            Arc::new(notifier.clone()),
            Locale::En,
            Duration::from_millis(5),
        );
        (watcher, notifier)
    }

    #[tokio::test]
    async fn test_scan_watch_stops_when_idle() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));

        Mock::given(method("POST"))
            .and(path("/admin/models/scan"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/admin/models/scan/status"))
            .respond_with(ScanProgress {
                calls: calls.clone(),
                active: 2,
            })
            .mount(&server)
            .await;

        let (watcher, notifier) = test_watcher(&server);

        let mut handle = watcher.start_scan().await.unwrap();
        assert_eq!(notifier.last(), Some(Toast::success("Model scan started")));
        tokio::time::timeout(Duration::from_secs(5), handle.finished())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let status = handle.latest().unwrap().data.unwrap();
        assert!(!status.is_active());
        assert_eq!(describe(&status), "idle 100%");
    }

    #[tokio::test]
    async fn test_failed_scan_start_raises_error_toast() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/admin/models/scan"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({ "detail": "models dir missing" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/admin/models/scan/status"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (watcher, notifier) = test_watcher(&server);

        let error = watcher.start_scan().await.err().unwrap();
        assert_eq!(error.to_string(), "models dir missing");
        assert_eq!(
            notifier.toasts(),
            vec![Toast::error("Model scan failed: models dir missing")]
        );
    }

    #[tokio::test]
    async fn test_stop_training_toasts_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/admin/finetune/train/stop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let (watcher, notifier) = test_watcher(&server);

        watcher.stop_training().await.unwrap();
        assert_eq!(notifier.last(), Some(Toast::success("Training stopped")));
    }

    #[test]
    fn test_describe() {
        let status = OperationStatus {
            is_running: true,
            progress: Some(42.4),
            current_step: Some(17),
            total_steps: Some(40),
            message: Some("saving checkpoint".into()),
            ..Default::default()
        };
        assert_eq!(describe(&status), "running 42% (step 17/40) saving checkpoint");
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("train".parse::<Operation>(), Ok(Operation::Training));
        assert!("compile".parse::<Operation>().is_err());
    }
}
