//! Audit and usage log browsing.

use crate::error::{to_query_error, CoreError, CoreResult, ValidationError};
use crate::keys;
use crate::messages::{Locale, Text};
use crate::notify::{Notifier, Toast, ToastLevel};
use async_trait::async_trait;
use query_cache::QueryCache;
use secretary_client::{
    AuditApi, AuditEntry, CleanupResult, ClientError, ExportFormat, LogPage, LogQuery, UsageApi,
    UsageEntry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// A paginated, append-only log on the backend.
#[async_trait]
pub trait LogSource: Send + Sync + 'static {
    type Entry: Clone + Send + Sync + 'static;

    /// Short name used in cache keys and export file names.
    fn name(&self) -> &'static str;

    async fn page(&self, query: &LogQuery) -> Result<LogPage<Self::Entry>, ClientError>;

    async fn export(&self, format: ExportFormat) -> Result<Vec<u8>, ClientError>;

    async fn cleanup(&self, days: u32) -> Result<CleanupResult, ClientError>;
}

#[async_trait]
impl LogSource for AuditApi {
    type Entry = AuditEntry;

    fn name(&self) -> &'static str {
        "audit"
    }

    async fn page(&self, query: &LogQuery) -> Result<LogPage<AuditEntry>, ClientError> {
        self.logs(query).await
    }

    async fn export(&self, format: ExportFormat) -> Result<Vec<u8>, ClientError> {
        AuditApi::export(self, format).await
    }

    async fn cleanup(&self, days: u32) -> Result<CleanupResult, ClientError> {
        AuditApi::cleanup(self, days).await
    }
}

#[async_trait]
impl LogSource for UsageApi {
    type Entry = UsageEntry;

    fn name(&self) -> &'static str {
        "usage"
    }

    async fn page(&self, query: &LogQuery) -> Result<LogPage<UsageEntry>, ClientError> {
        self.logs(query).await
    }

    async fn export(&self, format: ExportFormat) -> Result<Vec<u8>, ClientError> {
        UsageApi::export(self, format).await
    }

    async fn cleanup(&self, days: u32) -> Result<CleanupResult, ClientError> {
        UsageApi::cleanup(self, days).await
    }
}

/// Filter and pagination state over one log source.
pub struct LogBrowser<S: LogSource> {
    source: Arc<S>,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    locale: Locale,
    filters: LogQuery,
    page: u32,
    page_size: u32,
    total: u64,
}

impl<S: LogSource> LogBrowser<S> {
    pub fn new(source: S, cache: QueryCache, notifier: Arc<dyn Notifier>, locale: Locale) -> Self {
        Self {
            source: Arc::new(source),
            cache,
            notifier,
            locale,
            filters: LogQuery::default(),
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            total: 0,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn name(&self) -> &'static str {
        self.source.name()
    }

    /// Zero-based current page.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Total entries matching the filters, as of the last load.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page_count(&self) -> u32 {
        let pages = self.total.div_ceil(self.page_size as u64).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn filters(&self) -> &LogQuery {
        &self.filters
    }

    /// Set or clear (`None`/blank) a filter. Changing filters returns to the first page.
    pub fn set_filter(&mut self, name: &str, value: Option<&str>) -> Result<(), ValidationError> {
        let value = value.map(str::trim).filter(|v| !v.is_empty()).map(String::from);
        let slot = match name {
            "action" => &mut self.filters.action,
            "resource" => &mut self.filters.resource,
            "user" => &mut self.filters.user,
            "backend" => &mut self.filters.backend,
            "from" => &mut self.filters.from,
            "to" => &mut self.filters.to,
            other => return Err(ValidationError::UnknownField(other.to_string())),
        };
        *slot = value;
        self.page = 0;
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.filters = LogQuery::default();
        self.page = 0;
    }

    /// Jump to a page, clamped to the known range.
    pub fn go_to(&mut self, page: u32) {
        self.page = page.min(self.page_count() - 1);
    }

    pub fn next_page(&mut self) -> bool {
        if self.page + 1 < self.page_count() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    fn query(&self) -> LogQuery {
        LogQuery {
            limit: self.page_size,
            offset: self.page.saturating_mul(self.page_size),
            ..self.filters.clone()
        }
    }

    /// Entries of the current page.
    pub async fn load(&mut self) -> CoreResult<Vec<S::Entry>> {
        let query = self.query();
        let source = self.source.clone();
        let request = query.clone();

        let page = self
            .cache
            .fetch(&keys::logs(self.name(), Some(&query)), move || async move {
                source.page(&request).await.map_err(to_query_error)
            })
            .await
            .into_result()?;

        self.total = page.total;
        Ok(page.logs)
    }

    /// Delete entries older than `days`. Zero is rejected before any request.
    pub async fn cleanup(&mut self, days: u32) -> CoreResult<u64> {
        if days < 1 {
            return Err(ValidationError::RetentionDays.into());
        }

        let result = self
            .cache
            .mutate(self.source.cleanup(days), &[keys::logs(self.name(), None)])
            .await;

        match result {
            Ok(result) => {
                debug!(source = self.name(), deleted = result.deleted, "Log cleanup finished");
                self.toast(ToastLevel::Success, Text::LogsCleaned(result.deleted));
                self.page = 0;
                Ok(result.deleted)
            }
            Err(e) => {
                let error = to_query_error(e);
                self.toast(ToastLevel::Error, Text::CleanupFailed(&error.message));
                Err(error.into())
            }
        }
    }

    /// Save an export into `dir`, returning the file path.
    pub async fn export(&self, format: ExportFormat, dir: &Path) -> CoreResult<PathBuf> {
        let bytes = match self.source.export(format).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = to_query_error(e);
                self.toast(ToastLevel::Error, Text::ExportFailed(&error.message));
                return Err(error.into());
            }
        };

        let file_name = format!(
            "{}_logs_{}.{}",
            self.name(),
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            format.extension()
        );
        let path = dir.join(file_name);

        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            self.toast(ToastLevel::Error, Text::ExportFailed(&e.to_string()));
            return Err(CoreError::Io(e));
        }

        self.toast(ToastLevel::Success, Text::Exported(format, &path.display().to_string()));
        Ok(path)
    }

    fn toast(&self, level: ToastLevel, text: Text<'_>) {
        self.notifier.notify(Toast::new(level, self.locale.render(text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use query_cache::CacheConfig;
    use secretary_client::SecretaryClient;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn browser(server: &MockServer) -> (LogBrowser<AuditApi>, RecordingNotifier) {
        let client = SecretaryClient::new(server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_token("test-token");
        let notifier = RecordingNotifier::new();
        let browser = LogBrowser::new(
            client.audit(),
            QueryCache::new(CacheConfig::default()),
            Arc::new(notifier.clone()),
            Locale::En,
        )
        .with_page_size(20);
        (browser, notifier)
    }

    fn audit_page(total: u64) -> serde_json::Value {
        serde_json::json!({
            "logs": [{
                "id": "a1",
                "timestamp": "2024-05-01T10:00:00Z",
                "action": "update",
                "resource": "widget_instance"
            }],
            "total": total
        })
    }

    #[tokio::test]
    async fn test_pagination_follows_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/audit/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(audit_page(45)))
            .mount(&server)
            .await;

        let (mut browser, _) = browser(&server);
        assert_eq!(browser.page_count(), 1);

        let entries = browser.load().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(browser.total(), 45);
        assert_eq!(browser.page_count(), 3);

        assert!(browser.next_page());
        assert!(browser.next_page());
        assert!(!browser.next_page());
        assert_eq!(browser.page(), 2);

        browser.go_to(10);
        assert_eq!(browser.page(), 2);
    }

    #[tokio::test]
    async fn test_filters_reach_query_and_reset_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/audit/logs"))
            .and(query_param("action", "delete"))
            .and(query_param("offset", "0"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(audit_page(1)))
            .expect(1)
            .mount(&server)
            .await;

        let (mut browser, _) = browser(&server);
        browser.set_filter("action", Some("delete")).unwrap();
        assert!(browser.set_filter("severity", Some("high")).is_err());

        browser.load().await.unwrap();
        assert_eq!(browser.filters().action.as_deref(), Some("delete"));
    }

    #[tokio::test]
    async fn test_cleanup_requires_one_day() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/audit/cleanup"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (mut browser, notifier) = browser(&server);
        assert!(matches!(
            browser.cleanup(0).await,
            Err(CoreError::Validation(ValidationError::RetentionDays))
        ));
        assert!(notifier.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_invalidates_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/audit/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(audit_page(1)))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/admin/audit/cleanup"))
            .and(query_param("days", "30"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "deleted_count": 12 })))
            .expect(1)
            .mount(&server)
            .await;

        let (mut browser, notifier) = browser(&server);
        browser.load().await.unwrap();
        browser.load().await.unwrap();

        assert_eq!(browser.cleanup(30).await.unwrap(), 12);
        assert_eq!(notifier.last(), Some(Toast::success("Removed 12 log entries")));

        browser.load().await.unwrap();
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/audit/export"))
            .and(query_param("format", "csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("id,action\na1,update\n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (browser, notifier) = browser(&server);

        let path = tokio_test::assert_ok!(browser.export(ExportFormat::Csv, dir.path()).await);
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("audit_logs_"));
        assert_eq!(path.extension().unwrap(), "csv");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,action\na1,update\n");
        assert_eq!(notifier.last().unwrap().level, ToastLevel::Success);
    }
}
