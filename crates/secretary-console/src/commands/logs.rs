//! Audit and usage logs: browse, clean up, export.

use crate::commands::{CommandHandler, CommandLine};
use crate::context::Console;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use console_core::error::to_query_error;
use console_core::{keys, LogBrowser, LogSource};
use secretary_client::{AuditEntry, ExportFormat, UsageEntry, UsageStats};
use std::fmt::Write;
use std::sync::Arc;

const FILTERS: [&str; 6] = ["action", "resource", "user", "backend", "from", "to"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Audit,
    Usage,
}

impl Source {
    fn parse(command: &CommandLine) -> AppResult<Self> {
        match command.arg(0) {
            Some("audit") => Ok(Source::Audit),
            Some("usage") => Ok(Source::Usage),
            _ => Err(AppError::usage(format!("{} <audit|usage> ...", command.name))),
        }
    }
}

pub struct LogsHandler {
    console: Arc<Console>,
}

impl LogsHandler {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }

    async fn logs(&self, command: &CommandLine) -> AppResult<String> {
        match Source::parse(command)? {
            Source::Audit => browse(&mut *self.console.audit.lock().await, command, audit_line).await,
            Source::Usage if command.arg(1) == Some("stats") => self.stats().await,
            Source::Usage => browse(&mut *self.console.usage.lock().await, command, usage_line).await,
        }
    }

    async fn stats(&self) -> AppResult<String> {
        let usage = self.console.client.usage();
        let stats: UsageStats = self
            .console
            .cache
            .fetch(&keys::usage_stats(), move || async move {
                usage.stats().await.map_err(to_query_error)
            })
            .await
            .into_result()?;

        let mut out = format!(
            "Requests: {}\nTokens: {}",
            stats.total_requests, stats.total_tokens
        );
        let mut backends: Vec<_> = stats.by_backend.into_iter().collect();
        backends.sort();
        for (backend, count) in backends {
            let _ = write!(out, "\n  {:<16} {}", backend, count);
        }
        Ok(out)
    }

    async fn cleanup(&self, command: &CommandLine) -> AppResult<String> {
        let source = Source::parse(command)?;
        let days: u32 = match command.option("days").or(command.arg(1)) {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::usage("cleanup <audit|usage> days=<N>"))?,
            None => return Err(AppError::usage("cleanup <audit|usage> days=<N>")),
        };

        let deleted = match source {
            Source::Audit => self.console.audit.lock().await.cleanup(days).await?,
            Source::Usage => self.console.usage.lock().await.cleanup(days).await?,
        };
        Ok(format!("{} entries older than {} days removed", deleted, days))
    }

    async fn export(&self, command: &CommandLine) -> AppResult<String> {
        let source = Source::parse(command)?;
        let format: ExportFormat = command
            .arg(1)
            .or(command.option("format"))
            .unwrap_or("json")
            .parse()
            .map_err(|e: String| AppError::usage(e))?;

        let dir = &self.console.export_dir;
        let path = match source {
            Source::Audit => self.console.audit.lock().await.export(format, dir).await?,
            Source::Usage => self.console.usage.lock().await.export(format, dir).await?,
        };
        Ok(path.display().to_string())
    }
}

async fn browse<S: LogSource>(
    browser: &mut LogBrowser<S>,
    command: &CommandLine,
    render: fn(&S::Entry) -> String,
) -> AppResult<String> {
    let mut notice = None;

    if command.args.iter().any(|a| a == "clear") {
        browser.clear_filters();
    }
    for name in FILTERS {
        if let Some(value) = command.option(name) {
            browser.set_filter(name, Some(value))?;
        }
    }

    if let Some(page) = command.option("page") {
        let page: u32 = page
            .parse()
            .map_err(|_| AppError::usage("page=<number>"))?;
        if browser.total() == 0 {
            browser.load().await?;
        }
        browser.go_to(page.saturating_sub(1));
    }

    match command.arg(1) {
        Some("next") if !browser.next_page() => notice = Some("Already on the last page"),
        Some("prev") if !browser.prev_page() => notice = Some("Already on the first page"),
        _ => {}
    }

    let entries = browser.load().await?;

    let mut out = format!(
        "{} logs, page {}/{} ({} total)",
        browser.name(),
        browser.page() + 1,
        browser.page_count(),
        browser.total()
    );
    if let Some(notice) = notice {
        let _ = write!(out, "\n{}", notice);
    }
    for entry in &entries {
        let _ = write!(out, "\n{}", render(entry));
    }
    Ok(out)
}

fn audit_line(entry: &AuditEntry) -> String {
    let target = match (&entry.resource, &entry.resource_id) {
        (Some(resource), Some(id)) => format!("{}/{}", resource, id),
        (Some(resource), None) => resource.clone(),
        _ => "-".into(),
    };
    format!(
        "{}  {:<10} {:<32} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.action,
        target,
        entry.user.as_deref().unwrap_or("-")
    )
}

fn usage_line(entry: &UsageEntry) -> String {
    format!(
        "{}  {:<12} {:<12} {:>7} tokens {:>6}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.backend.as_deref().unwrap_or("-"),
        entry.source.as_deref().unwrap_or("-"),
        entry.prompt_tokens + entry.completion_tokens,
        entry
            .latency_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "-".into())
    )
}

#[async_trait]
impl CommandHandler for LogsHandler {
    fn name(&self) -> &str {
        "logs"
    }

    fn triggers(&self) -> &[&str] {
        &["logs", "cleanup", "export"]
    }

    async fn execute(&self, command: &CommandLine) -> AppResult<String> {
        match command.name.as_str() {
            "cleanup" => self.cleanup(command).await,
            "export" => self.export(command).await,
            _ => self.logs(command).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_audit_line() {
        let entry = AuditEntry {
            id: "a1".into(),
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            action: "delete".into(),
            resource: Some("telegram_instance".into()),
            resource_id: Some("tg-1".into()),
            user: Some("admin".into()),
            details: None,
        };
        let line = audit_line(&entry);
        assert!(line.starts_with("2024-05-01 10:00:00  delete"));
        assert!(line.contains("telegram_instance/tg-1"));
        assert!(line.ends_with("admin"));
    }

    #[test]
    fn test_source_parse() {
        let command = CommandLine::parse("logs usage page=2").unwrap();
        assert_eq!(Source::parse(&command).unwrap(), Source::Usage);

        let command = CommandLine::parse("logs").unwrap();
        assert!(matches!(Source::parse(&command), Err(AppError::Usage(_))));
    }
}
