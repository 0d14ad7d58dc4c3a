//! Background jobs and live streams: watch, tail, gpu.

use crate::commands::{CommandHandler, CommandLine};
use crate::context::Console;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use console_core::operations::describe;
use console_core::{Operation, StreamConsumer};
use query_cache::PollHandle;
use secretary_client::{GpuMetrics, InstanceStatus};
use std::fmt::Write;
use std::sync::Arc;
use tracing::info;

const DEFAULT_TAIL_LINES: usize = 20;

pub struct JobsHandler {
    console: Arc<Console>,
}

impl JobsHandler {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }

    fn consumer(&self, subscription: secretary_client::Subscription) -> StreamConsumer {
        let limits = &self.console.stream;
        StreamConsumer::with_limits(subscription, limits.capacity, limits.trim_to)
    }

    async fn watch(&self, command: &CommandLine) -> AppResult<String> {
        let usage = "watch <scan|download|training|status> [start|stop] [repo=<id>]";
        let target = command.arg(0).ok_or_else(|| AppError::usage(usage))?;

        if target == "status" {
            let id = self.console.target(command.arg(1))?;
            let handle = self.console.current().watch_status(&id);
            return Ok(follow(handle, status_line).await);
        }

        let operation: Operation = target.parse().map_err(|e: String| AppError::usage(e))?;
        let operations = &self.console.operations;

        let handle = match (command.arg(1), operation) {
            (None, _) => operations.watch(operation),
            (Some("start"), Operation::ModelScan) => operations.start_scan().await?,
            (Some("start"), Operation::ModelDownload) => {
                let repo = command
                    .option("repo")
                    .ok_or_else(|| AppError::usage("watch download start repo=<id>"))?;
                operations.start_download(repo).await?
            }
            (Some("start"), Operation::Training) => operations.start_training(None).await?,
            (Some("stop"), Operation::Training) => {
                operations.stop_training().await?;
                let status = operations.status(Operation::Training).await?;
                return Ok(describe(&status));
            }
            _ => return Err(AppError::usage(usage)),
        };

        Ok(follow(handle, describe).await)
    }

    async fn tail(&self, command: &CommandLine) -> AppResult<String> {
        let wanted = command.number("lines", DEFAULT_TAIL_LINES)?;
        let subscription = self.console.client.finetune().tail_log().await?;
        let mut consumer = self.consumer(subscription);

        while consumer.lines().len() < wanted {
            if consumer.next().await.is_none() || consumer.error().is_some() {
                break;
            }
        }
        consumer.close();

        let skip = consumer.lines().len().saturating_sub(wanted);
        let mut lines: Vec<&str> = consumer.lines().iter().skip(skip).map(String::as_str).collect();
        if let Some(error) = consumer.error() {
            lines.push(error);
        }
        if lines.is_empty() {
            return Ok("No training output".into());
        }
        Ok(lines.join("\n"))
    }

    async fn gpu(&self, command: &CommandLine) -> AppResult<String> {
        let Some(wanted) = command.option("samples") else {
            let metrics = self.console.client.monitor().gpu().await?;
            return Ok(render_gpu(&metrics));
        };
        let wanted: usize = wanted
            .parse()
            .map_err(|_| AppError::usage("gpu [samples=<N>]"))?;

        let subscription = self.console.client.monitor().gpu_stream().await?;
        let mut consumer = self.consumer(subscription);
        while consumer.samples().len() < wanted {
            if consumer.next().await.is_none() || consumer.error().is_some() {
                break;
            }
        }
        consumer.close();

        if let Some(error) = consumer.error() {
            return Err(AppError::Query(query_cache::QueryError::message(error)));
        }
        match consumer.samples().last() {
            Some(last) => Ok(format!(
                "{}\n({} samples)",
                render_gpu(last),
                consumer.samples().len()
            )),
            None => Ok("No GPU samples received".into()),
        }
    }
}

/// Collect distinct progress lines until the poller stops.
async fn follow<T: Clone>(mut handle: PollHandle<T>, render: fn(&T) -> String) -> String {
    let mut lines: Vec<String> = Vec::new();

    while let Some(snapshot) = handle.changed().await {
        let line = match (&snapshot.data, &snapshot.error) {
            (_, Some(error)) => format!("error: {}", error),
            (Some(data), None) => render(data),
            (None, None) => continue,
        };
        if lines.last() != Some(&line) {
            info!("{}", line);
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn status_line(status: &InstanceStatus) -> String {
    let mut line = String::from(if status.running { "running" } else { "stopped" });
    if let Some(pid) = status.pid {
        let _ = write!(line, " pid {}", pid);
    }
    if let Some(error) = &status.last_error {
        let _ = write!(line, " ({})", error);
    }
    line
}

fn render_gpu(metrics: &GpuMetrics) -> String {
    if metrics.gpus.is_empty() {
        return "No GPUs reported".into();
    }
    metrics
        .gpus
        .iter()
        .map(|gpu| {
            let mut line = format!(
                "#{} {:<24} {:>5.1}%  {}/{} MiB",
                gpu.index, gpu.name, gpu.utilization, gpu.memory_used, gpu.memory_total
            );
            if let Some(temperature) = gpu.temperature {
                let _ = write!(line, "  {:.0}°C", temperature);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl CommandHandler for JobsHandler {
    fn name(&self) -> &str {
        "jobs"
    }

    fn triggers(&self) -> &[&str] {
        &["watch", "tail", "gpu"]
    }

    async fn execute(&self, command: &CommandLine) -> AppResult<String> {
        match command.name.as_str() {
            "watch" => self.watch(command).await,
            "tail" => self.tail(command).await,
            _ => self.gpu(command).await,
        }
    }
}
