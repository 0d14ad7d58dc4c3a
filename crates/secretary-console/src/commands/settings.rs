//! LLM backend, personas, TTS presets and telephony status.

use crate::commands::{CommandHandler, CommandLine};
use crate::context::Console;
use crate::error::AppResult;
use async_trait::async_trait;
use secretary_client::{GsmStatus, LlmBackendInfo};
use std::fmt::Write;
use std::sync::Arc;

pub struct SettingsHandler {
    console: Arc<Console>,
}

impl SettingsHandler {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }

    async fn backend(&self, command: &CommandLine) -> AppResult<String> {
        let settings = &self.console.settings;
        let info = match command.arg(0) {
            Some(backend) => settings.set_backend(backend, command.option("model")).await?,
            None => settings.backend().await?,
        };
        Ok(render_backend(&info))
    }

    async fn personas(&self) -> AppResult<String> {
        let personas = self.console.settings.personas().await?;
        if personas.is_empty() {
            return Ok("No personas configured".into());
        }
        Ok(personas
            .iter()
            .map(|p| match &p.description {
                Some(description) => format!("{:<12} {} - {}", p.id, p.name, description),
                None => format!("{:<12} {}", p.id, p.name),
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn presets(&self, command: &CommandLine) -> AppResult<String> {
        let settings = &self.console.settings;
        if let Some(name) = command.arg(0) {
            settings.select_preset(name).await?;
            return Ok(format!("TTS preset: {}", name));
        }

        let presets = settings.presets().await?;
        if presets.is_empty() {
            return Ok("No TTS presets".into());
        }
        Ok(presets
            .iter()
            .map(|p| {
                format!(
                    "{:<16} {:<10} {}",
                    p.name,
                    p.engine.as_deref().unwrap_or("-"),
                    p.voice.as_deref().unwrap_or("-")
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn gsm(&self) -> AppResult<String> {
        let status = self.console.settings.gsm().await?;
        Ok(render_gsm(&status))
    }
}

fn render_backend(info: &LlmBackendInfo) -> String {
    let mut out = format!("Backend: {}", info.backend);
    if let Some(model) = &info.model {
        let _ = write!(out, "\nModel: {}", model);
    }
    if !info.available_backends.is_empty() {
        let _ = write!(out, "\nAvailable: {}", info.available_backends.join(", "));
    }
    out
}

fn render_gsm(status: &GsmStatus) -> String {
    let mut out = format!("State: {}", status.state);
    if let Some(operator) = &status.operator {
        let _ = write!(out, "\nOperator: {}", operator);
    }
    if let Some(signal) = status.signal_strength {
        let _ = write!(out, "\nSignal: {}/31", signal);
    }
    if let Some(call) = &status.active_call {
        let _ = write!(
            out,
            "\nCall: {} {}",
            call.direction.as_deref().unwrap_or("active"),
            call.number
        );
        if let Some(duration) = call.duration_secs {
            let _ = write!(out, " ({}s)", duration);
        }
    }
    out
}

#[async_trait]
impl CommandHandler for SettingsHandler {
    fn name(&self) -> &str {
        "settings"
    }

    fn triggers(&self) -> &[&str] {
        &["backend", "personas", "presets", "gsm"]
    }

    async fn execute(&self, command: &CommandLine) -> AppResult<String> {
        match command.name.as_str() {
            "backend" => self.backend(command).await,
            "personas" => self.personas().await,
            "presets" => self.presets(command).await,
            _ => self.gsm().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretary_client::GsmCall;

    #[test]
    fn test_render_gsm_call() {
        let status = GsmStatus {
            state: "in_call".into(),
            signal_strength: Some(18),
            operator: None,
            active_call: Some(GsmCall {
                number: "+79001234567".into(),
                direction: Some("incoming".into()),
                duration_secs: Some(42),
            }),
        };
        assert_eq!(
            render_gsm(&status),
            "State: in_call\nSignal: 18/31\nCall: incoming +79001234567 (42s)"
        );
    }

    #[test]
    fn test_render_backend() {
        let info = LlmBackendInfo {
            backend: "vllm".into(),
            model: Some("qwen2.5-7b".into()),
            available_backends: vec!["vllm".into(), "gemini".into()],
        };
        assert_eq!(
            render_backend(&info),
            "Backend: vllm\nModel: qwen2.5-7b\nAvailable: vllm, gemini"
        );
    }
}
