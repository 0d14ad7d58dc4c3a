//! Admin chat with the assistant.

use crate::commands::{CommandHandler, CommandLine};
use crate::context::Console;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use console_core::StreamConsumer;
use std::fmt::Write;
use std::sync::Arc;
use tracing::error;

const USAGE: &str = "chat sessions | chat new [title] | chat history <session> | chat <session> <message>";

pub struct ChatHandler {
    console: Arc<Console>,
}

impl ChatHandler {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }

    async fn sessions(&self) -> AppResult<String> {
        let sessions = self.console.client.chat().list_sessions().await?;
        if sessions.is_empty() {
            return Ok("No chat sessions".into());
        }

        let mut out = String::new();
        for session in sessions {
            let _ = writeln!(
                out,
                "{:<12} {:<32} {} messages",
                session.id,
                session.title.as_deref().unwrap_or("(untitled)"),
                session.message_count
            );
        }
        Ok(out.trim_end().to_string())
    }

    async fn history(&self, id: &str) -> AppResult<String> {
        let detail = self.console.client.chat().get_session(id).await?;
        let lines: Vec<String> = detail
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect();
        Ok(lines.join("\n"))
    }

    /// Stream a reply and return it once complete.
    async fn send(&self, id: &str, message: &str) -> AppResult<String> {
        let subscription = self.console.client.chat().stream_message(id, message).await?;
        let limits = &self.console.stream;
        let mut consumer = StreamConsumer::with_limits(subscription, limits.capacity, limits.trim_to);

        let result = consumer.finish().await.map(str::to_string);
        match result {
            Ok(reply) => Ok(reply),
            Err(message) => {
                error!("Chat stream failed: {}", message);
                let partial = consumer.reply();
                if partial.is_empty() {
                    Err(AppError::Query(query_cache::QueryError::message(message)))
                } else {
                    Ok(format!("{}\n[stream interrupted: {}]", partial, message))
                }
            }
        }
    }
}

#[async_trait]
impl CommandHandler for ChatHandler {
    fn name(&self) -> &str {
        "chat"
    }

    fn triggers(&self) -> &[&str] {
        &["chat"]
    }

    async fn execute(&self, command: &CommandLine) -> AppResult<String> {
        match command.arg(0) {
            Some("sessions") | None => self.sessions().await,
            Some("new") => {
                let title = command.rest(1);
                let title = (!title.is_empty()).then_some(title.as_str());
                let session = self.console.client.chat().create_session(title).await?;
                Ok(format!("Session {}", session.id))
            }
            Some("history") => {
                let id = command.arg(1).ok_or_else(|| AppError::usage(USAGE))?;
                self.history(id).await
            }
            Some(id) => {
                let message = command.rest(1);
                if message.is_empty() {
                    return Err(AppError::usage(USAGE));
                }
                self.send(id, &message).await
            }
        }
    }
}
