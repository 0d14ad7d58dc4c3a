//! Console command handlers.

mod auth;
mod chat;
mod help;
mod instances;
mod jobs;
mod logs;
mod settings;

pub use auth::AuthHandler;
pub use chat::ChatHandler;
pub use help::HelpHandler;
pub use instances::InstancesHandler;
pub use jobs::JobsHandler;
pub use logs::LogsHandler;
pub use settings::SettingsHandler;

use crate::context::Console;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use console_core::ToastLevel;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One parsed input line: `name arg... key=value...`.
///
/// Double quotes group words, so `name="Night shift"` is one option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub name: String,
    pub args: Vec<String>,
    pub options: BTreeMap<String, String>,
}

impl CommandLine {
    /// `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = split(line).into_iter();
        let name = tokens.next()?.to_ascii_lowercase();

        let mut command = CommandLine {
            name,
            ..Default::default()
        };
        for token in tokens {
            match token.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    command.options.insert(key.to_string(), value.to_string());
                }
                _ => command.args.push(token),
            }
        }
        Some(command)
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// Positional arguments from `index` on, joined by spaces.
    pub fn rest(&self, index: usize) -> String {
        self.args.get(index..).map(|args| args.join(" ")).unwrap_or_default()
    }

    /// Numeric option, falling back to `default` when absent.
    pub fn number<T: std::str::FromStr>(&self, name: &str, default: T) -> AppResult<T> {
        match self.option(name) {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::usage(format!("{}=<number>", name))),
            None => Ok(default),
        }
    }
}

fn split(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        tokens.push(current);
    }
    tokens
}

/// Command handler trait.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handler name, used in logs.
    fn name(&self) -> &str;

    /// Command words this handler answers to.
    fn triggers(&self) -> &[&str];

    /// Check if this handler matches the command.
    fn matches(&self, command: &CommandLine) -> bool {
        self.triggers().contains(&command.name.as_str())
    }

    /// Execute the command.
    async fn execute(&self, command: &CommandLine) -> AppResult<String>;
}

/// Every handler, bound to one console session.
pub struct Commands {
    console: Arc<Console>,
    handlers: Vec<Box<dyn CommandHandler>>,
}

impl Commands {
    pub fn new(console: Arc<Console>) -> Self {
        let handlers: Vec<Box<dyn CommandHandler>> = vec![
            Box::new(HelpHandler::new()),
            Box::new(AuthHandler::new(console.clone())),
            Box::new(InstancesHandler::new(console.clone())),
            Box::new(LogsHandler::new(console.clone())),
            Box::new(JobsHandler::new(console.clone())),
            Box::new(ChatHandler::new(console.clone())),
            Box::new(SettingsHandler::new(console.clone())),
        ];
        Self { console, handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run one input line. Output is the command's text followed by any
    /// notifications it raised; `None` for blank lines.
    pub async fn dispatch(&self, line: &str) -> Option<String> {
        let command = CommandLine::parse(line)?;

        let result = match self.handlers.iter().find(|h| h.matches(&command)) {
            Some(handler) => {
                tracing::debug!(handler = handler.name(), command = %command.name, "Dispatching");
                handler.execute(&command).await
            }
            None => Err(AppError::usage(format!(
                "unknown command '{}', try 'help'",
                command.name
            ))),
        };

        let mut output = match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("{} failed: {}", command.name, e);
                format!("Error: {}", e)
            }
        };

        for toast in self.console.notifier.drain() {
            let marker = match toast.level {
                ToastLevel::Success => "ok",
                ToastLevel::Info => "info",
                ToastLevel::Warning => "warn",
                ToastLevel::Error => "error",
            };
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&format!("[{}] {}", marker, toast.message));
        }

        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_and_options() {
        let command = CommandLine::parse("  Create telegram name=\"Night shift\" enabled=false  ").unwrap();
        assert_eq!(command.name, "create");
        assert_eq!(command.args, vec!["telegram"]);
        assert_eq!(command.option("name"), Some("Night shift"));
        assert_eq!(command.option("enabled"), Some("false"));
    }

    #[test]
    fn test_parse_blank_and_quoted_rest() {
        assert!(CommandLine::parse("   ").is_none());

        let command = CommandLine::parse("chat s1 \"hello there\" friend").unwrap();
        assert_eq!(command.arg(0), Some("s1"));
        assert_eq!(command.rest(1), "hello there friend");
        assert_eq!(command.rest(5), "");
    }

    #[test]
    fn test_empty_quoted_value_is_kept() {
        let command = CommandLine::parse("update description=\"\"").unwrap();
        assert_eq!(command.option("description"), Some(""));
    }

    #[test]
    fn test_number_option() {
        let command = CommandLine::parse("cleanup audit days=30").unwrap();
        assert_eq!(command.number("days", 90u32).unwrap(), 30);
        assert_eq!(command.number("page", 1u32).unwrap(), 1);

        let bad = CommandLine::parse("cleanup audit days=many").unwrap();
        assert!(matches!(bad.number("days", 90u32), Err(AppError::Usage(_))));
    }
}
