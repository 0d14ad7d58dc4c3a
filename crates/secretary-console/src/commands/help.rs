//! Help command - lists console commands.

use crate::commands::{CommandHandler, CommandLine};
use crate::error::AppResult;
use async_trait::async_trait;

pub struct HelpHandler;

impl HelpHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HelpHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandHandler for HelpHandler {
    fn name(&self) -> &str {
        "help"
    }

    fn triggers(&self) -> &[&str] {
        &["help", "?"]
    }

    async fn execute(&self, _command: &CommandLine) -> AppResult<String> {
        Ok(r#"AI-secretary admin console

Session:
  login <user> <password>        Sign in and store the token
  logout                         Forget the stored token

Instances (channel: telegram | whatsapp | widget):
  instances [channel]            List instances and switch channel
  select <id>                    Select an instance
  show [id]                      Details of an instance (default: selected)
  create <channel> name=<name> [field=value...]
  update [id] field=value...     Secrets left out stay unchanged
  start|stop|restart [id]
  delete [id]

Logs (source: audit | usage):
  logs <source> [page=N] [next|prev|clear] [action= resource= user= backend= from= to=]
  logs usage stats               Aggregate usage
  cleanup <source> days=N        Remove entries older than N days
  export <source> [json|csv]     Save an export to the export directory

Jobs and streams:
  watch <scan|download|training> [start|stop] [repo=<id>]
  watch status [id]              Follow an instance until it stops running
  tail [lines=N]                 Training log
  gpu [samples=N]                GPU metrics

Assistant:
  chat sessions | chat new [title] | chat <session> <message>
  backend [name] [model=<model>] Show or switch the LLM backend
  personas                       Configured personas
  presets [name]                 TTS presets, or select one
  gsm                            Telephony status

  help                           Show this message"#
            .into())
    }
}
