//! Login and logout.

use crate::commands::{CommandHandler, CommandLine};
use crate::context::Console;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::info;

pub struct AuthHandler {
    console: Arc<Console>,
}

impl AuthHandler {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }

    async fn login(&self, command: &CommandLine) -> AppResult<String> {
        let (Some(username), Some(password)) = (command.arg(0), command.arg(1)) else {
            return Err(AppError::usage("login <user> <password>"));
        };
        let password = SecretString::new(password.to_string());

        let response = self
            .console
            .client
            .auth()
            .login(username, password.expose_secret())
            .await?;

        let token = SecretString::new(response.access_token);
        self.console.tokens.save(&token).await?;
        info!("Token stored at {}", self.console.tokens.path().display());

        Ok(format!("Signed in as {}", username))
    }

    async fn logout(&self) -> AppResult<String> {
        self.console.client.auth().logout();
        self.console.tokens.clear().await?;
        Ok("Signed out".into())
    }
}

#[async_trait]
impl CommandHandler for AuthHandler {
    fn name(&self) -> &str {
        "auth"
    }

    fn triggers(&self) -> &[&str] {
        &["login", "logout"]
    }

    async fn execute(&self, command: &CommandLine) -> AppResult<String> {
        match command.name.as_str() {
            "login" => self.login(command).await,
            _ => self.logout().await,
        }
    }
}
