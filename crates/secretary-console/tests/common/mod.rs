//! Common test utilities for integration tests.

use secretary_client::SecretaryClient;
use secretary_console::commands::Commands;
use secretary_console::config::Config;
use secretary_console::context::Console;
use secretary_console::token::TokenStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Start a mock admin API server.
pub async fn mock_admin_server() -> MockServer {
    MockServer::start().await
}

/// Create an authenticated client for a mock server.
pub fn test_client(mock_server: &MockServer) -> SecretaryClient {
    SecretaryClient::new(mock_server.uri(), Duration::from_secs(5))
        .unwrap()
        .with_token("test-token")
}

/// Console session against a mock server. Token file and exports live in
/// the returned directory.
pub async fn test_commands(mock_server: &MockServer) -> (Commands, TempDir) {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.console.export_dir = dir.path().to_path_buf();
    config.auth.token_path = dir.path().join("token");
    config.poll.active_interval = Duration::from_millis(5);
    config.poll.status_interval = Duration::from_millis(5);

    let console = Console::new(
        test_client(mock_server),
        TokenStore::new(&config.auth.token_path),
        &config,
    )
    .await;

    (Commands::new(Arc::new(console)), dir)
}

/// Telegram instance body as the backend returns it.
pub fn telegram_instance(id: &str, name: &str, running: bool) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "enabled": true,
        "running": running,
        "allowed_users": [],
        "blocked_users": [],
        "admin_users": [42]
    })
}
