//! End-to-end tests for the console commands.

mod common;

use common::{mock_admin_server, telegram_instance, test_commands};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_select_then_stop_running_bot() {
    let server = mock_admin_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/telegram/instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "instances": [telegram_instance("tg-1", "Reception", true)]
        })))
        .mount(&server)
        .await;

    // Running until the stop lands, stopped afterwards.
    Mock::given(method("GET"))
        .and(path("/admin/telegram/instances/tg-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(telegram_instance("tg-1", "Reception", true)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/telegram/instances/tg-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(telegram_instance("tg-1", "Reception", false)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/admin/telegram/instances/tg-1/stop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let (commands, _dir) = test_commands(&server).await;

    let listed = commands.dispatch("instances telegram").await.unwrap();
    assert!(listed.starts_with("telegram instances (1)"));
    assert!(listed.contains("Reception"));

    let selected = commands.dispatch("select tg-1").await.unwrap();
    assert_eq!(selected, "Reception: Running");

    let stopped = commands.dispatch("stop").await.unwrap();
    assert_eq!(stopped, "Reception: Stopped\n[ok] Bot \"Reception\" stopped");
}

#[tokio::test]
async fn test_stop_failure_reports_backend_detail() {
    let server = mock_admin_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/telegram/instances/tg-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(telegram_instance("tg-1", "Reception", true)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/telegram/instances/tg-1/stop"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({ "detail": "process hung" })),
        )
        .mount(&server)
        .await;

    let (commands, _dir) = test_commands(&server).await;

    let output = commands.dispatch("stop tg-1").await.unwrap();
    assert!(output.starts_with("Error:"));
    assert!(output.ends_with("[error] Failed to stop: process hung"));
}

#[tokio::test]
async fn test_create_without_name_sends_nothing() {
    let server = mock_admin_server().await;

    Mock::given(method("POST"))
        .and(path("/admin/telegram/instances"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (commands, _dir) = test_commands(&server).await;

    let output = commands.dispatch("create telegram bot_token=123:abc").await.unwrap();
    assert!(output.starts_with("Error:"));
}

#[tokio::test]
async fn test_unknown_command_and_blank_line() {
    let server = mock_admin_server().await;
    let (commands, _dir) = test_commands(&server).await;

    assert!(commands.dispatch("   ").await.is_none());
    let output = commands.dispatch("reboot").await.unwrap();
    assert_eq!(output, "Error: Usage: unknown command 'reboot', try 'help'");
    assert!(commands.dispatch("help").await.unwrap().contains("cleanup <source> days=N"));
}

#[tokio::test]
async fn test_cleanup_and_export() {
    let server = mock_admin_server().await;

    Mock::given(method("POST"))
        .and(path("/admin/usage/cleanup"))
        .and(query_param("days", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "deleted": 7 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/usage/export"))
        .and(query_param("format", "csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("id,backend\nu1,vllm\n"))
        .mount(&server)
        .await;

    let (commands, dir) = test_commands(&server).await;

    let rejected = commands.dispatch("cleanup usage days=0").await.unwrap();
    assert!(rejected.starts_with("Error:"));

    let cleaned = commands.dispatch("cleanup usage days=30").await.unwrap();
    assert_eq!(
        cleaned,
        "7 entries older than 30 days removed\n[ok] Removed 7 log entries"
    );

    let exported = commands.dispatch("export usage csv").await.unwrap();
    let saved: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
    let csv = saved
        .iter()
        .find(|p| p.extension().map(|e| e == "csv").unwrap_or(false))
        .unwrap();
    assert!(exported.starts_with(&csv.display().to_string()));
    assert_eq!(std::fs::read_to_string(csv).unwrap(), "id,backend\nu1,vllm\n");
}

#[tokio::test]
async fn test_audit_logs_page_with_filter() {
    let server = mock_admin_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/audit/logs"))
        .and(query_param("action", "delete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "logs": [{
                "id": "a1",
                "timestamp": "2024-05-01T10:00:00Z",
                "action": "delete",
                "resource": "telegram_instance",
                "resource_id": "tg-2",
                "user": "admin"
            }],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (commands, _dir) = test_commands(&server).await;

    let output = commands.dispatch("logs audit action=delete").await.unwrap();
    assert!(output.starts_with("audit logs, page 1/1 (1 total)"));
    assert!(output.contains("telegram_instance/tg-2"));
}

#[tokio::test]
async fn test_watch_scan_until_idle() {
    let server = mock_admin_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/models/scan/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": { "is_running": true, "progress": 50 }
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/models/scan/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": { "is_running": false, "progress": 100 }
        })))
        .mount(&server)
        .await;

    let (commands, _dir) = test_commands(&server).await;

    let output = commands.dispatch("watch scan").await.unwrap();
    assert_eq!(output, "running 50%\nidle 100%");
}

#[tokio::test]
async fn test_failed_scan_start_shows_error_toast() {
    let server = mock_admin_server().await;

    Mock::given(method("POST"))
        .and(path("/admin/models/scan"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({ "detail": "models dir missing" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (commands, _dir) = test_commands(&server).await;

    let output = commands.dispatch("watch scan start").await.unwrap();
    assert_eq!(
        output,
        "Error: models dir missing\n[error] Model scan failed: models dir missing"
    );
}

#[tokio::test]
async fn test_backend_switch_shows_toast() {
    let server = mock_admin_server().await;

    Mock::given(method("POST"))
        .and(path("/admin/llm/backend"))
        .and(body_json(serde_json::json!({ "backend": "gemini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "backend": "gemini" })))
        .expect(1)
        .mount(&server)
        .await;

    let (commands, _dir) = test_commands(&server).await;

    let output = commands.dispatch("backend gemini").await.unwrap();
    assert_eq!(output, "Backend: gemini\n[ok] LLM backend switched to gemini");
}

#[tokio::test]
async fn test_chat_streams_reply() {
    let server = mock_admin_server().await;

    let sse = concat!(
        "data: {\"type\":\"chunk\",\"content\":\"Hello\"}\n\n",
        "data: {\"type\":\"chunk\",\"content\":\", world\"}\n\n",
        "data: {\"type\":\"done\",\"message_id\":\"m1\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/admin/chat/sessions/s1/stream"))
        .and(body_json(serde_json::json!({ "content": "Hi there" })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/event-stream")
                .set_body_string(sse),
        )
        .mount(&server)
        .await;

    let (commands, _dir) = test_commands(&server).await;

    let output = commands.dispatch("chat s1 Hi there").await.unwrap();
    assert_eq!(output, "Hello, world");
}

#[tokio::test]
async fn test_login_persists_token() {
    let server = mock_admin_server().await;

    Mock::given(method("POST"))
        .and(path("/admin/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "token_type": "bearer"
        })))
        .mount(&server)
        .await;

    let (commands, dir) = test_commands(&server).await;

    assert_eq!(commands.dispatch("login admin s3cret").await.unwrap(), "Signed in as admin");
    assert_eq!(std::fs::read_to_string(dir.path().join("token")).unwrap(), "fresh-token");

    assert_eq!(commands.dispatch("logout").await.unwrap(), "Signed out");
    assert!(!dir.path().join("token").exists());
}
