//! AI-secretary admin API client.
//!
//! One resource client per domain hangs off [`SecretaryClient`]. The client
//! does no caching and no retries; errors carry the backend status and message.

mod chat;
mod client;
mod error;
mod instances;
mod llm;
mod logs;
mod models;
mod stream;
mod system;
mod types;

pub use chat::{ChatApi, ChatMessage, ChatSession, SessionDetail};
pub use client::SecretaryClient;
pub use error::ClientError;
pub use instances::*;
pub use llm::{LlmApi, LlmBackendInfo, Persona, TtsApi, TtsPreset};
pub use logs::{AuditApi, AuditEntry, UsageApi, UsageEntry, UsageStats};
pub use models::{FinetuneApi, ModelInfo, ModelsApi};
pub use stream::{SseDecoder, StreamEvent, Subscription};
pub use system::{AuthApi, GsmApi, GsmCall, GsmStatus, LoginResponse, MonitorApi};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_test_client(mock_server: &MockServer) -> SecretaryClient {
        SecretaryClient::new(mock_server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_token("test-token")
    }

    #[tokio::test]
    async fn test_list_instances_sends_bearer_and_unwraps() {
        let mock_server = MockServer::start().await;

        let body = serde_json::json!({
            "instances": [
                { "id": "tg-1", "name": "Reception", "enabled": true, "running": true },
                { "id": "tg-2", "name": "Night shift", "enabled": true, "running": false }
            ]
        });

        Mock::given(method("GET"))
            .and(path("/admin/telegram/instances"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let instances = client.instances(ChannelKind::Telegram).list().await.unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].id, "tg-1");
        assert!(instances[0].running);
        assert_eq!(instances[1].kind(), ChannelKind::Telegram);
    }

    #[tokio::test]
    async fn test_get_instance_accepts_wrapped_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/widget/instances/w%201"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instance": {
                    "id": "w 1",
                    "name": "Support",
                    "primary_color": "#6366f1",
                    "allowed_domains": ["example.com"]
                }
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let instance = client.instances(ChannelKind::Widget).get("w 1").await.unwrap();

        assert_eq!(instance.name, "Support");
        match instance.settings {
            ChannelSettings::Widget(w) => assert_eq!(w.allowed_domains, vec!["example.com"]),
            other => panic!("unexpected settings: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_instance_action_error_carries_status_and_detail() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/admin/telegram/instances/tg-1/stop"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({ "detail": "Bot is not running" })),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let result = client.instances(ChannelKind::Telegram).stop("tg-1").await;

        match result {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 409);
                assert_eq!(message, "Bot is not running");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/chat/sessions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let result = client.chat().list_sessions().await;
        assert!(matches!(result, Err(ClientError::Unauthorized)));
        assert_eq!(result.unwrap_err().status(), Some(401));
    }

    #[tokio::test]
    async fn test_optional_config_not_found_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/finetune/config"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let config = tokio_test::assert_ok!(client.finetune().config().await);
        assert!(config.is_none());
    }

    #[tokio::test]
    async fn test_training_status_unwraps_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/finetune/train/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": { "is_running": true, "progress": 42.5, "current_step": 17 }
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let status = client.finetune().training_status().await.unwrap();
        assert!(status.is_active());
        assert_eq!(status.progress, Some(42.5));
        assert_eq!(status.current_step, Some(17));
    }

    #[tokio::test]
    async fn test_audit_logs_query_params() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/audit/logs"))
            .and(query_param("limit", "20"))
            .and(query_param("offset", "40"))
            .and(query_param("action", "delete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "logs": [{
                    "id": "a1",
                    "timestamp": "2024-05-01T10:00:00Z",
                    "action": "delete",
                    "resource": "telegram_instance"
                }],
                "total": 41
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let query = LogQuery {
            limit: 20,
            offset: 40,
            action: Some("delete".into()),
            ..Default::default()
        };
        let page = client.audit().logs(&query).await.unwrap();
        assert_eq!(page.total, 41);
        assert_eq!(page.logs[0].action, "delete");
    }

    #[tokio::test]
    async fn test_csv_export_returns_raw_bytes() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/usage/export"))
            .and(query_param("format", "csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("id,backend\nu1,vllm\n"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let bytes = client.usage().export(ExportFormat::Csv).await.unwrap();
        assert_eq!(bytes, b"id,backend\nu1,vllm\n");
    }

    #[tokio::test]
    async fn test_login_installs_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/admin/auth/login"))
            .and(body_json(serde_json::json!({ "username": "admin", "password": "s3cret" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-token",
                "token_type": "bearer"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/admin/gsm/status"))
            .and(header("Authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "idle",
                "signal_strength": 21
            })))
            .mount(&mock_server)
            .await;

        let client = SecretaryClient::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        assert!(!client.has_token());

        client.auth().login("admin", "s3cret").await.unwrap();
        assert!(client.has_token());

        let status = client.gsm().status().await.unwrap();
        assert_eq!(status.state, "idle");
        assert_eq!(status.signal_strength, Some(21));
    }

    #[tokio::test]
    async fn test_chat_stream_dispatches_typed_events() {
        let mock_server = MockServer::start().await;

        let sse = concat!(
            "data: {\"type\":\"chunk\",\"content\":\"Hello\"}\n\n",
            "data: {\"type\":\"chunk\",\"content\":\", world\"}\n\n",
            "data: {\"type\":\"done\",\"message_id\":\"m1\"}\n\n",
        );

        Mock::given(method("POST"))
            .and(path("/admin/chat/sessions/s1/stream"))
            .and(body_json(serde_json::json!({ "content": "Hi" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let mut subscription = client.chat().stream_message("s1", "Hi").await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = subscription.next().await {
            events.push(event.unwrap());
        }

        assert_eq!(
            events,
            vec![
                StreamEvent::Chunk { content: "Hello".into() },
                StreamEvent::Chunk { content: ", world".into() },
                StreamEvent::Done { message_id: Some("m1".into()) },
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/monitor/gpu/stream"))
            .respond_with(ResponseTemplate::new(503).set_body_string("no GPU"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let result = client.monitor().gpu_stream().await;
        assert!(matches!(result, Err(ClientError::Api { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_health_check_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        assert!(!client.health_check().await);
    }
}
