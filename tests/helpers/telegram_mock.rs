//! Mock Telegram API Server for testing
//!
//! This module provides a mock HTTP server that simulates the Telegram Bot API
//! for testing purposes. It uses wiremock to create configurable mock responses.

use serde_json::{json, Value};
use teloxide::Bot;
use wiremock::{
    matchers::{method, path_regex},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_BOT_TOKEN: &str = "12345:test_token";

/// Mock Telegram API server for testing
pub struct TelegramMockServer {
    pub server: MockServer,
}

/// Configuration for mock responses
#[derive(Debug, Clone)]
pub struct MockResponseConfig {
    pub success: bool,
    pub delay_ms: Option<u64>,
}

impl Default for MockResponseConfig {
    fn default() -> Self {
        Self {
            success: true,
            delay_ms: None,
        }
    }
}

impl TelegramMockServer {
    /// Create a new mock Telegram API server
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Bot whose requests go to this server
    pub fn bot(&self) -> Bot {
        let url = url::Url::parse(&self.server.uri()).expect("mock server uri");
        Bot::new(TEST_BOT_TOKEN).set_api_url(url)
    }

    /// Path pattern for a Bot API method. teloxide spells method names in
    /// PascalCase (`SendMessage`), so the method segment matches in any case.
    fn endpoint(name: &str) -> String {
        format!(r"(?i)^/bot{}/{}$", regex::escape(TEST_BOT_TOKEN), regex::escape(name))
    }

    fn is_call_to(req: &wiremock::Request, name: &str) -> bool {
        req.url
            .path()
            .rsplit('/')
            .next()
            .map_or(false, |method| method.eq_ignore_ascii_case(name))
    }

    fn respond(config: &MockResponseConfig, result: Value) -> ResponseTemplate {
        let (status, body) = if config.success {
            (200, json!({ "ok": true, "result": result }))
        } else {
            (
                400,
                json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: chat not found"
                }),
            )
        };

        let mut response = ResponseTemplate::new(status).set_body_json(body);
        if let Some(delay) = config.delay_ms {
            response = response.set_delay(std::time::Duration::from_millis(delay));
        }
        response
    }

    fn message(chat_id: i64, extra: Value) -> Value {
        let mut message = json!({
            "message_id": 123,
            "from": {
                "id": 12345,
                "is_bot": true,
                "first_name": "TestBot",
                "username": "test_bot"
            },
            "chat": {
                "id": chat_id,
                "first_name": "Parent",
                "type": "private"
            },
            "date": 1640995200
        });
        if let (Some(target), Some(extra)) = (message.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        message
    }

    /// Setup mock for sendMessage endpoint
    pub async fn mock_send_message(&self, config: MockResponseConfig) {
        let result = Self::message(555, json!({ "text": "Promoted from Waitlist" }));
        Mock::given(method("POST"))
            .and(path_regex(Self::endpoint("sendMessage")))
            .respond_with(Self::respond(&config, result))
            .mount(&self.server)
            .await;
    }

    /// Setup mock for sendPhoto endpoint
    pub async fn mock_send_photo(&self, config: MockResponseConfig) {
        let result = Self::message(
            555,
            json!({
                "photo": [{
                    "file_id": "qr-file",
                    "file_unique_id": "qr-unique",
                    "width": 256,
                    "height": 256,
                    "file_size": 1024
                }]
            }),
        );
        Mock::given(method("POST"))
            .and(path_regex(Self::endpoint("sendPhoto")))
            .respond_with(Self::respond(&config, result))
            .mount(&self.server)
            .await;
    }

    /// Setup all mocks with successful responses
    pub async fn setup_default_mocks(&self) {
        self.mock_send_message(MockResponseConfig::default()).await;
        self.mock_send_photo(MockResponseConfig::default()).await;
    }

    /// Setup all mocks with error responses
    pub async fn setup_error_mocks(&self) {
        let config = MockResponseConfig {
            success: false,
            ..Default::default()
        };
        self.mock_send_message(config.clone()).await;
        self.mock_send_photo(config).await;
    }

    /// JSON bodies received for a Bot API method, e.g. `sendMessage`
    pub async fn requests_to(&self, endpoint: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|req| Self::is_call_to(req, endpoint))
            .filter_map(|req| serde_json::from_slice(&req.body).ok())
            .collect()
    }

    /// Number of requests received for an endpoint
    pub async fn call_count(&self, endpoint: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|req| Self::is_call_to(req, endpoint))
            .count()
    }
}
