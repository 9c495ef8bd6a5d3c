use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::fallback::chat_with_fallback;
use super::traits::Backend;
use super::transport::{build_client, send_json};
use super::types::{
    BackendConfig, ChatMessage, ChatOptions, ChatResult, Provider, TokenUsage, ToolCall, ToolSpec,
};
use crate::constants::{ANTHROPIC_API_VERSION, ANTHROPIC_BASE_URL};
use crate::utils::{BackendError, ConfigError};

/// Anthropic messages API with native tool use
pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    native_tools: bool,
}

impl AnthropicBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client()?,
            base_url: config.base_url_or(ANTHROPIC_BASE_URL),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            native_tools: config.supports_native_tools,
        })
    }

    async fn send(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
        options: &ChatOptions,
    ) -> Result<ChatResult, BackendError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: options.max_tokens(),
            system: (!system_prompt.is_empty()).then_some(system_prompt),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            tools: tools.map(|tools| {
                tools
                    .iter()
                    .map(|t| WireTool {
                        name: &t.name,
                        description: &t.description,
                        input_schema: &t.input_schema,
                    })
                    .collect()
            }),
        };

        debug!(
            "anthropic request: model={}, messages={}, tools={}",
            self.model,
            messages.len(),
            tools.map_or(0, |t| t.len())
        );

        let url = format!("{}/v1/messages", self.base_url);
        let response: MessagesResponse = send_json(
            self.client
                .post(&url)
                // The messages API authenticates on x-api-key, not a bearer header
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_API_VERSION)
                .json(&request),
            "anthropic",
        )
        .await?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in response.content {
            match block {
                ContentBlock::Text { text: chunk } => text.push_str(&chunk),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id: Some(id),
                    name,
                    input,
                }),
                ContentBlock::Other => {},
            }
        }

        Ok(ChatResult::from_parts(text, tool_calls).with_usage(response.usage.map(|u| {
            TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }
        })))
    }
}

#[async_trait]
impl Backend for AnthropicBackend {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResult, BackendError> {
        let result = self.send(system_prompt, messages, None, options).await?;
        // Tool-free path never reports tool calls or null text
        Ok(ChatResult::text(result.text.unwrap_or_default()).with_usage(result.usage))
    }

    async fn chat_with_tools(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        options: &ChatOptions,
    ) -> Result<ChatResult, BackendError> {
        if tools.is_empty() {
            return self.chat(system_prompt, messages, options).await;
        }
        if !self.native_tools {
            return chat_with_fallback(self, system_prompt, messages, tools, options).await;
        }
        self.send(system_prompt, messages, Some(tools), options).await
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_native_tools(&self) -> bool {
        self.native_tools
    }
}

// Wire format

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn without_tools(request: &Request) -> bool {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        body.get("tools").is_none()
    }

    fn backend(server: &MockServer) -> AnthropicBackend {
        let config = BackendConfig::new(Provider::Anthropic, "test-key")
            .with_model("claude-test")
            .with_base_url(server.uri());
        AnthropicBackend::new(&config).unwrap()
    }

    fn tools() -> Vec<ToolSpec> {
        vec![ToolSpec {
            name: "swap_exercise".to_string(),
            description: "Suggest a replacement exercise".to_string(),
            input_schema: json!({"type": "object", "properties": {"exercise": {"type": "string"}}}),
        }]
    }

    #[tokio::test]
    async fn test_chat_maps_system_and_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_API_VERSION))
            .and(body_partial_json(json!({
                "model": "claude-test",
                "system": "You are a coach.",
                "max_tokens": 256,
                "messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                    {"role": "user", "content": "plan my week"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "content": [
                    {"type": "text", "text": "Train "},
                    {"type": "text", "text": "three days."}
                ],
                "usage": {"input_tokens": 12, "output_tokens": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let messages = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("plan my week"),
        ];
        let result = backend(&server)
            .chat("You are a coach.", &messages, &ChatOptions::with_max_tokens(256))
            .await
            .unwrap();

        assert_eq!(result.text.as_deref(), Some("Train three days."));
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.usage.map(|u| u.total_tokens()), Some(16));
    }

    #[tokio::test]
    async fn test_chat_with_tools_collects_tool_use() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({
                "tools": [{
                    "name": "swap_exercise",
                    "description": "Suggest a replacement exercise",
                    "input_schema": {"type": "object", "properties": {"exercise": {"type": "string"}}}
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "tool_use", "id": "toolu_1", "name": "swap_exercise", "input": {"exercise": "squat"}}
                ]
            })))
            .mount(&server)
            .await;

        let result = backend(&server)
            .chat_with_tools("", &[ChatMessage::user("my knee hurts")], &tools(), &ChatOptions::default())
            .await
            .unwrap();

        assert_eq!(result.text, None);
        assert_eq!(
            result.tool_calls,
            vec![ToolCall {
                id: Some("toolu_1".to_string()),
                name: "swap_exercise".to_string(),
                input: json!({"exercise": "squat"}),
            }]
        );
    }

    #[tokio::test]
    async fn test_chat_with_tools_keeps_prose_alongside_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "text", "text": "Let me find an alternative."},
                    {"type": "tool_use", "id": "toolu_2", "name": "swap_exercise", "input": {}}
                ]
            })))
            .mount(&server)
            .await;

        let result = backend(&server)
            .chat_with_tools("", &[ChatMessage::user("swap it")], &tools(), &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(result.text.as_deref(), Some("Let me find an alternative."));
        assert_eq!(result.tool_calls.len(), 1);
    }

    #[tokio::test]
    async fn test_http_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .chat("", &[ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        match err {
            BackendError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid x-api-key");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_response_is_empty_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
            .mount(&server)
            .await;

        let result = backend(&server)
            .chat_with_tools("", &[ChatMessage::user("hi")], &tools(), &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(result.text.as_deref(), Some(""));
        assert!(result.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_empty_tool_list_sends_no_tools() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(without_tools)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Rest up."}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend(&server);
        let result = backend
            .chat_with_tools("", &[ChatMessage::user("hi")], &[], &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(result.text.as_deref(), Some("Rest up."));
        assert!(result.tool_calls.is_empty());
        assert!(backend.supports_native_tools());
    }

    #[tokio::test]
    async fn test_disabled_tools_use_prompt_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(without_tools)
            .and(|request: &Request| {
                let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
                body["system"].as_str().is_some_and(|system| {
                    system.starts_with("You are a coach.")
                        && system.contains("## Tool use")
                        && system.contains("#### swap_exercise")
                })
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{
                    "type": "text",
                    "text": "```json\n{\"tool\": \"swap_exercise\", \"input\": {\"exercise\": \"lunge\"}}\n```"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = BackendConfig::new(Provider::Anthropic, "test-key")
            .with_base_url(server.uri())
            .with_native_tools(false);
        let backend = AnthropicBackend::new(&config).unwrap();

        let result = backend
            .chat_with_tools(
                "You are a coach.",
                &[ChatMessage::user("my knee hurts")],
                &tools(),
                &ChatOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.text, None);
        assert_eq!(result.tool_calls[0].name, "swap_exercise");
        assert_eq!(result.tool_calls[0].input, json!({"exercise": "lunge"}));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let config = BackendConfig::new(Provider::Anthropic, "test-key")
            .with_base_url("http://127.0.0.1:1");
        let err = AnthropicBackend::new(&config)
            .unwrap()
            .chat("", &[ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Network(_)));
    }
}
