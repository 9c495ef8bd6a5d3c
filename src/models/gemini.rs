use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::fallback::chat_with_fallback;
use super::traits::Backend;
use super::transport::{build_client, send_json};
use super::types::{
    BackendConfig, ChatMessage, ChatOptions, ChatResult, MessageRole, Provider, TokenUsage,
    ToolCall, ToolSpec,
};
use crate::constants::GEMINI_BASE_URL;
use crate::utils::{BackendError, ConfigError};

/// Gemini generateContent with function declarations.
/// Authenticates with a `key` query parameter, not a header.
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    native_tools: bool,
}

impl GeminiBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client()?,
            base_url: config.base_url_or(GEMINI_BASE_URL),
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
        let request = GenerateRequest {
            system_instruction: (!system_prompt.is_empty()).then(|| WireContent {
                role: None,
                parts: vec![TextPart {
                    text: system_prompt,
                }],
            }),
            contents: messages
                .iter()
                .map(|m| WireContent {
                    role: Some(wire_role(m.role)),
                    parts: vec![TextPart { text: &m.content }],
                })
                .collect(),
            tools: tools.map(|tools| {
                vec![WireTools {
                    function_declarations: tools
                        .iter()
                        .map(|t| FunctionDeclaration {
                            name: &t.name,
                            description: &t.description,
                            parameters: &t.input_schema,
                        })
                        .collect(),
                }]
            }),
            generation_config: GenerationConfig {
                max_output_tokens: options.max_tokens(),
            },
        };

        debug!(
            "gemini request: model={}, messages={}, tools={}",
            self.model,
            messages.len(),
            tools.map_or(0, |t| t.len())
        );

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response: GenerateResponse = send_json(
            self.client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&request),
            "gemini",
        )
        .await?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();
        for part in parts {
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                    id: None,
                    name: call.name,
                    input: call.args.unwrap_or_else(|| Value::Object(Default::default())),
                });
            } else if let Some(chunk) = part.text {
                text.push_str(&chunk);
            }
        }

        Ok(ChatResult::from_parts(text, tool_calls).with_usage(response.usage_metadata.map(|u| {
            TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            }
        })))
    }
}

/// Gemini calls the assistant "model"; everything else passes through
fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::Assistant => "model",
        other => other.as_str(),
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResult, BackendError> {
        let result = self.send(system_prompt, messages, None, options).await?;
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
        Provider::Gemini
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
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent<'a>>,
    contents: Vec<WireContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTools<'a>>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTools<'a> {
    function_declarations: Vec<FunctionDeclaration<'a>>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}
