use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use super::fallback::chat_with_fallback;
use super::traits::Backend;
use super::transport::{build_client, send_json};
use super::types::{
    BackendConfig, ChatMessage, ChatOptions, ChatResult, Provider, TokenUsage, ToolCall, ToolSpec,
};
use crate::constants::OPENAI_BASE_URL;
use crate::utils::{BackendError, ConfigError};

/// Chat-completions adapter, for hosted OpenAI and any compatible server.
///
/// Tool capability is a two-state machine: native until the first native
/// tool call fails, fallback forever after. The flag is only ever written
/// with `false`, so concurrent downgrades are identical writes.
pub struct OpenAiBackend {
    client: Client,
    provider: Provider,
    base_url: String,
    model: String,
    api_key: String,
    native_tools: AtomicBool,
}

impl OpenAiBackend {
    pub fn new(provider: Provider, config: &BackendConfig) -> Result<Self, ConfigError> {
        if provider.requires_base_url() && config.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl(provider));
        }

        Ok(Self {
            client: build_client()?,
            provider,
            base_url: config.base_url_or(OPENAI_BASE_URL),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            native_tools: AtomicBool::new(config.supports_native_tools),
        })
    }

    async fn send(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
        options: &ChatOptions,
    ) -> Result<ChatResult, BackendError> {
        // System prompt travels as a synthetic first message
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if !system_prompt.is_empty() {
            wire_messages.push(WireMessage {
                role: "system",
                content: system_prompt,
            });
        }
        wire_messages.extend(messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        let request = CompletionRequest {
            model: &self.model,
            max_tokens: options.max_tokens(),
            messages: wire_messages,
            tools: tools.map(|tools| {
                tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.input_schema,
                            }
                        })
                    })
                    .collect()
            }),
        };

        debug!(
            "{} request: model={}, messages={}, tools={}",
            self.provider,
            self.model,
            messages.len(),
            tools.map_or(0, |t| t.len())
        );

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response: CompletionResponse = send_json(builder, self.provider.as_str()).await?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            BackendError::InvalidResponse(format!("{} response had no choices", self.provider))
        })?;

        let mut tool_calls = Vec::new();
        for call in choice.message.tool_calls.unwrap_or_default() {
            let input = serde_json::from_str(&call.function.arguments).map_err(|source| {
                BackendError::MalformedToolArguments {
                    tool: call.function.name.clone(),
                    source,
                }
            })?;
            tool_calls.push(ToolCall {
                id: call.id,
                name: call.function.name,
                input,
            });
        }

        let text = choice.message.content.unwrap_or_default();
        Ok(ChatResult::from_parts(text, tool_calls).with_usage(response.usage.map(|u| {
            TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }
        })))
    }

    /// One-way switch to the prompt-based protocol
    fn downgrade(&self, cause: &BackendError) {
        if self.native_tools.swap(false, Ordering::AcqRel) {
            warn!(
                "{} model {} failed a native tool call ({}); using prompt-based tools from now on",
                self.provider, self.model, cause
            );
        }
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
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
        // An empty `tools` array is rejected upstream and would trip the downgrade
        if tools.is_empty() {
            return self.chat(system_prompt, messages, options).await;
        }
        if !self.supports_native_tools() {
            return chat_with_fallback(self, system_prompt, messages, tools, options).await;
        }

        // Any failure counts as "no tool support", transient ones included
        match self.send(system_prompt, messages, Some(tools), options).await {
            Ok(result) => Ok(result),
            Err(err) => {
                self.downgrade(&err);
                chat_with_fallback(self, system_prompt, messages, tools, options).await
            },
        }
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_native_tools(&self) -> bool {
        self.native_tools.load(Ordering::Acquire)
    }
}

// Response structures (OpenAI format)

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: Option<String>,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
