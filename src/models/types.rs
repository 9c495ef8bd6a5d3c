use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_ANTHROPIC_MODEL, DEFAULT_COMPATIBLE_MODEL, DEFAULT_GEMINI_MODEL, DEFAULT_MAX_TOKENS,
    DEFAULT_OPENAI_MODEL,
};
use crate::utils::ConfigError;

/// The closed set of backends we know how to speak to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    /// Anthropic messages API with native `tool_use` blocks
    Anthropic,
    /// Hosted OpenAI chat completions
    #[serde(rename = "openai")]
    OpenAi,
    /// Any chat-completions server reached through a caller-supplied URL
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
    /// Gemini generateContent with function declarations
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenAiCompatible => "openai-compatible",
            Self::Gemini => "gemini",
        }
    }

    /// Model used when a config record names the provider but no model
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
            Self::OpenAiCompatible => DEFAULT_COMPATIBLE_MODEL,
            Self::Gemini => DEFAULT_GEMINI_MODEL,
        }
    }

    /// Whether the caller must point us at an endpoint
    pub fn requires_base_url(&self) -> bool {
        matches!(self, Self::OpenAiCompatible)
    }

    /// Local servers usually run unauthenticated
    pub fn allows_missing_key(&self) -> bool {
        matches!(self, Self::OpenAiCompatible)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "openai-compatible" | "openai_compatible" | "compatible" | "custom" => {
                Ok(Self::OpenAiCompatible)
            },
            "gemini" | "google" => Ok(Self::Gemini),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

/// One backend endpoint. Immutable once handed to an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Raw provider name as configured; validated by the factory
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_supports_tools")]
    pub supports_native_tools: bool,
}

fn default_supports_tools() -> bool {
    true
}

impl BackendConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider: provider.as_str().to_string(),
            model: provider.default_model().to_string(),
            api_key: api_key.into(),
            base_url: String::new(),
            supports_native_tools: true,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_native_tools(mut self, enabled: bool) -> Self {
        self.supports_native_tools = enabled;
        self
    }

    /// Base URL if one was supplied, trailing slash stripped
    pub fn base_url_or(&self, default: &str) -> String {
        let url = if self.base_url.trim().is_empty() {
            default
        } else {
            self.base_url.trim()
        };
        url.trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of caller-owned history. Order is significant and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A tool offered to the model. Names must be unique within one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the accepted input
    pub input_schema: Value,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider call id, absent on the fallback path and for Gemini
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub input: Value,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Normalized response from any backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    /// `None` only when the model called tools and wrote no prose
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ChatResult {
    /// Plain text answer. Empty output stays an empty string.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    /// Build from collected prose and tool calls, keeping the null-text invariant
    pub fn from_parts(text: String, tool_calls: Vec<ToolCall>) -> Self {
        let text = if text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(text)
        };
        Self {
            text,
            tool_calls,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text or empty string
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Per-call generation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
        }
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}
