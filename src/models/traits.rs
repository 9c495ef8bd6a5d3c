use async_trait::async_trait;

use super::types::{ChatMessage, ChatOptions, ChatResult, Provider, ToolSpec};
use crate::utils::BackendError;

/// Core trait that all model backends must implement
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send a conversation with no tool catalog.
    /// `tool_calls` is always empty on this path.
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResult, BackendError>;

    /// Send a conversation plus a tool catalog, natively when the backend
    /// can, otherwise through the prompt-based fallback
    async fn chat_with_tools(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        options: &ChatOptions,
    ) -> Result<ChatResult, BackendError>;

    fn provider(&self) -> Provider;

    /// Get the name of the model
    fn model(&self) -> &str;

    /// Current tool capability; may flip to false once at runtime
    fn supports_native_tools(&self) -> bool;
}
