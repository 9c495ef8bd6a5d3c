// Gateway module for models - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod anthropic;
mod factory;
mod fallback;
mod gemini;
mod openai;
mod traits;
mod transport;
mod types;

// Public re-exports - the ONLY way to access model functionality
pub use anthropic::AnthropicBackend;
pub use factory::BackendFactory;
pub use fallback::{
    build_tool_system_prompt, chat_with_fallback, extract_first_json_object, parse_tool_response,
};
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;
pub use traits::Backend;
#[cfg(test)]
pub use traits::MockBackend;
pub use types::{
    BackendConfig, ChatMessage, ChatOptions, ChatResult, MessageRole, Provider, TokenUsage,
    ToolCall, ToolSpec,
};
