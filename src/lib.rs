pub mod app;
pub mod cli;
pub mod constants;
pub mod models;
pub mod tiers;
pub mod utils;

pub use app::{resolve_config, AiSettings, CoachState};
pub use models::{
    Backend, BackendConfig, BackendFactory, ChatMessage, ChatOptions, ChatResult, Provider,
    ToolCall, ToolSpec,
};
pub use tiers::{limits_for_tier, resolve_backend, RouteDecision, Tier};
pub use utils::{BackendError, ConfigError};
