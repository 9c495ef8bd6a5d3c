// Gateway module for app - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod config;
mod state;

// Public re-exports - the ONLY way to access app functionality
pub use config::{
    free_backend_config, load_persisted_settings, resolve_config, resolve_config_source,
    save_persisted_settings, settings_path, AiSettings, ConfigSource,
};
pub use state::CoachState;
