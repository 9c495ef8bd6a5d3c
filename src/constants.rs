/// Constants module to avoid magic numbers in the codebase

// Hosted endpoints
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// Default models, used when a config record omits `model`
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_COMPATIBLE_MODEL: &str = "default";

// Generation
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

// Quota defaults (calls per period)
pub const FREE_DAILY_LIMIT: u32 = 15;
pub const FREE_MONTHLY_LIMIT: u32 = 200;
pub const PRO_DAILY_LIMIT: u32 = 50;
pub const PRO_MONTHLY_LIMIT: u32 = 500;

// Process configuration
pub const ENV_PREFIX: &str = "AI_";
pub const LEGACY_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

// Persisted settings keys
pub const SETTING_PROVIDER: &str = "provider";
pub const SETTING_MODEL: &str = "model";
pub const SETTING_API_KEY: &str = "api_key";
pub const SETTING_BASE_URL: &str = "base_url";
pub const SETTING_SUPPORTS_TOOLS: &str = "supports_tools";
