use directories::ProjectDirs;
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{
    ENV_PREFIX, LEGACY_API_KEY_VAR, SETTINGS_FILE_NAME, SETTING_API_KEY, SETTING_BASE_URL,
    SETTING_MODEL, SETTING_PROVIDER, SETTING_SUPPORTS_TOOLS,
};
use crate::models::{BackendConfig, Provider};
use crate::tiers::QuotaOverrides;
use crate::utils::ConfigError;

/// Process configuration: the `AI_*` variable family plus the legacy key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSettings {
    /// Pro backend (`AI_PROVIDER`, `AI_MODEL`, ...)
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub supports_tools: Option<bool>,

    /// Shared free-tier backend (`AI_FREE_*`)
    pub free_provider: Option<String>,
    pub free_model: Option<String>,
    pub free_api_key: Option<String>,
    pub free_base_url: Option<String>,

    /// Quota ceilings (`AI_FREE_DAILY_LIMIT`, ...)
    pub free_daily_limit: Option<u32>,
    pub free_monthly_limit: Option<u32>,
    pub pro_daily_limit: Option<u32>,
    pub pro_monthly_limit: Option<u32>,

    /// `ANTHROPIC_API_KEY`, kept for older deployments
    pub legacy_api_key: Option<String>,
}

impl AiSettings {
    /// Layered sources: defaults, then `AI_*`, then the legacy variable
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(AiSettings::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(
                Env::raw()
                    .only(&[LEGACY_API_KEY_VAR])
                    .map(|_| "legacy_api_key".into()),
            )
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::figment()
            .extract()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn quota_overrides(&self) -> QuotaOverrides {
        QuotaOverrides {
            free_daily_limit: self.free_daily_limit,
            free_monthly_limit: self.free_monthly_limit,
            pro_daily_limit: self.pro_daily_limit,
            pro_monthly_limit: self.pro_monthly_limit,
        }
    }
}

/// Where the active backend config came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Persisted,
    Environment,
    Legacy,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Persisted => "persisted settings",
            Self::Environment => "environment",
            Self::Legacy => "legacy ANTHROPIC_API_KEY",
        })
    }
}

/// Blank strings count as unset
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Default model for a provider name; unknown names are left for the factory to reject
fn default_model_for(provider: &str) -> String {
    provider
        .parse::<Provider>()
        .map(|p| p.default_model().to_string())
        .unwrap_or_default()
}

fn build_config(
    provider: &str,
    model: Option<&str>,
    api_key: Option<&str>,
    base_url: Option<&str>,
    supports_native_tools: bool,
) -> BackendConfig {
    BackendConfig {
        provider: provider.to_string(),
        model: non_blank(model)
            .map(str::to_string)
            .unwrap_or_else(|| default_model_for(provider)),
        api_key: non_blank(api_key).unwrap_or_default().to_string(),
        base_url: non_blank(base_url).unwrap_or_default().to_string(),
        supports_native_tools,
    }
}

/// Active pro backend config and its source. First usable source wins;
/// fields are never merged across sources.
pub fn resolve_config_source(
    persisted: Option<&HashMap<String, String>>,
    settings: &AiSettings,
) -> Option<(ConfigSource, BackendConfig)> {
    if let Some(stored) = persisted {
        let get = |key: &str| stored.get(key).map(String::as_str);
        if let Some(provider) = non_blank(get(SETTING_PROVIDER)) {
            // Stored as text; only the literal "false" disables tools
            let tools = get(SETTING_SUPPORTS_TOOLS).map(str::trim) != Some("false");
            let config = build_config(
                provider,
                get(SETTING_MODEL),
                get(SETTING_API_KEY),
                get(SETTING_BASE_URL),
                tools,
            );
            return Some((ConfigSource::Persisted, config));
        }
    }

    if let Some(provider) = non_blank(settings.provider.as_deref()) {
        let config = build_config(
            provider,
            settings.model.as_deref(),
            settings.api_key.as_deref(),
            settings.base_url.as_deref(),
            settings.supports_tools.unwrap_or(true),
        );
        return Some((ConfigSource::Environment, config));
    }

    if let Some(key) = non_blank(settings.legacy_api_key.as_deref()) {
        return Some((
            ConfigSource::Legacy,
            BackendConfig::new(Provider::Anthropic, key),
        ));
    }

    None
}

/// Active pro backend config, or `None` when nothing is configured
pub fn resolve_config(
    persisted: Option<&HashMap<String, String>>,
    settings: &AiSettings,
) -> Option<BackendConfig> {
    resolve_config_source(persisted, settings).map(|(_, config)| config)
}

/// Config for the shared free-tier backend. Provider defaults to Gemini.
pub fn free_backend_config(settings: &AiSettings) -> Option<BackendConfig> {
    let provider = non_blank(settings.free_provider.as_deref());
    let api_key = non_blank(settings.free_api_key.as_deref());
    if provider.is_none() && api_key.is_none() {
        return None;
    }

    let provider = provider.unwrap_or(Provider::Gemini.as_str());
    Some(build_config(
        provider,
        settings.free_model.as_deref(),
        api_key,
        settings.free_base_url.as_deref(),
        true,
    ))
}

/// Default location of the persisted settings file
pub fn settings_path() -> Result<PathBuf, ConfigError> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "fitcoach") {
        Ok(proj_dirs.config_dir().join(SETTINGS_FILE_NAME))
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::Invalid("Could not determine home directory".to_string()))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("fitcoach")
            .join(SETTINGS_FILE_NAME))
    }
}

/// Read the flat key/value settings table. A missing file is `Ok(None)`.
pub fn load_persisted_settings(path: &Path) -> Result<Option<HashMap<String, String>>, ConfigError> {
    if !path.exists() {
        debug!("No persisted settings at {}", path.display());
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;
    let settings: HashMap<String, String> = toml::from_str(&raw)
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?;
    Ok(Some(settings))
}

/// Write the settings table, creating parent directories as needed
pub fn save_persisted_settings(
    path: &Path,
    settings: &HashMap<String, String>,
) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Sorted keys keep the file stable across writes
    let sorted: BTreeMap<&String, &String> = settings.iter().collect();
    let toml_string =
        toml::to_string_pretty(&sorted).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    std::fs::write(path, toml_string)?;
    Ok(())
}
