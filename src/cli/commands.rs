use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::collections::HashMap;
use std::path::Path;

use crate::{
    app::{
        load_persisted_settings, resolve_config_source, save_persisted_settings, settings_path,
        AiSettings, CoachState,
    },
    constants::{
        SETTING_API_KEY, SETTING_BASE_URL, SETTING_MODEL, SETTING_PROVIDER, SETTING_SUPPORTS_TOOLS,
    },
    models::{ChatMessage, ChatOptions},
    tiers::{features, Tier},
};

use super::{Cli, Commands, SettingsAction};

const SETTING_KEYS: &[&str] = &[
    SETTING_PROVIDER,
    SETTING_MODEL,
    SETTING_API_KEY,
    SETTING_BASE_URL,
    SETTING_SUPPORTS_TOOLS,
];

/// Handle CLI subcommands
pub async fn handle_command(cli: &Cli) -> Result<()> {
    let path = match &cli.settings {
        Some(path) => path.clone(),
        None => settings_path()?,
    };

    match &cli.command {
        Commands::Status => show_status(&path),
        Commands::Limits { tier } => {
            show_limits(&path, tier.as_deref())?;
            Ok(())
        },
        Commands::Features => {
            show_features();
            Ok(())
        },
        Commands::Chat {
            tier,
            feature,
            system,
            max_tokens,
            prompt,
        } => {
            let options = ChatOptions {
                max_tokens: *max_tokens,
            };
            run_chat(&path, Tier::parse(tier), feature, system, prompt, &options).await
        },
        Commands::Settings { action } => handle_settings(&path, action),
    }
}

fn load_state(path: &Path) -> Result<CoachState> {
    let persisted = load_persisted_settings(path)?;
    let settings = AiSettings::from_env()?;
    CoachState::from_settings(persisted.as_ref(), settings)
        .context("Failed to configure AI backends")
}

fn show_status(path: &Path) -> Result<()> {
    let persisted = load_persisted_settings(path)?;
    let settings = AiSettings::from_env()?;

    println!("AI coach status:");
    println!();

    match resolve_config_source(persisted.as_ref(), &settings) {
        Some((source, config)) => {
            println!("  Source:       {}", source.to_string().cyan());
            println!("  Provider:     {}", config.provider);
            println!("  Model:        {}", config.model);
            if !config.base_url.is_empty() {
                println!("  Base URL:     {}", config.base_url);
            }
            println!(
                "  API key:      {}",
                if config.api_key.is_empty() { "not set" } else { "set" }
            );
            println!("  Native tools: {}", config.supports_native_tools);
        },
        None => println!("  [WARNING] No pro backend configured"),
    }

    let state = CoachState::from_settings(persisted.as_ref(), settings)
        .context("Failed to configure AI backends")?;
    if state.pro_backend().is_some() {
        println!("  [OK] Pro backend ready");
    } else {
        println!("  [WARNING] Pro backend not available");
    }
    match state.free_backend() {
        Some(backend) => println!(
            "  [OK] Free backend: {}/{}",
            backend.provider(),
            backend.model()
        ),
        None => println!("  [WARNING] Free tier not configured"),
    }
    println!();
    Ok(())
}

fn show_limits(path: &Path, tier: Option<&str>) -> Result<()> {
    let state = load_state(path)?;
    let tiers = match tier {
        Some(t) => vec![Tier::parse(t)],
        None => vec![Tier::Free, Tier::Pro],
    };
    for tier in tiers {
        let limits = state.limits(tier);
        println!(
            "  {:<5} {} per day, {} per month",
            tier.to_string().bold(),
            limits.daily,
            limits.monthly
        );
    }
    Ok(())
}

fn show_features() {
    println!("Features:");
    for feature in features() {
        let tier = if feature.available_on_free_tier {
            "free".green()
        } else {
            "pro".yellow()
        };
        println!("  • {:<16} {:<16} {}", feature.key, feature.label, tier);
    }
}

async fn run_chat(
    path: &Path,
    tier: Tier,
    feature: &str,
    system: &str,
    prompt: &str,
    options: &ChatOptions,
) -> Result<()> {
    let state = load_state(path)?;
    let decision = state.route(tier, feature);

    if decision.blocked {
        bail!(
            "Not allowed: {}",
            decision.reason.unwrap_or_else(|| "blocked".to_string())
        );
    }
    let Some(backend) = decision.backend else {
        bail!(
            "AI coach unavailable: {}",
            decision.reason.unwrap_or_else(|| "not configured".to_string())
        );
    };

    let messages = [ChatMessage::user(prompt)];
    let result = backend
        .chat(system, &messages, options)
        .await
        .with_context(|| format!("{} backend call failed", backend.provider()))?;

    println!("{}", result.text_or_empty());
    if let Some(usage) = result.usage {
        tracing::debug!(
            "tokens: prompt={}, completion={}",
            usage.prompt_tokens,
            usage.completion_tokens
        );
    }
    Ok(())
}

fn handle_settings(path: &Path, action: &SettingsAction) -> Result<()> {
    let mut stored: HashMap<String, String> = load_persisted_settings(path)?.unwrap_or_default();

    match action {
        SettingsAction::Show => {
            println!("Settings ({}):", path.display());
            let mut keys: Vec<_> = stored.keys().collect();
            keys.sort();
            for key in keys {
                let value = if key == SETTING_API_KEY {
                    "********".to_string()
                } else {
                    stored[key].clone()
                };
                println!("  {} = {}", key, value);
            }
        },
        SettingsAction::Set { key, value } => {
            if !SETTING_KEYS.contains(&key.as_str()) {
                bail!(
                    "Unknown setting '{}'. Expected one of: {}",
                    key,
                    SETTING_KEYS.join(", ")
                );
            }
            if key == SETTING_PROVIDER {
                value
                    .parse::<crate::models::Provider>()
                    .with_context(|| format!("Cannot store provider '{}'", value))?;
            }
            stored.insert(key.clone(), value.clone());
            save_persisted_settings(path, &stored)?;
            println!("Saved {} to {}", key.green(), path.display());
        },
        SettingsAction::Unset { key } => {
            if stored.remove(key).is_some() {
                save_persisted_settings(path, &stored)?;
                println!("Removed {}", key);
            } else {
                println!("{} was not set", key);
            }
        },
    }
    Ok(())
}
