use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fitcoach")]
#[command(version)]
#[command(about = "Tier-aware AI coach backend", long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Persisted settings file (defaults to the user config directory)
    #[arg(long, global = true, env = "FITCOACH_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which backends are configured
    Status,
    /// Show quota ceilings
    Limits {
        /// Only this tier (free or pro)
        #[arg(long)]
        tier: Option<String>,
    },
    /// List features and their tier eligibility
    Features,
    /// Send one prompt through the tier router
    Chat {
        /// Subscription tier of the caller
        #[arg(long, default_value = "free")]
        tier: String,

        /// Feature key being invoked
        #[arg(long, default_value = "chat")]
        feature: String,

        /// System prompt
        #[arg(long, default_value = "")]
        system: String,

        /// Maximum tokens to generate
        #[arg(long)]
        max_tokens: Option<u32>,

        /// The user message
        prompt: String,
    },
    /// Manage persisted backend settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the stored settings (API key masked)
    Show,
    /// Store one setting
    Set { key: String, value: String },
    /// Remove one setting
    Unset { key: String },
}
