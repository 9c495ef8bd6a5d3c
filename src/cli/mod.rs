/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{Cli, Commands, SettingsAction};
pub use commands::handle_command;
