//! CLI entry point for copilot-auth.

pub mod auth;

use clap::{Parser, Subcommand};

/// Copilot authentication CLI
#[derive(Parser, Debug)]
#[command(name = "copilot-auth", version, about = "Copilot device-flow authentication")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authorize this machine via the device flow
    Login(LoginArgs),
    /// Show authentication status
    Status,
    /// Print a valid service token to stdout
    Token,
    /// Remove stored credentials
    Logout,
}

/// Arguments for `copilot-auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Exchange again even if the cached service token is still valid
    #[arg(short, long)]
    pub force: bool,
}
