//! CLI module - Command-line interface for Kale
//!
//! This module provides a structured CLI using clap for argument parsing.

use clap::{Parser, Subcommand};

/// Kale - account and prediction backend
#[derive(Parser)]
#[command(name = "kale")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP API and the expiry sweeper (default)
    #[command(alias = "daemon")]
    Serve,

    /// Delete expired codes, revoked tokens and stale unverified accounts once
    Sweep,

    /// Create default config file
    #[command(alias = "init")]
    InitConfig,
}

impl Cli {
    #[must_use]
    pub fn command_or_default(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::parse_from(["kale"]);
        assert_eq!(cli.command_or_default(), &Commands::Serve);
    }

    #[test]
    fn test_subcommands_parse() {
        assert_eq!(
            Cli::parse_from(["kale", "sweep"]).command,
            Some(Commands::Sweep)
        );
        assert_eq!(
            Cli::parse_from(["kale", "init-config"]).command,
            Some(Commands::InitConfig)
        );
        assert_eq!(
            Cli::parse_from(["kale", "daemon"]).command,
            Some(Commands::Serve)
        );
    }
}
