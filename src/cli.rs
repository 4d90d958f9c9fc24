//! CLI argument parsing module for reqbot

use crate::config::Config;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Hosting provider backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// GitHub or GitHub Enterprise REST API
    Github,
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Python requirement update bot
#[derive(Parser, Debug, Clone)]
#[command(
    name = "reqbot",
    version,
    about = "Keeps Python requirement files up to date by opening pull requests"
)]
pub struct CliArgs {
    /// Repository to update (`owner/name`)
    #[arg(long)]
    pub repo: String,

    /// Token of the repository owner
    #[arg(long, env = "REQBOT_USER_TOKEN", hide_env_values = true)]
    pub user_token: Option<String>,

    /// Token of a dedicated bot account opening the pull requests
    #[arg(long, env = "REQBOT_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Hosting provider
    #[arg(long, value_enum, default_value = "github")]
    pub provider: ProviderKind,

    /// API root of a self-hosted provider
    #[arg(long)]
    pub provider_url: Option<String>,

    /// The acting token belongs to an app installation
    #[arg(long)]
    pub integration: bool,

    /// Base branch (default: the repository's default branch)
    #[arg(long)]
    pub branch: Option<String>,

    /// First run: bundle every update into one pull request
    #[arg(long, conflicts_with = "scheduled")]
    pub initial: bool,

    /// Scheduled run: bundle updates according to the configured schedule
    #[arg(long)]
    pub scheduled: bool,

    /// Dry run mode - show what would be opened without touching the repository
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Package index JSON API root (default: https://pypi.org/pypi)
    #[arg(long)]
    pub index_url: Option<String>,

    /// Serve the repository from a local directory instead of the provider
    #[arg(long, value_name = "DIR")]
    pub fixture: Option<PathBuf>,

    /// Serve package releases from a JSON file instead of the index
    #[arg(long, value_name = "FILE")]
    pub versions: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,
}

impl CliArgs {
    /// Configuration before the repository file is merged
    pub fn to_config(&self) -> Config {
        Config {
            branch: self.branch.clone(),
            ..Config::default()
        }
    }

    /// Progress spinners are shown on interactive, non-quiet, non-JSON runs
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }
}
