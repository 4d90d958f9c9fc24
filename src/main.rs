//! reqbot - Python requirement update bot CLI
//!
//! Checks the requirement files of one repository and opens pull requests
//! for outdated or unpinned packages.

use anyhow::{bail, Context};
use clap::Parser;
use reqbot::cli::{CliArgs, ProviderKind};
use reqbot::orchestrator::{Bot, RunOptions};
use reqbot::output::{create_formatter, OutputConfig};
use reqbot::provider::{GitHubProvider, InMemoryProvider, Provider};
use reqbot::registry::{HttpClient, InMemoryOracle, PyPIOracle, VersionOracle};
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;

fn initialize_logger(level: log::LevelFilter) -> anyhow::Result<()> {
    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("reqbot")
        .build();

    // stdout carries the report
    simplelog::TermLogger::init(
        level,
        config,
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(e) = initialize_logger(args.log_level.into()) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_provider(args: &CliArgs) -> anyhow::Result<Arc<dyn Provider>> {
    if let Some(dir) = &args.fixture {
        let provider = InMemoryProvider::from_dir(&args.repo, "main", dir)
            .with_context(|| format!("failed to load fixture {}", dir.display()))?;
        return Ok(Arc::new(provider));
    }

    match args.provider {
        ProviderKind::Github => {
            let Some(token) = args.user_token.clone() else {
                bail!("a user token is required (--user-token or REQBOT_USER_TOKEN)");
            };
            let mut provider = GitHubProvider::new(&args.repo, token, args.bot_token.clone())?
                .with_integration(args.integration);
            if let Some(url) = &args.provider_url {
                provider = provider.with_base_url(url);
            }
            Ok(Arc::new(provider))
        }
    }
}

fn build_oracle(args: &CliArgs) -> anyhow::Result<Arc<dyn VersionOracle>> {
    if let Some(path) = &args.versions {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return Ok(Arc::new(InMemoryOracle::from_json(&content)?));
    }

    let mut oracle = PyPIOracle::new(HttpClient::new()?);
    if let Some(url) = &args.index_url {
        oracle = oracle.with_base_url(url);
    }
    Ok(Arc::new(oracle))
}

async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    log::debug!("reqbot v{} on {}", env!("CARGO_PKG_VERSION"), args.repo);

    let provider = build_provider(&args)?;
    let oracle = build_oracle(&args)?;
    let mut bot = Bot::new(provider, oracle, args.to_config());

    let options = RunOptions {
        initial: args.initial,
        scheduled: args.scheduled,
        dry_run: args.dry_run,
        show_progress: args.show_progress() && io::stderr().is_terminal(),
    };
    let summary = bot.run(&options).await?;

    let mut output_config = OutputConfig::from_cli(args.json, args.verbose, args.quiet);
    output_config.color = io::stdout().is_terminal();
    let formatter = create_formatter(output_config);

    let mut stdout = io::stdout().lock();
    formatter.format(&summary, &mut stdout)?;
    stdout.flush()?;

    if summary.has_errors() {
        // Partial success - some units or files failed
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
