//! Revert CLI - roll published content back to a recorded state
//!
//! Given a publish log, this CLI:
//! - Unpublishes items that were not published in an environment when the log was written
//! - Re-publishes the others at the version the log recorded
//! - Writes success and failure logs for every batch
//! - Replays a failure log with `--retry-failed`

use clap::Parser;
use std::ffi::OsString;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod commands;
mod config;
mod consumers;
mod error;
mod output;
mod run_log;

use commands::retry::RetryTarget;
use config::RevertConfig;
use error::CliResult;

/// Revert CLI application
#[derive(Parser)]
#[command(name = "revert")]
#[command(about = "Revert published content to the state recorded in a publish log", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "REVERT_CONFIG")]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Replay a failure log instead of reverting
    #[arg(long, alias = "retryFailed")]
    retry_failed: bool,

    /// Queue to replay onto (inferred from the log name when omitted)
    #[arg(long, value_enum, requires = "retry_failed")]
    target: Option<RetryTarget>,

    /// Replay entry/asset publish failures instead of whole batches
    #[arg(long, requires = "retry_failed", conflicts_with = "target")]
    typed: bool,

    /// Log file; relative names are looked up in the configured log directory
    log_file: String,
}

/// Single-dash flag spelling kept from the older `revert -retryFailed <log>` usage
const LEGACY_RETRY_FLAG: &str = "-retryFailed";

/// Rewrite legacy flag spellings clap would split into short flags
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut positional = false;
    args.into_iter()
        .map(|arg| {
            if arg == "--" {
                positional = true;
            }
            if !positional && arg == LEGACY_RETRY_FLAG {
                OsString::from("--retry-failed")
            } else {
                arg
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    // Load config
    let config = RevertConfig::load(cli.config.as_deref())?;

    // Initialize tracing
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());
    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().without_time())
            .init();
    }

    // Execute command
    if cli.retry_failed {
        commands::retry::execute(&cli.log_file, cli.target, cli.typed, &config).await
    } else {
        commands::revert::execute(&cli.log_file, cli.yes, &config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(args.iter().map(|a| OsString::from(*a)))).unwrap()
    }

    #[test]
    fn test_legacy_retry_flag() {
        let cli = parse(&["revert", "-retryFailed", "revert-unpublish.error"]);
        assert!(cli.retry_failed);
        assert_eq!(cli.log_file, "revert-unpublish.error");

        let cli = parse(&["revert", "--retryFailed", "revert-publish.error"]);
        assert!(cli.retry_failed);
    }

    #[test]
    fn test_legacy_flag_after_separator_is_a_file() {
        let cli = parse(&["revert", "--yes", "--", "-retryFailed"]);
        assert!(!cli.retry_failed);
        assert_eq!(cli.log_file, "-retryFailed");
    }
}
