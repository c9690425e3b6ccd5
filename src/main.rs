//! toolscope - discover and invoke tools on MCP servers
//!
//! Main entry point: initializes tracing, loads configuration, and
//! dispatches to the command handlers. Fatal errors are rendered as a
//! structured message (kind, primary message, optional suggestion)
//! before the process exits non-zero.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use toolscope::cli::{Cli, Commands};
use toolscope::commands;
use toolscope::config::Config;
use toolscope::error::{Result, ToolscopeError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        render_error(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref().map(Path::new))?;

    // CLI timeout (seconds) overrides the configured per-request
    // timeout.
    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_millis(config.timeout_ms));

    match cli.command {
        Commands::List { server } => {
            commands::list::run_list(&config, server.as_deref(), cli.json, timeout).await
        }
        Commands::Info { server, tool } => {
            commands::list::run_info(&config, &server, &tool, cli.json, timeout).await
        }
        Commands::Call { server, tool, args } => {
            commands::call::run_call(&config, &server, &tool, args.as_deref(), cli.json, timeout)
                .await
        }
        Commands::Search { pattern } => {
            commands::search::run_search(&config, &pattern, cli.json, timeout).await
        }
    }
}

/// Initialize the tracing subscriber with an environment filter.
///
/// `RUST_LOG` wins when set; otherwise `-v` selects debug-level output
/// for this crate and the default stays at warnings.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "toolscope=debug"
    } else {
        "toolscope=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Print a structured error: kind, message, and a did-you-mean hint when
/// a close candidate exists.
fn render_error(error: &anyhow::Error) {
    match error.downcast_ref::<ToolscopeError>() {
        Some(e) => {
            eprintln!("{} {e}", format!("error[{}]:", e.kind()).red().bold());
            if let Some(hint) = suggestion_for(e) {
                eprintln!("  {} {hint}", "hint:".yellow().bold());
            }
        }
        None => eprintln!("{} {error:#}", "error:".red().bold()),
    }
}

/// A closest-match suggestion for name-shaped errors.
fn suggestion_for(error: &ToolscopeError) -> Option<String> {
    match error {
        ToolscopeError::UnknownServer { name, known } => {
            closest_match(name, known).map(|c| format!("did you mean `{c}`?"))
        }
        ToolscopeError::ToolNotFound { name, available } => {
            closest_match(name, available).map(|c| format!("did you mean `{c}`?"))
        }
        _ => None,
    }
}

/// The most similar candidate, if any is similar enough to be a likely
/// typo.
fn closest_match<'a>(target: &str, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(target, c), c.as_str()))
        .filter(|(score, _)| *score > 0.8)
        .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, c)| c)
}
