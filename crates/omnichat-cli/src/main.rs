//! Omnichat CLI: entry point.
//!
//! # Commands
//!
//! - `omnichat chat [-m MESSAGE] [--model provider:model] [--system TEXT]`: single-shot or REPL
//! - `omnichat providers`: list provider keys and credential status

mod helpers;
mod providers_cmd;
mod repl;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use omnichat_agent::{ChatOptions, Client};
use omnichat_core::config::{load_config, ChatDefaults, Config};
use omnichat_core::utils::expand_home;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Omnichat: one chat interface for many LLM providers
#[derive(Parser)]
#[command(name = "omnichat", version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.omnichat/config.json)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with a model (single-shot or interactive REPL)
    Chat {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Model identifier, "provider:model" (default from config)
        #[arg(long)]
        model: Option<String>,

        /// System prompt prepended to the conversation
        #[arg(long)]
        system: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// List supported providers and whether credentials are configured
    Providers,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref().map(expand_home);
    init_logging(debug_logs(&cli.command));

    match cli.command {
        Commands::Chat {
            message,
            model,
            system,
            ..
        } => run_chat(config_path, message, model, system).await,
        Commands::Providers => providers_cmd::run(config_path.as_deref()),
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(
    config_path: Option<PathBuf>,
    message: Option<String>,
    model: Option<String>,
    system: Option<String>,
) -> Result<()> {
    let config = load_config(config_path.as_deref());
    let model = model.unwrap_or_else(|| config.defaults.model.clone());
    let mut session = repl::Session::new(build_client(&config), model, chat_options(&config.defaults));
    if let Some(system) = system {
        session.set_system(system);
    }

    match message {
        Some(msg) => {
            info!(model = %session.model(), "processing single message");
            let response = session
                .send(&msg)
                .await
                .context("chat completion failed")?;
            helpers::print_response(&response);
        }
        None => repl::run(session).await?,
    }

    Ok(())
}

/// Build a `Client` from the loaded configuration.
fn build_client(config: &Config) -> Client {
    Client::with_config(config.providers.clone())
}

/// Per-call options from the configured defaults.
///
/// `max_turns` only takes effect once tools are attached.
fn chat_options(defaults: &ChatDefaults) -> ChatOptions {
    ChatOptions::default()
        .with_max_tokens(defaults.max_tokens)
        .with_temperature(defaults.temperature)
        .with_max_turns(defaults.max_turns)
}

/// Whether the command asked for debug logging. Every command logs warnings.
fn debug_logs(command: &Commands) -> bool {
    matches!(command, Commands::Chat { logs: true, .. })
}

fn log_directives(verbose: bool) -> &'static str {
    if verbose {
        "omnichat=debug,info"
    } else {
        "warn"
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_directives(verbose)))
        .with_target(false)
        .compact()
        .init();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
