// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ragstream - stream answers from a RAG chat backend into the terminal.
//!
//! This is the binary entry point.

mod chat;
mod documents;
mod printer;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use ragstream_config::{ConfigError, RagstreamConfig};

/// ragstream - stream answers from a RAG chat backend.
#[derive(Parser, Debug)]
#[command(name = "ragstream", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question and stream the answer to stdout.
    Chat(chat::ChatArgs),
    /// Validate the configuration and report every problem found.
    CheckConfig,
    /// List the documents available to the conversation.
    Documents(documents::DocumentsArgs),
}

fn load_config(path: Option<&PathBuf>) -> Result<RagstreamConfig, Vec<ConfigError>> {
    match path {
        Some(path) if !path.exists() => Err(vec![ConfigError::Other(format!(
            "config file not found: {}",
            path.display()
        ))]),
        Some(path) => ragstream_config::load_and_validate_path(path),
        None => ragstream_config::load_and_validate(),
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout stays the answer.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ragstream={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            ragstream_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.app.log_level);

    let result = match cli.command {
        Commands::CheckConfig => {
            println!(
                "{} (backend={}, flush_interval_ms={})",
                "configuration is valid".green(),
                config.backend.base_url,
                config.delivery.flush_interval_ms
            );
            Ok(())
        }
        Commands::Chat(args) => chat::run(&config, args).await,
        Commands::Documents(args) => documents::run(&config, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red(), e.user_message());
            ExitCode::FAILURE
        }
    }
}
