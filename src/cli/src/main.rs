//! QuantDash CLI - Command-line interface for a running QuantDash relay.
//!
//! Provides commands for listing capabilities, probing them, checking relay
//! liveness, and managing local configuration.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{capabilities, config, health, probe};
use output::OutputFormat;

/// QuantDash - Resilient upstream aggregation relay CLI
#[derive(Parser)]
#[command(
    name = "quantdash",
    version,
    about = "QuantDash - Resilient upstream aggregation relay",
    long_about = "CLI tool for inspecting and probing the capabilities served by a QuantDash relay.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Relay base URL
    #[arg(long, global = true, env = "QUANTDASH_API_URL")]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the capabilities the relay serves
    Capabilities,

    /// Run a capability and show the envelope
    Probe(probe::ProbeArgs),

    /// Check relay liveness
    Health,

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(config::load_api_url)
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let client = client::ApiClient::new(&api_url)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Capabilities => capabilities::execute(&client, format).await,
        Commands::Probe(args) => probe::execute(args, &client, format).await,
        Commands::Health => health::execute(&client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
