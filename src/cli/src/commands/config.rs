//! Configuration management commands.
//!
//! Stores CLI configuration in `~/.quantdash/config.toml`.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::output::{self, OutputFormat};

/// Keys the CLI itself reads.
const KNOWN_KEYS: &[&str] = &["api-url"];

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., api-url)
        key: String,
        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show all configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Persistent CLI configuration stored on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".quantdash").join("config.toml"))
}

/// Load the CLI configuration, returning defaults if the file does not exist.
fn load_config_from(path: &Path) -> Result<CliConfig> {
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn save_config_to(path: &Path, cfg: &CliConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(cfg).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Load the `api-url` value from the config file, if set.
pub fn load_api_url() -> Option<String> {
    let path = config_path().ok()?;
    load_config_from(&path)
        .ok()
        .and_then(|cfg| cfg.values.get("api-url").cloned())
}

pub fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    let path = config_path()?;

    match cmd {
        ConfigCommands::Set { key, value } => {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                output::print_warning(&format!("'{}' is not a key the CLI reads", key));
            }
            let mut cfg = load_config_from(&path)?;
            cfg.values.insert(key.clone(), value.clone());
            save_config_to(&path, &cfg)?;

            match format {
                OutputFormat::Table => output::print_success(&format!("{} = {}", key, value)),
                _ => output::print_item(&serde_json::json!({ "key": key, "value": value }), format)?,
            }
        }

        ConfigCommands::Get { key } => {
            let cfg = load_config_from(&path)?;
            match cfg.values.get(&key) {
                Some(value) => match format {
                    OutputFormat::Table => println!("{}", value),
                    _ => output::print_item(
                        &serde_json::json!({ "key": key, "value": value }),
                        format,
                    )?,
                },
                None => anyhow::bail!("Key '{}' not found", key),
            }
        }

        ConfigCommands::Show => {
            let cfg = load_config_from(&path)?;

            if cfg.values.is_empty() {
                output::print_info("No configuration values set.");
                return Ok(());
            }

            match format {
                OutputFormat::Table => {
                    output::print_header("Configuration");
                    for (k, v) in &cfg.values {
                        output::print_detail(k, v);
                    }
                }
                _ => output::print_item(&cfg.values, format)?,
            }
        }

        ConfigCommands::Reset { force } => {
            if !force {
                output::print_info("This will reset all CLI configuration. Use --force to confirm.");
                return Ok(());
            }

            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }

            output::print_success("Configuration reset to defaults");
        }
    }

    Ok(())
}
