pub mod config;
pub mod pid;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use wg_domain::config::Config;

/// wagate: WhatsApp session gateway.
#[derive(Debug, Parser)]
#[command(name = "wagate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP gateway (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any problems.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "WG_CONFIG";

/// Load the configuration named by `WG_CONFIG` (or `config.toml`).
///
/// A missing file means every default applies.  Returns the config and
/// the path that was consulted.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".into());
    let config = load_from(Path::new(&config_path))?;
    Ok((config, config_path))
}

fn load_from(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("loading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, Config::default().server.port);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[whatsapp]\nsession_prefix = \"shop_\"\n").unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config.whatsapp.session_prefix, "shop_");
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }

    #[test]
    fn cli_parses_config_subcommand() {
        let cli = Cli::parse_from(["wagate", "config", "validate"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand::Validate))
        ));
        assert!(Cli::parse_from(["wagate"]).command.is_none());
    }
}
