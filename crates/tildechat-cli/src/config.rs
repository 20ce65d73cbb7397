//! Tildechat CLI Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! - built-in defaults
//! - `tildechat.toml` in the working directory
//! - `<config dir>/tildechat/config.toml`
//! - the file named by `--config`
//! - environment variables (`TILDECHAT_CLIENT__HTTP_ENDPOINT`, ...)
//! - command line flags

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tildechat_core::{ChatConfig, ClientConfig};
use tracing::debug;

use crate::cli::Cli;
use crate::error::{CliError, Result};

/// Config file picked up from the working directory
pub const LOCAL_CONFIG_FILE: &str = "tildechat.toml";

/// Prefix for environment overrides; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "TILDECHAT_";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the terminal client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the transports connect
    pub client: ClientConfig,

    /// Chat documents and the clear command
    pub chat: ChatConfig,

    /// Terminal presentation
    pub terminal: TerminalConfig,
}

/// How the chat is drawn on the terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Printed when the history is cleared
    pub divider: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            divider: "-- cleared --".to_string(),
        }
    }
}

impl AppConfig {
    /// Load every layer, apply the flags given in `cli` and validate
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(LOCAL_CONFIG_FILE));

        if let Some(path) = Self::user_config_path() {
            debug!("Checking user configuration at {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = &cli.config {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(url) = &cli.http_endpoint {
            figment = figment.merge(("client.http_endpoint", url));
        }
        if let Some(url) = &cli.ws_endpoint {
            figment = figment.merge(("client.ws_endpoint", url));
        }

        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/tildechat/config.toml`, when the platform has a config dir
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tildechat").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;
        self.chat.validate()?;
        if self.terminal.divider.contains('\n') {
            return Err(CliError::Config("terminal.divider must be a single line".into()));
        }
        Ok(())
    }

    /// Example configuration file content
    pub fn example_config() -> Result<String> {
        let mut example = Self::default();
        example
            .client
            .headers
            .insert("Authorization".to_string(), "Bearer <token>".to_string());
        Ok(toml::to_string_pretty(&example)?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
