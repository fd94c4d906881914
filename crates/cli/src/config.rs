//! Layered configuration: defaults, then an optional file, then `EDX_*`
//! environment variables, then command-line flags.

use anyhow::{Context, Result};
use clap::ValueEnum;
use config::{Config, Environment, File as ConfigFile};
use edx_registrar::RegistrarConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_CONFIG_FILE: &str = "edx-names.toml";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Process-level settings read next to the registrar settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ShellSettings {
    rpc_url: String,
    log_level: String,
    log_format: LogFormat,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rpc_url: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub registrar: RegistrarConfig,
}

impl AppConfig {
    /// Load configuration. An explicit `path` must exist; otherwise
    /// `edx-names.toml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };
        Self::load_with_env(resolved.as_deref(), Environment::with_prefix("EDX"))
    }

    pub(crate) fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(ConfigFile::from(path));
        }
        builder = builder.add_source(env.try_parsing(true));
        let config = builder.build().context("failed to read configuration")?;

        let shell: ShellSettings = config
            .clone()
            .try_deserialize()
            .context("invalid shell settings")?;
        let registrar: RegistrarConfig = config
            .try_deserialize()
            .context("invalid registrar settings")?;
        registrar.validate()?;

        Ok(Self {
            rpc_url: shell.rpc_url,
            log_level: shell.log_level,
            log_format: shell.log_format,
            registrar,
        })
    }
}
