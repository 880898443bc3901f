use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;

use crate::model::DEFAULT_CONNECTION;

const CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "ROWBIND";

/// One named connection
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub url: String,
    /// Prepended to every table name served by this connection
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default = "default_connection_name")]
    pub default_connection: String,
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

fn default_connection_name() -> String {
    DEFAULT_CONNECTION.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_connection: default_connection_name(),
            connections: HashMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// Load the database configuration from `config/config.toml`, falling back to env vars.
    ///
    /// Environment variables use the `ROWBIND__` prefix and `__` as separator, e.g.
    /// `ROWBIND__DATABASE__CONNECTIONS__DEFAULT__URL`.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // The file existed but was unreadable: warn and retry with env only
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("failed to load {CONFIG_FILE}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, \
                             then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        Self::from_settings(&settings)
    }

    /// Parse a TOML document containing a `[database]` table
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Self::from_settings(&settings)
    }

    fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        match settings.get::<DatabaseConfig>("database") {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Database configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }
}
