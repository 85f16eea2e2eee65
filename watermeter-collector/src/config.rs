use std::{collections::HashMap, env, fmt, time::Duration};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use watermeter_db::db::ConnectionSettings;

pub const DEFAULT_METER_API_URL: &str = "http://192.168.1.100/api/data";
pub const DEFAULT_CONFIG_PATH: &str = "watermeter.toml";
/// Names the optional TOML file read before the environment.
pub const CONFIG_PATH_VAR: &str = "WATERMETER_CONFIG";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("{0} must be set and non-empty")]
    Missing(&'static str),
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Runtime settings. Keys match the environment variable names, lowercased
/// (`DB_USER` -> `db_user`).
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub meter_api_url: String,
    /// Seconds.
    pub meter_api_timeout: u64,
    /// Seconds between poll cycles.
    pub collection_interval: u64,
    /// Seconds to wait after a cycle that failed on the database connection.
    pub retry_delay: u64,
    pub meter_id: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    #[serde(default)]
    pub db_user: String,
    #[serde(default)]
    pub db_password: String,
    pub metrics_bind_addr: Option<String>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("meter_api_url", &self.meter_api_url)
            .field("meter_api_timeout", &self.meter_api_timeout)
            .field("collection_interval", &self.collection_interval)
            .field("retry_delay", &self.retry_delay)
            .field("meter_id", &self.meter_id)
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("metrics_bind_addr", &self.metrics_bind_addr)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment, layered over the optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(env::vars().collect())
    }

    /// Load from an explicit set of variables instead of the process environment.
    pub fn from_source(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let path = vars
            .get(CONFIG_PATH_VAR)
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let vars: config::Map<String, String> = vars.into_iter().collect();

        let cfg: AppConfig = Config::builder()
            .set_default("meter_api_url", DEFAULT_METER_API_URL)?
            .set_default("meter_api_timeout", 10_i64)?
            .set_default("collection_interval", 300_i64)?
            .set_default("retry_delay", 30_i64)?
            .set_default("meter_id", "default_meter")?
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432_i64)?
            .set_default("db_name", "watermeter")?
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(Environment::default().source(Some(vars)))
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.db_user.trim().is_empty() {
            return Err(ConfigError::Missing("DB_USER"));
        }
        if self.db_password.is_empty() {
            return Err(ConfigError::Missing("DB_PASSWORD"));
        }
        if self.meter_api_timeout == 0 {
            return Err(ConfigError::NotPositive("METER_API_TIMEOUT"));
        }
        if self.collection_interval == 0 {
            return Err(ConfigError::NotPositive("COLLECTION_INTERVAL"));
        }
        Ok(())
    }

    pub fn meter_api_timeout(&self) -> Duration {
        Duration::from_secs(self.meter_api_timeout)
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.db_host.clone(),
            port: self.db_port,
            database: self.db_name.clone(),
            user: self.db_user.clone(),
            password: self.db_password.clone(),
        }
    }
}
