mod types;

pub use types::*;

use crate::{Error, Result};
use std::{env, io::ErrorKind};
use tracing::debug;

pub async fn load() -> Result<Config> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

    debug!("Loading configuration from: {}", config_path);

    let mut config = match tokio::fs::read_to_string(&config_path).await {
        Ok(config_str) => Config::from_yaml(&config_str)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No configuration file at {}, using defaults", config_path);
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    config.apply_env_overrides(|key| env::var(key).ok());
    config.validate()?;

    Ok(config)
}

/// Validates that a log level string is valid
/// The only completion backend `OpenAiClient` speaks to. Compatible servers
/// are reached through `llm.base_url`.
pub const SUPPORTED_PROVIDER: &str = "openai";

pub fn validate_log_level(level: &str) -> Result<()> {
    level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .map_err(|_| {
            Error::config(format!(
                "Invalid log level: '{}'. Valid levels: error, warn, info, debug, trace",
                level
            ))
        })?;
    Ok(())
}

impl Config {
    pub fn from_yaml(config_str: &str) -> Result<Self> {
        // An empty document deserializes to null, which serde_yaml rejects for structs
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(config_str)?)
    }

    /// Applies environment overrides on top of the file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.server.logs.level = level;
        }
        if let Some(path) = lookup("HISTORY_DB_PATH") {
            self.server.database_path = path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.provider != SUPPORTED_PROVIDER {
            return Err(Error::config(format!(
                "Unsupported llm.provider: '{}'. Supported providers: {}",
                self.llm.provider, SUPPORTED_PROVIDER
            )));
        }
        if self.llm.api_key.trim().is_empty() {
            return Err(Error::config(
                "missing completion provider API key (set llm.api_key or OPENAI_API_KEY)",
            ));
        }
        if self.relay.capacity == 0 {
            return Err(Error::config("relay.capacity must be greater than zero"));
        }
        if self.relay.poll_interval_ms == 0 {
            return Err(Error::config(
                "relay.poll_interval_ms must be greater than zero",
            ));
        }
        validate_log_level(&self.server.logs.level)
    }
}
