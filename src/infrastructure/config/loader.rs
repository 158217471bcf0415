use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{Config, ScoringProvider};

/// Directory holding project configuration, relative to the working directory.
pub const CONFIG_DIR: &str = ".conveval";

/// Prefix for environment overrides, e.g. `CONVEVAL_SERVER__PORT`.
pub const ENV_PREFIX: &str = "CONVEVAL_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port: {0}. Must be non-zero")]
    InvalidPort(u16),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid default_last_x_days: {0}. Must be at least 1")]
    InvalidTimeWindow(u32),

    #[error("Invalid page_size: {0}. Must be between 1 and 1000")]
    InvalidPageSize(u32),

    #[error("Invalid table name: '{0}'. Use letters, digits and underscores only")]
    InvalidTableName(String),

    #[error("Invalid rate limit: requests_per_second and burst_size must be at least 1")]
    InvalidRateLimit,

    #[error("Anthropic scoring requires an API key (scoring.api_key or ANTHROPIC_API_KEY)")]
    MissingApiKey,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current project.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .conveval/config.yaml (project config, created by init)
    /// 3. .conveval/local.yaml (local overrides, optional)
    /// 4. Environment variables (CONVEVAL_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Load configuration for the project rooted at `root`.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let config_dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort(config.server.port));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.evaluation.default_last_x_days == 0 {
            return Err(ConfigError::InvalidTimeWindow(
                config.evaluation.default_last_x_days,
            ));
        }

        if !(1..=1000).contains(&config.evaluation.page_size) {
            return Err(ConfigError::InvalidPageSize(config.evaluation.page_size));
        }

        for table in [
            &config.evaluation.conversation_table,
            &config.evaluation.evaluation_table,
        ] {
            if !is_identifier(table) {
                return Err(ConfigError::InvalidTableName(table.clone()));
            }
        }

        if config.scoring.requests_per_second == 0 || config.scoring.burst_size == 0 {
            return Err(ConfigError::InvalidRateLimit);
        }

        if config.scoring.provider == ScoringProvider::Anthropic
            && config.scoring.resolved_api_key().is_none()
        {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
