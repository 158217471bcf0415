//! Project initialization
//!
//! Handles:
//! - Configuration directory creation
//! - Default config file creation
//! - Bundled metric catalog installation
//! - Database migrations

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::fs;
use std::path::{Path, PathBuf};

use crate::adapters::sqlite::{all_embedded_migrations, create_pool, database_url, Migrator};
use crate::domain::models::DatabaseConfig;
use crate::infrastructure::config::CONFIG_DIR;

/// Default configuration template content
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Conveval Configuration
# Override settings by editing this file, adding .conveval/local.yaml,
# or setting environment variables with the CONVEVAL_ prefix
#
# Example environment variables:
#   export CONVEVAL_SERVER__PORT=9090
#   export CONVEVAL_SCORING__PROVIDER=anthropic
#   export CONVEVAL_DATABASE__PATH=/custom/path/conveval.db
#   export CONVEVAL_LOGGING__LEVEL=debug

# Job API
server:
  host: "127.0.0.1"
  port: 8080
  enable_cors: true

# SQLite database holding conversations and evaluations
database:
  path: ".conveval/conveval.db"
  max_connections: 5

logging:
  # trace, debug, info, warn, error
  level: "info"
  # json, pretty
  format: "json"
  # daily, hourly, never (only used with log_dir)
  rotation: "daily"

# Retries for scoring calls and evaluation writes
retry:
  max_retries: 2
  initial_backoff_ms: 500
  max_backoff_ms: 5000

scoring:
  # mock, anthropic
  provider: "mock"
  model: "claude-sonnet-4-20250514"
  # api_key falls back to ANTHROPIC_API_KEY
  requests_per_second: 5
  burst_size: 5

evaluation:
  metrics_path: ".conveval/metrics.json"
  default_last_x_days: 7
  conversation_table: "conversations"
  evaluation_table: "evaluations"
  page_size: 100
"#;

/// Metric catalog installed by `init`
const DEFAULT_METRICS: &str = include_str!("../../config/metrics.json");

/// Setup paths and directories
#[derive(Debug, Clone)]
pub struct SetupPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub metrics_file: PathBuf,
    pub database_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl SetupPaths {
    /// Paths for a project rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let config_dir = root.as_ref().join(CONFIG_DIR);
        Self {
            config_file: config_dir.join("config.yaml"),
            metrics_file: config_dir.join("metrics.json"),
            database_file: config_dir.join("conveval.db"),
            logs_dir: config_dir.join("logs"),
            config_dir,
        }
    }

    /// Paths for the current directory
    pub fn current() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Self::new(current_dir))
    }

    pub fn is_initialized(&self) -> bool {
        self.config_file.exists() && self.database_file.exists()
    }
}

/// What `initialize` touched.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct SetupReport {
    pub config_written: bool,
    pub metrics_written: bool,
    pub migrations_applied: usize,
}

/// Create the configuration directory tree
pub fn create_config_dir(paths: &SetupPaths) -> Result<()> {
    fs::create_dir_all(&paths.logs_dir).context("Failed to create config directory")?;
    Ok(())
}

/// Write the default configuration file. Returns whether it was written.
pub fn create_config_file(paths: &SetupPaths, force: bool) -> Result<bool> {
    if paths.config_file.exists() && !force {
        return Ok(false);
    }

    fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE).context("Failed to write config file")?;
    Ok(true)
}

/// Install the bundled metric catalog. Returns whether it was written.
pub fn create_metrics_file(paths: &SetupPaths, force: bool) -> Result<bool> {
    if paths.metrics_file.exists() && !force {
        return Ok(false);
    }

    fs::write(&paths.metrics_file, DEFAULT_METRICS).context("Failed to write metric catalog")?;
    Ok(true)
}

/// Apply pending schema migrations to an open pool.
pub async fn apply_migrations(pool: &SqlitePool) -> Result<usize> {
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Failed to run migrations")
}

/// Create the project database and bring its schema up to date.
pub async fn run_migrations(paths: &SetupPaths) -> Result<usize> {
    let config = DatabaseConfig {
        path: paths.database_file.display().to_string(),
        max_connections: 1,
    };
    let pool = create_pool(&database_url(&config), None)
        .await
        .context("Failed to connect to database")?;

    let applied = apply_migrations(&pool).await;
    pool.close().await;
    applied
}

/// Initialize a project: config, catalog, database.
pub async fn initialize(paths: &SetupPaths, force: bool) -> Result<SetupReport> {
    create_config_dir(paths)?;
    let config_written = create_config_file(paths, force)?;
    let metrics_written = create_metrics_file(paths, force)?;
    let migrations_applied = run_migrations(paths).await?;

    Ok(SetupReport {
        config_written,
        metrics_written,
        migrations_applied,
    })
}
