//! Wiring from configuration to a ready [`EvaluationService`].

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::adapters::scoring::create_scoring_client;
use crate::adapters::sqlite::{create_pool_from_config, SqliteConversationSource, SqliteEvaluationSink};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::setup::apply_migrations;
use crate::services::{
    CatalogSource, EvaluationRunner, EvaluationService, JobStore, RetryPolicy,
    SelectionQueryBuilder,
};

/// Load configuration from an explicit file or the project hierarchy.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Everything a command needs to run jobs.
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub service: EvaluationService,
}

impl AppContext {
    /// Open the database, apply migrations and assemble the runner.
    pub async fn build(config: Config) -> Result<Self> {
        let pool = create_pool_from_config(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        apply_migrations(&pool).await?;

        let evaluation = &config.evaluation;
        let source = SqliteConversationSource::new(pool.clone())
            .with_table(evaluation.conversation_table.clone())
            .with_page_size(evaluation.page_size);
        let sink = SqliteEvaluationSink::new(pool.clone()).with_table(evaluation.evaluation_table.clone());
        let scorer = create_scoring_client(&config.scoring).context("Failed to create scoring client")?;

        info!(
            scorer = scorer.name(),
            database = %config.database.path,
            metrics = %evaluation.metrics_path,
            "evaluation context ready"
        );

        let runner = EvaluationRunner::new(
            JobStore::new(),
            CatalogSource::File(PathBuf::from(&evaluation.metrics_path)),
            Arc::new(source),
            scorer,
            Arc::new(sink),
        )
        .with_query_builder(SelectionQueryBuilder::from_config(evaluation))
        .with_retry_policy(RetryPolicy::from(&config.retry));

        Ok(Self {
            config,
            pool,
            service: EvaluationService::new(runner),
        })
    }

    /// Wait for running jobs, then close the pool.
    pub async fn close(self) {
        self.service.shutdown().await;
        self.pool.close().await;
    }
}
