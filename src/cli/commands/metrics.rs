//! Implementation of the `conveval metrics` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, MetricDefinition};
use crate::services::MetricCatalog;

#[derive(Args, Debug)]
pub struct MetricsArgs {
    /// Catalog file (defaults to evaluation.metrics_path)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Only metrics applicable to this agent
    #[arg(long)]
    pub agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MetricsOutput {
    pub metrics: Vec<MetricDefinition>,
    pub total_metrics: usize,
}

impl CommandOutput for MetricsOutput {
    fn to_human(&self) -> String {
        if self.metrics.is_empty() {
            return "No metrics apply.".to_string();
        }
        format!(
            "{}\n{} metric(s)",
            TableFormatter::new().format_metrics(&self.metrics),
            self.total_metrics
        )
    }
}

pub async fn execute(args: MetricsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let path = args
        .file
        .unwrap_or_else(|| PathBuf::from(&config.evaluation.metrics_path));
    let catalog = MetricCatalog::load_from_file(&path)
        .await
        .with_context(|| format!("Failed to load metric catalog {}", path.display()))?;

    let metrics: Vec<MetricDefinition> = match args.agent.as_deref() {
        Some(agent) => catalog.applicable_to(agent).cloned().collect(),
        None => catalog.all().to_vec(),
    };

    output(
        &MetricsOutput {
            total_metrics: metrics.len(),
            metrics,
        },
        json_mode,
    );
    Ok(())
}
