//! Metric catalog.
//!
//! An immutable, ordered set of metric definitions. Reloading means
//! building a new catalog; a running job keeps the instance it started with.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::errors::{EvaluationError, EvaluationResult};
use crate::domain::models::MetricDefinition;

/// Read-only accessor over a loaded metric set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricCatalog {
    metrics: Vec<MetricDefinition>,
}

impl MetricCatalog {
    /// Build a catalog, rejecting empty or duplicate names and empty prompts.
    pub fn new(metrics: Vec<MetricDefinition>) -> EvaluationResult<Self> {
        let mut seen = HashSet::new();
        for metric in &metrics {
            if metric.name.trim().is_empty() {
                return Err(EvaluationError::Catalog("metric name cannot be empty".to_string()));
            }
            if metric.prompt.trim().is_empty() {
                return Err(EvaluationError::Catalog(format!(
                    "metric '{}' has an empty prompt",
                    metric.name
                )));
            }
            if !seen.insert(metric.name.as_str()) {
                return Err(EvaluationError::Catalog(format!(
                    "duplicate metric name '{}'",
                    metric.name
                )));
            }
        }
        Ok(Self { metrics })
    }

    /// Parse a JSON array of metric definitions.
    pub fn from_json(raw: &str) -> EvaluationResult<Self> {
        let metrics: Vec<MetricDefinition> = serde_json::from_str(raw)
            .map_err(|e| EvaluationError::Catalog(format!("invalid metric catalog: {e}")))?;
        Self::new(metrics)
    }

    /// Read and validate a catalog JSON file.
    pub async fn load_from_file(path: &Path) -> EvaluationResult<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            EvaluationError::Catalog(format!("failed to read {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json(&raw)?;
        info!(path = %path.display(), metrics = catalog.len(), "loaded metric catalog");
        Ok(catalog)
    }

    /// Every metric, in catalog order.
    pub fn all(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    /// Metrics that apply to the agent, in catalog order.
    pub fn applicable_to<'a>(
        &'a self,
        agent_id: &'a str,
    ) -> impl Iterator<Item = &'a MetricDefinition> + 'a {
        self.metrics.iter().filter(move |m| m.applies_to(agent_id))
    }

    /// Metric by name.
    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Number of metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether the catalog has no metrics.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Where a runner gets its catalog from at each job start.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// Re-read from disk for every job
    File(PathBuf),
    /// Fixed set, shared across jobs
    Fixed(Arc<MetricCatalog>),
}

impl CatalogSource {
    /// Source that always yields `catalog`.
    pub fn fixed(catalog: MetricCatalog) -> Self {
        Self::Fixed(Arc::new(catalog))
    }

    /// Load the catalog for one job.
    pub async fn load(&self) -> EvaluationResult<Arc<MetricCatalog>> {
        match self {
            Self::File(path) => MetricCatalog::load_from_file(path).await.map(Arc::new),
            Self::Fixed(catalog) => {
                debug!(metrics = catalog.len(), "using fixed metric catalog");
                Ok(Arc::clone(catalog))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ValueType;
    use std::io::Write;

    const CATALOG: &str = r#"[
        {"name": "toxicity_score", "prompt": "Rate toxicity 0-10", "type": "numeric", "applicable_agents": ["all"]},
        {"name": "compliance_status", "prompt": "COMPLIANT or NOT", "type": "string", "applicable_agents": ["agent-1"]},
        {"name": "escalation_necessity", "prompt": "Escalate?", "type": "boolean", "applicable_agents": ["agent-2", "agent-1"]}
    ]"#;

    #[test]
    fn test_from_json_preserves_order() {
        let catalog = MetricCatalog::from_json(CATALOG).unwrap();
        let names: Vec<_> = catalog.all().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["toxicity_score", "compliance_status", "escalation_necessity"]
        );
        assert_eq!(
            catalog.get("escalation_necessity").unwrap().value_type,
            ValueType::Boolean
        );
    }

    #[test]
    fn test_applicable_to_filters_agents() {
        let catalog = MetricCatalog::from_json(CATALOG).unwrap();

        let agent1: Vec<_> = catalog.applicable_to("agent-1").map(|m| &m.name).collect();
        assert_eq!(agent1.len(), 3);

        let agent2: Vec<_> = catalog.applicable_to("agent-2").map(|m| m.name.as_str()).collect();
        assert_eq!(agent2, vec!["toxicity_score", "escalation_necessity"]);

        let other: Vec<_> = catalog.applicable_to("agent-9").map(|m| m.name.as_str()).collect();
        assert_eq!(other, vec!["toxicity_score"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let metrics = vec![
            MetricDefinition::new("m", "p", ValueType::Numeric),
            MetricDefinition::new("m", "q", ValueType::String),
        ];
        let err = MetricCatalog::new(metrics).unwrap_err();
        assert!(err.to_string().contains("duplicate metric name 'm'"));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            MetricCatalog::from_json("{not json"),
            Err(EvaluationError::Catalog(_))
        ));
        assert!(matches!(
            MetricCatalog::from_json(r#"[{"name": "m", "prompt": "p", "type": "float"}]"#),
            Err(EvaluationError::Catalog(_))
        ));
    }

    #[tokio::test]
    async fn test_file_source_reloads_each_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{CATALOG}").unwrap();
        let source = CatalogSource::File(file.path().to_path_buf());

        let first = source.load().await.unwrap();
        assert_eq!(first.len(), 3);

        std::fs::write(
            file.path(),
            r#"[{"name": "only", "prompt": "p", "type": "numeric", "applicable_agents": ["all"]}]"#,
        )
        .unwrap();
        let second = source.load().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_catalog_error() {
        let source = CatalogSource::File(PathBuf::from("/nonexistent/metrics.json"));
        assert!(matches!(source.load().await, Err(EvaluationError::Catalog(_))));
    }
}
