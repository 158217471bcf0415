//! Services: job lifecycle, selection, catalog and the orchestration loop.

pub mod evaluation_runner;
pub mod evaluation_service;
pub mod job_store;
pub mod metric_catalog;
pub mod retry;
pub mod selection_query;

pub use evaluation_runner::EvaluationRunner;
pub use evaluation_service::EvaluationService;
pub use job_store::{JobFilter, JobStore};
pub use metric_catalog::{CatalogSource, MetricCatalog};
pub use retry::RetryPolicy;
pub use selection_query::{build_selection_query, SelectionQueryBuilder};
