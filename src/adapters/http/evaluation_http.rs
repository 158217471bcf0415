//! Evaluation Job HTTP API.
//!
//! Thin mapping from requests onto the [`EvaluationService`]. Submitting a
//! job returns immediately; progress is polled through `GET /evaluation/{id}`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::errors::EvaluationError;
use crate::domain::models::{
    EvaluationJob, JobParameters, MetricDefinition, ServerConfig,
};
use crate::services::{EvaluationService, JobFilter};

/// Configuration for the evaluation HTTP server.
#[derive(Debug, Clone)]
pub struct EvaluationHttpConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Window used when a request omits `last_x_days`
    pub default_last_x_days: u32,
}

impl Default for EvaluationHttpConfig {
    fn default() -> Self {
        Self::from_server_config(&ServerConfig::default(), 7)
    }
}

impl EvaluationHttpConfig {
    pub fn from_server_config(server: &ServerConfig, default_last_x_days: u32) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            enable_cors: server.enable_cors,
            default_last_x_days,
        }
    }
}

/// Request to start an evaluation job.
#[derive(Debug, Default, Deserialize)]
pub struct StartEvaluationRequest {
    #[serde(default)]
    pub last_x_days: Option<i64>,
    #[serde(default)]
    pub re_calculate: bool,
    #[serde(default)]
    pub evaluation_run: bool,
}

/// Query parameters for job listing.
#[derive(Debug, Deserialize)]
pub struct ListEvaluationsParams {
    /// `YYYY-MM-DD` or RFC 3339
    #[serde(default)]
    pub start: Option<String>,
}

/// Job counters.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub total: Option<u64>,
    pub processed: u64,
    pub failed: u64,
    pub records_written: u64,
    pub metric_failures: u64,
}

/// Response with a job.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: Uuid,
    pub status: String,
    pub last_x_days: u32,
    pub re_calculate: bool,
    pub evaluation_run: bool,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub progress: ProgressResponse,
    pub last_error: Option<String>,
    pub stop_requested: bool,
}

impl From<EvaluationJob> for JobResponse {
    fn from(job: EvaluationJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status.as_str().to_string(),
            last_x_days: job.parameters.time_window_days,
            re_calculate: job.parameters.recompute,
            evaluation_run: job.parameters.dry_run,
            created_at: job.created_at.to_rfc3339(),
            started_at: job.started_at.map(|dt| dt.to_rfc3339()),
            finished_at: job.finished_at.map(|dt| dt.to_rfc3339()),
            progress: ProgressResponse {
                total: job.total_conversations,
                processed: job.processed_conversations,
                failed: job.failed_conversations,
                records_written: job.records_written,
                metric_failures: job.metric_failures,
            },
            last_error: job.last_error,
            stop_requested: job.stop_requested,
        }
    }
}

/// Response to a job submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartEvaluationResponse {
    pub job_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluationListResponse {
    pub evaluations: Vec<JobResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub metrics: Vec<MetricDefinition>,
    pub total_metrics: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfoResponse {
    pub service: String,
    pub version: String,
    pub description: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: &EvaluationError) -> ApiError {
    let status = match err {
        EvaluationError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        EvaluationError::JobNotFound(_) => StatusCode::NOT_FOUND,
        EvaluationError::InvalidTransition { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

/// Parse a job id path segment. Malformed ids answer 404 like unknown ones.
fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Job not found: {raw}"),
                code: "NOT_FOUND".to_string(),
            }),
        )
    })
}

/// Shared state for the evaluation HTTP server.
struct AppState {
    service: EvaluationService,
    default_last_x_days: u32,
}

/// Build the router for the Job API.
pub fn build_router(service: EvaluationService, config: &EvaluationHttpConfig) -> Router {
    let state = Arc::new(AppState {
        service,
        default_last_x_days: config.default_last_x_days,
    });

    let app = Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/evaluation", post(start_evaluation))
        .route("/evaluation/{job_id}", get(get_evaluation))
        .route("/evaluation/{job_id}/stop", post(stop_evaluation))
        .route("/evaluations", get(list_evaluations))
        .route("/metrics", get(get_metrics))
        .with_state(state);

    if config.enable_cors {
        app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http())
    } else {
        app.layer(TraceLayer::new_for_http())
    }
}

/// Evaluation HTTP server.
pub struct EvaluationHttpServer {
    config: EvaluationHttpConfig,
    service: EvaluationService,
}

impl EvaluationHttpServer {
    pub fn new(service: EvaluationService, config: EvaluationHttpConfig) -> Self {
        Self { config, service }
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = build_router(self.service, &self.config);

        tracing::info!("Evaluation HTTP server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

/// Parse a `start` filter as a date (midnight UTC) or an RFC 3339 instant.
fn parse_start(raw: &str) -> Result<DateTime<Utc>, EvaluationError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            EvaluationError::InvalidParameters(format!(
                "invalid start date '{raw}', expected YYYY-MM-DD or RFC 3339"
            ))
        })
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

async fn service_info() -> Json<ServiceInfoResponse> {
    Json(ServiceInfoResponse {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Conversation evaluation job orchestrator".to_string(),
    })
}

async fn start_evaluation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartEvaluationRequest>,
) -> Result<(StatusCode, Json<StartEvaluationResponse>), ApiError> {
    let days = match req.last_x_days {
        None => state.default_last_x_days,
        Some(days) => u32::try_from(days).map_err(|_| {
            api_error(&EvaluationError::InvalidParameters(format!(
                "last_x_days must be a positive number of days, got {days}"
            )))
        })?,
    };

    let parameters = JobParameters::new(days)
        .with_recompute(req.re_calculate)
        .with_dry_run(req.evaluation_run);

    let job = state.service.submit(parameters).await.map_err(|e| api_error(&e))?;
    Ok((
        StatusCode::CREATED,
        Json(StartEvaluationResponse {
            job_id: job.id,
            status: job.status.as_str().to_string(),
        }),
    ))
}

async fn get_evaluation(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let job = state.service.get(job_id).await.map_err(|e| api_error(&e))?;
    Ok(Json(JobResponse::from(job)))
}

async fn list_evaluations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListEvaluationsParams>,
) -> Result<Json<EvaluationListResponse>, ApiError> {
    let filter = match params.start.as_deref() {
        Some(raw) => JobFilter::since(parse_start(raw).map_err(|e| api_error(&e))?),
        None => JobFilter::default(),
    };

    let evaluations = state
        .service
        .list(&filter)
        .await
        .into_iter()
        .map(JobResponse::from)
        .collect();
    Ok(Json(EvaluationListResponse { evaluations }))
}

async fn stop_evaluation(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<(StatusCode, Json<StopResponse>), ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let job = state.service.stop(job_id).await.map_err(|e| api_error(&e))?;
    let message = if job.is_terminal() {
        format!("Job {job_id} is {}", job.status)
    } else {
        format!("Stop requested for job {job_id}")
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(StopResponse {
            job_id,
            status: job.status.as_str().to_string(),
            message,
        }),
    ))
}

async fn get_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let catalog = state.service.metrics().await.map_err(|e| api_error(&e))?;
    let metrics = catalog.all().to_vec();
    Ok(Json(MetricsResponse {
        total_metrics: metrics.len(),
        metrics,
    }))
}
