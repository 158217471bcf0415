//! Evaluation job domain model.
//!
//! A job scores every selected conversation against the metric catalog.
//! Its lifecycle is `Pending -> Running -> {Completed, Failed, Stopped}`,
//! with `Pending -> Stopped` allowed when a stop arrives before the runner
//! picks the job up. Terminal states are absorbing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status of an evaluation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, runner not started yet
    Pending,
    /// Runner is consuming conversations
    Running,
    /// Every selected conversation was processed
    Completed,
    /// Selection failed or the conversation stream broke
    Failed,
    /// Cancelled cooperatively
    Stopped,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl JobStatus {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Parse a status name, case-insensitively.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [JobStatus] {
        match self {
            Self::Pending => &[Self::Running, Self::Stopped],
            Self::Running => &[Self::Completed, Self::Failed, Self::Stopped],
            Self::Completed | Self::Failed | Self::Stopped => &[],
        }
    }

    /// Check if moving to `new_status` is allowed.
    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters supplied when a job is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameters {
    /// Only conversations extracted within this many days are selected.
    pub time_window_days: u32,
    /// Re-select sessions that already have evaluation records.
    pub recompute: bool,
    /// Score without appending records.
    pub dry_run: bool,
}

impl JobParameters {
    /// Parameters for a plain run over the last `time_window_days` days.
    pub fn new(time_window_days: u32) -> Self {
        Self {
            time_window_days,
            recompute: false,
            dry_run: false,
        }
    }

    /// Set the recompute flag.
    pub fn with_recompute(mut self, recompute: bool) -> Self {
        self.recompute = recompute;
        self
    }

    /// Set the dry-run flag.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reject a non-positive time window.
    pub fn validate(&self) -> Result<(), String> {
        if self.time_window_days == 0 {
            return Err("time window must be a positive number of days".to_string());
        }
        Ok(())
    }
}

/// Counter increments reported by the runner after each conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressDelta {
    /// Conversations consumed
    pub processed: u64,
    /// Conversations with at least one failed metric
    pub failed: u64,
    /// Records appended
    pub records_written: u64,
    /// Metrics skipped after retries
    pub metric_failures: u64,
}

impl ProgressDelta {
    /// Delta for one processed conversation.
    pub fn conversation(records_written: u64, metric_failures: u64) -> Self {
        Self {
            processed: 1,
            failed: u64::from(metric_failures > 0),
            records_written,
            metric_failures,
        }
    }
}

/// One asynchronous evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationJob {
    /// Unique identifier, never reused
    pub id: Uuid,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Submission parameters
    pub parameters: JobParameters,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// When the runner picked the job up
    pub started_at: Option<DateTime<Utc>>,
    /// When a terminal state was reached
    pub finished_at: Option<DateTime<Utc>>,
    /// Unknown until the selection query resolves
    pub total_conversations: Option<u64>,
    /// Conversations consumed so far
    pub processed_conversations: u64,
    /// Conversations where at least one metric failed
    pub failed_conversations: u64,
    /// Evaluation records appended by this job
    pub records_written: u64,
    /// Individual metric evaluations skipped after retries
    pub metric_failures: u64,
    /// Reason for a failure, or a completion shortfall
    pub last_error: Option<String>,
    /// Cooperative cancellation flag, checked between conversations
    pub stop_requested: bool,
}

impl EvaluationJob {
    /// Create a pending job.
    pub fn new(parameters: JobParameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::default(),
            parameters,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            total_conversations: None,
            processed_conversations: 0,
            failed_conversations: 0,
            records_written: 0,
            metric_failures: 0,
            last_error: None,
            stop_requested: false,
        }
    }

    /// Check if moving to `new_status` is allowed.
    pub fn can_transition_to(&self, new_status: JobStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, stamping lifecycle timestamps.
    pub fn transition_to(&mut self, new_status: JobStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }

        self.status = new_status;
        match new_status {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped => {
                self.finished_at = Some(Utc::now());
            }
            JobStatus::Pending => {}
        }

        Ok(())
    }

    /// Check if the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply counter increments. Returns the new processed count.
    pub fn apply_progress(&mut self, delta: ProgressDelta) -> u64 {
        self.processed_conversations += delta.processed;
        self.failed_conversations += delta.failed;
        self.records_written += delta.records_written;
        self.metric_failures += delta.metric_failures;
        self.processed_conversations
    }
}
