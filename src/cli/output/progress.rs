//! Progress bar for foreground evaluation jobs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::domain::models::EvaluationJob;

const PROGRESS_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} conversations {msg} (ETA: {eta})";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Progress bar sized once the job's total is known.
///
/// Hidden in JSON mode so only the final document reaches stdout.
pub fn create_job_progress_bar(hidden: bool) -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(PROGRESS_CHARS);
    pb.set_style(style);
    if hidden {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb
}

pub trait ProgressBarExt {
    /// Mirror a job snapshot onto the bar.
    fn sync_job(&self, job: &EvaluationJob);

    fn finish_success(&self, message: impl Into<String>);

    fn finish_error(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn sync_job(&self, job: &EvaluationJob) {
        if let Some(total) = job.total_conversations {
            if self.length() != Some(total) {
                self.set_length(total);
            }
        }
        self.set_position(job.processed_conversations);
        self.set_message(format!(
            "| {} records, {} metric failures",
            job.records_written, job.metric_failures
        ));
    }

    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✓ {}", message.into()));
    }

    fn finish_error(&self, message: impl Into<String>) {
        self.abandon_with_message(format!("✗ {}", message.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::JobParameters;

    #[test]
    fn test_sync_job_tracks_counters() {
        let pb = create_job_progress_bar(true);
        let mut job = EvaluationJob::new(JobParameters::new(7));
        pb.sync_job(&job);
        assert_eq!(pb.position(), 0);

        job.total_conversations = Some(10);
        job.processed_conversations = 4;
        pb.sync_job(&job);
        assert_eq!(pb.length(), Some(10));
        assert_eq!(pb.position(), 4);
    }
}
