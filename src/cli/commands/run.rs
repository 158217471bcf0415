//! Implementation of the `conveval run` command.
//!
//! Submits one job, follows it with a progress bar and prints a summary.
//! Ctrl-C requests a cooperative stop; the job still finishes cleanly.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

use crate::cli::context::AppContext;
use crate::cli::output::{create_job_progress_bar, output, CommandOutput, ProgressBarExt, TableFormatter};
use crate::domain::models::{Config, EvaluationJob, JobParameters, JobStatus};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Evaluate conversations extracted within the last N days
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Re-evaluate sessions that already have records
    #[arg(long)]
    pub recompute: bool,

    /// Score without writing records
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub job: EvaluationJob,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        TableFormatter::new().format_job_summary(&self.job)
    }
}

pub async fn execute(args: RunArgs, config: Config, json_mode: bool) -> Result<()> {
    let parameters = JobParameters::new(args.days.unwrap_or(config.evaluation.default_last_x_days))
        .with_recompute(args.recompute)
        .with_dry_run(args.dry_run);

    let context = AppContext::build(config).await?;
    let service = context.service.clone();
    let job = service.submit(parameters).await?;
    let job_id = job.id;

    let pb = create_job_progress_bar(json_mode);
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stop_sent = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = service.get(job_id).await?;
                pb.sync_job(&snapshot);
                if snapshot.is_terminal() {
                    break;
                }
            }
            signal = &mut ctrl_c, if !stop_sent => {
                if let Err(err) = signal {
                    warn!(error = %err, "failed to listen for interrupt");
                }
                stop_sent = true;
                pb.set_message("stopping after current conversation...");
                service.stop(job_id).await?;
            }
        }
    }

    let job = service.wait(job_id).await?;
    match job.status {
        JobStatus::Completed => pb.finish_success(format!("{} conversations", job.processed_conversations)),
        status => pb.finish_error(status.as_str()),
    }
    context.close().await;

    let failed = job.status == JobStatus::Failed;
    let reason = job.last_error.clone().unwrap_or_default();
    output(&RunOutput { job }, json_mode);

    if failed {
        anyhow::bail!("evaluation job failed: {reason}");
    }
    Ok(())
}
