//! Table output for jobs and metrics using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{AgentScope, EvaluationJob, JobStatus, MetricDefinition};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per job.
    pub fn format_jobs(&self, jobs: &[EvaluationJob]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Status", "Days", "Progress", "Records", "Failed", "Created"]));

        for job in jobs {
            let total = job
                .total_conversations
                .map_or_else(|| "?".to_string(), |t| t.to_string());
            table.add_row(vec![
                Cell::new(&job.id.to_string()[..8]),
                self.status_cell(job.status),
                Cell::new(job.parameters.time_window_days),
                Cell::new(format!("{}/{total}", job.processed_conversations)),
                Cell::new(job.records_written),
                Cell::new(job.failed_conversations),
                Cell::new(job.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            ]);
        }

        table.to_string()
    }

    /// Key/value summary of a single job.
    pub fn format_job_summary(&self, job: &EvaluationJob) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Field", "Value"]));

        let total = job
            .total_conversations
            .map_or_else(|| "unknown".to_string(), |t| t.to_string());
        let duration = match (job.started_at, job.finished_at) {
            (Some(start), Some(end)) => format!("{:.1}s", (end - start).num_milliseconds() as f64 / 1000.0),
            _ => "-".to_string(),
        };

        table.add_row(vec![Cell::new("Job"), Cell::new(job.id)]);
        table.add_row(vec![Cell::new("Status"), self.status_cell(job.status)]);
        table.add_row(vec![
            Cell::new("Window"),
            Cell::new(format!("last {} days", job.parameters.time_window_days)),
        ]);
        table.add_row(vec![Cell::new("Recompute"), Cell::new(job.parameters.recompute)]);
        table.add_row(vec![Cell::new("Dry run"), Cell::new(job.parameters.dry_run)]);
        table.add_row(vec![
            Cell::new("Conversations"),
            Cell::new(format!("{}/{total}", job.processed_conversations)),
        ]);
        table.add_row(vec![Cell::new("Failed conversations"), Cell::new(job.failed_conversations)]);
        table.add_row(vec![Cell::new("Records written"), Cell::new(job.records_written)]);
        table.add_row(vec![Cell::new("Metric failures"), Cell::new(job.metric_failures)]);
        table.add_row(vec![Cell::new("Duration"), Cell::new(duration)]);
        if let Some(ref error) = job.last_error {
            table.add_row(vec![Cell::new("Error"), Cell::new(truncate_text(error, 80))]);
        }

        table.to_string()
    }

    pub fn format_metrics(&self, metrics: &[MetricDefinition]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Name", "Type", "Agents", "Prompt"]));

        for metric in metrics {
            let agents = match &metric.applicable_agents {
                AgentScope::All => "all".to_string(),
                AgentScope::Agents(agents) if agents.is_empty() => "-".to_string(),
                AgentScope::Agents(agents) => agents.iter().cloned().collect::<Vec<_>>().join(", "),
            };
            table.add_row(vec![
                Cell::new(&metric.name),
                Cell::new(metric.value_type.as_str()),
                Cell::new(agents),
                Cell::new(truncate_text(&metric.prompt, 60)),
            ]);
        }

        table.to_string()
    }

    fn status_cell(&self, status: JobStatus) -> Cell {
        if self.use_colors {
            Cell::new(status.as_str()).fg(status_color(status))
        } else {
            Cell::new(status.as_str())
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        if !self.use_colors {
            table.force_no_tty();
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

/// Respects `NO_COLOR` and dumb terminals
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM"), Ok(term) if term == "dumb")
}

const fn status_color(status: JobStatus) -> Color {
    match status {
        JobStatus::Pending => Color::White,
        JobStatus::Running => Color::Cyan,
        JobStatus::Completed => Color::Green,
        JobStatus::Failed => Color::Red,
        JobStatus::Stopped => Color::Yellow,
    }
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{JobParameters, ValueType};

    #[test]
    fn test_format_jobs_plain() {
        let formatter = TableFormatter::with_config(false, Some(120));
        let mut job = EvaluationJob::new(JobParameters::new(14));
        job.total_conversations = Some(3);
        job.processed_conversations = 2;

        let rendered = formatter.format_jobs(&[job.clone()]);
        assert!(rendered.contains(&job.id.to_string()[..8]));
        assert!(rendered.contains("pending"));
        assert!(rendered.contains("2/3"));
    }

    #[test]
    fn test_format_metrics_shows_scope() {
        let formatter = TableFormatter::with_config(false, Some(160));
        let metrics = vec![
            MetricDefinition::new("toxicity_score", "Rate toxicity", ValueType::Numeric),
            MetricDefinition::new("refund_policy", "Check refunds", ValueType::String)
                .for_agents(["billing"]),
        ];
        let rendered = formatter.format_metrics(&metrics);
        assert!(rendered.contains("toxicity_score"));
        assert!(rendered.contains("billing"));
        assert!(rendered.contains("numeric"));
    }

    #[test]
    fn test_truncate_text_is_char_safe() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("ééééééééééé", 6), "ééé...");
    }
}
