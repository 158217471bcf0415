//! Implementation of the `conveval init` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::setup::{initialize, SetupPaths, SetupReport};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite config.yaml and metrics.json if present
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub initialized_path: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
    #[serde(flatten)]
    pub report: SetupReport,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Project initialized at {}", self.initialized_path.display())];
        if self.report.config_written {
            lines.push(format!("  wrote {}", self.config_file.display()));
        }
        if self.report.metrics_written {
            lines.push("  installed default metric catalog".to_string());
        }
        if self.report.migrations_applied > 0 {
            lines.push(format!(
                "  applied {} migration(s) to {}",
                self.report.migrations_applied,
                self.database_file.display()
            ));
        } else {
            lines.push("  database schema already up to date".to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let paths = SetupPaths::new(&target_path);
    let report = initialize(&paths, args.force).await?;

    output(
        &InitOutput {
            success: true,
            initialized_path: target_path,
            config_file: paths.config_file,
            database_file: paths.database_file,
            report,
        },
        json_mode,
    );
    Ok(())
}
