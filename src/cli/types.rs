//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::{init::InitArgs, metrics::MetricsArgs, run::RunArgs, serve::ServeArgs};

#[derive(Parser, Debug)]
#[command(name = "conveval")]
#[command(about = "Conveval - LLM-judged evaluation jobs for agent conversations", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .conveval/config.yaml merged with local.yaml)
    #[arg(short, long, global = true, env = "CONVEVAL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration, metric catalog and database
    Init(InitArgs),

    /// Serve the evaluation Job API
    Serve(ServeArgs),

    /// Run one evaluation job in the foreground
    Run(RunArgs),

    /// Show the metric catalog
    Metrics(MetricsArgs),
}
