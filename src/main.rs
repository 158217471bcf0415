//! Conveval CLI entry point.

use clap::Parser;

use conveval::cli::commands::{init, metrics, run, serve};
use conveval::cli::context::load_config;
use conveval::cli::{handle_error, Cli, Commands};
use conveval::infrastructure::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = dispatch(cli).await {
        handle_error(err, json);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let json = cli.json;
    let command = match cli.command {
        Commands::Init(args) => return init::execute(args, json).await,
        command => command,
    };

    let config = load_config(cli.config.as_deref())?;
    let _logger = LoggerImpl::init(&config.logging)?;

    match command {
        Commands::Serve(args) => serve::execute(args, config).await,
        Commands::Run(args) => run::execute(args, config, json).await,
        Commands::Metrics(args) => metrics::execute(args, &config, json).await,
        Commands::Init(args) => init::execute(args, json).await,
    }
}
