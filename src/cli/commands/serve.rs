//! Implementation of the `conveval serve` command.

use anyhow::{anyhow, Result};
use clap::Args;
use tracing::{info, warn};

use crate::adapters::http::{EvaluationHttpConfig, EvaluationHttpServer};
use crate::cli::context::AppContext;
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub async fn execute(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let http_config =
        EvaluationHttpConfig::from_server_config(&config.server, config.evaluation.default_last_x_days);
    let context = AppContext::build(config).await?;

    let server = EvaluationHttpServer::new(context.service.clone(), http_config);
    let result = server
        .serve_with_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await;

    context.close().await;
    result.map_err(|e| anyhow!("HTTP server error: {e}"))
}
