mod cli;
mod error;
mod kubernetes;
mod relay;
mod resolver;
mod server;
mod session;
mod source;
#[cfg(test)]
mod testing;
mod types;
mod utils;

use clap::Parser;
use kube::{Client, config};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use cli::Cli;
use kubernetes::KubeCluster;
use server::{AppState, StreamSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let client = initialize_client(cli.context.as_deref()).await?;
    let cluster = Arc::new(KubeCluster::new(client));

    let settings = StreamSettings {
        tail_lines: Some(cli.tail_lines),
        throttle: Duration::from_millis(cli.throttle_ms),
        capp_label: cli.capp_label.clone(),
        token_header: cli.token_header.clone(),
    };
    let state = AppState::new(cluster.clone(), cluster, settings);

    server::serve(cli.bind, state).await
}

async fn initialize_client(context: Option<&str>) -> anyhow::Result<Client> {
    match context {
        None => {
            let config = config::Config::infer().await?;
            let client = Client::try_from(config)?;
            info!("Using current kube context");
            Ok(client)
        }
        Some(ctx) => {
            let config = config::Config::from_kubeconfig(&config::KubeConfigOptions {
                context: Some(ctx.to_string()),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow::anyhow!("Context '{}' not found in kubeconfig: {}", ctx, e))?;
            let client = Client::try_from(config)?;
            info!("Initialized client for context: {}", ctx);
            Ok(client)
        }
    }
}
