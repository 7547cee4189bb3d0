// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use fabstir_perceive_node::{
    api::{start_server, AppState},
    cli::{log_filter, Cli},
    vision::{PerceptionClient, PerceptionPipeline},
};
use std::{env, sync::Arc};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    let directives = env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .init();

    let cli = Cli::parse();
    let (server_config, perception_config) = cli.into_configs()?;
    info!("Perception settings: {:?}", perception_config);

    let client = PerceptionClient::new(&perception_config)?;
    if client.health_check().await {
        info!(
            "Perception service reachable at {} ({})",
            client.base_url(),
            client.provider()
        );
    } else {
        warn!(
            "Perception service at {} did not answer the health check; requests may fail",
            client.base_url()
        );
    }

    let pipeline = PerceptionPipeline::new(Arc::new(client), &perception_config);
    info!("Using perception model '{}'", pipeline.model_id());

    let state = AppState::new(pipeline, &server_config);
    start_server(server_config, state).await
}
