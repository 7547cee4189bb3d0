// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::post,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::perceive::perceive_handler;
use crate::config::ServerConfig;
use crate::vision::PerceptionPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PerceptionPipeline>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: PerceptionPipeline, config: &ServerConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .cors_allowed_origins
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Skipping invalid CORS origin '{}'", o);
                        None
                    }
                }),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/perceive", post(perceive_handler))
        .layer(DefaultBodyLimit::max(config.body_limit()))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: ServerConfig, state: AppState) -> Result<()> {
    let addr = config.socket_addr()?;
    let app = create_app(state, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Perceive server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Perceive server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
