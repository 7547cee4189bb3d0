// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{
    PerceptionConfig, PerceptionProvider, ServerConfig, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
};
use crate::vision::geometry::CoordinateSpace;
use crate::vision::image_utils::MAX_IMAGE_SIZE;

/// Log directives used when `RUST_LOG` is unset or invalid
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Build the log filter from `RUST_LOG`-style directives
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Fabstir Perceive Node
#[derive(Parser, Debug)]
#[command(name = "fabstir-perceive-node")]
#[command(version)]
#[command(about = "Annotates uploaded images with boxes from a remote perception model", long_about = None)]
pub struct Cli {
    /// Address the HTTP server binds to
    #[arg(long, env = "PERCEIVE_LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: String,

    /// Comma-separated CORS origins (`*` allows any)
    #[arg(
        long,
        env = "PERCEIVE_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub cors_origins: Vec<String>,

    /// Largest accepted image upload in bytes
    #[arg(long, env = "PERCEIVE_MAX_UPLOAD_BYTES", default_value_t = MAX_IMAGE_SIZE)]
    pub max_upload_bytes: usize,

    /// Perception provider (perceptron/local)
    #[arg(long, env = "PERCEPTRON_PROVIDER", default_value = "perceptron")]
    pub provider: PerceptionProvider,

    /// API key (can also be set via PERCEPTRON_API_KEY env var)
    #[arg(long, env = "PERCEPTRON_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Override the provider's base URL
    #[arg(long, env = "PERCEPTRON_BASE_URL")]
    pub base_url: Option<String>,

    /// Perception model identifier
    #[arg(long, env = "PERCEPTION_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Seconds to wait for the perception model
    #[arg(long, env = "PERCEPTION_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Box coordinate convention (`fractional` or `grid:<n>`)
    #[arg(long, env = "PERCEPTION_COORDINATE_SPACE", default_value = "grid:1000")]
    pub coordinate_space: CoordinateSpace,
}

impl Cli {
    /// Build and validate the server and perception settings
    pub fn into_configs(self) -> Result<(ServerConfig, PerceptionConfig)> {
        let server = ServerConfig {
            listen_addr: self.listen_addr,
            cors_allowed_origins: self
                .cors_origins
                .into_iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            max_upload_bytes: self.max_upload_bytes,
        };
        server.validate()?;

        let mut perception = PerceptionConfig::for_provider(
            self.provider,
            self.api_key.filter(|k| !k.trim().is_empty()),
        );
        if let Some(base_url) = self.base_url {
            perception.base_url = base_url.trim_end_matches('/').to_string();
        }
        perception.model = self.model;
        perception.timeout = Duration::from_secs(self.timeout_secs);
        perception.coordinate_space = self.coordinate_space;
        perception.validate()?;

        Ok((server, perception))
    }
}
