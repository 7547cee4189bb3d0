// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP listener settings

use std::net::SocketAddr;

use anyhow::{anyhow, Result};
use axum::http::HeaderValue;

use crate::vision::image_utils::MAX_IMAGE_SIZE;

/// Headroom on top of the image ceiling for multipart framing and the prompt
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Origins allowed by CORS; `*` allows any
    pub cors_allowed_origins: Vec<String>,
    /// Largest accepted image upload in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            max_upload_bytes: MAX_IMAGE_SIZE,
        }
    }
}

impl ServerConfig {
    /// Request body limit applied to the router
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes + MULTIPART_OVERHEAD
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|o| o == "*")
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("invalid listen address '{}': {}", self.listen_addr, e))
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.max_upload_bytes == 0 || self.max_upload_bytes > MAX_IMAGE_SIZE {
            return Err(anyhow!(
                "max upload size must be between 1 and {} bytes, got {}",
                MAX_IMAGE_SIZE,
                self.max_upload_bytes
            ));
        }

        for origin in &self.cors_allowed_origins {
            if origin != "*" && HeaderValue::from_str(origin).is_err() {
                return Err(anyhow!("invalid CORS origin '{}'", origin));
            }
        }

        Ok(())
    }
}
