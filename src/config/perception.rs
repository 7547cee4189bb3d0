// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Settings for the remote perception service

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::vision::geometry::CoordinateSpace;

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "isaac-0.1";

/// Per-call budget for the remote model (network + inference)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Which perception backend answers `call_perception`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerceptionProvider {
    /// Hosted Perceptron platform, API key required
    Perceptron,
    /// Self-hosted OpenAI-compatible sidecar
    Local,
}

impl PerceptionProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            PerceptionProvider::Perceptron => "https://api.perceptron.inc/v1",
            PerceptionProvider::Local => "http://localhost:8081/v1",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, PerceptionProvider::Perceptron)
    }
}

impl fmt::Display for PerceptionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerceptionProvider::Perceptron => write!(f, "perceptron"),
            PerceptionProvider::Local => write!(f, "local"),
        }
    }
}

impl FromStr for PerceptionProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "perceptron" => Ok(PerceptionProvider::Perceptron),
            "local" => Ok(PerceptionProvider::Local),
            other => Err(format!(
                "unknown provider '{}'; supported: perceptron, local",
                other
            )),
        }
    }
}

/// Perception settings, built once at startup and shared by every request
#[derive(Clone, PartialEq)]
pub struct PerceptionConfig {
    pub provider: PerceptionProvider,
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API, without trailing slash
    pub base_url: String,
    /// Model identifier sent with every call
    pub model: String,
    pub timeout: Duration,
    /// Coordinate convention of the model's box output
    pub coordinate_space: CoordinateSpace,
}

impl PerceptionConfig {
    /// Config for a provider with its default endpoint and model
    pub fn for_provider(provider: PerceptionProvider, api_key: Option<String>) -> Self {
        Self {
            provider,
            api_key,
            base_url: provider.default_base_url().to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            coordinate_space: CoordinateSpace::default(),
        }
    }

    /// Check the settings before any request is served
    pub fn validate(&self) -> Result<()> {
        if self.provider.requires_api_key()
            && self.api_key.as_ref().map(|k| k.trim().is_empty()).unwrap_or(true)
        {
            return Err(anyhow!(
                "provider '{}' requires an API key (set PERCEPTRON_API_KEY)",
                self.provider
            ));
        }

        let url = Url::parse(&self.base_url)
            .map_err(|e| anyhow!("invalid base URL '{}': {}", self.base_url, e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(anyhow!(
                "base URL must use http or https, got '{}'",
                url.scheme()
            ));
        }

        if self.model.trim().is_empty() {
            return Err(anyhow!("model must not be empty"));
        }

        if self.timeout.is_zero() {
            return Err(anyhow!("timeout must be greater than zero"));
        }

        Ok(())
    }
}

// API key stays out of logs
impl fmt::Debug for PerceptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerceptionConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("coordinate_space", &self.coordinate_space)
            .finish()
    }
}
