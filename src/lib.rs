// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod vision;

pub use api::{create_app, start_server, AppState, PerceiveResponse};
pub use config::{PerceptionConfig, PerceptionProvider, ServerConfig};
pub use vision::{
    PerceiveOutput, PerceptionClient, PerceptionPipeline, PerceptionService, PipelineError,
};
