// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Startup configuration
//!
//! Built once in `main` from CLI flags and environment, validated, then
//! handed to the perception client and the HTTP server.

pub mod perception;
pub mod server;

pub use perception::{PerceptionConfig, PerceptionProvider, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
pub use server::{ServerConfig, MULTIPART_OVERHEAD};
