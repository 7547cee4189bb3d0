// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Perceive API endpoint module
//!
//! Provides POST /perceive for prompt-driven detection with box overlays.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::perceive_handler;
pub use request::{PerceiveForm, PerceiveRequest, FILE_FIELD, PROMPT_FIELD};
pub use response::PerceiveResponse;
