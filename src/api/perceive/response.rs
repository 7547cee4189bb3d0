// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Perceive response type

use serde::{Deserialize, Serialize};

use crate::vision::PerceiveOutput;

/// Response body of `POST /perceive`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerceiveResponse {
    /// Model text output, or a summary of the result when it had none
    pub text: String,
    /// `data:image/png;base64,...`
    pub annotated_image: String,
}

impl From<PerceiveOutput> for PerceiveResponse {
    fn from(output: PerceiveOutput) -> Self {
        Self {
            text: output.text,
            annotated_image: output.annotated_image,
        }
    }
}
