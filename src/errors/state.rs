// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors from the state attachment middleware.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("State serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("State snapshot version mismatch: snapshot was taken at {expected}, current workflow is {found}")]
    VersionMismatch { expected: String, found: String },
}
