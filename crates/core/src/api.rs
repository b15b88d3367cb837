// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote build API seam for per-step status reporting.

use async_trait::async_trait;

/// Opaque failure from the remote status API.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Client reporting step lifecycle to the build API.
///
/// Either call failing is fatal to the executor: the build run stops and the
/// failure propagates as its returned error.
#[async_trait]
pub trait BuildApi: Send + Sync {
    async fn update_step_start(&self, build_id: u64, name: &str) -> Result<(), ApiError>;

    async fn update_step_stop(&self, build_id: u64, name: &str, exit_code: i32)
        -> Result<(), ApiError>;
}
