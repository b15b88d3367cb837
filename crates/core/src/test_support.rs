// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{ApiError, Build, BuildApi, CommandDef, Emitter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

// ── Build factories ─────────────────────────────────────────────────────

pub fn step(name: &str, cmd: &str) -> CommandDef {
    CommandDef::new(name, cmd)
}

pub fn build_of(commands: &[(&str, &str)]) -> Build {
    Build::new(commands.iter().map(|(name, cmd)| CommandDef::new(*name, *cmd)).collect())
}

// ── Recording emitter ───────────────────────────────────────────────────

/// Emitter fake recording every line and step transition, in order.
///
/// Clones share the same log, so a clone can be handed to the code under
/// test while the original stays behind for assertions.
#[derive(Clone, Default)]
pub struct RecordingEmitter {
    inner: Arc<Mutex<RecordedOutput>>,
}

#[derive(Default)]
struct RecordedOutput {
    lines: Vec<String>,
    started: Vec<String>,
    fail_writes: bool,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every emitted line, in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().lines.clone()
    }

    /// Command names passed to `start_cmd`, in order.
    pub fn started(&self) -> Vec<String> {
        self.inner.lock().started.clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.inner.lock().lines.iter().any(|line| line.contains(needle))
    }

    /// Make every subsequent write fail with a broken-pipe error.
    pub fn fail_writes(&self) {
        self.inner.lock().fail_writes = true;
    }
}

impl Emitter for RecordingEmitter {
    fn start_cmd(&mut self, cmd: &CommandDef) {
        self.inner.lock().started.push(cmd.name.clone());
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "emitter closed"));
        }
        inner.lines.push(line.to_string());
        Ok(())
    }
}

// ── Recording API client ────────────────────────────────────────────────

/// One recorded status call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Start { build_id: u64, name: String },
    Stop { build_id: u64, name: String, exit_code: i32 },
}

/// Build API fake recording calls in order; individual steps can be told to
/// fail to exercise the fatal-on-API-error paths.
#[derive(Clone, Default)]
pub struct RecordingApi {
    inner: Arc<Mutex<RecordedApi>>,
}

#[derive(Default)]
struct RecordedApi {
    calls: Vec<ApiCall>,
    fail_start_on: Option<String>,
    fail_stop_on: Option<String>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.inner.lock().calls.clone()
    }

    /// Names with a recorded start, in order.
    pub fn started(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::Start { name, .. } => Some(name.clone()),
                ApiCall::Stop { .. } => None,
            })
            .collect()
    }

    /// `(name, exit_code)` for each recorded stop, in order.
    pub fn stopped(&self) -> Vec<(String, i32)> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::Stop { name, exit_code, .. } => Some((name.clone(), *exit_code)),
                ApiCall::Start { .. } => None,
            })
            .collect()
    }

    pub fn fail_start_on(&self, name: &str) {
        self.inner.lock().fail_start_on = Some(name.to_string());
    }

    pub fn fail_stop_on(&self, name: &str) {
        self.inner.lock().fail_stop_on = Some(name.to_string());
    }
}

#[async_trait]
impl BuildApi for RecordingApi {
    async fn update_step_start(&self, build_id: u64, name: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.lock();
        if inner.fail_start_on.as_deref() == Some(name) {
            return Err(ApiError::new(format!("step start rejected for {name}")));
        }
        inner.calls.push(ApiCall::Start { build_id, name: name.to_string() });
        Ok(())
    }

    async fn update_step_stop(
        &self,
        build_id: u64,
        name: &str,
        exit_code: i32,
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.lock();
        if inner.fail_stop_on.as_deref() == Some(name) {
            return Err(ApiError::new(format!("step stop rejected for {name}")));
        }
        inner.calls.push(ApiCall::Stop { build_id, name: name.to_string(), exit_code });
        Ok(())
    }
}
