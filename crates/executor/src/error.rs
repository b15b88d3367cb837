// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor error and step outcome types.

use std::path::PathBuf;

use bh_core::EXIT_OK;

/// Errors surfaced while driving a build's steps.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The interactive shell could not be started on a PTY.
    #[error("cannot start shell: {message}")]
    ShellStart { message: String },

    /// Writing to the shell's PTY failed.
    #[error("writing to shell session: {source}")]
    SessionWrite { source: std::io::Error },

    /// Shell session setup ended before the prelude echo was observed.
    #[error("shell setup ended before completion")]
    SetupIncomplete,

    /// Writing the step script file failed.
    #[error("writing step script {path}: {source}")]
    Script { path: PathBuf, source: std::io::Error },

    /// A teardown or auxiliary subprocess could not run.
    #[error("launching command `{command}`: {source}")]
    Launch { command: String, source: std::io::Error },

    /// Reporting step start to the build API failed.
    #[error("updating step start `{name}`: {source}")]
    StepStart { name: String, source: bh_core::ApiError },

    /// Reporting step stop to the build API failed.
    #[error("updating step stop `{name}`: {source}")]
    StepStop { name: String, source: bh_core::ApiError },

    /// A step or teardown finished with a non-zero exit code.
    #[error("command exited with non-zero code: {code}")]
    ExitStatus { code: i32 },

    /// The exit sentinel carried an unreadable exit code.
    #[error("reading sentinel exit code: {source}")]
    Sentinel { source: std::num::ParseIntError },

    /// The PTY line stream failed mid-step.
    #[error("error with reader: {source}")]
    Reader { source: std::io::Error },

    /// Forwarding output to the emitter failed.
    #[error("piping logs to emitter: {source}")]
    Emitter { source: std::io::Error },

    /// The build-wide timeout elapsed.
    #[error("timeout of {secs} seconds exceeded")]
    Timeout { secs: u64 },

    /// SIGINT or SIGTERM was received by the launcher.
    #[error("{signal} received, step aborted")]
    Aborted { signal: &'static str },
}

/// Result of one step or teardown: the exit code plus the error, if any.
///
/// Both halves are used: the code is reported to the build API, the error
/// feeds the supervisor's first-error bookkeeping.
#[derive(Debug)]
pub struct StepOutcome {
    pub exit_code: i32,
    pub error: Option<ExecError>,
}

impl StepOutcome {
    pub fn ok() -> Self {
        Self { exit_code: EXIT_OK, error: None }
    }

    pub fn failed(exit_code: i32, error: ExecError) -> Self {
        Self { exit_code, error: Some(error) }
    }
}
