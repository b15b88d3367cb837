// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY-hosted interactive shell session.

use std::io::{Read, Write};
use std::thread;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tracing::debug;

use bh_core::Emitter;

use crate::config::ExecConfig;
use crate::error::ExecError;
use crate::lines::LineReader;

/// EOT; ends the shell's input and fires its EXIT trap.
const EOT: u8 = 0x04;

/// Lines buffered between the PTY reader thread and the async consumer.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of the session's shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    SetupInProgress,
    Ready,
    Running,
    Idle,
    Closed,
}

bh_core::simple_display! {
    SessionState {
        Uninitialized => "uninitialized",
        SetupInProgress => "setup-in-progress",
        Ready => "ready",
        Running => "running",
        Idle => "idle",
        Closed => "closed",
    }
}

/// A child shell attached to a PTY master, plus the line stream read from it.
///
/// The master is read by exactly one party: a blocking reader thread turns
/// PTY bytes into logical lines, and whichever routine drives the current
/// step consumes them from the channel.
pub struct ShellSession {
    writer: Box<dyn Write + Send>,
    lines: mpsc::Receiver<std::io::Result<String>>,
    child: Box<dyn Child + Send>,
    state: SessionState,
    // Keeps the PTY master half alive for the life of the session.
    _master: Box<dyn MasterPty + Send>,
}

impl ShellSession {
    /// Launch `cfg.shell_bin` attached to a fresh PTY in `cfg.workdir`, with
    /// `cfg.env` overlaid on the inherited environment.
    pub fn open(cfg: &ExecConfig) -> Result<Self, ExecError> {
        let pty = native_pty_system();
        let pair = pty
            .openpty(PtySize { rows: 24, cols: 80, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| ExecError::ShellStart { message: e.to_string() })?;

        let mut cmd = CommandBuilder::new(&cfg.shell_bin);
        cmd.cwd(&cfg.workdir);
        for entry in &cfg.env {
            if let Some((key, value)) = entry.split_once('=') {
                cmd.env(key, value);
            }
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ExecError::ShellStart { message: e.to_string() })?;
        // The slave half now lives in the child.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ExecError::ShellStart { message: e.to_string() })?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| ExecError::ShellStart { message: e.to_string() })?;

        let (tx, lines) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        thread::spawn(move || read_lines(reader, tx));

        debug!(shell = %cfg.shell_bin, workdir = %cfg.workdir.display(), "shell session opened");

        Ok(Self { writer, lines, child, state: SessionState::Uninitialized, _master: pair.master })
    }

    /// Transmit the setup prelude and wait for its echo.
    ///
    /// Every line read during setup is forwarded to the emitter. Setup
    /// completes when the echoed `echo ;` of the prelude itself is observed,
    /// which marks the shell [`SessionState::Ready`].
    pub async fn setup<E: Emitter>(
        &mut self,
        emitter: &mut E,
        cfg: &ExecConfig,
    ) -> Result<(), ExecError> {
        self.state = SessionState::SetupInProgress;
        self.send(&setup_prelude(cfg))?;

        while let Some(next) = self.lines.recv().await {
            let line = next.map_err(|source| ExecError::Reader { source })?;
            emitter.write_line(&line).map_err(|source| ExecError::Emitter { source })?;
            if line.contains("echo ;") {
                self.state = SessionState::Ready;
                debug!(state = %self.state, "shell session ready");
                return Ok(());
            }
        }
        Err(ExecError::SetupIncomplete)
    }

    /// Write raw bytes to the PTY master (the shell's input).
    pub fn send(&mut self, text: &str) -> Result<(), ExecError> {
        self.writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|source| ExecError::SessionWrite { source })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn begin_step(&mut self) {
        self.state = SessionState::Running;
    }

    pub(crate) fn finish_step(&mut self) {
        if self.state == SessionState::Running {
            self.state = SessionState::Idle;
        }
    }

    /// Line stream read from the PTY master.
    pub(crate) fn lines_mut(&mut self) -> &mut mpsc::Receiver<std::io::Result<String>> {
        &mut self.lines
    }

    /// End the shell's input with a single EOT, firing its EXIT trap.
    ///
    /// Idempotent: the byte is written at most once per session.
    pub fn close_shell(&mut self) -> Result<(), ExecError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        self.writer
            .write_all(&[EOT])
            .and_then(|()| self.writer.flush())
            .map_err(|source| ExecError::SessionWrite { source })
    }

    /// Deliver SIGABRT to the shell child, if it is still around.
    pub fn signal_abort(&mut self) {
        if let Some(pid) = self.child.process_id() {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGABRT);
        }
        self.state = SessionState::Closed;
    }
}

/// Blocking loop on the PTY reader thread: logical lines into the channel
/// until EOF, a read error, or a dropped receiver.
fn read_lines(reader: Box<dyn Read + Send>, tx: mpsc::Sender<std::io::Result<String>>) {
    let mut lines = LineReader::new(reader);
    loop {
        match lines.read_line() {
            Ok(Some(line)) => {
                if tx.blocking_send(Ok(line)).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
    }
}

/// The deterministic prelude: fail-fast, tool PATH, and the ABRT/EXIT trap
/// that snapshots the environment and echoes the final step sentinel.
///
/// The trap writes `export -p` (minus `PS1=`) to the tmp file and renames it
/// into place, so teardown observers never see a partial snapshot.
fn setup_prelude(cfg: &ExecConfig) -> String {
    [
        "set -e".to_string(),
        "export PATH=${PATH}:/opt/sd:/usr/sd/bin".to_string(),
        format!(
            "finish() {{ EXITCODE=$?; tmpfile={}; exportfile={}; \
             export -p | grep -vi \"PS1=\" > $tmpfile && mv -f $tmpfile $exportfile; \
             echo $SD_STEP_ID $EXITCODE; }}",
            cfg.tmp_file().display(),
            cfg.export_file().display(),
        ),
        "trap finish ABRT EXIT;\necho ;\n".to_string(),
    ]
    .join(" && ")
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
