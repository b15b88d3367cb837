// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Teardown runner: post-shell commands in a fresh subprocess.

use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::Command;

use bh_core::{CommandDef, Emitter, EXIT_LAUNCH, EXIT_UNKNOWN};

use crate::config::ExecConfig;
use crate::error::{ExecError, StepOutcome};

/// Upper bound, in seconds, the wrapper waits for the env-export file.
pub const WAIT_TIMEOUT: u64 = 5;

/// Run one teardown command in a fresh `<shell> -e -c` subprocess.
///
/// The wrapper waits up to [`WAIT_TIMEOUT`] seconds for the session's
/// env-export file and sources it when present; a missing file is not fatal
/// and the command runs without the snapshot. Stdout and stderr are streamed
/// to the emitter as they arrive, and the subprocess runs in the source
/// directory.
pub async fn run_teardown<E: Emitter>(
    cmd: &CommandDef,
    emitter: &mut E,
    cfg: &ExecConfig,
    step_exit_code: i32,
) -> StepOutcome {
    let wrapper = teardown_wrapper(cfg, &cmd.cmd, step_exit_code);

    emitter.start_cmd(cmd);
    if let Err(source) = emitter.write_line(&format!("$ {}", cmd.cmd)) {
        return StepOutcome::failed(EXIT_UNKNOWN, ExecError::Emitter { source });
    }

    let mut child = match Command::new(&cfg.shell_bin)
        .arg("-e")
        .arg("-c")
        .arg(&wrapper)
        .current_dir(&cfg.source_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(source) => {
            return StepOutcome::failed(
                EXIT_LAUNCH,
                ExecError::Launch { command: cmd.cmd.clone(), source },
            )
        }
    };

    if let Err(source) = pipe_output(&mut child, emitter).await {
        return StepOutcome::failed(EXIT_UNKNOWN, ExecError::Emitter { source });
    }

    match child.wait().await {
        Ok(status) => match status.code() {
            Some(0) => StepOutcome::ok(),
            Some(code) => StepOutcome::failed(code, ExecError::ExitStatus { code }),
            // Killed by a signal: no code to report upstream.
            None => StepOutcome::failed(
                EXIT_UNKNOWN,
                ExecError::ExitStatus { code: EXIT_UNKNOWN },
            ),
        },
        Err(source) => StepOutcome::failed(
            EXIT_UNKNOWN,
            ExecError::Launch { command: cmd.cmd.clone(), source },
        ),
    }
}

/// Forward the child's stdout and stderr to the emitter, interleaved as
/// lines become available, until both pipes are exhausted.
async fn pipe_output<E: Emitter>(
    child: &mut tokio::process::Child,
    emitter: &mut E,
) -> std::io::Result<()> {
    let mut stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
    let mut stderr = child.stderr.take().map(|s| BufReader::new(s).lines());

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            line = next_line(&mut stdout) => match line? {
                Some(line) => emitter.write_line(&line)?,
                None => stdout = None,
            },
            line = next_line(&mut stderr) => match line? {
                Some(line) => emitter.write_line(&line)?,
                None => stderr = None,
            },
        }
    }
    Ok(())
}

/// Next line from an optional stream; pends forever once the stream is gone
/// so the other `select!` arm can finish draining.
async fn next_line<R: AsyncBufRead + Unpin>(
    lines: &mut Option<Lines<R>>,
) -> std::io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

/// Tool PATH and the step's exit code, a bounded wait for the export file,
/// optional sourcing of the snapshot, then the user command.
fn teardown_wrapper(cfg: &ExecConfig, cmd: &str, step_exit_code: i32) -> String {
    let export_file = cfg.export_file().display().to_string();
    format!(
        "export PATH=${{PATH}}:/opt/sd:/usr/sd/bin SD_STEP_EXIT_CODE={step_exit_code} && \
         START=$(date +'%s'); \
         while ! [ -f {export_file} ] && [ $(($(date +'%s')-$START)) -lt {WAIT_TIMEOUT} ]; do sleep 1; done; \
         if [ -f {export_file} ]; then set +e; . {export_file}; set -e; fi; \
         {cmd}"
    )
}

#[cfg(test)]
#[path = "teardown_tests.rs"]
mod tests;
