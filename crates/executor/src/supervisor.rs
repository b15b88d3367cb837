// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level build orchestration.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use bh_core::{Build, BuildApi, CommandDef, Emitter, EXIT_ABORT, EXIT_OK, EXIT_TIMEOUT};

use crate::config::ExecConfig;
use crate::demux::STEP_ID_EXPORT;
use crate::error::{ExecError, StepOutcome};
use crate::reaper::terminate_sleep;
use crate::script::write_step_script;
use crate::session::ShellSession;
use crate::{step, teardown};

/// Best-effort window for forwarding already-echoed PTY output after an
/// abort, before teardown begins.
const DRAIN_WINDOW: Duration = Duration::from_millis(200);

/// Run every command of `build` and report per-step status to `api`.
///
/// User steps run in order inside one persistent shell; after the first
/// abnormal outcome the remaining user steps are skipped, but teardown
/// commands always run in user ++ sd order. The first error is the one
/// returned.
pub async fn run<E, A>(
    cfg: ExecConfig,
    emitter: &mut E,
    build: &Build,
    api: &A,
) -> Result<(), ExecError>
where
    E: Emitter,
    A: BuildApi,
{
    let mut session = ShellSession::open(&cfg)?;
    session.setup(emitter, &cfg).await?;

    let (timeout_tx, timeout_rx) = mpsc::channel(1);
    tokio::spawn(build_timeout(cfg.timeout_secs, timeout_tx));

    let (abort_tx, abort_rx) = mpsc::channel(1);
    tokio::spawn(watch_signals(abort_tx));

    run_build(cfg, emitter, build, api, session, timeout_rx, abort_rx).await
}

/// One-shot timer task: publishes a single timeout event after `secs`.
///
/// Never cancelled; a stale post-build firing has no receiver left and is
/// dropped.
async fn build_timeout(secs: u64, events: mpsc::Sender<ExecError>) {
    info!(timeout_secs = secs, "starting build timeout timer");
    tokio::time::sleep(Duration::from_secs(secs)).await;
    info!(timeout_secs = secs, "timeout exceeded, signalling kill-build");
    let _ = events.send(ExecError::Timeout { secs }).await;
}

/// Signal task: publishes at most one abort event on SIGINT or SIGTERM.
async fn watch_signals(events: mpsc::Sender<ExecError>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut interrupt), Ok(mut terminate)) =
        (signal(SignalKind::interrupt()), signal(SignalKind::terminate()))
    else {
        error!("cannot install signal handlers");
        return;
    };

    let signal = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    };
    info!(%signal, "received termination signal, aborting build");
    let _ = events.send(ExecError::Aborted { signal }).await;
}

/// What ended the step's `select!`: natural completion, the build timeout,
/// or an external termination signal.
enum StepEvent {
    Completed(StepOutcome),
    TimedOut(ExecError),
    Aborted(ExecError),
}

/// Build driver over a ready session, with injected timeout/abort event
/// channels.
pub(crate) async fn run_build<E, A>(
    cfg: ExecConfig,
    emitter: &mut E,
    build: &Build,
    api: &A,
    mut session: ShellSession,
    mut timeout_rx: mpsc::Receiver<ExecError>,
    mut abort_rx: mpsc::Receiver<ExecError>,
) -> Result<(), ExecError>
where
    E: Emitter,
    A: BuildApi,
{
    let parts = partition_commands(build);

    let mut first_error: Option<ExecError> = None;
    let mut code = EXIT_OK;

    for cmd in &parts.user {
        if first_error.is_some() {
            break;
        }

        api.update_step_start(cfg.build_id, &cmd.name)
            .await
            .map_err(|source| ExecError::StepStart { name: cmd.name.clone(), source })?;

        write_step_script(&cfg.step_script, &cfg.shell_bin, &cmd.cmd)
            .map_err(|source| ExecError::Script { path: cfg.step_script.clone(), source })?;

        let guid = Uuid::new_v4().to_string();

        emitter.start_cmd(cmd);
        emitter
            .write_line(&format!("$ {}", cmd.cmd))
            .map_err(|source| ExecError::Emitter { source })?;

        let started = Instant::now();
        let event = tokio::select! {
            outcome = step::run_step(&mut session, emitter, &guid, &cfg.step_script) => {
                StepEvent::Completed(outcome)
            }
            Some(err) = timeout_rx.recv() => StepEvent::TimedOut(err),
            Some(err) = abort_rx.recv() => StepEvent::Aborted(err),
        };

        let step_error = match event {
            StepEvent::Completed(outcome) => {
                code = outcome.exit_code;
                outcome.error
            }
            StepEvent::TimedOut(err) => {
                write_timeout_banner(&mut session, &err);
                code = EXIT_TIMEOUT;
                session.signal_abort();
                drain_output(&mut session, emitter, DRAIN_WINDOW).await;
                terminate_sleep(&cfg.shell_bin, &cfg.source_dir, true).await;
                Some(err)
            }
            StepEvent::Aborted(err) => {
                let _ = session.close_shell();
                code = EXIT_ABORT;
                session.signal_abort();
                drain_output(&mut session, emitter, DRAIN_WINDOW).await;
                // Spare the grace-period sleep.
                terminate_sleep(&cfg.shell_bin, &cfg.source_dir, false).await;
                Some(err)
            }
        };

        info!(
            step = %cmd.name,
            exit_code = code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "step finished"
        );

        if first_error.is_none() {
            first_error = step_error;
        }

        api.update_step_stop(cfg.build_id, &cmd.name, code)
            .await
            .map_err(|source| ExecError::StepStop { name: cmd.name.clone(), source })?;
    }

    let mut step_exit_code = code;

    let teardowns: Vec<&CommandDef> =
        parts.user_teardown.iter().chain(parts.sd_teardown.iter()).collect();

    for (index, cmd) in teardowns.iter().enumerate() {
        if index == 0 && first_error.is_none() {
            // Close the session gracefully so its EXIT trap finalizes the
            // env-export file; an aborted shell runs the trap on its own.
            session.close_shell()?;
        }

        api.update_step_start(cfg.build_id, &cmd.name)
            .await
            .map_err(|source| ExecError::StepStart { name: cmd.name.clone(), source })?;

        let outcome = teardown::run_teardown(cmd, emitter, &cfg, step_exit_code).await;
        if outcome.exit_code != EXIT_OK {
            step_exit_code = outcome.exit_code;
        }

        api.update_step_stop(cfg.build_id, &cmd.name, outcome.exit_code)
            .await
            .map_err(|source| ExecError::StepStop { name: cmd.name.clone(), source })?;

        if first_error.is_none() {
            first_error = outcome.error;
        }
    }

    terminate_sleep(&cfg.shell_bin, &cfg.source_dir, true).await;

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Large, unmissable timeout notice typed into the PTY, followed by EOT.
fn write_timeout_banner(session: &mut ShellSession, cause: &ExecError) {
    let rule = "#####################################################################";
    let cause_line = format!("{cause}\n");
    let lines = [
        rule,
        rule,
        rule,
        " _     _                                      _ ",
        "| |   (_)                                    | |",
        "| |_   _   _ __ ___     ___    ___    _   _  | |_ ",
        "| __| | | | '_ ` _ \\   / _ \\  / _ \\  | | | | | __|",
        "| |_  | | | | | | | | |  __/ | (_) | | |_| | | |_ ",
        " \\__| |_| |_| |_| |_|  \\___|  \\___/   \\__,_|  \\__|",
        "",
        cause_line.as_str(),
        "",
        rule,
        rule,
        rule,
    ];
    for line in lines {
        let _ = session.send(&format!("{line}\n"));
    }
    let _ = session.close_shell();
}

/// Bounded drain of already-echoed PTY output (banner, final shell noise)
/// after an abort, so the emitter sees it before teardown begins.
async fn drain_output<E: Emitter>(session: &mut ShellSession, emitter: &mut E, window: Duration) {
    let deadline = Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        match tokio::time::timeout(remaining, session.lines_mut().recv()).await {
            Ok(Some(Ok(line))) => {
                if !line.contains(STEP_ID_EXPORT) {
                    let _ = emitter.write_line(&line);
                }
            }
            Ok(Some(Err(_))) | Ok(None) | Err(_) => return,
        }
    }
}

/// Build commands split by role, preserving insertion order within each.
#[derive(Debug, Default)]
pub(crate) struct Partition {
    pub user: Vec<CommandDef>,
    pub user_teardown: Vec<CommandDef>,
    pub sd_teardown: Vec<CommandDef>,
}

/// Partition by name: `sd-teardown-*` are system teardowns,
/// `(pre|post)?teardown-*` are user teardowns, everything else is an
/// ordinary user step.
pub(crate) fn partition_commands(build: &Build) -> Partition {
    let mut parts = Partition::default();
    for cmd in &build.commands {
        if is_sd_teardown(&cmd.name) {
            parts.sd_teardown.push(cmd.clone());
        } else if is_user_teardown(&cmd.name) {
            parts.user_teardown.push(cmd.clone());
        } else {
            parts.user.push(cmd.clone());
        }
    }
    parts
}

fn is_sd_teardown(name: &str) -> bool {
    name.strip_prefix("sd-teardown-").is_some_and(|rest| !rest.is_empty())
}

fn is_user_teardown(name: &str) -> bool {
    let name = name.strip_prefix("pre").or_else(|| name.strip_prefix("post")).unwrap_or(name);
    name.strip_prefix("teardown-").is_some_and(|rest| !rest.is_empty())
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
