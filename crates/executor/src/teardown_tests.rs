// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the teardown runner.

use std::fs;

use bh_core::test_support::{step, RecordingEmitter};
use bh_core::{EXIT_LAUNCH, EXIT_OK};
use tempfile::TempDir;

use super::*;

fn test_cfg(dir: &TempDir) -> ExecConfig {
    ExecConfig::new(dir.path(), 1)
        .env_file_prefix(dir.path().join("buildEnv"))
        .source_dir(dir.path())
}

/// Pre-create the export file so the wrapper's wait loop returns instantly.
fn write_export(cfg: &ExecConfig, contents: &str) {
    fs::write(cfg.export_file(), contents).unwrap();
}

#[tokio::test]
async fn streams_output_and_reports_success() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(&dir);
    write_export(&cfg, "");
    let mut emitter = RecordingEmitter::new();

    let cmd = step("teardown-logs", "echo goodbye");
    let outcome = run_teardown(&cmd, &mut emitter, &cfg, 0).await;

    assert_eq!(outcome.exit_code, EXIT_OK);
    assert!(outcome.error.is_none());
    assert_eq!(emitter.started(), ["teardown-logs"]);
    assert!(emitter.contains("$ echo goodbye"));
    assert!(emitter.contains("goodbye"));
}

#[tokio::test]
async fn sources_export_file_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(&dir);
    write_export(&cfg, "export FOO=\"from-the-session\"\n");
    let mut emitter = RecordingEmitter::new();

    let cmd = step("teardown-env", "echo FOO is $FOO");
    let outcome = run_teardown(&cmd, &mut emitter, &cfg, 0).await;

    assert_eq!(outcome.exit_code, EXIT_OK);
    assert!(emitter.contains("FOO is from-the-session"));
}

#[tokio::test]
async fn missing_export_file_is_not_fatal() {
    // The wait loop sleeps; keep the sleep reaper out of this test's way.
    let _guard = crate::test_util::process_lock();
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(&dir);
    let mut emitter = RecordingEmitter::new();

    // No export file: the wrapper waits out its bound, then runs anyway.
    let cmd = step("teardown-env", "echo FOO is $FOO");
    let outcome = run_teardown(&cmd, &mut emitter, &cfg, 0).await;

    assert_eq!(outcome.exit_code, EXIT_OK);
    assert!(emitter.contains("FOO is"));
}

#[tokio::test]
async fn exposes_step_exit_code_to_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(&dir);
    write_export(&cfg, "");
    let mut emitter = RecordingEmitter::new();

    let cmd = step("teardown-code", "echo step exited $SD_STEP_EXIT_CODE");
    let outcome = run_teardown(&cmd, &mut emitter, &cfg, 7).await;

    assert_eq!(outcome.exit_code, EXIT_OK);
    assert!(emitter.contains("step exited 7"));
}

#[tokio::test]
async fn nonzero_exit_reports_code_and_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(&dir);
    write_export(&cfg, "");
    let mut emitter = RecordingEmitter::new();

    let cmd = step("teardown-fail", "exit 9");
    let outcome = run_teardown(&cmd, &mut emitter, &cfg, 0).await;

    assert_eq!(outcome.exit_code, 9);
    assert!(matches!(outcome.error, Some(ExecError::ExitStatus { code: 9 })));
}

#[tokio::test]
async fn stderr_reaches_the_emitter() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(&dir);
    write_export(&cfg, "");
    let mut emitter = RecordingEmitter::new();

    let cmd = step("teardown-warn", "echo complaint >&2");
    let outcome = run_teardown(&cmd, &mut emitter, &cfg, 0).await;

    assert_eq!(outcome.exit_code, EXIT_OK);
    assert!(emitter.contains("complaint"));
}

#[tokio::test]
async fn launch_failure_maps_to_exit_launch() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(&dir).shell_bin("/no/such/shell");
    let mut emitter = RecordingEmitter::new();

    let cmd = step("teardown-x", "echo unreachable");
    let outcome = run_teardown(&cmd, &mut emitter, &cfg, 0).await;

    assert_eq!(outcome.exit_code, EXIT_LAUNCH);
    assert!(matches!(outcome.error, Some(ExecError::Launch { .. })));
}

#[test]
fn wrapper_embeds_wait_loop_and_sourcing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(&dir);

    let wrapper = teardown_wrapper(&cfg, "make clean", 3);
    let export_file = cfg.export_file().display().to_string();

    assert!(wrapper.contains("SD_STEP_EXIT_CODE=3"));
    assert!(wrapper.contains(&format!("while ! [ -f {export_file} ]")));
    assert!(wrapper.contains(&format!(". {export_file}")));
    assert!(wrapper.ends_with("make clean"));
}
