// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the step script materializer.

use std::fs;
use std::os::unix::fs::PermissionsExt;

use super::*;

#[test]
fn writes_shebang_and_body() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("step.sh");

    write_step_script(&path, "/bin/sh", "echo hello").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh -e\necho hello");
}

#[test]
fn script_is_executable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("step.sh");

    write_step_script(&path, "/bin/sh", "true").unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn overwrites_previous_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("step.sh");

    write_step_script(&path, "/bin/sh", "echo a much longer first command").unwrap();
    write_step_script(&path, "/bin/sh", "true").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh -e\ntrue");
}

#[test]
fn missing_parent_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("step.sh");

    assert!(write_step_script(&path, "/bin/sh", "true").is_err());
}
