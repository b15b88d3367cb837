// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step script materializer.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Write `cmd` to `path` as an executable script run under `shell_bin -e`.
///
/// Overwrites the previous step's script.
pub fn write_step_script(path: &Path, shell_bin: &str, cmd: &str) -> io::Result<()> {
    fs::write(path, format!("#!{shell_bin} -e\n{cmd}"))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
