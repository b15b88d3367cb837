// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cleanup of lingering `sleep` processes used as wait primitives.

use std::path::Path;

use tokio::process::Command;
use tracing::warn;

/// Kill stray `sleep` processes after aborts, timeouts, and teardown.
///
/// With `kill_all` false the last-listed pid survives: it is assumed to be
/// the sleep enforcing the termination grace period. Failures are logged and
/// swallowed; reaping is never fatal to the build.
pub async fn terminate_sleep(shell_bin: &str, source_dir: &Path, kill_all: bool) {
    let result = Command::new(shell_bin)
        .arg("-e")
        .arg("-c")
        .arg(reap_snippet(kill_all))
        .current_dir(source_dir)
        .output()
        .await;

    match result {
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if !output.status.success() || !stderr.is_empty() {
                warn!(exit = ?output.status.code(), stderr = %stderr, "error terminating sleep processes");
            }
        }
        Err(e) => warn!(error = %e, "error terminating sleep processes"),
    }
}

/// `ps`-based pid harvest; `[s]leep` keeps the grep itself out of the match
/// set.
fn reap_snippet(kill_all: bool) -> &'static str {
    if kill_all {
        "pids=$(ps -ef | grep '[s]leep' | awk '{print $2}'); \
         if [ ! -z $pids ]; then kill $pids; else echo $pids; fi;"
    } else {
        "pids=$(ps -ef | grep '[s]leep' | awk '{print $2}'); \
         pidcnt=$(echo $pids | wc -w); \
         if [ $pidcnt -gt 1 ]; then kill $(echo $pids | awk '{$NF=\"\"}1'); else echo $pids; fi;"
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
