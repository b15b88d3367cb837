// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the sleep reaper.

use super::*;

#[test]
fn kill_all_snippet_kills_every_pid() {
    let snippet = reap_snippet(true);
    assert!(snippet.contains("grep '[s]leep'"));
    assert!(snippet.contains("if [ ! -z $pids ]; then kill $pids"));
    assert!(!snippet.contains("pidcnt"));
}

#[test]
fn selective_snippet_spares_the_last_pid() {
    let snippet = reap_snippet(false);
    assert!(snippet.contains("grep '[s]leep'"));
    assert!(snippet.contains("pidcnt=$(echo $pids | wc -w)"));
    // The awk pass drops the final field, preserving the grace-period sleep.
    assert!(snippet.contains("awk '{$NF=\"\"}1'"));
}

#[tokio::test]
async fn reaping_is_never_fatal() {
    let _guard = crate::test_util::process_lock();
    let dir = tempfile::tempdir().unwrap();
    // Even with a bogus shell the call must swallow the failure.
    terminate_sleep("/no/such/shell", dir.path(), true).await;
    terminate_sleep("/bin/sh", dir.path(), true).await;
    terminate_sleep("/bin/sh", dir.path(), false).await;
}
