// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for tests that touch host-wide process state.

use parking_lot::{Mutex, MutexGuard};

static PROCESS_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that spawn `sleep` waiters or invoke the sleep reaper:
/// the reaper matches every `sleep` on the host, so such tests must not
/// overlap.
pub(crate) fn process_lock() -> MutexGuard<'static, ()> {
    PROCESS_LOCK.lock()
}
