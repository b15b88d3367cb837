// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log emitter seam.

use crate::build::CommandDef;

/// Write-only sink for build output, decorated with step transitions.
///
/// Writes are serialized by the supervisor's sequencing: at most one step or
/// teardown is active at any time.
pub trait Emitter: Send {
    /// Notify the sink that the named command's output follows.
    fn start_cmd(&mut self, cmd: &CommandDef);

    /// Append one logical line of output; the sink supplies the newline.
    fn write_line(&mut self, line: &str) -> std::io::Result<()>;
}
