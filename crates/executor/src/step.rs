// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-step driver.

use std::path::Path;

use bh_core::{Emitter, EXIT_UNKNOWN};

use crate::demux;
use crate::error::StepOutcome;
use crate::session::ShellSession;

/// Run one user step to completion inside the session's shell.
///
/// The invocation stamps the step id (so the EXIT trap reports the right
/// step), sources the script in the current shell so environment mutations
/// persist into later steps, emits a newline in case the script's output
/// didn't end with one, and finishes with the `echo <guid> $?` sentinel the
/// demultiplexer watches for.
pub async fn run_step<E: Emitter>(
    session: &mut ShellSession,
    emitter: &mut E,
    guid: &str,
    script_path: &Path,
) -> StepOutcome {
    let invocation = format!(
        "export SD_STEP_ID={guid} ;. {} ;echo ;echo {guid} $?\n",
        script_path.display()
    );
    if let Err(error) = session.send(&invocation) {
        return StepOutcome::failed(EXIT_UNKNOWN, error);
    }

    session.begin_step();
    let outcome = demux::copy_until_sentinel(session.lines_mut(), emitter, guid).await;
    session.finish_step();
    outcome
}
