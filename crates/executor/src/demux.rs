// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output demultiplexer: forwards PTY lines to the emitter until the step's
//! exit sentinel is observed.

use bh_core::{Emitter, EXIT_UNKNOWN};
use tokio::sync::mpsc;

use crate::error::{ExecError, StepOutcome};

/// Marker the step runner exports before sourcing the script. Internal
/// wiring, suppressed from the emitter.
pub(crate) const STEP_ID_EXPORT: &str = "export SD_STEP_ID=";

/// Copy lines to the emitter until the `<guid> <code>` exit sentinel.
///
/// A channel closed before the sentinel is a clean EOF and reports success:
/// no failure sentinel was observed, and the supervisor's other channels
/// carry any real failure in that case.
pub async fn copy_until_sentinel<E: Emitter>(
    lines: &mut mpsc::Receiver<std::io::Result<String>>,
    emitter: &mut E,
    guid: &str,
) -> StepOutcome {
    let export_marker = format!("{STEP_ID_EXPORT}{guid}");

    while let Some(next) = lines.recv().await {
        let line = match next {
            Ok(line) => line,
            Err(source) => {
                return StepOutcome::failed(EXIT_UNKNOWN, ExecError::Reader { source })
            }
        };

        if let Some(digits) = sentinel_digits(&line, guid) {
            return match digits.parse::<i32>() {
                Ok(0) => StepOutcome::ok(),
                Ok(code) => StepOutcome::failed(code, ExecError::ExitStatus { code }),
                Err(source) => StepOutcome::failed(EXIT_UNKNOWN, ExecError::Sentinel { source }),
            };
        }

        // The echoed invocation line carries the SD_STEP_ID export; keep it
        // out of the build log.
        if line.contains(&export_marker) {
            continue;
        }

        if let Err(source) = emitter.write_line(&line) {
            return StepOutcome::failed(EXIT_UNKNOWN, ExecError::Emitter { source });
        }
    }

    StepOutcome::ok()
}

/// Digit run following `<guid> ` anywhere in the line, if present.
///
/// The echoed sentinel command itself (`echo <guid> $?`) never matches: `$?`
/// is not a digit.
fn sentinel_digits<'a>(line: &'a str, guid: &str) -> Option<&'a str> {
    for (idx, _) in line.match_indices(guid) {
        let rest = &line[idx + guid.len()..];
        let Some(rest) = rest.strip_prefix(' ') else { continue };
        let len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        if len > 0 {
            return Some(&rest[..len]);
        }
    }
    None
}

#[cfg(test)]
#[path = "demux_tests.rs"]
mod tests;
