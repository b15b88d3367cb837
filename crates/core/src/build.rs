// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build plan data model.

use serde::{Deserialize, Serialize};

/// One named shell command from the build plan.
///
/// The name classifies the command: `sd-teardown-*` names are system
/// teardowns, `teardown-*`/`preteardown-*`/`postteardown-*` names are user
/// teardowns, everything else is an ordinary user step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDef {
    pub name: String,
    /// Shell source executed for this step.
    pub cmd: String,
}

impl CommandDef {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self { name: name.into(), cmd: cmd.into() }
    }
}

/// The ordered command list belonging to one build, as delivered by the
/// build-plan fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub commands: Vec<CommandDef>,
}

impl Build {
    pub fn new(commands: Vec<CommandDef>) -> Self {
        Self { commands }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
