// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running options and the process-wide settings registry

use crate::callback::CallbackBuilder;
use parking_lot::Mutex;

/// Per-automa execution options.
#[derive(Clone, Default)]
pub struct RunningOptions {
    /// Emit verbose step-by-step scheduling logs.
    pub debug: bool,
    /// Emit worker argument/result logs.
    pub verbose: bool,
    /// Keep worker local spaces across fresh `arun` calls.
    pub preserve_local_space: bool,
    /// Callbacks composed around every worker of this automa.
    pub callback_builders: Vec<CallbackBuilder>,
}

impl RunningOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    pub fn preserve_local_space(mut self) -> Self {
        self.preserve_local_space = true;
        self
    }

    pub fn callback(mut self, builder: CallbackBuilder) -> Self {
        self.callback_builders.push(builder);
        self
    }
}

static GLOBAL_CALLBACK_BUILDERS: Mutex<Vec<CallbackBuilder>> = Mutex::new(Vec::new());

/// Process-wide settings: callback builders composed around every worker of
/// every automa in the process. This is the only process-level registry;
/// everything else is scoped to an automa or an invocation.
pub struct GlobalSettings;

impl GlobalSettings {
    /// Replace the registered builders.
    pub fn set_callback_builders(builders: Vec<CallbackBuilder>) {
        *GLOBAL_CALLBACK_BUILDERS.lock() = builders;
    }

    /// Append one builder.
    pub fn add_callback_builder(builder: CallbackBuilder) {
        GLOBAL_CALLBACK_BUILDERS.lock().push(builder);
    }

    /// The currently registered builders.
    pub fn callback_builders() -> Vec<CallbackBuilder> {
        GLOBAL_CALLBACK_BUILDERS.lock().clone()
    }

    /// Drop all registered builders.
    pub fn reset() {
        GLOBAL_CALLBACK_BUILDERS.lock().clear();
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
