// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker slots: the stable in-graph record of a registered worker

use crate::callback::CallbackBuilder;
use crate::worker::Worker;
use automa_core::{ArgsMappingRule, AutomaError, ResultDispatchingRule, Signature};
use std::sync::Arc;

/// Registration options for [`crate::GraphAutoma::add_worker`] and friends.
#[derive(Clone, Default)]
pub struct WorkerOptions {
    pub dependencies: Vec<String>,
    pub is_start: bool,
    pub is_output: bool,
    pub args_mapping_rule: ArgsMappingRule,
    pub result_dispatching_rule: ResultDispatchingRule,
    pub callback_builders: Vec<CallbackBuilder>,
}

impl WorkerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn start(mut self) -> Self {
        self.is_start = true;
        self
    }

    pub fn output(mut self) -> Self {
        self.is_output = true;
        self
    }

    pub fn args_mapping(mut self, rule: ArgsMappingRule) -> Self {
        self.args_mapping_rule = rule;
        self
    }

    pub fn result_dispatching(mut self, rule: ResultDispatchingRule) -> Self {
        self.result_dispatching_rule = rule;
        self
    }

    pub fn callback(mut self, builder: CallbackBuilder) -> Self {
        self.callback_builders.push(builder);
        self
    }
}

/// The in-graph record for one worker.
///
/// The slot is the topology's unit of bookkeeping: it survives as the
/// stable record even when the underlying worker object is swapped, and it
/// caches the declared signature at registration time.
#[derive(Clone)]
pub struct WorkerSlot {
    pub key: String,
    pub worker: Arc<dyn Worker>,
    pub signature: Signature,
    pub dependencies: Vec<String>,
    pub is_start: bool,
    pub is_output: bool,
    pub args_mapping_rule: ArgsMappingRule,
    pub result_dispatching_rule: ResultDispatchingRule,
    pub callback_builders: Vec<CallbackBuilder>,
}

impl WorkerSlot {
    /// Build a slot, validating the worker's declared signature.
    pub fn new(
        key: impl Into<String>,
        worker: Arc<dyn Worker>,
        options: WorkerOptions,
    ) -> Result<Self, AutomaError> {
        let signature = worker.signature();
        signature.validate()?;
        Ok(Self {
            key: key.into(),
            worker,
            signature,
            dependencies: options.dependencies,
            is_start: options.is_start,
            is_output: options.is_output,
            args_mapping_rule: options.args_mapping_rule,
            result_dispatching_rule: options.result_dispatching_rule,
            callback_builders: options.callback_builders,
        })
    }

    /// Whether this slot wraps a nested automa.
    pub fn is_nested(&self) -> bool {
        self.worker.as_automa().is_some()
    }
}

impl std::fmt::Debug for WorkerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("key", &self.key)
            .field("dependencies", &self.dependencies)
            .field("is_start", &self.is_start)
            .field("is_output", &self.is_output)
            .field("args_mapping_rule", &self.args_mapping_rule)
            .field("result_dispatching_rule", &self.result_dispatching_rule)
            .finish()
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
