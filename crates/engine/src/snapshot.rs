// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot state capture and restore
//!
//! A snapshot encodes, for the root automa and transitively every nested
//! automa: topology records, output buffers, local spaces, interaction
//! state, fan-out counters and the paused run bookkeeping. Worker bodies
//! are code and are not serialized; loading requires a congruent declared
//! graph and fails naming the first worker it cannot find.

use crate::binding::ArgsBinder;
use crate::slot::WorkerSlot;
use crate::topology::{DeferredTask, Topology};
use automa_core::{
    Args, ArgsMappingRule, AutomaError, AutomaId, InputArgs, Interaction, InteractionFeedback,
    ResultDispatchingRule,
};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Topology record of one worker, without its body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SlotState {
    pub key: String,
    pub dependencies: Vec<String>,
    pub is_start: bool,
    pub is_output: bool,
    pub args_mapping_rule: ArgsMappingRule,
    pub result_dispatching_rule: ResultDispatchingRule,
    pub nested: bool,
}

impl SlotState {
    pub fn capture(slot: &WorkerSlot) -> Self {
        Self {
            key: slot.key.clone(),
            dependencies: slot.dependencies.clone(),
            is_start: slot.is_start,
            is_output: slot.is_output,
            args_mapping_rule: slot.args_mapping_rule,
            result_dispatching_rule: slot.result_dispatching_rule,
            nested: slot.is_nested(),
        }
    }
}

/// Serializable form of a deferred task. Worker additions cannot cross a
/// snapshot boundary (their bodies are code); in practice the deferred
/// queue is fully drained before a pause is declared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum DeferredState {
    RemoveWorker { key: String },
    AddDependency { key: String, dependency: String },
    SetOutputWorker { key: String },
    Ferry { key: String, args: Args },
}

impl DeferredState {
    pub fn capture(task: &DeferredTask) -> Result<Self, AutomaError> {
        match task {
            DeferredTask::AddWorker(slot) => Err(AutomaError::Serialization(format!(
                "cannot snapshot a pending add of worker '{}': worker bodies are not serializable",
                slot.key
            ))),
            DeferredTask::RemoveWorker { key } => Ok(Self::RemoveWorker { key: key.clone() }),
            DeferredTask::AddDependency { key, dependency } => Ok(Self::AddDependency {
                key: key.clone(),
                dependency: dependency.clone(),
            }),
            DeferredTask::SetOutputWorker { key } => {
                Ok(Self::SetOutputWorker { key: key.clone() })
            }
            DeferredTask::Ferry { key, args } => Ok(Self::Ferry {
                key: key.clone(),
                args: args.clone(),
            }),
        }
    }

    pub fn rebuild(self) -> DeferredTask {
        match self {
            Self::RemoveWorker { key } => DeferredTask::RemoveWorker { key },
            Self::AddDependency { key, dependency } => {
                DeferredTask::AddDependency { key, dependency }
            }
            Self::SetOutputWorker { key } => DeferredTask::SetOutputWorker { key },
            Self::Ferry { key, args } => DeferredTask::Ferry { key, args },
        }
    }
}

/// Bookkeeping of a paused invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RunStateDump {
    pub outputs: IndexMap<String, Value>,
    pub completed: Vec<String>,
    pub unfulfilled: IndexMap<String, Vec<String>>,
    /// Parked workers with the base arguments they were dispatched with.
    pub parked: IndexMap<String, Args>,
    pub binder: ArgsBinder,
    pub inputs: InputArgs,
    pub deferred: Vec<DeferredState>,
}

/// The recursive state of one automa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AutomaState {
    pub name: String,
    pub automa_id: AutomaId,
    pub slots: Vec<SlotState>,
    pub local_spaces: IndexMap<String, IndexMap<String, Value>>,
    pub pending: Vec<Interaction>,
    pub answered: IndexMap<String, Vec<InteractionFeedback>>,
    pub run: Option<RunStateDump>,
    pub children: IndexMap<String, AutomaState>,
}

/// Reshape an existing topology to the recorded slot list: recorded order,
/// recorded dependencies and flags, existing worker bodies. Fails on a
/// recorded key with no registered body.
pub(crate) fn reshape_topology(
    current: &Topology,
    recorded: &[SlotState],
) -> Result<Topology, AutomaError> {
    let mut reshaped = Topology::new();
    for state in recorded {
        let existing = current.get(&state.key).ok_or_else(|| {
            AutomaError::Serialization(format!(
                "snapshot references worker '{}' which is not registered on this automa; \
                 re-register it before loading",
                state.key
            ))
        })?;
        let mut slot = existing.clone();
        slot.dependencies = state.dependencies.clone();
        slot.is_start = state.is_start;
        slot.is_output = state.is_output;
        slot.args_mapping_rule = state.args_mapping_rule;
        slot.result_dispatching_rule = state.result_dispatching_rule;
        reshaped.insert(slot, crate::topology::MutationPhase::Declaration)?;
    }
    Ok(reshaped)
}

/// Capture the serializable form of a deferred queue.
pub(crate) fn capture_deferred(
    deferred: &VecDeque<DeferredTask>,
) -> Result<Vec<DeferredState>, AutomaError> {
    deferred.iter().map(DeferredState::capture).collect()
}

/// Restore a deferred queue from its serialized form.
pub(crate) fn rebuild_deferred(states: Vec<DeferredState>) -> VecDeque<DeferredTask> {
    states.into_iter().map(DeferredState::rebuild).collect()
}

/// Convert unfulfilled-set bookkeeping into its serialized form.
pub(crate) fn capture_unfulfilled(
    unfulfilled: &IndexMap<String, IndexSet<String>>,
) -> IndexMap<String, Vec<String>> {
    unfulfilled
        .iter()
        .map(|(key, deps)| (key.clone(), deps.iter().cloned().collect()))
        .collect()
}

/// Restore unfulfilled-set bookkeeping from its serialized form.
pub(crate) fn rebuild_unfulfilled(
    dump: IndexMap<String, Vec<String>>,
) -> IndexMap<String, IndexSet<String>> {
    dump.into_iter()
        .map(|(key, deps)| (key, deps.into_iter().collect()))
        .collect()
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
