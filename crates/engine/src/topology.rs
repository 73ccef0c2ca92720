// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graph topology and deferred mutations
//!
//! The worker table keeps registration order; re-adding a removed key
//! appends. Mutations issued from running workers are deferred and drained
//! in enqueue order between dynamic steps, then the graph is re-validated
//! with Kahn's algorithm.

use crate::slot::WorkerSlot;
use automa_core::{Args, AutomaError};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// Whether a mutation happens at declaration time or from a running step.
/// Decides the error kind used for precondition failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Declaration,
    Runtime,
}

impl MutationPhase {
    fn error(self, message: String) -> AutomaError {
        match self {
            Self::Declaration => AutomaError::Declaration(message),
            Self::Runtime => AutomaError::Runtime(message),
        }
    }
}

/// A topology edit requested while a step was running, applied between
/// dynamic steps in enqueue order.
#[derive(Clone)]
pub enum DeferredTask {
    AddWorker(Box<WorkerSlot>),
    RemoveWorker { key: String },
    AddDependency { key: String, dependency: String },
    SetOutputWorker { key: String },
    Ferry { key: String, args: Args },
}

impl DeferredTask {
    /// Whether applying this task changes the graph shape.
    pub fn mutates_topology(&self) -> bool {
        !matches!(self, Self::Ferry { .. })
    }
}

impl std::fmt::Debug for DeferredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddWorker(slot) => write!(f, "AddWorker({})", slot.key),
            Self::RemoveWorker { key } => write!(f, "RemoveWorker({key})"),
            Self::AddDependency { key, dependency } => {
                write!(f, "AddDependency({key} <- {dependency})")
            }
            Self::SetOutputWorker { key } => write!(f, "SetOutputWorker({key})"),
            Self::Ferry { key, .. } => write!(f, "Ferry({key})"),
        }
    }
}

/// The worker table plus derived adjacency.
#[derive(Clone, Default)]
pub struct Topology {
    slots: IndexMap<String, WorkerSlot>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker. Rejects duplicate keys.
    pub fn insert(&mut self, slot: WorkerSlot, phase: MutationPhase) -> Result<(), AutomaError> {
        if self.slots.contains_key(&slot.key) {
            return Err(phase.error(format!(
                "duplicate workers are not allowed: worker '{}' already exists",
                slot.key
            )));
        }
        if slot.is_output {
            self.clear_output();
        }
        self.slots.insert(slot.key.clone(), slot);
        Ok(())
    }

    /// Remove a worker and strip it from every dependency list.
    pub fn remove(&mut self, key: &str, phase: MutationPhase) -> Result<WorkerSlot, AutomaError> {
        let removed = self.slots.shift_remove(key).ok_or_else(|| {
            phase.error(format!("cannot remove worker '{key}': it does not exist"))
        })?;
        for slot in self.slots.values_mut() {
            slot.dependencies.retain(|dep| dep != key);
        }
        Ok(removed)
    }

    /// Add one dependency edge. Both endpoints must exist and the edge must
    /// be new.
    pub fn add_dependency(
        &mut self,
        key: &str,
        dependency: &str,
        phase: MutationPhase,
    ) -> Result<(), AutomaError> {
        if !self.slots.contains_key(key) {
            return Err(phase.error(format!(
                "cannot add a dependency from worker '{key}': it does not exist"
            )));
        }
        if !self.slots.contains_key(dependency) {
            return Err(phase.error(format!(
                "cannot add a dependency on worker '{dependency}': it does not exist"
            )));
        }
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| phase.error(format!("worker '{key}' vanished during mutation")))?;
        if slot.dependencies.iter().any(|dep| dep == dependency) {
            return Err(phase.error(format!(
                "the dependency from '{key}' on '{dependency}' already exists"
            )));
        }
        slot.dependencies.push(dependency.to_string());
        Ok(())
    }

    /// Designate the output worker, clearing the previous designation.
    pub fn set_output(&mut self, key: &str, phase: MutationPhase) -> Result<(), AutomaError> {
        if !self.slots.contains_key(key) {
            return Err(phase.error(format!(
                "cannot set output worker '{key}': it does not exist"
            )));
        }
        self.clear_output();
        if let Some(slot) = self.slots.get_mut(key) {
            slot.is_output = true;
        }
        Ok(())
    }

    fn clear_output(&mut self) {
        for slot in self.slots.values_mut() {
            slot.is_output = false;
        }
    }

    pub fn get(&self, key: &str) -> Option<&WorkerSlot> {
        self.slots.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn slots(&self) -> impl Iterator<Item = &WorkerSlot> {
        self.slots.values()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn start_keys(&self) -> Vec<String> {
        self.slots
            .values()
            .filter(|slot| slot.is_start)
            .map(|slot| slot.key.clone())
            .collect()
    }

    pub fn output_key(&self) -> Option<&str> {
        self.slots
            .values()
            .find(|slot| slot.is_output)
            .map(|slot| slot.key.as_str())
    }

    /// Forward adjacency: producer key to consumer keys, consumers in
    /// declaration order.
    pub fn forwards(&self) -> IndexMap<String, Vec<String>> {
        let mut forwards: IndexMap<String, Vec<String>> = IndexMap::new();
        for slot in self.slots.values() {
            for dep in &slot.dependencies {
                forwards
                    .entry(dep.clone())
                    .or_default()
                    .push(slot.key.clone());
            }
        }
        forwards
    }

    /// Consumers of one producer, in declaration order.
    pub fn successors_of(&self, key: &str) -> Vec<String> {
        self.slots
            .values()
            .filter(|slot| slot.dependencies.iter().any(|dep| dep == key))
            .map(|slot| slot.key.clone())
            .collect()
    }

    /// Number of consumers wired to one producer.
    pub fn dependents_of(&self, key: &str) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.dependencies.iter().any(|dep| dep == key))
            .count()
    }

    /// Validate that every dependency target exists and the graph is a DAG
    /// (Kahn's algorithm). Cycle errors name every worker still on a cycle.
    pub fn validate(&self) -> Result<(), AutomaError> {
        for slot in self.slots.values() {
            for dep in &slot.dependencies {
                if !self.slots.contains_key(dep) {
                    return Err(AutomaError::Compilation(format!(
                        "the dependency '{dep}' of worker '{}' does not exist",
                        slot.key
                    )));
                }
            }
        }

        let mut in_degree: IndexMap<&str, usize> = self
            .slots
            .keys()
            .map(|key| (key.as_str(), 0usize))
            .collect();
        for slot in self.slots.values() {
            *in_degree
                .entry(slot.key.as_str())
                .or_insert(0) += slot.dependencies.len();
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(key, _)| *key)
            .collect();
        let mut visited: IndexSet<&str> = IndexSet::new();

        while let Some(key) = queue.pop_front() {
            visited.insert(key);
            for successor in self.successors_of(key) {
                if let Some(degree) = self
                    .slots
                    .get_key_value(&successor)
                    .and_then(|(k, _)| in_degree.get_mut(k.as_str()))
                {
                    *degree -= 1;
                    if *degree == 0 {
                        if let Some((k, _)) = self.slots.get_key_value(&successor) {
                            queue.push_back(k.as_str());
                        }
                    }
                }
            }
        }

        if visited.len() != self.slots.len() {
            let in_cycle: Vec<&str> = self
                .slots
                .keys()
                .map(String::as_str)
                .filter(|key| !visited.contains(key))
                .collect();
            return Err(AutomaError::Compilation(format!(
                "the graph does not satisfy the DAG constraint; workers in cycle: [{}]",
                in_cycle.join(", ")
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.slots
                    .values()
                    .map(|slot| (&slot.key, &slot.dependencies)),
            )
            .finish()
    }
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod tests;
