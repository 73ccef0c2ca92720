// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::slot::{WorkerOptions, WorkerSlot};
use crate::worker::FnWorker;
use automa_core::Signature;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn slot(key: &str, deps: &[&str]) -> WorkerSlot {
    WorkerSlot::new(
        key,
        Arc::new(FnWorker::new(Signature::new(), |_args, _cx| Ok(json!(null)))),
        WorkerOptions::new().depends_on(deps.iter().copied()),
    )
    .unwrap()
}

fn topology(edges: &[(&str, &[&str])]) -> Topology {
    let mut topology = Topology::new();
    for (key, deps) in edges {
        topology
            .insert(slot(key, deps), MutationPhase::Declaration)
            .unwrap();
    }
    topology
}

#[test]
fn duplicate_insert_rejected() {
    let mut topology = topology(&[("a", &[])]);
    let err = topology
        .insert(slot("a", &[]), MutationPhase::Runtime)
        .unwrap_err();
    assert!(err.to_string().contains("duplicate workers"));
    assert!(err.to_string().contains("'a'"));
}

#[test]
fn remove_strips_dependency_lists() {
    let mut topology = topology(&[("a", &[]), ("b", &["a"]), ("c", &["a", "b"])]);
    topology.remove("a", MutationPhase::Runtime).unwrap();
    assert!(!topology.contains("a"));
    assert_eq!(topology.get("b").unwrap().dependencies, Vec::<String>::new());
    assert_eq!(topology.get("c").unwrap().dependencies, vec!["b"]);
}

#[test]
fn remove_missing_rejected() {
    let mut topology = topology(&[("a", &[])]);
    let err = topology.remove("ghost", MutationPhase::Runtime).unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn readd_after_remove_appends() {
    let mut topology = topology(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
    topology.remove("b", MutationPhase::Runtime).unwrap();
    topology
        .insert(slot("b", &["a"]), MutationPhase::Runtime)
        .unwrap();
    let keys: Vec<_> = topology.keys().collect();
    assert_eq!(keys, vec!["a", "c", "b"]);
}

#[test]
fn add_dependency_preconditions() {
    let mut topology = topology(&[("a", &[]), ("b", &["a"])]);

    let err = topology
        .add_dependency("ghost", "a", MutationPhase::Runtime)
        .unwrap_err();
    assert!(err.to_string().contains("from worker 'ghost'"));

    let err = topology
        .add_dependency("b", "ghost", MutationPhase::Runtime)
        .unwrap_err();
    assert!(err.to_string().contains("on worker 'ghost'"));

    let err = topology
        .add_dependency("b", "a", MutationPhase::Runtime)
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));

    topology
        .add_dependency("a", "b", MutationPhase::Runtime)
        .unwrap();
    assert_eq!(topology.get("a").unwrap().dependencies, vec!["b"]);
}

#[test]
fn set_output_moves_designation() {
    let mut topology = topology(&[("a", &[]), ("b", &["a"])]);
    topology.set_output("a", MutationPhase::Runtime).unwrap();
    assert_eq!(topology.output_key(), Some("a"));
    topology.set_output("b", MutationPhase::Runtime).unwrap();
    assert_eq!(topology.output_key(), Some("b"));

    let err = topology
        .set_output("ghost", MutationPhase::Runtime)
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn output_flag_on_insert_clears_previous() {
    let mut topology = Topology::new();
    let mut first = slot("a", &[]);
    first.is_output = true;
    topology.insert(first, MutationPhase::Declaration).unwrap();
    let mut second = slot("b", &["a"]);
    second.is_output = true;
    topology.insert(second, MutationPhase::Declaration).unwrap();
    assert_eq!(topology.output_key(), Some("b"));
}

#[test]
fn forwards_preserve_declaration_order() {
    let topology = topology(&[
        ("start", &[]),
        ("f1", &["start"]),
        ("f2", &["start"]),
        ("f3", &["start"]),
    ]);
    let forwards = topology.forwards();
    assert_eq!(forwards["start"], vec!["f1", "f2", "f3"]);
    assert_eq!(topology.successors_of("start"), vec!["f1", "f2", "f3"]);
    assert_eq!(topology.dependents_of("start"), 3);
}

#[test]
fn validate_accepts_dag() {
    let topology = topology(&[("a", &[]), ("b", &["a"]), ("c", &["a", "b"])]);
    assert!(topology.validate().is_ok());
}

#[test]
fn validate_rejects_missing_dependency() {
    let topology = topology(&[("a", &["ghost"])]);
    let err = topology.validate().unwrap_err();
    assert!(err
        .to_string()
        .contains("the dependency 'ghost' of worker 'a' does not exist"));
}

#[test]
fn validate_names_cycle_members() {
    let topology = topology(&[("a", &[]), ("b", &["c"]), ("c", &["b"]), ("d", &["a"])]);
    let err = topology.validate().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("workers in cycle"));
    assert!(message.contains("b"));
    assert!(message.contains("c"));
    assert!(!message.contains("d,"));
}

#[test]
fn deferred_task_topology_classification() {
    assert!(DeferredTask::RemoveWorker { key: "a".into() }.mutates_topology());
    assert!(!DeferredTask::Ferry {
        key: "a".into(),
        args: Args::new(),
    }
    .mutates_topology());
}

// Reference acyclicity check: DFS from every node.
fn is_acyclic(n: usize, edges: &[(usize, usize)]) -> bool {
    let mut adjacency = vec![Vec::new(); n];
    for (from, to) in edges {
        adjacency[*from].push(*to);
    }
    // 0 = unvisited, 1 = on stack, 2 = done
    let mut state = vec![0u8; n];
    fn visit(node: usize, adjacency: &[Vec<usize>], state: &mut [u8]) -> bool {
        state[node] = 1;
        for &next in &adjacency[node] {
            match state[next] {
                1 => return false,
                0 => {
                    if !visit(next, adjacency, state) {
                        return false;
                    }
                }
                _ => {}
            }
        }
        state[node] = 2;
        true
    }
    (0..n).all(|node| state[node] != 0 || visit(node, &adjacency, &mut state))
}

proptest! {
    // The compiler accepts a graph iff it is a DAG.
    #[test]
    fn validate_accepts_iff_acyclic(
        n in 1usize..8,
        raw_edges in proptest::collection::vec((0usize..8, 0usize..8), 0..20),
    ) {
        let edges: Vec<(usize, usize)> = raw_edges
            .into_iter()
            .map(|(from, to)| (from % n, to % n))
            .filter(|(from, to)| from != to)
            .collect();

        let mut topology = Topology::new();
        for node in 0..n {
            let deps: Vec<String> = edges
                .iter()
                .filter(|(_, to)| *to == node)
                .map(|(from, _)| format!("w{from}"))
                .collect();
            let mut unique = Vec::new();
            for dep in deps {
                if !unique.contains(&dep) {
                    unique.push(dep);
                }
            }
            let slot = WorkerSlot::new(
                format!("w{node}"),
                Arc::new(FnWorker::new(Signature::new(), |_args, _cx| Ok(json!(null)))),
                WorkerOptions::new().depends_on(unique),
            )
            .unwrap();
            topology.insert(slot, MutationPhase::Declaration).unwrap();
        }

        let unique_edges: Vec<(usize, usize)> = {
            let mut seen = Vec::new();
            for edge in edges {
                if !seen.contains(&edge) {
                    seen.push(edge);
                }
            }
            seen
        };
        prop_assert_eq!(topology.validate().is_ok(), is_acyclic(n, &unique_edges));
    }
}
