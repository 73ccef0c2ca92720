// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument mapping and result dispatching rules
//!
//! The bi-sided contract between a producer and its consumers: the producer
//! shapes its output under its `ResultDispatchingRule` (sender side), and
//! each consumer assembles its received values under its `ArgsMappingRule`
//! (receiver side).

use serde::{Deserialize, Serialize};

/// Receiver rule: how a worker turns the ordered values received from its
/// dependencies into call arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgsMappingRule {
    /// Each received value becomes one positional argument.
    #[default]
    AsIs,
    /// The single received value is unpacked: a sequence positionally, a
    /// mapping as keyword arguments. Requires exactly one dependency.
    Unpack,
    /// The whole received list becomes one positional argument.
    Merge,
    /// Dependencies gate scheduling but their values are dropped.
    Suppressed,
}

/// Sender rule: how a producer's output is broadcast to its consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultDispatchingRule {
    /// The entire output is sent to every consumer.
    #[default]
    AsIs,
    /// The output must be a sequence with one element per consumer;
    /// element `i` goes to consumer `i` in declaration order.
    InOrder,
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
