// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Call arguments flowing between workers

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Positional and keyword arguments for one worker activation.
///
/// Keyword order is preserved; dependency binding relies on deterministic
/// ordering end to end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keyword: IndexMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.keyword.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// One automa-level input: a plain value, or a sequence distributed
/// element-wise across the start workers (`IN_ORDER` fan-out).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputValue {
    Single(Value),
    Distribute(Vec<Value>),
}

impl InputValue {
    /// The value seen by propagation and snapshots: distributed inputs
    /// collapse back into their sequence form.
    pub fn as_value(&self) -> Value {
        match self {
            Self::Single(value) => value.clone(),
            Self::Distribute(values) => Value::Array(values.clone()),
        }
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

/// The inputs of one `arun` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputArgs {
    pub positional: Vec<InputValue>,
    pub keyword: IndexMap<String, InputValue>,
}

impl InputArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional input.
    pub fn arg(mut self, value: Value) -> Self {
        self.positional.push(InputValue::Single(value));
        self
    }

    /// Set a keyword input.
    pub fn kwarg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.keyword.insert(name.into(), InputValue::Single(value));
        self
    }

    /// Append a positional input distributed across the start workers.
    pub fn distribute_arg(mut self, values: Vec<Value>) -> Self {
        self.positional.push(InputValue::Distribute(values));
        self
    }

    /// Set a keyword input distributed across the start workers.
    pub fn distribute_kwarg(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.keyword.insert(name.into(), InputValue::Distribute(values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Keyword inputs as plain values, for inputs propagation.
    pub fn plain_keyword(&self) -> IndexMap<String, Value> {
        self.keyword
            .iter()
            .map(|(name, value)| (name.clone(), value.as_value()))
            .collect()
    }
}

impl From<Args> for InputArgs {
    fn from(args: Args) -> Self {
        Self {
            positional: args.positional.into_iter().map(InputValue::Single).collect(),
            keyword: args
                .keyword
                .into_iter()
                .map(|(name, value)| (name, InputValue::Single(value)))
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
