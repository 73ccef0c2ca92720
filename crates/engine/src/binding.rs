// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The arg-binding engine
//!
//! Arguments for a worker about to run are the ordered merge of three
//! sources: dependency binding (or start binding for seeded workers),
//! inputs propagation, and descriptor injection. Injection wins by
//! parameter name. Within dependency binding, each producer's output is
//! shaped by its sender rule, then assembled under the receiver's mapping
//! rule, and finally mapped onto the declared signature.

use crate::automa::GraphAutoma;
use crate::topology::Topology;
use crate::worker::RuntimeContext;
use automa_core::{
    Args, ArgsMappingRule, AutomaError, InputArgs, InputValue, InvocationId, ParamSource,
    ResultDispatchingRule, Signature, SystemTag,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One resolved argument: a plain value, or an automa handle injected via
/// `System("automa")` / `System("automa:<key>")`.
#[derive(Clone)]
pub enum Binding {
    Value(Value),
    Automa(GraphAutoma),
}

impl Binding {
    fn display_value(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Automa(automa) => Value::String(format!("<automa:{}>", automa.name())),
        }
    }
}

/// The fully bound arguments of one worker activation.
#[derive(Clone, Default)]
pub struct BoundArgs {
    named: IndexMap<String, Binding>,
    var_positional: Vec<Value>,
    var_keyword: IndexMap<String, Value>,
    call_args: Vec<Value>,
    call_kwargs: IndexMap<String, Value>,
}

impl BoundArgs {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The value bound to a named parameter.
    pub fn get(&self, name: &str) -> Result<Value, AutomaError> {
        match self.named.get(name) {
            Some(Binding::Value(value)) => Ok(value.clone()),
            Some(Binding::Automa(_)) => Err(AutomaError::WorkerInfra(format!(
                "parameter '{name}' holds an automa handle; use automa()"
            ))),
            None => Err(AutomaError::WorkerInfra(format!(
                "parameter '{name}' is not bound"
            ))),
        }
    }

    pub fn opt(&self, name: &str) -> Option<Value> {
        match self.named.get(name) {
            Some(Binding::Value(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// The automa handle injected into a `System("automa")` parameter.
    pub fn automa(&self, name: &str) -> Result<GraphAutoma, AutomaError> {
        match self.named.get(name) {
            Some(Binding::Automa(automa)) => Ok(automa.clone()),
            Some(Binding::Value(_)) => Err(AutomaError::WorkerInfra(format!(
                "parameter '{name}' holds a plain value, not an automa handle"
            ))),
            None => Err(AutomaError::WorkerInfra(format!(
                "parameter '{name}' is not bound"
            ))),
        }
    }

    /// The runtime context injected into a `System("runtime_context")`
    /// parameter.
    pub fn runtime_context(&self, name: &str) -> Result<RuntimeContext, AutomaError> {
        let value = self.get(name)?;
        serde_json::from_value(value).map_err(|err| {
            AutomaError::WorkerInfra(format!(
                "parameter '{name}' does not hold a runtime context: {err}"
            ))
        })
    }

    pub fn var_positional(&self) -> &[Value] {
        &self.var_positional
    }

    pub fn var_keyword(&self) -> &IndexMap<String, Value> {
        &self.var_keyword
    }

    /// The effective call shape, as seen by callbacks:
    /// `{"args": [...], "kwargs": {...}}`.
    pub fn arguments_json(&self) -> Value {
        let kwargs: serde_json::Map<String, Value> = self
            .call_kwargs
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        serde_json::json!({
            "args": self.call_args.clone(),
            "kwargs": Value::Object(kwargs),
        })
    }

    /// Flatten back into plain call arguments, used to feed nested automas.
    pub fn into_args(self) -> Args {
        Args {
            positional: self.call_args,
            keyword: self.call_kwargs,
        }
    }
}

/// Identity of one value sender: a worker, or one automa-level input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SenderKey {
    Worker(String),
    InputPositional(usize),
    InputKeyword(String),
}

impl SenderKey {
    fn describe(&self) -> String {
        match self {
            Self::Worker(key) => format!("worker '{key}'"),
            Self::InputPositional(index) => format!("input argument #{index}"),
            Self::InputKeyword(name) => format!("input argument '{name}'"),
        }
    }
}

/// `IN_ORDER` fan-out bookkeeping for one sender.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardCounter {
    pub count: usize,
    pub index: usize,
}

/// Invocation-scoped binder: owns the fan-out counters and assembles
/// `BoundArgs` for each dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgsBinder {
    // Serialized as an entry sequence: SenderKey is not a JSON map key.
    #[serde(with = "indexmap::map::serde_seq")]
    counters: IndexMap<SenderKey, ForwardCounter>,
}

impl ArgsBinder {
    pub fn new(topology: &Topology, inputs: &InputArgs) -> Self {
        let mut binder = Self {
            counters: IndexMap::new(),
        };
        binder.sync_topology(topology, inputs);
        binder
    }

    /// Recompute fan-out counts after a topology change, preserving the
    /// indices already consumed this run.
    pub fn sync_topology(&mut self, topology: &Topology, inputs: &InputArgs) {
        let start_count = topology.start_keys().len();
        let mut fresh: IndexMap<SenderKey, ForwardCounter> = IndexMap::new();

        for key in topology.keys() {
            let sender = SenderKey::Worker(key.to_string());
            let index = self.counters.get(&sender).map(|c| c.index).unwrap_or(0);
            fresh.insert(
                sender,
                ForwardCounter {
                    count: topology.dependents_of(key),
                    index,
                },
            );
        }
        for position in 0..inputs.positional.len() {
            let sender = SenderKey::InputPositional(position);
            let index = self.counters.get(&sender).map(|c| c.index).unwrap_or(0);
            fresh.insert(
                sender,
                ForwardCounter {
                    count: start_count,
                    index,
                },
            );
        }
        for name in inputs.keyword.keys() {
            let sender = SenderKey::InputKeyword(name.clone());
            let index = self.counters.get(&sender).map(|c| c.index).unwrap_or(0);
            fresh.insert(
                sender,
                ForwardCounter {
                    count: start_count,
                    index,
                },
            );
        }
        self.counters = fresh;
    }

    /// Assemble the base (pre-signature) arguments for `key`: saved args
    /// verbatim, start binding for seeded workers, dependency binding
    /// otherwise. This is the only phase that consumes fan-out counters;
    /// its result is what a parked worker is re-dispatched with.
    pub fn base_args(
        &mut self,
        key: &str,
        topology: &Topology,
        outputs: &IndexMap<String, Value>,
        inputs: &InputArgs,
        saved: Option<Args>,
        start_trigger: bool,
    ) -> Result<Args, AutomaError> {
        if let Some(args) = saved {
            return Ok(args);
        }
        let (positional, keyword) = if start_trigger {
            self.start_binding(key, inputs)?
        } else {
            self.dependency_binding(key, topology, outputs)?
        };
        Ok(Args {
            positional,
            keyword,
        })
    }

    /// Resolve descriptors and map the base arguments onto the worker's
    /// declared signature. Safe to repeat: consumes no counter state.
    #[allow(clippy::too_many_arguments)]
    pub fn complete(
        &self,
        key: &str,
        topology: &Topology,
        outputs: &IndexMap<String, Value>,
        inputs: &InputArgs,
        automa: &GraphAutoma,
        invocation_id: &InvocationId,
        base: Args,
    ) -> Result<BoundArgs, AutomaError> {
        let slot = topology.get(key).ok_or_else(|| {
            AutomaError::Runtime(format!("cannot bind arguments: worker '{key}' does not exist"))
        })?;
        let signature = slot.signature.clone();
        let injected =
            resolve_injection(key, &signature, topology, outputs, automa, invocation_id)?;
        map_args(
            key,
            &signature,
            base.positional,
            base.keyword,
            &inputs.plain_keyword(),
            injected,
            slot.is_nested(),
        )
    }

    /// Base binding plus completion in one step.
    #[allow(clippy::too_many_arguments)]
    pub fn bind(
        &mut self,
        key: &str,
        topology: &Topology,
        outputs: &IndexMap<String, Value>,
        inputs: &InputArgs,
        saved: Option<Args>,
        automa: &GraphAutoma,
        invocation_id: &InvocationId,
        start_trigger: bool,
    ) -> Result<BoundArgs, AutomaError> {
        let base = self.base_args(key, topology, outputs, inputs, saved, start_trigger)?;
        self.complete(key, topology, outputs, inputs, automa, invocation_id, base)
    }

    /// Start binding: each positional input is its own sender, each keyword
    /// input a named sender. Distributed inputs are consumed element-wise
    /// per start worker.
    fn start_binding(
        &mut self,
        receiver: &str,
        inputs: &InputArgs,
    ) -> Result<(Vec<Value>, IndexMap<String, Value>), AutomaError> {
        let mut positional = Vec::with_capacity(inputs.positional.len());
        for (index, input) in inputs.positional.iter().enumerate() {
            positional.push(self.send_input(
                SenderKey::InputPositional(index),
                input,
                receiver,
            )?);
        }
        let mut keyword = IndexMap::new();
        for (name, input) in &inputs.keyword {
            let value = self.send_input(SenderKey::InputKeyword(name.clone()), input, receiver)?;
            keyword.insert(name.clone(), value);
        }
        Ok((positional, keyword))
    }

    fn send_input(
        &mut self,
        sender: SenderKey,
        input: &InputValue,
        receiver: &str,
    ) -> Result<Value, AutomaError> {
        match input {
            InputValue::Single(value) => Ok(value.clone()),
            InputValue::Distribute(values) => {
                self.take_in_order(&sender, values, receiver)
            }
        }
    }

    /// Dependency binding: shape each dependency's output under its sender
    /// rule, then assemble under the receiver's mapping rule.
    fn dependency_binding(
        &mut self,
        key: &str,
        topology: &Topology,
        outputs: &IndexMap<String, Value>,
    ) -> Result<(Vec<Value>, IndexMap<String, Value>), AutomaError> {
        let slot = topology.get(key).ok_or_else(|| {
            AutomaError::Runtime(format!("cannot bind arguments: worker '{key}' does not exist"))
        })?;
        let dependencies = slot.dependencies.clone();
        let receiver_rule = slot.args_mapping_rule;

        let mut received = Vec::with_capacity(dependencies.len());
        for dep in &dependencies {
            let output = outputs.get(dep).cloned().unwrap_or(Value::Null);
            let sender_rule = topology
                .get(dep)
                .map(|s| s.result_dispatching_rule)
                .unwrap_or_default();
            let value = match sender_rule {
                ResultDispatchingRule::AsIs => output,
                ResultDispatchingRule::InOrder => {
                    let elements = match output {
                        Value::Array(elements) => elements,
                        other => {
                            return Err(AutomaError::ArgsMapping {
                                worker: key.to_string(),
                                message: format!(
                                    "the output of worker '{dep}' is not a sequence and cannot \
                                     be distributed in order (got {})",
                                    value_type(&other)
                                ),
                            })
                        }
                    };
                    self.take_in_order(&SenderKey::Worker(dep.clone()), &elements, key)?
                }
            };
            received.push(value);
        }

        self.receive(key, receiver_rule, &dependencies, received)
    }

    fn take_in_order(
        &mut self,
        sender: &SenderKey,
        values: &[Value],
        receiver: &str,
    ) -> Result<Value, AutomaError> {
        let counter = self.counters.entry(sender.clone()).or_default();
        if values.len() != counter.count {
            return Err(AutomaError::ArgsMapping {
                worker: receiver.to_string(),
                message: format!(
                    "{} distributes {} value(s) but {} receiver(s) are wired to it",
                    sender.describe(),
                    values.len(),
                    counter.count
                ),
            });
        }
        let value = values.get(counter.index).cloned().ok_or_else(|| {
            AutomaError::ArgsMapping {
                worker: receiver.to_string(),
                message: format!(
                    "{} has no element left to distribute (index {})",
                    sender.describe(),
                    counter.index
                ),
            }
        })?;
        counter.index += 1;
        Ok(value)
    }

    fn receive(
        &self,
        key: &str,
        rule: ArgsMappingRule,
        dependencies: &[String],
        received: Vec<Value>,
    ) -> Result<(Vec<Value>, IndexMap<String, Value>), AutomaError> {
        match rule {
            ArgsMappingRule::AsIs => Ok((received, IndexMap::new())),
            ArgsMappingRule::Unpack => {
                if received.len() != 1 {
                    return Err(AutomaError::ArgsMapping {
                        worker: key.to_string(),
                        message: format!(
                            "the UNPACK mapping rule requires exactly one dependency, but the \
                             worker has {}: [{}]",
                            dependencies.len(),
                            dependencies.join(", ")
                        ),
                    });
                }
                let source = dependencies.first().map(String::as_str).unwrap_or("?");
                match received.into_iter().next() {
                    Some(Value::Array(elements)) => Ok((elements, IndexMap::new())),
                    Some(Value::Object(map)) => {
                        Ok((Vec::new(), map.into_iter().collect()))
                    }
                    Some(other) => Err(AutomaError::ArgsMapping {
                        worker: key.to_string(),
                        message: format!(
                            "the UNPACK mapping rule only applies to a sequence or mapping \
                             value, but received {} from worker '{source}'",
                            value_type(&other)
                        ),
                    }),
                    None => Ok((Vec::new(), IndexMap::new())),
                }
            }
            ArgsMappingRule::Merge => Ok((vec![Value::Array(received)], IndexMap::new())),
            ArgsMappingRule::Suppressed => Ok((Vec::new(), IndexMap::new())),
        }
    }
}

/// Resolve `From`/`System` parameter descriptors into bindings.
fn resolve_injection(
    key: &str,
    signature: &Signature,
    topology: &Topology,
    outputs: &IndexMap<String, Value>,
    automa: &GraphAutoma,
    invocation_id: &InvocationId,
) -> Result<IndexMap<String, Binding>, AutomaError> {
    let mut injected = IndexMap::new();
    for param in signature.params() {
        match &param.source {
            ParamSource::FromWorker { key: source, default } => {
                let value = if topology.contains(source) && outputs.contains_key(source) {
                    outputs.get(source).cloned()
                } else {
                    default.clone()
                };
                let value = value.ok_or_else(|| AutomaError::ArgsInjection {
                    worker: key.to_string(),
                    message: format!(
                        "worker '{source}' is not found in the automa or was already removed; \
                         set a default on the From parameter to allow this"
                    ),
                })?;
                injected.insert(param.name.clone(), Binding::Value(value));
            }
            ParamSource::System(tag) => {
                let binding = match tag {
                    SystemTag::Automa => Binding::Automa(automa.clone()),
                    SystemTag::SubAutoma(sub_key) => {
                        let slot = topology.get(sub_key).ok_or_else(|| {
                            AutomaError::ArgsInjection {
                                worker: key.to_string(),
                                message: format!(
                                    "the sub-automa '{sub_key}' is not found in the automa"
                                ),
                            }
                        })?;
                        let sub = slot.worker.as_automa().ok_or_else(|| {
                            AutomaError::ArgsInjection {
                                worker: key.to_string(),
                                message: format!("worker '{sub_key}' is not an automa"),
                            }
                        })?;
                        Binding::Automa(sub)
                    }
                    SystemTag::RuntimeContext => {
                        let context = RuntimeContext {
                            worker_key: key.to_string(),
                            invocation_id: invocation_id.clone(),
                        };
                        Binding::Value(serde_json::to_value(context)?)
                    }
                };
                injected.insert(param.name.clone(), binding);
            }
            ParamSource::Required | ParamSource::Default(_) => {}
        }
    }
    Ok(injected)
}

/// Map assembled positional/keyword arguments onto the declared signature.
///
/// Positional values fill the non-injected positional parameters in order;
/// keyword values fill by name, with unknown names flowing into the
/// var-keyword catch-all or dropped. Propagated automa inputs fill only
/// parameters left unbound; injected bindings win unconditionally; plain
/// defaults fill the rest. A still-unbound required parameter is an error.
#[allow(clippy::too_many_arguments)]
fn map_args(
    key: &str,
    signature: &Signature,
    positional: Vec<Value>,
    keyword: IndexMap<String, Value>,
    propagation: &IndexMap<String, Value>,
    injected: IndexMap<String, Binding>,
    propagate_all: bool,
) -> Result<BoundArgs, AutomaError> {
    let mut named: IndexMap<String, Binding> = IndexMap::new();
    let mut call_args: Vec<Value> = Vec::new();
    let mut call_kwargs: IndexMap<String, Value> = IndexMap::new();

    let positional_slots: Vec<&str> = signature
        .positional_params()
        .filter(|p| !injected.contains_key(&p.name))
        .map(|p| p.name.as_str())
        .collect();

    let mut var_positional: Vec<Value> = Vec::new();
    for (index, value) in positional.into_iter().enumerate() {
        call_args.push(value.clone());
        match positional_slots.get(index) {
            Some(name) => {
                named.insert((*name).to_string(), Binding::Value(value));
            }
            None => var_positional.push(value),
        }
    }
    if !var_positional.is_empty() && signature.var_positional_param().is_none() {
        return Err(AutomaError::ArgsMapping {
            worker: key.to_string(),
            message: format!(
                "takes {} positional argument(s) but {} were given",
                positional_slots.len(),
                positional_slots.len() + var_positional.len()
            ),
        });
    }

    let has_var_keyword = signature.var_keyword_param().is_some();
    let mut var_keyword: IndexMap<String, Value> = IndexMap::new();
    for (name, value) in keyword {
        let target = signature.get(&name);
        match target {
            Some(param) if param.kind.is_keyword() && !injected.contains_key(&name) => {
                if !named.contains_key(&name) {
                    call_kwargs.insert(name.clone(), value.clone());
                    named.insert(name, Binding::Value(value));
                }
                // already bound positionally: dropped
            }
            _ if has_var_keyword => {
                call_kwargs.insert(name.clone(), value.clone());
                var_keyword.insert(name, value);
            }
            _ => {
                tracing::debug!(worker = key, argument = %name, "dropping unmatched keyword argument");
            }
        }
    }

    for (name, value) in propagation {
        if let Some(param) = signature.get(name) {
            if param.kind.is_positional()
                && !named.contains_key(name)
                && !injected.contains_key(name)
            {
                call_kwargs.insert(name.clone(), value.clone());
                named.insert(name.clone(), Binding::Value(value.clone()));
            }
        } else if propagate_all && has_var_keyword && !var_keyword.contains_key(name) {
            call_kwargs.insert(name.clone(), value.clone());
            var_keyword.insert(name.clone(), value.clone());
        }
    }

    for (name, binding) in injected {
        call_kwargs.insert(name.clone(), binding.display_value());
        named.insert(name, binding);
    }

    for param in signature.params() {
        if !param.kind.is_positional() && !param.kind.is_keyword() {
            continue;
        }
        if named.contains_key(&param.name) {
            continue;
        }
        match &param.source {
            ParamSource::Default(default) => {
                named.insert(param.name.clone(), Binding::Value(default.clone()));
            }
            ParamSource::Required => {
                return Err(AutomaError::ArgsMapping {
                    worker: key.to_string(),
                    message: format!("missing required argument '{}'", param.name),
                });
            }
            // Injected sources were inserted above.
            ParamSource::FromWorker { .. } | ParamSource::System(_) => {}
        }
    }

    Ok(BoundArgs {
        named,
        var_positional,
        var_keyword,
        call_args,
        call_kwargs,
    })
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
#[path = "binding_tests.rs"]
mod tests;
