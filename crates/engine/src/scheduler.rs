// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run loop
//!
//! One invocation per `arun` call: seed the ready set, then repeatedly
//! drain deferred mutations, dispatch newly-ready workers (event loop or
//! blocking pool), await a completion, and reconcile. Terminates when the
//! output worker has a result, pauses into a snapshot when only human
//! interactions remain, or re-raises the first unsuppressed error after
//! letting in-flight workers settle.

use crate::automa::GraphAutoma;
use crate::binding::ArgsBinder;
use crate::callback::{CallbackContext, WorkerCallback};
use crate::pool::BlockingPool;
use crate::settings::GlobalSettings;
use crate::topology::{DeferredTask, MutationPhase, Topology};
use crate::worker::{ExecMode, WorkerContext};
use automa_core::{
    Args, AutomaError, IdGen, InputArgs, Interaction, InteractionException, InvocationId,
    UuidIdGen,
};
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Shared state of one `arun` invocation, reachable from worker contexts.
pub(crate) struct InvocationCtx {
    pub(crate) invocation_id: InvocationId,
    pub(crate) deferred: Mutex<VecDeque<DeferredTask>>,
    pub(crate) debug: bool,
    pub(crate) verbose: bool,
}

/// Why a worker entered the ready set.
#[derive(Debug, Clone)]
enum Trigger {
    /// Seeded as a start worker; binds the automa inputs.
    Start,
    /// All dependencies fulfilled; binds dependency outputs.
    Deps,
    /// Explicit arguments: a `ferry_to`, or re-dispatch of a parked worker.
    Saved(Args),
}

/// The bookkeeping of a paused invocation, retained on the automa for
/// resume and captured into snapshots.
pub(crate) struct PausedRun {
    pub(crate) topology: Topology,
    pub(crate) outputs: IndexMap<String, Value>,
    pub(crate) completed: IndexSet<String>,
    pub(crate) unfulfilled: IndexMap<String, IndexSet<String>>,
    pub(crate) parked: IndexMap<String, Args>,
    pub(crate) binder: ArgsBinder,
    pub(crate) inputs: InputArgs,
    pub(crate) deferred: VecDeque<DeferredTask>,
}

struct Completion {
    key: String,
    outcome: Result<Value, AutomaError>,
    base: Args,
    arguments: Value,
    callbacks: Vec<Arc<dyn WorkerCallback>>,
    cx: WorkerContext,
    elapsed_ms: u64,
}

struct RunLoop<'a> {
    automa: &'a GraphAutoma,
    ctx: Arc<InvocationCtx>,
    pool: BlockingPool,
    base_callbacks: Vec<Arc<dyn WorkerCallback>>,
    is_top_level: bool,

    topology: Topology,
    outputs: IndexMap<String, Value>,
    completed: IndexSet<String>,
    unfulfilled: IndexMap<String, IndexSet<String>>,
    parked: IndexMap<String, Args>,
    binder: ArgsBinder,
    inputs: InputArgs,

    ready: VecDeque<(String, Trigger)>,
    running: IndexSet<String>,
    failure: Option<AutomaError>,

    completion_tx: mpsc::UnboundedSender<Completion>,
}

/// Drive one invocation of `automa` to completion, pause or error.
pub(crate) async fn run(
    automa: &GraphAutoma,
    inputs: InputArgs,
    resume: bool,
) -> Result<Value, AutomaError> {
    let invocation_id = InvocationId::new(UuidIdGen.next_id());
    let span = tracing::info_span!(
        "arun",
        automa = %automa.name(),
        invocation = %invocation_id,
        resume,
    );

    let pool = {
        let mut pool = automa.inner.pool.lock();
        pool.get_or_insert_with(BlockingPool::default).clone()
    };

    let ctx = Arc::new(InvocationCtx {
        invocation_id,
        deferred: Mutex::new(VecDeque::new()),
        debug: automa.inner.options.debug,
        verbose: automa.inner.options.verbose,
    });

    let base_callbacks: Vec<Arc<dyn WorkerCallback>> = GlobalSettings::callback_builders()
        .iter()
        .chain(automa.inner.options.callback_builders.iter())
        .map(|builder| builder.build())
        .collect();

    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();

    let mut run_loop = if resume {
        let paused = automa.inner.paused.lock().take().ok_or_else(|| {
            AutomaError::Runtime("no paused run to resume; call arun() first".to_string())
        })?;
        let mut ready = VecDeque::new();
        let mut parked = paused.parked;
        for (key, base) in parked.drain(..) {
            ready.push_back((key, Trigger::Saved(base)));
        }
        *ctx.deferred.lock() = paused.deferred;
        RunLoop {
            automa,
            ctx: ctx.clone(),
            pool,
            base_callbacks,
            is_top_level: automa.parent().is_none(),
            topology: paused.topology,
            outputs: paused.outputs,
            completed: paused.completed,
            unfulfilled: paused.unfulfilled,
            parked: IndexMap::new(),
            binder: paused.binder,
            inputs: paused.inputs,
            ready,
            running: IndexSet::new(),
            failure: None,
            completion_tx,
        }
    } else {
        automa.inner.paused.lock().take();
        automa.inner.hub.reset();
        if !automa.inner.options.preserve_local_space {
            for space in automa.inner.local_spaces.lock().values() {
                space.clear();
            }
        }

        let topology = automa.inner.topology.lock().clone();
        topology.validate()?;

        let binder = ArgsBinder::new(&topology, &inputs);
        let unfulfilled = topology
            .slots()
            .map(|slot| {
                (
                    slot.key.clone(),
                    slot.dependencies.iter().cloned().collect::<IndexSet<_>>(),
                )
            })
            .collect();
        let ready = topology
            .start_keys()
            .into_iter()
            .map(|key| (key, Trigger::Start))
            .collect();
        RunLoop {
            automa,
            ctx: ctx.clone(),
            pool,
            base_callbacks,
            is_top_level: automa.parent().is_none(),
            topology,
            outputs: IndexMap::new(),
            completed: IndexSet::new(),
            unfulfilled,
            parked: IndexMap::new(),
            binder,
            inputs,
            ready,
            running: IndexSet::new(),
            failure: None,
            completion_tx,
        }
    };

    run_loop.drive(&mut completion_rx).instrument(span).await
}

impl RunLoop<'_> {
    async fn drive(
        &mut self,
        completion_rx: &mut mpsc::UnboundedReceiver<Completion>,
    ) -> Result<Value, AutomaError> {
        loop {
            if self.failure.is_none() {
                if let Err(err) = self.drain_deferred() {
                    self.fail(err);
                }
            }
            if self.failure.is_none() {
                self.dispatch_ready().await;
            }
            if self.failure.is_some() {
                self.ready.clear();
                self.ctx.deferred.lock().clear();
            }

            if self.running.is_empty() && self.ready.is_empty() {
                if let Some(err) = self.failure.take() {
                    return Err(err);
                }
                if self.ctx.deferred.lock().is_empty() {
                    return self.settle();
                }
                continue;
            }
            if self.running.is_empty() {
                // Ready entries remained because dispatch deferred work.
                continue;
            }

            let completion = completion_rx.recv().await.ok_or_else(|| {
                AutomaError::WorkerInfra("the completion channel closed unexpectedly".to_string())
            })?;
            self.handle_completion(completion).await;
        }
    }

    /// Natural end of the loop: either the final output, or a pause
    /// carrying every pending interaction and a snapshot.
    fn settle(&mut self) -> Result<Value, AutomaError> {
        let pending = tree_pending(self.automa, &self.topology);
        if !pending.is_empty() {
            tracing::info!(
                pending = pending.len(),
                "pausing on pending human interactions"
            );
            *self.automa.inner.paused.lock() = Some(PausedRun {
                topology: self.topology.clone(),
                outputs: std::mem::take(&mut self.outputs),
                completed: std::mem::take(&mut self.completed),
                unfulfilled: std::mem::take(&mut self.unfulfilled),
                parked: std::mem::take(&mut self.parked),
                binder: self.binder.clone(),
                inputs: self.inputs.clone(),
                deferred: std::mem::take(&mut *self.ctx.deferred.lock()),
            });
            let snapshot = self.automa.dump_to_snapshot()?;
            return Err(AutomaError::Interaction(Box::new(InteractionException::new(
                pending, snapshot,
            ))));
        }

        let result = self
            .topology
            .output_key()
            .and_then(|key| self.outputs.get(key))
            .cloned()
            .unwrap_or(Value::Null);
        *self.automa.inner.topology.lock() = self.topology.clone();
        *self.automa.inner.paused.lock() = None;
        tracing::info!(automa = %self.automa.name(), "run completed");
        Ok(result)
    }

    fn fail(&mut self, err: AutomaError) {
        tracing::error!(error = %err, "run failed; draining in-flight workers");
        self.failure = Some(err);
        self.ready.clear();
    }

    /// Apply deferred mutations in enqueue order, then re-validate the
    /// graph and refresh fan-out counters.
    fn drain_deferred(&mut self) -> Result<(), AutomaError> {
        let mut topology_changed = false;
        loop {
            let task = self.ctx.deferred.lock().pop_front();
            let Some(task) = task else { break };
            if self.ctx.debug {
                tracing::debug!(task = ?task, "applying deferred task");
            }
            match task {
                DeferredTask::AddWorker(slot) => {
                    if let Some(nested) = slot.worker.as_automa() {
                        nested.set_parent(self.automa);
                    }
                    let key = slot.key.clone();
                    let deps: IndexSet<String> = slot.dependencies.iter().cloned().collect();
                    self.topology.insert(*slot, MutationPhase::Runtime)?;
                    self.unfulfilled.insert(key, deps);
                    topology_changed = true;
                }
                DeferredTask::RemoveWorker { key } => {
                    self.topology.remove(&key, MutationPhase::Runtime)?;
                    self.outputs.shift_remove(&key);
                    self.completed.shift_remove(&key);
                    self.unfulfilled.shift_remove(&key);
                    for deps in self.unfulfilled.values_mut() {
                        deps.shift_remove(&key);
                    }
                    self.parked.shift_remove(&key);
                    self.ready.retain(|(ready_key, _)| ready_key != &key);
                    self.automa.inner.hub.remove_worker(&key);
                    self.automa.inner.local_spaces.lock().shift_remove(&key);
                    topology_changed = true;
                }
                DeferredTask::AddDependency { key, dependency } => {
                    self.topology
                        .add_dependency(&key, &dependency, MutationPhase::Runtime)?;
                    self.unfulfilled
                        .entry(key)
                        .or_default()
                        .insert(dependency);
                    topology_changed = true;
                }
                DeferredTask::SetOutputWorker { key } => {
                    self.topology.set_output(&key, MutationPhase::Runtime)?;
                }
                DeferredTask::Ferry { key, args } => {
                    if !self.topology.contains(&key) {
                        return Err(AutomaError::Runtime(format!(
                            "the worker ferried to does not exist: '{key}'"
                        )));
                    }
                    if self.running.contains(&key)
                        || self.ready.iter().any(|(ready_key, _)| ready_key == &key)
                    {
                        return Err(AutomaError::Runtime(format!(
                            "a worker should not be scheduled again while it is already \
                             running: '{key}'"
                        )));
                    }
                    self.ready.push_back((key, Trigger::Saved(args)));
                }
            }
        }
        if topology_changed {
            self.topology.validate()?;
            self.binder.sync_topology(&self.topology, &self.inputs);
        }
        Ok(())
    }

    /// Bind and launch every ready worker.
    async fn dispatch_ready(&mut self) {
        while let Some((key, trigger)) = self.ready.pop_front() {
            if let Err(err) = self.dispatch(key, trigger).await {
                self.fail(err);
                return;
            }
        }
    }

    async fn dispatch(&mut self, key: String, trigger: Trigger) -> Result<(), AutomaError> {
        let Some(slot) = self.topology.get(&key).cloned() else {
            tracing::debug!(worker = %key, "skipping dispatch: worker was removed");
            return Ok(());
        };
        if self.running.contains(&key) {
            return Err(AutomaError::Runtime(format!(
                "a worker should not be scheduled again while it is already running: '{key}'"
            )));
        }

        let (saved, start_trigger) = match trigger {
            Trigger::Start => (None, true),
            Trigger::Deps => (None, false),
            Trigger::Saved(args) => (Some(args), false),
        };
        let base = self.binder.base_args(
            &key,
            &self.topology,
            &self.outputs,
            &self.inputs,
            saved,
            start_trigger,
        )?;
        let bound = self.binder.complete(
            &key,
            &self.topology,
            &self.outputs,
            &self.inputs,
            self.automa,
            &self.ctx.invocation_id,
            base.clone(),
        )?;
        let arguments = bound.arguments_json();

        let callbacks: Vec<Arc<dyn WorkerCallback>> = self
            .base_callbacks
            .iter()
            .cloned()
            .chain(slot.callback_builders.iter().map(|builder| builder.build()))
            .collect();

        let cx = WorkerContext {
            automa: self.automa.clone(),
            invocation: self.ctx.clone(),
            worker_key: key.clone(),
            interaction_cursor: Arc::new(AtomicUsize::new(0)),
        };

        for callback in &callbacks {
            let context = CallbackContext {
                worker: &cx,
                is_top_level: self.is_top_level,
                arguments: &arguments,
            };
            match callback.on_worker_start(context).await {
                Ok(()) => {}
                Err(err) if err.is_pause() => {
                    tracing::info!(worker = %key, "parked before dispatch by a start callback");
                    self.parked.insert(key, base);
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }

        if self.ctx.verbose {
            tracing::info!(worker = %key, arguments = %arguments, "dispatching");
        } else {
            tracing::debug!(worker = %key, mode = ?slot.worker.mode(), "dispatching");
        }
        self.running.insert(key.clone());

        let worker = slot.worker.clone();
        let pool = self.pool.clone();
        let tx = self.completion_tx.clone();
        let task_cx = cx.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let outcome = match worker.mode() {
                ExecMode::EventLoop => worker.arun(bound, task_cx.clone()).await,
                ExecMode::Blocking => {
                    let blocking_cx = task_cx.clone();
                    match pool.run(move || worker.run(bound, blocking_cx)).await {
                        Ok(result) => result,
                        Err(err) => Err(err),
                    }
                }
            };
            let _ = tx.send(Completion {
                key,
                outcome,
                base,
                arguments,
                callbacks,
                cx: task_cx,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        });
        Ok(())
    }

    async fn handle_completion(&mut self, completion: Completion) {
        let Completion {
            key,
            outcome,
            base,
            arguments,
            callbacks,
            cx,
            elapsed_ms,
        } = completion;
        self.running.shift_remove(&key);

        if self.failure.is_some() {
            tracing::debug!(worker = %key, "discarding result: run is failing");
            return;
        }

        match outcome {
            Ok(value) => {
                if self.ctx.verbose {
                    tracing::info!(worker = %key, elapsed_ms, result = %value, "worker completed");
                } else {
                    tracing::debug!(worker = %key, elapsed_ms, "worker completed");
                }
                for callback in &callbacks {
                    let context = CallbackContext {
                        worker: &cx,
                        is_top_level: self.is_top_level,
                        arguments: &arguments,
                    };
                    if let Err(err) = callback.on_worker_end(context, &value).await {
                        self.fail(err);
                        return;
                    }
                }
                if let Err(err) = self.reconcile_success(&key, value) {
                    self.fail(err);
                }
            }
            Err(err) if err.is_pause() => {
                tracing::info!(worker = %key, elapsed_ms, "worker awaiting human feedback");
                self.parked.insert(key, base);
            }
            Err(AutomaError::Interaction(_)) => {
                // A nested automa paused; its interactions surface through
                // the hub tree when this invocation settles.
                tracing::info!(worker = %key, elapsed_ms, "nested automa awaiting human feedback");
                self.parked.insert(key, base);
            }
            Err(err) => {
                let mut suppressed = false;
                for callback in &callbacks {
                    if !callback.error_matcher().matches(&err) {
                        continue;
                    }
                    let context = CallbackContext {
                        worker: &cx,
                        is_top_level: self.is_top_level,
                        arguments: &arguments,
                    };
                    if callback.on_worker_error(context, &err).await {
                        suppressed = true;
                    }
                }
                if suppressed {
                    tracing::warn!(worker = %key, error = %err, "error suppressed by callback");
                    if let Err(err) = self.reconcile_success(&key, Value::Null) {
                        self.fail(err);
                    }
                } else {
                    tracing::error!(worker = %key, elapsed_ms, error = %err, "worker failed");
                    self.fail(err);
                }
            }
        }
    }

    /// Post-body reconciliation: apply the worker's deferred mutations,
    /// record its output, wake its successors, refill its dependency set.
    fn reconcile_success(&mut self, key: &str, value: Value) -> Result<(), AutomaError> {
        self.drain_deferred()?;

        if !self.topology.contains(key) {
            // The worker removed itself (or was removed); its output and
            // successors are gone with it.
            return Ok(());
        }
        self.outputs.insert(key.to_string(), value);
        self.completed.insert(key.to_string());

        for successor in self.topology.successors_of(key) {
            let Some(deps) = self.unfulfilled.get_mut(&successor) else {
                continue;
            };
            deps.shift_remove(key);
            if deps.is_empty()
                && !self.running.contains(&successor)
                && !self.parked.contains_key(&successor)
                && !self
                    .ready
                    .iter()
                    .any(|(ready_key, _)| ready_key == &successor)
            {
                self.ready.push_back((successor, Trigger::Deps));
            }
        }

        // Refill so ferry-driven control flow can run the worker again.
        if let Some(slot) = self.topology.get(key) {
            let deps: IndexSet<String> = slot.dependencies.iter().cloned().collect();
            self.unfulfilled.insert(key.to_string(), deps);
        }
        Ok(())
    }
}

/// Every pending interaction in the automa tree, in slot order, nested
/// automas flattened in place.
pub(crate) fn tree_pending(automa: &GraphAutoma, topology: &Topology) -> Vec<Interaction> {
    let mut pending = Vec::new();
    for slot in topology.slots() {
        pending.extend(automa.inner.hub.pending_for(&slot.key));
        if let Some(nested) = slot.worker.as_automa() {
            let nested_topology = {
                let paused = nested.inner.paused.lock();
                match paused.as_ref() {
                    Some(paused_run) => paused_run.topology.clone(),
                    None => nested.inner.topology.lock().clone(),
                }
            };
            pending.extend(tree_pending(&nested, &nested_topology));
        }
    }
    pending
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
