// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GraphAutoma`: the public face of the execution engine
//!
//! A `GraphAutoma` is a cloneable handle to a DAG of workers. It is itself
//! a [`Worker`], so automas nest: adding one as a worker of another runs it
//! as a sub-invocation sharing the top-level blocking pool.

use crate::binding::BoundArgs;
use crate::events::{EventHandler, FeedbackSender, HandlerRegistry};
use crate::interaction::InteractionHub;
use crate::pool::BlockingPool;
use crate::scheduler::{self, PausedRun};
use crate::settings::RunningOptions;
use crate::slot::{WorkerOptions, WorkerSlot};
use crate::snapshot::{
    capture_deferred, rebuild_deferred, rebuild_unfulfilled, reshape_topology, AutomaState,
    RunStateDump, SlotState,
};
use crate::topology::{MutationPhase, Topology};
use crate::worker::{AsyncFnWorker, ExecMode, FnWorker, Worker, WorkerContext};
use async_trait::async_trait;
use automa_core::{
    AutomaError, AutomaId, Event, Feedback, IdGen, InputArgs, InteractionFeedback, LocalSpace,
    Signature, Snapshot, UuidIdGen,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

pub(crate) struct AutomaInner {
    pub(crate) name: String,
    pub(crate) automa_id: Mutex<AutomaId>,
    pub(crate) options: RunningOptions,
    pub(crate) topology: Mutex<Topology>,
    pub(crate) handlers: Mutex<HandlerRegistry>,
    pub(crate) local_spaces: Mutex<IndexMap<String, LocalSpace>>,
    pub(crate) hub: InteractionHub,
    pub(crate) parent: Mutex<Weak<AutomaInner>>,
    pub(crate) pool: Mutex<Option<BlockingPool>>,
    pub(crate) paused: Mutex<Option<PausedRun>>,
}

/// An executable DAG of workers; composable as a worker itself.
#[derive(Clone)]
pub struct GraphAutoma {
    pub(crate) inner: Arc<AutomaInner>,
}

impl GraphAutoma {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, RunningOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: RunningOptions) -> Self {
        let id_gen: Arc<dyn IdGen> = Arc::new(UuidIdGen);
        Self {
            inner: Arc::new(AutomaInner {
                name: name.into(),
                automa_id: Mutex::new(AutomaId::new(id_gen.next_id())),
                options,
                topology: Mutex::new(Topology::new()),
                handlers: Mutex::new(HandlerRegistry::default()),
                local_spaces: Mutex::new(IndexMap::new()),
                hub: InteractionHub::new(id_gen),
                parent: Mutex::new(Weak::new()),
                pool: Mutex::new(None),
                paused: Mutex::new(None),
            }),
        }
    }

    /// Attach an explicit blocking pool. Without one, the top-level automa
    /// creates a default-capacity pool on its first run.
    pub fn with_pool(self, pool: BlockingPool) -> Self {
        *self.inner.pool.lock() = Some(pool);
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn automa_id(&self) -> AutomaId {
        self.inner.automa_id.lock().clone()
    }

    /// The automa this one is nested in, if any.
    pub fn parent(&self) -> Option<GraphAutoma> {
        self.inner
            .parent
            .lock()
            .upgrade()
            .map(|inner| GraphAutoma { inner })
    }

    pub(crate) fn set_parent(&self, parent: &GraphAutoma) {
        *self.inner.parent.lock() = Arc::downgrade(&parent.inner);
    }

    // ------------------------------------------------------------------
    // Declaration API. Mutations issued from inside a running worker go
    // through its WorkerContext instead and are drained between steps.
    // ------------------------------------------------------------------

    /// Register a worker object.
    pub fn add_worker(
        &self,
        key: impl Into<String>,
        worker: impl Worker,
        options: WorkerOptions,
    ) -> Result<(), AutomaError> {
        self.add_arc_worker(key, Arc::new(worker), options)
    }

    /// Register a blocking function as a worker.
    pub fn add_fn_worker<F>(
        &self,
        key: impl Into<String>,
        signature: Signature,
        body: F,
        options: WorkerOptions,
    ) -> Result<(), AutomaError>
    where
        F: Fn(BoundArgs, WorkerContext) -> Result<Value, AutomaError> + Send + Sync + 'static,
    {
        self.add_arc_worker(key, Arc::new(FnWorker::new(signature, body)), options)
    }

    /// Register an async function as a worker.
    pub fn add_async_fn_worker<F, Fut>(
        &self,
        key: impl Into<String>,
        signature: Signature,
        body: F,
        options: WorkerOptions,
    ) -> Result<(), AutomaError>
    where
        F: Fn(BoundArgs, WorkerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, AutomaError>> + Send + 'static,
    {
        self.add_arc_worker(key, Arc::new(AsyncFnWorker::new(signature, body)), options)
    }

    fn add_arc_worker(
        &self,
        key: impl Into<String>,
        worker: Arc<dyn Worker>,
        options: WorkerOptions,
    ) -> Result<(), AutomaError> {
        if let Some(nested) = worker.as_automa() {
            nested.set_parent(self);
        }
        let slot = WorkerSlot::new(key, worker, options)?;
        self.inner
            .topology
            .lock()
            .insert(slot, MutationPhase::Declaration)
    }

    /// Remove a worker and every dependency edge touching it.
    pub fn remove_worker(&self, key: &str) -> Result<(), AutomaError> {
        self.inner
            .topology
            .lock()
            .remove(key, MutationPhase::Declaration)?;
        self.inner.hub.remove_worker(key);
        self.inner.local_spaces.lock().shift_remove(key);
        Ok(())
    }

    /// Add a dependency edge between two registered workers.
    pub fn add_dependency(&self, key: &str, dependency: &str) -> Result<(), AutomaError> {
        self.inner
            .topology
            .lock()
            .add_dependency(key, dependency, MutationPhase::Declaration)
    }

    /// Designate the output worker, clearing the previous designation.
    pub fn set_output_worker(&self, key: &str) -> Result<(), AutomaError> {
        self.inner
            .topology
            .lock()
            .set_output(key, MutationPhase::Declaration)
    }

    /// Registered worker keys, in registration order.
    pub fn all_workers(&self) -> Vec<String> {
        if let Some(paused) = self.inner.paused.lock().as_ref() {
            return paused.topology.keys().map(str::to_string).collect();
        }
        self.inner
            .topology
            .lock()
            .keys()
            .map(str::to_string)
            .collect()
    }

    /// The output buffer of a worker from the current (or last) run.
    pub fn worker_output(&self, key: &str) -> Option<Value> {
        self.inner
            .paused
            .lock()
            .as_ref()
            .and_then(|paused| paused.outputs.get(key).cloned())
    }

    // ------------------------------------------------------------------
    // Events and feedback
    // ------------------------------------------------------------------

    /// Register an observer for an event type, or the default observer
    /// when `event_type` is `None`.
    pub fn register_event_handler(
        &self,
        event_type: Option<&str>,
        handler: impl Fn(Event) + Send + Sync + 'static,
    ) {
        self.inner
            .handlers
            .lock()
            .register(event_type, EventHandler::notify(handler));
    }

    /// Register a handler that may answer through a [`FeedbackSender`].
    pub fn register_feedback_handler(
        &self,
        event_type: Option<&str>,
        handler: impl Fn(Event, FeedbackSender) + Send + Sync + 'static,
    ) {
        self.inner
            .handlers
            .lock()
            .register(event_type, EventHandler::with_reply(handler));
    }

    fn find_handler(&self, event_type: Option<&str>) -> Option<EventHandler> {
        let mut current = Some(self.clone());
        while let Some(automa) = current {
            let handler = automa.inner.handlers.lock().lookup(event_type).cloned();
            if handler.is_some() {
                return handler;
            }
            current = automa.parent();
        }
        None
    }

    /// Post an event up the automa chain. The nearest automa with a
    /// matching handler consumes it; unhandled events are dropped.
    pub fn post_event(&self, event: Event) {
        match self.find_handler(event.event_type.as_deref()) {
            Some(handler) => handler.dispatch(event, None),
            None => {
                tracing::debug!(event_type = ?event.event_type, "event dropped: no handler registered");
            }
        }
    }

    fn reply_handler(&self, event: &Event) -> Result<EventHandler, AutomaError> {
        let handler = self
            .find_handler(event.event_type.as_deref())
            .ok_or_else(|| {
                AutomaError::Runtime(format!(
                    "no event handler registered for event type {:?}",
                    event.event_type
                ))
            })?;
        if !handler.accepts_reply() {
            return Err(AutomaError::Runtime(format!(
                "the event handler for event type {:?} does not accept a feedback sender",
                event.event_type
            )));
        }
        Ok(handler)
    }

    /// Request feedback from the application layer, awaiting the reply on
    /// the event loop.
    pub async fn request_feedback_async(
        &self,
        event: Event,
        timeout: Option<Duration>,
    ) -> Result<Feedback, AutomaError> {
        let handler = self.reply_handler(&event)?;
        let (sender, receiver) = FeedbackSender::oneshot();
        handler.dispatch(event, Some(sender));
        let dropped =
            || AutomaError::WorkerInfra("the feedback sender was dropped without a reply".into());
        match timeout {
            Some(duration) => tokio::time::timeout(duration, receiver)
                .await
                .map_err(|_| AutomaError::FeedbackTimeout {
                    timeout_ms: duration.as_millis() as u64,
                })?
                .map_err(|_| dropped()),
            None => receiver.await.map_err(|_| dropped()),
        }
    }

    /// Request feedback from the application layer, blocking the calling
    /// pool thread until the reply or the timeout.
    pub fn request_feedback(
        &self,
        event: Event,
        timeout: Option<Duration>,
    ) -> Result<Feedback, AutomaError> {
        let handler = self.reply_handler(&event)?;
        let (sender, receiver) = FeedbackSender::channel();
        handler.dispatch(event, Some(sender));
        let dropped =
            || AutomaError::WorkerInfra("the feedback sender was dropped without a reply".into());
        match timeout {
            Some(duration) => receiver.recv_timeout(duration).map_err(|err| match err {
                std::sync::mpsc::RecvTimeoutError::Timeout => AutomaError::FeedbackTimeout {
                    timeout_ms: duration.as_millis() as u64,
                },
                std::sync::mpsc::RecvTimeoutError::Disconnected => dropped(),
            }),
            None => receiver.recv().map_err(|_| dropped()),
        }
    }

    pub(crate) fn record_or_replay_interaction(
        &self,
        worker_key: &str,
        site_index: usize,
        event: Event,
    ) -> Result<InteractionFeedback, AutomaError> {
        self.inner
            .hub
            .record_or_replay(&self.automa_id(), worker_key, site_index, event)
    }

    /// Deliver one interaction feedback into this automa or any nested one.
    pub(crate) fn deliver_feedback(&self, feedback: &InteractionFeedback) -> bool {
        if self.inner.hub.deliver(feedback) {
            return true;
        }
        for child in self.nested_automas() {
            if child.deliver_feedback(feedback) {
                return true;
            }
        }
        false
    }

    fn nested_automas(&self) -> Vec<GraphAutoma> {
        let collect = |topology: &Topology| {
            topology
                .slots()
                .filter_map(|slot| slot.worker.as_automa())
                .collect::<Vec<_>>()
        };
        if let Some(paused) = self.inner.paused.lock().as_ref() {
            return collect(&paused.topology);
        }
        collect(&self.inner.topology.lock())
    }

    // ------------------------------------------------------------------
    // Local spaces
    // ------------------------------------------------------------------

    /// The local space of a worker, addressed by runtime context.
    pub fn local_space(&self, context: &crate::worker::RuntimeContext) -> LocalSpace {
        self.local_space_for(&context.worker_key)
    }

    pub(crate) fn local_space_for(&self, worker_key: &str) -> LocalSpace {
        self.inner
            .local_spaces
            .lock()
            .entry(worker_key.to_string())
            .or_default()
            .clone()
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Drive the graph to completion with the given inputs.
    ///
    /// Returns the output worker's result, or `null` when no output worker
    /// is designated (or it was removed). Raises
    /// [`AutomaError::Interaction`] when the run pauses on pending human
    /// interactions; resume with [`GraphAutoma::resume`].
    pub async fn arun(&self, inputs: InputArgs) -> Result<Value, AutomaError> {
        scheduler::run(self, inputs, false).await
    }

    /// Resume a paused run, delivering interaction feedbacks by ID.
    pub async fn resume(
        &self,
        feedbacks: Vec<InteractionFeedback>,
    ) -> Result<Value, AutomaError> {
        for feedback in &feedbacks {
            if !self.deliver_feedback(feedback) {
                return Err(AutomaError::Runtime(format!(
                    "no pending interaction matches feedback id '{}'",
                    feedback.interaction_id
                )));
            }
        }
        scheduler::run(self, InputArgs::default(), true).await
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Serialize the full automa tree into a snapshot.
    pub fn dump_to_snapshot(&self) -> Result<Snapshot, AutomaError> {
        let state = self.dump_state()?;
        let bytes = serde_json::to_vec(&state)?;
        Ok(Snapshot::new(bytes))
    }

    /// Restore the full automa tree from a snapshot. The declared graph
    /// must carry a body for every worker the snapshot references.
    pub fn load_snapshot(&self, snapshot: &Snapshot) -> Result<(), AutomaError> {
        snapshot.check_version()?;
        let state: AutomaState = serde_json::from_slice(&snapshot.serialized_bytes)?;
        self.load_state(state)
    }

    /// The tree state as a JSON value, for callers that persist structured
    /// state themselves instead of opaque snapshot bytes.
    pub fn dump_to_value(&self) -> Result<Value, AutomaError> {
        Ok(serde_json::to_value(self.dump_state()?)?)
    }

    /// Restore the tree state from a value produced by
    /// [`GraphAutoma::dump_to_value`].
    pub fn load_from_value(&self, value: Value) -> Result<(), AutomaError> {
        let state: AutomaState = serde_json::from_value(value)?;
        self.load_state(state)
    }

    pub(crate) fn dump_state(&self) -> Result<AutomaState, AutomaError> {
        let paused = self.inner.paused.lock();
        let topology = match paused.as_ref() {
            Some(paused_run) => paused_run.topology.clone(),
            None => self.inner.topology.lock().clone(),
        };

        let run = match paused.as_ref() {
            Some(paused_run) => Some(RunStateDump {
                outputs: paused_run.outputs.clone(),
                completed: paused_run.completed.iter().cloned().collect(),
                unfulfilled: crate::snapshot::capture_unfulfilled(&paused_run.unfulfilled),
                parked: paused_run.parked.clone(),
                binder: paused_run.binder.clone(),
                inputs: paused_run.inputs.clone(),
                deferred: capture_deferred(&paused_run.deferred)?,
            }),
            None => None,
        };
        drop(paused);

        let (pending, answered) = self.inner.hub.dump();
        let local_spaces = self
            .inner
            .local_spaces
            .lock()
            .iter()
            .map(|(key, space)| (key.clone(), space.to_map()))
            .collect();

        let mut children = IndexMap::new();
        for slot in topology.slots() {
            if let Some(nested) = slot.worker.as_automa() {
                children.insert(slot.key.clone(), nested.dump_state()?);
            }
        }

        Ok(AutomaState {
            name: self.inner.name.clone(),
            automa_id: self.automa_id(),
            slots: topology.slots().map(SlotState::capture).collect(),
            local_spaces,
            pending,
            answered,
            run,
            children,
        })
    }

    pub(crate) fn load_state(&self, state: AutomaState) -> Result<(), AutomaError> {
        let reshaped = {
            let current = self.inner.topology.lock();
            reshape_topology(&current, &state.slots)?
        };

        for (key, child_state) in state.children {
            let nested = reshaped
                .get(&key)
                .and_then(|slot| slot.worker.as_automa())
                .ok_or_else(|| {
                    AutomaError::Serialization(format!(
                        "snapshot holds nested state for '{key}' but the registered worker is \
                         not an automa"
                    ))
                })?;
            nested.set_parent(self);
            nested.load_state(child_state)?;
        }

        *self.inner.automa_id.lock() = state.automa_id;
        self.inner.hub.restore(state.pending, state.answered);

        {
            let mut spaces = self.inner.local_spaces.lock();
            spaces.clear();
            for (key, map) in state.local_spaces {
                let space = LocalSpace::new();
                space.replace(map);
                spaces.insert(key, space);
            }
        }

        *self.inner.paused.lock() = match state.run {
            Some(run) => Some(PausedRun {
                topology: reshaped.clone(),
                outputs: run.outputs,
                completed: run.completed.into_iter().collect(),
                unfulfilled: rebuild_unfulfilled(run.unfulfilled),
                parked: run.parked,
                binder: run.binder,
                inputs: run.inputs,
                deferred: rebuild_deferred(run.deferred),
            }),
            None => None,
        };
        *self.inner.topology.lock() = reshaped;
        Ok(())
    }
}

#[async_trait]
impl Worker for GraphAutoma {
    fn signature(&self) -> Signature {
        Signature::pass_through()
    }

    fn mode(&self) -> ExecMode {
        ExecMode::EventLoop
    }

    fn as_automa(&self) -> Option<GraphAutoma> {
        Some(self.clone())
    }

    async fn arun(&self, args: BoundArgs, cx: WorkerContext) -> Result<Value, AutomaError> {
        // Inherit the pool from the enclosing automa.
        {
            let parent_pool = cx.automa().inner.pool.lock().clone();
            let mut pool = self.inner.pool.lock();
            if pool.is_none() {
                *pool = parent_pool;
            }
        }
        let resume = self.inner.paused.lock().is_some();
        if resume {
            scheduler::run(self, InputArgs::default(), true).await
        } else {
            scheduler::run(self, args.into_args().into(), false).await
        }
    }
}

impl std::fmt::Debug for GraphAutoma {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphAutoma")
            .field("name", &self.inner.name)
            .field("workers", &self.all_workers())
            .finish()
    }
}

#[cfg(test)]
#[path = "automa_tests.rs"]
mod tests;
