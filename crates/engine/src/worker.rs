// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker contract and function adapters

use crate::automa::GraphAutoma;
use crate::binding::BoundArgs;
use crate::scheduler::InvocationCtx;
use crate::slot::WorkerOptions;
use crate::topology::DeferredTask;
use async_trait::async_trait;
use automa_core::{
    Args, AutomaError, Event, Feedback, InteractionFeedback, InvocationId, LocalSpace, Signature,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Where a worker body executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Cooperatively on the invocation's event loop (`arun`).
    EventLoop,
    /// On the shared blocking pool (`run`).
    Blocking,
}

/// A unit of computation inside an automa.
///
/// Implement exactly one of the two bodies and report the matching
/// [`ExecMode`]: `arun` for cooperative bodies scheduled on the event loop,
/// `run` for bodies offloaded to the shared blocking pool. The blocking
/// `request_feedback` is only legal from `run`; the async variant only from
/// `arun`.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// The declared parameter schema used by the arg-binding engine.
    fn signature(&self) -> Signature {
        Signature::new()
    }

    fn mode(&self) -> ExecMode {
        ExecMode::EventLoop
    }

    /// Downcast hook for nested automas.
    fn as_automa(&self) -> Option<GraphAutoma> {
        None
    }

    /// Cooperative body.
    async fn arun(&self, _args: BoundArgs, _cx: WorkerContext) -> Result<Value, AutomaError> {
        Err(AutomaError::WorkerInfra(
            "arun() is not implemented; implement it or declare ExecMode::Blocking".to_string(),
        ))
    }

    /// Blocking body, dispatched to the shared pool.
    fn run(&self, _args: BoundArgs, _cx: WorkerContext) -> Result<Value, AutomaError> {
        Err(AutomaError::WorkerInfra(
            "run() is not implemented; implement it or use the default ExecMode::EventLoop"
                .to_string(),
        ))
    }
}

/// Opaque record identifying the current invocation and worker, used to
/// scope local-space access. Injectable via `System("runtime_context")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeContext {
    pub worker_key: String,
    pub invocation_id: InvocationId,
}

/// Handle given to a worker body for the duration of one activation.
///
/// Everything a body may do besides computing its value goes through here:
/// deferred topology mutation, explicit dispatch (`ferry_to`), events,
/// feedback requests and human-in-the-loop pauses.
#[derive(Clone)]
pub struct WorkerContext {
    pub(crate) automa: GraphAutoma,
    pub(crate) invocation: Arc<InvocationCtx>,
    pub(crate) worker_key: String,
    pub(crate) interaction_cursor: Arc<AtomicUsize>,
}

impl WorkerContext {
    /// The automa this worker runs in.
    pub fn automa(&self) -> &GraphAutoma {
        &self.automa
    }

    pub fn worker_key(&self) -> &str {
        &self.worker_key
    }

    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation.invocation_id
    }

    pub fn runtime_context(&self) -> RuntimeContext {
        RuntimeContext {
            worker_key: self.worker_key.clone(),
            invocation_id: self.invocation.invocation_id.clone(),
        }
    }

    /// This worker's persistent local space.
    pub fn local_space(&self) -> LocalSpace {
        self.automa.local_space_for(&self.worker_key)
    }

    /// Schedule a worker for the next dynamic step, bypassing its
    /// dependencies and passing the given arguments.
    pub fn ferry_to(&self, key: impl Into<String>, args: Args) {
        self.defer(DeferredTask::Ferry {
            key: key.into(),
            args,
        });
    }

    /// Add a worker to the graph at the next dynamic step.
    pub fn add_worker(
        &self,
        key: impl Into<String>,
        worker: impl Worker,
        options: WorkerOptions,
    ) -> Result<(), AutomaError> {
        self.add_arc_worker(key, Arc::new(worker), options)
    }

    /// Add a blocking function worker at the next dynamic step.
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

    /// Add a cooperative function worker at the next dynamic step.
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
        let slot = crate::slot::WorkerSlot::new(key, worker, options)?;
        self.defer(DeferredTask::AddWorker(Box::new(slot)));
        Ok(())
    }

    /// Remove a worker (and every dependency edge touching it) at the next
    /// dynamic step.
    pub fn remove_worker(&self, key: impl Into<String>) {
        self.defer(DeferredTask::RemoveWorker { key: key.into() });
    }

    /// Add a dependency edge at the next dynamic step.
    pub fn add_dependency(&self, key: impl Into<String>, dependency: impl Into<String>) {
        self.defer(DeferredTask::AddDependency {
            key: key.into(),
            dependency: dependency.into(),
        });
    }

    /// Designate the output worker at the next dynamic step.
    pub fn set_output_worker(&self, key: impl Into<String>) {
        self.defer(DeferredTask::SetOutputWorker { key: key.into() });
    }

    fn defer(&self, task: DeferredTask) {
        self.invocation.deferred.lock().push_back(task);
    }

    /// Post an out-of-band event towards the application layer.
    pub fn post_event(&self, event: Event) {
        self.automa.post_event(event);
    }

    /// Request feedback from the application layer; awaits the reply on the
    /// event loop. Only legal from `arun` bodies.
    pub async fn request_feedback_async(
        &self,
        event: Event,
        timeout: Option<Duration>,
    ) -> Result<Feedback, AutomaError> {
        self.automa.request_feedback_async(event, timeout).await
    }

    /// Request feedback from the application layer, blocking the calling
    /// pool thread. Only legal from `run` bodies.
    pub fn request_feedback(
        &self,
        event: Event,
        timeout: Option<Duration>,
    ) -> Result<Feedback, AutomaError> {
        self.automa.request_feedback(event, timeout)
    }

    /// Structured human-in-the-loop pause.
    ///
    /// Returns the recorded feedback when this site has been answered by a
    /// previous resume; otherwise registers a pending interaction and
    /// returns the pause sentinel, which the body must propagate with `?`.
    pub fn interact_with_human(&self, event: Event) -> Result<InteractionFeedback, AutomaError> {
        let site_index = self.interaction_cursor.fetch_add(1, Ordering::SeqCst);
        self.automa
            .record_or_replay_interaction(&self.worker_key, site_index, event)
    }
}

type SyncBody = dyn Fn(BoundArgs, WorkerContext) -> Result<Value, AutomaError> + Send + Sync;

/// Adapter turning a blocking closure into a pool worker.
pub struct FnWorker {
    signature: Signature,
    body: Arc<SyncBody>,
}

impl FnWorker {
    pub fn new<F>(signature: Signature, body: F) -> Self
    where
        F: Fn(BoundArgs, WorkerContext) -> Result<Value, AutomaError> + Send + Sync + 'static,
    {
        Self {
            signature,
            body: Arc::new(body),
        }
    }
}

#[async_trait]
impl Worker for FnWorker {
    fn signature(&self) -> Signature {
        self.signature.clone()
    }

    fn mode(&self) -> ExecMode {
        ExecMode::Blocking
    }

    fn run(&self, args: BoundArgs, cx: WorkerContext) -> Result<Value, AutomaError> {
        (self.body)(args, cx)
    }
}

type TaskFuture = Pin<Box<dyn Future<Output = Result<Value, AutomaError>> + Send>>;
type AsyncBody = dyn Fn(BoundArgs, WorkerContext) -> TaskFuture + Send + Sync;

/// Adapter turning an async closure into an event-loop worker.
pub struct AsyncFnWorker {
    signature: Signature,
    body: Arc<AsyncBody>,
}

impl AsyncFnWorker {
    pub fn new<F, Fut>(signature: Signature, body: F) -> Self
    where
        F: Fn(BoundArgs, WorkerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, AutomaError>> + Send + 'static,
    {
        Self {
            signature,
            body: Arc::new(move |args, cx| Box::pin(body(args, cx)) as TaskFuture),
        }
    }
}

#[async_trait]
impl Worker for AsyncFnWorker {
    fn signature(&self) -> Signature {
        self.signature.clone()
    }

    async fn arun(&self, args: BoundArgs, cx: WorkerContext) -> Result<Value, AutomaError> {
        (self.body)(args, cx).await
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
