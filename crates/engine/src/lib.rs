// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! automa-engine: the GraphAutoma execution engine
//!
//! A `GraphAutoma` drives a DAG of workers to completion: dependency
//! resolution, concurrent dispatch on an event loop plus a shared blocking
//! pool, dynamic topology mutation between steps, argument binding under
//! sender/receiver rules, lifecycle callbacks, cooperative human-in-the-loop
//! pauses and deterministic snapshot/restore.

pub mod automa;
pub mod binding;
pub mod callback;
pub mod events;
pub mod interaction;
pub mod pool;
pub mod scheduler;
pub mod settings;
pub mod slot;
pub mod snapshot;
pub mod topology;
pub mod worker;

pub use automa::GraphAutoma;
pub use binding::{Binding, BoundArgs};
pub use callback::{CallbackBuilder, CallbackContext, ErrorMatcher, WorkerCallback};
pub use events::FeedbackSender;
pub use pool::{BlockingPool, DEFAULT_POOL_CAPACITY};
pub use settings::{GlobalSettings, RunningOptions};
pub use slot::{WorkerOptions, WorkerSlot};
pub use worker::{AsyncFnWorker, ExecMode, FnWorker, RuntimeContext, Worker, WorkerContext};

pub use automa_core::{
    Args, ArgsMappingRule, AutomaError, Event, Feedback, InputArgs, InputValue, Interaction,
    InteractionException, InteractionFeedback, ResultDispatchingRule, Signature, Snapshot,
    SystemTag,
};
