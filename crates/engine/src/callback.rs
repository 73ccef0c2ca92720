// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle callbacks
//!
//! Three scopes compose around each worker invocation: process-wide
//! settings, per-automa running options, per-worker slot. Builders are
//! instantiated fresh for every `arun` so concurrent invocations never
//! share callback state.

use crate::automa::GraphAutoma;
use crate::worker::WorkerContext;
use async_trait::async_trait;
use automa_core::AutomaError;
use serde_json::Value;
use std::sync::Arc;

/// Context handed to every callback hook.
pub struct CallbackContext<'a> {
    pub(crate) worker: &'a WorkerContext,
    pub(crate) is_top_level: bool,
    pub(crate) arguments: &'a Value,
}

impl CallbackContext<'_> {
    /// Key of the worker being invoked.
    pub fn worker_key(&self) -> &str {
        self.worker.worker_key()
    }

    /// Whether the owning automa is the top of the tree.
    pub fn is_top_level(&self) -> bool {
        self.is_top_level
    }

    /// The automa owning the worker.
    pub fn parent(&self) -> &GraphAutoma {
        self.worker.automa()
    }

    /// The effective call arguments as `{"args": [...], "kwargs": {...}}`.
    pub fn arguments(&self) -> &Value {
        self.arguments
    }

    /// The worker context, for posting events or requesting feedback from
    /// inside a hook.
    pub fn worker(&self) -> &WorkerContext {
        self.worker
    }
}

/// Which error classes an `on_worker_error` hook is invoked for.
///
/// `Any` matches every error; `Classes` matches an explicit list of class
/// tags (see [`AutomaError::class`]) and stands in for union-typed
/// annotations.
#[derive(Debug, Clone, Default)]
pub enum ErrorMatcher {
    #[default]
    Any,
    Classes(Vec<String>),
}

impl ErrorMatcher {
    pub fn classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Classes(classes.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, error: &AutomaError) -> bool {
        match self {
            Self::Any => true,
            Self::Classes(classes) => classes.iter().any(|c| c == error.class()),
        }
    }
}

/// Hooks running around each worker invocation.
///
/// `on_worker_start` fires after binding, before the body; `on_worker_end`
/// after a successful return; `on_worker_error` after a failure, for
/// callbacks whose [`ErrorMatcher`] matches the error class. Returning
/// `true` from `on_worker_error` suppresses the error and the run continues
/// as if the worker returned `null`.
#[async_trait]
pub trait WorkerCallback: Send + Sync {
    async fn on_worker_start(&self, _cx: CallbackContext<'_>) -> Result<(), AutomaError> {
        Ok(())
    }

    async fn on_worker_end(
        &self,
        _cx: CallbackContext<'_>,
        _result: &Value,
    ) -> Result<(), AutomaError> {
        Ok(())
    }

    async fn on_worker_error(&self, _cx: CallbackContext<'_>, _error: &AutomaError) -> bool {
        false
    }

    fn error_matcher(&self) -> ErrorMatcher {
        ErrorMatcher::Any
    }
}

type BuildFn = dyn Fn() -> Arc<dyn WorkerCallback> + Send + Sync;

/// Factory producing a fresh callback instance per invocation.
#[derive(Clone)]
pub struct CallbackBuilder {
    build: Arc<BuildFn>,
}

impl CallbackBuilder {
    pub fn new<C, F>(f: F) -> Self
    where
        C: WorkerCallback + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(move || Arc::new(f()) as Arc<dyn WorkerCallback>),
        }
    }

    pub fn build(&self) -> Arc<dyn WorkerCallback> {
        (self.build)()
    }
}

impl std::fmt::Debug for CallbackBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CallbackBuilder")
    }
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
