// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the Automa runtime

use crate::interaction::{Interaction, InteractionException};
use thiserror::Error;

/// Errors raised by the Automa runtime.
///
/// Binding and topology errors abort a run before the affected worker is
/// dispatched. Worker-body failures (`Task`) go through the callback error
/// pipeline first and only escape `arun` if no callback suppresses them.
#[derive(Debug, Error)]
pub enum AutomaError {
    /// Invalid declaration while assembling the graph (e.g. duplicate keys).
    #[error("declaration error: {0}")]
    Declaration(String),

    /// The graph failed to compile: missing dependency target or cycle.
    #[error("compilation error: {0}")]
    Compilation(String),

    /// A runtime precondition was violated (duplicate add, unknown ferry
    /// target, remove of an unknown worker, ...).
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A sender/receiver rule was violated while assembling call arguments.
    #[error("args mapping error for worker '{worker}': {message}")]
    ArgsMapping { worker: String, message: String },

    /// A `From`/`System` parameter descriptor could not be resolved.
    #[error("args injection error for worker '{worker}': {message}")]
    ArgsInjection { worker: String, message: String },

    /// Worker infrastructure misuse (missing pool, missing body, ...).
    #[error("worker infrastructure error: {0}")]
    WorkerInfra(String),

    /// `request_feedback`/`request_feedback_async` expired.
    #[error("feedback request timed out after {timeout_ms}ms")]
    FeedbackTimeout { timeout_ms: u64 },

    /// A worker body failed. The `class` tag drives callback dispatch.
    #[error("worker task failed [{class}]: {message}")]
    Task { class: String, message: String },

    /// Internal pause sentinel: a worker reached a human-interaction site
    /// with no recorded feedback. Never escapes `arun`.
    #[error("interaction '{}' is awaiting feedback", .0.interaction_id)]
    InteractionPending(Box<Interaction>),

    /// The run paused with pending human interactions. Carries a resumable
    /// snapshot; callers persist it and resume with feedbacks later.
    #[error("{} interaction(s) awaiting human feedback", .0.interactions.len())]
    Interaction(Box<InteractionException>),

    /// Snapshot encode/decode or version mismatch.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AutomaError {
    /// Build a worker-body failure with an explicit error class.
    pub fn task(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Task {
            class: class.into(),
            message: message.into(),
        }
    }

    /// The class tag used for callback error dispatch.
    ///
    /// Worker failures report their caller-chosen class; every other
    /// variant reports its kind name.
    pub fn class(&self) -> &str {
        match self {
            Self::Declaration(_) => "Declaration",
            Self::Compilation(_) => "Compilation",
            Self::Runtime(_) => "Runtime",
            Self::ArgsMapping { .. } => "ArgsMapping",
            Self::ArgsInjection { .. } => "ArgsInjection",
            Self::WorkerInfra(_) => "WorkerInfra",
            Self::FeedbackTimeout { .. } => "FeedbackTimeout",
            Self::Task { class, .. } => class,
            Self::InteractionPending(_) => "InteractionPending",
            Self::Interaction(_) => "Interaction",
            Self::Serialization(_) => "Serialization",
        }
    }

    /// Whether this error is the internal pause sentinel.
    pub fn is_pause(&self) -> bool {
        matches!(self, Self::InteractionPending(_))
    }
}

impl From<serde_json::Error> for AutomaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
