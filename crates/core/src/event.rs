// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Out-of-band application events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An out-of-band event posted by a worker towards the application layer.
///
/// Events bubble strictly upward through the automa tree; the nearest
/// ancestor with a matching handler (by `event_type` first, then the
/// default handler) consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Handler routing key. `None` routes to the default handler only.
    pub event_type: Option<String>,
    /// Application payload.
    pub data: Value,
    /// Completion ratio in `[0, 1]` for progress reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl Event {
    /// An event with an explicit routing type.
    pub fn typed(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: Some(event_type.into()),
            data,
            progress: None,
        }
    }

    /// An event without a routing type, handled by default handlers only.
    pub fn untyped(data: Value) -> Self {
        Self {
            event_type: None,
            data,
            progress: None,
        }
    }

    /// A progress report. `progress` is clamped into `[0, 1]`.
    pub fn progress(progress: f64, data: Value) -> Self {
        Self {
            event_type: None,
            data,
            progress: Some(progress.clamp(0.0, 1.0)),
        }
    }

    /// Attach a routing type to the event.
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn is_progress(&self) -> bool {
        self.progress.is_some()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
