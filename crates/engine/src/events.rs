// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event handlers and feedback mailboxes
//!
//! Handlers are registered per automa keyed by event type, with an optional
//! default entry. Routing walks the parent chain: the nearest automa with a
//! matching handler consumes the event. Feedback requests pair the handler
//! with a one-shot mailbox reachable from both the event loop and pool
//! threads.

use automa_core::{Event, Feedback};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

type NotifyFn = dyn Fn(Event) + Send + Sync;
type ReplyFn = dyn Fn(Event, FeedbackSender) + Send + Sync;

/// A registered application-layer event handler.
#[derive(Clone)]
pub enum EventHandler {
    /// Fire-and-forget observer.
    Notify(Arc<NotifyFn>),
    /// Observer that may answer through a [`FeedbackSender`].
    WithReply(Arc<ReplyFn>),
}

impl EventHandler {
    pub fn notify(f: impl Fn(Event) + Send + Sync + 'static) -> Self {
        Self::Notify(Arc::new(f))
    }

    pub fn with_reply(f: impl Fn(Event, FeedbackSender) + Send + Sync + 'static) -> Self {
        Self::WithReply(Arc::new(f))
    }

    /// Invoke the handler. Handlers without a reply path get a detached
    /// sender whose sends are dropped.
    pub fn dispatch(&self, event: Event, sender: Option<FeedbackSender>) {
        match self {
            Self::Notify(f) => f(event),
            Self::WithReply(f) => f(event, sender.unwrap_or_else(FeedbackSender::detached)),
        }
    }

    pub fn accepts_reply(&self) -> bool {
        matches!(self, Self::WithReply(_))
    }
}

/// Per-automa handler table: typed entries plus one default entry.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    typed: IndexMap<String, EventHandler>,
    default: Option<EventHandler>,
}

impl HandlerRegistry {
    /// Register a handler for an event type, or the default handler when
    /// `event_type` is `None`. Re-registration replaces the previous entry.
    pub fn register(&mut self, event_type: Option<&str>, handler: EventHandler) {
        match event_type {
            Some(event_type) => {
                self.typed.insert(event_type.to_string(), handler);
            }
            None => self.default = Some(handler),
        }
    }

    /// Find the handler for an event: by type first, then the default.
    pub fn lookup(&self, event_type: Option<&str>) -> Option<&EventHandler> {
        if let Some(event_type) = event_type {
            if let Some(handler) = self.typed.get(event_type) {
                return Some(handler);
            }
        }
        self.default.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.typed.is_empty() && self.default.is_none()
    }
}

enum ReplySlot {
    Oneshot(tokio::sync::oneshot::Sender<Feedback>),
    Channel(std::sync::mpsc::SyncSender<Feedback>),
}

/// One-shot mailbox handed to feedback-capable handlers.
///
/// The first `send` wins; later sends and sends into an expired mailbox
/// report `false`.
#[derive(Clone)]
pub struct FeedbackSender {
    slot: Arc<Mutex<Option<ReplySlot>>>,
}

impl FeedbackSender {
    /// Mailbox awaited on the event loop.
    pub(crate) fn oneshot() -> (Self, tokio::sync::oneshot::Receiver<Feedback>) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(ReplySlot::Oneshot(tx)))),
            },
            rx,
        )
    }

    /// Mailbox received with a blocking timeout on a pool thread.
    pub(crate) fn channel() -> (Self, std::sync::mpsc::Receiver<Feedback>) {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        (
            Self {
                slot: Arc::new(Mutex::new(Some(ReplySlot::Channel(tx)))),
            },
            rx,
        )
    }

    /// A sender with no receiving side; used when a reply-capable handler
    /// observes a plain `post_event`.
    pub fn detached() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Deliver the feedback. Returns `false` if the mailbox was already
    /// used, timed out, or is detached.
    pub fn send(&self, feedback: Feedback) -> bool {
        let slot = self.slot.lock().take();
        match slot {
            Some(ReplySlot::Oneshot(tx)) => tx.send(feedback).is_ok(),
            Some(ReplySlot::Channel(tx)) => tx.try_send(feedback).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
