// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! automa-core: vocabulary types for the Automa workflow runtime

pub mod args;
pub mod error;
pub mod event;
pub mod feedback;
pub mod id;
pub mod interaction;
pub mod rules;
pub mod signature;
pub mod snapshot;
pub mod space;

pub use args::{Args, InputArgs, InputValue};
pub use error::AutomaError;
pub use event::Event;
pub use feedback::{Feedback, InteractionFeedback};
pub use id::{AutomaId, IdGen, InteractionId, InvocationId, SequentialIdGen, UuidIdGen};
pub use interaction::{Interaction, InteractionException};
pub use rules::{ArgsMappingRule, ResultDispatchingRule};
pub use signature::{Param, ParamKind, ParamSource, Signature, SystemTag};
pub use snapshot::{Snapshot, SERIALIZATION_VERSION};
pub use space::LocalSpace;
