// src/engine/mod.rs

//! Orchestration engine for workchain.
//!
//! This module ties together:
//! - the chain scheduler (readiness, constraint gating, failure and
//!   cancellation propagation, chain termination)
//! - the unique-chain registry
//! - the main runtime event loop that reacts to:
//!   - chain submissions and cancellations
//!   - constraint changes
//!   - item completions from the executor pool
//!   - shutdown requests
//!
//! The pure core state machine lives in [`core`] and [`scheduler`]; the
//! async/IO shell is implemented in [`runtime`].

use tokio::sync::oneshot;

use crate::chain::{ChainSpec, SubmitOutcome};
use crate::work::{Constraint, Data, ItemId};

/// Result reported by the executor pool for one item.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome {
    Succeeded(Data),
    Failed(String),
}

/// Events flowing into the pure core.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    Submit(ChainSpec),
    Cancel(String),
    /// `None` means "re-evaluate every blocked item" (e.g. after the
    /// constraint stream lagged).
    ConstraintChanged(Option<Constraint>),
    ItemCompleted { id: ItemId, outcome: WorkOutcome },
    Shutdown,
}

/// Events flowing into the runtime from callers, the executor pool and the
/// constraint listener.
#[derive(Debug)]
pub enum RuntimeEvent {
    Submit {
        spec: ChainSpec,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    Cancel {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    ConstraintChanged(Option<Constraint>),
    ItemCompleted {
        id: ItemId,
        outcome: WorkOutcome,
    },
    /// Cancel everything still active and stop the loop.
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreReply, CoreStep};
pub use runtime::Runtime;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
