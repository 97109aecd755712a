// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`CoreEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//! - an optional reply for the caller that caused the event
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - publishing status and sending items to the executor pool
//! - delivering replies
//!
//! The core is intended to be unit tested without any Tokio, channels or
//! executor.

use crate::engine::event_handlers::{
    CoreStep, handle_cancel, handle_constraint_change, handle_item_completion, handle_shutdown,
    handle_submit,
};
use crate::engine::scheduler::Scheduler;
use crate::engine::CoreEvent;

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: CoreEvent) -> CoreStep {
        match event {
            CoreEvent::Submit(spec) => handle_submit(&mut self.scheduler, spec),
            CoreEvent::Cancel(name) => handle_cancel(&mut self.scheduler, &name),
            CoreEvent::ConstraintChanged(constraint) => {
                handle_constraint_change(&mut self.scheduler, constraint)
            }
            CoreEvent::ItemCompleted { id, outcome } => {
                handle_item_completion(&mut self.scheduler, id, outcome)
            }
            CoreEvent::Shutdown => handle_shutdown(&mut self.scheduler),
        }
    }
}
