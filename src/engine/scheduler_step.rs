// src/engine/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::chain::{ChainOutcome, ChainRef};
use crate::status::ItemStatus;
use crate::work::{ItemId, ScheduledItem};

/// Structured result of a single scheduler "step".
///
/// `changed` is in transition order; publishing it as-is preserves every
/// ordering guarantee the scheduler makes (cancellation of a replaced chain
/// always precedes the new chain's first `Running`).
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Status of every item whose state (or output) changed in this step.
    pub changed: Vec<ItemStatus>,
    /// Items that became `Running` and must be sent to the executor pool.
    pub dispatch: Vec<ScheduledItem>,
    /// Running items that were cancelled; the pool should abort them.
    pub abort: Vec<ItemId>,
    /// Chains that became terminal in this step.
    pub finished: Vec<(ChainRef, ChainOutcome)>,
    /// Items dropped from history by the retention policy.
    pub pruned: Vec<ItemId>,
}

impl SchedulerStep {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
            && self.dispatch.is_empty()
            && self.abort.is_empty()
            && self.finished.is_empty()
            && self.pruned.is_empty()
    }

    /// States changed in this step, as `(id, state)` pairs.
    pub fn transitions(&self) -> Vec<(ItemId, crate::work::WorkState)> {
        self.changed.iter().map(|s| (s.id, s.state)).collect()
    }
}
