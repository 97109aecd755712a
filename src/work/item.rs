// src/work/item.rs

//! Work item descriptions and per-item state.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::chain::ChainId;
use crate::work::constraint::Constraint;
use crate::work::data::Data;

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier of a work item. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    /// Allocate a fresh id.
    pub(crate) fn next() -> Self {
        ItemId(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkState {
    /// Part of an active chain, waiting on predecessors.
    Enqueued,
    /// Predecessors done, waiting on one or more constraints.
    Blocked,
    /// Dispatched to the executor pool.
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl WorkState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkState::Succeeded | WorkState::Failed | WorkState::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_transition_to(self, next: WorkState) -> bool {
        use WorkState::*;
        match (self, next) {
            (Enqueued, Blocked | Running | Cancelled) => true,
            (Blocked, Running | Cancelled) => true,
            (Running, Succeeded | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkState::Enqueued => "ENQUEUED",
            WorkState::Blocked => "BLOCKED",
            WorkState::Running => "RUNNING",
            WorkState::Succeeded => "SUCCEEDED",
            WorkState::Failed => "FAILED",
            WorkState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Caller-side description of one unit of work, before it is enqueued.
///
/// Ids and dependencies are assigned when the owning chain is finalized.
#[derive(Debug, Clone)]
pub struct WorkRequest {
    pub kind: String,
    pub input: Data,
    pub constraints: BTreeSet<Constraint>,
    pub tags: BTreeSet<String>,
}

impl WorkRequest {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            input: Data::new(),
            constraints: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_input(mut self, input: Data) -> Self {
        self.input = input;
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.insert(constraint);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// A schedulable unit, owned and mutated only by the scheduler.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: ItemId,
    pub chain: ChainId,
    pub chain_name: String,
    pub kind: String,
    /// Input as supplied by the caller; predecessor output is merged in just
    /// before dispatch.
    pub input: Data,
    /// Populated only on success.
    pub output: Option<Data>,
    pub constraints: BTreeSet<Constraint>,
    pub tags: BTreeSet<String>,
    /// Predecessors in stage order.
    pub depends_on: Vec<ItemId>,
    pub state: WorkState,
    /// Failure reason reported by the work body.
    pub error: Option<String>,
}

impl WorkItem {
    pub(crate) fn from_request(
        request: WorkRequest,
        chain: ChainId,
        chain_name: &str,
        depends_on: Vec<ItemId>,
    ) -> Self {
        Self {
            id: ItemId::next(),
            chain,
            chain_name: chain_name.to_string(),
            kind: request.kind,
            input: request.input,
            output: None,
            constraints: request.constraints,
            tags: request.tags,
            depends_on,
            state: WorkState::Enqueued,
            error: None,
        }
    }

    /// Ready means every predecessor has succeeded.
    pub fn is_ready(predecessor_states: impl IntoIterator<Item = WorkState>) -> bool {
        predecessor_states
            .into_iter()
            .all(|s| s == WorkState::Succeeded)
    }
}

/// Description of an item the scheduler wants the executor pool to run now.
#[derive(Debug, Clone)]
pub struct ScheduledItem {
    pub id: ItemId,
    pub chain_name: String,
    pub kind: String,
    /// Final input: own input overlaid with predecessor output.
    pub input: Data,
}

impl ScheduledItem {
    pub fn from_item(item: &WorkItem) -> Self {
        Self {
            id: item.id,
            chain_name: item.chain_name.clone(),
            kind: item.kind.clone(),
            input: item.input.clone(),
        }
    }
}
