// src/status/snapshot.rs

use std::collections::BTreeSet;

use crate::chain::{ChainId, ChainOutcome};
use crate::work::{Data, ItemId, WorkItem, WorkState};

/// Observable view of one work item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStatus {
    pub id: ItemId,
    pub chain: ChainId,
    pub chain_name: String,
    pub kind: String,
    pub tags: BTreeSet<String>,
    pub state: WorkState,
    pub output: Option<Data>,
    pub error: Option<String>,
}

impl ItemStatus {
    pub fn from_item(item: &WorkItem) -> Self {
        Self {
            id: item.id,
            chain: item.chain,
            chain_name: item.chain_name.clone(),
            kind: item.kind.clone(),
            tags: item.tags.clone(),
            state: item.state,
            output: item.output.clone(),
            error: item.error.clone(),
        }
    }
}

/// Which items an observer is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    /// Every item of every chain submitted under this name.
    Chain(String),
    /// Every item carrying this tag.
    Tag(String),
}

impl StatusFilter {
    pub fn chain(name: impl Into<String>) -> Self {
        StatusFilter::Chain(name.into())
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        StatusFilter::Tag(tag.into())
    }

    pub fn matches(&self, status: &ItemStatus) -> bool {
        match self {
            StatusFilter::Chain(name) => status.chain_name == *name,
            StatusFilter::Tag(tag) => status.tags.contains(tag),
        }
    }
}

/// Current state of every item matching a filter, ordered by item id
/// (which is submission and stage order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    entries: Vec<ItemStatus>,
}

impl StatusSnapshot {
    pub(crate) fn new(mut entries: Vec<ItemStatus>) -> Self {
        entries.sort_by_key(|e| e.id);
        Self { entries }
    }

    pub fn entries(&self) -> &[ItemStatus] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemStatus> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&ItemStatus> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// `(id, kind, state)` tuples in order.
    pub fn states(&self) -> Vec<(ItemId, &str, WorkState)> {
        self.entries
            .iter()
            .map(|e| (e.id, e.kind.as_str(), e.state))
            .collect()
    }

    /// Entries belonging to one chain instance.
    pub fn for_chain(&self, chain: ChainId) -> Vec<&ItemStatus> {
        self.entries.iter().filter(|e| e.chain == chain).collect()
    }

    /// True when there is at least one entry and all of them are terminal.
    pub fn is_terminal(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.state.is_terminal())
    }

    /// Aggregate outcome once every entry is terminal.
    pub fn outcome(&self) -> Option<ChainOutcome> {
        if !self.is_terminal() {
            return None;
        }
        outcome_of(self.entries.iter().map(|e| e.state))
    }
}

/// Outcome of a set of terminal states: any failure wins over cancellation,
/// and success needs every item to have succeeded.
pub fn outcome_of(states: impl IntoIterator<Item = WorkState>) -> Option<ChainOutcome> {
    let mut any_failed = false;
    let mut any_cancelled = false;
    let mut seen = false;

    for state in states {
        seen = true;
        match state {
            WorkState::Succeeded => {}
            WorkState::Failed => any_failed = true,
            WorkState::Cancelled => any_cancelled = true,
            _ => return None,
        }
    }

    if !seen {
        return None;
    }
    Some(if any_failed {
        ChainOutcome::Failed
    } else if any_cancelled {
        ChainOutcome::Cancelled
    } else {
        ChainOutcome::Succeeded
    })
}
