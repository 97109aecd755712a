// src/chain/mod.rs

//! Named chains of work.
//!
//! - [`builder`] assembles stages into a finalized [`ChainSpec`].
//! - [`graph`] keeps dependency edges between item ids.
//! - [`registry`] enforces "one active chain per name".

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::work::ItemId;

pub mod builder;
pub mod graph;
pub mod registry;

pub use builder::{ChainBuilder, ChainSpec, Stage};
pub use graph::ChainGraph;
pub use registry::{Admission, ExistingChainPolicy, UniqueChainRegistry};

static NEXT_CHAIN_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one submitted chain instance.
///
/// Two submissions under the same name get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(u64);

impl ChainId {
    pub(crate) fn next() -> Self {
        ChainId(NEXT_CHAIN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain-{}", self.0)
    }
}

/// Lightweight reference to a registered chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRef {
    pub id: ChainId,
    pub name: String,
    /// Item ids in stage order.
    pub items: Vec<ItemId>,
}

/// Result of handing a chain to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The new chain was registered (possibly after replacing another).
    Enqueued(ChainRef),
    /// `KeepExisting` was requested and a chain was already active; the new
    /// chain was discarded.
    KeptExisting(ChainRef),
    /// The spec reused ids of a chain that was already submitted; nothing
    /// changed.
    Rejected(ChainRef),
}

impl SubmitOutcome {
    /// The chain this outcome refers to. For `Enqueued` and `KeptExisting`
    /// it is the chain active under the submitted name afterwards.
    pub fn chain(&self) -> &ChainRef {
        match self {
            SubmitOutcome::Enqueued(c)
            | SubmitOutcome::KeptExisting(c)
            | SubmitOutcome::Rejected(c) => c,
        }
    }
}

/// Final outcome of a chain once every item is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    Succeeded,
    Failed,
    Cancelled,
}
