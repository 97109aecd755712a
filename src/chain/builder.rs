// src/chain/builder.rs

//! Stage-by-stage chain construction.

use tracing::debug;

use crate::chain::registry::ExistingChainPolicy;
use crate::chain::{ChainId, SubmitOutcome};
use crate::errors::{Result, WorkchainError};
use crate::manager::WorkManager;
use crate::work::{ItemId, WorkItem, WorkRequest};

/// A set of sibling requests that share the same predecessors.
#[derive(Debug, Clone, Default)]
pub struct Stage {
    requests: Vec<WorkRequest>,
}

impl Stage {
    pub fn new(requests: Vec<WorkRequest>) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[WorkRequest] {
        &self.requests
    }
}

impl From<WorkRequest> for Stage {
    fn from(request: WorkRequest) -> Self {
        Self {
            requests: vec![request],
        }
    }
}

impl From<Vec<WorkRequest>> for Stage {
    fn from(requests: Vec<WorkRequest>) -> Self {
        Self { requests }
    }
}

impl FromIterator<WorkRequest> for Stage {
    fn from_iter<I: IntoIterator<Item = WorkRequest>>(iter: I) -> Self {
        Self {
            requests: iter.into_iter().collect(),
        }
    }
}

/// A finalized chain: ids assigned, barrier dependencies wired.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub id: ChainId,
    pub name: String,
    pub policy: ExistingChainPolicy,
    /// Items in stage order.
    pub items: Vec<WorkItem>,
    /// Item ids grouped by stage.
    pub stages: Vec<Vec<ItemId>>,
}

impl ChainSpec {
    /// Assign ids and dependencies. Every item of stage `n + 1` depends on
    /// every item of stage `n`.
    pub fn new(
        name: impl Into<String>,
        policy: ExistingChainPolicy,
        stages: Vec<Stage>,
    ) -> Result<Self> {
        let name = name.into();

        if stages.is_empty() {
            return Err(WorkchainError::EmptyStage {
                chain: name,
                stage: 0,
            });
        }
        if let Some(idx) = stages.iter().position(Stage::is_empty) {
            return Err(WorkchainError::EmptyStage {
                chain: name,
                stage: idx,
            });
        }

        let id = ChainId::next();
        let mut items = Vec::new();
        let mut stage_ids: Vec<Vec<ItemId>> = Vec::with_capacity(stages.len());

        for stage in stages {
            let preds = stage_ids.last().cloned().unwrap_or_default();
            let mut ids = Vec::with_capacity(stage.len());
            for request in stage.requests {
                let item = WorkItem::from_request(request, id, &name, preds.clone());
                ids.push(item.id);
                items.push(item);
            }
            stage_ids.push(ids);
        }

        debug!(
            chain = %name,
            chain_id = %id,
            stages = stage_ids.len(),
            items = items.len(),
            "finalized chain"
        );

        Ok(Self {
            id,
            name,
            policy,
            items,
            stages: stage_ids,
        })
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|i| i.id).collect()
    }
}

/// Continuation handle returned by [`WorkManager::begin_unique_chain`].
///
/// Single use: once [`enqueue`](Self::enqueue) has succeeded, further calls
/// to `then` or `enqueue` fail with `BuilderAlreadyFinalized`.
#[derive(Debug)]
pub struct ChainBuilder<'m> {
    manager: &'m WorkManager,
    name: String,
    policy: ExistingChainPolicy,
    stages: Vec<Stage>,
    finalized: bool,
}

impl<'m> ChainBuilder<'m> {
    pub(crate) fn begin(
        manager: &'m WorkManager,
        name: impl Into<String>,
        policy: ExistingChainPolicy,
        first_stage: impl Into<Stage>,
    ) -> Self {
        Self {
            manager,
            name: name.into(),
            policy,
            stages: vec![first_stage.into()],
            finalized: false,
        }
    }

    /// Append a stage that depends on every item of the previous stage.
    pub fn then(&mut self, stage: impl Into<Stage>) -> Result<&mut Self> {
        self.ensure_open()?;
        self.stages.push(stage.into());
        Ok(self)
    }

    /// Finalize the graph and hand it to the registry.
    pub async fn enqueue(&mut self) -> Result<SubmitOutcome> {
        self.ensure_open()?;
        let spec = ChainSpec::new(self.name.clone(), self.policy, self.stages.clone())?;
        self.finalized = true;
        self.stages.clear();
        self.manager.submit(spec).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finalized {
            return Err(WorkchainError::BuilderAlreadyFinalized {
                chain: self.name.clone(),
            });
        }
        Ok(())
    }
}
