// src/engine/scheduler.rs

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chain::{
    Admission, ChainGraph, ChainId, ChainOutcome, ChainRef, ChainSpec, SubmitOutcome,
    UniqueChainRegistry,
};
use crate::engine::WorkOutcome;
use crate::engine::scheduler_step::SchedulerStep;
use crate::engine::state_manager::StateManager;
use crate::status::outcome_of;
use crate::work::{Constraint, ConstraintEvaluator, ItemId, WorkItem, WorkState};

/// Bookkeeping for one submitted chain instance.
#[derive(Debug, Clone)]
struct ChainRecord {
    chain: ChainRef,
    outcome: Option<ChainOutcome>,
}

/// Scheduler holds every known item plus the registry of active chains.
///
/// It is responsible for:
/// - admitting chains under the unique-name policy
/// - deciding when an item is ready (all predecessors succeeded)
/// - gating ready items on their constraints
/// - recording completions and merging output into successors
/// - cancelling the downstream closure of a failed item
/// - marking chains terminal and releasing their names
///
/// It performs no IO. Every call returns a [`SchedulerStep`] describing what
/// changed and what the executor pool must do.
#[derive(Debug)]
pub struct Scheduler {
    items: HashMap<ItemId, WorkItem>,
    graph: ChainGraph,
    chains: HashMap<ChainId, ChainRecord>,
    registry: UniqueChainRegistry,
    evaluator: Arc<dyn ConstraintEvaluator>,
    /// Terminal chains, oldest first, still kept for status queries.
    finished: VecDeque<ChainId>,
    retained_chains: usize,
}

impl Scheduler {
    pub fn new(evaluator: Arc<dyn ConstraintEvaluator>, retained_chains: usize) -> Self {
        Self {
            items: HashMap::new(),
            graph: ChainGraph::new(),
            chains: HashMap::new(),
            registry: UniqueChainRegistry::new(),
            evaluator,
            finished: VecDeque::new(),
            retained_chains,
        }
    }

    /// Returns `true` if no chain is active.
    pub fn is_idle(&self) -> bool {
        self.registry.is_empty()
    }

    /// The active chain registered under `name`, if any.
    pub fn active_chain(&self, name: &str) -> Option<&ChainRef> {
        self.registry.active(name)
    }

    pub fn state_of(&self, id: ItemId) -> Option<WorkState> {
        self.items.get(&id).map(|i| i.state)
    }

    pub fn item(&self, id: ItemId) -> Option<&WorkItem> {
        self.items.get(&id)
    }

    /// Outcome of a chain instance once it is terminal.
    pub fn chain_outcome(&self, id: ChainId) -> Option<ChainOutcome> {
        self.chains.get(&id).and_then(|r| r.outcome)
    }

    /// Whether a chain instance is still known (not yet pruned).
    pub fn knows_chain(&self, id: ChainId) -> bool {
        self.chains.contains_key(&id)
    }

    /// Admit a finalized chain.
    ///
    /// With `Replace`, the existing chain's items are cancelled in the same
    /// step and before the new chain's items are promoted, so the returned
    /// `changed` list always shows the cancellations first.
    ///
    /// A spec whose chain id or item ids are already known (a resubmitted
    /// clone) is rejected without touching the registry.
    pub fn submit(&mut self, spec: ChainSpec) -> (SubmitOutcome, SchedulerStep) {
        let mut step = SchedulerStep::default();

        if self.chains.contains_key(&spec.id)
            || spec.items.iter().any(|i| self.items.contains_key(&i.id))
        {
            warn!(
                chain = %spec.name,
                chain_id = %spec.id,
                "chain ids already known; rejecting resubmission"
            );
            let chain = ChainRef {
                id: spec.id,
                name: spec.name.clone(),
                items: spec.item_ids(),
            };
            return (SubmitOutcome::Rejected(chain), step);
        }

        match self.registry.admit(&spec.name, spec.policy) {
            Admission::Keep(existing) => {
                info!(
                    chain = %spec.name,
                    existing = %existing.id,
                    discarded = %spec.id,
                    "chain already active; keeping existing and discarding new submission"
                );
                return (SubmitOutcome::KeptExisting(existing), step);
            }
            Admission::Replace(existing) => {
                info!(
                    chain = %spec.name,
                    existing = %existing.id,
                    replacement = %spec.id,
                    "replacing active chain"
                );
                self.cancel_chain_into(existing.id, &mut step);
            }
            Admission::Register => {}
        }

        let chain = ChainRef {
            id: spec.id,
            name: spec.name.clone(),
            items: spec.item_ids(),
        };
        let roots = spec.stages.first().cloned().unwrap_or_default();

        self.graph.add_chain(&spec);
        for item in spec.items {
            self.items.insert(item.id, item);
        }
        self.chains.insert(
            chain.id,
            ChainRecord {
                chain: chain.clone(),
                outcome: None,
            },
        );
        self.registry.register(chain.clone());

        info!(
            chain = %chain.name,
            chain_id = %chain.id,
            items = chain.items.len(),
            "chain enqueued"
        );

        let mut manager = StateManager::new(&mut self.items, &self.graph, self.evaluator.as_ref());
        for id in chain.items.iter() {
            manager.announce(*id);
        }
        step.dispatch.extend(manager.promote_ready(&roots));
        step.changed.extend(manager.into_changes());

        (SubmitOutcome::Enqueued(chain), step)
    }

    /// Cancel the active chain registered under `name`.
    ///
    /// Returns `false` (and an empty step) if nothing is active under that
    /// name; cancelling an unknown or finished chain is a no-op.
    pub fn cancel(&mut self, name: &str) -> (bool, SchedulerStep) {
        let mut step = SchedulerStep::default();

        let Some(active) = self.registry.active(name).cloned() else {
            debug!(chain = %name, "cancel requested for chain with no active instance; ignoring");
            return (false, step);
        };

        info!(chain = %name, chain_id = %active.id, "cancelling chain");
        self.cancel_chain_into(active.id, &mut step);
        (true, step)
    }

    /// Cancel every active chain (used on shutdown).
    pub fn cancel_all(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        let mut active: Vec<ChainId> = self
            .chains
            .values()
            .filter(|r| r.outcome.is_none())
            .map(|r| r.chain.id)
            .collect();
        active.sort();

        for id in active {
            self.cancel_chain_into(id, &mut step);
        }
        step
    }

    /// React to a constraint change by re-evaluating blocked items.
    pub fn constraint_changed(&mut self, constraint: Option<&Constraint>) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        let mut manager = StateManager::new(&mut self.items, &self.graph, self.evaluator.as_ref());
        step.dispatch.extend(manager.retry_blocked(constraint));
        step.changed.extend(manager.into_changes());

        if !step.dispatch.is_empty() {
            debug!(
                constraint = ?constraint.map(|c| c.to_string()),
                released = step.dispatch.len(),
                "constraint change released blocked items"
            );
        }
        step
    }

    /// Record an executor result for `id`.
    ///
    /// Results for items that are no longer `Running` (typically cancelled
    /// while in flight) are discarded.
    pub fn complete(&mut self, id: ItemId, outcome: WorkOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let Some(item) = self.items.get_mut(&id) else {
            warn!(item = %id, "completion for unknown item; ignoring");
            return step;
        };

        if item.state != WorkState::Running {
            debug!(
                item = %id,
                state = %item.state,
                "discarding result for item that is no longer running"
            );
            return step;
        }

        let chain_id = item.chain;
        let mut manager = StateManager::new(&mut self.items, &self.graph, self.evaluator.as_ref());

        match outcome {
            WorkOutcome::Succeeded(output) => {
                manager.succeed(id, output);
                debug!(item = %id, "item succeeded");
                let dependents = self.graph.dependents_of(id);
                step.dispatch.extend(manager.promote_ready(&dependents));
            }
            WorkOutcome::Failed(reason) => {
                manager.fail(id, reason.clone());
                warn!(item = %id, error = %reason, "item failed; cancelling downstream items");
                step.abort.extend(manager.cancel_downstream(id));
            }
        }

        step.changed.extend(manager.into_changes());
        self.maybe_finish_chain(chain_id, &mut step);
        step
    }

    fn cancel_chain_into(&mut self, chain_id: ChainId, step: &mut SchedulerStep) {
        let Some(record) = self.chains.get(&chain_id) else {
            return;
        };
        let ids = record.chain.items.clone();

        let mut manager = StateManager::new(&mut self.items, &self.graph, self.evaluator.as_ref());
        step.abort.extend(manager.cancel_items(&ids));
        step.changed.extend(manager.into_changes());

        self.maybe_finish_chain(chain_id, step);
    }

    /// Mark a chain terminal once all of its items are, release its name and
    /// apply the retention policy.
    fn maybe_finish_chain(&mut self, chain_id: ChainId, step: &mut SchedulerStep) {
        let Some(record) = self.chains.get(&chain_id) else {
            return;
        };
        if record.outcome.is_some() {
            return;
        }

        let states = record
            .chain
            .items
            .iter()
            .map(|id| self.items.get(id).map(|i| i.state).unwrap_or(WorkState::Cancelled));
        let Some(outcome) = outcome_of(states) else {
            return;
        };

        let chain = record.chain.clone();
        if let Some(record) = self.chains.get_mut(&chain_id) {
            record.outcome = Some(outcome);
        }
        self.registry.release(&chain.name, chain.id);
        info!(chain = %chain.name, chain_id = %chain.id, ?outcome, "chain reached terminal state");

        self.finished.push_back(chain_id);
        step.finished.push((chain, outcome));
        self.prune(step);
    }

    fn prune(&mut self, step: &mut SchedulerStep) {
        while self.finished.len() > self.retained_chains {
            let Some(oldest) = self.finished.pop_front() else {
                break;
            };
            let Some(record) = self.chains.remove(&oldest) else {
                continue;
            };
            for id in record.chain.items.iter() {
                self.items.remove(id);
            }
            self.graph.remove_items(&record.chain.items);
            debug!(chain = %record.chain.name, chain_id = %oldest, "pruned finished chain");
            step.pruned.extend(record.chain.items);
        }
    }
}
