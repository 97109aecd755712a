// src/engine/state_manager.rs

//! Per-item state transitions for the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::chain::ChainGraph;
use crate::status::ItemStatus;
use crate::work::{
    Constraint, ConstraintEvaluator, Data, ItemId, ScheduledItem, WorkItem, WorkState,
};

/// Applies state transitions to items and records every change.
///
/// All mutation of item state goes through [`StateManager::transition`],
/// which rejects anything that is not a legal forward move.
pub struct StateManager<'a> {
    items: &'a mut HashMap<ItemId, WorkItem>,
    graph: &'a ChainGraph,
    evaluator: &'a dyn ConstraintEvaluator,
    changed: Vec<ItemStatus>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        items: &'a mut HashMap<ItemId, WorkItem>,
        graph: &'a ChainGraph,
        evaluator: &'a dyn ConstraintEvaluator,
    ) -> Self {
        Self {
            items,
            graph,
            evaluator,
            changed: Vec::new(),
        }
    }

    /// Status changes recorded so far, in order.
    pub fn into_changes(self) -> Vec<ItemStatus> {
        self.changed
    }

    /// Record the current status of an item without changing its state
    /// (used when an item first enters the scheduler).
    pub fn announce(&mut self, id: ItemId) {
        if let Some(item) = self.items.get(&id) {
            self.changed.push(ItemStatus::from_item(item));
        }
    }

    /// Move `id` to `next`. Returns `false` (and changes nothing) if the move
    /// is not a legal forward transition.
    pub fn transition(&mut self, id: ItemId, next: WorkState) -> bool {
        let Some(item) = self.items.get_mut(&id) else {
            warn!(item = %id, "transition for unknown item; ignoring");
            return false;
        };

        if !item.state.can_transition_to(next) {
            debug!(
                item = %id,
                from = %item.state,
                to = %next,
                "rejecting illegal state transition"
            );
            return false;
        }

        debug!(item = %id, kind = %item.kind, from = %item.state, to = %next, "state transition");
        item.state = next;
        self.changed.push(ItemStatus::from_item(item));
        true
    }

    /// Store `output` and move a running item to `Succeeded`.
    pub fn succeed(&mut self, id: ItemId, output: Data) -> bool {
        if let Some(item) = self.items.get_mut(&id) {
            if item.state == WorkState::Running {
                item.output = Some(output);
            }
        }
        self.transition(id, WorkState::Succeeded)
    }

    /// Store the failure reason and move a running item to `Failed`.
    pub fn fail(&mut self, id: ItemId, reason: String) -> bool {
        if let Some(item) = self.items.get_mut(&id) {
            if item.state == WorkState::Running {
                item.error = Some(reason);
            }
        }
        self.transition(id, WorkState::Failed)
    }

    /// Whether every predecessor of `item` has succeeded.
    pub fn deps_satisfied(&self, item: &WorkItem) -> bool {
        WorkItem::is_ready(item.depends_on.iter().map(|dep| {
            self.items
                .get(dep)
                .map(|d| d.state)
                // A missing predecessor can never succeed.
                .unwrap_or(WorkState::Cancelled)
        }))
    }

    /// Whether every constraint of `item` currently holds.
    pub fn constraints_satisfied(&self, item: &WorkItem) -> bool {
        item.constraints
            .iter()
            .all(|c| self.evaluator.is_satisfied(c))
    }

    /// Promote `Enqueued` candidates whose predecessors all succeeded.
    ///
    /// Predecessor output is merged into the item's input first (in
    /// dependency order, predecessor keys win), then constraints decide
    /// between `Running` and `Blocked`.
    pub fn promote_ready(&mut self, candidates: &[ItemId]) -> Vec<ScheduledItem> {
        let mut ready = Vec::new();

        for id in candidates {
            let Some(item) = self.items.get(id) else {
                continue;
            };
            if item.state != WorkState::Enqueued || !self.deps_satisfied(item) {
                continue;
            }

            self.merge_predecessor_output(*id);
            if let Some(scheduled) = self.try_start(*id) {
                ready.push(scheduled);
            }
        }

        ready
    }

    /// Re-evaluate blocked items. With `Some(constraint)` only items gated on
    /// that constraint are considered.
    pub fn retry_blocked(&mut self, constraint: Option<&Constraint>) -> Vec<ScheduledItem> {
        let mut blocked: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| item.state == WorkState::Blocked)
            .filter(|item| constraint.is_none_or(|c| item.constraints.contains(c)))
            .map(|item| item.id)
            .collect();
        blocked.sort();

        blocked
            .into_iter()
            .filter_map(|id| self.try_start(id))
            .collect()
    }

    /// Start a ready item if its constraints hold; otherwise park it in
    /// `Blocked`.
    fn try_start(&mut self, id: ItemId) -> Option<ScheduledItem> {
        let item = self.items.get(&id)?;

        if !self.constraints_satisfied(item) {
            if item.state == WorkState::Enqueued {
                let unmet: Vec<String> = item
                    .constraints
                    .iter()
                    .filter(|c| !self.evaluator.is_satisfied(c))
                    .map(|c| c.to_string())
                    .collect();
                info!(item = %id, kind = %item.kind, ?unmet, "constraints not met; blocking item");
                self.transition(id, WorkState::Blocked);
            }
            return None;
        }

        if !self.transition(id, WorkState::Running) {
            return None;
        }

        let item = self.items.get(&id)?;
        info!(
            item = %id,
            chain = %item.chain_name,
            kind = %item.kind,
            "dependencies and constraints satisfied; dispatching item"
        );
        Some(ScheduledItem::from_item(item))
    }

    fn merge_predecessor_output(&mut self, id: ItemId) {
        let Some(item) = self.items.get(&id) else {
            return;
        };

        let mut input = item.input.clone();
        for dep in item.depends_on.iter() {
            if let Some(output) = self.items.get(dep).and_then(|d| d.output.as_ref()) {
                input.merge_from(output);
            }
        }

        if let Some(item) = self.items.get_mut(&id) {
            item.input = input;
        }
    }

    /// Cancel every non-terminal item in `ids`.
    ///
    /// Returns the ids that were `Running`, so the executor can be asked to
    /// abort them.
    pub fn cancel_items(&mut self, ids: &[ItemId]) -> Vec<ItemId> {
        let mut running = Vec::new();

        for id in ids {
            let Some(item) = self.items.get(id) else {
                continue;
            };
            if item.state.is_terminal() {
                continue;
            }
            let was_running = item.state == WorkState::Running;
            if self.transition(*id, WorkState::Cancelled) && was_running {
                running.push(*id);
            }
        }

        running
    }

    /// Cancel the full downstream closure of `id` (excluding `id`).
    pub fn cancel_downstream(&mut self, id: ItemId) -> Vec<ItemId> {
        let downstream = self.graph.downstream_of(id);
        if !downstream.is_empty() {
            debug!(
                item = %id,
                downstream = downstream.len(),
                "cancelling downstream items of failed item"
            );
        }
        self.cancel_items(&downstream)
    }
}
