// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::info;

use crate::chain::{ChainSpec, SubmitOutcome};
use crate::engine::scheduler::Scheduler;
use crate::engine::scheduler_step::SchedulerStep;
use crate::engine::WorkOutcome;
use crate::status::ItemStatus;
use crate::work::{Constraint, ItemId, ScheduledItem};

/// Command produced by the pure core, to be executed by the outer IO shell.
///
/// Commands are emitted in the order they must be executed: status changes
/// are published before any item is dispatched.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Publish these status changes to observers, in order.
    PublishStatus(Vec<ItemStatus>),
    /// Drop these items from the status history.
    PruneStatus(Vec<ItemId>),
    /// Ask the executor pool to abort these running items.
    AbortItems(Vec<ItemId>),
    /// Send these items to the executor pool.
    DispatchItems(Vec<ScheduledItem>),
}

/// Answer to a caller waiting on a submit or cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreReply {
    Submitted(SubmitOutcome),
    Cancelled(bool),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Reply for the caller, sent after all commands ran.
    pub reply: Option<CoreReply>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn from_scheduler_step(step: SchedulerStep) -> Self {
        Self {
            commands: commands_for(step),
            reply: None,
            keep_running: true,
        }
    }
}

/// Translate a scheduler step into ordered shell commands.
pub fn commands_for(step: SchedulerStep) -> Vec<CoreCommand> {
    let mut commands = Vec::new();

    if !step.changed.is_empty() {
        commands.push(CoreCommand::PublishStatus(step.changed));
    }
    if !step.pruned.is_empty() {
        commands.push(CoreCommand::PruneStatus(step.pruned));
    }
    if !step.abort.is_empty() {
        commands.push(CoreCommand::AbortItems(step.abort));
    }
    if !step.dispatch.is_empty() {
        commands.push(CoreCommand::DispatchItems(step.dispatch));
    }

    commands
}

/// Handle a chain submission.
pub fn handle_submit(scheduler: &mut Scheduler, spec: ChainSpec) -> CoreStep {
    let (outcome, step) = scheduler.submit(spec);
    let mut core = CoreStep::from_scheduler_step(step);
    core.reply = Some(CoreReply::Submitted(outcome));
    core
}

/// Handle an explicit cancel by name.
pub fn handle_cancel(scheduler: &mut Scheduler, name: &str) -> CoreStep {
    let (cancelled, step) = scheduler.cancel(name);
    let mut core = CoreStep::from_scheduler_step(step);
    core.reply = Some(CoreReply::Cancelled(cancelled));
    core
}

/// Handle a constraint change notification.
pub fn handle_constraint_change(
    scheduler: &mut Scheduler,
    constraint: Option<Constraint>,
) -> CoreStep {
    CoreStep::from_scheduler_step(scheduler.constraint_changed(constraint.as_ref()))
}

/// Handle an item completion reported by the executor pool.
pub fn handle_item_completion(
    scheduler: &mut Scheduler,
    id: ItemId,
    outcome: WorkOutcome,
) -> CoreStep {
    CoreStep::from_scheduler_step(scheduler.complete(id, outcome))
}

/// Handle shutdown: cancel everything still active and stop.
pub fn handle_shutdown(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.cancel_all();
    if !step.finished.is_empty() {
        info!(cancelled_chains = step.finished.len(), "shutdown cancelled active chains");
    }
    let mut core = CoreStep::from_scheduler_step(step);
    core.keep_running = false;
    core
}
