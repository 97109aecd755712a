// src/engine/runtime.rs

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::chain::SubmitOutcome;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::status::StatusBus;
use crate::work::ScheduledItem;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreEvent, CoreReply, RuntimeEvent};

/// Where to deliver the core's reply for the event being processed.
enum ReplyTo {
    None,
    Submit(oneshot::Sender<SubmitOutcome>),
    Cancel(oneshot::Sender<bool>),
}

/// Drives the scheduler in response to `RuntimeEvent`s, publishes status
/// changes to the [`StatusBus`] and delegates item execution to an
/// `ExecutorBackend`.
///
/// This is the single decision loop of the engine: every state mutation
/// happens here, one event at a time.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    bus: StatusBus,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        bus: StatusBus,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            bus,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (publish, abort, dispatch).
    /// - Replies to the caller only after the commands ran, so a submitter
    ///   never returns before the replaced chain's cancellation is visible.
    pub async fn run(mut self) -> Result<()> {
        info!("workchain runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let (core_event, reply_to) = split_event(event);
            let step = self.core.step(core_event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            deliver_reply(reply_to, step.reply);

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::PublishStatus(changes) => {
                self.bus.publish(changes);
            }
            CoreCommand::PruneStatus(ids) => {
                self.bus.remove(ids);
            }
            CoreCommand::AbortItems(ids) => {
                debug!(?ids, "aborting running items");
                self.executor.abort_items(ids).await?;
            }
            CoreCommand::DispatchItems(items) => {
                self.spawn_ready(items).await?;
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, items: Vec<ScheduledItem>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let ids: Vec<_> = items.iter().map(|i| i.id.to_string()).collect();
        debug!(?ids, "dispatching ready items");

        self.executor.spawn_ready_items(items).await
    }
}

fn split_event(event: RuntimeEvent) -> (CoreEvent, ReplyTo) {
    match event {
        RuntimeEvent::Submit { spec, reply } => (CoreEvent::Submit(spec), ReplyTo::Submit(reply)),
        RuntimeEvent::Cancel { name, reply } => (CoreEvent::Cancel(name), ReplyTo::Cancel(reply)),
        RuntimeEvent::ConstraintChanged(c) => (CoreEvent::ConstraintChanged(c), ReplyTo::None),
        RuntimeEvent::ItemCompleted { id, outcome } => {
            (CoreEvent::ItemCompleted { id, outcome }, ReplyTo::None)
        }
        RuntimeEvent::ShutdownRequested => (CoreEvent::Shutdown, ReplyTo::None),
    }
}

fn deliver_reply(reply_to: ReplyTo, reply: Option<CoreReply>) {
    // A caller that stopped waiting is not an error for the engine.
    match (reply_to, reply) {
        (ReplyTo::None, _) => {}
        (ReplyTo::Submit(tx), Some(CoreReply::Submitted(outcome))) => {
            let _ = tx.send(outcome);
        }
        (ReplyTo::Cancel(tx), Some(CoreReply::Cancelled(cancelled))) => {
            let _ = tx.send(cancelled);
        }
        (_, reply) => {
            warn!(?reply, "core reply does not match the pending request; dropping");
        }
    }
}
