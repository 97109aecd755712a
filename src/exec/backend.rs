// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production pool in [`executor_loop`](super::executor_loop).
//!
//! - `PoolExecutorBackend` is the default implementation. It wraps the
//!   bounded executor loop and forwards run/abort requests over a channel.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which items were dispatched and directly emits `ItemCompleted` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::engine::RuntimeEvent;
use crate::errors::{Result, WorkchainError};
use crate::exec::executor_loop::{ExecCommand, spawn_executor};
use crate::exec::worker::WorkerRegistry;
use crate::work::{ItemId, ScheduledItem};

/// Boxed future returned by backend operations.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how scheduled items are executed.
pub trait ExecutorBackend: Send {
    /// Dispatch the given items for execution.
    ///
    /// The implementation must eventually report exactly one
    /// `RuntimeEvent::ItemCompleted` per item, unless the item is aborted.
    fn spawn_ready_items(&mut self, items: Vec<ScheduledItem>) -> BackendFuture<'_>;

    /// Best-effort abort of running items. Completions that still arrive are
    /// discarded by the scheduler.
    fn abort_items(&mut self, ids: Vec<ItemId>) -> BackendFuture<'_>;
}

/// Production backend: a bounded pool of tokio tasks running registered
/// work bodies.
#[derive(Debug)]
pub struct PoolExecutorBackend {
    tx: mpsc::Sender<ExecCommand>,
}

impl PoolExecutorBackend {
    /// Create the backend and spawn its executor loop.
    ///
    /// At most `max_workers` bodies run concurrently; completions are sent
    /// to `runtime_tx`.
    pub fn new(
        workers: WorkerRegistry,
        max_workers: usize,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        let tx = spawn_executor(workers, max_workers, runtime_tx);
        Self { tx }
    }
}

impl ExecutorBackend for PoolExecutorBackend {
    fn spawn_ready_items(&mut self, items: Vec<ScheduledItem>) -> BackendFuture<'_> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for item in items {
                tx.send(ExecCommand::Run(item))
                    .await
                    .map_err(|_| WorkchainError::EngineStopped)?;
            }
            Ok(())
        })
    }

    fn abort_items(&mut self, ids: Vec<ItemId>) -> BackendFuture<'_> {
        let tx = self.tx.clone();

        Box::pin(async move {
            for id in ids {
                tx.send(ExecCommand::Abort(id))
                    .await
                    .map_err(|_| WorkchainError::EngineStopped)?;
            }
            Ok(())
        })
    }
}
