// src/exec/executor_loop.rs

//! Main executor loop that manages running work bodies.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tracing::{debug, info};

use crate::engine::RuntimeEvent;
use crate::exec::item_runner::run_item;
use crate::exec::worker::WorkerRegistry;
use crate::work::{ItemId, ScheduledItem};

/// Requests accepted by the executor loop.
#[derive(Debug)]
pub enum ExecCommand {
    Run(ScheduledItem),
    Abort(ItemId),
}

/// Internal handle for a dispatched item.
///
/// - `abort` asks the runner to drop the body and report nothing.
/// - `handle` is the Tokio task driving the runner.
struct ActiveItem {
    abort: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// Each item runs in its own Tokio task, but only after acquiring one of
/// `max_workers` permits, so at most `max_workers` bodies execute at the
/// same time. Items waiting for a permit can still be aborted.
pub fn spawn_executor(
    workers: WorkerRegistry,
    max_workers: usize,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ExecCommand> {
    let (tx, mut rx) = mpsc::channel::<ExecCommand>(32);
    let permits = Arc::new(Semaphore::new(max_workers.max(1)));

    tokio::spawn(async move {
        info!(max_workers, "executor loop started");

        let mut active: HashMap<ItemId, ActiveItem> = HashMap::new();

        while let Some(command) = rx.recv().await {
            active.retain(|_, a| !a.handle.is_finished());

            match command {
                ExecCommand::Run(item) => {
                    start_item(item, &workers, &permits, &mut active, &runtime_tx);
                }
                ExecCommand::Abort(id) => abort_item(id, &mut active),
            }
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

fn start_item(
    item: ScheduledItem,
    workers: &WorkerRegistry,
    permits: &Arc<Semaphore>,
    active: &mut HashMap<ItemId, ActiveItem>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let id = item.id;
    if active.contains_key(&id) {
        debug!(item = %id, "item already dispatched; ignoring duplicate request");
        return;
    }

    let (abort_tx, abort_rx) = oneshot::channel::<()>();
    let worker = workers.get(&item.kind);
    let permits = Arc::clone(permits);
    let rt_tx = runtime_tx.clone();

    let handle = tokio::spawn(async move {
        run_item(item, worker, permits, rt_tx, abort_rx).await;
        debug!(item = %id, "item runner future finished");
    });

    active.insert(
        id,
        ActiveItem {
            abort: Some(abort_tx),
            handle,
        },
    );
}

fn abort_item(id: ItemId, active: &mut HashMap<ItemId, ActiveItem>) {
    let Some(existing) = active.get_mut(&id) else {
        debug!(item = %id, "abort for item that is not running; ignoring");
        return;
    };

    info!(item = %id, "abort requested; cancelling running item");

    if let Some(abort) = existing.abort.take() {
        if abort.send(()).is_err() {
            debug!(item = %id, "item already finished while aborting");
        }
    }
}
