// src/exec/item_runner.rs

//! Individual work body runner.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::engine::{RuntimeEvent, WorkOutcome};
use crate::exec::worker::{WorkContext, Worker};
use crate::work::{Data, ItemId, ScheduledItem};

/// Run one item's body and report its outcome.
///
/// - The body only starts once a pool permit is available.
/// - If the abort channel fires first, the body is dropped and **no**
///   `ItemCompleted` event is sent; the scheduler already marked the item
///   cancelled.
/// - A body that panics is reported as failed.
pub async fn run_item(
    item: ScheduledItem,
    worker: Option<Arc<dyn Worker>>,
    permits: Arc<Semaphore>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    mut abort_rx: oneshot::Receiver<()>,
) {
    let id = item.id;

    let Some(worker) = worker else {
        error!(item = %id, kind = %item.kind, "no worker registered for item kind");
        report(
            &runtime_tx,
            item.id,
            WorkOutcome::Failed(format!("no worker registered for kind '{}'", item.kind)),
        )
        .await;
        return;
    };

    let _permit = tokio::select! {
        permit = permits.acquire_owned() => match permit {
            Ok(p) => p,
            Err(_) => {
                report(
                    &runtime_tx,
                    id,
                    WorkOutcome::Failed("executor pool closed".to_string()),
                )
                .await;
                return;
            }
        },
        _ = &mut abort_rx => {
            debug!(item = %id, "item aborted while waiting for a worker slot");
            return;
        }
    };

    info!(item = %id, chain = %item.chain_name, kind = %item.kind, "starting work body");

    let ctx = WorkContext {
        id,
        chain_name: item.chain_name.clone(),
        kind: item.kind.clone(),
        input: item.input,
    };
    let mut body = tokio::spawn(async move { worker.do_work(ctx).await });

    tokio::select! {
        joined = &mut body => {
            report(&runtime_tx, id, outcome_of_join(joined, &item.kind, id)).await;
        }

        abort = &mut abort_rx => {
            match abort {
                Ok(()) => {
                    info!(item = %id, "aborting in-flight work body");
                    body.abort();
                }
                Err(_) => {
                    // Executor loop dropped us; let the body finish and report.
                    debug!(item = %id, "abort channel closed without explicit abort");
                    let joined = body.await;
                    report(&runtime_tx, id, outcome_of_join(joined, &item.kind, id)).await;
                }
            }
        }
    }
}

fn outcome_of_join(
    joined: Result<anyhow::Result<Data>, JoinError>,
    kind: &str,
    id: ItemId,
) -> WorkOutcome {
    match joined {
        Ok(Ok(output)) => {
            info!(item = %id, kind = %kind, "work body succeeded");
            WorkOutcome::Succeeded(output)
        }
        Ok(Err(err)) => {
            let reason = format!("{err:#}");
            warn!(item = %id, kind = %kind, error = %reason, "work body failed");
            WorkOutcome::Failed(reason)
        }
        Err(join_err) => {
            error!(item = %id, kind = %kind, error = %join_err, "work body panicked");
            WorkOutcome::Failed(format!("work body panicked: {join_err}"))
        }
    }
}

async fn report(runtime_tx: &mpsc::Sender<RuntimeEvent>, id: ItemId, outcome: WorkOutcome) {
    if runtime_tx
        .send(RuntimeEvent::ItemCompleted { id, outcome })
        .await
        .is_err()
    {
        debug!(item = %id, "runtime gone; dropping completion");
    }
}
