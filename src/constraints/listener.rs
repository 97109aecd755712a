// src/constraints/listener.rs

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::work::ConstraintEvaluator;

/// Forward constraint changes from `evaluator` into the runtime.
///
/// The subscription is taken before this function returns, so no change
/// published after it can be missed. If the listener falls behind, it asks
/// the runtime to re-evaluate every blocked item instead.
pub fn spawn_constraint_listener(
    evaluator: Arc<dyn ConstraintEvaluator>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> JoinHandle<()> {
    let mut rx = evaluator.subscribe();

    tokio::spawn(async move {
        debug!("constraint listener started");

        loop {
            let event = match rx.recv().await {
                Ok(change) => {
                    debug!(
                        constraint = %change.constraint,
                        satisfied = change.satisfied,
                        "forwarding constraint change"
                    );
                    RuntimeEvent::ConstraintChanged(Some(change.constraint))
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "constraint listener lagged; re-evaluating all blocked items");
                    RuntimeEvent::ConstraintChanged(None)
                }
                Err(RecvError::Closed) => break,
            };

            if runtime_tx.send(event).await.is_err() {
                break;
            }
        }

        info!("constraint listener finished");
    })
}
