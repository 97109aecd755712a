use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use workchain::engine::{RuntimeEvent, WorkOutcome};
use workchain::errors::WorkchainError;
use workchain::exec::{BackendFuture, ExecutorBackend};
use workchain::work::{Data, ItemId, ScheduledItem};

/// A fake executor that:
/// - records which item kinds were dispatched
/// - immediately reports ItemCompleted for each dispatched item, failing the
///   kinds listed in `failing` and succeeding the rest with `{ "<kind>": id }`
///   merged over the item's input.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, kind: &str) -> Self {
        self.failing.insert(kind.to_string());
        self
    }

    fn outcome_for(&self, item: &ScheduledItem) -> WorkOutcome {
        if self.failing.contains(&item.kind) {
            return WorkOutcome::Failed(format!("{} failed", item.kind));
        }
        let mut output = item.input.clone();
        output.merge_from(&Data::new().with(item.kind.clone(), item.id.as_u64() as i64));
        WorkOutcome::Succeeded(output)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_items(&mut self, items: Vec<ScheduledItem>) -> BackendFuture<'_> {
        let completions: Vec<(ItemId, WorkOutcome)> = items
            .iter()
            .map(|item| (item.id, self.outcome_for(item)))
            .collect();
        {
            let mut guard = self.executed.lock().unwrap();
            guard.extend(items.iter().map(|i| i.kind.clone()));
        }
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            for (id, outcome) in completions {
                tx.send(RuntimeEvent::ItemCompleted { id, outcome })
                    .await
                    .map_err(|_| WorkchainError::EngineStopped)?;
            }
            Ok(())
        })
    }

    fn abort_items(&mut self, _ids: Vec<ItemId>) -> BackendFuture<'_> {
        // Items complete as soon as they are spawned; nothing is in flight.
        Box::pin(async { Ok(()) })
    }
}
