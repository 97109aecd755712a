// src/status/bus.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace};

use crate::status::snapshot::{ItemStatus, StatusFilter, StatusSnapshot};
use crate::work::ItemId;

/// A sequenced change published on the bus.
#[derive(Debug, Clone)]
struct StatusEvent {
    seq: u64,
    change: StatusChange,
}

#[derive(Debug, Clone)]
enum StatusChange {
    Updated(ItemStatus),
    Removed(Vec<ItemId>),
}

#[derive(Debug, Default)]
struct StatusTable {
    /// Sequence number of the last applied change.
    seq: u64,
    items: BTreeMap<ItemId, ItemStatus>,
}

#[derive(Debug)]
struct BusInner {
    table: Mutex<StatusTable>,
    tx: broadcast::Sender<StatusEvent>,
}

impl BusInner {
    fn lock(&self) -> MutexGuard<'_, StatusTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, filter: &StatusFilter) -> (BTreeMap<ItemId, ItemStatus>, u64) {
        let table = self.lock();
        let items = table
            .items
            .iter()
            .filter(|(_, s)| filter.matches(s))
            .map(|(id, s)| (*id, s.clone()))
            .collect();
        (items, table.seq)
    }
}

/// Publishes item state changes to any number of independent observers.
///
/// The bus keeps the latest status of every known item. Each change is
/// stamped with a sequence number and broadcast; observers apply changes to
/// their own filtered view. A lagging observer never slows the publisher: it
/// skips ahead by re-reading the table, so it sees the latest snapshot
/// instead of every intermediate one.
#[derive(Debug, Clone)]
pub struct StatusBus {
    inner: Arc<BusInner>,
}

impl StatusBus {
    /// `buffer` is the number of changes each observer may fall behind
    /// before it is coalesced.
    pub fn new(buffer: usize) -> Self {
        let (tx, _rx) = broadcast::channel(buffer.max(1));
        Self {
            inner: Arc::new(BusInner {
                table: Mutex::new(StatusTable::default()),
                tx,
            }),
        }
    }

    /// Record and broadcast status changes, in order.
    pub fn publish(&self, changes: impl IntoIterator<Item = ItemStatus>) {
        let mut table = self.inner.lock();
        for status in changes {
            table.seq += 1;
            trace!(item = %status.id, state = %status.state, seq = table.seq, "publishing status");
            table.items.insert(status.id, status.clone());
            // No receivers is fine.
            let _ = self.inner.tx.send(StatusEvent {
                seq: table.seq,
                change: StatusChange::Updated(status),
            });
        }
    }

    /// Forget items (retention pruning).
    pub fn remove(&self, ids: Vec<ItemId>) {
        if ids.is_empty() {
            return;
        }
        let mut table = self.inner.lock();
        for id in ids.iter() {
            table.items.remove(id);
        }
        table.seq += 1;
        debug!(removed = ids.len(), seq = table.seq, "pruned item statuses");
        let _ = self.inner.tx.send(StatusEvent {
            seq: table.seq,
            change: StatusChange::Removed(ids),
        });
    }

    /// One-shot query.
    pub fn snapshot(&self, filter: &StatusFilter) -> StatusSnapshot {
        let (items, _) = self.inner.read(filter);
        StatusSnapshot::new(items.into_values().collect())
    }

    /// Start a live feed for `filter`.
    ///
    /// The first call to [`StatusFeed::next`] yields the current snapshot.
    pub fn observe(&self, filter: StatusFilter) -> StatusFeed {
        // Subscribe while holding the table lock so no change falls between
        // the snapshot and the first received event.
        let table = self.inner.lock();
        let rx = self.inner.tx.subscribe();
        let view = table
            .items
            .iter()
            .filter(|(_, s)| filter.matches(s))
            .map(|(id, s)| (*id, s.clone()))
            .collect();
        let seen_seq = table.seq;
        drop(table);

        StatusFeed {
            filter,
            bus: Arc::downgrade(&self.inner),
            rx,
            view,
            seen_seq,
            initial_pending: true,
        }
    }
}

/// Live, ordered sequence of snapshots for one filter.
///
/// Holds only a weak reference to the bus; once the work manager shuts down
/// the feed ends.
#[derive(Debug)]
pub struct StatusFeed {
    filter: StatusFilter,
    bus: Weak<BusInner>,
    rx: broadcast::Receiver<StatusEvent>,
    view: BTreeMap<ItemId, ItemStatus>,
    seen_seq: u64,
    initial_pending: bool,
}

impl StatusFeed {
    pub fn filter(&self) -> &StatusFilter {
        &self.filter
    }

    /// The feed's current view, without waiting.
    pub fn current(&self) -> StatusSnapshot {
        StatusSnapshot::new(self.view.values().cloned().collect())
    }

    /// Wait for the next snapshot. Returns `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<StatusSnapshot> {
        if self.initial_pending {
            self.initial_pending = false;
            return Some(self.current());
        }

        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if event.seq <= self.seen_seq {
                        continue;
                    }
                    self.seen_seq = event.seq;
                    if self.apply(event.change) {
                        return Some(self.current());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(
                        filter = ?self.filter,
                        skipped,
                        "status feed lagged; coalescing to latest"
                    );
                    let bus = self.bus.upgrade()?;
                    let (view, seq) = bus.read(&self.filter);
                    self.view = view;
                    self.seen_seq = seq;
                    return Some(self.current());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait until a snapshot satisfies `pred`, returning it.
    pub async fn wait_for(
        &mut self,
        mut pred: impl FnMut(&StatusSnapshot) -> bool,
    ) -> Option<StatusSnapshot> {
        loop {
            let snapshot = self.next().await?;
            if pred(&snapshot) {
                return Some(snapshot);
            }
        }
    }

    fn apply(&mut self, change: StatusChange) -> bool {
        match change {
            StatusChange::Updated(status) => {
                if !self.filter.matches(&status) {
                    return false;
                }
                self.view.insert(status.id, status);
                true
            }
            StatusChange::Removed(ids) => {
                let before = self.view.len();
                for id in ids {
                    self.view.remove(&id);
                }
                before != self.view.len()
            }
        }
    }
}
