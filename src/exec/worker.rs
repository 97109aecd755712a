// src/exec/worker.rs

//! Work bodies and the registry that maps item kinds to them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::work::{Data, ItemId};

/// Everything a work body gets to see about the item it runs.
///
/// `input` is the item's own copy; bodies never share mutable state through
/// it.
#[derive(Debug, Clone)]
pub struct WorkContext {
    pub id: ItemId,
    pub chain_name: String,
    pub kind: String,
    pub input: Data,
}

/// Boxed future returned by [`Worker::do_work`].
pub type WorkFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Data>> + Send + 'a>>;

/// The executable body behind one item kind.
///
/// Returning `Ok(output)` marks the item `Succeeded`; any `Err` marks it
/// `Failed`. The engine invokes a body at most once per item and never
/// retries.
pub trait Worker: Send + Sync {
    fn do_work(&self, ctx: WorkContext) -> WorkFuture<'_>;
}

/// Adapter that turns an async closure into a [`Worker`].
pub struct FnWorker<F>(F);

impl<F, Fut> Worker for FnWorker<F>
where
    F: Fn(WorkContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Data>> + Send + 'static,
{
    fn do_work(&self, ctx: WorkContext) -> WorkFuture<'_> {
        Box::pin((self.0)(ctx))
    }
}

/// Wrap a closure returning a future as a [`Worker`].
pub fn worker_fn<F, Fut>(f: F) -> FnWorker<F>
where
    F: Fn(WorkContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Data>> + Send + 'static,
{
    FnWorker(f)
}

/// Maps item kinds (e.g. `"blur"`) to their work bodies.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<dyn Worker>>,
}

impl fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.workers.keys().collect();
        kinds.sort();
        f.debug_struct("WorkerRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with(mut self, kind: impl Into<String>, worker: impl Worker + 'static) -> Self {
        self.register(kind, worker);
        self
    }

    pub fn register(&mut self, kind: impl Into<String>, worker: impl Worker + 'static) {
        self.workers.insert(kind.into(), Arc::new(worker));
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(kind).cloned()
    }
}
