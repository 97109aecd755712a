#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use workchain::exec::{WorkContext, WorkFuture, Worker};
use workchain::work::Data;

/// Records `kind` on every run and echoes its input back with
/// `{ "<kind>_runs": n }` added.
#[derive(Clone, Default)]
pub struct RecordingWorker {
    pub log: Arc<Mutex<Vec<String>>>,
    pub delay: Duration,
}

impl RecordingWorker {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            log,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn run(&self, ctx: WorkContext) -> anyhow::Result<Data> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let runs = {
            let mut log = self.log.lock().unwrap();
            log.push(ctx.kind.clone());
            log.iter().filter(|k| **k == ctx.kind).count()
        };
        Ok(ctx.input.with(format!("{}_runs", ctx.kind), runs as i64))
    }
}

impl Worker for RecordingWorker {
    fn do_work(&self, ctx: WorkContext) -> WorkFuture<'_> {
        Box::pin(self.run(ctx))
    }
}

/// Always fails with `reason`.
#[derive(Clone)]
pub struct FailingWorker {
    pub reason: String,
}

impl FailingWorker {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl Worker for FailingWorker {
    fn do_work(&self, _ctx: WorkContext) -> WorkFuture<'_> {
        let reason = self.reason.clone();
        Box::pin(async move { Err(anyhow::anyhow!(reason)) })
    }
}

/// Holds every run until `gate` is notified, counting concurrent runs.
#[derive(Clone, Default)]
pub struct GatedWorker {
    pub gate: Arc<Notify>,
    pub running: Arc<Mutex<usize>>,
    pub peak: Arc<Mutex<usize>>,
}

impl GatedWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        *self.running.lock().unwrap()
    }

    pub fn peak(&self) -> usize {
        *self.peak.lock().unwrap()
    }

    async fn run(&self, ctx: WorkContext) -> anyhow::Result<Data> {
        {
            let mut running = self.running.lock().unwrap();
            *running += 1;
            let mut peak = self.peak.lock().unwrap();
            *peak = (*peak).max(*running);
        }
        self.gate.notified().await;
        *self.running.lock().unwrap() -= 1;
        Ok(ctx.input)
    }
}

impl Worker for GatedWorker {
    fn do_work(&self, ctx: WorkContext) -> WorkFuture<'_> {
        Box::pin(self.run(ctx))
    }
}
