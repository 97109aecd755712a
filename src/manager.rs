// src/manager.rs

//! The service object callers use to submit, cancel and observe chains.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chain::{ChainBuilder, ChainSpec, ExistingChainPolicy, Stage, SubmitOutcome};
use crate::config::EngineSettings;
use crate::constraints::spawn_constraint_listener;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, Scheduler};
use crate::errors::{Result, WorkchainError};
use crate::exec::{ExecutorBackend, PoolExecutorBackend, WorkerRegistry};
use crate::status::{StatusBus, StatusFeed, StatusFilter, StatusSnapshot};
use crate::work::ConstraintEvaluator;

/// Handle to a running engine.
///
/// Constructed with explicit dependencies and owned by the host; call
/// [`shutdown`](Self::shutdown) to stop it. Must be started from inside a
/// Tokio runtime.
pub struct WorkManager {
    tx: mpsc::Sender<RuntimeEvent>,
    bus: StatusBus,
    runtime: JoinHandle<Result<()>>,
    listener: JoinHandle<()>,
}

impl fmt::Debug for WorkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkManager")
            .field("running", &!self.runtime.is_finished())
            .finish_non_exhaustive()
    }
}

impl WorkManager {
    /// Start an engine that runs `workers` on the bounded pool.
    pub fn start(
        settings: &EngineSettings,
        workers: WorkerRegistry,
        evaluator: Arc<dyn ConstraintEvaluator>,
    ) -> Self {
        let max_workers = settings.max_workers;
        Self::start_with(settings, evaluator, move |tx| {
            PoolExecutorBackend::new(workers, max_workers, tx)
        })
    }

    /// Start an engine with a custom executor backend.
    ///
    /// `make_executor` receives the sender the backend must use to report
    /// `RuntimeEvent::ItemCompleted`.
    pub fn start_with<E, F>(
        settings: &EngineSettings,
        evaluator: Arc<dyn ConstraintEvaluator>,
        make_executor: F,
    ) -> Self
    where
        E: ExecutorBackend + 'static,
        F: FnOnce(mpsc::Sender<RuntimeEvent>) -> E,
    {
        let (tx, rx) = mpsc::channel::<RuntimeEvent>(settings.event_buffer.max(1));
        let bus = StatusBus::new(settings.status_buffer);

        let executor = make_executor(tx.clone());
        let listener = spawn_constraint_listener(Arc::clone(&evaluator), tx.clone());

        let scheduler = Scheduler::new(evaluator, settings.retained_chains);
        let core = CoreRuntime::new(scheduler);
        let runtime = Runtime::new(core, rx, executor, bus.clone());
        let runtime = tokio::spawn(runtime.run());

        info!(
            max_workers = settings.max_workers,
            retained_chains = settings.retained_chains,
            "work manager started"
        );

        Self {
            tx,
            bus,
            runtime,
            listener,
        }
    }

    /// Begin a uniquely named chain with `first_stage` as its roots.
    pub fn begin_unique_chain(
        &self,
        name: impl Into<String>,
        policy: ExistingChainPolicy,
        first_stage: impl Into<Stage>,
    ) -> ChainBuilder<'_> {
        ChainBuilder::begin(self, name, policy, first_stage)
    }

    /// Hand a finalized chain to the registry.
    ///
    /// Returns once the registry has decided; if an existing chain was
    /// replaced, its cancellation has already been published.
    pub(crate) async fn submit(&self, spec: ChainSpec) -> Result<SubmitOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RuntimeEvent::Submit { spec, reply })
            .await
            .map_err(|_| WorkchainError::EngineStopped)?;
        rx.await.map_err(|_| WorkchainError::EngineStopped)
    }

    /// Cancel the active chain registered under `name`.
    ///
    /// Returns `Ok(false)` if nothing was active under that name.
    pub async fn cancel_unique_chain(&self, name: impl Into<String>) -> Result<bool> {
        let name = name.into();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RuntimeEvent::Cancel {
                name: name.clone(),
                reply,
            })
            .await
            .map_err(|_| WorkchainError::EngineStopped)?;
        let cancelled = rx.await.map_err(|_| WorkchainError::EngineStopped)?;
        if !cancelled {
            debug!(chain = %name, "no active chain to cancel");
        }
        Ok(cancelled)
    }

    /// Live feed of snapshots for `filter`.
    pub fn observe(&self, filter: StatusFilter) -> StatusFeed {
        self.bus.observe(filter)
    }

    /// Current snapshot for `filter`.
    pub fn work_infos(&self, filter: &StatusFilter) -> StatusSnapshot {
        self.bus.snapshot(filter)
    }

    /// Cancel all active chains, stop the runtime and wait for it.
    pub async fn shutdown(self) -> Result<()> {
        info!("work manager shutting down");

        if self.tx.send(RuntimeEvent::ShutdownRequested).await.is_err() {
            warn!("runtime already stopped before shutdown");
        }
        self.listener.abort();

        match self.runtime.await {
            Ok(result) => result,
            Err(join_err) => Err(WorkchainError::Other(anyhow::anyhow!(
                "runtime task failed: {join_err}"
            ))),
        }
    }
}
