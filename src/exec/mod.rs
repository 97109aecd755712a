// src/exec/mod.rs

//! Work execution layer.
//!
//! This module is responsible for actually running the bodies behind each
//! item kind and reporting back to the runtime via `RuntimeEvent`s.
//!
//! - [`worker`] defines the `Worker` trait (the executable body) and the
//!   `WorkerRegistry` that maps item kinds to bodies.
//! - [`executor_loop`] owns the loop that tracks dispatched items.
//! - [`item_runner`] runs one body, honouring pool bounds and aborts.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `PoolExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod executor_loop;
pub mod item_runner;
pub mod worker;

pub use backend::{BackendFuture, ExecutorBackend, PoolExecutorBackend};
pub use executor_loop::spawn_executor;
pub use worker::{FnWorker, WorkContext, WorkFuture, Worker, WorkerRegistry, worker_fn};
