// src/work/mod.rs

//! Work item data model.
//!
//! - [`data`] holds the key/value payloads passed between items.
//! - [`item`] defines requests, items, ids and the item state machine.
//! - [`constraint`] names the external conditions that gate execution.

pub mod constraint;
pub mod data;
pub mod item;

pub use constraint::{Constraint, ConstraintChange, ConstraintEvaluator};
pub use data::{Data, Value};
pub use item::{ItemId, ScheduledItem, WorkItem, WorkRequest, WorkState};
