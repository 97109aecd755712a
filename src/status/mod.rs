// src/status/mod.rs

//! Status publication.
//!
//! - [`snapshot`] defines the per-item status view, filters and snapshots.
//! - [`bus`] holds the status table and the multi-subscriber live feeds.

pub mod bus;
pub mod snapshot;

pub use bus::{StatusBus, StatusFeed};
pub use snapshot::{ItemStatus, StatusFilter, StatusSnapshot, outcome_of};
