#![allow(dead_code)]

use std::sync::Arc;

use workchain::chain::{ChainSpec, ExistingChainPolicy, Stage};
use workchain::config::EngineSettings;
use workchain::constraints::ConstraintBoard;
use workchain::work::{Constraint, ConstraintEvaluator, WorkRequest};

/// One stage with a plain request per kind.
pub fn stage(kinds: &[&str]) -> Stage {
    kinds.iter().map(|k| WorkRequest::new(*k)).collect()
}

/// Finalized chain where each inner slice is one stage.
pub fn chain_spec(name: &str, policy: ExistingChainPolicy, stages: &[&[&str]]) -> ChainSpec {
    let stages = stages.iter().map(|kinds| stage(kinds)).collect();
    ChainSpec::new(name, policy, stages).expect("Failed to build valid chain spec")
}

/// Board with every well-known constraint satisfied.
pub fn satisfied_board() -> Arc<ConstraintBoard> {
    board_with(&[
        (Constraint::Charging, true),
        (Constraint::BatteryNotLow, true),
        (Constraint::StorageNotLow, true),
        (Constraint::DeviceIdle, true),
        (Constraint::NetworkConnected, true),
    ])
}

/// Board seeded with explicit values; anything else is unsatisfied.
pub fn board_with(values: &[(Constraint, bool)]) -> Arc<ConstraintBoard> {
    Arc::new(ConstraintBoard::with_values(values.iter().cloned()))
}

/// Upcast a board for APIs that take the evaluator trait object.
pub fn evaluator(board: &Arc<ConstraintBoard>) -> Arc<dyn ConstraintEvaluator> {
    board.clone()
}

/// Engine settings with small buffers and a fixed pool size.
pub fn settings(max_workers: usize) -> EngineSettings {
    EngineSettings {
        max_workers,
        event_buffer: 16,
        status_buffer: 64,
        retained_chains: 8,
    }
}
