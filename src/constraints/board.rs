// src/constraints/board.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::work::{Constraint, ConstraintChange, ConstraintEvaluator};

/// In-memory constraint evaluator.
///
/// Values are set by whatever senses the environment (a platform
/// integration, the demo CLI, a test). Only actual value changes are
/// broadcast, so subscribers see edges, not repeated levels. Constraints
/// that were never set are unsatisfied.
pub struct ConstraintBoard {
    values: RwLock<HashMap<Constraint, bool>>,
    tx: broadcast::Sender<ConstraintChange>,
}

impl fmt::Debug for ConstraintBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ConstraintBoard")
            .field("values", &*values)
            .finish()
    }
}

impl Default for ConstraintBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintBoard {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            values: RwLock::new(HashMap::new()),
            tx,
        }
    }

    /// Seed initial values without broadcasting.
    pub fn with_values(values: impl IntoIterator<Item = (Constraint, bool)>) -> Self {
        let board = Self::new();
        {
            let mut map = board.values.write().unwrap_or_else(PoisonError::into_inner);
            map.extend(values);
        }
        board
    }

    /// Set a constraint's value. Returns `true` if the value changed (and a
    /// change was broadcast).
    pub fn set(&self, constraint: Constraint, satisfied: bool) -> bool {
        let mut map = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let previous = map.insert(constraint.clone(), satisfied).unwrap_or(false);
        if previous == satisfied {
            debug!(%constraint, satisfied, "constraint unchanged");
            return false;
        }

        info!(%constraint, satisfied, "constraint changed");
        // Broadcast while holding the write lock so changes are ordered.
        let _ = self.tx.send(ConstraintChange {
            constraint,
            satisfied,
        });
        true
    }

    pub fn satisfy(&self, constraint: Constraint) -> bool {
        self.set(constraint, true)
    }

    pub fn unsatisfy(&self, constraint: Constraint) -> bool {
        self.set(constraint, false)
    }
}

impl ConstraintEvaluator for ConstraintBoard {
    fn is_satisfied(&self, constraint: &Constraint) -> bool {
        let map = self.values.read().unwrap_or_else(PoisonError::into_inner);
        map.get(constraint).copied().unwrap_or(false)
    }

    fn subscribe(&self) -> broadcast::Receiver<ConstraintChange> {
        self.tx.subscribe()
    }
}
