// src/work/constraint.rs

//! Named execution constraints and the evaluator contract.

use std::fmt;
use std::str::FromStr;

use tokio::sync::broadcast;

/// A named external condition that must hold before an item may run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constraint {
    /// Device is connected to power.
    Charging,
    BatteryNotLow,
    StorageNotLow,
    DeviceIdle,
    NetworkConnected,
    /// Any other condition, identified by name.
    Custom(String),
}

impl Constraint {
    pub fn name(&self) -> &str {
        match self {
            Constraint::Charging => "charging",
            Constraint::BatteryNotLow => "battery_not_low",
            Constraint::StorageNotLow => "storage_not_low",
            Constraint::DeviceIdle => "device_idle",
            Constraint::NetworkConnected => "network",
            Constraint::Custom(name) => name,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Constraint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "" => Err("constraint name must not be empty".to_string()),
            "charging" | "power" => Ok(Constraint::Charging),
            "battery_not_low" => Ok(Constraint::BatteryNotLow),
            "storage_not_low" => Ok(Constraint::StorageNotLow),
            "device_idle" | "idle" => Ok(Constraint::DeviceIdle),
            "network" | "network_connected" => Ok(Constraint::NetworkConnected),
            _ => Ok(Constraint::Custom(normalized)),
        }
    }
}

/// A single edge-triggered change in a constraint's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintChange {
    pub constraint: Constraint,
    pub satisfied: bool,
}

/// Source of truth for constraint values.
///
/// The scheduler queries `is_satisfied` synchronously when an item becomes
/// ready, and re-queries blocked items whenever a change is published on the
/// stream returned by `subscribe`.
pub trait ConstraintEvaluator: Send + Sync + fmt::Debug {
    fn is_satisfied(&self, constraint: &Constraint) -> bool;

    /// Stream of changes for every constraint this evaluator knows about.
    fn subscribe(&self) -> broadcast::Receiver<ConstraintChange>;
}
