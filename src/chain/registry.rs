// src/chain/registry.rs

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::chain::{ChainId, ChainRef};

/// What to do when a chain is submitted under a name that is already active.
///
/// - `Replace`: cancel every non-terminal item of the existing chain, then
///   register the new one (default, matches the image pipeline).
/// - `Keep`: discard the new chain and keep the existing one running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingChainPolicy {
    #[default]
    Replace,
    #[serde(alias = "keep_existing")]
    Keep,
}

impl FromStr for ExistingChainPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(ExistingChainPolicy::Replace),
            "keep" | "keep_existing" => Ok(ExistingChainPolicy::Keep),
            other => Err(format!(
                "invalid chain policy: {other} (expected \"replace\" or \"keep\")"
            )),
        }
    }
}

/// Decision taken by the registry for an incoming chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// No active chain under this name; register directly.
    Register,
    /// Cancel the given active chain first, then register.
    Replace(ChainRef),
    /// Keep the given active chain and drop the incoming one.
    Keep(ChainRef),
}

/// Maps chain names to the single active chain registered under each.
///
/// The registry only tracks names; cancelling items of a replaced chain is
/// the scheduler's job, driven by the [`Admission`] returned here.
#[derive(Debug, Default)]
pub struct UniqueChainRegistry {
    active: HashMap<String, ChainRef>,
}

impl UniqueChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active(&self, name: &str) -> Option<&ChainRef> {
        self.active.get(name)
    }

    /// Decide how to admit a chain named `name` under `policy`.
    pub fn admit(&self, name: &str, policy: ExistingChainPolicy) -> Admission {
        match (self.active.get(name), policy) {
            (None, _) => Admission::Register,
            (Some(existing), ExistingChainPolicy::Replace) => {
                debug!(chain = %name, existing = %existing.id, "replacing active chain");
                Admission::Replace(existing.clone())
            }
            (Some(existing), ExistingChainPolicy::Keep) => {
                debug!(chain = %name, existing = %existing.id, "keeping active chain");
                Admission::Keep(existing.clone())
            }
        }
    }

    /// Register `chain` as the active chain for its name.
    ///
    /// Callers must have released any previous holder of the name first.
    pub fn register(&mut self, chain: ChainRef) {
        if let Some(prev) = self.active.insert(chain.name.clone(), chain) {
            tracing::warn!(
                chain = %prev.name,
                previous = %prev.id,
                "registered over a chain that was still active"
            );
        }
    }

    /// Release `name` if it is still held by chain `id`.
    ///
    /// Returns `true` if the entry was removed.
    pub fn release(&mut self, name: &str, id: ChainId) -> bool {
        match self.active.get(name) {
            Some(current) if current.id == id => {
                self.active.remove(name);
                debug!(chain = %name, chain_id = %id, "released chain name");
                true
            }
            _ => false,
        }
    }
}
