// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::chain::{ExistingChainPolicy, Stage};
use crate::errors::{Result, WorkchainError};
use crate::work::{Constraint, Data, WorkRequest};

/// Configuration file as deserialized from TOML, before validation.
///
/// ```toml
/// [config]
/// max_workers = 4
///
/// [constraints]
/// charging = false
/// storage_not_low = true
///
/// [chain]
/// name = "image_manipulation_work"
/// policy = "replace"
///
/// [[chain.stage]]
/// items = [{ kind = "cleanup" }]
///
/// [[chain.stage]]
/// items = [{ kind = "blur", input = { image_uri = "file:///tmp/in.png" } }]
///
/// [[chain.stage]]
/// items = [{ kind = "save", tags = ["OUTPUT"], constraints = ["charging"] }]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Engine tuning from `[config]`.
    #[serde(default)]
    pub config: EngineSettings,

    /// Initial constraint values from `[constraints]`, keyed by name.
    #[serde(default)]
    pub constraints: BTreeMap<String, bool>,

    /// Optional chain to run, from `[chain]`.
    #[serde(default)]
    pub chain: Option<ChainConfig>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see
/// `config::validate`) or `Default`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub config: EngineSettings,
    pub constraints: BTreeMap<Constraint, bool>,
    pub chain: Option<ChainConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: EngineSettings,
        constraints: BTreeMap<Constraint, bool>,
        chain: Option<ChainConfig>,
    ) -> Self {
        Self {
            config,
            constraints,
            chain,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Maximum number of work bodies running at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Capacity of the runtime event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// How many status changes an observer may fall behind before its feed
    /// is coalesced to the latest snapshot.
    #[serde(default = "default_status_buffer")]
    pub status_buffer: usize,

    /// Number of finished chains whose items remain queryable.
    #[serde(default = "default_retained_chains")]
    pub retained_chains: usize,
}

fn default_max_workers() -> usize {
    4
}

fn default_event_buffer() -> usize {
    64
}

fn default_status_buffer() -> usize {
    256
}

fn default_retained_chains() -> usize {
    16
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            event_buffer: default_event_buffer(),
            status_buffer: default_status_buffer(),
            retained_chains: default_retained_chains(),
        }
    }
}

/// `[chain]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub name: String,

    #[serde(default)]
    pub policy: ExistingChainPolicy,

    /// `[[chain.stage]]` entries, in order.
    #[serde(default, rename = "stage")]
    pub stages: Vec<StageConfig>,
}

impl ChainConfig {
    /// Convert into builder stages.
    pub fn to_stages(&self) -> Result<Vec<Stage>> {
        self.stages
            .iter()
            .map(|stage| {
                stage
                    .items
                    .iter()
                    .map(ItemConfig::to_request)
                    .collect::<Result<Vec<_>>>()
                    .map(Stage::new)
            })
            .collect()
    }
}

/// One `[[chain.stage]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    #[serde(default)]
    pub items: Vec<ItemConfig>,
}

/// One item inside a stage.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemConfig {
    /// Which registered work body runs this item.
    pub kind: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Constraint names, e.g. `["charging", "storage_not_low"]`.
    #[serde(default)]
    pub constraints: Vec<String>,

    #[serde(default)]
    pub input: Data,
}

impl ItemConfig {
    pub fn to_request(&self) -> Result<WorkRequest> {
        let mut request = WorkRequest::new(self.kind.clone()).with_input(self.input.clone());
        for tag in self.tags.iter() {
            request = request.with_tag(tag.clone());
        }
        for name in self.constraints.iter() {
            let constraint = name
                .parse::<Constraint>()
                .map_err(WorkchainError::ConfigError)?;
            request = request.with_constraint(constraint);
        }
        Ok(request)
    }
}
