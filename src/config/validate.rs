// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ChainConfig, ConfigFile, EngineSettings, RawConfigFile};
use crate::errors::{Result, WorkchainError};
use crate::work::Constraint;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WorkchainError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_engine_settings(&raw.config)?;
        let constraints = parse_constraints(&raw.constraints)?;
        if let Some(chain) = raw.chain.as_ref() {
            validate_chain(chain)?;
        }
        Ok(ConfigFile::new_unchecked(raw.config, constraints, raw.chain))
    }
}

fn validate_engine_settings(settings: &EngineSettings) -> Result<()> {
    for (field, value) in [
        ("max_workers", settings.max_workers),
        ("event_buffer", settings.event_buffer),
        ("status_buffer", settings.status_buffer),
        ("retained_chains", settings.retained_chains),
    ] {
        if value == 0 {
            return Err(WorkchainError::ConfigError(format!(
                "[config].{field} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn parse_constraints(raw: &BTreeMap<String, bool>) -> Result<BTreeMap<Constraint, bool>> {
    raw.iter()
        .map(|(name, value)| {
            let constraint = name.parse::<Constraint>().map_err(|e| {
                WorkchainError::ConfigError(format!("[constraints].{name}: {e}"))
            })?;
            Ok((constraint, *value))
        })
        .collect()
}

fn validate_chain(chain: &ChainConfig) -> Result<()> {
    if chain.name.trim().is_empty() {
        return Err(WorkchainError::ConfigError(
            "[chain].name must not be empty".to_string(),
        ));
    }

    if chain.stages.is_empty() {
        return Err(WorkchainError::ConfigError(format!(
            "chain '{}' must contain at least one [[chain.stage]]",
            chain.name
        )));
    }

    for (idx, stage) in chain.stages.iter().enumerate() {
        if stage.items.is_empty() {
            return Err(WorkchainError::ConfigError(format!(
                "chain '{}': stage {idx} has no items",
                chain.name
            )));
        }
        for item in stage.items.iter() {
            if item.kind.trim().is_empty() {
                return Err(WorkchainError::ConfigError(format!(
                    "chain '{}': stage {idx} has an item with an empty kind",
                    chain.name
                )));
            }
            for name in item.constraints.iter() {
                name.parse::<Constraint>().map_err(|e| {
                    WorkchainError::ConfigError(format!(
                        "chain '{}': stage {idx} item '{}': {e}",
                        chain.name, item.kind
                    ))
                })?;
            }
        }
    }

    Ok(())
}
