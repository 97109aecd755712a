// src/config/mod.rs

//! Configuration loading and validation for workchain.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate engine settings, constraint names and chain layout
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    ChainConfig, ConfigFile, EngineSettings, ItemConfig, RawConfigFile, StageConfig,
};
