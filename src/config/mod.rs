// src/config/mod.rs

//! Configuration loading and validation for assetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate references, directories and graph acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    AssetPaths, CleanConfig, Combinator, ConfigFile, ConfigSection, ModeConfig,
    ModesSection, RawConfigFile, ServerSection, StepConfig, TaskConfig, TransformSpec,
    WatchRuleConfig, ASSET_CLASSES,
};
