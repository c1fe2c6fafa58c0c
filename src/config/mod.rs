//! Configuration module
//!
//! This module handles:
//! - Project-level configuration (saferefactor.toml)
//! - Rule toggles and gating threshold
//! - Training and model-location overrides

mod project_config;

pub use project_config::{
    load_config_file, load_project_config, ExcludeConfig, GatingConfig, ModelConfig,
    ProjectConfig, RulesConfig, TrainingConfig, CONFIG_FILE, EXAMPLE_CONFIG,
};
