//! Project-level configuration support
//!
//! Loads per-project configuration from `saferefactor.toml` in the analysed
//! root. Every section and field is optional.
//!
//! # Configuration Format
//!
//! ```toml
//! # saferefactor.toml
//!
//! [gating]
//! threshold = 0.3
//!
//! [rules]
//! accumulation-loop = true
//! nested-conditional = true
//! conditional-chain = true
//! min-chain-length = 3
//!
//! [training]
//! seed = 42
//! n-trees = [50, 100]
//! max-depth = [0, 5]   # 0 = unlimited
//!
//! [model]
//! path = "models/risk_model.json"
//!
//! [exclude]
//! paths = ["migrations/", "**/generated/**"]
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::classifier::{
    HyperparameterGrid, SelectionMetric, SplitCriterion, TrainConfig, TrainedModel,
    DEFAULT_THRESHOLD,
};
use crate::detectors::MIN_CHAIN_ARMS;

/// Config file name looked up in the analysed root
pub const CONFIG_FILE: &str = "saferefactor.toml";

/// Written by `saferefactor init`
pub const EXAMPLE_CONFIG: &str = r#"# saferefactor configuration

[gating]
# Accept a rewrite when its predicted error probability is at or below this
threshold = 0.3

[rules]
accumulation-loop = true
nested-conditional = true
conditional-chain = true
# Minimum number of tests before an if/elif chain is reported
min-chain-length = 3

[training]
seed = 42
validation-split = 0.2
cv-folds = 3
min-examples = 10
selection-metric = "balanced-accuracy"   # accuracy | balanced-accuracy | f1
n-trees = [50, 100]
max-depth = [0, 5]                        # 0 = unlimited
min-samples-split = [2, 5]
criteria = ["gini", "entropy"]

[model]
# Relative paths are resolved against this directory
# path = "models/risk_model.json"

[exclude]
paths = []
"#;

/// Project-level configuration loaded from saferefactor.toml
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub gating: GatingConfig,
    pub rules: RulesConfig,
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub exclude: ExcludeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatingConfig {
    /// Accept iff probability <= threshold (default: 0.3)
    pub threshold: f64,
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Which rules run, and the chain rule's minimum length
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RulesConfig {
    pub accumulation_loop: bool,
    pub nested_conditional: bool,
    pub conditional_chain: bool,
    #[serde(rename = "min-chain-length")]
    pub min_chain_arms: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            accumulation_loop: true,
            nested_conditional: true,
            conditional_chain: true,
            min_chain_arms: MIN_CHAIN_ARMS,
        }
    }
}

/// Training overrides; unset fields keep `TrainConfig` defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TrainingConfig {
    pub seed: Option<u64>,
    pub validation_split: Option<f64>,
    pub cv_folds: Option<usize>,
    pub min_examples: Option<usize>,
    pub selection_metric: Option<SelectionMetric>,
    pub n_trees: Option<Vec<usize>>,
    /// 0 means unlimited depth
    pub max_depth: Option<Vec<usize>>,
    pub min_samples_split: Option<Vec<usize>>,
    pub criteria: Option<Vec<SplitCriterion>>,
}

impl TrainingConfig {
    pub fn train_config(&self) -> TrainConfig {
        let defaults = TrainConfig::default();
        let grid = HyperparameterGrid {
            n_trees: self.n_trees.clone().unwrap_or(defaults.grid.n_trees),
            max_depth: self.max_depth.as_ref().map_or(defaults.grid.max_depth, |depths| {
                depths.iter().map(|&d| (d > 0).then_some(d)).collect()
            }),
            min_samples_split: self
                .min_samples_split
                .clone()
                .unwrap_or(defaults.grid.min_samples_split),
            criteria: self.criteria.clone().unwrap_or(defaults.grid.criteria),
        };
        TrainConfig {
            seed: self.seed.unwrap_or(defaults.seed),
            validation_split: self.validation_split.unwrap_or(defaults.validation_split),
            cv_folds: self.cv_folds.unwrap_or(defaults.cv_folds),
            min_examples: self.min_examples.unwrap_or(defaults.min_examples),
            selection_metric: self.selection_metric.unwrap_or(defaults.selection_metric),
            grid,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: Option<PathBuf>,
}

impl ModelConfig {
    /// Configured model path (relative paths resolved against `root`), or
    /// the per-user default.
    pub fn model_path(&self, root: &Path) -> PathBuf {
        match &self.path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => TrainedModel::default_path(),
        }
    }
}

/// Paths to skip when walking a directory (gitignore-style globs)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExcludeConfig {
    pub paths: Vec<String>,
}

/// Load `saferefactor.toml` from `root`. A missing or broken file yields
/// defaults; a broken one is reported as a warning.
pub fn load_project_config(root: &Path) -> ProjectConfig {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        debug!("No project config found, using defaults");
        return ProjectConfig::default();
    }
    load_config_file(&path)
}

/// Load a specific config file, falling back to defaults on error.
pub fn load_config_file(path: &Path) -> ProjectConfig {
    match load_toml_config(path) {
        Ok(config) => {
            debug!("Loaded project config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Failed to load {}: {}", path.display(), e);
            ProjectConfig::default()
        }
    }
}

fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config)
}
