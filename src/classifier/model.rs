//! Trained regression-risk model
//!
//! A `TrainedModel` wraps a fitted random forest together with everything
//! needed to use it safely later: the feature-mapping version it was fit on,
//! the selected hyperparameters, the seed and its validation metrics. It is
//! immutable once built and can be shared across threads.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::features::{FeatureVector, FEATURE_NAMES, FEATURE_VERSION};
use super::forest::{ForestParams, RandomForest};
use super::metrics::EvaluationMetrics;
use crate::errors::ModelError;

/// Default model file name
pub const MODEL_FILE: &str = "risk_model.json";

/// Anything that can turn a feature vector into an error probability.
pub trait RiskClassifier: Send + Sync {
    /// Probability in [0, 1] that the rewrite introduces an error.
    fn predict(&self, features: &FeatureVector) -> f64;

    /// Feature-mapping version this classifier expects.
    fn feature_version(&self) -> u32;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub feature_version: u32,
    pub feature_names: Vec<String>,
    pub params: ForestParams,
    /// Base seed passed to the training run
    pub seed: u64,
    /// Seed the final forest was fit with, derived from `seed` and the
    /// index of the selected trial
    pub forest_seed: u64,
    /// Metrics on the held-out validation partition
    pub validation: EvaluationMetrics,
    /// Mean cross-validation score of the selected parameters
    pub cv_score: f64,
    pub training_examples: usize,
    pub trained_at: DateTime<Utc>,
    forest: RandomForest,
}

impl TrainedModel {
    pub fn new(
        forest: RandomForest,
        seed: u64,
        forest_seed: u64,
        validation: EvaluationMetrics,
        cv_score: f64,
        training_examples: usize,
    ) -> Self {
        Self {
            feature_version: FEATURE_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            params: *forest.params(),
            seed,
            forest_seed,
            validation,
            cv_score,
            training_examples,
            trained_at: Utc::now(),
            forest,
        }
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode a model, refusing one fit on another feature mapping.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: TrainedModel = serde_json::from_slice(bytes)?;
        if model.feature_version != FEATURE_VERSION {
            return Err(ModelError::FeatureVersion {
                expected: FEATURE_VERSION,
                found: model.feature_version,
            });
        }
        if model.forest.num_features() != model.feature_names.len() {
            return Err(ModelError::Corrupt(format!(
                "forest uses {} features but {} names are recorded",
                model.forest.num_features(),
                model.feature_names.len()
            )));
        }
        model.forest.validate().map_err(ModelError::Corrupt)?;
        Ok(model)
    }

    /// Write the model, creating parent directories as needed. The file is
    /// written to a sibling temp path first so a failed save never leaves a
    /// half-written model behind.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let io_err = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let bytes = self.to_bytes()?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// `<data_dir>/saferefactor/risk_model.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("saferefactor")
            .join(MODEL_FILE)
    }
}

impl RiskClassifier for TrainedModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        self.forest.predict_proba(features.as_slice()).clamp(0.0, 1.0)
    }

    fn feature_version(&self) -> u32 {
        self.feature_version
    }
}
