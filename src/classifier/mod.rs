//! Regression-risk classifier for rewrite candidates
//!
//! A random forest that estimates the probability that applying a rewrite
//! introduces an error, trained on labeled before/after pairs.
//!
//! ```text
//! (before, after) ─▶ FeatureExtractor ─▶ FeatureVector ─▶ RiskClassifier ─▶ p
//!                                                                           │
//!                                            GatingPolicy (p <= threshold) ◀┘
//! ```
//!
//! The feature mapping is versioned; a model records the version it was fit
//! on and is refused by a build that extracts a different one.

mod dataset;
mod features;
mod forest;
mod gating;
mod metrics;
mod model;
mod train;

pub use dataset::{DatasetFormat, DatasetStats, DatasetStore, LabeledExample, DATASET_FILE};
pub use features::{
    FeatureExtractor, FeatureVector, SnippetMetrics, FEATURE_NAMES, FEATURE_VERSION, NUM_FEATURES,
};
pub use forest::{DecisionTree, ForestParams, RandomForest, SplitCriterion};
pub use gating::{GatingPolicy, DEFAULT_THRESHOLD, RISK_ABOVE_THRESHOLD};
pub use metrics::{ConfusionMatrix, EvaluationMetrics, SelectionMetric, DECISION_BOUNDARY};
pub use model::{RiskClassifier, TrainedModel, MODEL_FILE};
pub use train::{
    CancellationToken, HyperparameterGrid, TrainConfig, TrainReport, TrainingPipeline, TrialProgress,
    TrialResult, MIN_TRAINING_EXAMPLES,
};
