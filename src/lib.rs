//! SafeRefactor library
//!
//! ```text
//! SourceUnit ─▶ SyntaxIndex ─▶ PatternDetector ─▶ Transformer ─▶ GatingPolicy ─▶ GatingDecision
//!                                                                    ▲
//!                         LabeledExample ─▶ TrainingPipeline ─▶ TrainedModel
//! ```
//!
//! Each stage is usable on its own; `pipeline::RefactorPipeline` wires them
//! together for a batch of units.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod detectors;
pub mod errors;
pub mod fixes;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod reporters;

pub use classifier::{
    FeatureExtractor, FeatureVector, GatingPolicy, LabeledExample, RiskClassifier, TrainConfig,
    TrainedModel, TrainingPipeline,
};
pub use detectors::{PatternDetector, PatternMatch};
pub use errors::{AnalysisError, DatasetError, ModelError, TrainError};
pub use fixes::Transformer;
pub use models::{Diagnostic, GatingDecision, PatternKind, RewriteCandidate, SourceUnit, Span};
pub use parsers::SyntaxIndex;
pub use pipeline::{RefactorPipeline, UnitReport};
