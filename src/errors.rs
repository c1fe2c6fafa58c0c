//! Error types for analysis, training, model persistence and datasets

use std::path::PathBuf;
use thiserror::Error;

use crate::models::{DiagnosticKind, PatternKind, Span};

/// Which side of a before/after pair a snippet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetSide {
    Before,
    After,
}

impl std::fmt::Display for SnippetSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnippetSide::Before => write!(f, "before"),
            SnippetSide::After => write!(f, "after"),
        }
    }
}

/// Errors raised while detecting, transforming or gating a single unit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("{unit}:{}: parse error: {message}", span.start.line)]
    Parse {
        unit: String,
        span: Span,
        message: String,
    },

    #[error("unsupported {kind} at line {}: {reason}", span.start.line)]
    UnsupportedPattern {
        kind: PatternKind,
        span: Span,
        reason: String,
    },

    #[error("malformed {side} snippet: {message}")]
    MalformedSnippet { side: SnippetSide, message: String },

    #[error("feature version mismatch: extractor produces v{found}, classifier expects v{expected}")]
    FeatureVersionMismatch { expected: u32, found: u32 },

    #[error("gating threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
}

impl AnalysisError {
    pub fn unsupported(kind: PatternKind, span: Span, reason: impl Into<String>) -> Self {
        AnalysisError::UnsupportedPattern {
            kind,
            span,
            reason: reason.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            AnalysisError::Parse { span, .. } | AnalysisError::UnsupportedPattern { span, .. } => {
                Some(*span)
            }
            _ => None,
        }
    }

    pub fn pattern(&self) -> Option<PatternKind> {
        match self {
            AnalysisError::UnsupportedPattern { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn diagnostic_kind(&self) -> DiagnosticKind {
        match self {
            AnalysisError::Parse { .. } => DiagnosticKind::ParseError,
            AnalysisError::UnsupportedPattern { .. } => DiagnosticKind::UnsupportedPattern,
            AnalysisError::MalformedSnippet { .. } => DiagnosticKind::MalformedSnippet,
            AnalysisError::FeatureVersionMismatch { .. } | AnalysisError::InvalidThreshold(_) => {
                DiagnosticKind::ModelMismatch
            }
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors that abort a training run. No model is produced when one is raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainError {
    #[error("need at least {required} usable examples to train, found {found}")]
    InsufficientData { found: usize, required: usize },

    #[error("training data has a single class (every example labelled {label})")]
    SingleClassData { label: u8 },

    #[error("training cancelled")]
    Cancelled,

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from serialising, deserialising or storing a trained model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("model was trained for feature version {found}, this build extracts version {expected}")]
    FeatureVersion { expected: u32, found: u32 },

    #[error("model is inconsistent: {0}")]
    Corrupt(String),
}

/// Errors from the labelled-example store.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: invalid record: {message}")]
    InvalidRecord {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("could not encode record: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("could not write CSV record: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_kind_mapping() {
        let parse = AnalysisError::Parse {
            unit: "a.py".into(),
            span: Span::default(),
            message: "invalid syntax".into(),
        };
        assert_eq!(parse.diagnostic_kind(), DiagnosticKind::ParseError);
        assert!(parse.span().is_some());

        let malformed = AnalysisError::MalformedSnippet {
            side: SnippetSide::After,
            message: "bad".into(),
        };
        assert_eq!(malformed.diagnostic_kind(), DiagnosticKind::MalformedSnippet);
        assert!(malformed.to_string().contains("after"));
    }

    #[test]
    fn test_train_error_messages() {
        let err = TrainError::InsufficientData {
            found: 3,
            required: 10,
        };
        assert!(err.to_string().contains("at least 10"));
        assert_eq!(TrainError::Cancelled.to_string(), "training cancelled");
    }
}
