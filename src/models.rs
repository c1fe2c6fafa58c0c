//! Core data models for saferefactor
//!
//! These models flow through the whole pipeline: a `SourceUnit` is parsed,
//! rules produce pattern matches, the transformer turns each match into a
//! `RewriteCandidate`, and the gating policy wraps it in a `GatingDecision`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::errors::AnalysisError;

/// An immutable source buffer plus the logical name it was read from.
///
/// The text is reference-counted so matches can keep the buffer alive
/// without copying it.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    name: String,
    text: Arc<str>,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Read a unit from disk, using the path as its logical name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path.display().to_string(), text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Shared handle to the text buffer.
    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

/// A location in a source buffer. Lines are 1-based, columns are 0-based
/// byte offsets within the line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// A half-open byte range with the matching line/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Span {
    /// Span running from the start of `first` to the end of `last`.
    pub fn cover(first: &Span, last: &Span) -> Span {
        Span {
            start: first.start,
            end: last.end,
            start_byte: first.start_byte,
            end_byte: last.end_byte,
        }
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start_byte < other.end_byte && other.start_byte < self.end_byte
    }

    pub fn len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

/// The structural shapes the detector looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    AccumulationLoop,
    NestedConditional,
    ConditionalChain,
}

impl PatternKind {
    pub const ALL: [PatternKind; 3] = [
        PatternKind::AccumulationLoop,
        PatternKind::NestedConditional,
        PatternKind::ConditionalChain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::AccumulationLoop => "accumulation-loop",
            PatternKind::NestedConditional => "nested-conditional",
            PatternKind::ConditionalChain => "conditional-chain",
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed rewrite of one matched span.
///
/// `before_text` and `after_text` are dedented to column zero so that each
/// parses on its own; `indent` is the whitespace that re-seats them in the
/// original file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteCandidate {
    pub kind: PatternKind,
    pub span: Span,
    pub before_text: String,
    pub after_text: String,
    pub indent: String,
    pub description: String,
}

impl RewriteCandidate {
    /// The after-text re-indented for splicing into the original buffer.
    pub fn replacement_text(&self) -> String {
        crate::fixes::reindent_text(&self.after_text, &self.indent)
    }
}

/// Outcome of gating one candidate. Probability and threshold are kept even
/// on acceptance so every decision can be audited later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatingDecision {
    pub candidate: RewriteCandidate,
    pub probability: f64,
    pub threshold: f64,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Diagnostic categories surfaced to reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    ParseError,
    UnsupportedPattern,
    MalformedSnippet,
    ModelMismatch,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::ParseError => write!(f, "parse error"),
            DiagnosticKind::UnsupportedPattern => write!(f, "unsupported pattern"),
            DiagnosticKind::MalformedSnippet => write!(f, "malformed snippet"),
            DiagnosticKind::ModelMismatch => write!(f, "model mismatch"),
        }
    }
}

/// A problem attributed to a unit and, where known, a span within it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub unit: String,
    pub kind: DiagnosticKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternKind>,
    pub message: String,
}

impl Diagnostic {
    pub fn from_error(unit: &str, error: &AnalysisError) -> Self {
        Self {
            unit: unit.to_string(),
            kind: error.diagnostic_kind(),
            span: error.span(),
            pattern: error.pattern(),
            message: error.to_string(),
        }
    }

    /// Attach a span when the underlying error did not carry one.
    pub fn at(mut self, span: Span, pattern: PatternKind) -> Self {
        self.span.get_or_insert(span);
        self.pattern.get_or_insert(pattern);
        self
    }
}
