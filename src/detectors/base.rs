//! Base rule trait and match types
//!
//! This module defines the core abstractions for pattern detection:
//! - `Rule` trait that every structural pattern implements
//! - `PatternMatch` for a single recognised occurrence
//! - `Capture`, the owned subtree a match carries so it can be rewritten
//!   without going back to the parser

use serde::Serialize;
use std::sync::Arc;

use crate::models::{PatternKind, Span};
use crate::parsers::syntax::{Block, Expr, Stmt, StmtSite};
use crate::parsers::SyntaxIndex;

/// How a loop body feeds its accumulator.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulation {
    /// `acc.append(e)` or `acc += [e]`
    ListAppend { element: Expr },
    /// `acc.add(e)`
    SetAdd { element: Expr },
    /// `acc[k] = v`
    DictStore { key: Expr, value: Expr },
}

impl Accumulation {
    /// Expressions evaluated once per iteration.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Accumulation::ListAppend { element } | Accumulation::SetAdd { element } => {
                vec![element]
            }
            Accumulation::DictStore { key, value } => vec![key, value],
        }
    }

    pub fn container(&self) -> &'static str {
        match self {
            Accumulation::ListAppend { .. } => "list",
            Accumulation::SetAdd { .. } => "set",
            Accumulation::DictStore { .. } => "dict",
        }
    }
}

/// One `if`/`elif` arm of a conditional chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainArm {
    /// Literal keys that select this arm
    pub keys: Vec<Expr>,
    pub body: Block,
}

/// The minimal subtree needed to regenerate text for a match.
#[derive(Debug, Clone, PartialEq)]
pub enum Capture {
    AccumulationLoop {
        init: Stmt,
        loop_stmt: Stmt,
        accumulator: String,
        accumulation: Accumulation,
    },
    NestedConditional {
        outer: Stmt,
        inner: Stmt,
    },
    ConditionalChain {
        chain: Stmt,
        subject: Expr,
        arms: Vec<ChainArm>,
        default: Option<Block>,
        in_class_body: bool,
    },
}

/// A recognised occurrence of a pattern. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub span: Span,
    pub message: String,
    /// Comments inside `span`; a rewrite must not silently drop them.
    #[serde(skip_serializing)]
    pub comments: Vec<Span>,
    #[serde(skip_serializing)]
    pub source: Arc<str>,
    #[serde(skip_serializing)]
    pub capture: Capture,
}

impl PatternMatch {
    pub fn new(
        kind: PatternKind,
        span: Span,
        message: impl Into<String>,
        index: &SyntaxIndex<'_>,
        capture: Capture,
    ) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            comments: index.comments_within(span),
            source: index.shared_source(),
            capture,
        }
    }

    /// Original text of the matched span.
    pub fn text(&self) -> &str {
        self.source
            .get(self.span.start_byte..self.span.end_byte)
            .unwrap_or_default()
    }
}

/// Trait for all structural rules
///
/// A rule inspects one statement site at a time and either recognises its
/// pattern there or declines. Rules are pure: they never mutate the index
/// and never report errors. A shape they cannot prove safe is simply not a
/// match.
///
/// # Example Implementation
///
/// ```ignore
/// pub struct PassOnlyBody;
///
/// impl Rule for PassOnlyBody {
///     fn kind(&self) -> PatternKind { PatternKind::NestedConditional }
///     fn name(&self) -> &'static str { "PassOnlyBody" }
///     fn description(&self) -> &'static str { "Blocks that only contain pass" }
///
///     fn check(&self, site: &StmtSite<'_>, index: &SyntaxIndex<'_>) -> Option<PatternMatch> {
///         None
///     }
/// }
/// ```
pub trait Rule: Send + Sync {
    /// Pattern this rule produces
    fn kind(&self) -> PatternKind;

    /// Unique identifier for this rule
    fn name(&self) -> &'static str;

    /// Human-readable description of what this rule looks for
    fn description(&self) -> &'static str;

    /// Try to recognise the pattern rooted at `site`.
    fn check(&self, site: &StmtSite<'_>, index: &SyntaxIndex<'_>) -> Option<PatternMatch>;
}
