//! Feature extraction for regression-risk classification
//!
//! Maps a (before, after) snippet pair to a fixed-length numeric vector:
//! six metrics measured on each side, plus the change in each.

use serde::{Deserialize, Serialize};

use crate::errors::{AnalysisError, SnippetSide};
use crate::models::SourceUnit;
use crate::parsers::syntax::{ElseBranch, Expr, ExprKind, NameRef, Stmt, StmtKind};
use crate::parsers::SyntaxIndex;

/// Version of the feature mapping. Bump whenever names, order or metric
/// definitions change; saved models record the version they were fit on.
pub const FEATURE_VERSION: u32 = 1;

/// Number of features
pub const NUM_FEATURES: usize = 18;

/// Feature names, in vector order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "complexity_before",
    "complexity_after",
    "complexity_change",
    "length_before",
    "length_after",
    "length_change",
    "tokens_before",
    "tokens_after",
    "tokens_change",
    "nesting_before",
    "nesting_after",
    "nesting_change",
    "distinct_names_before",
    "distinct_names_after",
    "distinct_names_change",
    "name_loads_before",
    "name_loads_after",
    "variable_usage_diff",
];

/// Feature vector tagged with the mapping version that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub version: u32,
    pub values: [f64; NUM_FEATURES],
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    /// Value of the named feature.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }
}

/// Metrics measured on one snippet
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SnippetMetrics {
    /// 1 + decision points
    pub complexity: f64,
    /// Non-blank lines
    pub lines: f64,
    /// Non-comment tokens
    pub tokens: f64,
    /// Deepest compound-statement nesting
    pub nesting: f64,
    /// Distinct identifiers used as names
    pub distinct_names: f64,
    /// Number of name reads
    pub name_loads: f64,
}

/// Extracts features from snippet pairs
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn version(&self) -> u32 {
        FEATURE_VERSION
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    /// Feature vector for a before/after pair. Either side failing to parse
    /// is a `MalformedSnippet` error naming that side.
    pub fn extract(&self, before: &str, after: &str) -> Result<FeatureVector, AnalysisError> {
        let b = self.metrics(before, SnippetSide::Before)?;
        let a = self.metrics(after, SnippetSide::After)?;

        let pairs = [
            (b.complexity, a.complexity),
            (b.lines, a.lines),
            (b.tokens, a.tokens),
            (b.nesting, a.nesting),
            (b.distinct_names, a.distinct_names),
            (b.name_loads, a.name_loads),
        ];
        let mut values = [0.0; NUM_FEATURES];
        for (i, (before, after)) in pairs.iter().enumerate() {
            values[i * 3] = *before;
            values[i * 3 + 1] = *after;
            values[i * 3 + 2] = after - before;
        }

        Ok(FeatureVector {
            version: FEATURE_VERSION,
            values,
        })
    }

    /// Measure one snippet.
    pub fn metrics(&self, code: &str, side: SnippetSide) -> Result<SnippetMetrics, AnalysisError> {
        let unit = SourceUnit::new(format!("<{side}>"), code);
        let index = SyntaxIndex::parse(&unit).map_err(|e| AnalysisError::MalformedSnippet {
            side,
            message: e.to_string(),
        })?;
        let module = index.module();

        let mut complexity = 1usize;
        let mut nesting = 0usize;
        let mut names = std::collections::HashSet::new();
        module.for_each_stmt(&mut |stmt, depth| {
            if stmt.is_compound() {
                nesting = nesting.max(depth + 1);
            }
            complexity += statement_branches(stmt);
            for expr in stmt.exprs() {
                expr.walk(&mut |e| {
                    complexity += expression_branches(e);
                    if let ExprKind::Name(name) = &e.kind {
                        names.insert(name.clone());
                    }
                });
            }
        });

        let mut loads: Vec<NameRef<'_>> = Vec::new();
        module.collect_loads(&mut loads, false);

        Ok(SnippetMetrics {
            complexity: complexity as f64,
            lines: code.lines().filter(|l| !l.trim().is_empty()).count() as f64,
            tokens: index.token_count() as f64,
            nesting: nesting as f64,
            distinct_names: names.len() as f64,
            name_loads: loads.len() as f64,
        })
    }
}

fn statement_branches(stmt: &Stmt) -> usize {
    match &stmt.kind {
        StmtKind::If { orelse, .. } => {
            // one for the `if`, one per `elif`
            let mut count = 1;
            let mut next = orelse;
            while let ElseBranch::Elif(elif) = next {
                count += 1;
                match &elif.kind {
                    StmtKind::If { orelse, .. } => next = orelse,
                    _ => break,
                }
            }
            count
        }
        StmtKind::For { .. } | StmtKind::While { .. } => 1,
        StmtKind::Compound {
            node_kind, clauses, ..
        } => {
            let own = usize::from(matches!(*node_kind, "with_statement" | "case_clause"));
            own + clauses
                .iter()
                .filter(|c| matches!(**c, "except_clause" | "except_group_clause"))
                .count()
        }
        StmtKind::Simple {
            node_kind: "assert_statement",
            ..
        } => 1,
        _ => 0,
    }
}

fn expression_branches(expr: &Expr) -> usize {
    match &expr.kind {
        ExprKind::BoolOp { values, .. } => values.len().saturating_sub(1),
        ExprKind::Other { node_kind, .. } => {
            usize::from(matches!(*node_kind, "conditional_expression" | "if_clause"))
        }
        _ => 0,
    }
}
