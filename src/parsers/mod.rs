//! Source code parsing using tree-sitter
//!
//! `python` parses a unit and lowers it into the statement/expression tree
//! defined in `syntax`. Nothing downstream touches tree-sitter nodes.

pub mod python;
pub mod syntax;

pub use python::SyntaxIndex;
pub use syntax::{Block, ElseBranch, Expr, ExprKind, ScopeKind, Stmt, StmtKind, StmtSite};

use crate::errors::{AnalysisError, SnippetSide};
use crate::models::SourceUnit;

/// Check that a standalone snippet parses, mapping a failure to a
/// malformed-snippet error for `side`.
pub fn check_snippet(code: &str, side: SnippetSide) -> Result<(), AnalysisError> {
    let unit = SourceUnit::new(format!("<{side}>"), code);
    SyntaxIndex::parse(&unit)
        .map(|_| ())
        .map_err(|e| AnalysisError::MalformedSnippet {
            side,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_snippet() {
        assert!(check_snippet("x = [i for i in y]", SnippetSide::After).is_ok());
        let err = check_snippet("x = [i for i in", SnippetSide::After).expect_err("invalid");
        assert!(matches!(
            err,
            AnalysisError::MalformedSnippet {
                side: SnippetSide::After,
                ..
            }
        ));
    }
}
