//! Nested Conditional Detector
//!
//! Finds an `if` whose entire body is another `if`, with no `elif` or
//! `else` on either level. The two tests can be joined with `and`.

use crate::detectors::base::{Capture, PatternMatch, Rule};
use crate::models::PatternKind;
use crate::parsers::syntax::{ElseBranch, StmtKind, StmtSite};
use crate::parsers::SyntaxIndex;

pub struct NestedConditionalDetector;

impl NestedConditionalDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NestedConditionalDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for NestedConditionalDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::NestedConditional
    }

    fn name(&self) -> &'static str {
        "NestedConditionalDetector"
    }

    fn description(&self) -> &'static str {
        "Detects if-statements whose only statement is another if"
    }

    fn check(&self, site: &StmtSite<'_>, index: &SyntaxIndex<'_>) -> Option<PatternMatch> {
        let StmtKind::If {
            body,
            orelse: ElseBranch::None,
            ..
        } = &site.stmt.kind
        else {
            return None;
        };
        let [inner] = body.stmts.as_slice() else {
            return None;
        };
        let StmtKind::If {
            orelse: ElseBranch::None,
            ..
        } = &inner.kind
        else {
            return None;
        };

        Some(PatternMatch::new(
            PatternKind::NestedConditional,
            site.stmt.span,
            "Nested if-statements can be merged into one condition",
            index,
            Capture::NestedConditional {
                outer: site.stmt.clone(),
                inner: inner.clone(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceUnit;

    fn detect(source: &str) -> Vec<PatternMatch> {
        let unit = SourceUnit::new("test.py", source);
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let rule = NestedConditionalDetector::new();
        let mut found = Vec::new();
        index.walk(&mut |site| found.extend(rule.check(site, &index)));
        found
    }

    #[test]
    fn test_detects_nested_if() {
        let found = detect("if a:\n    if b:\n        print(c)\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span.start.line, 1);
        assert_eq!(found[0].span.end.line, 3);
    }

    #[test]
    fn test_rejects_else_on_either_level() {
        assert!(detect("if a:\n    if b:\n        x()\n    else:\n        y()\n").is_empty());
        assert!(detect("if a:\n    if b:\n        x()\nelse:\n    y()\n").is_empty());
        assert!(detect("if a:\n    if b:\n        x()\nelif c:\n    y()\n").is_empty());
    }

    #[test]
    fn test_rejects_extra_statements() {
        assert!(detect("if a:\n    x()\n    if b:\n        y()\n").is_empty());
        assert!(detect("if a:\n    if b:\n        y()\n    x()\n").is_empty());
    }

    #[test]
    fn test_triple_nesting_matches_both_levels() {
        let found = detect("if a:\n    if b:\n        if c:\n            go()\n");
        assert_eq!(found.len(), 2);
    }
}
