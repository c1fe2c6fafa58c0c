//! Rewrite generation
//!
//! The `Transformer` turns a `PatternMatch` into a `RewriteCandidate`: the
//! exact before-text, a behavior-preserving after-text and the indentation
//! needed to splice it back. Every after-text is re-parsed before it is
//! returned, so a candidate never carries invalid code.
//!
//! `apply_candidates` and `unified_diff` take accepted candidates back to a
//! file.

mod comprehension;
mod dispatch;
mod merge_if;
mod patch;
mod snippet;

pub use patch::{apply_candidates, unified_diff};
pub use snippet::{dedent_text, reindent_text};

use crate::detectors::{Capture, PatternMatch};
use crate::errors::{AnalysisError, SnippetSide};
use crate::models::RewriteCandidate;
use crate::parsers::check_snippet;
use crate::parsers::syntax::{Expr, ExprKind, LiteralKind, Stmt};
use snippet::Snippet;

/// Produces rewrite candidates from matches
#[derive(Debug, Clone, Default)]
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Self
    }

    /// Build the candidate for `m`, or explain why the shape is unsupported.
    pub fn transform(&self, m: &PatternMatch) -> Result<RewriteCandidate, AnalysisError> {
        let unsupported = |reason: String| AnalysisError::unsupported(m.kind, m.span, reason);

        let snippet = Snippet::open(m).map_err(unsupported)?;
        if capture_has_multiline_string(&m.capture) {
            return Err(unsupported(
                "a multi-line string would be re-indented".to_string(),
            ));
        }

        let before_text = snippet.piece(m.span).map_err(unsupported)?;
        let after_text = match &m.capture {
            Capture::AccumulationLoop {
                loop_stmt,
                accumulator,
                accumulation,
                ..
            } => comprehension::rewrite(&snippet, loop_stmt, accumulator, accumulation),
            Capture::NestedConditional { outer, inner } => merge_if::rewrite(&snippet, outer, inner),
            Capture::ConditionalChain {
                subject,
                arms,
                default,
                in_class_body,
                ..
            } => dispatch::rewrite(&snippet, subject, arms, default.as_ref(), *in_class_body),
        }
        .map_err(unsupported)?;

        check_snippet(&before_text, SnippetSide::Before)
            .map_err(|e| unsupported(format!("matched text does not parse alone: {e}")))?;
        check_snippet(&after_text, SnippetSide::After)
            .map_err(|e| unsupported(format!("rewrite does not parse: {e}")))?;

        Ok(RewriteCandidate {
            kind: m.kind,
            span: m.span,
            before_text,
            after_text,
            indent: snippet.indent().to_string(),
            description: m.message.clone(),
        })
    }
}

fn capture_has_multiline_string(capture: &Capture) -> bool {
    let roots: Vec<&Stmt> = match capture {
        Capture::AccumulationLoop {
            init, loop_stmt, ..
        } => vec![init, loop_stmt],
        Capture::NestedConditional { outer, .. } => vec![outer],
        Capture::ConditionalChain { chain, .. } => vec![chain],
    };

    let mut found = false;
    let mut check = |stmt: &Stmt| {
        for expr in stmt.exprs() {
            expr.walk(&mut |e| {
                if is_string(e) && e.span.start.line != e.span.end.line {
                    found = true;
                }
            });
        }
    };
    for root in roots {
        check(root);
        for block in root.blocks() {
            block.for_each_stmt(&mut |stmt, _| check(stmt));
        }
    }
    found
}

fn is_string(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal { kind, .. } => matches!(kind, LiteralKind::Str | LiteralKind::Bytes),
        ExprKind::Other { node_kind, .. } => matches!(*node_kind, "string" | "concatenated_string"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::PatternDetector;
    use crate::models::{PatternKind, SourceUnit};

    fn candidates(source: &str) -> Vec<Result<RewriteCandidate, AnalysisError>> {
        let unit = SourceUnit::new("test.py", source);
        let matches = PatternDetector::new().detect(&unit).expect("should parse");
        let transformer = Transformer::new();
        matches.iter().map(|m| transformer.transform(m)).collect()
    }

    fn only_after(source: &str) -> String {
        let mut found = candidates(source);
        assert_eq!(found.len(), 1, "expected exactly one match");
        found.remove(0).expect("should transform").after_text
    }

    #[test]
    fn test_list_comprehension() {
        let after = only_after("result = []\nfor i in items:\n    result.append(i * 2)\n");
        assert_eq!(after, "result = [i * 2 for i in items]");
    }

    #[test]
    fn test_set_and_dict_comprehensions() {
        assert_eq!(
            only_after("seen = set()\nfor x in xs:\n    seen.add(x.lower())\n"),
            "seen = {x.lower() for x in xs}"
        );
        assert_eq!(
            only_after("m = {}\nfor k, v in pairs:\n    m[k] = v\n"),
            "m = {k: v for k, v in pairs}"
        );
    }

    #[test]
    fn test_iterable_gets_parenthesised() {
        assert_eq!(
            only_after("r = []\nfor x in a if c else b:\n    r.append(x)\n"),
            "r = [x for x in (a if c else b)]"
        );
    }

    #[test]
    fn test_comment_between_init_and_loop_is_unsupported() {
        let mut found = candidates("r = []\n# fill it\nfor x in xs:\n    r.append(x)\n");
        assert_eq!(found.len(), 1);
        let err = found.remove(0).expect_err("should refuse");
        assert!(matches!(
            err,
            AnalysisError::UnsupportedPattern {
                kind: PatternKind::AccumulationLoop,
                ..
            }
        ));
    }

    #[test]
    fn test_merge_nested_if() {
        let after = only_after("if a:\n  if b:\n    print(c)\n");
        assert_eq!(after, "if a and b:\n  print(c)");
    }

    #[test]
    fn test_merge_keeps_indent_and_parenthesises_or() {
        let source = "def f():\n    if a or b:\n        if c:\n            go()\n            stop()\n";
        let mut found = candidates(source);
        let candidate = found.remove(0).expect("should transform");
        assert_eq!(candidate.indent, "    ");
        assert_eq!(candidate.after_text, "if (a or b) and c:\n    go()\n    stop()");
        assert_eq!(
            candidate.replacement_text(),
            "if (a or b) and c:\n        go()\n        stop()"
        );
    }

    #[test]
    fn test_chain_to_lambda_dispatch() {
        let source = "\
if x == 1:
    action_one()
elif x == 2:
    action_two()
elif x == 3:
    action_three()
else:
    default_action()
";
        let after = only_after(source);
        assert_eq!(
            after,
            "{\n    1: lambda: action_one(),\n    2: lambda: action_two(),\n    3: lambda: action_three(),\n}.get(x, lambda: default_action())()"
        );
    }

    #[test]
    fn test_chain_to_return_lookup() {
        let source = "\
def grade(score):
    if score == 'a':
        return 4
    elif score in ('b', 'B'):
        return 3
    elif score == 'c':
        return 2
    else:
        return 0
";
        let after = only_after(source);
        assert_eq!(
            after,
            "return {\n    'a': 4,\n    'b': 3,\n    'B': 3,\n    'c': 2,\n}.get(score, 0)"
        );
    }

    #[test]
    fn test_chain_with_mixed_bodies_is_unsupported() {
        let source = "\
def f(x):
    if x == 1:
        return 1
    elif x == 2:
        go()
    elif x == 3:
        return 3
";
        let found = candidates(source);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_err());
    }

    #[test]
    fn test_chain_calling_frame_builtins_is_unsupported() {
        let method = "\
class C(B):
    def f(self, x):
        if x == 1:
            super().a()
        elif x == 2:
            super().b()
        elif x == 3:
            super().c()
";
        let with_locals = "\
def f(x):
    if x == 1:
        print(locals())
    elif x == 2:
        print(2)
    elif x == 3:
        print(3)
";
        for source in [method, with_locals] {
            let mut found = candidates(source);
            assert_eq!(found.len(), 1);
            let err = found.remove(0).expect_err("should refuse");
            assert!(matches!(
                err,
                AnalysisError::UnsupportedPattern {
                    kind: PatternKind::ConditionalChain,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_multiline_string_is_unsupported() {
        let source = "if a:\n    if b:\n        x = '''\n        text'''\n";
        let found = candidates(source);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_err());
    }

    #[test]
    fn test_before_text_is_dedented() {
        let source = "def f(xs):\n    r = []\n    for x in xs:\n        r.append(x)\n    return r\n";
        let mut found = candidates(source);
        let candidate = found.remove(0).expect("should transform");
        assert_eq!(candidate.before_text, "r = []\nfor x in xs:\n    r.append(x)");
        assert_eq!(candidate.after_text, "r = [x for x in xs]");
    }
}
