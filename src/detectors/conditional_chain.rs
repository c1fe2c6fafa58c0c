//! Conditional Chain Detector
//!
//! Finds `if`/`elif` chains that compare one stable subject against
//! literals, which can be turned into a dictionary lookup:
//!
//! ```python
//! if kind == "a":
//!     return 1
//! elif kind in ("b", "c"):
//!     return 2
//! elif kind == "d":
//!     return 3
//! else:
//!     return 0
//! ```
//!
//! Keys must be distinct as dictionary keys, so `1`, `1.0` and `True` count
//! as the same key. Whether the arm bodies fit a dictionary shape is left to
//! the transformer.

use std::collections::HashSet;

use crate::detectors::base::{Capture, ChainArm, PatternMatch, Rule};
use crate::models::PatternKind;
use crate::parsers::syntax::{
    CollectionKind, CompareOp, ElseBranch, Expr, ExprKind, LiteralKind, ScopeKind, StmtKind,
    StmtSite,
};
use crate::parsers::SyntaxIndex;

/// Default minimum number of `if`/`elif` arms
pub const MIN_CHAIN_ARMS: usize = 3;

pub struct ConditionalChainDetector {
    min_arms: usize,
}

impl ConditionalChainDetector {
    pub fn new() -> Self {
        Self {
            min_arms: MIN_CHAIN_ARMS,
        }
    }

    /// Require at least `min_arms` comparisons (never fewer than two).
    pub fn with_min_arms(mut self, min_arms: usize) -> Self {
        self.min_arms = min_arms.max(2);
        self
    }
}

impl Default for ConditionalChainDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ConditionalChainDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::ConditionalChain
    }

    fn name(&self) -> &'static str {
        "ConditionalChainDetector"
    }

    fn description(&self) -> &'static str {
        "Detects if/elif chains comparing one subject against literals"
    }

    fn check(&self, site: &StmtSite<'_>, index: &SyntaxIndex<'_>) -> Option<PatternMatch> {
        let mut arms = Vec::new();
        let mut subject: Option<&Expr> = None;
        let mut current = site.stmt;

        let default = loop {
            let StmtKind::If { test, body, orelse } = &current.kind else {
                return None;
            };
            let (this_subject, keys) = equality_test(test)?;
            match subject {
                None => subject = Some(this_subject),
                Some(first) => {
                    if index.text(first.span) != index.text(this_subject.span) {
                        return None;
                    }
                }
            }
            arms.push(ChainArm {
                keys: keys.into_iter().cloned().collect(),
                body: body.clone(),
            });
            match orelse {
                ElseBranch::Elif(next) => current = next.as_ref(),
                ElseBranch::Else(block) => break Some(block.clone()),
                ElseBranch::None => break None,
            }
        };

        if arms.len() < self.min_arms {
            return None;
        }
        let subject = subject?;

        let mut seen = HashSet::new();
        for key in arms.iter().flat_map(|arm| &arm.keys) {
            if !seen.insert(canonical_key(key)?) {
                return None;
            }
        }

        let message = format!(
            "{}-way if/elif chain on `{}` can be replaced with a dictionary lookup",
            arms.len(),
            index.text(subject.span)
        );
        Some(PatternMatch::new(
            PatternKind::ConditionalChain,
            site.stmt.span,
            message,
            index,
            Capture::ConditionalChain {
                chain: site.stmt.clone(),
                subject: subject.clone(),
                arms,
                default,
                in_class_body: site.scope == ScopeKind::Class,
            },
        ))
    }
}

/// `s == lit`, `lit == s` or `s in (lit, ...)`: the subject and its keys.
fn equality_test(test: &Expr) -> Option<(&Expr, Vec<&Expr>)> {
    let ExprKind::Compare {
        left,
        ops,
        comparators,
    } = &test.unparen().kind
    else {
        return None;
    };
    let ([op], [right]) = (ops.as_slice(), comparators.as_slice()) else {
        return None;
    };
    let left = left.unparen();
    let right = right.unparen();

    match op {
        CompareOp::Eq if is_stable_subject(left) && right.is_literal() => {
            Some((left, vec![right]))
        }
        CompareOp::Eq if left.is_literal() && is_stable_subject(right) => {
            Some((right, vec![left]))
        }
        CompareOp::In if is_stable_subject(left) => {
            let ExprKind::Collection {
                kind: CollectionKind::Tuple | CollectionKind::List | CollectionKind::Set,
                elements,
            } = &right.kind
            else {
                return None;
            };
            if elements.is_empty() || !elements.iter().all(Expr::is_literal) {
                return None;
            }
            Some((left, elements.iter().map(Expr::unparen).collect()))
        }
        _ => None,
    }
}

/// A name or dotted attribute path.
fn is_stable_subject(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Name(_) => true,
        ExprKind::Attribute { value, .. } => is_stable_subject(value.unparen()),
        _ => false,
    }
}

/// Identity of a literal as a dictionary key, or `None` when it cannot be
/// decided from the text alone (escapes, complex numbers...).
pub(crate) fn canonical_key(expr: &Expr) -> Option<String> {
    let ExprKind::Literal { kind, text } = &expr.unparen().kind else {
        return None;
    };
    match kind {
        LiteralKind::True => Some("n:1".to_string()),
        LiteralKind::False => Some("n:0".to_string()),
        LiteralKind::None => Some("none".to_string()),
        LiteralKind::Ellipsis => Some("ellipsis".to_string()),
        LiteralKind::Int => parse_int(text).map(|n| format!("n:{n}")),
        LiteralKind::Float => {
            let value: f64 = text.replace('_', "").parse().ok()?;
            if !value.is_finite() {
                return None;
            }
            if value.fract() == 0.0 && value.abs() < 1e18 {
                Some(format!("n:{}", value as i128))
            } else {
                Some(format!("f:{}", value.to_bits()))
            }
        }
        LiteralKind::Str => string_body(text).map(|b| format!("s:{b}")),
        LiteralKind::Bytes => string_body(text).map(|b| format!("b:{b}")),
    }
}

fn parse_int(text: &str) -> Option<i128> {
    let cleaned = text.replace('_', "");
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, cleaned.trim_start_matches('+').trim_start()),
    };
    let lower = digits.to_ascii_lowercase();
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i128::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()?
    } else {
        lower.parse::<i128>().ok()?
    };
    Some(if negative { -value } else { value })
}

/// The characters between the quotes of a plain string literal. Escapes are
/// refused since two different spellings could name the same key.
fn string_body(text: &str) -> Option<&str> {
    let start = text.find(['\'', '"'])?;
    let quoted = &text[start..];
    let quote = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
        &quoted[..3]
    } else {
        &quoted[..1]
    };
    let body = quoted.strip_prefix(quote)?.strip_suffix(quote)?;
    if body.contains('\\') {
        return None;
    }
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceUnit;

    fn detect(source: &str) -> Vec<PatternMatch> {
        let unit = SourceUnit::new("test.py", source);
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let rule = ConditionalChainDetector::new();
        let mut found = Vec::new();
        index.walk(&mut |site| found.extend(rule.check(site, &index)));
        found
    }

    const CHAIN: &str = "\
if x == 1:
    action_one()
elif x == 2:
    action_two()
elif x == 3:
    action_three()
else:
    default_action()
";

    #[test]
    fn test_detects_chain() {
        let found = detect(CHAIN);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span.start.line, 1);
        assert_eq!(found[0].span.end.line, 8);
        match &found[0].capture {
            Capture::ConditionalChain { arms, default, .. } => {
                assert_eq!(arms.len(), 3);
                assert!(default.is_some());
            }
            other => panic!("unexpected capture {other:?}"),
        }
    }

    #[test]
    fn test_requires_minimum_arms() {
        let source = "if x == 1:\n    a()\nelif x == 2:\n    b()\n";
        assert!(detect(source).is_empty());
    }

    #[test]
    fn test_membership_and_reversed_comparisons() {
        let source = "\
if mode in ('r', 'rb'):
    a()
elif 'w' == mode:
    b()
elif mode == 'x':
    c()
";
        assert_eq!(detect(source).len(), 1);
    }

    #[test]
    fn test_rejects_mixed_subjects() {
        let source = "if x == 1:\n    a()\nelif y == 2:\n    b()\nelif x == 3:\n    c()\n";
        assert!(detect(source).is_empty());
    }

    #[test]
    fn test_rejects_colliding_keys() {
        let source = "if x == 1:\n    a()\nelif x == True:\n    b()\nelif x == 3:\n    c()\n";
        assert!(detect(source).is_empty());
        let source = "if x == 1:\n    a()\nelif x == 1.0:\n    b()\nelif x == 3:\n    c()\n";
        assert!(detect(source).is_empty());
        let source = "if x == 'a':\n    a()\nelif x == \"a\":\n    b()\nelif x == 'c':\n    c()\n";
        assert!(detect(source).is_empty());
    }

    #[test]
    fn test_rejects_non_equality_tests() {
        let source = "if x < 1:\n    a()\nelif x == 2:\n    b()\nelif x == 3:\n    c()\n";
        assert!(detect(source).is_empty());
        let source = "if f() == 1:\n    a()\nelif f() == 2:\n    b()\nelif f() == 3:\n    c()\n";
        assert!(detect(source).is_empty());
    }

    #[test]
    fn test_canonical_keys() {
        let unit = SourceUnit::new("t.py", "v = (0x10, 16, 'a', b'a', 2.5, None)\n");
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let StmtKind::Assign { value, .. } = &index.module().stmts[0].kind else {
            panic!("expected assignment");
        };
        let ExprKind::Collection { elements, .. } = &value.unparen().kind else {
            panic!("expected tuple");
        };
        let keys: Vec<Option<String>> = elements.iter().map(canonical_key).collect();
        assert_eq!(keys[0], keys[1]);
        assert_ne!(keys[2], keys[3]);
        assert!(keys.iter().all(Option::is_some));
    }
}
