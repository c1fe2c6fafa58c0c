//! Accumulation Loop Detector
//!
//! Finds a `for` loop whose only job is to fill a freshly created empty
//! container, immediately after the container is created:
//!
//! ```python
//! result = []
//! for item in items:
//!     result.append(item * 2)
//! ```
//!
//! Such loops can become a single comprehension. The rule only fires when
//! the rewrite provably keeps behavior: the loop variable must not be read
//! after the loop, the accumulator must not be read while it is being
//! built, and nothing in the loop may suspend or bind names.

use crate::detectors::base::{Accumulation, Capture, PatternMatch, Rule};
use crate::models::{PatternKind, Span};
use crate::parsers::syntax::{
    CollectionKind, Expr, ExprKind, NameRef, ScopeKind, Stmt, StmtKind, StmtSite,
};
use crate::parsers::SyntaxIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    List,
    Set,
    Dict,
}

pub struct AccumulationLoopDetector;

impl AccumulationLoopDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AccumulationLoopDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for AccumulationLoopDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::AccumulationLoop
    }

    fn name(&self) -> &'static str {
        "AccumulationLoopDetector"
    }

    fn description(&self) -> &'static str {
        "Detects loops that only fill a freshly created list, set or dict"
    }

    fn check(&self, site: &StmtSite<'_>, index: &SyntaxIndex<'_>) -> Option<PatternMatch> {
        let StmtKind::For {
            target,
            iter,
            body,
            orelse,
            is_async,
        } = &site.stmt.kind
        else {
            return None;
        };
        // Comprehensions in a class body cannot see class-level names.
        if *is_async || orelse.is_some() || site.scope == ScopeKind::Class {
            return None;
        }

        let init = site.previous()?;
        let [only] = body.stmts.as_slice() else {
            return None;
        };
        let (accumulator, accumulation) = accumulation_of(only)?;
        let container = initializer_of(init, accumulator)?;
        if !compatible(container, &accumulation) {
            return None;
        }

        let loop_vars = target.target_names()?;
        if loop_vars.contains(&accumulator) {
            return None;
        }

        let per_iteration = accumulation.exprs();
        if iter.contains_name(accumulator)
            || per_iteration.iter().any(|e| e.contains_name(accumulator))
        {
            return None;
        }
        if iter.depends_on_frame() || per_iteration.iter().any(|e| e.depends_on_frame()) {
            return None;
        }

        // A comprehension evaluates key before value; a store evaluates the
        // value first. Only reorder when one side has no effects.
        if let Accumulation::DictStore { key, value } = &accumulation {
            if !key.is_pure() && !value.is_pure() {
                return None;
            }
        }

        if loop_variable_escapes(site, &loop_vars) {
            return None;
        }

        let message = format!(
            "Loop building `{}` can be replaced with a {} comprehension",
            accumulator,
            accumulation.container()
        );
        Some(PatternMatch::new(
            PatternKind::AccumulationLoop,
            Span::cover(&init.span, &site.stmt.span),
            message,
            index,
            Capture::AccumulationLoop {
                init: init.clone(),
                loop_stmt: site.stmt.clone(),
                accumulator: accumulator.to_string(),
                accumulation,
            },
        ))
    }
}

/// Recognise `acc.append(e)`, `acc += [e]`, `acc.add(e)` or `acc[k] = v`.
fn accumulation_of(stmt: &Stmt) -> Option<(&str, Accumulation)> {
    match &stmt.kind {
        StmtKind::Expr(Expr {
            kind: ExprKind::Call { func, args },
            ..
        }) => {
            let ExprKind::Attribute { value, attr } = &func.kind else {
                return None;
            };
            let name = value.as_name()?;
            let [element] = args.as_slice() else {
                return None;
            };
            if !is_plain_argument(element) {
                return None;
            }
            let element = element.clone();
            match attr.as_str() {
                "append" => Some((name, Accumulation::ListAppend { element })),
                "add" => Some((name, Accumulation::SetAdd { element })),
                _ => None,
            }
        }
        StmtKind::AugAssign { target, op, value } if op == "+=" => {
            let name = target.as_name()?;
            let ExprKind::Collection {
                kind: CollectionKind::List,
                elements,
            } = &value.kind
            else {
                return None;
            };
            let [element] = elements.as_slice() else {
                return None;
            };
            if !is_plain_argument(element) {
                return None;
            }
            Some((
                name,
                Accumulation::ListAppend {
                    element: element.clone(),
                },
            ))
        }
        StmtKind::Assign { targets, value } => {
            let [Expr {
                kind: ExprKind::Subscript { value: base, slices },
                ..
            }] = targets.as_slice()
            else {
                return None;
            };
            let name = base.as_name()?;
            let [key] = slices.as_slice() else {
                return None;
            };
            if key.is_other("slice") {
                return None;
            }
            Some((
                name,
                Accumulation::DictStore {
                    key: key.clone(),
                    value: value.clone(),
                },
            ))
        }
        _ => None,
    }
}

fn is_plain_argument(expr: &Expr) -> bool {
    !matches!(
        &expr.kind,
        ExprKind::Other { node_kind, .. }
            if matches!(*node_kind, "keyword_argument" | "list_splat" | "dictionary_splat")
    )
}

/// The container created by `name = []`, `name = set()` and friends.
fn initializer_of(stmt: &Stmt, name: &str) -> Option<Container> {
    let StmtKind::Assign { targets, value } = &stmt.kind else {
        return None;
    };
    let [target] = targets.as_slice() else {
        return None;
    };
    if target.as_name() != Some(name) {
        return None;
    }
    match &value.kind {
        ExprKind::Collection { kind, elements } if elements.is_empty() => match kind {
            CollectionKind::List => Some(Container::List),
            CollectionKind::Dict => Some(Container::Dict),
            _ => None,
        },
        ExprKind::Call { func, args } if args.is_empty() => match func.as_name()? {
            "list" => Some(Container::List),
            "set" => Some(Container::Set),
            "dict" => Some(Container::Dict),
            _ => None,
        },
        _ => None,
    }
}

fn compatible(container: Container, accumulation: &Accumulation) -> bool {
    matches!(
        (container, accumulation),
        (Container::List, Accumulation::ListAppend { .. })
            | (Container::Set, Accumulation::SetAdd { .. })
            | (Container::Dict, Accumulation::DictStore { .. })
    )
}

/// A comprehension does not leave its variable bound, so any later read in
/// the same scope (or an earlier read in a surrounding loop, which runs
/// again after this loop) would change behavior.
fn loop_variable_escapes(site: &StmtSite<'_>, loop_vars: &[&str]) -> bool {
    let loop_span = site.stmt.span;
    let mut loads: Vec<NameRef<'_>> = Vec::new();
    site.scope_body.collect_loads(&mut loads, false);

    loads.iter().any(|load| {
        if !loop_vars.contains(&load.name) || loop_span.contains(&load.span) {
            return false;
        }
        load.deferred
            || load.span.start_byte >= loop_span.end_byte
            || site
                .enclosing_loop
                .is_some_and(|outer| outer.span.contains(&load.span))
    })
}
