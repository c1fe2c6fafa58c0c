//! Accumulation loop → comprehension

use super::snippet::Snippet;
use crate::detectors::Accumulation;
use crate::parsers::syntax::{Expr, Stmt, StmtKind};

/// `acc = []` + `for t in it: acc.append(e)` becomes `acc = [e for t in it]`.
pub(super) fn rewrite(
    snippet: &Snippet<'_>,
    loop_stmt: &Stmt,
    accumulator: &str,
    accumulation: &Accumulation,
) -> Result<String, String> {
    let StmtKind::For { target, iter, .. } = &loop_stmt.kind else {
        return Err("captured statement is not a for loop".to_string());
    };

    let mut kept = vec![target.span, iter.span];
    kept.extend(accumulation.exprs().iter().map(|e| e.span));
    snippet.ensure_comments_kept(&kept)?;

    let clause = format!(
        "for {} in {}",
        snippet.piece(target.span)?,
        operand(snippet, iter)?
    );
    let body = match accumulation {
        Accumulation::ListAppend { element } => {
            format!("[{} {clause}]", snippet.piece(element.span)?)
        }
        Accumulation::SetAdd { element } => {
            format!("{{{} {clause}}}", snippet.piece(element.span)?)
        }
        Accumulation::DictStore { key, value } => format!(
            "{{{}: {} {clause}}}",
            snippet.piece(key.span)?,
            snippet.piece(value.span)?
        ),
    };
    Ok(format!("{accumulator} = {body}"))
}

/// The iterable, parenthesised unless it is already a primary.
fn operand(snippet: &Snippet<'_>, iter: &Expr) -> Result<String, String> {
    let text = snippet.piece(iter.span)?;
    Ok(if iter.is_primary() {
        text
    } else {
        format!("({text})")
    })
}
