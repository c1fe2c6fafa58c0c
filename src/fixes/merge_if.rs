//! Nested conditional → single `and` condition

use super::snippet::{byte_span, dedent_text, Snippet};
use crate::parsers::syntax::{Expr, Stmt, StmtKind};

/// `if a:` / `if b:` / body becomes `if a and b:` / body, with the body
/// moved out one level.
pub(super) fn rewrite(snippet: &Snippet<'_>, outer: &Stmt, inner: &Stmt) -> Result<String, String> {
    let (StmtKind::If { test: outer_test, .. }, StmtKind::If { test: inner_test, .. }) =
        (&outer.kind, &inner.kind)
    else {
        return Err("captured statements are not if statements".to_string());
    };

    // Everything after the inner header colon (trailing comment included)
    // is carried over verbatim.
    let rest_span = byte_span(inner.header_end, inner.span.end_byte);
    snippet.ensure_comments_kept(&[outer_test.span, inner_test.span, rest_span])?;

    let inner_indent = snippet.indent_at(inner.span.start_byte)?;
    let rest = dedent_text(
        snippet.raw(inner.header_end, inner.span.end_byte)?,
        inner_indent,
    )?;

    Ok(format!(
        "if {} and {}:{rest}",
        conjunct(snippet, outer_test)?,
        conjunct(snippet, inner_test)?
    ))
}

fn conjunct(snippet: &Snippet<'_>, test: &Expr) -> Result<String, String> {
    let text = snippet.piece(test.span)?;
    Ok(if test.needs_parens_in_conjunction() {
        format!("({text})")
    } else {
        text
    })
}
