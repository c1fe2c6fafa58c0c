//! Conditional chain → dictionary lookup
//!
//! Three shapes are supported, chosen by what the arm bodies do:
//!
//! - every arm and the `else` return a literal: `return {..}.get(s, d)`
//! - every arm and the `else` assign a literal to the same name:
//!   `name = {..}.get(s, d)`
//! - every arm (and the `else`, if any) is a single expression statement:
//!   `{k: lambda: e, ..}.get(s, lambda: d)()`

use super::snippet::Snippet;
use crate::detectors::ChainArm;
use crate::models::Span;
use crate::parsers::syntax::{Block, Expr, StmtKind};

#[derive(Debug, Clone, PartialEq)]
enum ArmShape<'a> {
    Return(&'a Expr),
    Assign { target: &'a str, value: &'a Expr },
    Effect(&'a Expr),
}

impl<'a> ArmShape<'a> {
    fn of(block: &'a Block) -> Option<Self> {
        let [stmt] = block.stmts.as_slice() else {
            return None;
        };
        match &stmt.kind {
            StmtKind::Return(Some(value)) if value.is_literal() => Some(ArmShape::Return(value)),
            StmtKind::Assign { targets, value } if value.is_literal() => match targets.as_slice() {
                [target] => Some(ArmShape::Assign {
                    target: target.as_name()?,
                    value,
                }),
                _ => None,
            },
            StmtKind::Expr(expr) if !expr.depends_on_frame() => {
                Some(ArmShape::Effect(expr))
            }
            _ => None,
        }
    }

    fn value(&self) -> &'a Expr {
        match self {
            ArmShape::Return(value) | ArmShape::Effect(value) => *value,
            ArmShape::Assign { value, .. } => *value,
        }
    }

    fn same_kind(&self, other: &ArmShape<'_>) -> bool {
        match (self, other) {
            (ArmShape::Return(_), ArmShape::Return(_)) => true,
            (ArmShape::Effect(_), ArmShape::Effect(_)) => true,
            (ArmShape::Assign { target: a, .. }, ArmShape::Assign { target: b, .. }) => a == b,
            _ => false,
        }
    }
}

pub(super) fn rewrite(
    snippet: &Snippet<'_>,
    subject: &Expr,
    arms: &[ChainArm],
    default: Option<&Block>,
    in_class_body: bool,
) -> Result<String, String> {
    let shapes = arms
        .iter()
        .map(|arm| ArmShape::of(&arm.body))
        .collect::<Option<Vec<_>>>()
        .ok_or("an arm is not a single return, assignment or expression")?;
    let default_shape = match default {
        Some(block) => Some(ArmShape::of(block).ok_or("the else branch does not match the arms")?),
        None => None,
    };

    let Some(first) = shapes.first() else {
        return Err("chain has no arms".to_string());
    };
    if !shapes.iter().chain(default_shape.iter()).all(|s| first.same_kind(s)) {
        return Err("arms do different kinds of work".to_string());
    }

    let mut kept: Vec<Span> = arms.iter().flat_map(|a| a.keys.iter().map(|k| k.span)).collect();
    kept.extend(shapes.iter().chain(default_shape.iter()).map(|s| s.value().span));
    kept.push(subject.span);
    snippet.ensure_comments_kept(&kept)?;

    let subject = snippet.piece(subject.span)?;
    let lambdas = matches!(first, ArmShape::Effect(_));

    let mut table = String::from("{\n");
    for (arm, shape) in arms.iter().zip(&shapes) {
        let value = snippet.piece(shape.value().span)?;
        for key in &arm.keys {
            let key = snippet.piece(key.span)?;
            if lambdas {
                table.push_str(&format!("    {key}: lambda: {value},\n"));
            } else {
                table.push_str(&format!("    {key}: {value},\n"));
            }
        }
    }
    table.push('}');

    let fallback = match &default_shape {
        Some(shape) => Some(snippet.piece(shape.value().span)?),
        None => None,
    };

    match (first, fallback) {
        (ArmShape::Return(_), Some(fallback)) => {
            Ok(format!("return {table}.get({subject}, {fallback})"))
        }
        (ArmShape::Assign { target, .. }, Some(fallback)) => {
            Ok(format!("{target} = {table}.get({subject}, {fallback})"))
        }
        (ArmShape::Effect(_), _) if in_class_body => {
            Err("lambdas in a class body cannot see class attributes".to_string())
        }
        (ArmShape::Effect(_), fallback) => Ok(format!(
            "{table}.get({subject}, lambda: {})()",
            fallback.as_deref().unwrap_or("None")
        )),
        _ => Err("a chain without an else branch can only dispatch calls".to_string()),
    }
}
