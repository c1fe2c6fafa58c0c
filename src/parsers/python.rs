//! Python parser using tree-sitter
//!
//! Parses a `SourceUnit` once and lowers the concrete syntax tree into the
//! closed statement/expression enums in [`super::syntax`]. The resulting
//! `SyntaxIndex` is what every rule and the feature extractor work from.

use std::sync::Arc;
use tree_sitter::{Node, Parser, Tree};

use super::syntax::{
    walk_statements, Block, BoolOpKind, CollectionKind, CompareOp, ElseBranch, Expr, ExprKind,
    LiteralKind, Stmt, StmtKind, StmtSite,
};
use crate::errors::AnalysisError;
use crate::models::{Position, SourceUnit, Span};

/// Parsed, lowered view of one source unit. Borrows the unit read-only.
#[derive(Debug)]
pub struct SyntaxIndex<'a> {
    unit: &'a SourceUnit,
    module: Block,
    comments: Vec<Span>,
    token_count: usize,
}

impl<'a> SyntaxIndex<'a> {
    /// Parse `unit`. Any syntax error (including a missing token the parser
    /// had to invent) fails with the location of the first one found.
    pub fn parse(unit: &'a SourceUnit) -> Result<Self, AnalysisError> {
        let tree = parse_tree(unit)?;
        let root = tree.root_node();

        if root.has_error() {
            let bad = first_error_node(root).unwrap_or(root);
            let message = if bad.is_missing() {
                format!("missing `{}`", bad.kind())
            } else {
                "invalid syntax".to_string()
            };
            return Err(AnalysisError::Parse {
                unit: unit.name().to_string(),
                span: span_of(&bad),
                message,
            });
        }

        let lowerer = Lowerer {
            source: unit.text().as_bytes(),
        };
        let module = lowerer.block(&root);

        let mut comments = Vec::new();
        let mut token_count = 0;
        scan_leaves(&root, &mut comments, &mut token_count);

        Ok(Self {
            unit,
            module,
            comments,
            token_count,
        })
    }

    pub fn unit(&self) -> &'a SourceUnit {
        self.unit
    }

    pub fn source(&self) -> &'a str {
        self.unit.text()
    }

    pub fn shared_source(&self) -> Arc<str> {
        self.unit.shared_text()
    }

    pub fn module(&self) -> &Block {
        &self.module
    }

    /// Number of non-comment tokens in the unit.
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Text covered by `span`, or the empty string if it is out of range.
    pub fn text(&self, span: Span) -> &'a str {
        self.source()
            .get(span.start_byte..span.end_byte)
            .unwrap_or_default()
    }

    /// Comments that lie inside `span`.
    pub fn comments_within(&self, span: Span) -> Vec<Span> {
        self.comments
            .iter()
            .filter(|c| span.contains(c))
            .copied()
            .collect()
    }

    /// Visit every statement with its block, position and scope context.
    pub fn walk<'s>(&'s self, f: &mut impl FnMut(&StmtSite<'s>)) {
        walk_statements(&self.module, f);
    }
}

fn parse_tree(unit: &SourceUnit) -> Result<Tree, AnalysisError> {
    let failure = |message: String| AnalysisError::Parse {
        unit: unit.name().to_string(),
        span: Span::default(),
        message,
    };

    let mut parser = Parser::new();
    let language = tree_sitter_python::LANGUAGE;
    parser
        .set_language(&language.into())
        .map_err(|e| failure(format!("failed to load Python grammar: {e}")))?;

    parser
        .parse(unit.text(), None)
        .ok_or_else(|| failure("parser produced no tree".to_string()))
}

fn first_error_node<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error_node)
}

fn scan_leaves(node: &Node, comments: &mut Vec<Span>, tokens: &mut usize) {
    if node.kind() == "comment" {
        comments.push(span_of(node));
        return;
    }
    if node.child_count() == 0 {
        if node.end_byte() > node.start_byte() {
            *tokens += 1;
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        scan_leaves(&child, comments, tokens);
    }
}

pub(crate) fn span_of(node: &Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start: Position {
            line: start.row as u32 + 1,
            column: start.column as u32,
        },
        end: Position {
            line: end.row as u32 + 1,
            column: end.column as u32,
        },
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
    }
}

/// Byte just past the first `:` that is a direct child of `node`.
fn header_end(node: &Node) -> usize {
    let mut cursor = node.walk();
    let colon = node
        .children(&mut cursor)
        .find(|c| c.kind() == ":")
        .map(|c| c.end_byte());
    colon.unwrap_or(node.end_byte())
}

fn has_token(node: &Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| !c.is_extra())
        .collect()
}

fn is_compound_kind(kind: &str) -> bool {
    matches!(
        kind,
        "with_statement" | "try_statement" | "match_statement" | "case_clause"
    )
}

fn is_clause_kind(kind: &str) -> bool {
    matches!(
        kind,
        "else_clause"
            | "elif_clause"
            | "except_clause"
            | "except_group_clause"
            | "finally_clause"
            | "with_clause"
            | "with_item"
    )
}

/// Simple statements whose named children are bindings or module paths
/// rather than expressions.
fn has_no_exprs(kind: &str) -> bool {
    matches!(
        kind,
        "import_statement"
            | "import_from_statement"
            | "future_import_statement"
            | "global_statement"
            | "nonlocal_statement"
            | "pass_statement"
            | "break_statement"
            | "continue_statement"
    )
}

struct Lowerer<'s> {
    source: &'s [u8],
}

impl<'s> Lowerer<'s> {
    fn text(&self, node: &Node) -> &'s str {
        node.utf8_text(self.source).unwrap_or_default()
    }

    fn block(&self, node: &Node) -> Block {
        let stmts: Vec<Stmt> = named_children(node)
            .iter()
            .map(|child| self.stmt(child))
            .collect();
        // Trailing comments can be attached to a block by the grammar, so
        // the span is taken from the statements themselves.
        let span = match (stmts.first(), stmts.last()) {
            (Some(first), Some(last)) => Span::cover(&first.span, &last.span),
            _ => span_of(node),
        };
        Block { stmts, span }
    }

    fn stmt(&self, node: &Node) -> Stmt {
        let lowered = match node.kind() {
            "expression_statement" => Some(self.expression_statement(node)),
            "for_statement" => self.for_statement(node),
            "while_statement" => self.while_statement(node),
            "if_statement" => self.if_statement(node, node),
            "function_definition" => self.function_definition(node, node, Vec::new()),
            "class_definition" => self.class_definition(node, node, Vec::new()),
            "decorated_definition" => self.decorated_definition(node),
            "return_statement" => Some(Stmt {
                kind: StmtKind::Return(named_children(node).first().map(|c| self.expr(c))),
                span: span_of(node),
                header_end: node.end_byte(),
            }),
            kind if is_compound_kind(kind) => None,
            kind => Some(self.simple(node, kind)),
        };
        lowered.unwrap_or_else(|| self.compound(node))
    }

    fn simple(&self, node: &Node, kind: &'static str) -> Stmt {
        let exprs = if has_no_exprs(kind) {
            Vec::new()
        } else {
            named_children(node).iter().map(|c| self.expr(c)).collect()
        };
        Stmt {
            kind: StmtKind::Simple {
                node_kind: kind,
                exprs,
            },
            span: span_of(node),
            header_end: node.end_byte(),
        }
    }

    fn expression_statement(&self, node: &Node) -> Stmt {
        let span = span_of(node);
        let children = named_children(node);
        let kind = match children.as_slice() {
            [only] if only.kind() == "assignment" => self.assignment(only),
            [only] if only.kind() == "augmented_assignment" => self.augmented_assignment(only),
            [only] => Some(StmtKind::Expr(self.expr(only))),
            _ => None,
        };
        let kind = kind.unwrap_or_else(|| {
            StmtKind::Expr(Expr {
                kind: ExprKind::Other {
                    node_kind: "expression_list",
                    children: children.iter().map(|c| self.expr(c)).collect(),
                },
                span,
            })
        });
        Stmt {
            kind,
            span,
            header_end: node.end_byte(),
        }
    }

    fn assignment(&self, node: &Node) -> Option<StmtKind> {
        let left = node.child_by_field_name("left")?;
        let right = node.child_by_field_name("right");

        if let Some(annotation) = node.child_by_field_name("type") {
            return Some(StmtKind::AnnAssign {
                target: self.expr(&left),
                annotation: self.expr(&annotation),
                value: right.map(|r| self.expr(&r)),
            });
        }

        // `a = b = c` nests as assignment(a, assignment(b, c))
        let mut targets = vec![self.expr(&left)];
        let mut value = right?;
        while value.kind() == "assignment" && value.child_by_field_name("type").is_none() {
            targets.push(self.expr(&value.child_by_field_name("left")?));
            value = value.child_by_field_name("right")?;
        }
        Some(StmtKind::Assign {
            targets,
            value: self.expr(&value),
        })
    }

    fn augmented_assignment(&self, node: &Node) -> Option<StmtKind> {
        let left = node.child_by_field_name("left")?;
        let op = node.child_by_field_name("operator")?;
        let right = node.child_by_field_name("right")?;
        Some(StmtKind::AugAssign {
            target: self.expr(&left),
            op: self.text(&op).to_string(),
            value: self.expr(&right),
        })
    }

    fn else_body(&self, node: Option<Node>) -> Option<Block> {
        let clause = node?;
        let body = clause.child_by_field_name("body");
        Some(match body {
            Some(body) => self.block(&body),
            // Unexpected shape: an empty block keeps callers conservative.
            None => Block {
                stmts: Vec::new(),
                span: span_of(&clause),
            },
        })
    }

    fn for_statement(&self, node: &Node) -> Option<Stmt> {
        let target = self.expr(&node.child_by_field_name("left")?);
        let iter = self.expr(&node.child_by_field_name("right")?);
        let body = self.block(&node.child_by_field_name("body")?);
        let orelse = self.else_body(node.child_by_field_name("alternative"));
        let last = orelse.as_ref().map_or(body.span, |b| b.span);
        Some(Stmt {
            span: Span::cover(&span_of(node), &last),
            header_end: header_end(node),
            kind: StmtKind::For {
                target,
                iter,
                body,
                orelse,
                is_async: has_token(node, "async"),
            },
        })
    }

    fn while_statement(&self, node: &Node) -> Option<Stmt> {
        let test = self.expr(&node.child_by_field_name("condition")?);
        let body = self.block(&node.child_by_field_name("body")?);
        let orelse = self.else_body(node.child_by_field_name("alternative"));
        let last = orelse.as_ref().map_or(body.span, |b| b.span);
        Some(Stmt {
            span: Span::cover(&span_of(node), &last),
            header_end: header_end(node),
            kind: StmtKind::While { test, body, orelse },
        })
    }

    /// Lower an `if_statement`; `clause` is the node holding the condition
    /// and consequence (the statement itself, or an `elif_clause`).
    fn if_statement(&self, statement: &Node, clause: &Node) -> Option<Stmt> {
        let test = self.expr(&clause.child_by_field_name("condition")?);
        let body = self.block(&clause.child_by_field_name("consequence")?);

        let mut cursor = statement.walk();
        let alternatives: Vec<Node> = statement
            .children_by_field_name("alternative", &mut cursor)
            .collect();
        // Alternatives that follow this clause in the statement.
        let rest: Vec<Node> = alternatives
            .into_iter()
            .filter(|alt| alt.start_byte() > clause.start_byte())
            .collect();

        let orelse = match rest.first() {
            None => ElseBranch::None,
            Some(next) if next.kind() == "elif_clause" => match self.if_statement(statement, next) {
                Some(stmt) => ElseBranch::Elif(Box::new(stmt)),
                None => ElseBranch::Else(Block {
                    stmts: Vec::new(),
                    span: span_of(next),
                }),
            },
            Some(next) => ElseBranch::Else(self.else_body(Some(*next)).unwrap_or(Block {
                stmts: Vec::new(),
                span: span_of(next),
            })),
        };

        let last = match &orelse {
            ElseBranch::None => body.span,
            ElseBranch::Elif(next) => next.span,
            ElseBranch::Else(block) => block.span,
        };
        Some(Stmt {
            span: Span::cover(&span_of(clause), &last),
            header_end: header_end(clause),
            kind: StmtKind::If { test, body, orelse },
        })
    }

    fn decorators(&self, node: &Node) -> Vec<Expr> {
        named_children(node)
            .iter()
            .filter(|c| c.kind() == "decorator")
            .filter_map(|d| named_children(d).first().map(|e| self.expr(e)))
            .collect()
    }

    fn decorated_definition(&self, node: &Node) -> Option<Stmt> {
        let definition = node.child_by_field_name("definition")?;
        let decorators = self.decorators(node);
        match definition.kind() {
            "function_definition" => self.function_definition(node, &definition, decorators),
            "class_definition" => self.class_definition(node, &definition, decorators),
            _ => None,
        }
    }

    fn function_definition(
        &self,
        outer: &Node,
        node: &Node,
        decorators: Vec<Expr>,
    ) -> Option<Stmt> {
        let name = self.text(&node.child_by_field_name("name")?).to_string();
        let body = self.block(&node.child_by_field_name("body")?);
        Some(Stmt {
            span: Span::cover(&span_of(outer), &body.span),
            header_end: header_end(node),
            kind: StmtKind::FunctionDef {
                name,
                decorators,
                is_async: has_token(node, "async"),
                body,
            },
        })
    }

    fn class_definition(&self, outer: &Node, node: &Node, decorators: Vec<Expr>) -> Option<Stmt> {
        let name = self.text(&node.child_by_field_name("name")?).to_string();
        let body = self.block(&node.child_by_field_name("body")?);
        let bases = node
            .child_by_field_name("superclasses")
            .map(|args| named_children(&args).iter().map(|a| self.expr(a)).collect())
            .unwrap_or_default();
        Some(Stmt {
            span: Span::cover(&span_of(outer), &body.span),
            header_end: header_end(node),
            kind: StmtKind::ClassDef {
                name,
                decorators,
                bases,
                body,
            },
        })
    }

    fn compound(&self, node: &Node) -> Stmt {
        let mut clauses = Vec::new();
        let mut exprs = Vec::new();
        let mut blocks = Vec::new();
        self.collect_parts(node, &mut clauses, &mut exprs, &mut blocks);

        let span = match blocks.last() {
            Some(last) => Span::cover(&span_of(node), &last.span),
            None => span_of(node),
        };
        Stmt {
            kind: StmtKind::Compound {
                node_kind: node.kind(),
                clauses,
                exprs,
                blocks,
            },
            span,
            header_end: header_end(node),
        }
    }

    fn collect_parts(
        &self,
        node: &Node,
        clauses: &mut Vec<&'static str>,
        exprs: &mut Vec<Expr>,
        blocks: &mut Vec<Block>,
    ) {
        for child in named_children(node) {
            match child.kind() {
                "block" => blocks.push(self.block(&child)),
                kind if is_clause_kind(kind) => {
                    clauses.push(child.kind());
                    self.collect_parts(&child, clauses, exprs, blocks);
                }
                _ => exprs.push(self.expr(&child)),
            }
        }
    }

    fn expr(&self, node: &Node) -> Expr {
        let kind = match node.kind() {
            "identifier" => ExprKind::Name(self.text(node).to_string()),
            "integer" => self.literal(node, LiteralKind::Int),
            "float" => self.literal(node, LiteralKind::Float),
            "true" => self.literal(node, LiteralKind::True),
            "false" => self.literal(node, LiteralKind::False),
            "none" => self.literal(node, LiteralKind::None),
            "ellipsis" => self.literal(node, LiteralKind::Ellipsis),
            "string" => self.string(node),
            "attribute" => self.attribute(node),
            "call" => self.call(node),
            "subscript" => self.subscript(node),
            "comparison_operator" => self.comparison(node),
            "boolean_operator" => self.boolean(node),
            "not_operator" => match node.child_by_field_name("argument") {
                Some(arg) => ExprKind::Not(Box::new(self.expr(&arg))),
                None => self.other(node),
            },
            "unary_operator" => self.unary(node),
            "tuple" => self.collection(node, CollectionKind::Tuple),
            "list" => self.collection(node, CollectionKind::List),
            "set" => self.collection(node, CollectionKind::Set),
            "dictionary" => self.collection(node, CollectionKind::Dict),
            "keyword_argument" => self.fields(node, &["value"]),
            "for_in_clause" => self.fields(node, &["left", "right"]),
            "lambda" => self.fields(node, &["body"]),
            _ => self.other(node),
        };
        Expr {
            kind,
            span: span_of(node),
        }
    }

    fn literal(&self, node: &Node, kind: LiteralKind) -> ExprKind {
        ExprKind::Literal {
            kind,
            text: self.text(node).to_string(),
        }
    }

    fn string(&self, node: &Node) -> ExprKind {
        if named_children(node)
            .iter()
            .any(|c| c.kind() == "interpolation")
        {
            return self.other(node);
        }
        let text = self.text(node);
        let prefix = text.split(['\'', '"']).next().unwrap_or_default();
        let kind = if prefix.contains(['b', 'B']) {
            LiteralKind::Bytes
        } else {
            LiteralKind::Str
        };
        self.literal(node, kind)
    }

    fn attribute(&self, node: &Node) -> ExprKind {
        match (
            node.child_by_field_name("object"),
            node.child_by_field_name("attribute"),
        ) {
            (Some(object), Some(attr)) => ExprKind::Attribute {
                value: Box::new(self.expr(&object)),
                attr: self.text(&attr).to_string(),
            },
            _ => self.other(node),
        }
    }

    fn call(&self, node: &Node) -> ExprKind {
        let Some(func) = node.child_by_field_name("function") else {
            return self.other(node);
        };
        let args = match node.child_by_field_name("arguments") {
            Some(arguments) if arguments.kind() == "argument_list" => named_children(&arguments)
                .iter()
                .map(|a| self.expr(a))
                .collect(),
            // `f(x for x in y)` passes a bare generator expression
            Some(generator) => vec![self.expr(&generator)],
            None => Vec::new(),
        };
        ExprKind::Call {
            func: Box::new(self.expr(&func)),
            args,
        }
    }

    fn subscript(&self, node: &Node) -> ExprKind {
        let Some(value) = node.child_by_field_name("value") else {
            return self.other(node);
        };
        let mut cursor = node.walk();
        let slices = node
            .children_by_field_name("subscript", &mut cursor)
            .map(|s| self.expr(&s))
            .collect();
        ExprKind::Subscript {
            value: Box::new(self.expr(&value)),
            slices,
        }
    }

    fn comparison(&self, node: &Node) -> ExprKind {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.is_extra() {
                continue;
            }
            if child.is_named() {
                operands.push(self.expr(&child));
            } else if let Some(op) = CompareOp::from_token(child.kind()) {
                ops.push(op);
            } else {
                return self.other(node);
            }
        }
        if operands.len() < 2 || ops.len() != operands.len() - 1 {
            return self.other(node);
        }
        let left = operands.remove(0);
        ExprKind::Compare {
            left: Box::new(left),
            ops,
            comparators: operands,
        }
    }

    fn boolean(&self, node: &Node) -> ExprKind {
        let (Some(left), Some(op), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("operator"),
            node.child_by_field_name("right"),
        ) else {
            return self.other(node);
        };
        let op = match op.kind() {
            "and" => BoolOpKind::And,
            "or" => BoolOpKind::Or,
            _ => return self.other(node),
        };

        // Left-associative chains flatten into one operand list.
        let mut values = Vec::new();
        match self.expr(&left) {
            Expr {
                kind: ExprKind::BoolOp { op: inner, values: nested },
                ..
            } if inner == op => values.extend(nested),
            lowered => values.push(lowered),
        }
        values.push(self.expr(&right));
        ExprKind::BoolOp { op, values }
    }

    fn unary(&self, node: &Node) -> ExprKind {
        let operator = node
            .child_by_field_name("operator")
            .map(|o| o.kind())
            .unwrap_or_default();
        match node.child_by_field_name("argument") {
            Some(arg) if matches!(operator, "-" | "+") => match arg.kind() {
                "integer" => self.literal(node, LiteralKind::Int),
                "float" => self.literal(node, LiteralKind::Float),
                _ => self.other(node),
            },
            _ => self.other(node),
        }
    }

    fn collection(&self, node: &Node, kind: CollectionKind) -> ExprKind {
        ExprKind::Collection {
            kind,
            elements: named_children(node).iter().map(|c| self.expr(c)).collect(),
        }
    }

    /// `Other` node built from the named fields only, so binding names
    /// (keyword names, lambda parameters) are not mistaken for reads.
    fn fields(&self, node: &Node, fields: &[&str]) -> ExprKind {
        let children = fields
            .iter()
            .filter_map(|f| node.child_by_field_name(f))
            .map(|c| self.expr(&c))
            .collect();
        ExprKind::Other {
            node_kind: node.kind(),
            children,
        }
    }

    fn other(&self, node: &Node) -> ExprKind {
        ExprKind::Other {
            node_kind: node.kind(),
            children: named_children(node).iter().map(|c| self.expr(c)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (SourceUnit, usize) {
        let unit = SourceUnit::new("test.py", source);
        let count = SyntaxIndex::parse(&unit)
            .expect("should parse")
            .module()
            .stmts
            .len();
        (unit, count)
    }

    #[test]
    fn test_parse_simple_module() {
        let (_, count) = parse("x = 1\ny = x + 2\nprint(y)\n");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_parse_error_reports_location() {
        let unit = SourceUnit::new("broken.py", "def f(:\n    pass\n");
        let err = SyntaxIndex::parse(&unit).expect_err("should fail");
        match err {
            AnalysisError::Parse { unit, span, .. } => {
                assert_eq!(unit, "broken.py");
                assert_eq!(span.start.line, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_lowers_assignment_chain() {
        let unit = SourceUnit::new("t.py", "a = b = []\n");
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        match &index.module().stmts[0].kind {
            StmtKind::Assign { targets, value } => {
                assert_eq!(targets.len(), 2);
                assert!(matches!(
                    value.kind,
                    ExprKind::Collection {
                        kind: CollectionKind::List,
                        ..
                    }
                ));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_lowers_elif_chain() {
        let source = "if x == 1:\n    a()\nelif x == 2:\n    b()\nelse:\n    c()\n";
        let unit = SourceUnit::new("t.py", source);
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let stmt = &index.module().stmts[0];
        let StmtKind::If { orelse, .. } = &stmt.kind else {
            panic!("expected if");
        };
        let ElseBranch::Elif(elif) = orelse else {
            panic!("expected elif");
        };
        assert!(index.text(elif.span).starts_with("elif x == 2"));
        let StmtKind::If { orelse, .. } = &elif.kind else {
            panic!("expected nested if");
        };
        assert!(matches!(orelse, ElseBranch::Else(_)));
        assert_eq!(stmt.span.end_byte, source.trim_end().len());
        assert_eq!(&source[..stmt.header_end], "if x == 1:");
    }

    #[test]
    fn test_for_loop_fields() {
        let unit = SourceUnit::new("t.py", "for i, j in pairs:\n    total.append(i)\n");
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let StmtKind::For {
            target,
            iter,
            body,
            orelse,
            is_async,
        } = &index.module().stmts[0].kind
        else {
            panic!("expected for loop");
        };
        assert_eq!(target.target_names(), Some(vec!["i", "j"]));
        assert_eq!(iter.as_name(), Some("pairs"));
        assert_eq!(body.stmts.len(), 1);
        assert!(orelse.is_none());
        assert!(!is_async);
    }

    #[test]
    fn test_comparison_and_boolean_lowering() {
        let unit = SourceUnit::new("t.py", "ok = a == 1 and b in (2, 3) and not c\n");
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let StmtKind::Assign { value, .. } = &index.module().stmts[0].kind else {
            panic!("expected assignment");
        };
        let ExprKind::BoolOp { op, values } = &value.kind else {
            panic!("expected boolean operator, got {:?}", value.kind);
        };
        assert_eq!(*op, BoolOpKind::And);
        assert_eq!(values.len(), 3);
        assert!(matches!(
            &values[1].kind,
            ExprKind::Compare { ops, .. } if ops == &vec![CompareOp::In]
        ));
        assert!(matches!(values[2].kind, ExprKind::Not(_)));
    }

    #[test]
    fn test_negative_number_is_literal() {
        let unit = SourceUnit::new("t.py", "x = -1\n");
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let StmtKind::Assign { value, .. } = &index.module().stmts[0].kind else {
            panic!("expected assignment");
        };
        assert!(value.is_literal());
    }

    #[test]
    fn test_fstring_is_not_literal() {
        let unit = SourceUnit::new("t.py", "x = f\"{y}\"\nz = 'plain'\n");
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let values: Vec<bool> = index
            .module()
            .stmts
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Assign { value, .. } => value.is_literal(),
                _ => false,
            })
            .collect();
        assert_eq!(values, vec![false, true]);
    }

    #[test]
    fn test_frame_dependent_expressions() {
        let source = "\
a = super().f()
b = locals()['k']
c = g(vars())
d = (n := 1)
e = super(C, self).f()
f = dir(obj)
h = self.locals()
";
        let unit = SourceUnit::new("t.py", source);
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let flags: Vec<bool> = index
            .module()
            .stmts
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Assign { value, .. } => value.depends_on_frame(),
                _ => panic!("expected assignment"),
            })
            .collect();
        assert_eq!(flags, vec![true, true, true, true, false, false, false]);
    }

    #[test]
    fn test_comments_and_tokens() {
        let unit = SourceUnit::new("t.py", "# header\nx = 1  # trailing\n");
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        assert_eq!(index.comments_within(index.module().span).len(), 0);
        let everything = Span {
            start_byte: 0,
            end_byte: unit.text().len(),
            ..Default::default()
        };
        assert_eq!(index.comments_within(everything).len(), 2);
        // x, =, 1
        assert_eq!(index.token_count(), 3);
    }

    #[test]
    fn test_walk_tracks_scope_and_loops() {
        let source = "\
for a in xs:
    for b in ys:
        pass
def f():
    return 1
class C:
    y = 2
";
        let unit = SourceUnit::new("t.py", source);
        let index = SyntaxIndex::parse(&unit).expect("should parse");
        let mut seen = Vec::new();
        index.walk(&mut |site| {
            seen.push((
                index.text(site.stmt.span).lines().next().unwrap_or("").to_string(),
                site.scope,
                site.enclosing_loop.is_some(),
            ));
        });
        use crate::parsers::syntax::ScopeKind;
        assert!(seen.contains(&("pass".into(), ScopeKind::Module, true)));
        assert!(seen.contains(&("for b in ys:".into(), ScopeKind::Module, true)));
        assert!(seen.contains(&("for a in xs:".into(), ScopeKind::Module, false)));
        assert!(seen.contains(&("return 1".into(), ScopeKind::Function, false)));
        assert!(seen.contains(&("y = 2".into(), ScopeKind::Class, false)));
    }
}
