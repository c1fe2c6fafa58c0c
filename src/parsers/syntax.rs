//! Closed statement/expression tree lowered from the tree-sitter CST
//!
//! Rules and feature extraction match on these enums instead of raw node
//! kind strings. Every node keeps its byte span so text can always be
//! recovered from the original buffer.

use crate::models::Span;

/// A sequence of statements (module body or indented suite).
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    /// Byte just past the header colon of a compound statement, or the end
    /// of the statement for simple ones.
    pub header_end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `a = b = value`
    Assign { targets: Vec<Expr>, value: Expr },
    /// `target: annotation [= value]`
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    AugAssign {
        target: Expr,
        op: String,
        value: Expr,
    },
    Expr(Expr),
    For {
        target: Expr,
        iter: Expr,
        body: Block,
        orelse: Option<Block>,
        is_async: bool,
    },
    While {
        test: Expr,
        body: Block,
        orelse: Option<Block>,
    },
    If {
        test: Expr,
        body: Block,
        orelse: ElseBranch,
    },
    FunctionDef {
        name: String,
        decorators: Vec<Expr>,
        body: Block,
        is_async: bool,
    },
    ClassDef {
        name: String,
        decorators: Vec<Expr>,
        bases: Vec<Expr>,
        body: Block,
    },
    Return(Option<Expr>),
    /// with / try / match / case and anything else that owns blocks
    Compound {
        node_kind: &'static str,
        clauses: Vec<&'static str>,
        exprs: Vec<Expr>,
        blocks: Vec<Block>,
    },
    /// pass, import, raise, assert, del, global ...
    Simple {
        node_kind: &'static str,
        exprs: Vec<Expr>,
    },
}

/// What follows the body of an `if` or `elif`.
#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    None,
    /// The `elif` clause, lowered as a nested `If` starting at the keyword.
    Elif(Box<Stmt>),
    Else(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Int,
    Float,
    Str,
    Bytes,
    True,
    False,
    None,
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Tuple,
    List,
    Set,
    Dict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOpKind {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "==" => CompareOp::Eq,
            "!=" | "<>" => CompareOp::NotEq,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::LtE,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::GtE,
            "in" => CompareOp::In,
            "not in" => CompareOp::NotIn,
            "is" => CompareOp::Is,
            "is not" => CompareOp::IsNot,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Literal {
        kind: LiteralKind,
        text: String,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    /// Arguments in source order. Keyword arguments and splats appear as
    /// `Other` nodes (`keyword_argument`, `list_splat`, `dictionary_splat`).
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Subscript {
        value: Box<Expr>,
        slices: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CompareOp>,
        comparators: Vec<Expr>,
    },
    BoolOp {
        op: BoolOpKind,
        values: Vec<Expr>,
    },
    Not(Box<Expr>),
    Collection {
        kind: CollectionKind,
        elements: Vec<Expr>,
    },
    /// Everything else, tagged with the grammar node kind.
    Other {
        node_kind: &'static str,
        children: Vec<Expr>,
    },
}

/// A read of a name, with whether it happens inside a deferred body
/// (nested function, class or lambda) that may run at some other time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameRef<'a> {
    pub name: &'a str,
    pub span: Span,
    pub deferred: bool,
}

impl Expr {
    /// Immediate sub-expressions in source order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Name(_) | ExprKind::Literal { .. } => Vec::new(),
            ExprKind::Attribute { value, .. } => vec![value.as_ref()],
            ExprKind::Call { func, args } => {
                std::iter::once(func.as_ref()).chain(args.iter()).collect()
            }
            ExprKind::Subscript { value, slices } => {
                std::iter::once(value.as_ref()).chain(slices.iter()).collect()
            }
            ExprKind::Compare {
                left, comparators, ..
            } => std::iter::once(left.as_ref())
                .chain(comparators.iter())
                .collect(),
            ExprKind::BoolOp { values, .. } => values.iter().collect(),
            ExprKind::Not(inner) => vec![inner.as_ref()],
            ExprKind::Collection { elements, .. } => elements.iter().collect(),
            ExprKind::Other { children, .. } => children.iter().collect(),
        }
    }

    /// Pre-order traversal of this expression and all sub-expressions.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Strip redundant parentheses.
    pub fn unparen(&self) -> &Expr {
        let mut current = self;
        while let ExprKind::Other {
            node_kind: "parenthesized_expression",
            children,
        } = &current.kind
        {
            match children.as_slice() {
                [inner] => current = inner,
                _ => break,
            }
        }
        current
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.unparen().kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.unparen().kind, ExprKind::Literal { .. })
    }

    pub fn is_other(&self, kind: &str) -> bool {
        matches!(&self.kind, ExprKind::Other { node_kind, .. } if *node_kind == kind)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(&e.kind, ExprKind::Name(n) if n == name) {
                found = true;
            }
        });
        found
    }

    /// Whether evaluating this expression in a new scope (a lambda or a
    /// comprehension) could change its meaning: it suspends, binds a name,
    /// or calls a builtin that inspects the calling frame
    /// (`super()`, `locals()`, `vars()`, `dir()` without arguments).
    pub fn depends_on_frame(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| match &e.kind {
            ExprKind::Other { node_kind, .. }
                if matches!(*node_kind, "await" | "yield" | "named_expression") =>
            {
                found = true
            }
            ExprKind::Call { func, args } if args.is_empty() => {
                if let ExprKind::Name(callee) = &func.kind {
                    if matches!(callee.as_str(), "super" | "locals" | "vars" | "dir") {
                        found = true;
                    }
                }
            }
            _ => {}
        });
        found
    }

    /// Free of calls and of anything that suspends or binds.
    pub fn is_pure(&self) -> bool {
        let mut pure = true;
        self.walk(&mut |e| match &e.kind {
            ExprKind::Call { .. } => pure = false,
            ExprKind::Other { node_kind, .. }
                if matches!(*node_kind, "await" | "yield" | "named_expression") =>
            {
                pure = false
            }
            _ => {}
        });
        pure
    }

    /// Atoms and primaries, which never need parentheses after `in`.
    pub fn is_primary(&self) -> bool {
        match &self.kind {
            ExprKind::Name(_)
            | ExprKind::Literal { .. }
            | ExprKind::Attribute { .. }
            | ExprKind::Call { .. }
            | ExprKind::Subscript { .. }
            | ExprKind::Collection { .. } => true,
            ExprKind::Other { node_kind, .. } => matches!(
                *node_kind,
                "parenthesized_expression"
                    | "list_comprehension"
                    | "set_comprehension"
                    | "dictionary_comprehension"
                    | "generator_expression"
                    | "string"
                    | "concatenated_string"
            ),
            _ => false,
        }
    }

    /// Operands that would bind looser than `and` when spliced next to it.
    pub fn needs_parens_in_conjunction(&self) -> bool {
        match &self.kind {
            ExprKind::BoolOp {
                op: BoolOpKind::Or, ..
            } => true,
            ExprKind::Other { node_kind, .. } => matches!(
                *node_kind,
                "conditional_expression" | "lambda" | "named_expression" | "yield"
            ),
            _ => false,
        }
    }

    /// Names bound by a simple assignment target, or `None` when the target
    /// contains attributes, subscripts or starred parts.
    pub fn target_names(&self) -> Option<Vec<&str>> {
        let mut names = Vec::new();
        collect_target_names(self, &mut names)?;
        Some(names)
    }

    /// Collect every name read by this expression.
    pub fn collect_loads<'a>(&'a self, out: &mut Vec<NameRef<'a>>, deferred: bool) {
        match &self.kind {
            ExprKind::Name(name) => out.push(NameRef {
                name,
                span: self.span,
                deferred,
            }),
            ExprKind::Other {
                node_kind: "for_in_clause",
                children,
            } => {
                if let Some((target, rest)) = children.split_first() {
                    target.collect_target_loads(out, deferred);
                    for child in rest {
                        child.collect_loads(out, deferred);
                    }
                }
            }
            ExprKind::Other {
                node_kind: "named_expression",
                children,
            } => {
                for child in children.iter().skip(1) {
                    child.collect_loads(out, deferred);
                }
            }
            ExprKind::Other {
                node_kind: "lambda",
                children,
            } => {
                for child in children {
                    child.collect_loads(out, true);
                }
            }
            _ => {
                for child in self.children() {
                    child.collect_loads(out, deferred);
                }
            }
        }
    }

    /// Reads performed while storing into this expression as a target.
    pub fn collect_target_loads<'a>(&'a self, out: &mut Vec<NameRef<'a>>, deferred: bool) {
        match &self.kind {
            ExprKind::Name(_) => {}
            ExprKind::Attribute { value, .. } => value.collect_loads(out, deferred),
            ExprKind::Subscript { value, slices } => {
                value.collect_loads(out, deferred);
                for slice in slices {
                    slice.collect_loads(out, deferred);
                }
            }
            ExprKind::Collection { elements, .. } => {
                for element in elements {
                    element.collect_target_loads(out, deferred);
                }
            }
            ExprKind::Other {
                node_kind,
                children,
            } if is_target_group(node_kind) => {
                for child in children {
                    child.collect_target_loads(out, deferred);
                }
            }
            _ => self.collect_loads(out, deferred),
        }
    }
}

fn is_target_group(kind: &str) -> bool {
    matches!(
        kind,
        "pattern_list"
            | "tuple_pattern"
            | "list_pattern"
            | "parenthesized_expression"
            | "list_splat_pattern"
            | "expression_list"
    )
}

fn collect_target_names<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) -> Option<()> {
    match &expr.kind {
        ExprKind::Name(name) => {
            out.push(name);
            Some(())
        }
        ExprKind::Collection {
            kind: CollectionKind::Tuple | CollectionKind::List,
            elements,
        } => elements.iter().try_for_each(|e| collect_target_names(e, out)),
        ExprKind::Other {
            node_kind: "pattern_list" | "tuple_pattern" | "list_pattern" | "parenthesized_expression",
            children,
        } => children.iter().try_for_each(|e| collect_target_names(e, out)),
        _ => None,
    }
}

impl Stmt {
    pub fn is_compound(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::For { .. }
                | StmtKind::While { .. }
                | StmtKind::If { .. }
                | StmtKind::FunctionDef { .. }
                | StmtKind::ClassDef { .. }
                | StmtKind::Compound { .. }
        )
    }

    /// Expressions owned by this statement, including the tests of an
    /// `elif` chain but not anything inside nested blocks.
    pub fn exprs(&self) -> Vec<&Expr> {
        match &self.kind {
            StmtKind::Assign { targets, value } => {
                targets.iter().chain(std::iter::once(value)).collect()
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => [Some(target), Some(annotation), value.as_ref()]
                .into_iter()
                .flatten()
                .collect(),
            StmtKind::AugAssign { target, value, .. } => vec![target, value],
            StmtKind::Expr(expr) => vec![expr],
            StmtKind::For { target, iter, .. } => vec![target, iter],
            StmtKind::While { test, .. } => vec![test],
            StmtKind::If { test, orelse, .. } => {
                let mut exprs = vec![test];
                if let ElseBranch::Elif(next) = orelse {
                    exprs.extend(next.exprs());
                }
                exprs
            }
            StmtKind::FunctionDef { decorators, .. } => decorators.iter().collect(),
            StmtKind::ClassDef {
                decorators, bases, ..
            } => decorators.iter().chain(bases.iter()).collect(),
            StmtKind::Return(value) => value.iter().collect(),
            StmtKind::Compound { exprs, .. } | StmtKind::Simple { exprs, .. } => {
                exprs.iter().collect()
            }
        }
    }

    /// Nested blocks in source order, with `elif` chains flattened.
    pub fn blocks(&self) -> Vec<&Block> {
        match &self.kind {
            StmtKind::For { body, orelse, .. } | StmtKind::While { body, orelse, .. } => {
                std::iter::once(body).chain(orelse.iter()).collect()
            }
            StmtKind::If { body, orelse, .. } => {
                let mut blocks = vec![body];
                match orelse {
                    ElseBranch::None => {}
                    ElseBranch::Elif(next) => blocks.extend(next.blocks()),
                    ElseBranch::Else(block) => blocks.push(block),
                }
                blocks
            }
            StmtKind::FunctionDef { body, .. } | StmtKind::ClassDef { body, .. } => vec![body],
            StmtKind::Compound { blocks, .. } => blocks.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Collect every name read by this statement and its nested blocks.
    pub fn collect_loads<'a>(&'a self, out: &mut Vec<NameRef<'a>>, deferred: bool) {
        match &self.kind {
            StmtKind::Assign { targets, value } => {
                value.collect_loads(out, deferred);
                for target in targets {
                    target.collect_target_loads(out, deferred);
                }
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                annotation.collect_loads(out, deferred);
                if let Some(value) = value {
                    value.collect_loads(out, deferred);
                }
                target.collect_target_loads(out, deferred);
            }
            StmtKind::AugAssign { target, value, .. } => {
                // `x += 1` reads x before writing it
                target.collect_loads(out, deferred);
                value.collect_loads(out, deferred);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                iter.collect_loads(out, deferred);
                target.collect_target_loads(out, deferred);
                body.collect_loads(out, deferred);
                if let Some(orelse) = orelse {
                    orelse.collect_loads(out, deferred);
                }
            }
            StmtKind::FunctionDef {
                decorators, body, ..
            } => {
                for decorator in decorators {
                    decorator.collect_loads(out, deferred);
                }
                body.collect_loads(out, true);
            }
            StmtKind::ClassDef {
                decorators,
                bases,
                body,
                ..
            } => {
                for expr in decorators.iter().chain(bases) {
                    expr.collect_loads(out, deferred);
                }
                body.collect_loads(out, true);
            }
            _ => {
                for expr in self.exprs() {
                    expr.collect_loads(out, deferred);
                }
                for block in self.blocks() {
                    block.collect_loads(out, deferred);
                }
            }
        }
    }
}

impl Block {
    pub fn collect_loads<'a>(&'a self, out: &mut Vec<NameRef<'a>>, deferred: bool) {
        for stmt in &self.stmts {
            stmt.collect_loads(out, deferred);
        }
    }

    /// Visit every statement in the block tree with its compound-nesting
    /// depth (statements directly in this block are at depth 0).
    pub fn for_each_stmt<'a>(&'a self, f: &mut impl FnMut(&'a Stmt, usize)) {
        self.visit(0, f);
    }

    fn visit<'a>(&'a self, depth: usize, f: &mut impl FnMut(&'a Stmt, usize)) {
        for stmt in &self.stmts {
            f(stmt, depth);
            for block in stmt.blocks() {
                block.visit(depth + 1, f);
            }
        }
    }
}

/// The kind of scope a statement executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Class,
}

/// A statement together with where it sits in the tree.
#[derive(Debug, Clone, Copy)]
pub struct StmtSite<'s> {
    pub stmt: &'s Stmt,
    pub block: &'s Block,
    pub index: usize,
    pub scope: ScopeKind,
    /// Body of the innermost enclosing function/class, or the module.
    pub scope_body: &'s Block,
    /// Outermost loop enclosing this statement within its scope.
    pub enclosing_loop: Option<&'s Stmt>,
}

impl<'s> StmtSite<'s> {
    /// The statement immediately before this one in the same block.
    pub fn previous(&self) -> Option<&'s Stmt> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.block.stmts.get(i))
    }
}

/// Visit every statement reachable from `module` in source order. `elif`
/// clauses are not visited as statements themselves; their bodies are.
pub fn walk_statements<'s>(module: &'s Block, f: &mut impl FnMut(&StmtSite<'s>)) {
    walk_block(module, ScopeKind::Module, module, None, f);
}

fn walk_block<'s>(
    block: &'s Block,
    scope: ScopeKind,
    scope_body: &'s Block,
    enclosing_loop: Option<&'s Stmt>,
    f: &mut impl FnMut(&StmtSite<'s>),
) {
    for (index, stmt) in block.stmts.iter().enumerate() {
        f(&StmtSite {
            stmt,
            block,
            index,
            scope,
            scope_body,
            enclosing_loop,
        });

        match &stmt.kind {
            StmtKind::FunctionDef { body, .. } => {
                walk_block(body, ScopeKind::Function, body, None, f)
            }
            StmtKind::ClassDef { body, .. } => walk_block(body, ScopeKind::Class, body, None, f),
            StmtKind::For { .. } | StmtKind::While { .. } => {
                let outer = enclosing_loop.or(Some(stmt));
                for nested in stmt.blocks() {
                    walk_block(nested, scope, scope_body, outer, f);
                }
            }
            _ => {
                for nested in stmt.blocks() {
                    walk_block(nested, scope, scope_body, enclosing_loop, f);
                }
            }
        }
    }
}
