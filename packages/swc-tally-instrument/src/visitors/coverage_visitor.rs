use std::ops::Range as ByteRange;

use swc_core::{
    common::{BytePos, SourceMap, Span, Spanned},
    ecma::{
        ast::*,
        visit::{Visit, VisitWith},
    },
};
use tally_oxide::{BranchStatement, FileSchema};
use tracing::{debug, instrument};

use crate::{
    create_file_literal, create_line_call, create_statement_call,
    utils::{edit_buffer::EditBuffer, hint_comments::BypassRanges, lookup_range::get_range_from_span},
    InstrumentOptions,
};

/// Walks a parsed file, children before parents, rewriting its text in an [`EditBuffer`]
/// and collecting the [`FileSchema`] of every tracked line and branch statement.
pub struct CoverageVisitor<'a> {
    source_map: &'a SourceMap,
    start_pos: BytePos,
    buffer: EditBuffer<'a>,
    bypass: BypassRanges,
    coverage_variable: String,
    file_literal: String,
    schema: FileSchema,
    next_id: u32,
    /// Set while visiting a direct operand of a logical expression.
    in_logical: bool,
    /// Where the line call of the next visited statement goes, if not in front of it.
    anchor: Option<Span>,
}

impl<'a> CoverageVisitor<'a> {
    pub fn new(
        source_map: &'a SourceMap,
        start_pos: BytePos,
        source: &'a str,
        bypass: BypassRanges,
        options: &InstrumentOptions,
        filename: &str,
    ) -> CoverageVisitor<'a> {
        CoverageVisitor {
            source_map,
            start_pos,
            buffer: EditBuffer::new(source),
            bypass,
            coverage_variable: options.coverage_variable.clone(),
            file_literal: create_file_literal(filename),
            schema: FileSchema::new(filename.to_string()),
            next_id: 0,
            in_logical: false,
            anchor: None,
        }
    }

    /// Reassembled text and the collected schema.
    pub fn finish(self) -> (String, FileSchema) {
        (self.buffer.finish(), self.schema)
    }

    fn offset(&self, pos: BytePos) -> usize {
        pos.0.saturating_sub(self.start_pos.0) as usize
    }

    fn byte_range(&self, span: Span) -> ByteRange<usize> {
        self.offset(span.lo)..self.offset(span.hi)
    }

    fn is_bypassed(&self, span: Span) -> bool {
        !self.bypass.is_empty() && self.bypass.contains(self.offset(span.lo))
    }

    fn line_of(&self, span: Span) -> u32 {
        get_range_from_span(self.source_map, &span).start.line
    }

    fn source(&self, span: Span) -> String {
        self.buffer.source(self.byte_range(span))
    }

    fn replace(&mut self, span: Span, text: String) {
        let range = self.byte_range(span);
        self.buffer.replace(range, text);
    }

    /// Prefix the text at `anchor` with a line call for `line`.
    fn insert_line_call(&mut self, anchor: Span, line: u32) {
        self.schema.lines.push(line);
        let call = create_line_call(&self.coverage_variable, &self.file_literal, line);
        let text = format!("{}{}", call, self.source(anchor));
        self.replace(anchor, text);
    }

    /// Register `expr` as a branch statement keyed by `line` and return its statement call.
    fn create_branch(&mut self, expr: &Expr, line: u32, outcome_scored: bool) -> String {
        self.next_id += 1;
        let id = self.next_id;
        let loc = get_range_from_span(self.source_map, &unparen(expr).span());

        debug!(id, line, outcome_scored, "registered branch statement");
        self.schema.statements.push(BranchStatement {
            id,
            line,
            loc,
            outcome_scored,
        });

        let mut value = self.source(expr.span());
        // a bare sequence would split into several call arguments
        if let Expr::Seq(_) = expr {
            value = format!("({})", value);
        }

        create_statement_call(&self.coverage_variable, &self.file_literal, id, line, &value)
    }

    /// Wrap an expression in a test position so both of its outcomes are scored.
    fn cover_test(&mut self, test: &Expr) {
        if self.is_bypassed(test.span()) || is_composite(test) {
            return;
        }

        let line = self.line_of(test.span());
        let call = self.create_branch(test, line, true);
        self.replace(test.span(), call);
    }

    fn cover_logical(&mut self, bin: &BinExpr, nested: bool) {
        self.in_logical = true;
        bin.left.visit_with(self);
        self.in_logical = true;
        bin.right.visit_with(self);
        self.in_logical = false;

        let line = self.line_of(bin.span);
        let left = self.create_branch(&bin.left, line, !is_composite(&bin.left));
        let right = self.create_branch(&bin.right, line, nested && !is_composite(&bin.right));
        self.replace(bin.span, format!("({}{}{})", left, bin.op.as_str(), right));
    }

    /// Give a non-block branch body braces so a line call can precede it.
    fn wrap_block(&mut self, body: &Stmt) {
        if matches!(body, Stmt::Block(_)) {
            return;
        }

        let text = format!("{{{}}}", self.source(body.span()));
        self.replace(body.span(), text);
    }
}

impl Visit for CoverageVisitor<'_> {
    #[instrument(skip_all, fields(node = "Stmt"))]
    fn visit_stmt(&mut self, stmt: &Stmt) {
        let anchor = self.anchor.take().unwrap_or_else(|| stmt.span());
        if self.is_bypassed(stmt.span()) {
            debug!(line = self.line_of(stmt.span()), "skipped bypassed statement");
            return;
        }

        if let Stmt::Labeled(_) = stmt {
            self.anchor = Some(anchor);
        }
        stmt.visit_children_with(self);

        match stmt {
            Stmt::If(s) => {
                self.wrap_block(&s.cons);
                if let Some(alt) = &s.alt {
                    self.wrap_block(alt);
                }
            }
            Stmt::While(WhileStmt { body, .. })
            | Stmt::DoWhile(DoWhileStmt { body, .. })
            | Stmt::For(ForStmt { body, .. })
            | Stmt::ForIn(ForInStmt { body, .. })
            | Stmt::ForOf(ForOfStmt { body, .. })
            | Stmt::With(WithStmt { body, .. }) => self.wrap_block(body),
            _ => {}
        }

        if is_tracked(stmt) {
            let line = self.line_of(stmt.span());
            self.insert_line_call(anchor, line);
        }
    }

    #[instrument(skip_all, fields(node = "ModuleDecl"))]
    fn visit_module_decl(&mut self, decl: &ModuleDecl) {
        if self.is_bypassed(decl.span()) {
            debug!(line = self.line_of(decl.span()), "skipped bypassed declaration");
            return;
        }

        decl.visit_children_with(self);

        if let ModuleDecl::ExportDecl(export) = decl {
            if matches!(export.decl, Decl::Var(_) | Decl::Fn(_)) {
                let line = self.line_of(export.decl.span());
                self.insert_line_call(export.span, line);
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        let nested = std::mem::take(&mut self.in_logical);
        if self.is_bypassed(expr.span()) {
            return;
        }

        match expr {
            Expr::Paren(paren) => {
                self.in_logical = nested;
                paren.expr.visit_with(self);
            }
            Expr::Bin(bin) if is_logical(bin.op) => self.cover_logical(bin, nested),
            _ => expr.visit_children_with(self),
        }
    }

    #[instrument(skip_all, fields(node = "CondExpr"))]
    fn visit_cond_expr(&mut self, node: &CondExpr) {
        node.test.visit_with(self);
        self.cover_test(&node.test);
        node.cons.visit_with(self);
        node.alt.visit_with(self);

        let line = self.line_of(node.span);
        let cons = self.create_branch(&node.cons, line, false);
        let alt = self.create_branch(&node.alt, line, false);
        let test = self.source(node.test.span());
        self.replace(node.span, format!("({}? {} : {})", test, cons, alt));
    }

    #[instrument(skip_all, fields(node = "IfStmt"))]
    fn visit_if_stmt(&mut self, node: &IfStmt) {
        node.test.visit_with(self);
        self.cover_test(&node.test);
        node.cons.visit_with(self);
        node.alt.visit_with(self);
    }

    #[instrument(skip_all, fields(node = "WhileStmt"))]
    fn visit_while_stmt(&mut self, node: &WhileStmt) {
        node.test.visit_with(self);
        self.cover_test(&node.test);
        node.body.visit_with(self);
    }

    #[instrument(skip_all, fields(node = "DoWhileStmt"))]
    fn visit_do_while_stmt(&mut self, node: &DoWhileStmt) {
        node.body.visit_with(self);
        node.test.visit_with(self);
        self.cover_test(&node.test);
    }

    #[instrument(skip_all, fields(node = "ForStmt"))]
    fn visit_for_stmt(&mut self, node: &ForStmt) {
        node.init.visit_with(self);
        if let Some(test) = &node.test {
            test.visit_with(self);
            self.cover_test(test);
        }
        node.update.visit_with(self);
        node.body.visit_with(self);
    }
}

fn unparen(mut expr: &Expr) -> &Expr {
    while let Expr::Paren(paren) = expr {
        expr = &paren.expr;
    }
    expr
}

fn is_logical(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing
    )
}

/// Ternary or logical expression, ignoring parentheses.
fn is_composite(expr: &Expr) -> bool {
    match unparen(expr) {
        Expr::Cond(_) => true,
        Expr::Bin(bin) => is_logical(bin.op),
        _ => false,
    }
}

/// Statements prefixed with a line call. Loop heads never reach here: their
/// declarations are not statements.
fn is_tracked(stmt: &Stmt) -> bool {
    match stmt {
        // a prefix would turn a directive prologue into a plain expression
        Stmt::Expr(ExprStmt { expr, .. }) => !matches!(&**expr, Expr::Lit(Lit::Str(_))),
        Stmt::Decl(decl) => matches!(decl, Decl::Var(_) | Decl::Fn(_)),
        Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Return(_)
        | Stmt::Throw(_)
        | Stmt::Try(_)
        | Stmt::If(_)
        | Stmt::While(_)
        | Stmt::DoWhile(_)
        | Stmt::For(_)
        | Stmt::ForIn(_)
        | Stmt::ForOf(_)
        | Stmt::Switch(_)
        | Stmt::With(_) => true,
        _ => false,
    }
}
