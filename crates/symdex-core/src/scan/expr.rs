//! Statements, expressions and type expressions.

use super::lexer::TokenKind;
use super::Parser;
use crate::model::{Binding, Node, TypeForm, UnaryOp};
use crate::patch::Span;

const BINARY_OPS: &[&str] = &[
    "||", "&&", "==", "!=", "<", "<=", ">", ">=", "+", "-", "|", "^", "*", "/", "%", "<<", ">>",
    "&", "&^", "<-",
];

const ASSIGN_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "&^=",
];

impl<'a> Parser<'a> {
    // ========================================================================
    // Statements
    // ========================================================================

    /// A `{ ... }` block; the current token is `{`.
    pub(crate) fn parse_block(&mut self) -> Node {
        let open = self.bump();
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if self.at_eof() || self.is("}") {
                break;
            }
            let before = self.pos;
            if let Some(stmt) = self.parse_stmt() {
                stmts.push(stmt);
            }
            if self.pos == before {
                self.bump();
            }
        }
        let close = self.bump();
        Node::Block {
            span: Span::new(open.span.start, close.span.end.max(open.span.start)),
            stmts,
        }
    }

    fn parse_stmt(&mut self) -> Option<Node> {
        let tok = self.peek();
        if tok.kind == TokenKind::Keyword {
            return match self.text(tok) {
                "var" | "const" => Some(self.parse_local_values()),
                "type" => Some(self.parse_local_types()),
                "if" => Some(self.parse_if()),
                "for" => Some(self.parse_for()),
                "switch" | "select" => Some(self.parse_switch()),
                "return" | "go" | "defer" => {
                    self.bump();
                    let items = if self.ends_stmt() {
                        Vec::new()
                    } else {
                        self.parse_expr_list(false)
                    };
                    Some(Node::list(items))
                }
                "break" | "continue" | "goto" | "fallthrough" => {
                    self.bump();
                    if self.is_kind(TokenKind::Ident) {
                        self.bump();
                    }
                    None
                }
                "case" => {
                    self.bump();
                    let stmt = self.parse_simple_stmt(false);
                    self.eat(":");
                    Some(stmt)
                }
                "default" => {
                    self.bump();
                    self.eat(":");
                    None
                }
                _ => Some(self.parse_simple_stmt(false)),
            };
        }
        if self.is("{") {
            return Some(self.parse_block());
        }
        if tok.kind == TokenKind::Ident && self.is_at(1, ":") {
            // Label.
            self.bump();
            self.bump();
            self.skip_semis();
            if self.is("}") {
                return None;
            }
            return self.parse_stmt();
        }
        Some(self.parse_simple_stmt(false))
    }

    fn ends_stmt(&self) -> bool {
        self.is_kind(TokenKind::Semi) || self.is("}") || self.at_eof()
    }

    /// Expression, send, inc/dec, assignment or short variable declaration.
    fn parse_simple_stmt(&mut self, no_lit: bool) -> Node {
        let lhs = self.parse_expr_list(no_lit);
        if self.eat(":=") {
            let values = self.parse_rhs(no_lit);
            let names = lhs
                .into_iter()
                .filter_map(|node| match node {
                    Node::Ident { name, span } => Some(Binding { name, span }),
                    _ => None,
                })
                .collect();
            return Node::Define {
                names,
                ty: None,
                values,
            };
        }
        if ASSIGN_OPS.iter().any(|op| self.is(op)) {
            self.bump();
            let values = self.parse_rhs(no_lit);
            return Node::Assign {
                targets: lhs,
                values,
            };
        }
        if self.eat("++") || self.eat("--") {
            return Node::Assign {
                targets: lhs,
                values: Vec::new(),
            };
        }
        Node::list(lhs)
    }

    fn parse_rhs(&mut self, no_lit: bool) -> Vec<Node> {
        if self.eat("range") {
            let operand = self.parse_expr(no_lit);
            return vec![Node::Unary {
                op: UnaryOp::Range,
                operand: Box::new(operand),
            }];
        }
        self.parse_expr_list(no_lit)
    }

    /// `var`/`const` inside a body, grouped or not.
    fn parse_local_values(&mut self) -> Node {
        self.bump();
        let mut defs = Vec::new();
        if self.eat("(") {
            loop {
                self.skip_semis();
                if self.at_eof() || self.eat(")") {
                    break;
                }
                let before = self.pos;
                defs.push(self.parse_local_value_spec());
                if self.pos == before {
                    self.bump();
                }
            }
        } else {
            defs.push(self.parse_local_value_spec());
        }
        if defs.len() == 1 {
            defs.remove(0)
        } else {
            Node::list(defs)
        }
    }

    fn parse_local_value_spec(&mut self) -> Node {
        let mut names = Vec::new();
        while self.is_kind(TokenKind::Ident) {
            let tok = self.bump();
            names.push(Binding {
                name: self.text(tok).to_string(),
                span: tok.span,
            });
            if !self.eat(",") {
                break;
            }
        }
        let ty = if !self.is("=") && self.starts_type() {
            Some(Box::new(self.parse_type()))
        } else {
            None
        };
        let values = if self.eat("=") {
            self.parse_expr_list(false)
        } else {
            Vec::new()
        };
        Node::Define { names, ty, values }
    }

    /// `type` inside a body.
    fn parse_local_types(&mut self) -> Node {
        self.bump();
        let mut defs = Vec::new();
        let grouped = self.eat("(");
        loop {
            self.skip_semis();
            if grouped && (self.at_eof() || self.eat(")")) {
                break;
            }
            if !self.is_kind(TokenKind::Ident) {
                break;
            }
            let name = self.bump();
            if self.is("[") && self.peek_at(1).kind == TokenKind::Ident && !self.is_at(2, "]") {
                self.skip_group();
            }
            self.eat("=");
            let ty = self.parse_type();
            defs.push(Node::Define {
                names: vec![Binding {
                    name: self.text(name).to_string(),
                    span: name.span,
                }],
                ty: Some(Box::new(ty)),
                values: Vec::new(),
            });
            if !grouped {
                break;
            }
        }
        if defs.len() == 1 {
            defs.remove(0)
        } else {
            Node::list(defs)
        }
    }

    fn parse_if(&mut self) -> Node {
        self.bump();
        let header = self.parse_header();
        let body = self.parse_body();
        let alt = if self.eat("else") {
            Some(Box::new(if self.is("if") {
                self.parse_if()
            } else {
                self.parse_body()
            }))
        } else {
            None
        };
        Node::Branch {
            header,
            body: Box::new(body),
            alt,
        }
    }

    fn parse_for(&mut self) -> Node {
        self.bump();
        let mut header = Vec::new();
        if !self.is("{") {
            if !self.is_kind(TokenKind::Semi) {
                header.push(self.parse_for_clause());
            }
            if self.is_kind(TokenKind::Semi) {
                self.bump();
                if !self.is_kind(TokenKind::Semi) {
                    header.push(self.parse_simple_stmt(true));
                }
                if self.is_kind(TokenKind::Semi) {
                    self.bump();
                }
                if !self.is("{") {
                    header.push(self.parse_simple_stmt(true));
                }
            }
        }
        let body = self.parse_body();
        Node::Branch {
            header,
            body: Box::new(body),
            alt: None,
        }
    }

    /// First clause of a `for`, which may be a bare `range x`.
    fn parse_for_clause(&mut self) -> Node {
        if self.is("range") {
            let rhs = self.parse_rhs(true);
            return Node::list(rhs);
        }
        self.parse_simple_stmt(true)
    }

    fn parse_switch(&mut self) -> Node {
        self.bump();
        let header = if self.is("{") {
            Vec::new()
        } else {
            self.parse_header()
        };
        let body = self.parse_body();
        Node::Branch {
            header,
            body: Box::new(body),
            alt: None,
        }
    }

    /// `init; cond` or `cond` before a block.
    fn parse_header(&mut self) -> Vec<Node> {
        let mut header = vec![self.parse_simple_stmt(true)];
        if self.is_kind(TokenKind::Semi) {
            self.bump();
            if !self.is("{") {
                header.push(self.parse_simple_stmt(true));
            }
        }
        header
    }

    fn parse_body(&mut self) -> Node {
        if self.is("{") {
            self.parse_block()
        } else {
            Node::Block {
                span: Span::at(self.peek().span.start),
                stmts: Vec::new(),
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Comma-separated expressions. `no_lit` forbids composite literals at
    /// the top level, where `{` opens a statement body instead.
    pub(crate) fn parse_expr_list(&mut self, no_lit: bool) -> Vec<Node> {
        let mut items = vec![self.parse_expr(no_lit)];
        while self.eat(",") {
            if self.ends_stmt() {
                break;
            }
            items.push(self.parse_expr(no_lit));
        }
        items
    }

    pub(crate) fn parse_expr(&mut self, no_lit: bool) -> Node {
        let mut lhs = self.parse_unary(no_lit);
        while BINARY_OPS.iter().any(|op| self.is(op)) {
            self.bump();
            let rhs = self.parse_unary(no_lit);
            lhs = Node::Binary {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        lhs
    }

    fn parse_unary(&mut self, no_lit: bool) -> Node {
        let op = match self.text(self.peek()) {
            "&" => UnaryOp::Ref,
            "*" => UnaryOp::Deref,
            "range" => UnaryOp::Range,
            "-" | "+" | "!" | "^" | "<-" => UnaryOp::Other,
            _ => return self.parse_primary(no_lit),
        };
        self.bump();
        let operand = self.parse_unary(no_lit);
        Node::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    fn parse_primary(&mut self, no_lit: bool) -> Node {
        let tok = self.peek();
        let mut node = match tok.kind {
            TokenKind::Ident => {
                self.bump();
                Node::ident(self.text(tok), tok.span)
            }
            TokenKind::Literal => {
                self.bump();
                Node::Literal { span: tok.span }
            }
            TokenKind::Punct if self.is("(") => {
                self.bump();
                let inner = self.parse_expr(false);
                self.skip_semis();
                self.eat(")");
                inner
            }
            TokenKind::Keyword if self.is("func") => self.parse_func_expr(),
            _ if self.starts_type() => self.parse_type(),
            _ => {
                if !self.ends_stmt() && !self.is(")") && !self.is("]") && !self.is(",") {
                    self.bump();
                }
                Node::Literal { span: tok.span }
            }
        };

        loop {
            if self.is(".") {
                self.bump();
                if self.is_kind(TokenKind::Ident) {
                    let name = self.bump();
                    node = Node::Selector {
                        base: Box::new(node),
                        name: self.text(name).to_string(),
                        span: name.span,
                    };
                } else if self.eat("(") {
                    let ty = if self.eat("type") {
                        None
                    } else {
                        Some(Box::new(self.parse_type()))
                    };
                    self.eat(")");
                    node = Node::TypeAssert {
                        base: Box::new(node),
                        ty,
                    };
                }
            } else if self.is("(") {
                let args = self.parse_call_args();
                node = Node::Call {
                    func: Box::new(node),
                    args,
                };
            } else if self.is("[") {
                let indices = self.parse_index();
                node = Node::Index {
                    base: Box::new(node),
                    indices,
                };
            } else if self.is("{") && !no_lit && is_literal_type(&node) {
                let elems = self.parse_composite_elems();
                node = Node::Composite {
                    ty: Some(Box::new(node)),
                    elems,
                };
            } else {
                break;
            }
        }
        node
    }

    /// `func(...) ... { ... }` literal, or a func type in expression position.
    fn parse_func_expr(&mut self) -> Node {
        self.bump();
        let params = self.parse_params();
        let results = self.parse_results();
        if self.is("{") {
            let body = self.parse_block();
            Node::FuncLit {
                params,
                results,
                body: Box::new(body),
            }
        } else {
            Node::TypeExpr {
                form: TypeForm::Func,
                parts: params
                    .into_iter()
                    .chain(results)
                    .map(|p| p.type_node)
                    .collect(),
            }
        }
    }

    fn parse_call_args(&mut self) -> Vec<Node> {
        self.bump();
        let mut args = Vec::new();
        loop {
            self.skip_semis();
            if self.at_eof() || self.eat(")") {
                break;
            }
            let before = self.pos;
            args.push(self.parse_expr(false));
            self.eat("...");
            self.eat(",");
            if self.pos == before {
                self.bump();
            }
        }
        args
    }

    fn parse_index(&mut self) -> Vec<Node> {
        self.bump();
        let mut indices = Vec::new();
        loop {
            self.skip_semis();
            if self.at_eof() || self.eat("]") {
                break;
            }
            if self.eat(":") || self.eat(",") {
                continue;
            }
            let before = self.pos;
            indices.push(self.parse_expr(false));
            if self.pos == before {
                self.bump();
            }
        }
        indices
    }

    /// Elements of `{ ... }`; the current token is `{`.
    fn parse_composite_elems(&mut self) -> Vec<Node> {
        self.bump();
        let mut elems = Vec::new();
        loop {
            self.skip_semis();
            if self.at_eof() || self.eat("}") {
                break;
            }
            let before = self.pos;
            let key = self.parse_element();
            let elem = if self.eat(":") {
                let value = self.parse_element();
                Node::KeyValue {
                    key: Box::new(key),
                    value: Box::new(value),
                }
            } else {
                key
            };
            elems.push(elem);
            self.eat(",");
            if self.pos == before {
                self.bump();
            }
        }
        elems
    }

    fn parse_element(&mut self) -> Node {
        if self.is("{") {
            let elems = self.parse_composite_elems();
            Node::Composite { ty: None, elems }
        } else {
            self.parse_expr(false)
        }
    }

    // ========================================================================
    // Types
    // ========================================================================

    pub(crate) fn parse_type(&mut self) -> Node {
        let tok = self.peek();
        match self.text(tok) {
            "*" if tok.kind == TokenKind::Punct => {
                self.bump();
                Node::Unary {
                    op: UnaryOp::Deref,
                    operand: Box::new(self.parse_type()),
                }
            }
            "(" if tok.kind == TokenKind::Punct => {
                self.bump();
                let inner = self.parse_type();
                self.eat(")");
                inner
            }
            "[" if tok.kind == TokenKind::Punct => {
                self.bump();
                if self.eat("]") {
                    let elem = self.parse_type();
                    return type_expr(TypeForm::Slice, vec![elem]);
                }
                let len = if self.eat("...") {
                    Node::Literal { span: tok.span }
                } else {
                    self.parse_expr(false)
                };
                self.eat("]");
                let elem = self.parse_type();
                type_expr(TypeForm::Array, vec![len, elem])
            }
            "..." if tok.kind == TokenKind::Punct => {
                self.bump();
                let elem = self.parse_type();
                type_expr(TypeForm::Variadic, vec![elem])
            }
            "<-" if tok.kind == TokenKind::Punct => {
                self.bump();
                self.eat("chan");
                let elem = self.parse_type();
                type_expr(TypeForm::Chan, vec![elem])
            }
            "map" if tok.kind == TokenKind::Keyword => {
                self.bump();
                self.eat("[");
                let key = self.parse_type();
                self.eat("]");
                let value = self.parse_type();
                type_expr(TypeForm::Map, vec![key, value])
            }
            "chan" if tok.kind == TokenKind::Keyword => {
                self.bump();
                self.eat("<-");
                let elem = self.parse_type();
                type_expr(TypeForm::Chan, vec![elem])
            }
            "func" if tok.kind == TokenKind::Keyword => {
                self.bump();
                let params = self.parse_params();
                let results = self.parse_results();
                type_expr(
                    TypeForm::Func,
                    params
                        .into_iter()
                        .chain(results)
                        .map(|p| p.type_node)
                        .collect(),
                )
            }
            "struct" if tok.kind == TokenKind::Keyword => {
                self.bump();
                let fields = self.parse_struct_fields();
                type_expr(
                    TypeForm::Struct,
                    fields.into_iter().map(|f| f.type_node).collect(),
                )
            }
            "interface" if tok.kind == TokenKind::Keyword => {
                self.bump();
                let (methods, embeds) = self.parse_interface_body();
                let parts = methods
                    .into_iter()
                    .flat_map(|m| m.params.into_iter().chain(m.results))
                    .map(|p| p.type_node)
                    .chain(embeds)
                    .collect();
                type_expr(TypeForm::Interface, parts)
            }
            _ if tok.kind == TokenKind::Ident => {
                self.bump();
                let mut node = Node::ident(self.text(tok), tok.span);
                if self.is(".") && self.peek_at(1).kind == TokenKind::Ident {
                    self.bump();
                    let name = self.bump();
                    node = Node::Selector {
                        base: Box::new(node),
                        name: self.text(name).to_string(),
                        span: name.span,
                    };
                }
                if self.is("[") && !self.is_at(1, "]") {
                    let indices = self.parse_type_args();
                    node = Node::Index {
                        base: Box::new(node),
                        indices,
                    };
                }
                node
            }
            _ => {
                if !matches!(tok.kind, TokenKind::Semi | TokenKind::Eof)
                    && !matches!(self.text(tok), ")" | "]" | "}" | "," | "=")
                {
                    self.bump();
                }
                Node::Literal { span: tok.span }
            }
        }
    }

    fn parse_type_args(&mut self) -> Vec<Node> {
        self.bump();
        let mut args = Vec::new();
        loop {
            if self.at_eof() || self.eat("]") {
                break;
            }
            let before = self.pos;
            args.push(self.parse_type());
            self.eat(",");
            if self.pos == before {
                self.bump();
            }
        }
        args
    }
}

fn type_expr(form: TypeForm, parts: Vec<Node>) -> Node {
    Node::TypeExpr { form, parts }
}

/// Expressions that can prefix a composite literal body.
fn is_literal_type(node: &Node) -> bool {
    match node {
        Node::Ident { .. } | Node::Selector { .. } => true,
        Node::Index { base, .. } => is_literal_type(base),
        Node::TypeExpr { form, .. } => matches!(
            form,
            TypeForm::Slice | TypeForm::Array | TypeForm::Map | TypeForm::Struct
        ),
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
