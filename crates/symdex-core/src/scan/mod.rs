//! Source scanner: builds a [`SourceFile`] from Go-shaped source text.
//!
//! The scanner is deliberately shallow. It recognizes the declaration
//! structure (package clause, imports, types, functions, methods, vars and
//! consts) exactly and reduces function bodies and initializers to the
//! name-use tree in [`crate::model::Node`]. It never type-checks and it
//! tolerates constructs it does not model by skipping tokens; the only hard
//! errors are a missing package clause and unbalanced delimiters.

mod expr;
mod lexer;

use std::collections::HashSet;

use crate::error::{SymdexError, SymdexResult};
use crate::model::{
    FieldDecl, FuncDecl, ImportDecl, InterfaceMethod, Node, ParamDecl, SourceFile, TypeDecl,
    TypeKind, ValueDecl,
};
use crate::patch::Span;

use lexer::{Comment, Token, TokenKind};

/// Scan `content` into a [`SourceFile`] at `path`.
pub fn parse_file(path: &str, content: &str) -> SymdexResult<SourceFile> {
    let lexed = lexer::lex(path, content)?;
    check_balance(path, content, &lexed.tokens)?;
    let mut parser = Parser::new(path, content, lexed.tokens, lexed.comments);
    let mut file = SourceFile::new(path, content);
    parser.parse_into(&mut file)?;
    tracing::debug!(
        file = path,
        types = file.types.len(),
        functions = file.functions.len(),
        methods = file.methods.len(),
        "scanned file"
    );
    Ok(file)
}

/// Reject files whose brackets do not pair up.
fn check_balance(path: &str, src: &str, tokens: &[Token]) -> SymdexResult<()> {
    let mut stack: Vec<(char, u32)> = Vec::new();
    for tok in tokens.iter().filter(|t| t.kind == TokenKind::Punct) {
        let text = tok.span.slice(src).unwrap_or("");
        match text {
            "(" | "[" | "{" => stack.extend(text.chars().map(|c| (c, tok.line))),
            ")" | "]" | "}" => {
                let open = match text {
                    ")" => '(',
                    "]" => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((c, _)) if c == open => {}
                    _ => {
                        return Err(SymdexError::Parse {
                            file: path.to_string(),
                            line: tok.line,
                            message: format!("unexpected '{}'", text),
                        })
                    }
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some((c, line)) => Err(SymdexError::Parse {
            file: path.to_string(),
            line,
            message: format!("unclosed '{}'", c),
        }),
        None => Ok(()),
    }
}

// ============================================================================
// Parser state
// ============================================================================

pub(crate) struct Parser<'a> {
    file: &'a str,
    src: &'a str,
    toks: Vec<Token>,
    comments: Vec<Comment>,
    /// Lines holding code; a comment sharing a line with code is not a doc comment.
    code_lines: HashSet<u32>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(file: &'a str, src: &'a str, toks: Vec<Token>, comments: Vec<Comment>) -> Self {
        let code_lines = toks
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::Semi | TokenKind::Eof))
            .map(|t| t.line)
            .collect();
        Parser {
            file,
            src,
            toks,
            comments,
            code_lines,
            pos: 0,
        }
    }

    pub(crate) fn peek(&self) -> Token {
        self.peek_at(0)
    }

    pub(crate) fn peek_at(&self, n: usize) -> Token {
        let last = self.toks.len().saturating_sub(1);
        self.toks[(self.pos + n).min(last)]
    }

    pub(crate) fn text(&self, tok: Token) -> &'a str {
        tok.span.slice(self.src).unwrap_or("")
    }

    /// Current token is the keyword or punctuation `text`.
    pub(crate) fn is(&self, text: &str) -> bool {
        self.is_at(0, text)
    }

    pub(crate) fn is_at(&self, n: usize, text: &str) -> bool {
        let tok = self.peek_at(n);
        matches!(tok.kind, TokenKind::Keyword | TokenKind::Punct) && self.text(tok) == text
    }

    pub(crate) fn is_kind(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.is_kind(TokenKind::Eof)
    }

    pub(crate) fn bump(&mut self) -> Token {
        let tok = self.peek();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn eat(&mut self, text: &str) -> bool {
        if self.is(text) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn skip_semis(&mut self) {
        while self.is_kind(TokenKind::Semi) {
            self.bump();
        }
    }

    /// End offset of the last consumed non-terminator token.
    pub(crate) fn prev_end(&self) -> u64 {
        self.toks[..self.pos]
            .iter()
            .rev()
            .find(|t| t.kind != TokenKind::Semi)
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> SymdexError {
        SymdexError::Parse {
            file: self.file.to_string(),
            line: self.peek().line,
            message: message.into(),
        }
    }

    fn expect_ident(&mut self, what: &str) -> SymdexResult<Token> {
        if self.is_kind(TokenKind::Ident) {
            Ok(self.bump())
        } else {
            Err(self.error(format!(
                "expected {}, found '{}'",
                what,
                self.text(self.peek())
            )))
        }
    }

    /// Skip a bracketed group starting at the current opening token.
    pub(crate) fn skip_group(&mut self) {
        let mut depth = 0usize;
        loop {
            let tok = self.bump();
            match self.text(tok) {
                "(" | "[" | "{" if tok.kind == TokenKind::Punct => depth += 1,
                ")" | "]" | "}" if tok.kind == TokenKind::Punct => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
            if tok.kind == TokenKind::Eof || depth == 0 {
                return;
            }
        }
    }

    /// Skip to the end of the current top-level statement.
    fn skip_statement(&mut self) {
        while !self.at_eof() && !self.is_kind(TokenKind::Semi) {
            if self.is("(") || self.is("[") || self.is("{") {
                self.skip_group();
            } else {
                self.bump();
            }
        }
    }

    /// Doc comment group ending on the line before `line`.
    fn doc_for(&self, line: u32) -> Option<String> {
        let mut expected = line.checked_sub(1)?;
        let mut lines = Vec::new();
        for comment in self
            .comments
            .iter()
            .rev()
            .filter(|c| c.end_line < line && !self.code_lines.contains(&c.start_line))
        {
            if comment.end_line != expected {
                break;
            }
            lines.push(comment.text.as_str());
            expected = comment.start_line.saturating_sub(1);
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }

    // ========================================================================
    // Top level
    // ========================================================================

    fn parse_into(&mut self, file: &mut SourceFile) -> SymdexResult<()> {
        self.skip_semis();
        if !self.eat("package") {
            return Err(self.error("expected package clause"));
        }
        let name = self.expect_ident("package name")?;
        file.package_name = self.text(name).to_string();
        file.package_span = name.span;

        loop {
            self.skip_semis();
            if self.at_eof() {
                break;
            }
            let before = self.pos;
            if self.is("import") {
                self.parse_imports(file);
            } else if self.is("type") {
                for decl in self.parse_type_decls() {
                    file.types.insert(decl.name.clone(), decl);
                }
            } else if self.is("func") {
                if let Some(decl) = self.parse_func_decl() {
                    if decl.is_method() {
                        file.methods.push(decl);
                    } else {
                        file.functions.insert(decl.name.clone(), decl);
                    }
                }
            } else if self.is("var") || self.is("const") {
                let is_const = self.is("const");
                for decl in self.parse_value_decls() {
                    if decl.name == "_" {
                        file.blanks.push(decl);
                    } else if is_const {
                        file.constants.insert(decl.name.clone(), decl);
                    } else {
                        file.variables.insert(decl.name.clone(), decl);
                    }
                }
            } else {
                self.skip_statement();
            }
            if self.pos == before {
                self.bump();
            }
        }
        Ok(())
    }

    /// Run `spec` once, or once per line of a parenthesized group.
    fn grouped<T>(&mut self, mut spec: impl FnMut(&mut Self, Option<String>) -> Vec<T>) -> Vec<T> {
        let keyword = self.bump();
        let mut out = Vec::new();
        if self.eat("(") {
            loop {
                self.skip_semis();
                if self.at_eof() || self.eat(")") {
                    break;
                }
                let before = self.pos;
                let doc = self.doc_for(self.peek().line);
                out.extend(spec(self, doc));
                if self.pos == before {
                    self.bump();
                }
            }
        } else {
            let doc = self.doc_for(keyword.line);
            out.extend(spec(self, doc));
        }
        out
    }

    fn parse_imports(&mut self, file: &mut SourceFile) {
        let imports = self.grouped(|p, _| p.parse_import_spec().into_iter().collect::<Vec<_>>());
        file.imports.extend(imports);
    }

    fn parse_import_spec(&mut self) -> Option<ImportDecl> {
        let mut alias = None;
        if self.is_kind(TokenKind::Ident) || self.is(".") {
            let tok = self.bump();
            alias = Some((self.text(tok).to_string(), tok.span));
        }
        if !self.is_kind(TokenKind::Literal) {
            self.skip_statement();
            return None;
        }
        let lit = self.bump();
        let path = self.text(lit).trim_matches(|c| c == '"' || c == '`');
        Some(ImportDecl {
            path: path.to_string(),
            path_span: lit.span,
            alias: alias.as_ref().map(|(name, _)| name.clone()),
            alias_span: alias.map(|(_, span)| span),
        })
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn parse_type_decls(&mut self) -> Vec<TypeDecl> {
        let keyword_start = self.peek().span.start;
        let in_group = self.is_at(1, "(");
        self.grouped(|p, doc| {
            let start = if in_group {
                p.peek().span.start
            } else {
                keyword_start
            };
            p.parse_type_spec(start, doc).into_iter().collect()
        })
    }

    fn parse_type_spec(&mut self, start: u64, doc: Option<String>) -> Option<TypeDecl> {
        if !self.is_kind(TokenKind::Ident) {
            self.skip_statement();
            return None;
        }
        let name = self.bump();
        if self.has_type_params() {
            self.skip_group();
        }
        self.eat("=");
        let kind = if self.is("struct") {
            self.bump();
            TypeKind::Struct {
                fields: self.parse_struct_fields(),
            }
        } else if self.is("interface") {
            self.bump();
            let (methods, embeds) = self.parse_interface_body();
            TypeKind::Interface { methods, embeds }
        } else {
            TypeKind::Other {
                underlying: self.parse_type(),
            }
        };
        Some(TypeDecl {
            name: self.text(name).to_string(),
            name_span: name.span,
            extent: Span::new(start, self.prev_end().max(start)),
            kind,
            doc,
        })
    }

    /// `[T any]` after a type name, as opposed to an array type `[N]T`.
    fn has_type_params(&self) -> bool {
        self.is("[") && self.peek_at(1).kind == TokenKind::Ident && !self.is_at(2, "]")
    }

    /// Fields of a `struct { ... }` body; the current token is `{`.
    pub(crate) fn parse_struct_fields(&mut self) -> Vec<FieldDecl> {
        let mut fields = Vec::new();
        if !self.eat("{") {
            return fields;
        }
        loop {
            self.skip_semis();
            if self.at_eof() || self.eat("}") {
                break;
            }
            let before = self.pos;
            let doc = self.doc_for(self.peek().line);
            fields.extend(self.parse_field_line(doc));
            if self.is_kind(TokenKind::Literal) {
                self.bump();
            }
            if self.pos == before {
                self.bump();
            }
        }
        fields
    }

    fn parse_field_line(&mut self, doc: Option<String>) -> Vec<FieldDecl> {
        let first = self.peek();
        let next = self.peek_at(1);
        let embedded = first.kind != TokenKind::Ident
            || self.is_at(1, ".")
            || matches!(next.kind, TokenKind::Semi | TokenKind::Literal)
            || self.is_at(1, "}");

        if embedded {
            let type_start = self.peek().span.start;
            let type_node = self.parse_type();
            let type_span = Span::new(type_start, self.prev_end().max(type_start));
            let Some(name_span) = embedded_name_span(&type_node) else {
                return Vec::new();
            };
            let name = type_node.base_type_name().unwrap_or("").to_string();
            return vec![FieldDecl {
                name,
                name_span,
                type_span,
                type_node,
                embedded: true,
                doc,
            }];
        }

        let mut names = vec![self.bump()];
        while self.eat(",") {
            if self.is_kind(TokenKind::Ident) {
                names.push(self.bump());
            }
        }
        let type_start = self.peek().span.start;
        let type_node = self.parse_type();
        let type_span = Span::new(type_start, self.prev_end().max(type_start));
        names
            .into_iter()
            .map(|tok| FieldDecl {
                name: self.text(tok).to_string(),
                name_span: tok.span,
                type_span,
                type_node: type_node.clone(),
                embedded: false,
                doc: doc.clone(),
            })
            .collect()
    }

    /// Methods and embedded types of an `interface { ... }` body.
    pub(crate) fn parse_interface_body(&mut self) -> (Vec<InterfaceMethod>, Vec<Node>) {
        let mut methods = Vec::new();
        let mut embeds = Vec::new();
        if !self.eat("{") {
            return (methods, embeds);
        }
        loop {
            self.skip_semis();
            if self.at_eof() || self.eat("}") {
                break;
            }
            let before = self.pos;
            if self.is_kind(TokenKind::Ident) && self.is_at(1, "(") {
                let name = self.bump();
                let sig_start = self.peek().span.start;
                let params = self.parse_params();
                let results = self.parse_results();
                methods.push(InterfaceMethod {
                    name: self.text(name).to_string(),
                    name_span: name.span,
                    signature_span: Span::new(sig_start, self.prev_end().max(sig_start)),
                    params,
                    results,
                });
            } else {
                // Embedded interface or a type-set union.
                loop {
                    self.eat("~");
                    embeds.push(self.parse_type());
                    if !self.eat("|") {
                        break;
                    }
                }
            }
            if self.pos == before {
                self.bump();
            }
        }
        (methods, embeds)
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn parse_func_decl(&mut self) -> Option<FuncDecl> {
        let keyword = self.bump();
        let doc = self.doc_for(keyword.line);
        let receiver = if self.is("(") {
            self.parse_params().into_iter().next()
        } else {
            None
        };
        if !self.is_kind(TokenKind::Ident) {
            self.skip_statement();
            return None;
        }
        let name = self.bump();
        if self.is("[") {
            self.skip_group();
        }
        let sig_start = self.peek().span.start;
        let params = self.parse_params();
        let results = self.parse_results();
        let signature_span = Span::new(sig_start, self.prev_end().max(sig_start));
        let body = if self.is("{") {
            Some(self.parse_block())
        } else {
            None
        };
        Some(FuncDecl {
            name: self.text(name).to_string(),
            name_span: name.span,
            extent: Span::new(keyword.span.start, self.prev_end()),
            receiver,
            params,
            results,
            signature_span,
            body,
            doc,
        })
    }

    /// A parenthesized parameter list.
    ///
    /// Entries are either all named or all unnamed; in a named list a bare
    /// identifier shares the type of the next named entry (`a, b int`).
    pub(crate) fn parse_params(&mut self) -> Vec<ParamDecl> {
        let mut entries: Vec<(Option<Token>, Span, Node)> = Vec::new();
        if !self.eat("(") {
            return Vec::new();
        }
        loop {
            self.skip_semis();
            if self.at_eof() || self.eat(")") {
                break;
            }
            let before = self.pos;
            let name = if self.param_is_named() {
                Some(self.bump())
            } else {
                None
            };
            let type_start = self.peek().span.start;
            let type_node = self.parse_type();
            let type_span = Span::new(type_start, self.prev_end().max(type_start));
            entries.push((name, type_span, type_node));
            self.eat(",");
            if self.pos == before {
                self.bump();
            }
        }

        if entries.iter().all(|(name, _, _)| name.is_none()) {
            return entries
                .into_iter()
                .map(|(_, type_span, type_node)| ParamDecl {
                    name: None,
                    name_span: None,
                    type_span,
                    type_node,
                })
                .collect();
        }

        let mut params: Vec<ParamDecl> = Vec::with_capacity(entries.len());
        let mut pending: Vec<(String, Span)> = Vec::new();
        for (name, type_span, type_node) in entries {
            match name {
                Some(tok) => {
                    for (pending_name, pending_span) in pending.drain(..) {
                        params.push(ParamDecl {
                            name: Some(pending_name),
                            name_span: Some(pending_span),
                            type_span,
                            type_node: type_node.clone(),
                        });
                    }
                    params.push(ParamDecl {
                        name: Some(self.text(tok).to_string()),
                        name_span: Some(tok.span),
                        type_span,
                        type_node,
                    });
                }
                None => {
                    if let Node::Ident { name, span } = type_node {
                        pending.push((name, span));
                    }
                }
            }
        }
        params
    }

    /// The current identifier names a parameter rather than starting its type.
    fn param_is_named(&self) -> bool {
        if !self.is_kind(TokenKind::Ident) {
            return false;
        }
        let next = self.peek_at(1);
        match next.kind {
            TokenKind::Ident => true,
            TokenKind::Keyword => matches!(
                self.text(next),
                "func" | "map" | "chan" | "struct" | "interface"
            ),
            TokenKind::Punct => match self.text(next) {
                "*" | "..." | "(" | "<-" => true,
                // `x []T` or `x [4]T`, not a generic instantiation `T[int]`.
                "[" => self.is_at(2, "]") || self.peek_at(2).kind == TokenKind::Literal,
                _ => false,
            },
            _ => false,
        }
    }

    /// Function results: a parameter list, a single type, or nothing.
    pub(crate) fn parse_results(&mut self) -> Vec<ParamDecl> {
        if self.is("(") {
            return self.parse_params();
        }
        if !self.starts_type() {
            return Vec::new();
        }
        let type_start = self.peek().span.start;
        let type_node = self.parse_type();
        vec![ParamDecl {
            name: None,
            name_span: None,
            type_span: Span::new(type_start, self.prev_end().max(type_start)),
            type_node,
        }]
    }

    pub(crate) fn starts_type(&self) -> bool {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Ident => true,
            TokenKind::Keyword => matches!(
                self.text(tok),
                "func" | "map" | "chan" | "struct" | "interface"
            ),
            TokenKind::Punct => matches!(self.text(tok), "*" | "[" | "<-" | "("),
            _ => false,
        }
    }

    // ========================================================================
    // Values
    // ========================================================================

    fn parse_value_decls(&mut self) -> Vec<ValueDecl> {
        let keyword_start = self.peek().span.start;
        let in_group = self.is_at(1, "(");
        self.grouped(|p, doc| {
            let start = if in_group {
                p.peek().span.start
            } else {
                keyword_start
            };
            p.parse_value_spec(start, doc)
        })
    }

    fn parse_value_spec(&mut self, start: u64, doc: Option<String>) -> Vec<ValueDecl> {
        let mut names = Vec::new();
        while self.is_kind(TokenKind::Ident) {
            names.push(self.bump());
            if !self.eat(",") {
                break;
            }
        }
        if names.is_empty() {
            self.skip_statement();
            return Vec::new();
        }
        let (type_span, type_node) = if self.starts_type() && !self.is("=") {
            let type_start = self.peek().span.start;
            let node = self.parse_type();
            (
                Some(Span::new(type_start, self.prev_end().max(type_start))),
                Some(node),
            )
        } else {
            (None, None)
        };
        let mut values = if self.eat("=") {
            self.parse_expr_list(false)
        } else {
            Vec::new()
        };
        let extent = Span::new(start, self.prev_end().max(start));
        let paired = values.len() == names.len();
        let mut shared = if paired || values.is_empty() {
            None
        } else {
            Some(Node::list(std::mem::take(&mut values)))
        };
        let mut values = values.into_iter();

        names
            .into_iter()
            .enumerate()
            .map(|(i, tok)| ValueDecl {
                name: self.text(tok).to_string(),
                name_span: tok.span,
                extent,
                type_span,
                // The shared type and multi-value initializer belong to the
                // first name so each use is resolved once.
                type_node: if i == 0 { type_node.clone() } else { None },
                value: if paired { values.next() } else { shared.take() },
                doc: doc.clone(),
            })
            .collect()
    }
}

/// Span of the name an embedded field is known by.
fn embedded_name_span(node: &Node) -> Option<Span> {
    match node {
        Node::Ident { span, .. } | Node::Selector { span, .. } => Some(*span),
        Node::Unary { operand, .. } => embedded_name_span(operand),
        Node::Index { base, .. } => embedded_name_span(base),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> SourceFile {
        parse_file("p/a.go", src).unwrap()
    }

    mod decl_tests {
        use super::*;

        #[test]
        fn package_and_imports() {
            let file = parse(
                "package p\n\nimport (\n\t\"fmt\"\n\tst \"example.com/m/store\"\n\t. \"strings\"\n)\n",
            );
            assert_eq!(file.package_name, "p");
            assert_eq!(file.text(file.package_span), "p");
            assert_eq!(file.imports.len(), 3);
            assert_eq!(file.imports[0].local_name(), "fmt");
            assert_eq!(file.imports[1].local_name(), "st");
            assert_eq!(file.imports[1].path, "example.com/m/store");
            assert!(file.imports[2].is_dot());
        }

        #[test]
        fn missing_package_clause_is_an_error() {
            assert!(parse_file("a.go", "func main() {}\n").is_err());
        }

        #[test]
        fn unbalanced_braces_are_an_error() {
            let err = parse_file("a.go", "package p\nfunc f() {\n").unwrap_err();
            assert!(err.to_string().contains("unclosed"));
        }

        #[test]
        fn struct_fields_and_embedding() {
            let file = parse(
                "package p\n\n// User is a user.\ntype User struct {\n\tName, Email string `json:\"n\"`\n\t*Base\n\tstore.Entry\n}\n",
            );
            let user = &file.types["User"];
            assert_eq!(user.doc.as_deref(), Some("User is a user."));
            assert_eq!(file.text(user.extent).lines().count(), 5);
            let fields = user.fields();
            let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["Name", "Email", "Base", "Entry"]);
            assert_eq!(file.text(fields[1].type_span), "string");
            assert!(fields[2].embedded);
            assert_eq!(file.text(fields[3].name_span), "Entry");
        }

        #[test]
        fn interface_methods_and_embeds() {
            let file = parse(
                "package p\n\ntype RW interface {\n\tio.Reader\n\tWrite(p []byte) (n int, err error)\n\tClose() error\n}\n",
            );
            let rw = &file.types["RW"];
            let methods = rw.interface_methods();
            assert_eq!(methods.len(), 2);
            assert_eq!(
                file.text(methods[0].signature_span),
                "(p []byte) (n int, err error)"
            );
            assert_eq!(file.text(methods[1].signature_span), "() error");
            match &rw.kind {
                TypeKind::Interface { embeds, .. } => {
                    assert_eq!(embeds[0].type_reference(), Some((Some("io"), "Reader")))
                }
                other => panic!("unexpected kind {:?}", other),
            }
        }

        #[test]
        fn grouped_types_and_aliases() {
            let file = parse("package p\n\ntype (\n\tID int\n\tName = string\n\tList[T any] []T\n)\n");
            assert_eq!(file.types.len(), 3);
            assert_eq!(file.text(file.types["ID"].extent), "ID int");
            assert!(matches!(file.types["List"].kind, TypeKind::Other { .. }));
        }

        #[test]
        fn functions_and_methods() {
            let file = parse(
                "package p\n\nfunc New(a, b int, opts ...Option) (*Server, error) {\n\treturn nil, nil\n}\n\nfunc (s *Server) Start() error { return nil }\n",
            );
            let new = &file.functions["New"];
            let names: Vec<_> = new.params.iter().map(|p| p.name.clone().unwrap()).collect();
            assert_eq!(names, vec!["a", "b", "opts"]);
            assert_eq!(file.text(new.params[0].type_span), "int");
            assert_eq!(new.results.len(), 2);
            assert_eq!(
                file.text(new.signature_span),
                "(a, b int, opts ...Option) (*Server, error)"
            );
            assert!(new.body.is_some());

            assert_eq!(file.methods.len(), 1);
            let start = &file.methods[0];
            assert_eq!(start.receiver_type_name(), Some("Server"));
            assert_eq!(file.text(start.signature_span), "() error");
        }

        #[test]
        fn unnamed_parameters() {
            let file = parse("package p\n\nfunc f(int, context.Context, []byte) {}\n");
            let f = &file.functions["f"];
            assert_eq!(f.params.len(), 3);
            assert!(f.params.iter().all(|p| p.name.is_none()));
        }

        #[test]
        fn vars_consts_and_blanks() {
            let file = parse(
                "package p\n\nvar DefaultTimeout = 5\n\nconst (\n\tA, B = 1, 2\n\tC int = 3\n)\n\nvar x, y = pair()\nvar _ Reader = (*File)(nil)\n",
            );
            assert!(file.variables.contains_key("DefaultTimeout"));
            assert_eq!(file.constants.len(), 3);
            assert_eq!(file.text(file.constants["C"].type_span.unwrap()), "int");
            assert!(file.variables["x"].value.is_some());
            assert!(file.variables["y"].value.is_none());
            assert_eq!(file.blanks.len(), 1);
        }

        #[test]
        fn trailing_comment_is_not_a_doc() {
            let file = parse("package p\n\nvar a = 1 // note\nvar b = 2\n");
            assert_eq!(file.variables["b"].doc, None);
        }
    }
}
