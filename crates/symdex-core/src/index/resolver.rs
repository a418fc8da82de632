//! Reference resolution: the second pass of an index build.
//!
//! Every name use in every retained file is resolved through a scope chain
//! (block, function, file, package, dot-imported packages) against the
//! symbol table produced by [`collect`](crate::index::collector::collect).
//! Selectors `x.Y` are resolved in three stages:
//!
//! 1. qualified match: `x` names an import, a type, or nothing at all
//!    (suffix match on qualified names),
//! 2. member of the inferred type of `x`,
//! 3. any field or method named `Y`.
//!
//! A stage producing several candidates records a [`Diagnostic`] instead of
//! a reference.

use std::collections::{BTreeMap, HashMap};

use crate::error::{SymdexError, SymdexResult};
use crate::index::collector::SymbolTable;
use crate::index::decls::{DeclMap, Env, Frame, Local, Qualifier, Ty};
use crate::index::symbol::{Diagnostic, Reference, ReferenceId, ReferenceKind, SymbolId, SymbolKind};
use crate::index::IndexOptions;
use crate::model::{
    FuncDecl, Module, Node, Package, ParamDecl, SourceFile, TypeDecl, TypeForm, TypeKind, UnaryOp,
    ValueDecl,
};
use crate::patch::Span;
use crate::text::LineIndex;
use crate::validation::is_predeclared;

// ============================================================================
// ReferenceTable
// ============================================================================

/// Reference storage and the reverse maps.
#[derive(Debug, Default, Clone)]
pub struct ReferenceTable {
    references: BTreeMap<ReferenceId, Reference>,
    by_symbol: HashMap<SymbolId, Vec<ReferenceId>>,
    by_file: HashMap<String, Vec<ReferenceId>>,
    next_reference_id: u32,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_reference_id(&mut self) -> ReferenceId {
        let id = ReferenceId::new(self.next_reference_id);
        self.next_reference_id += 1;
        id
    }

    pub fn insert(&mut self, reference: Reference) {
        let id = reference.id;
        self.by_symbol.entry(reference.symbol).or_default().push(id);
        self.by_file
            .entry(reference.file.clone())
            .or_default()
            .push(id);
        self.references.insert(id, reference);
    }

    pub fn get(&self, id: ReferenceId) -> Option<&Reference> {
        self.references.get(&id)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// All references in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    /// References to `symbol`, in resolution order.
    pub fn of_symbol(&self, symbol: SymbolId) -> Vec<&Reference> {
        self.lookup(self.by_symbol.get(&symbol))
    }

    /// References located in `path`, in resolution order.
    pub fn in_file(&self, path: &str) -> Vec<&Reference> {
        self.lookup(self.by_file.get(path))
    }

    fn lookup(&self, ids: Option<&Vec<ReferenceId>>) -> Vec<&Reference> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.references.get(id))
                .collect()
        })
        .unwrap_or_default()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Outcome of resolving one name use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(SymbolId),
    Ambiguous(Vec<SymbolId>),
    Unresolved,
}

impl Resolution {
    pub fn from_candidates(mut candidates: Vec<SymbolId>) -> Self {
        candidates.sort();
        candidates.dedup();
        match candidates.len() {
            0 => Resolution::Unresolved,
            1 => Resolution::Resolved(candidates[0]),
            _ => Resolution::Ambiguous(candidates),
        }
    }
}

/// Everything the resolver produces.
#[derive(Debug, Default)]
pub struct ResolveOutput {
    pub references: ReferenceTable,
    pub diagnostics: Vec<Diagnostic>,
    /// Name uses that matched no symbol, predeclared names excluded.
    pub unresolved: usize,
}

/// Run the resolution pass over `module`.
///
/// `symbols` must come from [`collect`](crate::index::collector::collect)
/// over the same module with the same options.
pub fn resolve(
    module: &Module,
    symbols: &SymbolTable,
    options: &IndexOptions,
) -> SymdexResult<ResolveOutput> {
    let decls = DeclMap::new(module, options.include_tests);
    let mut output = ResolveOutput::default();
    for package in module.packages.values() {
        for file in package
            .files
            .iter()
            .filter(|f| options.include_tests || !f.is_test)
        {
            let mut resolver = FileResolver {
                decls: &decls,
                symbols,
                package,
                file,
                lines: LineIndex::new(&file.content),
                scopes: Vec::new(),
                context: String::new(),
                output: &mut output,
                error: None,
            };
            resolver.walk_file();
            if let Some(err) = resolver.error {
                return Err(err);
            }
        }
    }
    tracing::debug!(
        references = output.references.len(),
        diagnostics = output.diagnostics.len(),
        unresolved = output.unresolved,
        "resolved references"
    );
    Ok(output)
}

// ============================================================================
// File walk
// ============================================================================

/// How a name use is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Read,
    Call,
    Write,
    Type,
}

impl Role {
    fn ident_kind(self) -> ReferenceKind {
        match self {
            Role::Read => ReferenceKind::Reference,
            Role::Call => ReferenceKind::Call,
            Role::Write => ReferenceKind::Write,
            Role::Type => ReferenceKind::TypeAnnotation,
        }
    }

    fn selector_kind(self) -> ReferenceKind {
        match self {
            Role::Read => ReferenceKind::Selector,
            Role::Call => ReferenceKind::Call,
            Role::Write => ReferenceKind::Write,
            Role::Type => ReferenceKind::TypeAnnotation,
        }
    }
}

enum TopLevel<'m> {
    Type(&'m TypeDecl),
    Func(&'m FuncDecl),
    Value(&'m ValueDecl),
}

struct FileResolver<'r, 'm> {
    decls: &'r DeclMap<'m>,
    symbols: &'r SymbolTable,
    package: &'m Package,
    file: &'m SourceFile,
    lines: LineIndex,
    scopes: Vec<Frame<'m>>,
    /// Name of the enclosing function or method.
    context: String,
    output: &'r mut ResolveOutput,
    error: Option<SymdexError>,
}

impl<'r, 'm> FileResolver<'r, 'm> {
    fn walk_file(&mut self) {
        let file = self.file;
        let mut tops: Vec<(u64, TopLevel<'m>)> = Vec::new();
        tops.extend(file.types.values().map(|d| (d.extent.start, TopLevel::Type(d))));
        tops.extend(
            file.functions
                .values()
                .chain(file.methods.iter())
                .map(|d| (d.extent.start, TopLevel::Func(d))),
        );
        tops.extend(
            file.variables
                .values()
                .chain(file.constants.values())
                .chain(file.blanks.iter())
                .map(|d| (d.extent.start, TopLevel::Value(d))),
        );
        tops.sort_by_key(|(start, _)| *start);

        for (_, top) in tops {
            if self.error.is_some() {
                return;
            }
            match top {
                TopLevel::Type(decl) => self.walk_type_decl(decl),
                TopLevel::Func(decl) => self.walk_func(decl),
                TopLevel::Value(decl) => {
                    if let Some(ty) = &decl.type_node {
                        self.walk_type(ty);
                    }
                    if let Some(value) = &decl.value {
                        self.walk(value, Role::Read);
                    }
                }
            }
        }
    }

    fn walk_type_decl(&mut self, decl: &'m TypeDecl) {
        match &decl.kind {
            TypeKind::Struct { fields } => {
                for field in fields {
                    self.walk_type(&field.type_node);
                }
            }
            TypeKind::Interface { methods, embeds } => {
                for method in methods {
                    self.walk_param_types(&method.params);
                    self.walk_param_types(&method.results);
                }
                for embed in embeds {
                    self.walk_type(embed);
                }
            }
            TypeKind::Other { underlying } => self.walk_type(underlying),
        }
    }

    fn walk_func(&mut self, func: &'m FuncDecl) {
        self.context = func.name.clone();
        if let Some(receiver) = &func.receiver {
            self.walk_type(&receiver.type_node);
        }
        self.walk_param_types(&func.params);
        self.walk_param_types(&func.results);

        let mut frame = Frame::new();
        for param in func.all_params() {
            let (Some(name), Some(name_span)) = (&param.name, param.name_span) else {
                continue;
            };
            let local = Local {
                symbol: self.symbols.at_origin(&self.file.path, name_span),
                ty: self
                    .decls
                    .type_of_type(&param.type_node, &self.package.path, self.file),
            };
            frame.insert(name.as_str(), local);
        }
        self.scopes.push(frame);
        if let Some(body) = &func.body {
            self.walk(body, Role::Read);
        }
        self.scopes.pop();
        self.context.clear();
    }

    /// Walk parameter types once per group: `a, b int` shares one type node.
    fn walk_param_types(&mut self, params: &'m [ParamDecl]) {
        let mut last: Option<Span> = None;
        for param in params {
            if last != Some(param.type_span) {
                self.walk_type(&param.type_node);
            }
            last = Some(param.type_span);
        }
    }

    fn bind_params(&mut self, params: &'m [ParamDecl]) {
        for param in params {
            if let Some(name) = &param.name {
                let ty = self
                    .decls
                    .type_of_type(&param.type_node, &self.package.path, self.file);
                self.bind(name, None, ty);
            }
        }
    }

    fn bind(&mut self, name: &'m str, symbol: Option<SymbolId>, ty: Option<Ty<'m>>) {
        if name == "_" {
            return;
        }
        if let Some(frame) = self.scopes.last_mut() {
            frame.insert(name, Local { symbol, ty });
        }
    }

    fn local(&self, name: &str) -> Option<&Local<'m>> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    fn env(&self) -> Env<'_, 'm> {
        Env {
            package: self.package,
            file: self.file,
            scopes: &self.scopes,
        }
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn walk(&mut self, node: &'m Node, role: Role) {
        match node {
            Node::Ident { name, span } => self.resolve_ident(name, *span, role),
            Node::Selector { base, name, span } => self.resolve_selector(base, name, *span, role),
            Node::Call { func, args } => {
                if self.is_builtin_with_type_arg(func) {
                    let mut args = args.iter();
                    if let Some(first) = args.next() {
                        self.walk_type(first);
                    }
                    for arg in args {
                        self.walk(arg, Role::Read);
                    }
                    return;
                }
                self.walk(func, Role::Call);
                for arg in args {
                    self.walk(arg, Role::Read);
                }
            }
            Node::Composite { ty, elems } => {
                let ty = ty.as_deref().and_then(|ty| {
                    self.walk_type(ty);
                    self.decls.type_of_type(ty, &self.package.path, self.file)
                });
                self.walk_elems(elems, ty);
            }
            Node::KeyValue { key, value } => {
                self.walk(key, Role::Read);
                self.walk(value, Role::Read);
            }
            Node::Unary { operand, .. } => self.walk(operand, Role::Read),
            Node::Binary { lhs, rhs } => {
                self.walk(lhs, Role::Read);
                self.walk(rhs, Role::Read);
            }
            Node::Index { base, indices } => {
                let role = if role == Role::Call {
                    Role::Call
                } else {
                    Role::Read
                };
                self.walk(base, role);
                for index in indices {
                    self.walk(index, Role::Read);
                }
            }
            Node::TypeAssert { base, ty } => {
                self.walk(base, Role::Read);
                if let Some(ty) = ty {
                    self.walk_type(ty);
                }
            }
            Node::TypeExpr { .. } => self.walk_type(node),
            Node::Literal { .. } => {}
            Node::FuncLit {
                params,
                results,
                body,
            } => {
                self.walk_param_types(params);
                self.walk_param_types(results);
                self.scopes.push(Frame::new());
                self.bind_params(params);
                self.bind_params(results);
                self.walk(body, Role::Read);
                self.scopes.pop();
            }
            Node::Block { stmts, .. } => {
                self.scopes.push(Frame::new());
                for stmt in stmts {
                    self.walk(stmt, Role::Read);
                }
                self.scopes.pop();
            }
            Node::Define { names, ty, values } => {
                if let Some(ty) = ty {
                    self.walk_type(ty);
                }
                for value in values {
                    self.walk(value, Role::Read);
                }
                let types = self.define_types(ty.as_deref(), values, names.len());
                for (i, binding) in names.iter().enumerate() {
                    let ty = types.get(i).cloned().flatten();
                    self.bind(&binding.name, None, ty);
                }
            }
            Node::Assign { targets, values } => {
                for target in targets {
                    let role = match target {
                        Node::Ident { .. } | Node::Selector { .. } => Role::Write,
                        _ => Role::Read,
                    };
                    self.walk(target, role);
                }
                for value in values {
                    self.walk(value, Role::Read);
                }
            }
            Node::Branch { header, body, alt } => {
                self.scopes.push(Frame::new());
                for node in header {
                    self.walk(node, Role::Read);
                }
                self.walk(body, Role::Read);
                if let Some(alt) = alt {
                    self.walk(alt, Role::Read);
                }
                self.scopes.pop();
            }
            Node::List { items } => {
                for item in items {
                    self.walk(item, Role::Read);
                }
            }
        }
    }

    /// Walk a type expression: names in it are type annotations.
    fn walk_type(&mut self, node: &'m Node) {
        match node {
            Node::Ident { .. } | Node::Selector { .. } => self.walk(node, Role::Type),
            Node::Unary { operand, .. } => self.walk_type(operand),
            Node::Index { base, indices } => {
                self.walk_type(base);
                for index in indices {
                    self.walk_type(index);
                }
            }
            Node::TypeExpr { form, parts } => {
                for (i, part) in parts.iter().enumerate() {
                    // Array length is an expression.
                    if i == 0 && *form == TypeForm::Array {
                        self.walk(part, Role::Read);
                    } else {
                        self.walk_type(part);
                    }
                }
            }
            Node::Literal { .. } => {}
            other => self.walk(other, Role::Read),
        }
    }

    /// Elements of a composite literal of type `ty`.
    fn walk_elems(&mut self, elems: &'m [Node], ty: Option<Ty<'m>>) {
        let (key_ty, elem_ty) = match &ty {
            Some(Ty::Slice(elem)) => (None, Some(elem.as_ref().clone())),
            Some(Ty::Map(key, value)) => (key.as_deref().cloned(), value.as_deref().cloned()),
            _ => (None, None),
        };
        let is_struct = matches!(ty, Some(Ty::Named { .. }));
        for elem in elems {
            match elem {
                Node::KeyValue { key, value } => {
                    let mut value_ty = elem_ty.clone();
                    match key.as_ref() {
                        Node::Ident { name, span } if is_struct => {
                            value_ty = self.resolve_field_key(&ty, name, *span);
                        }
                        Node::Composite { ty: None, elems } => {
                            self.walk_elems(elems, key_ty.clone());
                        }
                        key => self.walk(key, Role::Read),
                    }
                    self.walk_element(value, value_ty);
                }
                other => self.walk_element(other, elem_ty.clone()),
            }
        }
    }

    fn walk_element(&mut self, node: &'m Node, ty: Option<Ty<'m>>) {
        match node {
            Node::Composite { ty: None, elems } => self.walk_elems(elems, ty),
            // `&T{...}` elided to `{...}` for pointer elements.
            Node::Unary {
                op: UnaryOp::Ref,
                operand,
            } if matches!(operand.as_ref(), Node::Composite { ty: None, .. }) => {
                self.walk_element(operand, ty)
            }
            other => self.walk(other, Role::Read),
        }
    }

    /// `Field: value` inside a struct literal. Returns the field type.
    fn resolve_field_key(
        &mut self,
        ty: &Option<Ty<'m>>,
        name: &str,
        span: Span,
    ) -> Option<Ty<'m>> {
        let (package, type_name) = ty.as_ref()?.named()?;
        let Some(member) = self.decls.member(package, type_name, name) else {
            self.output.unresolved += 1;
            return None;
        };
        if let Some(id) = self.symbols.at_origin(&member.file.path, member.name_span) {
            self.record(id, span, ReferenceKind::Write);
        }
        member.ty
    }

    fn is_builtin_with_type_arg(&self, func: &Node) -> bool {
        let Node::Ident { name, .. } = func else {
            return false;
        };
        matches!(name.as_str(), "new" | "make")
            && self.local(name).is_none()
            && self
                .decls
                .lookup_in_file(&self.package.path, self.file, name)
                .is_none()
    }

    /// Inferred types of the names a definition binds.
    fn define_types(
        &self,
        ty: Option<&'m Node>,
        values: &'m [Node],
        count: usize,
    ) -> Vec<Option<Ty<'m>>> {
        if let Some(ty) = ty {
            let ty = self.decls.type_of_type(ty, &self.package.path, self.file);
            return vec![ty; count];
        }
        let env = self.env();
        match values {
            [Node::Unary {
                op: UnaryOp::Range,
                operand,
            }] => {
                let (key, value) = self
                    .decls
                    .expr_type(operand, &env)
                    .map(|t| t.range_types())
                    .unwrap_or((None, None));
                vec![key, value]
            }
            [Node::Call { func, args }] if count > 1 => self.decls.call_results(func, args, &env),
            [single] if count > 1 => vec![self.decls.expr_type(single, &env)],
            _ => values
                .iter()
                .map(|value| self.decls.expr_type(value, &env))
                .collect(),
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    fn resolve_ident(&mut self, name: &'m str, span: Span, role: Role) {
        if name == "_" {
            return;
        }
        if let Some(local) = self.local(name) {
            if let Some(id) = local.symbol {
                self.record(id, span, role.ident_kind());
            }
            return;
        }
        if self.file.import_named(name).is_some() {
            return;
        }
        if let Some(sited) = self
            .decls
            .lookup_in_file(&self.package.path, self.file, name)
        {
            if let Some(id) = self.symbols.at_origin(&sited.file.path, sited.name_span()) {
                self.record(id, span, role.ident_kind());
            }
            return;
        }
        if !is_predeclared(name) {
            self.output.unresolved += 1;
        }
    }

    fn resolve_selector(&mut self, base: &'m Node, name: &'m str, span: Span, role: Role) {
        let kind = role.selector_kind();

        // (a) qualified match on an identifier base.
        if let Node::Ident {
            name: qualifier,
            span: qualifier_span,
        } = base
        {
            if self.local(qualifier).is_none() {
                match self.decls.qualifier(self.file, qualifier) {
                    Qualifier::Package(path) => {
                        self.record_import(qualifier, *qualifier_span);
                        match self.decls.lookup(path, name) {
                            Some(sited) => {
                                if let Some(id) =
                                    self.symbols.at_origin(&sited.file.path, sited.name_span())
                                {
                                    self.record(id, span, kind);
                                }
                            }
                            None => self.output.unresolved += 1,
                        }
                        return;
                    }
                    Qualifier::External => {
                        self.record_import(qualifier, *qualifier_span);
                        self.output.unresolved += 1;
                        return;
                    }
                    Qualifier::NotImport => {}
                }

                let declared = self
                    .decls
                    .lookup_in_file(&self.package.path, self.file, qualifier)
                    .is_some();
                if !declared && !is_predeclared(qualifier) {
                    let resolution = self.suffix_match(qualifier, name);
                    if resolution != Resolution::Unresolved {
                        self.settle(resolution, name, span, kind);
                        return;
                    }
                }
            }
        }

        // (b) member of the inferred type, or of the type the base names.
        self.walk(base, Role::Read);
        let env = self.env();
        let ty = self
            .decls
            .expr_type(base, &env)
            .or_else(|| match base {
                Node::Ident { name, .. } if self.local(name).is_none() => {
                    self.decls.type_of_type(base, &self.package.path, self.file)
                }
                _ => None,
            });
        if let Some((package, type_name)) = ty.as_ref().and_then(Ty::named) {
            if let Some(member) = self.decls.member(package, type_name, name) {
                if let Some(id) = self.symbols.at_origin(&member.file.path, member.name_span) {
                    self.record(id, span, kind);
                }
                return;
            }
        }

        // (c) any field or method with that name.
        let candidates = self
            .symbols
            .named(name)
            .into_iter()
            .filter(|s| s.kind.is_member())
            .map(|s| s.id)
            .collect();
        let resolution = Resolution::from_candidates(candidates);
        self.settle(resolution, name, span, kind);
    }

    /// Qualified names ending in `qualifier.name` on a path or dot boundary.
    fn suffix_match(&self, qualifier: &str, name: &str) -> Resolution {
        let suffix = format!("{}.{}", qualifier, name);
        let candidates = self
            .symbols
            .named(name)
            .into_iter()
            .filter(|s| {
                s.qualified_name == suffix
                    || s.qualified_name
                        .strip_suffix(suffix.as_str())
                        .is_some_and(|head| head.ends_with('.') || head.ends_with('/'))
            })
            .map(|s| s.id)
            .collect();
        Resolution::from_candidates(candidates)
    }

    fn settle(&mut self, resolution: Resolution, name: &str, span: Span, kind: ReferenceKind) {
        match resolution {
            Resolution::Resolved(id) => self.record(id, span, kind),
            Resolution::Ambiguous(candidates) => {
                let position = self.lines.position(span.start);
                tracing::debug!(
                    file = %self.file.path,
                    name,
                    candidates = candidates.len(),
                    "ambiguous selector"
                );
                self.output.diagnostics.push(Diagnostic {
                    file: self.file.path.clone(),
                    span,
                    line: position.line,
                    column: position.column,
                    name: name.to_string(),
                    message: format!(
                        "`{}` matches {} declarations; no reference recorded",
                        name,
                        candidates.len()
                    ),
                    candidates,
                });
            }
            Resolution::Unresolved => self.output.unresolved += 1,
        }
    }

    fn record_import(&mut self, qualifier: &str, span: Span) {
        let Some(import) = self.file.import_named(qualifier) else {
            return;
        };
        if let Some(id) = self.symbols.at_origin(&self.file.path, import.name_span()) {
            self.record(id, span, ReferenceKind::Import);
        }
    }

    fn record(&mut self, symbol: SymbolId, span: Span, kind: ReferenceKind) {
        let Some(target) = self.symbols.get(symbol) else {
            return;
        };
        if target.declared_at(&self.file.path, span) {
            return;
        }
        let text = self.file.text(span);
        let expected = if target.kind == SymbolKind::Import {
            self.file
                .imports
                .iter()
                .find(|i| i.name_span() == target.name_span)
                .map(|i| i.local_name())
                .unwrap_or(target.name.as_str())
        } else {
            target.name.as_str()
        };
        if text != expected {
            if self.error.is_none() {
                self.error = Some(SymdexError::invalid_model(format!(
                    "{}: use span {} addresses `{}`, expected `{}`",
                    self.file.path, span, text, expected
                )));
            }
            return;
        }
        let id = self.output.references.next_reference_id();
        self.output.references.insert(Reference {
            id,
            symbol,
            file: self.file.path.clone(),
            span,
            range: self.lines.range(span),
            context: self.context.clone(),
            kind,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::collector::collect;
    use crate::scan::parse_file;

    fn module(files: &[(&str, &str, &str)]) -> Module {
        let mut module = Module::new("example.com/m");
        for &(pkg, path, src) in files {
            let name = pkg.rsplit('/').next().unwrap_or(pkg);
            let full = format!("example.com/m/{}", pkg);
            if module.package(&full).is_none() {
                module.add_package(Package::new(full.clone(), name));
            }
            module
                .package_mut(&full)
                .unwrap()
                .files
                .push(parse_file(path, src).unwrap());
        }
        module
    }

    fn run(module: &Module, options: &IndexOptions) -> (SymbolTable, ResolveOutput) {
        let symbols = collect(module, options).unwrap();
        let output = resolve(module, &symbols, options).unwrap();
        (symbols, output)
    }

    fn refs_to<'a>(
        symbols: &SymbolTable,
        output: &'a ResolveOutput,
        qualified: &str,
    ) -> Vec<&'a Reference> {
        let id = symbols.qualified(qualified)[0].id;
        output.references.of_symbol(id)
    }

    mod ident_tests {
        use super::*;

        const AUTH: &str = "package auth\n\nvar DefaultTimeout = 5\n\nfunc Login(user string) int {\n\treturn DefaultTimeout\n}\n";

        #[test]
        fn package_variable_reference_carries_context() {
            let m = module(&[("auth", "auth/auth.go", AUTH)]);
            let (symbols, output) = run(&m, &IndexOptions::default());
            let refs = refs_to(&symbols, &output, "example.com/m/auth.DefaultTimeout");
            assert_eq!(refs.len(), 1);
            assert_eq!(refs[0].context, "Login");
            assert_eq!(refs[0].kind, ReferenceKind::Reference);
            assert_eq!(refs[0].range.start.line, 6);
        }

        #[test]
        fn locals_shadow_package_names() {
            let src = "package p\n\nvar Count = 1\n\nfunc F() int {\n\tCount := 2\n\treturn Count\n}\n\nfunc G() int { return Count }\n";
            let m = module(&[("p", "p/p.go", src)]);
            let (symbols, output) = run(&m, &IndexOptions::default());
            let refs = refs_to(&symbols, &output, "example.com/m/p.Count");
            assert_eq!(refs.len(), 1);
            assert_eq!(refs[0].context, "G");
        }

        #[test]
        fn parameters_resolve_when_retained() {
            let options = IndexOptions {
                include_private: true,
                ..Default::default()
            };
            let m = module(&[("auth", "auth/auth.go", AUTH)]);
            let (symbols, output) = run(&m, &options);
            let user = symbols
                .named("user")
                .into_iter()
                .find(|s| s.kind == SymbolKind::Parameter)
                .unwrap()
                .id;
            // Declared but never used in the body.
            assert!(output.references.of_symbol(user).is_empty());

            let src = "package p\n\nfunc Add(a, b int) int {\n\ta = a + b\n\treturn a\n}\n";
            let m = module(&[("p", "p/p.go", src)]);
            let (symbols, output) = run(&m, &options);
            let a = symbols.qualified("example.com/m/p.Add.a")[0].id;
            let kinds: Vec<_> = output.references.of_symbol(a).iter().map(|r| r.kind).collect();
            assert_eq!(
                kinds,
                vec![ReferenceKind::Write, ReferenceKind::Reference, ReferenceKind::Reference]
            );
        }

        #[test]
        fn references_may_precede_declarations() {
            let src = "package p\n\nfunc Run() { helper() }\n\nfunc helper() {}\n";
            let m = module(&[("p", "p/p.go", src)]);
            let options = IndexOptions {
                include_private: true,
                ..Default::default()
            };
            let (symbols, output) = run(&m, &options);
            let refs = refs_to(&symbols, &output, "example.com/m/p.helper");
            assert_eq!(refs.len(), 1);
            assert_eq!(refs[0].kind, ReferenceKind::Call);
        }

        #[test]
        fn predeclared_names_are_not_unresolved() {
            let src = "package p\n\nfunc F() int {\n\tx := len(\"a\")\n\treturn x + missing\n}\n";
            let m = module(&[("p", "p/p.go", src)]);
            let (_, output) = run(&m, &IndexOptions::default());
            assert_eq!(output.unresolved, 1);
        }
    }

    mod selector_tests {
        use super::*;

        const STORE: &str = "package store\n\ntype Entry struct {\n\tKey string\n}\n\nfunc (e *Entry) Size() int { return len(e.Key) }\n\nfunc Open() *Entry { return &Entry{Key: \"k\"} }\n";

        const APP: &str = "package app\n\nimport (\n\t\"fmt\"\n\t\"example.com/m/store\"\n)\n\nfunc Run() {\n\te := store.Open()\n\tfmt.Println(e.Size())\n}\n";

        #[test]
        fn import_qualified_and_inferred_members() {
            let m = module(&[("store", "store/store.go", STORE), ("app", "app/app.go", APP)]);
            let (symbols, output) = run(&m, &IndexOptions::default());

            let open = refs_to(&symbols, &output, "example.com/m/store.Open");
            assert_eq!(open.len(), 1);
            assert_eq!(open[0].file, "app/app.go");
            assert_eq!(open[0].kind, ReferenceKind::Call);

            let size = refs_to(&symbols, &output, "example.com/m/store.Entry.Size");
            assert_eq!(size.len(), 1);
            assert_eq!(size[0].context, "Run");

            let import = symbols
                .in_file("app/app.go")
                .into_iter()
                .find(|s| s.kind == SymbolKind::Import && s.name == "store")
                .unwrap()
                .id;
            let import_refs = output.references.of_symbol(import);
            assert_eq!(import_refs.len(), 1);
            assert_eq!(import_refs[0].kind, ReferenceKind::Import);
        }

        #[test]
        fn receiver_fields_and_struct_literal_keys() {
            let m = module(&[("store", "store/store.go", STORE)]);
            let (symbols, output) = run(&m, &IndexOptions::default());
            let key = refs_to(&symbols, &output, "example.com/m/store.Entry.Key");
            let kinds: Vec<_> = key.iter().map(|r| r.kind).collect();
            assert_eq!(kinds, vec![ReferenceKind::Selector, ReferenceKind::Write]);
            assert_eq!(key[0].context, "Size");
        }

        #[test]
        fn external_imports_do_not_fall_back() {
            let src = "package p\n\nimport \"fmt\"\n\ntype T struct{}\n\nfunc (T) Println() {}\n\nfunc F() { fmt.Println() }\n";
            let m = module(&[("p", "p/p.go", src)]);
            let (symbols, output) = run(&m, &IndexOptions::default());
            let refs = refs_to(&symbols, &output, "example.com/m/p.T.Println");
            assert!(refs.is_empty());
            assert!(output.unresolved >= 1);
        }

        #[test]
        fn ambiguous_fallback_records_diagnostic() {
            let src = "package p\n\ntype A struct{}\n\nfunc (A) Close() {}\n\ntype B struct{}\n\nfunc (B) Close() {}\n\nfunc F() {\n\tg().Close()\n}\n";
            let m = module(&[("p", "p/p.go", src)]);
            let (symbols, output) = run(&m, &IndexOptions::default());
            assert_eq!(output.diagnostics.len(), 1);
            assert_eq!(output.diagnostics[0].name, "Close");
            assert_eq!(output.diagnostics[0].candidates.len(), 2);
            for qualified in ["example.com/m/p.A.Close", "example.com/m/p.B.Close"] {
                assert!(refs_to(&symbols, &output, qualified).is_empty());
            }
        }

        #[test]
        fn promoted_methods_resolve_through_embedding() {
            let src = "package p\n\ntype Base struct{}\n\nfunc (b *Base) Close() {}\n\ntype Conn struct {\n\tBase\n}\n\nfunc Use(c *Conn) {\n\tc.Close()\n\tc.Base.Close()\n}\n";
            let m = module(&[("p", "p/p.go", src)]);
            let (symbols, output) = run(&m, &IndexOptions::default());
            let close = refs_to(&symbols, &output, "example.com/m/p.Base.Close");
            assert_eq!(close.len(), 2);
            let base = refs_to(&symbols, &output, "example.com/m/p.Base");
            // Receiver type, embedded field type and the `c.Base` selector.
            assert_eq!(base.len(), 3);
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn corrupt_use_span_fails_the_build() {
            let mut m = module(&[(
                "p",
                "p/p.go",
                "package p\n\nvar V = 1\n\nfunc F() int { return V }\n",
            )]);
            let file = m.file_mut("p/p.go").unwrap();
            file.content = file.content.replace("return V", "return W");
            let options = IndexOptions::default();
            let symbols = collect(&m, &options).unwrap();
            let err = resolve(&m, &symbols, &options).unwrap_err();
            assert!(matches!(err, SymdexError::InvalidModel { .. }));
        }
    }
}
