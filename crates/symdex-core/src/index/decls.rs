//! Module-wide declaration lookup and light type inference.
//!
//! The resolver needs to know, for a selector `x.Y`, which type `x` has. A
//! full type checker is out of reach; instead [`DeclMap`] infers the named
//! type of common expression shapes (locals, parameters, package variables,
//! composite literals, `&x`, function and method results, conversions,
//! `new(T)`, field selections, indexing and `range`) and gives up (`None`)
//! on everything else.

use std::collections::HashMap;

use crate::index::symbol::SymbolId;
use crate::model::{
    FuncDecl, Module, Node, Package, ParamDecl, SourceFile, TypeDecl, TypeForm, TypeKind, UnaryOp,
    ValueDecl,
};
use crate::patch::Span;
use crate::validation::is_exported;

/// Recursion limit for inference through package variables and embedding.
const MAX_DEPTH: u8 = 8;

// ============================================================================
// Types
// ============================================================================

/// Inferred type of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ty<'m> {
    /// A type declared in the module; pointers are transparent.
    Named { package: &'m str, name: &'m str },
    /// Slice, array or variadic parameter.
    Slice(Box<Ty<'m>>),
    /// Key and value types, either possibly unknown.
    Map(Option<Box<Ty<'m>>>, Option<Box<Ty<'m>>>),
    Chan(Box<Ty<'m>>),
}

impl<'m> Ty<'m> {
    pub fn named(&self) -> Option<(&'m str, &'m str)> {
        match self {
            Ty::Named { package, name } => Some((package, name)),
            _ => None,
        }
    }

    /// Element type produced by indexing.
    fn indexed(&self) -> Option<Ty<'m>> {
        match self {
            Ty::Slice(elem) => Some(elem.as_ref().clone()),
            Ty::Map(_, value) => value.as_deref().cloned(),
            _ => None,
        }
    }

    /// Types of the two iteration variables of `range`.
    pub fn range_types(&self) -> (Option<Ty<'m>>, Option<Ty<'m>>) {
        match self {
            Ty::Slice(elem) => (None, Some(elem.as_ref().clone())),
            Ty::Map(key, value) => (key.as_deref().cloned(), value.as_deref().cloned()),
            Ty::Chan(elem) => (Some(elem.as_ref().clone()), None),
            Ty::Named { .. } => (None, None),
        }
    }
}

/// A name bound in a block or function scope.
#[derive(Debug, Clone)]
pub(crate) struct Local<'m> {
    /// Parameter symbol, when the binding is an indexed parameter.
    pub symbol: Option<SymbolId>,
    pub ty: Option<Ty<'m>>,
}

pub(crate) type Frame<'m> = HashMap<&'m str, Local<'m>>;

/// Where an expression is evaluated.
pub(crate) struct Env<'a, 'm> {
    pub package: &'m Package,
    pub file: &'m SourceFile,
    pub scopes: &'a [Frame<'m>],
}

impl<'a, 'm> Env<'a, 'm> {
    pub fn local(&self, name: &str) -> Option<&'a Local<'m>> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// A package-level declaration.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Decl<'m> {
    Type(&'m TypeDecl),
    Func(&'m FuncDecl),
    Var(&'m ValueDecl),
    Const(&'m ValueDecl),
}

/// A declaration and the file declaring it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sited<'m> {
    pub file: &'m SourceFile,
    pub decl: Decl<'m>,
}

impl<'m> Sited<'m> {
    pub fn name_span(&self) -> Span {
        match self.decl {
            Decl::Type(d) => d.name_span,
            Decl::Func(d) => d.name_span,
            Decl::Var(d) | Decl::Const(d) => d.name_span,
        }
    }

    pub fn type_decl(&self) -> Option<&'m TypeDecl> {
        match self.decl {
            Decl::Type(d) => Some(d),
            _ => None,
        }
    }
}

/// A field or method found on a type.
#[derive(Debug, Clone)]
pub(crate) struct Member<'m> {
    pub file: &'m SourceFile,
    pub name_span: Span,
    /// Field type.
    pub ty: Option<Ty<'m>>,
    /// Method result types.
    pub results: Vec<Option<Ty<'m>>>,
}

/// What a selector qualifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Qualifier<'m> {
    /// Import of a package in the module.
    Package(&'m str),
    /// Import of a package outside the module.
    External,
    NotImport,
}

struct PackageDecls<'m> {
    package: &'m Package,
    names: HashMap<&'m str, Sited<'m>>,
    /// Receiver base type name → methods.
    methods: HashMap<&'m str, Vec<(&'m SourceFile, &'m FuncDecl)>>,
}

/// Package-level declarations of every package in a module.
pub(crate) struct DeclMap<'m> {
    packages: HashMap<&'m str, PackageDecls<'m>>,
    /// File path → package path.
    file_packages: HashMap<&'m str, &'m str>,
}

impl<'m> DeclMap<'m> {
    pub fn new(module: &'m Module, include_tests: bool) -> Self {
        let mut packages = HashMap::new();
        let mut file_packages = HashMap::new();
        for package in module.packages.values() {
            let mut decls = PackageDecls {
                package,
                names: HashMap::new(),
                methods: HashMap::new(),
            };
            for file in package.files.iter().filter(|f| include_tests || !f.is_test) {
                file_packages.insert(file.path.as_str(), package.path.as_str());
                let mut add = |name: &'m str, decl: Decl<'m>| {
                    decls.names.insert(name, Sited { file, decl });
                };
                for decl in file.types.values() {
                    add(decl.name.as_str(), Decl::Type(decl));
                }
                for decl in file.functions.values() {
                    add(decl.name.as_str(), Decl::Func(decl));
                }
                for decl in file.variables.values() {
                    add(decl.name.as_str(), Decl::Var(decl));
                }
                for decl in file.constants.values() {
                    add(decl.name.as_str(), Decl::Const(decl));
                }
                for method in &file.methods {
                    if let Some(receiver) = method.receiver_type_name() {
                        decls
                            .methods
                            .entry(receiver)
                            .or_default()
                            .push((file, method));
                    }
                }
            }
            packages.insert(package.path.as_str(), decls);
        }
        DeclMap {
            packages,
            file_packages,
        }
    }

    pub fn package(&self, path: &str) -> Option<&'m Package> {
        self.packages.get(path).map(|p| p.package)
    }

    /// Package-level declaration `name` in `package`.
    pub fn lookup(&self, package: &str, name: &str) -> Option<Sited<'m>> {
        self.packages.get(package)?.names.get(name).copied()
    }

    /// Resolve a file-scope name through dot imports of module packages.
    pub fn lookup_dot(&self, file: &'m SourceFile, name: &str) -> Option<Sited<'m>> {
        if !is_exported(name) {
            return None;
        }
        file.imports
            .iter()
            .filter(|i| i.is_dot())
            .find_map(|i| self.lookup(&i.path, name))
    }

    /// Resolve a name in package scope, then through dot imports.
    pub fn lookup_in_file(
        &self,
        package: &str,
        file: &'m SourceFile,
        name: &str,
    ) -> Option<Sited<'m>> {
        self.lookup(package, name)
            .or_else(|| self.lookup_dot(file, name))
    }

    /// What `name` denotes as a qualifier in `file`.
    pub fn qualifier(&self, file: &SourceFile, name: &str) -> Qualifier<'m> {
        match file.import_named(name) {
            Some(import) if !import.is_dot() && !import.is_blank() => {
                match self.packages.get_key_value(import.path.as_str()) {
                    Some((path, _)) => Qualifier::Package(path),
                    None => Qualifier::External,
                }
            }
            _ => Qualifier::NotImport,
        }
    }

    /// Package path a declaration was found in, as a `'m` string.
    fn package_key(&self, path: &str) -> Option<&'m str> {
        self.packages.get(path).map(|p| p.package.path.as_str())
    }

    // ========================================================================
    // Type expressions
    // ========================================================================

    /// The type a type expression denotes, read in `file` of `package`.
    pub fn type_of_type(&self, node: &'m Node, package: &str, file: &'m SourceFile) -> Option<Ty<'m>> {
        match node {
            Node::Ident { name, .. } => {
                let dot = file
                    .imports
                    .iter()
                    .filter(|i| i.is_dot())
                    .map(|i| i.path.as_str());
                std::iter::once(package).chain(dot).find_map(|path| {
                    let decl = self.lookup(path, name)?.type_decl()?;
                    Some(Ty::Named {
                        package: self.package_key(path)?,
                        name: decl.name.as_str(),
                    })
                })
            }
            Node::Selector { base, name, .. } => {
                let Node::Ident { name: qualifier, .. } = base.as_ref() else {
                    return None;
                };
                let Qualifier::Package(path) = self.qualifier(file, qualifier) else {
                    return None;
                };
                let decl = self.lookup(path, name)?.type_decl()?;
                Some(Ty::Named {
                    package: path,
                    name: decl.name.as_str(),
                })
            }
            Node::Unary {
                op: UnaryOp::Deref,
                operand,
            } => self.type_of_type(operand, package, file),
            Node::Index { base, .. } => self.type_of_type(base, package, file),
            Node::TypeExpr { form, parts } => match form {
                TypeForm::Slice | TypeForm::Array | TypeForm::Variadic => {
                    let elem = self.type_of_type(parts.last()?, package, file)?;
                    Some(Ty::Slice(Box::new(elem)))
                }
                TypeForm::Map => {
                    let key = parts
                        .first()
                        .and_then(|k| self.type_of_type(k, package, file));
                    let value = parts
                        .get(1)
                        .and_then(|v| self.type_of_type(v, package, file));
                    if key.is_none() && value.is_none() {
                        return None;
                    }
                    Some(Ty::Map(key.map(Box::new), value.map(Box::new)))
                }
                TypeForm::Chan => {
                    let elem = self.type_of_type(parts.first()?, package, file)?;
                    Some(Ty::Chan(Box::new(elem)))
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn param_types(
        &self,
        params: &'m [ParamDecl],
        package: &str,
        file: &'m SourceFile,
    ) -> Vec<Option<Ty<'m>>> {
        params
            .iter()
            .map(|p| self.type_of_type(&p.type_node, package, file))
            .collect()
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Field or method `name` of the named type `package.type_name`,
    /// including members promoted through embedding.
    pub fn member(&self, package: &str, type_name: &str, name: &str) -> Option<Member<'m>> {
        self.member_at_depth(package, type_name, name, 0)
    }

    fn member_at_depth(
        &self,
        package: &str,
        type_name: &str,
        name: &str,
        depth: u8,
    ) -> Option<Member<'m>> {
        if depth > MAX_DEPTH {
            return None;
        }
        let decls = self.packages.get(package)?;
        let sited = decls.names.get(type_name)?;
        let decl = sited.type_decl()?;
        let file = sited.file;

        if let Some((method_file, method)) = decls
            .methods
            .get(type_name)
            .and_then(|methods| methods.iter().find(|(_, m)| m.name == name))
        {
            return Some(Member {
                file: method_file,
                name_span: method.name_span,
                ty: None,
                results: self.param_types(&method.results, package, method_file),
            });
        }

        let mut embedded = Vec::new();
        match &decl.kind {
            TypeKind::Struct { fields } => {
                for field in fields {
                    if field.embedded {
                        let ty = self.type_of_type(&field.type_node, package, file);
                        if field.name == name {
                            // `x.Base` names the embedded type itself.
                            let (p, t) = ty.as_ref()?.named()?;
                            let target = self.lookup(p, t)?;
                            return Some(Member {
                                file: target.file,
                                name_span: target.name_span(),
                                ty,
                                results: Vec::new(),
                            });
                        }
                        embedded.extend(ty);
                    } else if field.name == name {
                        return Some(Member {
                            file,
                            name_span: field.name_span,
                            ty: self.type_of_type(&field.type_node, package, file),
                            results: Vec::new(),
                        });
                    }
                }
            }
            TypeKind::Interface { methods, embeds } => {
                if let Some(method) = methods.iter().find(|m| m.name == name) {
                    return Some(Member {
                        file,
                        name_span: method.name_span,
                        ty: None,
                        results: self.param_types(&method.results, package, file),
                    });
                }
                embedded.extend(
                    embeds
                        .iter()
                        .filter_map(|e| self.type_of_type(e, package, file)),
                );
            }
            TypeKind::Other { .. } => {}
        }

        embedded.iter().filter_map(Ty::named).find_map(|(p, t)| {
            self.member_at_depth(p, t, name, depth + 1)
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Inferred type of a value expression.
    pub fn expr_type(&self, expr: &'m Node, env: &Env<'_, 'm>) -> Option<Ty<'m>> {
        self.expr_type_at(expr, env, 0)
    }

    fn expr_type_at(&self, expr: &'m Node, env: &Env<'_, 'm>, depth: u8) -> Option<Ty<'m>> {
        if depth > MAX_DEPTH {
            return None;
        }
        let package = env.package.path.as_str();
        match expr {
            Node::Ident { name, .. } => {
                if let Some(local) = env.local(name) {
                    return local.ty.clone();
                }
                let sited = self.lookup_in_file(package, env.file, name)?;
                self.value_type(sited, depth + 1)
            }
            Node::Selector { base, name, .. } => {
                if let Node::Ident { name: q, .. } = base.as_ref() {
                    if env.local(q).is_none() {
                        if let Qualifier::Package(path) = self.qualifier(env.file, q) {
                            return self.value_type(self.lookup(path, name)?, depth + 1);
                        }
                    }
                }
                let (p, t) = self.expr_type_at(base, env, depth + 1)?.named()?;
                self.member(p, t, name)?.ty
            }
            Node::Call { func, args } => self
                .call_results_at(func, args, env, depth + 1)
                .into_iter()
                .next()
                .flatten(),
            Node::Composite { ty: Some(ty), .. } => self.type_of_type(ty, package, env.file),
            Node::Unary { op, operand } => {
                let ty = self.expr_type_at(operand, env, depth + 1)?;
                match (op, ty) {
                    (UnaryOp::Other, Ty::Chan(elem)) => Some(*elem),
                    (_, ty) => Some(ty),
                }
            }
            Node::Index { base, .. } => self.expr_type_at(base, env, depth + 1)?.indexed(),
            Node::TypeAssert { ty: Some(ty), .. } => self.type_of_type(ty, package, env.file),
            _ => None,
        }
    }

    /// Result types of calling `func`: a function, method, conversion or builtin.
    pub fn call_results(
        &self,
        func: &'m Node,
        args: &'m [Node],
        env: &Env<'_, 'm>,
    ) -> Vec<Option<Ty<'m>>> {
        self.call_results_at(func, args, env, 0)
    }

    fn call_results_at(
        &self,
        func: &'m Node,
        args: &'m [Node],
        env: &Env<'_, 'm>,
        depth: u8,
    ) -> Vec<Option<Ty<'m>>> {
        if depth > MAX_DEPTH {
            return Vec::new();
        }
        let package = env.package.path.as_str();
        match func {
            Node::Ident { name, .. } => {
                if env.local(name).is_some() {
                    return Vec::new();
                }
                match self.lookup_in_file(package, env.file, name) {
                    Some(sited) => self.sited_call_results(sited),
                    None => match name.as_str() {
                        "new" | "make" => vec![args
                            .first()
                            .and_then(|t| self.type_of_type(t, package, env.file))],
                        "append" => vec![args
                            .first()
                            .and_then(|s| self.expr_type_at(s, env, depth + 1))],
                        _ => Vec::new(),
                    },
                }
            }
            Node::Selector { base, name, .. } => {
                if let Node::Ident { name: q, .. } = base.as_ref() {
                    if env.local(q).is_none() {
                        if let Qualifier::Package(path) = self.qualifier(env.file, q) {
                            return self
                                .lookup(path, name)
                                .map(|sited| self.sited_call_results(sited))
                                .unwrap_or_default();
                        }
                    }
                }
                self.expr_type_at(base, env, depth + 1)
                    .and_then(|ty| ty.named())
                    .and_then(|(p, t)| self.member(p, t, name))
                    .map(|m| m.results)
                    .unwrap_or_default()
            }
            Node::FuncLit { results, .. } => self.param_types(results, package, env.file),
            other => vec![self.type_of_type(other, package, env.file)],
        }
    }

    /// Results of calling a package-level declaration.
    fn sited_call_results(&self, sited: Sited<'m>) -> Vec<Option<Ty<'m>>> {
        let Some(package) = self.package_of_file(sited.file) else {
            return Vec::new();
        };
        match sited.decl {
            Decl::Func(f) => self.param_types(&f.results, package, sited.file),
            // Conversion `T(x)`.
            Decl::Type(t) => vec![Some(Ty::Named {
                package,
                name: t.name.as_str(),
            })],
            Decl::Var(_) | Decl::Const(_) => Vec::new(),
        }
    }

    /// Declared or initializer type of a package-level variable or constant.
    fn value_type(&self, sited: Sited<'m>, depth: u8) -> Option<Ty<'m>> {
        let (Decl::Var(value) | Decl::Const(value)) = sited.decl else {
            return None;
        };
        let package_path = self.package_of_file(sited.file)?;
        if let Some(node) = &value.type_node {
            return self.type_of_type(node, package_path, sited.file);
        }
        let package = self.package(package_path)?;
        let env = Env {
            package,
            file: sited.file,
            scopes: &[],
        };
        self.expr_type_at(value.value.as_ref()?, &env, depth)
    }

    fn package_of_file(&self, file: &SourceFile) -> Option<&'m str> {
        self.file_packages.get(file.path.as_str()).copied()
    }
}

// ============================================================================
// Tests
// ============================================================================
