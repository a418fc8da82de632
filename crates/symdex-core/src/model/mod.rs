//! Module model: packages, files, declarations and name-use syntax.
//!
//! The model is an arena of plain values. Packages are keyed by import path
//! inside a [`Module`], files are addressed by path, and declarations are
//! keyed by name inside their [`SourceFile`]. Nothing holds a pointer to its
//! parent; the owning package or file is always found by path.
//!
//! All spans are byte spans into the owning file's `content`. Type and
//! signature text is read back from `content` through those spans, so it
//! stays correct after edits remap them.

mod node;
mod visit;

pub use node::{Binding, Node, TypeForm, UnaryOp};
pub use visit::{Shift, SpanVisitor, WalkSpans};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::patch::Span;

/// Suffix that marks a test file.
pub const TEST_FILE_SUFFIX: &str = "_test.go";

// ============================================================================
// Module / Package / File
// ============================================================================

/// A module: the root of the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Module path (import path prefix of its packages).
    pub path: String,
    /// Packages keyed by import path.
    pub packages: BTreeMap<String, Package>,
    /// Bumped on every mutation; an index built at an older revision is stale.
    #[serde(default)]
    pub revision: u64,
}

impl Module {
    pub fn new(path: impl Into<String>) -> Self {
        Module {
            path: path.into(),
            packages: BTreeMap::new(),
            revision: 0,
        }
    }

    /// Builder-style package insertion.
    pub fn with_package(mut self, package: Package) -> Self {
        self.add_package(package);
        self
    }

    /// Insert or replace a package.
    pub fn add_package(&mut self, package: Package) {
        self.packages.insert(package.path.clone(), package);
    }

    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.get(path)
    }

    pub fn package_mut(&mut self, path: &str) -> Option<&mut Package> {
        self.packages.get_mut(path)
    }

    /// Find a package by import path, or by name when the name is unique.
    pub fn find_package(&self, path_or_name: &str) -> Option<&Package> {
        if let Some(pkg) = self.packages.get(path_or_name) {
            return Some(pkg);
        }
        let mut named = self.packages.values().filter(|p| p.name == path_or_name);
        match (named.next(), named.next()) {
            (Some(pkg), None) => Some(pkg),
            _ => None,
        }
    }

    /// Iterate every file with its owning package, in package-path order.
    pub fn files(&self) -> impl Iterator<Item = (&Package, &SourceFile)> {
        self.packages
            .values()
            .flat_map(|pkg| pkg.files.iter().map(move |f| (pkg, f)))
    }

    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.files().map(|(_, f)| f).find(|f| f.path == path)
    }

    pub fn file_mut(&mut self, path: &str) -> Option<&mut SourceFile> {
        self.packages
            .values_mut()
            .flat_map(|pkg| pkg.files.iter_mut())
            .find(|f| f.path == path)
    }

    /// The package owning a file.
    pub fn package_of_file(&self, path: &str) -> Option<&Package> {
        self.packages
            .values()
            .find(|pkg| pkg.files.iter().any(|f| f.path == path))
    }

    pub fn file_count(&self) -> usize {
        self.packages.values().map(|p| p.files.len()).sum()
    }

    /// Record a mutation.
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    /// Mark a file and its package as modified.
    pub fn mark_modified(&mut self, path: &str) {
        for pkg in self.packages.values_mut() {
            if let Some(file) = pkg.files.iter_mut().find(|f| f.path == path) {
                file.modified = true;
                pkg.modified = true;
            }
        }
    }

    /// Files changed since load.
    pub fn modified_files(&self) -> Vec<&SourceFile> {
        self.files()
            .map(|(_, f)| f)
            .filter(|f| f.modified)
            .collect()
    }
}

/// A package: the files sharing one directory and package clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Import path.
    pub path: String,
    /// Package clause name.
    pub name: String,
    pub files: Vec<SourceFile>,
    #[serde(default)]
    pub modified: bool,
}

impl Package {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Package {
            path: path.into(),
            name: name.into(),
            files: Vec::new(),
            modified: false,
        }
    }

    pub fn with_file(mut self, file: SourceFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Directory the package's files live in ("" for the module root).
    pub fn directory(&self) -> &str {
        self.files
            .first()
            .and_then(|f| f.path.rsplit_once('/'))
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    /// True when any file declares a top-level `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.declares(name))
    }
}

/// One source file and its declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the module root.
    pub path: String,
    /// Raw file text.
    pub content: String,
    /// `_test` file.
    #[serde(default)]
    pub is_test: bool,
    /// Name in the package clause.
    pub package_name: String,
    /// Span of the package clause name.
    pub package_span: Span,
    #[serde(default)]
    pub imports: Vec<ImportDecl>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDecl>,
    #[serde(default)]
    pub functions: BTreeMap<String, FuncDecl>,
    /// Methods in source order; several types may share a method name.
    #[serde(default)]
    pub methods: Vec<FuncDecl>,
    #[serde(default)]
    pub variables: BTreeMap<String, ValueDecl>,
    #[serde(default)]
    pub constants: BTreeMap<String, ValueDecl>,
    /// Blank-identifier declarations (`var _ I = (*T)(nil)`), kept for the
    /// names their types and values use.
    #[serde(default)]
    pub blanks: Vec<ValueDecl>,
    #[serde(default)]
    pub modified: bool,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        SourceFile {
            is_test: path.ends_with(TEST_FILE_SUFFIX),
            path,
            content: content.into(),
            ..Default::default()
        }
    }

    /// Text addressed by a span, or "" when the span is invalid.
    pub fn text(&self, span: Span) -> &str {
        span.slice(&self.content).unwrap_or("")
    }

    /// True when the file declares a top-level `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.types.contains_key(name)
            || self.functions.contains_key(name)
            || self.variables.contains_key(name)
            || self.constants.contains_key(name)
    }

    /// Methods whose receiver base type is `type_name`.
    pub fn methods_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a FuncDecl> {
        self.methods
            .iter()
            .filter(move |m| m.receiver_type_name() == Some(type_name))
    }

    /// Rebuild the name-keyed declaration maps from the declarations' names.
    pub fn rekey(&mut self) {
        fn rekeyed<T>(map: &mut BTreeMap<String, T>, name: impl Fn(&T) -> String) {
            *map = std::mem::take(map)
                .into_values()
                .map(|decl| (name(&decl), decl))
                .collect();
        }
        rekeyed(&mut self.types, |d| d.name.clone());
        rekeyed(&mut self.functions, |d| d.name.clone());
        rekeyed(&mut self.variables, |d| d.name.clone());
        rekeyed(&mut self.constants, |d| d.name.clone());
    }

    /// Import visible under `local` in this file.
    pub fn import_named(&self, local: &str) -> Option<&ImportDecl> {
        self.imports.iter().find(|i| i.local_name() == local)
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// An import spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDecl {
    /// Imported path, unquoted.
    pub path: String,
    /// Span of the quoted path literal.
    pub path_span: Span,
    /// Explicit name: alias, "." or "_".
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub alias_span: Option<Span>,
}

impl ImportDecl {
    /// Name the import binds in the file scope.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias.as_str(),
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }

    /// Dot import: exported names merge into the file scope.
    pub fn is_dot(&self) -> bool {
        self.alias.as_deref() == Some(".")
    }

    /// Blank import: side effects only.
    pub fn is_blank(&self) -> bool {
        self.alias.as_deref() == Some("_")
    }

    /// Span naming the import: the alias when present, else the path literal.
    pub fn name_span(&self) -> Span {
        self.alias_span.unwrap_or(self.path_span)
    }
}

/// A type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub name_span: Span,
    /// Whole declaration, including the body.
    pub extent: Span,
    pub kind: TypeKind,
    #[serde(default)]
    pub doc: Option<String>,
}

impl TypeDecl {
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct { .. })
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface { .. })
    }

    pub fn fields(&self) -> &[FieldDecl] {
        match &self.kind {
            TypeKind::Struct { fields } => fields,
            _ => &[],
        }
    }

    pub fn interface_methods(&self) -> &[InterfaceMethod] {
        match &self.kind {
            TypeKind::Interface { methods, .. } => methods,
            _ => &[],
        }
    }
}

/// Shape of a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    Struct {
        fields: Vec<FieldDecl>,
    },
    Interface {
        methods: Vec<InterfaceMethod>,
        /// Embedded interfaces.
        #[serde(default)]
        embeds: Vec<Node>,
    },
    /// Named type over another type expression (`type Celsius float64`).
    Other { underlying: Node },
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub name_span: Span,
    pub type_span: Span,
    pub type_node: Node,
    /// Embedded field: the name is the base type name.
    #[serde(default)]
    pub embedded: bool,
    #[serde(default)]
    pub doc: Option<String>,
}

/// A method specification inside an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceMethod {
    pub name: String,
    pub name_span: Span,
    /// Parameters and results, e.g. `() (int, error)`.
    pub signature_span: Span,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub results: Vec<ParamDecl>,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    pub name_span: Span,
    pub extent: Span,
    #[serde(default)]
    pub receiver: Option<ParamDecl>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub results: Vec<ParamDecl>,
    /// Parameters and results, without the body.
    pub signature_span: Span,
    /// Body block; absent for external (assembly) functions.
    #[serde(default)]
    pub body: Option<Node>,
    #[serde(default)]
    pub doc: Option<String>,
}

impl FuncDecl {
    pub fn is_method(&self) -> bool {
        self.receiver.is_some()
    }

    /// Receiver base type, with pointer and type arguments stripped.
    pub fn receiver_type_name(&self) -> Option<&str> {
        self.receiver.as_ref()?.type_node.base_type_name()
    }

    /// Receiver, parameters and named results, in declaration order.
    pub fn all_params(&self) -> impl Iterator<Item = &ParamDecl> {
        self.receiver
            .iter()
            .chain(self.params.iter())
            .chain(self.results.iter())
    }
}

/// A receiver, parameter or result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_span: Option<Span>,
    pub type_span: Span,
    pub type_node: Node,
}

/// A package-level or local `var`/`const` binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDecl {
    pub name: String,
    pub name_span: Span,
    /// The spec line this name was declared on.
    pub extent: Span,
    #[serde(default)]
    pub type_span: Option<Span>,
    #[serde(default)]
    pub type_node: Option<Node>,
    /// Initializer for this name, if any.
    #[serde(default)]
    pub value: Option<Node>,
    #[serde(default)]
    pub doc: Option<String>,
}

/// Collapse whitespace runs so signatures compare textually.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True for a normalized, forward-slash path relative to the module root:
/// no leading `/`, no backslashes or drive colons, and every segment a
/// plain name (no empty, `.` or `..` segment).
pub fn is_module_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.contains(['\\', ':'])
        && path
            .split('/')
            .all(|segment| !matches!(segment, "" | "." | ".."))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, start: u64) -> Node {
        Node::Ident {
            name: name.to_string(),
            span: Span::new(start, start + name.len() as u64),
        }
    }

    fn value(name: &str, start: u64) -> ValueDecl {
        ValueDecl {
            name: name.to_string(),
            name_span: Span::new(start, start + name.len() as u64),
            extent: Span::new(start, start + name.len() as u64),
            type_span: None,
            type_node: None,
            value: None,
            doc: None,
        }
    }

    mod module_tests {
        use super::*;

        fn sample() -> Module {
            let mut file = SourceFile::new("p/a.go", "package p\n");
            file.package_name = "p".to_string();
            let test_file = SourceFile::new("p/a_test.go", "package p\n");
            Module::new("example.com/m").with_package(
                Package::new("example.com/m/p", "p")
                    .with_file(file)
                    .with_file(test_file),
            )
        }

        #[test]
        fn files_are_found_by_path() {
            let module = sample();
            assert_eq!(module.file_count(), 2);
            assert!(module.file("p/a.go").is_some());
            assert!(module.file("p/a_test.go").unwrap().is_test);
            assert_eq!(
                module.package_of_file("p/a.go").unwrap().path,
                "example.com/m/p"
            );
            assert_eq!(module.package("example.com/m/p").unwrap().directory(), "p");
        }

        #[test]
        fn find_package_by_unique_name() {
            let module = sample();
            assert!(module.find_package("p").is_some());
            assert!(module.find_package("example.com/m/p").is_some());
            assert!(module.find_package("q").is_none());
        }

        #[test]
        fn mark_modified_flags_file_and_package() {
            let mut module = sample();
            module.mark_modified("p/a.go");
            assert!(module.file("p/a.go").unwrap().modified);
            assert!(module.package("example.com/m/p").unwrap().modified);
            assert_eq!(module.modified_files().len(), 1);
        }
    }

    mod path_tests {
        use super::*;

        #[test]
        fn module_relative_paths() {
            assert!(is_module_relative("main.go"));
            assert!(is_module_relative("auth/internal/token.go"));
            assert!(is_module_relative("..hidden/a.go"));
            for path in [
                "",
                "/etc/a.go",
                "../escape/e.go",
                "auth/../../e.go",
                "./main.go",
                "auth//a.go",
                "auth/",
                "auth\\a.go",
                "C:/a.go",
            ] {
                assert!(!is_module_relative(path), "{}", path);
            }
        }
    }

    mod file_tests {
        use super::*;

        #[test]
        fn rekey_follows_renamed_declarations() {
            let mut file = SourceFile::new("a.go", "var Old = 1");
            file.variables.insert("Old".to_string(), value("Old", 4));
            file.variables.get_mut("Old").unwrap().name = "New".to_string();
            file.rekey();
            assert!(file.variables.contains_key("New"));
            assert!(!file.variables.contains_key("Old"));
        }

        #[test]
        fn import_local_names() {
            let import = ImportDecl {
                path: "example.com/m/store".to_string(),
                path_span: Span::new(0, 21),
                alias: None,
                alias_span: None,
            };
            assert_eq!(import.local_name(), "store");
            let dot = ImportDecl {
                alias: Some(".".to_string()),
                alias_span: Some(Span::new(0, 1)),
                ..import.clone()
            };
            assert!(dot.is_dot());
            assert_eq!(dot.name_span(), Span::new(0, 1));
        }

        #[test]
        fn receiver_type_name_strips_pointer() {
            let recv = ParamDecl {
                name: Some("a".to_string()),
                name_span: Some(Span::new(6, 7)),
                type_span: Span::new(8, 10),
                type_node: Node::Unary {
                    op: UnaryOp::Deref,
                    operand: Box::new(ident("A", 9)),
                },
            };
            let method = FuncDecl {
                name: "Read".to_string(),
                name_span: Span::new(12, 16),
                extent: Span::new(0, 30),
                receiver: Some(recv),
                params: vec![],
                results: vec![],
                signature_span: Span::new(16, 18),
                body: None,
                doc: None,
            };
            assert_eq!(method.receiver_type_name(), Some("A"));
            assert_eq!(method.all_params().count(), 1);
        }

        #[test]
        fn normalize_collapses_whitespace() {
            assert_eq!(normalize_text("()  (int,\n\terror)"), "() (int, error)");
        }
    }
}
