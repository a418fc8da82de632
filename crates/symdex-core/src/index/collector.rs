//! Symbol collection: the first pass of an index build.
//!
//! One forward walk over packages, files and declarations emits one
//! [`Symbol`] per retained declaration. The walk order is fixed:
//!
//! 1. the package symbol,
//! 2. per file: imports, each type followed by its fields or interface
//!    methods and the methods declared for it in the same file, the
//!    remaining methods, functions (each followed by its parameters),
//!    variables, constants.
//!
//! Declarations are visited in source order within each group, so two
//! builds over the same module assign the same IDs.

use std::collections::{BTreeMap, HashMap};

use crate::error::{SymdexError, SymdexResult};
use crate::index::symbol::{DeclOrigin, Symbol, SymbolId, SymbolKind};
use crate::index::IndexOptions;
use crate::model::{normalize_text, FuncDecl, Module, Package, SourceFile, TypeKind, ValueDecl};
use crate::patch::Span;
use crate::text::LineIndex;
use crate::validation::is_exported;

// ============================================================================
// SymbolTable
// ============================================================================

/// Symbol storage and lookup maps.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    // Primary storage (BTreeMap for deterministic iteration)
    symbols: BTreeMap<SymbolId, Symbol>,

    // Postings lists
    by_name: HashMap<String, Vec<SymbolId>>,
    by_kind: HashMap<SymbolKind, Vec<SymbolId>>,
    by_file: HashMap<String, Vec<SymbolId>>,
    /// Normalized declared type text → symbols.
    by_declared_type: HashMap<String, Vec<SymbolId>>,
    by_qualified: HashMap<String, Vec<SymbolId>>,
    /// Parent type name → fields and methods.
    by_parent: HashMap<String, Vec<SymbolId>>,
    /// File → declared name span → symbol.
    by_origin: HashMap<String, HashMap<Span, SymbolId>>,

    next_symbol_id: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next SymbolId.
    pub fn next_symbol_id(&mut self) -> SymbolId {
        let id = SymbolId::new(self.next_symbol_id);
        self.next_symbol_id += 1;
        id
    }

    /// Insert a symbol and update every lookup map.
    pub fn insert(&mut self, symbol: Symbol) {
        let id = symbol.id;
        self.by_name.entry(symbol.name.clone()).or_default().push(id);
        self.by_kind.entry(symbol.kind).or_default().push(id);
        self.by_file.entry(symbol.file.clone()).or_default().push(id);
        self.by_qualified
            .entry(symbol.qualified_name.clone())
            .or_default()
            .push(id);
        if let Some(parent) = &symbol.parent_type {
            self.by_parent.entry(parent.clone()).or_default().push(id);
        }
        if let Some(type_text) = symbol.type_text.as_deref().filter(|_| {
            matches!(
                symbol.kind,
                SymbolKind::Field
                    | SymbolKind::Variable
                    | SymbolKind::Constant
                    | SymbolKind::Parameter
            )
        }) {
            self.by_declared_type
                .entry(normalize_text(type_text))
                .or_default()
                .push(id);
        }
        self.by_origin
            .entry(symbol.origin.file.clone())
            .or_default()
            .insert(symbol.origin.name_span, id);
        self.symbols.insert(id, symbol);
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// All symbols in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    fn lookup(&self, ids: Option<&Vec<SymbolId>>) -> Vec<&Symbol> {
        let mut symbols: Vec<_> = ids
            .map(|ids| ids.iter().filter_map(|id| self.symbols.get(id)).collect())
            .unwrap_or_default();
        symbols.sort_by_key(|s| s.id);
        symbols
    }

    pub fn named(&self, name: &str) -> Vec<&Symbol> {
        self.lookup(self.by_name.get(name))
    }

    pub fn of_kind(&self, kind: SymbolKind) -> Vec<&Symbol> {
        self.lookup(self.by_kind.get(&kind))
    }

    pub fn in_file(&self, path: &str) -> Vec<&Symbol> {
        self.lookup(self.by_file.get(path))
    }

    pub fn with_declared_type(&self, type_text: &str) -> Vec<&Symbol> {
        self.lookup(self.by_declared_type.get(&normalize_text(type_text)))
    }

    pub fn qualified(&self, qualified_name: &str) -> Vec<&Symbol> {
        self.lookup(self.by_qualified.get(qualified_name))
    }

    /// Fields and methods whose parent type is named `type_name`, in any package.
    pub fn members_of(&self, type_name: &str) -> Vec<&Symbol> {
        self.lookup(self.by_parent.get(type_name))
    }

    /// Symbol declared with its name at `name_span` in `file`.
    pub fn at_origin(&self, file: &str, name_span: Span) -> Option<SymbolId> {
        self.by_origin.get(file)?.get(&name_span).copied()
    }
}

// ============================================================================
// Collection
// ============================================================================

/// Run the collection pass over `module`.
///
/// Fails only when a declaration's name span does not address its name in
/// the file text.
pub fn collect(module: &Module, options: &IndexOptions) -> SymdexResult<SymbolTable> {
    let mut collector = Collector {
        table: SymbolTable::new(),
        options,
    };
    for package in module.packages.values() {
        collector.package(package)?;
    }
    tracing::debug!(symbols = collector.table.len(), "collected symbols");
    Ok(collector.table)
}

struct Collector<'o> {
    table: SymbolTable,
    options: &'o IndexOptions,
}

/// Per-file state shared by every symbol the file emits.
struct FileCtx<'m> {
    package: &'m Package,
    file: &'m SourceFile,
    lines: LineIndex,
}

/// Everything about a symbol except its ID and file-derived fields.
struct Draft {
    name: String,
    kind: SymbolKind,
    name_span: Span,
    extent: Span,
    qualified_name: String,
    parent_type: Option<String>,
    container: Option<String>,
    type_text: Option<String>,
    doc: Option<String>,
}

impl Draft {
    fn new(kind: SymbolKind, name: &str, name_span: Span, extent: Span) -> Self {
        Draft {
            name: name.to_string(),
            kind,
            name_span,
            extent,
            qualified_name: String::new(),
            parent_type: None,
            container: None,
            type_text: None,
            doc: None,
        }
    }
}

impl<'o> Collector<'o> {
    fn retains(&self, name: &str, kind: SymbolKind) -> bool {
        match kind {
            SymbolKind::Package | SymbolKind::Import => true,
            SymbolKind::Parameter => self.options.include_private,
            _ => self.options.include_private || is_exported(name),
        }
    }

    fn retains_file(&self, file: &SourceFile) -> bool {
        self.options.include_tests || !file.is_test
    }

    fn emit(&mut self, ctx: &FileCtx<'_>, draft: Draft) -> SymdexResult<()> {
        if !self.retains(&draft.name, draft.kind) {
            return Ok(());
        }
        let text = ctx.file.text(draft.name_span);
        if draft.kind != SymbolKind::Import && text != draft.name {
            return Err(SymdexError::invalid_model(format!(
                "{}: span {} of {} `{}` addresses `{}`",
                ctx.file.path, draft.name_span, draft.kind, draft.name, text
            )));
        }
        let id = self.table.next_symbol_id();
        let qualified_name = if draft.qualified_name.is_empty() {
            format!("{}.{}", ctx.package.path, draft.name)
        } else {
            draft.qualified_name
        };
        self.table.insert(Symbol {
            id,
            exported: is_exported(&draft.name),
            name: draft.name,
            kind: draft.kind,
            qualified_name,
            package: ctx.package.path.clone(),
            file: ctx.file.path.clone(),
            range: ctx.lines.range(draft.extent),
            name_span: draft.name_span,
            parent_type: draft.parent_type,
            container: draft.container,
            type_text: draft.type_text,
            doc: draft.doc,
            origin: DeclOrigin::new(ctx.file.path.clone(), draft.name_span),
        });
        Ok(())
    }

    fn package(&mut self, package: &Package) -> SymdexResult<()> {
        let files: Vec<&SourceFile> = package
            .files
            .iter()
            .filter(|f| self.retains_file(f))
            .collect();
        let Some(first) = files.first() else {
            return Ok(());
        };

        let ctx = FileCtx {
            package,
            file: first,
            lines: LineIndex::new(&first.content),
        };
        let mut draft = Draft::new(
            SymbolKind::Package,
            &first.package_name,
            first.package_span,
            first.package_span,
        );
        draft.qualified_name = package.path.clone();
        self.emit(&ctx, draft)?;

        for file in files {
            self.file(FileCtx {
                package,
                file,
                lines: LineIndex::new(&file.content),
            })?;
        }
        Ok(())
    }

    fn file(&mut self, ctx: FileCtx<'_>) -> SymdexResult<()> {
        let file = ctx.file;
        let pkg_path = ctx.package.path.as_str();

        for import in file.imports.iter().filter(|i| !i.is_dot() && !i.is_blank()) {
            let extent = Span::new(
                import.name_span().start.min(import.path_span.start),
                import.path_span.end,
            );
            let mut draft = Draft::new(
                SymbolKind::Import,
                import.local_name(),
                import.name_span(),
                extent,
            );
            draft.qualified_name = import.path.clone();
            draft.type_text = Some(import.path.clone());
            self.emit(&ctx, draft)?;
        }

        let mut types: Vec<_> = file.types.values().collect();
        types.sort_by_key(|t| t.name_span.start);
        for decl in types {
            let kind = match &decl.kind {
                TypeKind::Struct { .. } => SymbolKind::Struct,
                TypeKind::Interface { .. } => SymbolKind::Interface,
                TypeKind::Other { .. } => SymbolKind::Type,
            };
            let mut draft = Draft::new(kind, &decl.name, decl.name_span, decl.extent);
            draft.doc = decl.doc.clone();
            self.emit(&ctx, draft)?;

            let member_prefix = format!("{}.{}", pkg_path, decl.name);
            // Embedded fields are type uses, not declared names.
            for field in decl.fields().iter().filter(|f| !f.embedded) {
                let extent = Span::new(field.name_span.start, field.type_span.end);
                let mut draft = Draft::new(SymbolKind::Field, &field.name, field.name_span, extent);
                draft.qualified_name = format!("{}.{}", member_prefix, field.name);
                draft.parent_type = Some(decl.name.clone());
                draft.type_text = Some(file.text(field.type_span).to_string());
                draft.doc = field.doc.clone();
                self.emit(&ctx, draft)?;
            }
            for method in decl.interface_methods() {
                let extent = Span::new(method.name_span.start, method.signature_span.end);
                let mut draft =
                    Draft::new(SymbolKind::Method, &method.name, method.name_span, extent);
                draft.qualified_name = format!("{}.{}", member_prefix, method.name);
                draft.parent_type = Some(decl.name.clone());
                draft.type_text = Some(file.text(method.signature_span).to_string());
                self.emit(&ctx, draft)?;
            }
            for method in file.methods_of(&decl.name) {
                self.func(&ctx, method)?;
            }
        }

        for method in file
            .methods
            .iter()
            .filter(|m| !matches!(m.receiver_type_name(), Some(t) if file.types.contains_key(t)))
        {
            self.func(&ctx, method)?;
        }

        let mut functions: Vec<_> = file.functions.values().collect();
        functions.sort_by_key(|f| f.name_span.start);
        for func in functions {
            self.func(&ctx, func)?;
        }

        for (kind, values) in [
            (SymbolKind::Variable, &file.variables),
            (SymbolKind::Constant, &file.constants),
        ] {
            let mut values: Vec<&ValueDecl> = values.values().collect();
            values.sort_by_key(|v| v.name_span.start);
            for value in values {
                let mut draft = Draft::new(kind, &value.name, value.name_span, value.extent);
                draft.type_text = value.type_span.map(|s| file.text(s).to_string());
                draft.doc = value.doc.clone();
                self.emit(&ctx, draft)?;
            }
        }
        Ok(())
    }

    /// A function or method followed by its parameters.
    fn func(&mut self, ctx: &FileCtx<'_>, func: &FuncDecl) -> SymdexResult<()> {
        let pkg_path = ctx.package.path.as_str();
        let parent = func.receiver_type_name();
        let (kind, container, qualified_name) = match parent {
            Some(parent) => (
                SymbolKind::Method,
                format!("{}.{}", parent, func.name),
                format!("{}.{}.{}", pkg_path, parent, func.name),
            ),
            None => (
                SymbolKind::Function,
                func.name.clone(),
                format!("{}.{}", pkg_path, func.name),
            ),
        };
        let mut draft = Draft::new(kind, &func.name, func.name_span, func.extent);
        draft.qualified_name = qualified_name.clone();
        draft.parent_type = parent.map(str::to_string);
        draft.type_text = Some(ctx.file.text(func.signature_span).to_string());
        draft.doc = func.doc.clone();
        self.emit(ctx, draft)?;

        for param in func.all_params() {
            let (Some(name), Some(name_span)) = (&param.name, param.name_span) else {
                continue;
            };
            if name == "_" {
                continue;
            }
            let extent = Span::new(name_span.start, param.type_span.end.max(name_span.end));
            let mut draft = Draft::new(SymbolKind::Parameter, name, name_span, extent);
            draft.qualified_name = format!("{}.{}", qualified_name, name);
            draft.container = Some(container.clone());
            draft.type_text = Some(ctx.file.text(param.type_span).to_string());
            self.emit(ctx, draft)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::parse_file;

    fn module(files: &[(&str, &str)]) -> Module {
        let mut package = Package::new("example.com/m/p", "p");
        for (path, src) in files {
            package.files.push(parse_file(path, src).unwrap());
        }
        Module::new("example.com/m").with_package(package)
    }

    const SRC: &str = "package p\n\nimport \"fmt\"\n\ntype Server struct {\n\tAddr string\n\tport int\n}\n\nfunc (s *Server) Start(timeout int) error { return nil }\n\nfunc New() *Server { return nil }\n\nvar DefaultTimeout = 5\n\nconst Version = \"1\"\n\nfunc helper() {}\n";

    mod table_tests {
        use super::*;

        #[test]
        fn collection_order_is_fixed() {
            let table = collect(&module(&[("p/a.go", SRC)]), &IndexOptions::default()).unwrap();
            let names: Vec<_> = table.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(
                names,
                vec!["p", "fmt", "Server", "Addr", "Start", "New", "DefaultTimeout", "Version"]
            );
        }

        #[test]
        fn private_and_parameters_need_include_private() {
            let options = IndexOptions {
                include_private: true,
                ..Default::default()
            };
            let table = collect(&module(&[("p/a.go", SRC)]), &options).unwrap();
            assert_eq!(table.named("port").len(), 1);
            assert_eq!(table.named("helper").len(), 1);
            let timeout = table.named("timeout");
            assert_eq!(timeout[0].kind, SymbolKind::Parameter);
            assert_eq!(timeout[0].container.as_deref(), Some("Server.Start"));
            assert_eq!(timeout[0].type_text.as_deref(), Some("int"));
        }

        #[test]
        fn members_carry_parent_type() {
            let table = collect(&module(&[("p/a.go", SRC)]), &IndexOptions::default()).unwrap();
            let start = &table.named("Start")[0];
            assert_eq!(start.kind, SymbolKind::Method);
            assert_eq!(start.parent_type.as_deref(), Some("Server"));
            assert_eq!(start.qualified_name, "example.com/m/p.Server.Start");
            assert_eq!(start.type_text.as_deref(), Some("(timeout int) error"));
            assert_eq!(table.members_of("Server").len(), 2);
            assert_eq!(table.with_declared_type("string")[0].name, "Addr");
        }

        #[test]
        fn lookups_by_origin_and_qualified_name() {
            let table = collect(&module(&[("p/a.go", SRC)]), &IndexOptions::default()).unwrap();
            let var = &table.qualified("example.com/m/p.DefaultTimeout")[0];
            assert_eq!(table.at_origin("p/a.go", var.name_span), Some(var.id));
            assert_eq!(var.range.start.line, 14);
        }
    }

    mod filter_tests {
        use super::*;

        #[test]
        fn test_files_are_skipped_by_default() {
            let test_src = "package p\n\nfunc TestStart(t *T) {}\n\nfunc Helper() {}\n";
            let m = module(&[("p/a.go", SRC), ("p/a_test.go", test_src)]);
            let table = collect(&m, &IndexOptions::default()).unwrap();
            assert!(table.named("Helper").is_empty());

            let options = IndexOptions {
                include_tests: true,
                ..Default::default()
            };
            let table = collect(&m, &options).unwrap();
            assert_eq!(table.named("Helper").len(), 1);
            assert_eq!(table.named("TestStart").len(), 1);
        }

        #[test]
        fn test_named_functions_outside_test_files_are_kept() {
            let src = "package p\n\nfunc TestFixture() int { return 1 }\n";
            let m = module(&[("p/fixture.go", src)]);
            let table = collect(&m, &IndexOptions::default()).unwrap();
            assert_eq!(table.named("TestFixture").len(), 1);
        }

        #[test]
        fn mismatched_span_is_an_invalid_model() {
            let mut m = module(&[("p/a.go", SRC)]);
            let file = m.file_mut("p/a.go").unwrap();
            file.variables.get_mut("DefaultTimeout").unwrap().name_span = Span::new(0, 3);
            let err = collect(&m, &IndexOptions::default()).unwrap_err();
            assert!(matches!(err, SymdexError::InvalidModel { .. }));
        }
    }
}
