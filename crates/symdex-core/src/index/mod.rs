//! The symbol index: declarations, references and the queries over them.
//!
//! An [`Index`] is built in two passes over a [`Module`]:
//!
//! 1. [`collector::collect`] emits one [`Symbol`] per retained declaration,
//! 2. [`resolver::resolve`] resolves every name use to a symbol.
//!
//! The result is immutable. Any mutation of the module bumps its revision,
//! after which [`Index::is_stale`] reports true and the index must be rebuilt.

pub mod collector;
mod decls;
pub mod resolver;
mod symbol;

pub use collector::SymbolTable;
pub use resolver::{ReferenceTable, Resolution};
pub use symbol::{
    DeclOrigin, Diagnostic, Reference, ReferenceId, ReferenceKind, Symbol, SymbolId, SymbolKind,
};

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{SymdexError, SymdexResult};
use crate::model::Module;
use crate::text::Position;

/// What a build retains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Index `_test` files and test functions.
    #[serde(default)]
    pub include_tests: bool,
    /// Index unexported declarations and parameters.
    #[serde(default)]
    pub include_private: bool,
}

/// Counts gathered while building an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub packages: usize,
    pub files: usize,
    pub symbols: usize,
    pub references: usize,
    pub diagnostics: usize,
    /// Name uses that matched nothing, predeclared names excluded.
    pub unresolved: usize,
    pub symbols_by_kind: BTreeMap<SymbolKind, usize>,
}

/// Symbols and references of one module revision.
#[derive(Debug, Clone)]
pub struct Index {
    revision: u64,
    options: IndexOptions,
    symbols: SymbolTable,
    references: ReferenceTable,
    diagnostics: Vec<Diagnostic>,
    stats: IndexStats,
}

/// Declaration kinds in the order position lookup tries them.
const POSITION_PRIORITY: &[&[SymbolKind]] = &[
    &[SymbolKind::Type, SymbolKind::Struct, SymbolKind::Interface],
    &[SymbolKind::Function, SymbolKind::Method],
    &[SymbolKind::Variable],
    &[SymbolKind::Constant],
    &[SymbolKind::Import],
];

impl Index {
    /// Build an index over `module`.
    ///
    /// Fails without a partial result when the module is malformed: duplicate
    /// file paths, or a declaration or use whose span does not address its
    /// name.
    pub fn build(module: &Module, options: &IndexOptions) -> SymdexResult<Self> {
        let mut seen = HashSet::new();
        for (_, file) in module.files() {
            if !seen.insert(file.path.as_str()) {
                return Err(SymdexError::invalid_model(format!(
                    "duplicate file path: {}",
                    file.path
                )));
            }
        }

        let symbols = collector::collect(module, options)?;
        let resolved = resolver::resolve(module, &symbols, options)?;

        let mut symbols_by_kind = BTreeMap::new();
        for symbol in symbols.iter() {
            *symbols_by_kind.entry(symbol.kind).or_insert(0) += 1;
        }
        let stats = IndexStats {
            packages: module.packages.len(),
            files: module.file_count(),
            symbols: symbols.len(),
            references: resolved.references.len(),
            diagnostics: resolved.diagnostics.len(),
            unresolved: resolved.unresolved,
            symbols_by_kind,
        };
        tracing::info!(
            module = %module.path,
            revision = module.revision,
            symbols = stats.symbols,
            references = stats.references,
            diagnostics = stats.diagnostics,
            "index built"
        );

        Ok(Index {
            revision: module.revision,
            options: *options,
            symbols,
            references: resolved.references,
            diagnostics: resolved.diagnostics,
            stats,
        })
    }

    // ========================================================================
    // Symbol queries
    // ========================================================================

    pub fn find_symbols_by_name(&self, name: &str) -> Vec<&Symbol> {
        self.symbols.named(name)
    }

    pub fn find_symbols_by_kind(&self, kind: SymbolKind) -> Vec<&Symbol> {
        self.symbols.of_kind(kind)
    }

    /// Symbols declared in `path`, ordered by position.
    pub fn find_symbols_in_file(&self, path: &str) -> Vec<&Symbol> {
        let mut symbols = self.symbols.in_file(path);
        symbols.sort_by_key(|s| (s.name_span.start, s.id));
        symbols
    }

    /// Fields and methods whose parent type is `type_name`.
    pub fn find_symbols_for_type(&self, type_name: &str) -> Vec<&Symbol> {
        self.symbols.members_of(type_name)
    }

    /// Fields, variables, constants and parameters declared with `type_text`.
    pub fn find_symbols_by_declared_type(&self, type_text: &str) -> Vec<&Symbol> {
        self.symbols.with_declared_type(type_text)
    }

    pub fn find_symbols_by_qualified_name(&self, qualified_name: &str) -> Vec<&Symbol> {
        self.symbols.qualified(qualified_name)
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    /// All symbols in ID order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// The declaration at a 1-indexed line and byte column of `file`.
    ///
    /// Kinds are tried in a fixed order (types, functions and methods,
    /// variables, constants, imports); the first whose range covers the
    /// line wins. Among several on that line, one covering the column is
    /// preferred.
    pub fn find_symbol_at_position(&self, file: &str, line: u32, column: u32) -> Option<&Symbol> {
        let in_file = self.find_symbols_in_file(file);
        let position = Position::new(line, column);
        POSITION_PRIORITY.iter().find_map(|kinds| {
            let on_line: Vec<&Symbol> = in_file
                .iter()
                .copied()
                .filter(|s| kinds.contains(&s.kind) && s.range.contains_line(line))
                .collect();
            on_line
                .iter()
                .copied()
                .find(|s| s.range.contains(position))
                .or_else(|| on_line.first().copied())
        })
    }

    /// Structs whose method names include every method of the interface
    /// `interface`. Only methods declared in each type's own package count;
    /// signatures are not compared. Empty when `interface` is not an
    /// interface.
    pub fn find_implementations(&self, interface: SymbolId) -> Vec<&Symbol> {
        let Some(iface) = self
            .symbols
            .get(interface)
            .filter(|s| s.kind == SymbolKind::Interface)
        else {
            return Vec::new();
        };
        let required = self.method_names(&iface.package, &iface.name);
        self.symbols
            .of_kind(SymbolKind::Struct)
            .into_iter()
            .filter(|candidate| {
                required.is_subset(&self.method_names(&candidate.package, &candidate.name))
            })
            .collect()
    }

    fn method_names(&self, package: &str, type_name: &str) -> BTreeSet<&str> {
        self.symbols
            .members_of(type_name)
            .into_iter()
            .filter(|s| s.kind == SymbolKind::Method && s.package == package)
            .map(|s| s.name.as_str())
            .collect()
    }

    // ========================================================================
    // Reference queries
    // ========================================================================

    /// References to `id`, in resolution order.
    pub fn find_references(&self, id: SymbolId) -> Vec<&Reference> {
        self.references.of_symbol(id)
    }

    pub fn find_references_in_file(&self, path: &str) -> Vec<&Reference> {
        self.references.in_file(path)
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter()
    }

    // ========================================================================
    // Build metadata
    // ========================================================================

    /// Selectors that matched several declarations.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Module revision this index was built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True once `module` has changed since this index was built.
    pub fn is_stale(&self, module: &Module) -> bool {
        module.revision != self.revision
    }
}

// ============================================================================
// Tests
// ============================================================================
