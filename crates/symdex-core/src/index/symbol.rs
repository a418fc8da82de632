//! Symbols, references and their identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::patch::Span;
use crate::text::Range;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a symbol within one index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn new(id: u32) -> Self {
        SymbolId(id)
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym_{}", self.0)
    }
}

/// Unique identifier for a reference within one index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ReferenceId(pub u32);

impl ReferenceId {
    pub fn new(id: u32) -> Self {
        ReferenceId(id)
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref_{}", self.0)
    }
}

// ============================================================================
// Kinds
// ============================================================================

/// Kind of declared entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum SymbolKind {
    Package,
    /// Named type that is neither a struct nor an interface.
    Type,
    Struct,
    Interface,
    Function,
    Method,
    Field,
    #[default]
    Variable,
    Constant,
    Import,
    Parameter,
}

impl SymbolKind {
    /// Lower-case name used in output.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Package => "package",
            SymbolKind::Type => "type",
            SymbolKind::Struct => "struct",
            SymbolKind::Interface => "interface",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Field => "field",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Import => "import",
            SymbolKind::Parameter => "parameter",
        }
    }

    /// Type, struct or interface.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            SymbolKind::Type | SymbolKind::Struct | SymbolKind::Interface
        )
    }

    /// Method or field: a member of a parent type.
    pub fn is_member(&self) -> bool {
        matches!(self, SymbolKind::Method | SymbolKind::Field)
    }

    /// Symbols that can be renamed.
    pub fn is_renamable(&self) -> bool {
        !matches!(self, SymbolKind::Package | SymbolKind::Import)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a reference uses its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ReferenceKind {
    /// A plain read.
    #[default]
    Reference,
    /// Callee of a call expression.
    Call,
    /// Member name of a selector `x.Y`.
    Selector,
    /// Use in a type position.
    TypeAnnotation,
    /// Assignment target.
    Write,
    /// Package qualifier `pkg` in `pkg.Name`.
    Import,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Reference => "reference",
            ReferenceKind::Call => "call",
            ReferenceKind::Selector => "selector",
            ReferenceKind::TypeAnnotation => "type_annotation",
            ReferenceKind::Write => "write",
            ReferenceKind::Import => "import",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Symbol / Reference
// ============================================================================

/// Locates a declaration in the module: its file and the span of its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclOrigin {
    pub file: String,
    pub name_span: Span,
}

impl DeclOrigin {
    pub fn new(file: impl Into<String>, name_span: Span) -> Self {
        DeclOrigin {
            file: file.into(),
            name_span,
        }
    }
}

/// A declared entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// Package path, then the parent type or function when present, then the name.
    pub qualified_name: String,
    /// Import path of the owning package.
    pub package: String,
    pub file: String,
    /// Lines and columns of the whole declaration.
    pub range: Range,
    /// Byte span of the declared name.
    pub name_span: Span,
    /// Receiver or owning type of methods and fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<String>,
    /// Function or method owning a parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    pub exported: bool,
    /// Declared type, or the signature of functions and methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    pub origin: DeclOrigin,
}

impl Symbol {
    /// True when `span` in `file` falls on this symbol's declared name.
    pub fn declared_at(&self, file: &str, span: Span) -> bool {
        self.file == file && self.name_span.overlaps(&span)
    }
}

/// A resolved use of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: ReferenceId,
    /// Symbol the use resolves to.
    pub symbol: SymbolId,
    pub file: String,
    pub span: Span,
    pub range: Range,
    /// Nearest enclosing named function or method; empty at package level.
    pub context: String,
    pub kind: ReferenceKind,
}

/// A name use the resolver could not pin to a single symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub span: Span,
    pub line: u32,
    pub column: u32,
    pub name: String,
    pub candidates: Vec<SymbolId>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(SymbolId::new(3).to_string(), "sym_3");
        assert_eq!(ReferenceId::new(7).to_string(), "ref_7");
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&ReferenceKind::TypeAnnotation).unwrap();
        assert_eq!(json, "\"type_annotation\"");
        assert_eq!(SymbolKind::Interface.to_string(), "interface");
    }

    #[test]
    fn kind_classes() {
        assert!(SymbolKind::Struct.is_type());
        assert!(SymbolKind::Field.is_member());
        assert!(!SymbolKind::Import.is_renamable());
        assert!(SymbolKind::Parameter.is_renamable());
    }
}
