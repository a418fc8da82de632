//! Compile-only test of the public API surface.
//!
//! If this file fails to compile, the public API has regressed.
//!
//! Run with: cargo test -- api_surface

// The imports are the test.
#![allow(unused_imports)]

// ============================================================================
// Engine
// ============================================================================

use symdex::builder::ModuleBuilder;

use symdex::diff::generate_unified_diff;

use symdex::error::{ErrorKind, OutputErrorCode, SymdexError, SymdexResult};

use symdex::index::{
    DeclOrigin, Diagnostic, Index, IndexOptions, IndexStats, Reference, ReferenceId,
    ReferenceKind, ReferenceTable, Resolution, Symbol, SymbolId, SymbolKind, SymbolTable,
};

use symdex::model::{
    normalize_text, Binding, FieldDecl, FuncDecl, ImportDecl, InterfaceMethod, Module, Node,
    Package, ParamDecl, Shift, SourceFile, SpanVisitor, TypeDecl, TypeForm, TypeKind, UnaryOp,
    ValueDecl, WalkSpans, TEST_FILE_SUFFIX,
};

use symdex::output::{
    emit_response, format_preview, ErrorInfo, ErrorResponse, Location, ReferenceInfo,
    ReferencesResponse, SymbolInfo, SymbolsResponse, TransformResponse, SCHEMA_VERSION,
};

use symdex::patch::{detect_overlaps, Conflict, ContentHash, Edit, Span};

use symdex::scan::parse_file;

use symdex::text::{LineIndex, Position, Range};

use symdex::transform::{
    apply_edits, Change, DefaultNaming, ExtractInterfaces, ExtractionOptions, ExtractionPlan,
    MethodPattern, NamingStrategy, Placement, PlannedInterface, Rename, RenameOptions,
    TransformError, TransformResult, Transformation, Transformer,
};

use symdex::validation::{
    is_exported, is_keyword, is_predeclared, validate_identifier, ValidationError,
    ValidationResult, KEYWORDS, PREDECLARED,
};

// ============================================================================
// Front door
// ============================================================================

use symdex::cli::{
    format_references, format_symbols, parse_kind, parse_location, run_at, run_extract,
    run_implementations, run_plan, run_references, run_rename, run_symbols, SymbolQuery,
};

use symdex::config::{
    CliOverrides, ConfigError, ConfigSource, ConfigValue, ProjectConfig, ResolvedConfig,
    ENV_INCLUDE_PRIVATE, ENV_INCLUDE_TESTS, ENV_MIN_METHODS, ENV_MIN_TYPES, PROJECT_CONFIG_FILE,
};

use symdex::loader::{
    build_constraint_satisfied, parse_module_directive, DirectoryLoader, JsonModuleLoader,
    LoadError, LoadOptions, LoadResult, ModuleLoader,
};

use symdex::saver::{FsSaver, Manifest, ManifestEntry, ModuleSaver, SaveReport};

use symdex::testcmd::{
    expand_template_vars, parse_test_command, resolve_test_command, run_test_command, TestCommand,
    TestCommandError, TestCommandResult, TestCommandSource, TestRun,
};

#[test]
fn api_surface_compiles() {
    // Compiling this file is the test.
}
