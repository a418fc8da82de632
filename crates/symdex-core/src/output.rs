//! JSON output types and serialization for CLI responses.
//!
//! Every response carries `status` first and the `schema_version`, so
//! consumers can detect format changes. Lists are emitted in a stable
//! order: symbols by file then position, references by file then position,
//! changes by file then line.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SymdexError};
use crate::index::{IndexStats, Reference, Symbol};
use crate::transform::TransformResult;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Shared Types
// ============================================================================

/// A place in a file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// File path (module-relative).
    pub file: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, UTF-8 bytes).
    pub col: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_end: Option<u64>,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Location {
            file: file.into(),
            line,
            col,
            byte_start: None,
            byte_end: None,
        }
    }
}

/// Symbol information for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Index-local identifier ("sym_N").
    pub id: String,
    pub name: String,
    pub kind: String,
    pub qualified_name: String,
    pub package: String,
    /// Start of the declaration, with the byte span of its name.
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    pub exported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_text: Option<String>,
}

impl From<&Symbol> for SymbolInfo {
    fn from(symbol: &Symbol) -> Self {
        SymbolInfo {
            id: symbol.id.to_string(),
            name: symbol.name.clone(),
            kind: symbol.kind.to_string(),
            qualified_name: symbol.qualified_name.clone(),
            package: symbol.package.clone(),
            location: Location {
                file: symbol.file.clone(),
                line: symbol.range.start.line,
                col: symbol.range.start.column,
                byte_start: Some(symbol.name_span.start),
                byte_end: Some(symbol.name_span.end),
            },
            parent_type: symbol.parent_type.clone(),
            container: symbol.container.clone(),
            exported: symbol.exported,
            type_text: symbol.type_text.clone(),
        }
    }
}

/// Reference information for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    /// Index-local identifier ("ref_N").
    pub id: String,
    /// Referenced symbol id ("sym_N").
    pub symbol: String,
    pub location: Location,
    /// call, selector, reference, type_annotation, write or import.
    pub kind: String,
    /// Enclosing function or method; empty at package level.
    pub context: String,
}

impl From<&Reference> for ReferenceInfo {
    fn from(reference: &Reference) -> Self {
        ReferenceInfo {
            id: reference.id.to_string(),
            symbol: reference.symbol.to_string(),
            location: Location {
                file: reference.file.clone(),
                line: reference.range.start.line,
                col: reference.range.start.column,
                byte_start: Some(reference.span.start),
                byte_end: Some(reference.span.end),
            },
            kind: reference.kind.to_string(),
            context: reference.context.clone(),
        }
    }
}

/// Error information for error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code, also the process exit status.
    pub code: u8,
    pub kind: ErrorKind,
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &SymdexError) -> Self {
        let details = match err {
            SymdexError::SymbolNotFound { name, scope } => {
                Some(serde_json::json!({ "name": name, "scope": scope }))
            }
            SymdexError::PackageNotFound { path } | SymdexError::FileNotFound { path } => {
                Some(serde_json::json!({ "path": path }))
            }
            SymdexError::NameConflict { name, existing } => {
                Some(serde_json::json!({ "name": name, "existing": existing }))
            }
            SymdexError::Ambiguous { name, candidates } => {
                Some(serde_json::json!({ "name": name, "candidates": candidates }))
            }
            SymdexError::Parse { file, line, .. } => {
                Some(serde_json::json!({ "file": file, "line": line }))
            }
            _ => None,
        };
        ErrorInfo {
            code: err.error_code().code(),
            kind: err.kind(),
            message: err.to_string(),
            details,
        }
    }
}

// ============================================================================
// Response Structs
// ============================================================================

/// Response for symbol queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolsResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    pub count: usize,
    /// Ordered by file, then position.
    pub symbols: Vec<SymbolInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
}

impl SymbolsResponse {
    pub fn new(mut symbols: Vec<SymbolInfo>) -> Self {
        symbols.sort_by(|a, b| {
            (&a.location.file, a.location.byte_start, &a.id)
                .cmp(&(&b.location.file, b.location.byte_start, &b.id))
        });
        SymbolsResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            count: symbols.len(),
            symbols,
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: IndexStats) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Response for reference queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencesResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    /// The target symbols.
    pub symbols: Vec<SymbolInfo>,
    pub count: usize,
    /// Ordered by file, then position.
    pub references: Vec<ReferenceInfo>,
}

impl ReferencesResponse {
    pub fn new(symbols: Vec<SymbolInfo>, mut references: Vec<ReferenceInfo>) -> Self {
        references.sort_by(|a, b| a.location.cmp(&b.location));
        ReferencesResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            symbols,
            count: references.len(),
            references,
        }
    }
}

/// Response for a transformation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformResponse {
    /// Status: "ok" or "error".
    pub status: String,
    pub schema_version: String,
    /// Transformer name.
    pub transform: String,
    pub dry_run: bool,
    pub result: TransformResult,
    /// Files written to disk, when the run saved its changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_written: Option<Vec<String>>,
}

impl TransformResponse {
    pub fn new(transform: impl Into<String>, dry_run: bool, result: TransformResult) -> Self {
        TransformResponse {
            status: if result.success { "ok" } else { "error" }.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            transform: transform.into(),
            dry_run,
            result,
            files_written: None,
        }
    }

    pub fn with_files_written(mut self, files: Vec<String>) -> Self {
        self.files_written = Some(files);
        self
    }
}

/// Response for any failed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn new(error: ErrorInfo) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error,
        }
    }
}

impl From<&SymdexError> for ErrorResponse {
    fn from(err: &SymdexError) -> Self {
        ErrorResponse::new(ErrorInfo::from_error(err))
    }
}

// ============================================================================
// Emitters
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Render the changes of `result` as a numbered preview.
///
/// One block per change, in file then line order:
///
/// ```text
/// 1. In auth/auth.go (line 3): - Before: DefaultTimeout / - After: GlobalTimeout
/// ```
pub fn format_preview(result: &TransformResult) -> String {
    let mut out = String::new();
    for (i, change) in result.changes.iter().enumerate() {
        out.push_str(&format!(
            "{}. In {} (line {}): - Before: {} / - After: {}\n",
            i + 1,
            change.file,
            change.line,
            change.original.trim_end(),
            change.new.trim_end()
        ));
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Change;

    fn change(file: &str, line: u32, original: &str, new: &str) -> Change {
        Change {
            file: file.to_string(),
            line,
            column: 5,
            original: original.to_string(),
            new: new.to_string(),
        }
    }

    mod preview_tests {
        use super::*;

        #[test]
        fn preview_lists_changes_in_order() {
            let result = TransformResult::succeeded(
                "Would rename",
                vec![
                    change("auth/auth.go", 6, "DefaultTimeout", "GlobalTimeout"),
                    change("auth/auth.go", 3, "DefaultTimeout", "GlobalTimeout"),
                ],
                Vec::new(),
            );
            assert_eq!(
                format_preview(&result),
                "1. In auth/auth.go (line 3): - Before: DefaultTimeout / - After: GlobalTimeout\n\
                 2. In auth/auth.go (line 6): - Before: DefaultTimeout / - After: GlobalTimeout\n"
            );
        }

        #[test]
        fn empty_result_has_empty_preview() {
            let result = TransformResult::succeeded("nothing", Vec::new(), Vec::new());
            assert!(format_preview(&result).is_empty());
        }
    }

    mod response_tests {
        use super::*;

        #[test]
        fn error_response_carries_code_and_details() {
            let err = SymdexError::symbol_not_found("Missing", Some("auth".to_string()));
            let response = ErrorResponse::from(&err);
            let json = serde_json::to_value(&response).unwrap();
            assert_eq!(json["status"], "error");
            assert_eq!(json["schema_version"], SCHEMA_VERSION);
            assert_eq!(json["error"]["code"], 3);
            assert_eq!(json["error"]["kind"], "not_found");
            assert_eq!(json["error"]["details"]["scope"], "auth");
        }

        #[test]
        fn status_is_first_field() {
            let response = SymbolsResponse::new(Vec::new());
            let mut out = Vec::new();
            emit_response(&response, &mut out).unwrap();
            let text = String::from_utf8(out).unwrap();
            assert!(text.starts_with("{\n  \"status\": \"ok\""));
        }

        #[test]
        fn failed_transform_reports_error_status() {
            let err = SymdexError::invalid_options("min_types must be at least 1");
            let response = TransformResponse::new("extract_interfaces", false, TransformResult::failed(&err));
            assert_eq!(response.status, "error");
            let json = serde_json::to_value(&response).unwrap();
            assert_eq!(json["result"]["error"]["code"], 2);
            assert!(json.get("files_written").is_none());
        }

        #[test]
        fn emit_response_is_deterministic() {
            let references = vec![
                ReferenceInfo {
                    id: "ref_2".to_string(),
                    symbol: "sym_1".to_string(),
                    location: Location::new("b.go", 10, 5),
                    kind: "call".to_string(),
                    context: "Run".to_string(),
                },
                ReferenceInfo {
                    id: "ref_1".to_string(),
                    symbol: "sym_1".to_string(),
                    location: Location::new("a.go", 5, 1),
                    kind: "reference".to_string(),
                    context: String::new(),
                },
            ];
            let response = ReferencesResponse::new(Vec::new(), references);
            assert_eq!(response.references[0].location.file, "a.go");

            let mut first = Vec::new();
            let mut second = Vec::new();
            emit_response(&response, &mut first).unwrap();
            emit_response(&response, &mut second).unwrap();
            assert_eq!(first, second);
        }
    }
}
