//! Error types and error code constants for symdex.
//!
//! `SymdexError` is the single error type surfaced by the engine. Every
//! variant belongs to one [`ErrorKind`] of the taxonomy callers reason
//! about, and maps to a stable [`OutputErrorCode`] used as the CLI exit
//! status and in JSON error responses.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (validation failures, name conflicts)
//! - `3`: Resolution errors (symbol, package or file not found; ambiguity)
//! - `4`: Apply and I/O errors (stale edits, loader/saver failures)
//! - `10`: Internal errors (malformed model, bugs)

use serde::{Deserialize, Serialize};
use std::fmt;

use thiserror::Error;

use crate::patch::Conflict;

// ============================================================================
// Error Kinds
// ============================================================================

/// Coarse classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Symbol, package or file absent.
    NotFound,
    /// Name collision with an existing declaration.
    Conflict,
    /// Malformed input: bad identifier, bad options, malformed model.
    Validation,
    /// A name could not be disambiguated.
    Partial,
    /// Loader, saver or apply failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Partial => "partial",
            ErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output and process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed request).
    InvalidArguments = 2,
    /// Resolution errors (symbol not found, ambiguous, file not found).
    ResolutionError = 3,
    /// Apply errors (failed to write changes, stale edits).
    ApplyError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the engine and its front doors.
#[derive(Debug, Error)]
pub enum SymdexError {
    /// No symbol matched a lookup.
    #[error("symbol not found: {name}{}", scope.as_ref().map(|s| format!(" (in {})", s)).unwrap_or_default())]
    SymbolNotFound { name: String, scope: Option<String> },

    /// Package path is not part of the module.
    #[error("package not found: {path}")]
    PackageNotFound { path: String },

    /// File path is not part of the module.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// A declaration with the requested name already exists.
    #[error("name conflict: '{name}' already declared as {existing}")]
    NameConflict { name: String, existing: String },

    /// Invalid identifier (syntax error in new name).
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// Transformer or index options are malformed.
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },

    /// The module model violates a structural invariant.
    #[error("invalid model: {message}")]
    InvalidModel { message: String },

    /// A name resolved to more than one declaration.
    #[error("ambiguous name '{name}': {} candidates", candidates.len())]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    /// Source text could not be scanned into the model.
    #[error("parse error in {file} at line {line}: {message}")]
    Parse {
        file: String,
        line: u32,
        message: String,
    },

    /// Planned edits no longer apply.
    #[error("apply error: {conflict}")]
    Apply { conflict: Conflict },

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the engine.
pub type SymdexResult<T> = Result<T, SymdexError>;

impl SymdexError {
    /// Create a symbol-not-found error.
    pub fn symbol_not_found(name: impl Into<String>, scope: Option<String>) -> Self {
        SymdexError::SymbolNotFound {
            name: name.into(),
            scope,
        }
    }

    /// Create an invalid-options error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        SymdexError::InvalidOptions {
            message: message.into(),
        }
    }

    /// Create an invalid-model error.
    pub fn invalid_model(message: impl Into<String>) -> Self {
        SymdexError::InvalidModel {
            message: message.into(),
        }
    }

    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SymdexError::SymbolNotFound { .. }
            | SymdexError::PackageNotFound { .. }
            | SymdexError::FileNotFound { .. } => ErrorKind::NotFound,
            SymdexError::NameConflict { .. } => ErrorKind::Conflict,
            SymdexError::InvalidIdentifier { .. }
            | SymdexError::InvalidOptions { .. }
            | SymdexError::InvalidModel { .. } => ErrorKind::Validation,
            SymdexError::Ambiguous { .. } => ErrorKind::Partial,
            SymdexError::Parse { .. }
            | SymdexError::Apply { .. }
            | SymdexError::Io(_)
            | SymdexError::Json(_) => ErrorKind::Io,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&SymdexError> for OutputErrorCode {
    fn from(err: &SymdexError) -> Self {
        match err {
            SymdexError::InvalidModel { .. } => OutputErrorCode::InternalError,
            _ => match err.kind() {
                ErrorKind::Validation | ErrorKind::Conflict => OutputErrorCode::InvalidArguments,
                ErrorKind::NotFound | ErrorKind::Partial => OutputErrorCode::ResolutionError,
                ErrorKind::Io => OutputErrorCode::ApplyError,
            },
        }
    }
}

impl From<SymdexError> for OutputErrorCode {
    fn from(err: SymdexError) -> Self {
        OutputErrorCode::from(&err)
    }
}

impl From<Conflict> for SymdexError {
    fn from(conflict: Conflict) -> Self {
        SymdexError::Apply { conflict }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Span;

    mod error_kind_mapping {
        use super::*;

        #[test]
        fn not_found_variants() {
            assert_eq!(
                SymdexError::symbol_not_found("Foo", None).kind(),
                ErrorKind::NotFound
            );
            assert_eq!(
                SymdexError::PackageNotFound { path: "x".into() }.kind(),
                ErrorKind::NotFound
            );
        }

        #[test]
        fn identifier_is_validation_and_collision_is_conflict() {
            let invalid = SymdexError::InvalidIdentifier {
                name: "123-Invalid".into(),
                reason: "must start with a letter or underscore".into(),
            };
            assert_eq!(invalid.kind(), ErrorKind::Validation);
            let conflict = SymdexError::NameConflict {
                name: "Login".into(),
                existing: "function p.Login".into(),
            };
            assert_eq!(conflict.kind(), ErrorKind::Conflict);
        }

        #[test]
        fn apply_conflict_is_io() {
            let err = SymdexError::from(Conflict::FileMissing {
                file: "a.go".into(),
            });
            assert_eq!(err.kind(), ErrorKind::Io);
            assert_eq!(err.error_code().code(), 4);
        }
    }

    mod error_code_mapping {
        use super::*;

        #[test]
        fn code_values() {
            assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
            assert_eq!(OutputErrorCode::ResolutionError.code(), 3);
            assert_eq!(OutputErrorCode::ApplyError.code(), 4);
            assert_eq!(OutputErrorCode::InternalError.code(), 10);
        }

        #[test]
        fn kinds_map_to_codes() {
            assert_eq!(
                SymdexError::invalid_options("min_types must be >= 1")
                    .error_code()
                    .code(),
                2
            );
            assert_eq!(
                SymdexError::Ambiguous {
                    name: "Close".into(),
                    candidates: vec!["p.A.Close".into(), "p.B.Close".into()],
                }
                .error_code()
                .code(),
                3
            );
            assert_eq!(SymdexError::invalid_model("dup").error_code().code(), 10);
        }
    }

    mod error_display {
        use super::*;

        #[test]
        fn symbol_not_found_with_scope() {
            let err = SymdexError::symbol_not_found("Read", Some("p.A".into()));
            assert_eq!(err.to_string(), "symbol not found: Read (in p.A)");
            let err = SymdexError::symbol_not_found("Read", None);
            assert_eq!(err.to_string(), "symbol not found: Read");
        }

        #[test]
        fn apply_error_includes_conflict() {
            let err = SymdexError::from(Conflict::SpanOutOfBounds {
                file: "a.go".into(),
                span: Span::new(3, 9),
                file_len: 4,
            });
            assert_eq!(
                err.to_string(),
                "apply error: edit span [3, 9) out of bounds for a.go (4 bytes)"
            );
        }
    }
}
