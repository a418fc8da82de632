//! Identifier validation for rename targets and generated names.

use thiserror::Error;

use crate::error::SymdexError;

/// Error for validation failures.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Invalid identifier name.
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Keywords that cannot be used as identifiers.
pub const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// Predeclared identifiers of the universe scope.
pub const PREDECLARED: &[&str] = &[
    "any", "append", "bool", "byte", "cap", "clear", "close", "comparable", "complex",
    "complex128", "complex64", "copy", "delete", "error", "false", "float32", "float64", "imag",
    "int", "int16", "int32", "int64", "int8", "iota", "len", "make", "max", "min", "new", "nil",
    "panic", "print", "println", "real", "recover", "rune", "string", "true", "uint", "uint16",
    "uint32", "uint64", "uint8", "uintptr",
];

/// Check if a name is a keyword.
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Check if a name is predeclared in the universe scope.
pub fn is_predeclared(name: &str) -> bool {
    PREDECLARED.contains(&name)
}

/// Exported names start with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Validate that a string is a legal identifier.
///
/// Checks:
/// - Non-empty
/// - Starts with letter or underscore
/// - Contains only letters, digits and underscore
/// - Not a keyword
/// - Not the blank identifier
pub fn validate_identifier(name: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(invalid("name cannot be empty"));
    };
    if !first.is_alphabetic() && first != '_' {
        return Err(invalid("must start with letter or underscore"));
    }
    if let Some(ch) = chars.find(|ch| !ch.is_alphanumeric() && *ch != '_') {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: format!("invalid character: '{}'", ch),
        });
    }
    if name == "_" {
        return Err(invalid("the blank identifier cannot be declared by name"));
    }
    if is_keyword(name) {
        return Err(invalid("cannot use keyword as identifier"));
    }
    Ok(())
}

impl From<ValidationError> for SymdexError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidName { name, reason } => {
                SymdexError::InvalidIdentifier { name, reason }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
