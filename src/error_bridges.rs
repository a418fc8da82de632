//! Conversions from front-door errors into [`SymdexError`].
//!
//! Loader, config and test-command errors are defined in this crate, so
//! their bridges into the engine's error type live here too.

use symdex_core::error::SymdexError;

use crate::config::ConfigError;
use crate::loader::LoadError;
use crate::testcmd::TestCommandError;

// ============================================================================
// Bridge: LoadError -> SymdexError
// ============================================================================

impl From<LoadError> for SymdexError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::NotFound { path } => SymdexError::FileNotFound {
                path: path.display().to_string(),
            },
            LoadError::Read { source, .. } => SymdexError::Io(source),
            LoadError::Snapshot { source, .. } => SymdexError::Json(source),
            LoadError::Invalid { message } => SymdexError::InvalidModel { message },
            LoadError::Scan(err) => err,
        }
    }
}

// ============================================================================
// Bridge: ConfigError -> SymdexError
// ============================================================================

impl From<ConfigError> for SymdexError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Read { source, .. } => SymdexError::Io(source),
            other => SymdexError::InvalidOptions {
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Bridge: TestCommandError -> SymdexError
// ============================================================================

impl From<TestCommandError> for SymdexError {
    fn from(err: TestCommandError) -> Self {
        match err {
            TestCommandError::Io(source) => SymdexError::Io(source),
            other => SymdexError::InvalidOptions {
                message: other.to_string(),
            },
        }
    }
}
