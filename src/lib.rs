//! symdex: symbol index, reference resolver and refactoring engine for
//! Go-shaped modules.
//!
//! The engine lives in `symdex-core` and is re-exported here. This crate
//! adds the front door: loading modules, saving them, configuration, the
//! CLI command layer and post-save test runs.

// Engine - re-exported from symdex-core
pub use symdex_core::builder;
pub use symdex_core::diff;
pub use symdex_core::error;
pub use symdex_core::index;
pub use symdex_core::model;
pub use symdex_core::output;
pub use symdex_core::patch;
pub use symdex_core::scan;
pub use symdex_core::text;
pub use symdex_core::transform;
pub use symdex_core::validation;

// Front door
pub mod cli;
pub mod config;
pub mod loader;
pub mod saver;
pub mod testcmd;

// Converts front-door errors to SymdexError
mod error_bridges;
