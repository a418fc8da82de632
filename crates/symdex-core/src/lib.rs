//! Core engine for symdex.
//!
//! This crate provides:
//! - The module model (packages, files, declarations, name-use syntax)
//! - A source scanner building that model from text
//! - The symbol index: collector, reference resolver and queries
//! - Transformations over the model (rename, interface extraction, chains)
//! - Patch primitives, error types and exit codes
//! - JSON output types, previews and unified diffs

pub mod builder;
pub mod diff;
pub mod error;
pub mod index;
pub mod model;
pub mod output;
pub mod patch;
pub mod scan;
pub mod text;
pub mod transform;
pub mod validation;

pub use builder::ModuleBuilder;
pub use error::{ErrorKind, SymdexError, SymdexResult};
pub use index::{Index, IndexOptions};
pub use model::Module;
pub use transform::{TransformResult, Transformation, Transformer};
