//! Transformations over a module: rename, interface extraction and chains.
//!
//! Every transformer plans a list of [`Edit`]s against the current module,
//! derives the [`Change`] preview from them, and unless running dry commits
//! the same edits through [`apply::apply_edits`]. A successful apply bumps
//! the module revision, so any [`Index`](crate::index::Index) built before
//! it is stale.

pub mod apply;
pub mod extract;
pub mod rename;

pub use apply::apply_edits;
pub use extract::{
    DefaultNaming, ExtractInterfaces, ExtractionOptions, ExtractionPlan, MethodPattern,
    NamingStrategy, Placement, PlannedInterface,
};
pub use rename::{Rename, RenameOptions};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SymdexError};
use crate::model::Module;
use crate::patch::Edit;
use crate::text::LineIndex;

// ============================================================================
// Results
// ============================================================================

/// One textual change of a transformation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Change {
    pub file: String,
    /// 1-indexed line of the change start.
    pub line: u32,
    /// 1-indexed byte column of the change start.
    pub column: u32,
    /// Text replaced; empty for insertions.
    pub original: String,
    /// Text written.
    pub new: String,
}

impl Change {
    /// Describe `edit` against `content`, the text it was planned on.
    pub fn from_edit(edit: &Edit, content: &str) -> Self {
        let position = LineIndex::new(content).position(edit.span.start);
        Change {
            file: edit.file.clone(),
            line: position.line,
            column: position.column,
            original: edit.original.clone(),
            new: edit.replacement.clone(),
        }
    }
}

/// Error detail of a failed transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformError {
    pub kind: ErrorKind,
    /// Exit code the error maps to.
    pub code: u8,
    pub message: String,
}

impl From<&SymdexError> for TransformError {
    fn from(err: &SymdexError) -> Self {
        TransformError {
            kind: err.kind(),
            code: err.error_code().code(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a transformation, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformResult {
    pub success: bool,
    pub summary: String,
    /// Changes in file, line, column order.
    pub changes: Vec<Change>,
    /// Files touched by `changes`, sorted and deduplicated.
    pub affected_files: Vec<String>,
    pub files_affected: usize,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TransformError>,
}

impl TransformResult {
    pub fn succeeded(summary: impl Into<String>, changes: Vec<Change>, warnings: Vec<String>) -> Self {
        let mut result = TransformResult {
            success: true,
            summary: summary.into(),
            changes,
            affected_files: Vec::new(),
            files_affected: 0,
            warnings,
            error: None,
        };
        result.settle();
        result
    }

    /// A failed result carrying `err`. No changes were made.
    pub fn failed(err: &SymdexError) -> Self {
        TransformResult {
            success: false,
            summary: err.to_string(),
            changes: Vec::new(),
            affected_files: Vec::new(),
            files_affected: 0,
            warnings: Vec::new(),
            error: Some(TransformError::from(err)),
        }
    }

    /// Sort changes and recompute the affected file list.
    fn settle(&mut self) {
        self.changes.sort();
        let files: BTreeSet<&str> = self.changes.iter().map(|c| c.file.as_str()).collect();
        self.affected_files = files.into_iter().map(str::to_string).collect();
        self.files_affected = self.affected_files.len();
    }

    /// Fold `other` into this result.
    fn absorb(&mut self, other: TransformResult) {
        self.changes.extend(other.changes);
        self.warnings.extend(other.warnings);
        if !other.success {
            self.success = false;
            self.summary = other.summary;
            self.error = other.error;
        }
        self.settle();
    }
}

// ============================================================================
// Transformers
// ============================================================================

/// A transformation over a module.
///
/// `transform` never panics on bad input: validation errors and apply
/// failures are reported through [`TransformResult::error`]. Failures in
/// the validation phase leave the module untouched.
pub trait Transformer {
    fn name(&self) -> &str;

    fn transform(&self, module: &mut Module) -> TransformResult;
}

/// Every transformation symdex knows, as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transform", rename_all = "snake_case")]
pub enum Transformation {
    Rename(RenameOptions),
    ExtractInterfaces(ExtractionOptions),
    /// Steps run in order; the first failure stops the chain.
    Chain { steps: Vec<Transformation> },
}

impl Transformer for Transformation {
    fn name(&self) -> &str {
        match self {
            Transformation::Rename(_) => "rename",
            Transformation::ExtractInterfaces(_) => "extract_interfaces",
            Transformation::Chain { .. } => "chain",
        }
    }

    fn transform(&self, module: &mut Module) -> TransformResult {
        match self {
            Transformation::Rename(options) => Rename::new(options.clone()).transform(module),
            Transformation::ExtractInterfaces(options) => {
                ExtractInterfaces::new(options.clone()).transform(module)
            }
            Transformation::Chain { steps } => run_chain(steps, module),
        }
    }
}

/// Run `steps` in order, aggregating their changes. Stops at the first
/// failed step; steps already applied stay applied.
pub fn run_chain<T: Transformer>(steps: &[T], module: &mut Module) -> TransformResult {
    let mut result = TransformResult::succeeded(String::new(), Vec::new(), Vec::new());
    let mut completed = 0;
    for step in steps {
        let outcome = step.transform(module);
        let failed = !outcome.success;
        result.absorb(outcome);
        if failed {
            tracing::warn!(
                step = step.name(),
                completed,
                "chain stopped at failed step"
            );
            return result;
        }
        completed += 1;
    }
    result.summary = format!(
        "{} step(s) completed: {} change(s) in {} file(s)",
        completed,
        result.changes.len(),
        result.files_affected
    );
    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Package;
    use crate::scan::parse_file;

    const AUTH: &str = "package auth\n\nvar DefaultTimeout = 5\n\nfunc Login() int {\n\treturn DefaultTimeout\n}\n";

    fn module() -> Module {
        Module::new("example.com/m").with_package(
            Package::new("example.com/m/auth", "auth")
                .with_file(parse_file("auth/auth.go", AUTH).unwrap()),
        )
    }

    fn rename(old: &str, new: &str) -> Transformation {
        Transformation::Rename(RenameOptions {
            old: old.to_string(),
            new: new.to_string(),
            ..Default::default()
        })
    }

    mod result_tests {
        use super::*;

        #[test]
        fn changes_are_sorted_and_files_deduplicated() {
            let change = |file: &str, line| Change {
                file: file.to_string(),
                line,
                column: 1,
                original: "a".to_string(),
                new: "b".to_string(),
            };
            let result = TransformResult::succeeded(
                "ok",
                vec![change("b.go", 3), change("a.go", 9), change("b.go", 1)],
                Vec::new(),
            );
            assert_eq!(result.affected_files, vec!["a.go", "b.go"]);
            assert_eq!(result.files_affected, 2);
            assert_eq!(result.changes[1].line, 1);
        }

        #[test]
        fn failures_carry_kind_and_code() {
            let err = SymdexError::symbol_not_found("X", None);
            let result = TransformResult::failed(&err);
            assert!(!result.success);
            let error = result.error.unwrap();
            assert_eq!(error.kind, ErrorKind::NotFound);
            assert_eq!(error.code, 3);
        }
    }

    mod chain_tests {
        use super::*;

        #[test]
        fn chain_applies_steps_in_order() {
            let mut m = module();
            let chain = Transformation::Chain {
                steps: vec![
                    rename("DefaultTimeout", "Timeout"),
                    rename("Timeout", "GlobalTimeout"),
                ],
            };
            let result = chain.transform(&mut m);
            assert!(result.success, "{}", result.summary);
            assert_eq!(result.changes.len(), 4);
            assert_eq!(result.affected_files, vec!["auth/auth.go"]);
            let file = m.file("auth/auth.go").unwrap();
            assert!(file.variables.contains_key("GlobalTimeout"));
            assert!(file.content.contains("return GlobalTimeout"));
        }

        #[test]
        fn chain_stops_at_first_failure() {
            let mut m = module();
            let chain = Transformation::Chain {
                steps: vec![
                    rename("DefaultTimeout", "Timeout"),
                    rename("Missing", "Other"),
                    rename("Timeout", "Never"),
                ],
            };
            let result = chain.transform(&mut m);
            assert!(!result.success);
            assert_eq!(result.changes.len(), 2);
            assert_eq!(result.error.unwrap().kind, ErrorKind::NotFound);
            assert!(m.file("auth/auth.go").unwrap().variables.contains_key("Timeout"));
        }

        #[test]
        fn transformations_serialize_with_tag() {
            let json = serde_json::to_string(&rename("A", "B")).unwrap();
            assert!(json.contains("\"transform\":\"rename\""));
            let back: Transformation = serde_json::from_str(&json).unwrap();
            assert_eq!(back.name(), "rename");
        }
    }
}
