//! Rename a declaration and every resolved use of it.
//!
//! The rename runs as a single pass:
//!
//! 1. validate the new name,
//! 2. locate the target symbols by old name, optionally scoped by parent
//!    type and package,
//! 3. reject names that collide with a sibling declaration,
//! 4. plan one edit for each declaration and one per reference,
//! 5. apply the edits unless running dry.
//!
//! Uses the resolver could not pin to one declaration are not renamed; they
//! are reported as warnings.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{SymdexError, SymdexResult};
use crate::index::{Index, IndexOptions, Symbol, SymbolKind};
use crate::model::Module;
use crate::patch::Edit;
use crate::transform::apply::apply_edits;
use crate::transform::{Change, TransformResult, Transformer};
use crate::validation::validate_identifier;

/// What to rename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOptions {
    /// Current name.
    pub old: String,
    /// Replacement name.
    pub new: String,
    /// Restrict to members of this type, or parameters of this function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<String>,
    /// Restrict to this package, by import path or package name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Plan only; leave the module untouched.
    #[serde(default)]
    pub dry_run: bool,
}

/// Edits a rename would make.
#[derive(Debug, Clone)]
pub struct RenamePlan {
    /// Qualified names of the renamed declarations.
    pub targets: Vec<String>,
    pub edits: Vec<Edit>,
    pub changes: Vec<Change>,
    pub warnings: Vec<String>,
}

/// The rename transformer.
#[derive(Debug, Clone)]
pub struct Rename {
    options: RenameOptions,
}

impl Rename {
    pub fn new(options: RenameOptions) -> Self {
        Rename { options }
    }

    pub fn options(&self) -> &RenameOptions {
        &self.options
    }

    /// Validate and plan without touching `module`.
    pub fn plan(&self, module: &Module) -> SymdexResult<RenamePlan> {
        let RenameOptions { old, new, .. } = &self.options;
        validate_identifier(new)?;
        if old == new {
            return Err(SymdexError::InvalidIdentifier {
                name: new.clone(),
                reason: "new name equals the current name".to_string(),
            });
        }

        let index = Index::build(
            module,
            &IndexOptions {
                include_tests: true,
                include_private: true,
            },
        )?;
        let targets = self.locate(module, &index)?;
        for target in &targets {
            check_siblings(module, &index, target, new)?;
        }

        let mut spans = BTreeSet::new();
        for target in &targets {
            spans.insert((target.file.clone(), target.name_span));
            for reference in index.find_references(target.id) {
                spans.insert((reference.file.clone(), reference.span));
            }
        }

        let mut edits = Vec::with_capacity(spans.len());
        let mut changes = Vec::with_capacity(spans.len());
        for (path, span) in spans {
            let file = module
                .file(&path)
                .ok_or_else(|| SymdexError::FileNotFound { path: path.clone() })?;
            let edit = Edit::replace(path.as_str(), &file.content, span, new.as_str())
                .ok_or_else(|| {
                    SymdexError::invalid_model(format!("{}: span {} is not valid text", path, span))
                })?;
            changes.push(Change::from_edit(&edit, &file.content));
            edits.push(edit);
        }

        let warnings = index
            .diagnostics()
            .iter()
            .filter(|d| d.name == *old)
            .map(|d| {
                format!(
                    "{}:{}:{}: ambiguous use of `{}` left unchanged",
                    d.file, d.line, d.column, d.name
                )
            })
            .collect();

        Ok(RenamePlan {
            targets: targets.iter().map(|s| s.qualified_name.clone()).collect(),
            edits,
            changes,
            warnings,
        })
    }

    fn locate<'i>(&self, module: &Module, index: &'i Index) -> SymdexResult<Vec<&'i Symbol>> {
        let RenameOptions {
            old,
            parent_type,
            package,
            ..
        } = &self.options;
        let package_path = match package {
            Some(p) => Some(
                module
                    .find_package(p)
                    .map(|pkg| pkg.path.clone())
                    .ok_or_else(|| SymdexError::PackageNotFound { path: p.clone() })?,
            ),
            None => None,
        };
        let targets: Vec<&Symbol> = index
            .find_symbols_by_name(old)
            .into_iter()
            .filter(|s| s.kind.is_renamable())
            .filter(|s| match parent_type {
                Some(parent) => {
                    s.parent_type.as_deref() == Some(parent.as_str())
                        || s.container.as_deref() == Some(parent.as_str())
                }
                None => true,
            })
            .filter(|s| match &package_path {
                Some(path) => *path == s.package,
                None => true,
            })
            .collect();
        if targets.is_empty() {
            let scope = match (parent_type, package) {
                (Some(t), Some(p)) => Some(format!("{}.{}", p, t)),
                (Some(t), None) => Some(t.clone()),
                (None, Some(p)) => Some(p.clone()),
                (None, None) => None,
            };
            return Err(SymdexError::symbol_not_found(old.clone(), scope));
        }
        Ok(targets)
    }
}

/// Reject `new` when a sibling of `target` already uses it.
fn check_siblings(module: &Module, index: &Index, target: &Symbol, new: &str) -> SymdexResult<()> {
    let conflict = |existing: &Symbol| SymdexError::NameConflict {
        name: new.to_string(),
        existing: format!("{} {}", existing.kind, existing.qualified_name),
    };
    match target.kind {
        SymbolKind::Field | SymbolKind::Method => {
            let parent = target.parent_type.as_deref().unwrap_or_default();
            if let Some(existing) = index
                .find_symbols_for_type(parent)
                .into_iter()
                .find(|s| s.package == target.package && s.name == new)
            {
                return Err(conflict(existing));
            }
        }
        SymbolKind::Parameter => {
            if let Some(existing) = index.find_symbols_by_name(new).into_iter().find(|s| {
                s.kind == SymbolKind::Parameter
                    && s.package == target.package
                    && s.container == target.container
            }) {
                return Err(conflict(existing));
            }
        }
        _ => {
            let declared = module
                .package(&target.package)
                .is_some_and(|pkg| pkg.declares(new));
            if declared {
                let existing = index
                    .find_symbols_by_name(new)
                    .into_iter()
                    .find(|s| s.package == target.package && !s.kind.is_member());
                return Err(match existing {
                    Some(existing) => conflict(existing),
                    None => SymdexError::NameConflict {
                        name: new.to_string(),
                        existing: format!("declaration in {}", target.package),
                    },
                });
            }
        }
    }
    Ok(())
}

impl Transformer for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn transform(&self, module: &mut Module) -> TransformResult {
        let plan = match self.plan(module) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::debug!(
                    old = %self.options.old,
                    new = %self.options.new,
                    error = %err,
                    "rename rejected"
                );
                return TransformResult::failed(&err);
            }
        };
        let RenameOptions {
            old, new, dry_run, ..
        } = &self.options;

        if !dry_run {
            if let Err(err) = apply_edits(module, &plan.edits) {
                tracing::warn!(error = %err, "rename edits failed to apply");
                return TransformResult::failed(&err);
            }
        }
        let verb = if *dry_run { "Would rename" } else { "Renamed" };
        let summary = format!(
            "{} `{}` to `{}`: {} change(s) across {} declaration(s)",
            verb,
            old,
            new,
            plan.changes.len(),
            plan.targets.len()
        );
        tracing::info!(old = %old, new = %new, changes = plan.changes.len(), dry_run, "rename");
        TransformResult::succeeded(summary, plan.changes, plan.warnings)
    }
}

// ============================================================================
// Tests
// ============================================================================
