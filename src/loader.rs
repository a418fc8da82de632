//! Loading modules.
//!
//! Two loaders produce a [`Module`]:
//!
//! - [`JsonModuleLoader`] reads a serialized module snapshot, as written by
//!   [`FsSaver`](crate::saver::FsSaver).
//! - [`DirectoryLoader`] walks a source tree, scans every `.go` file whose
//!   build constraint is satisfied, and groups files into packages by
//!   directory. The module path comes from `go.mod` when present.
//!
//! Both apply [`LoadOptions`]: test files are dropped unless
//! `include_tests` is set and doc comments are stripped unless `load_docs`
//! is set.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use symdex_core::builder::ModuleBuilder;
use symdex_core::error::SymdexError;
use symdex_core::model::{is_module_relative, Module};

/// Source file extension picked up by [`DirectoryLoader`].
const SOURCE_EXTENSION: &str = "go";

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["vendor", "testdata", "node_modules"];

// ============================================================================
// Errors
// ============================================================================

/// Errors from loading a module.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The snapshot or source root does not exist.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Reading a file or directory failed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot is not a valid serialized module.
    #[error("invalid snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot violates a model invariant.
    #[error("invalid module: {message}")]
    Invalid { message: String },

    /// A source file could not be scanned.
    #[error(transparent)]
    Scan(#[from] SymdexError),
}

pub type LoadResult<T> = Result<T, LoadError>;

// ============================================================================
// Options
// ============================================================================

/// What a loader keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Keep `_test` files.
    pub include_tests: bool,
    /// Index unexported declarations; carried through to the index.
    pub include_private: bool,
    /// Keep doc comments.
    pub load_docs: bool,
    /// Build tags satisfied when evaluating `//go:build` lines.
    pub build_tags: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            include_tests: false,
            include_private: false,
            load_docs: true,
            build_tags: Vec::new(),
        }
    }
}

/// Produces a module.
pub trait ModuleLoader {
    fn load(&self, options: &LoadOptions) -> LoadResult<Module>;
}

// ============================================================================
// JSON snapshots
// ============================================================================

/// Loads a module from a JSON snapshot.
#[derive(Debug, Clone)]
pub struct JsonModuleLoader {
    path: PathBuf,
}

impl JsonModuleLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonModuleLoader { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModuleLoader for JsonModuleLoader {
    fn load(&self, options: &LoadOptions) -> LoadResult<Module> {
        let text = read(&self.path)?;
        let mut module: Module =
            serde_json::from_str(&text).map_err(|source| LoadError::Snapshot {
                path: self.path.clone(),
                source,
            })?;
        check_snapshot(&module)?;
        apply_options(&mut module, options);
        tracing::info!(
            snapshot = %self.path.display(),
            packages = module.packages.len(),
            files = module.file_count(),
            "loaded module snapshot"
        );
        Ok(module)
    }
}

/// Every file path must stay inside the module root and every file's
/// declarations must lie within its text.
fn check_snapshot(module: &Module) -> LoadResult<()> {
    for (package_path, package) in &module.packages {
        if *package_path != package.path {
            return Err(LoadError::Invalid {
                message: format!(
                    "package keyed '{}' declares path '{}'",
                    package_path, package.path
                ),
            });
        }
    }
    for (_, file) in module.files() {
        if !is_module_relative(&file.path) {
            return Err(LoadError::Invalid {
                message: format!(
                    "file path is not relative to the module root: {}",
                    file.path
                ),
            });
        }
        let len = file.content.len() as u64;
        let out_of_range = file
            .types
            .values()
            .map(|t| t.extent)
            .chain(file.functions.values().map(|f| f.extent))
            .chain(file.methods.iter().map(|m| m.extent))
            .chain(file.variables.values().map(|v| v.extent))
            .chain(file.constants.values().map(|c| c.extent))
            .any(|span| span.start > span.end || span.end > len);
        if out_of_range {
            return Err(LoadError::Invalid {
                message: format!("declaration outside the text of {}", file.path),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Source trees
// ============================================================================

/// Loads a module by scanning a source tree.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
    module_path: Option<String>,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryLoader {
            root: root.into(),
            module_path: None,
        }
    }

    /// Use `path` instead of the `go.mod` module path.
    pub fn with_module_path(mut self, path: impl Into<String>) -> Self {
        self.module_path = Some(path.into());
        self
    }

    fn module_path(&self) -> LoadResult<String> {
        if let Some(path) = &self.module_path {
            return Ok(path.clone());
        }
        let go_mod = self.root.join("go.mod");
        if go_mod.is_file() {
            let text = read(&go_mod)?;
            if let Some(path) = parse_module_directive(&text) {
                return Ok(path);
            }
        }
        Ok(self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string()))
    }
}

impl ModuleLoader for DirectoryLoader {
    fn load(&self, options: &LoadOptions) -> LoadResult<Module> {
        if !self.root.is_dir() {
            return Err(LoadError::NotFound {
                path: self.root.clone(),
            });
        }
        let mut builder = ModuleBuilder::new(self.module_path()?);
        let mut skipped = 0usize;

        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));
        for entry in walker {
            let entry = entry.map_err(|e| LoadError::Read {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone()),
                source: e.into(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION)
            {
                continue;
            }
            let relative = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            if !options.include_tests && relative.ends_with(symdex_core::model::TEST_FILE_SUFFIX) {
                continue;
            }
            let content = read(path)?;
            if !build_constraint_satisfied(&content, &options.build_tags) {
                tracing::debug!(file = %relative, "excluded by build constraint");
                skipped += 1;
                continue;
            }
            builder.add_file(relative, content);
        }

        let mut module = builder.build()?;
        apply_options(&mut module, options);
        tracing::info!(
            root = %self.root.display(),
            module = %module.path,
            packages = module.packages.len(),
            files = module.file_count(),
            skipped,
            "loaded source tree"
        );
        Ok(module)
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name.starts_with('_') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// The path of the `module` directive in a `go.mod` file.
pub fn parse_module_directive(go_mod: &str) -> Option<String> {
    go_mod.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.trim().trim_matches('"');
        (!path.is_empty()).then(|| path.to_string())
    })
}

/// Evaluate the `//go:build` line of `content` against `tags`.
///
/// Supports `!`, `&&`, `||` and parentheses. Files without a constraint are
/// always included.
pub fn build_constraint_satisfied(content: &str, tags: &[String]) -> bool {
    let Some(expr) = content
        .lines()
        .map(str::trim)
        .take_while(|l| l.is_empty() || l.starts_with("//"))
        .find_map(|l| l.strip_prefix("//go:build"))
    else {
        return true;
    };
    let tokens = constraint_tokens(expr);
    let mut parser = ConstraintParser {
        tokens: &tokens,
        pos: 0,
        tags,
    };
    // An unparseable constraint excludes nothing.
    parser.or().unwrap_or(true)
}

fn constraint_tokens(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        let op = match c {
            '(' | ')' | '!' => Some(c.to_string()),
            '&' | '|' if chars.peek() == Some(&c) => {
                chars.next();
                Some(format!("{}{}", c, c))
            }
            _ => None,
        };
        if op.is_some() || c.is_whitespace() {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
        } else {
            word.push(c);
        }
        tokens.extend(op);
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

struct ConstraintParser<'a> {
    tokens: &'a [String],
    pos: usize,
    tags: &'a [String],
}

impl ConstraintParser<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn or(&mut self) -> Option<bool> {
        let mut value = self.and()?;
        while self.peek() == Some("||") {
            self.pos += 1;
            value |= self.and()?;
        }
        Some(value)
    }

    fn and(&mut self) -> Option<bool> {
        let mut value = self.unary()?;
        while self.peek() == Some("&&") {
            self.pos += 1;
            value &= self.unary()?;
        }
        Some(value)
    }

    fn unary(&mut self) -> Option<bool> {
        let token = self.peek()?.to_string();
        self.pos += 1;
        match token.as_str() {
            "!" => self.unary().map(|v| !v),
            "(" => {
                let value = self.or()?;
                if self.peek() != Some(")") {
                    return None;
                }
                self.pos += 1;
                Some(value)
            }
            ")" | "&&" | "||" => None,
            tag => Some(self.tags.iter().any(|t| t == tag)),
        }
    }
}

// ============================================================================
// Shared
// ============================================================================

fn read(path: &Path) -> LoadResult<String> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Drop test files and doc comments per `options`.
fn apply_options(module: &mut Module, options: &LoadOptions) {
    for package in module.packages.values_mut() {
        if !options.include_tests {
            package.files.retain(|f| !f.is_test);
        }
        if options.load_docs {
            continue;
        }
        for file in &mut package.files {
            for decl in file.types.values_mut() {
                decl.doc = None;
                if let symdex_core::model::TypeKind::Struct { fields } = &mut decl.kind {
                    for field in fields {
                        field.doc = None;
                    }
                }
            }
            for func in file.functions.values_mut().chain(file.methods.iter_mut()) {
                func.doc = None;
            }
            for value in file
                .variables
                .values_mut()
                .chain(file.constants.values_mut())
                .chain(file.blanks.iter_mut())
            {
                value.doc = None;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    mod constraint_tests {
        use super::*;

        fn tags(list: &[&str]) -> Vec<String> {
            list.iter().map(|t| t.to_string()).collect()
        }

        #[test]
        fn files_without_constraint_are_included() {
            assert!(build_constraint_satisfied("package a\n", &[]));
        }

        #[test]
        fn constraints_evaluate_against_tags() {
            let src = "//go:build linux && !cgo\n\npackage a\n";
            assert!(build_constraint_satisfied(src, &tags(&["linux"])));
            assert!(!build_constraint_satisfied(src, &tags(&["linux", "cgo"])));
            assert!(!build_constraint_satisfied(src, &[]));

            let src = "// Copyright\n//go:build (darwin || linux) && integration\n\npackage a\n";
            assert!(build_constraint_satisfied(src, &tags(&["darwin", "integration"])));
            assert!(!build_constraint_satisfied(src, &tags(&["darwin"])));
        }

        #[test]
        fn constraints_after_package_clause_are_ignored() {
            let src = "package a\n\n//go:build ignore\n";
            assert!(build_constraint_satisfied(src, &[]));
        }

        #[test]
        fn module_directive() {
            assert_eq!(
                parse_module_directive("// c\nmodule example.com/app\n\ngo 1.22\n"),
                Some("example.com/app".to_string())
            );
            assert_eq!(parse_module_directive("modules x\n"), None);
        }
    }

    mod directory_tests {
        use super::*;

        #[test]
        fn loads_packages_from_tree() {
            let dir = TempDir::new().unwrap();
            write(dir.path(), "go.mod", "module example.com/app\n");
            write(dir.path(), "main.go", "package main\n\nfunc main() {}\n");
            write(dir.path(), "auth/auth.go", "// Package auth.\npackage auth\n\n// Login logs in.\nfunc Login() {}\n");
            write(dir.path(), "auth/auth_test.go", "package auth\n\nfunc TestLogin() {}\n");
            write(dir.path(), "auth/linux.go", "//go:build linux\n\npackage auth\n\nfunc Native() {}\n");
            write(dir.path(), "vendor/x/x.go", "package x\n");
            write(dir.path(), ".git/hooks/h.go", "package h\n");

            let module = DirectoryLoader::new(dir.path())
                .load(&LoadOptions::default())
                .unwrap();
            assert_eq!(module.path, "example.com/app");
            assert_eq!(module.packages.len(), 2);
            let auth = module.package("example.com/app/auth").unwrap();
            assert_eq!(auth.files.len(), 1);
            assert!(auth.files[0].functions["Login"].doc.is_some());

            let options = LoadOptions {
                include_tests: true,
                load_docs: false,
                build_tags: vec!["linux".to_string()],
                ..Default::default()
            };
            let module = DirectoryLoader::new(dir.path()).load(&options).unwrap();
            let auth = module.package("example.com/app/auth").unwrap();
            assert_eq!(auth.files.len(), 3);
            let file = auth.file("auth/auth.go").unwrap();
            assert!(file.functions["Login"].doc.is_none());
        }

        #[test]
        fn missing_root_is_not_found() {
            let dir = TempDir::new().unwrap();
            let err = DirectoryLoader::new(dir.path().join("nope"))
                .load(&LoadOptions::default())
                .unwrap_err();
            assert!(matches!(err, LoadError::NotFound { .. }));
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn snapshot_round_trip_applies_options() {
            let module = ModuleBuilder::new("example.com/app")
                .file("a/a.go", "package a\n\n// X is x.\nvar X = 1\n")
                .file("a/a_test.go", "package a\n\nvar Y = 2\n")
                .build()
                .unwrap();
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("module.json");
            fs::write(&path, serde_json::to_string(&module).unwrap()).unwrap();

            let loaded = JsonModuleLoader::new(&path)
                .load(&LoadOptions::default())
                .unwrap();
            assert_eq!(loaded.file_count(), 1);
            assert!(loaded.file("a/a.go").unwrap().variables["X"].doc.is_some());

            let options = LoadOptions {
                include_tests: true,
                load_docs: false,
                ..Default::default()
            };
            let loaded = JsonModuleLoader::new(&path).load(&options).unwrap();
            assert_eq!(loaded.file_count(), 2);
            assert!(loaded.file("a/a.go").unwrap().variables["X"].doc.is_none());
        }

        #[test]
        fn malformed_snapshots_are_rejected() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("module.json");
            fs::write(&path, "{ not json").unwrap();
            let err = JsonModuleLoader::new(&path)
                .load(&LoadOptions::default())
                .unwrap_err();
            assert!(matches!(err, LoadError::Snapshot { .. }));

            let err = JsonModuleLoader::new(dir.path().join("missing.json"))
                .load(&LoadOptions::default())
                .unwrap_err();
            assert!(matches!(err, LoadError::NotFound { .. }));
        }

        #[test]
        fn file_paths_leaving_the_root_are_rejected() {
            let mut module = ModuleBuilder::new("example.com/app")
                .file("a/a.go", "package a\n\nvar Limit = 1\n")
                .build()
                .unwrap();
            module.file_mut("a/a.go").unwrap().path = "../escape/e.go".to_string();
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("module.json");
            fs::write(&path, serde_json::to_string(&module).unwrap()).unwrap();

            let err = JsonModuleLoader::new(&path)
                .load(&LoadOptions::default())
                .unwrap_err();
            match err {
                LoadError::Invalid { message } => assert!(message.contains("../escape/e.go")),
                other => panic!("expected invalid snapshot, got {:?}", other),
            }
        }
    }
}
