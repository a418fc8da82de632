//! Building a [`Module`] from source text.
//!
//! Files are scanned with [`parse_file`](crate::scan::parse_file) and grouped
//! into packages by directory: `auth/login.go` in module `example.com/app`
//! joins package `example.com/app/auth`, files at the root join the module
//! path itself.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{SymdexError, SymdexResult};
use crate::model::{is_module_relative, Module, Package, SourceFile};
use crate::scan::parse_file;

/// Collects source files and assembles them into a module.
#[derive(Debug, Clone, Default)]
pub struct ModuleBuilder {
    module_path: String,
    files: Vec<(String, String)>,
}

impl ModuleBuilder {
    pub fn new(module_path: impl Into<String>) -> Self {
        ModuleBuilder {
            module_path: module_path.into(),
            files: Vec::new(),
        }
    }

    /// Add a file at a module-relative `path`.
    pub fn file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.add_file(path, content);
        self
    }

    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.push((path.into(), content.into()));
    }

    /// Scan every file and group the results into packages.
    ///
    /// Fails on the first file that does not scan, on paths that are not
    /// module-relative or repeat, and when two non-test files of one
    /// directory name different packages.
    pub fn build(self) -> SymdexResult<Module> {
        let mut by_dir: BTreeMap<String, Vec<SourceFile>> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for (path, content) in &self.files {
            if !is_module_relative(path) {
                return Err(SymdexError::invalid_model(format!(
                    "file path is not relative to the module root: {}",
                    path
                )));
            }
            if !seen.insert(path.as_str()) {
                return Err(SymdexError::invalid_model(format!(
                    "duplicate file path: {}",
                    path
                )));
            }
            let file = parse_file(path, content)?;
            let dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
            by_dir.entry(dir.to_string()).or_default().push(file);
        }

        let mut module = Module::new(self.module_path.clone());
        for (dir, files) in by_dir {
            let name = package_name(&dir, &files)?;
            let path = if dir.is_empty() {
                self.module_path.clone()
            } else {
                format!("{}/{}", self.module_path, dir)
            };
            let mut package = Package::new(path, name);
            package.files = files;
            module.add_package(package);
        }
        tracing::debug!(
            module = %module.path,
            packages = module.packages.len(),
            files = module.file_count(),
            "built module from source"
        );
        Ok(module)
    }
}

/// Name shared by the non-test files of `dir`; test files only count when
/// the directory holds nothing else.
fn package_name(dir: &str, files: &[SourceFile]) -> SymdexResult<String> {
    let mut names = files.iter().filter(|f| !f.is_test).map(|f| &f.package_name);
    let Some(first) = names
        .next()
        .or_else(|| files.first().map(|f| &f.package_name))
    else {
        return Err(SymdexError::invalid_model(format!("no files in {}", dir)));
    };
    if let Some(other) = names.find(|n| *n != first) {
        return Err(SymdexError::invalid_model(format!(
            "directory '{}' mixes packages {} and {}",
            dir, first, other
        )));
    }
    Ok(first.trim_end_matches("_test").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_files_by_directory() {
        let module = ModuleBuilder::new("example.com/app")
            .file("main.go", "package main\n\nfunc main() {}\n")
            .file("auth/login.go", "package auth\n\nfunc Login() {}\n")
            .file("auth/token.go", "package auth\n\nvar Token string\n")
            .file("auth/login_test.go", "package auth\n\nfunc TestLogin() {}\n")
            .build()
            .unwrap();
        assert_eq!(module.packages.len(), 2);
        let auth = module.package("example.com/app/auth").unwrap();
        assert_eq!(auth.name, "auth");
        assert_eq!(auth.files.len(), 3);
        assert!(auth.file("auth/login_test.go").unwrap().is_test);
        assert_eq!(module.package("example.com/app").unwrap().name, "main");
        assert_eq!(module.revision, 0);
    }

    #[test]
    fn rejects_mixed_packages_and_duplicates() {
        let err = ModuleBuilder::new("m")
            .file("a/a.go", "package a\n")
            .file("a/b.go", "package b\n")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("mixes packages"));

        let err = ModuleBuilder::new("m")
            .file("a/a.go", "package a\n")
            .file("a/a.go", "package a\n")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_paths_outside_the_module() {
        for path in ["../escape/e.go", "/abs/a.go", "a/./a.go"] {
            let err = ModuleBuilder::new("m")
                .file(path, "package a\n")
                .build()
                .unwrap_err();
            assert!(matches!(err, SymdexError::InvalidModel { .. }), "{}", path);
        }
    }

    #[test]
    fn scan_errors_propagate() {
        let err = ModuleBuilder::new("m")
            .file("a/a.go", "package a\n\nfunc Broken() {\n")
            .build()
            .unwrap_err();
        assert!(matches!(err, SymdexError::Parse { .. }));
    }
}
