//! Saving modules.
//!
//! [`FsSaver`] writes the text of every modified file under a root
//! directory, and optionally the module snapshot and a manifest recording
//! the SHA-256 of each written file. Every write goes through a temporary
//! file in the destination directory that is then renamed into place, so a
//! reader never sees a half-written file.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use symdex_core::error::SymdexResult;
use symdex_core::model::{is_module_relative, Module};

/// Persists a module.
pub trait ModuleSaver {
    /// Save `module`. Returns what was written.
    fn save(&self, module: &Module) -> SymdexResult<SaveReport>;
}

/// What a save wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    /// Module-relative paths of the source files written, sorted.
    pub files_written: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
}

/// Record of one save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub module: String,
    pub revision: u64,
    /// ISO 8601, UTC.
    pub saved_at: String,
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    /// Hex SHA-256 of the written text.
    pub sha256: String,
    pub bytes: u64,
}

/// Writes modified files to disk.
#[derive(Debug, Clone)]
pub struct FsSaver {
    root: PathBuf,
    snapshot: Option<PathBuf>,
    manifest: Option<PathBuf>,
}

impl FsSaver {
    /// Save source files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsSaver {
            root: root.into(),
            snapshot: None,
            manifest: None,
        }
    }

    /// Also write the whole module as JSON to `path`.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(path.into());
        self
    }

    /// Also write a [`Manifest`] to `path`.
    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest = Some(path.into());
        self
    }
}

impl ModuleSaver for FsSaver {
    fn save(&self, module: &Module) -> SymdexResult<SaveReport> {
        let mut report = SaveReport::default();
        let mut entries = Vec::new();
        let mut modified = module.modified_files();
        modified.sort_by(|a, b| a.path.cmp(&b.path));
        let targets = modified
            .iter()
            .map(|file| target_under(&self.root, &file.path))
            .collect::<io::Result<Vec<_>>>()?;

        for (file, target) in modified.into_iter().zip(targets) {
            atomic_write(&target, file.content.as_bytes())?;
            tracing::debug!(file = %file.path, bytes = file.content.len(), "wrote file");
            entries.push(ManifestEntry {
                path: file.path.clone(),
                sha256: sha256_hex(file.content.as_bytes()),
                bytes: file.content.len() as u64,
            });
            report.files_written.push(file.path.clone());
        }

        if let Some(path) = &self.snapshot {
            let json = serde_json::to_string_pretty(module)?;
            atomic_write(path, json.as_bytes())?;
            report.snapshot = Some(path.clone());
        }

        if let Some(path) = &self.manifest {
            let manifest = Manifest {
                module: module.path.clone(),
                revision: module.revision,
                saved_at: format_timestamp(SystemTime::now()),
                files: entries,
            };
            let json = serde_json::to_string_pretty(&manifest)?;
            atomic_write(path, json.as_bytes())?;
            report.manifest = Some(path.clone());
        }

        tracing::info!(
            root = %self.root.display(),
            files = report.files_written.len(),
            "saved module"
        );
        Ok(report)
    }
}

/// `root` joined with a module-relative file path. Paths that could land
/// outside `root` are refused before anything is written.
fn target_under(root: &Path, relative: &str) -> io::Result<PathBuf> {
    let path = Path::new(relative);
    let plain = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !plain || !is_module_relative(relative) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to write outside {}: {}", root.display(), relative),
        ));
    }
    Ok(root.join(path))
}

/// Write `content` to `path` via a temporary file in the same directory.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Format a timestamp for JSON output (ISO 8601).
fn format_timestamp(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use symdex_core::builder::ModuleBuilder;
    use tempfile::TempDir;

    fn module() -> Module {
        ModuleBuilder::new("example.com/app")
            .file("a/a.go", "package a\n\nvar X = 1\n")
            .file("b/b.go", "package b\n\nvar Y = 2\n")
            .build()
            .unwrap()
    }

    #[test]
    fn writes_only_modified_files() {
        let dir = TempDir::new().unwrap();
        let mut module = module();
        module.file_mut("a/a.go").unwrap().content = "package a\n\nvar Z = 1\n".to_string();
        module.mark_modified("a/a.go");

        let report = FsSaver::new(dir.path()).save(&module).unwrap();
        assert_eq!(report.files_written, vec!["a/a.go"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("a/a.go")).unwrap(),
            "package a\n\nvar Z = 1\n"
        );
        assert!(!dir.path().join("b/b.go").exists());
    }

    #[test]
    fn manifest_records_hashes_and_snapshot_reloads() {
        let dir = TempDir::new().unwrap();
        let mut module = module();
        module.mark_modified("b/b.go");
        let snapshot = dir.path().join("state/module.json");
        let manifest = dir.path().join("state/manifest.json");

        let report = FsSaver::new(dir.path().join("src"))
            .with_snapshot(&snapshot)
            .with_manifest(&manifest)
            .save(&module)
            .unwrap();
        assert_eq!(report.manifest.as_deref(), Some(manifest.as_path()));

        let written: Manifest =
            serde_json::from_str(&fs::read_to_string(&manifest).unwrap()).unwrap();
        assert_eq!(written.module, "example.com/app");
        assert_eq!(written.files.len(), 1);
        assert_eq!(written.files[0].sha256, sha256_hex(b"package b\n\nvar Y = 2\n"));
        assert!(written.saved_at.ends_with('Z'));

        let reloaded: Module =
            serde_json::from_str(&fs::read_to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(reloaded, module);
    }

    #[test]
    fn refuses_paths_that_leave_the_root() {
        use symdex_core::transform::{Rename, RenameOptions, Transformer};

        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        let mut module = ModuleBuilder::new("example.com/app")
            .file("a/a.go", "package a\n\nvar Limit = 1\n")
            .file("a/use.go", "package a\n\nfunc Get() int { return Limit }\n")
            .build()
            .unwrap();
        module.file_mut("a/a.go").unwrap().path = "../escape/e.go".to_string();

        let result = Rename::new(RenameOptions {
            old: "Limit".to_string(),
            new: "Max".to_string(),
            ..Default::default()
        })
        .transform(&mut module);
        assert!(result.success, "{}", result.summary);
        assert_eq!(module.modified_files().len(), 2);

        let err = FsSaver::new(&root).save(&module).unwrap_err();
        assert!(err.to_string().contains("../escape/e.go"), "{}", err);
        assert!(!dir.path().join("escape").exists());
        assert!(!root.join("a/use.go").exists());
    }

    #[test]
    fn targets_stay_under_the_root() {
        let root = Path::new("/srv/app");
        assert_eq!(
            target_under(root, "a/a.go").unwrap(),
            PathBuf::from("/srv/app/a/a.go")
        );
        for path in ["../e.go", "/etc/e.go", "a/../../e.go", "./a.go"] {
            let err = target_under(root, path).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{}", path);
        }
    }
}
