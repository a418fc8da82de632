//! Front-door workflows over real directories.
//!
//! Each test lays out a small module in a temp directory, loads it, runs a
//! command and checks what reaches the disk.

use std::fs;
use std::path::Path;

use symdex::cli::{self, SymbolQuery};
use symdex::config::{CliOverrides, ResolvedConfig, PROJECT_CONFIG_FILE};
use symdex::index::SymbolKind;
use symdex::loader::{DirectoryLoader, JsonModuleLoader, ModuleLoader};
use symdex::model::Module;
use symdex::saver::{FsSaver, ModuleSaver};
use symdex::transform::RenameOptions;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

const AUTH: &str = "package auth

var DefaultTimeout = 5

func Login() int {
	return DefaultTimeout
}
";

const AUTH_TEST: &str = "package auth

func TestLogin() {}
";

const MAIN: &str = "package main

import \"example.com/app/auth\"

func main() {
	auth.Login()
}
";

const STREAMS: &str = "package io

type A struct{}

func (a *A) Read() (int, error) { return 0, nil }

func (a *A) Close() error { return nil }

type B struct{}

func (b *B) Read() (int, error) { return 0, nil }

func (b *B) Close() error { return nil }
";

fn write(root: &Path, path: &str, content: &str) {
    let target = root.join(path);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(target, content).unwrap();
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "go.mod", "module example.com/app\n\ngo 1.22\n");
    write(dir.path(), "main.go", MAIN);
    write(dir.path(), "auth/auth.go", AUTH);
    write(dir.path(), "auth/auth_test.go", AUTH_TEST);
    dir
}

fn load(root: &Path, config: &ResolvedConfig) -> Module {
    DirectoryLoader::new(root)
        .load(&config.load_options())
        .unwrap()
}

fn resolve(root: &Path) -> ResolvedConfig {
    ResolvedConfig::resolve_with_env(root, &CliOverrides::default(), |_| None).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn rename_applies_to_disk() {
    let dir = workspace();
    let config = resolve(dir.path());
    let mut module = load(dir.path(), &config);
    assert_eq!(module.path, "example.com/app");
    assert_eq!(module.file_count(), 2);

    let response = cli::run_rename(
        &mut module,
        RenameOptions {
            old: "Login".to_string(),
            new: "SignIn".to_string(),
            ..Default::default()
        },
    );
    assert_eq!(response.status, "ok", "{}", response.result.summary);

    let report = FsSaver::new(dir.path()).save(&module).unwrap();
    assert_eq!(report.files_written, vec!["auth/auth.go", "main.go"]);
    let main = fs::read_to_string(dir.path().join("main.go")).unwrap();
    assert!(main.contains("auth.SignIn()"));
    let auth = fs::read_to_string(dir.path().join("auth/auth.go")).unwrap();
    assert!(auth.contains("func SignIn() int"));
    // Untouched by the rename and filtered out at load time.
    assert_eq!(
        fs::read_to_string(dir.path().join("auth/auth_test.go")).unwrap(),
        AUTH_TEST
    );
}

#[test]
fn dry_run_writes_nothing() {
    let dir = workspace();
    let config = resolve(dir.path());
    let mut module = load(dir.path(), &config);

    let response = cli::run_rename(
        &mut module,
        RenameOptions {
            old: "DefaultTimeout".to_string(),
            new: "GlobalTimeout".to_string(),
            dry_run: true,
            ..Default::default()
        },
    );
    assert_eq!(response.result.changes.len(), 2);
    let report = FsSaver::new(dir.path()).save(&module).unwrap();
    assert!(report.files_written.is_empty());
    assert_eq!(
        fs::read_to_string(dir.path().join("auth/auth.go")).unwrap(),
        AUTH
    );
}

#[test]
fn snapshots_reload_with_the_same_answers() {
    let dir = workspace();
    let config = resolve(dir.path());
    let module = load(dir.path(), &config);
    let snapshot = dir.path().join("module.json");
    fs::write(&snapshot, serde_json::to_string(&module).unwrap()).unwrap();

    let reloaded = JsonModuleLoader::new(&snapshot)
        .load(&config.load_options())
        .unwrap();
    assert_eq!(reloaded, module);

    let from_dir = cli::run_references(&module, &config, "Login", None, None).unwrap();
    let from_snapshot = cli::run_references(&reloaded, &config, "Login", None, None).unwrap();
    assert_eq!(
        serde_json::to_value(&from_dir).unwrap(),
        serde_json::to_value(&from_snapshot).unwrap()
    );
    assert_eq!(from_dir.references[0].location.file, "main.go");
}

#[test]
fn include_tests_flag_reaches_the_index() {
    let dir = workspace();
    let overrides = CliOverrides {
        include_tests: Some(true),
        ..Default::default()
    };
    let config =
        ResolvedConfig::resolve_with_env(dir.path(), &overrides, |_| None).unwrap();
    let module = load(dir.path(), &config);
    assert_eq!(module.file_count(), 3);

    let query = SymbolQuery {
        kind: Some(SymbolKind::Function),
        ..Default::default()
    };
    let response = cli::run_symbols(&module, &config, &query).unwrap();
    let names: Vec<&str> = response.symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"TestLogin"));
}

#[test]
fn project_config_drives_extraction() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "go.mod", "module example.com/app\n");
    write(dir.path(), "io/streams.go", STREAMS);
    write(
        dir.path(),
        PROJECT_CONFIG_FILE,
        r#"{"min_types": 3, "exclude_methods": ["Read"]}"#,
    );

    let config = resolve(dir.path());
    let mut module = load(dir.path(), &config);
    let response = cli::run_extract(&mut module, config.extraction_options());
    // Only two types share the method set.
    assert_eq!(response.status, "ok");
    assert!(response.result.changes.is_empty());

    let options = symdex::transform::ExtractionOptions {
        min_types: 2,
        ..config.extraction_options()
    };
    let response = cli::run_extract(&mut module, options);
    assert_eq!(response.status, "ok", "{}", response.result.summary);
    assert_eq!(response.result.affected_files, vec!["io/streams.go"]);
    let file = module.file("io/streams.go").unwrap();
    let closer = file.types.get("Closer").expect("Closer extracted");
    match &closer.kind {
        symdex::model::TypeKind::Interface { methods, .. } => {
            let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["Close"]);
        }
        other => panic!("expected interface, got {:?}", other),
    }
}
