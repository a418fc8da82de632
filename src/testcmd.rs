//! Test command parsing, detection and execution.
//!
//! After a transformation is saved, the project's own tests can be run as a
//! subprocess to check the result. The engine never depends on this.
//!
//! ## Test Command Format
//!
//! Test commands are JSON arrays with template variables:
//! ```json
//! ["go", "test", "{workspace}/..."]
//! ```
//!
//! `{workspace}` expands to the workspace root.
//!
//! ## Resolution Order
//!
//! 1. `--test-command` flag
//! 2. `test_command` in `symdex.json`
//! 3. `go.mod` in the workspace root → `go test ./...`
//! 4. Nothing found → no test run

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wait_timeout::ChildExt;

/// Why a test command could not be built or run.
#[derive(Debug, Error)]
pub enum TestCommandError {
    /// Not a non-empty JSON array of strings.
    #[error("invalid test command JSON: {message}")]
    InvalidJson { message: String },

    /// `{workspace}` used without a workspace.
    #[error("template variable '{variable}' not provided")]
    MissingVariable { variable: String },

    /// Spawning or waiting on the command failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TestCommandResult<T> = Result<T, TestCommandError>;

/// Where the test command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCommandSource {
    /// Provided via `--test-command`.
    CliFlag,
    /// From `symdex.json`.
    ProjectConfig,
    /// Detected from `go.mod`.
    GoMod,
}

impl std::fmt::Display for TestCommandSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestCommandSource::CliFlag => write!(f, "--test-command flag"),
            TestCommandSource::ProjectConfig => write!(f, "symdex.json"),
            TestCommandSource::GoMod => write!(f, "go.mod"),
        }
    }
}

/// A test command with its variables expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    /// Program followed by its arguments.
    pub args: Vec<String>,
    pub source: TestCommandSource,
}

/// Outcome of a test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub success: bool,
    /// `None` when killed on timeout or by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub command: Vec<String>,
}

/// Parse `["prog", "arg", ...]`.
pub fn parse_test_command(json_str: &str) -> TestCommandResult<Vec<String>> {
    let args: Vec<String> =
        serde_json::from_str(json_str).map_err(|e| TestCommandError::InvalidJson {
            message: format!("expected JSON array of strings: {}", e),
        })?;

    if args.is_empty() {
        return Err(TestCommandError::InvalidJson {
            message: "test command array cannot be empty".to_string(),
        });
    }

    Ok(args)
}

/// Replace `{workspace}` in every argument.
pub fn expand_template_vars(
    args: &[String],
    workspace: Option<&str>,
) -> TestCommandResult<Vec<String>> {
    args.iter()
        .map(|arg| {
            if !arg.contains("{workspace}") {
                return Ok(arg.clone());
            }
            let root = workspace.ok_or_else(|| TestCommandError::MissingVariable {
                variable: "workspace".to_string(),
            })?;
            Ok(arg.replace("{workspace}", root))
        })
        .collect()
}

/// Pick the test command for `workspace_root`.
///
/// `cli` is the raw `--test-command` JSON; `configured` comes from the
/// project config. Returns `None` when nothing applies.
pub fn resolve_test_command(
    cli: Option<&str>,
    configured: Option<&[String]>,
    workspace_root: &Path,
) -> TestCommandResult<Option<TestCommand>> {
    let workspace = workspace_root.to_string_lossy();
    let (args, source) = if let Some(json) = cli {
        (parse_test_command(json)?, TestCommandSource::CliFlag)
    } else if let Some(args) = configured.filter(|a| !a.is_empty()) {
        (args.to_vec(), TestCommandSource::ProjectConfig)
    } else if workspace_root.join("go.mod").is_file() {
        (default_go_command(), TestCommandSource::GoMod)
    } else {
        return Ok(None);
    };
    Ok(Some(TestCommand {
        args: expand_template_vars(&args, Some(&workspace))?,
        source,
    }))
}

fn default_go_command() -> Vec<String> {
    vec!["go".to_string(), "test".to_string(), "./...".to_string()]
}

/// Run `command` in `workspace_root`, killing it after `timeout`.
pub fn run_test_command(
    command: &TestCommand,
    workspace_root: &Path,
    timeout: Duration,
) -> TestCommandResult<TestRun> {
    let Some((program, args)) = command.args.split_first() else {
        return Err(TestCommandError::InvalidJson {
            message: "test command array cannot be empty".to_string(),
        });
    };
    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .current_dir(workspace_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    tracing::info!(command = ?command.args, source = %command.source, "running tests");

    // OS-level wait; no polling.
    let status = child.wait_timeout(timeout)?;
    let timed_out = status.is_none();
    if timed_out {
        let _ = child.kill();
        let _ = child.wait();
    }
    let stdout = drain(child.stdout.take());
    let mut stderr = drain(child.stderr.take());
    let duration = start.elapsed();
    if timed_out {
        tracing::warn!(?duration, command = ?command.args, "test command timed out");
        stderr = format!("Command timed out after {:?} (limit: {:?})", duration, timeout);
    }

    Ok(TestRun {
        success: status.is_some_and(|s| s.success()),
        exit_code: status.and_then(|s| s.code()),
        timed_out,
        stdout,
        stderr,
        duration_ms: duration.as_millis() as u64,
        command: command.args.clone(),
    })
}

fn drain(stream: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).ok();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod parse_tests {
        use super::*;

        #[test]
        fn parses_argument_arrays() {
            let args = parse_test_command(r#"["go", "test", "./..."]"#).unwrap();
            assert_eq!(args, vec!["go", "test", "./..."]);
        }

        #[test]
        fn rejects_empty_and_malformed() {
            assert!(matches!(
                parse_test_command("[]"),
                Err(TestCommandError::InvalidJson { .. })
            ));
            assert!(parse_test_command("go test").is_err());
            assert!(parse_test_command("[1, 2]").is_err());
        }

        #[test]
        fn expands_workspace_variable() {
            let args = vec!["{workspace}/...".to_string()];
            assert_eq!(
                expand_template_vars(&args, Some("/w")).unwrap(),
                vec!["/w/..."]
            );
            assert!(matches!(
                expand_template_vars(&args, None),
                Err(TestCommandError::MissingVariable { .. })
            ));
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn cli_flag_takes_priority() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("go.mod"), "module m\n").unwrap();
            let configured = vec!["make".to_string(), "test".to_string()];
            let cmd = resolve_test_command(Some(r#"["true"]"#), Some(&configured), dir.path())
                .unwrap()
                .unwrap();
            assert_eq!(cmd.source, TestCommandSource::CliFlag);

            let cmd = resolve_test_command(None, Some(&configured), dir.path())
                .unwrap()
                .unwrap();
            assert_eq!(cmd.source, TestCommandSource::ProjectConfig);

            let cmd = resolve_test_command(None, None, dir.path()).unwrap().unwrap();
            assert_eq!(cmd.source, TestCommandSource::GoMod);
            assert_eq!(cmd.args, vec!["go", "test", "./..."]);
        }

        #[test]
        fn no_command_without_go_mod_or_config() {
            let dir = TempDir::new().unwrap();
            assert!(resolve_test_command(None, None, dir.path()).unwrap().is_none());
        }
    }

    #[cfg(unix)]
    mod run_tests {
        use super::*;

        fn command(args: &[&str]) -> TestCommand {
            TestCommand {
                args: args.iter().map(|a| a.to_string()).collect(),
                source: TestCommandSource::CliFlag,
            }
        }

        #[test]
        fn captures_output_and_status() {
            let dir = TempDir::new().unwrap();
            let run = run_test_command(
                &command(&["sh", "-c", "echo ok; exit 3"]),
                dir.path(),
                Duration::from_secs(10),
            )
            .unwrap();
            assert!(!run.success);
            assert_eq!(run.exit_code, Some(3));
            assert_eq!(run.stdout.trim(), "ok");
            assert!(!run.timed_out);
        }

        #[test]
        fn kills_commands_that_time_out() {
            let dir = TempDir::new().unwrap();
            let run = run_test_command(
                &command(&["sleep", "5"]),
                dir.path(),
                Duration::from_millis(100),
            )
            .unwrap();
            assert!(run.timed_out);
            assert!(!run.success);
            assert_eq!(run.exit_code, None);
        }
    }
}
