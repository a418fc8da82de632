//! Binary entry point for the symdex CLI.
//!
//! ## Usage
//!
//! ```bash
//! # List the structs of a module snapshot
//! symdex --module module.json symbols --kind struct
//!
//! # Every use of a declaration
//! symdex --module module.json refs DefaultTimeout
//!
//! # Preview a rename of a source tree, then apply it and run the tests
//! symdex --root . rename DefaultTimeout GlobalTimeout --dry-run
//! symdex --root . rename DefaultTimeout GlobalTimeout --test
//!
//! # Extract interfaces shared by at least three types
//! symdex --root . extract --min-types 3 --format text
//! ```
//!
//! Output goes to stdout, JSON by default. Logs go to stderr. On failure the
//! exit status is the error code; JSON output prints the error response on
//! stdout, text output prints `error: <message>` on stderr.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use symdex::cli::{self, SymbolQuery};
use symdex::config::{CliOverrides, ResolvedConfig};
use symdex::diff::generate_unified_diff;
use symdex::error::{SymdexError, SymdexResult};
use symdex::loader::{DirectoryLoader, JsonModuleLoader, ModuleLoader};
use symdex::model::Module;
use symdex::output::{emit_response, format_preview, ErrorResponse, TransformResponse};
use symdex::saver::{FsSaver, ModuleSaver};
use symdex::testcmd::{resolve_test_command, run_test_command, TestRun};
use symdex::transform::{ExtractionOptions, RenameOptions, Transformation};

// ============================================================================
// CLI Structure
// ============================================================================

/// Symbol index and refactoring engine for Go-shaped modules.
#[derive(Parser, Debug)]
#[command(name = "symdex", version, about = "Symbol index and refactoring engine")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// JSON module snapshot. Without it the source tree at --root is scanned.
    #[arg(long, global = true)]
    module: Option<PathBuf>,

    /// Workspace root: config, saved files and test runs (default: current directory).
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Index `_test.go` files.
    #[arg(long, global = true)]
    include_tests: bool,

    /// Index unexported declarations.
    #[arg(long, global = true)]
    include_private: bool,

    /// Build tags for `//go:build` lines, comma separated.
    #[arg(long, global = true, value_delimiter = ',')]
    tags: Vec<String>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Log level for tracing output. `RUST_LOG` takes precedence.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Full JSON response.
    #[default]
    Json,
    /// One line per item; previews and diffs for transformations.
    Text,
}

/// Options shared by the transforming subcommands.
#[derive(Parser, Debug)]
struct ApplyArgs {
    /// Report the changes without touching any file.
    #[arg(long)]
    dry_run: bool,

    /// Run the project's tests after saving.
    #[arg(long)]
    test: bool,

    /// Test command as a JSON array, e.g. '["go","test","./..."]'.
    #[arg(long, requires = "test")]
    test_command: Option<String>,

    /// Test timeout in seconds.
    #[arg(long, default_value_t = 300)]
    timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List declarations.
    Symbols {
        /// Exact name.
        #[arg(long)]
        name: Option<String>,
        /// Symbol kind (struct, interface, function, method, field, ...).
        #[arg(long)]
        kind: Option<String>,
        /// Module-relative file path.
        #[arg(long)]
        file: Option<String>,
        /// Owning type of fields and methods.
        #[arg(long)]
        parent: Option<String>,
    },
    /// Find the uses of a declaration.
    Refs {
        name: String,
        /// Owning type, or function for parameters.
        #[arg(long)]
        parent: Option<String>,
        /// Import path or package name.
        #[arg(long)]
        package: Option<String>,
    },
    /// Show the declaration at a position.
    At {
        /// Location as file:line:col.
        location: String,
    },
    /// Structs implementing an interface.
    Impls {
        interface: String,
        /// Package declaring the interface, by import path or name.
        #[arg(long)]
        package: Option<String>,
    },
    /// Rename a declaration and its uses.
    Rename {
        old: String,
        new: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        package: Option<String>,
        #[command(flatten)]
        apply: ApplyArgs,
    },
    /// Extract interfaces from method sets shared by several types.
    Extract {
        #[arg(long)]
        min_types: Option<usize>,
        #[arg(long)]
        min_methods: Option<usize>,
        /// Glob of package paths to skip; repeatable.
        #[arg(long)]
        exclude_package: Vec<String>,
        /// Glob of type names to skip; repeatable.
        #[arg(long)]
        exclude_type: Vec<String>,
        /// Glob of method names to skip; repeatable.
        #[arg(long)]
        exclude_method: Vec<String>,
        /// Name for the interface instead of a generated one.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        target_package: Option<String>,
        #[arg(long)]
        target_file: Option<String>,
        /// Put each interface in a file of its own.
        #[arg(long)]
        new_files: bool,
        #[command(flatten)]
        apply: ApplyArgs,
    },
    /// Run a transformation plan read from a JSON file.
    Apply {
        plan: PathBuf,
        #[command(flatten)]
        apply: ApplyArgs,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_format);

    let format = cli.global.format;
    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            let _ = report_error(format, &err, &mut io::stdout(), &mut io::stderr());
            ExitCode::from(err.error_code().code())
        }
    }
}

/// Write a failed command's error. JSON output keeps the error envelope on
/// stdout with every other response; text output puts one line on stderr.
fn report_error(
    format: OutputFormat,
    err: &SymdexError,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            emit_response(&ErrorResponse::from(err), stdout)?;
            stdout.flush()
        }
        OutputFormat::Text => {
            writeln!(stderr, "error: {}", err)?;
            stderr.flush()
        }
    }
}

fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn execute(cli: Cli) -> SymdexResult<ExitCode> {
    let global = &cli.global;
    let overrides = CliOverrides {
        include_tests: global.include_tests.then_some(true),
        include_private: global.include_private.then_some(true),
        min_types: None,
        min_methods: None,
        build_tags: global.tags.clone(),
    };

    match cli.command {
        Command::Symbols {
            name,
            kind,
            file,
            parent,
        } => {
            let config = ResolvedConfig::resolve(&global.root, &overrides)?;
            let module = load_module(global, &config)?;
            let query = SymbolQuery {
                name,
                kind: kind.as_deref().map(cli::parse_kind).transpose()?,
                file,
                parent_type: parent,
            };
            let response = cli::run_symbols(&module, &config, &query)?;
            emit(global, &response, || cli::format_symbols(&response))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Refs {
            name,
            parent,
            package,
        } => {
            let config = ResolvedConfig::resolve(&global.root, &overrides)?;
            let module = load_module(global, &config)?;
            let response = cli::run_references(
                &module,
                &config,
                &name,
                parent.as_deref(),
                package.as_deref(),
            )?;
            emit(global, &response, || cli::format_references(&response))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::At { location } => {
            let config = ResolvedConfig::resolve(&global.root, &overrides)?;
            let module = load_module(global, &config)?;
            let response = cli::run_at(&module, &config, &location)?;
            emit(global, &response, || cli::format_symbols(&response))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Impls { interface, package } => {
            let config = ResolvedConfig::resolve(&global.root, &overrides)?;
            let module = load_module(global, &config)?;
            let response =
                cli::run_implementations(&module, &config, &interface, package.as_deref())?;
            emit(global, &response, || cli::format_symbols(&response))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Rename {
            old,
            new,
            parent,
            package,
            apply,
        } => {
            let config = ResolvedConfig::resolve(&global.root, &overrides)?;
            let mut module = load_module(global, &config)?;
            let options = RenameOptions {
                old,
                new,
                parent_type: parent,
                package,
                dry_run: apply.dry_run,
            };
            let response = cli::run_rename(&mut module, options);
            finish_transform(global, &config, &apply, &module, response)
        }
        Command::Extract {
            min_types,
            min_methods,
            exclude_package,
            exclude_type,
            exclude_method,
            name,
            target_package,
            target_file,
            new_files,
            apply,
        } => {
            let overrides = CliOverrides {
                min_types,
                min_methods,
                ..overrides
            };
            let config = ResolvedConfig::resolve(&global.root, &overrides)?;
            let mut module = load_module(global, &config)?;
            let base = config.extraction_options();
            let options = ExtractionOptions {
                exclude_packages: extend(base.exclude_packages.clone(), exclude_package),
                exclude_types: extend(base.exclude_types.clone(), exclude_type),
                exclude_methods: extend(base.exclude_methods.clone(), exclude_method),
                interface_name: name,
                target_package,
                target_file,
                create_new_files: new_files,
                dry_run: apply.dry_run,
                ..base
            };
            let response = cli::run_extract(&mut module, options);
            finish_transform(global, &config, &apply, &module, response)
        }
        Command::Apply { plan, apply } => {
            let config = ResolvedConfig::resolve(&global.root, &overrides)?;
            let mut module = load_module(global, &config)?;
            let plan = read_plan(&plan, apply.dry_run)?;
            let response = cli::run_plan(&mut module, &plan);
            finish_transform(global, &config, &apply, &module, response)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn load_module(global: &GlobalArgs, config: &ResolvedConfig) -> SymdexResult<Module> {
    let options = config.load_options();
    let module = match &global.module {
        Some(path) => JsonModuleLoader::new(path).load(&options)?,
        None => DirectoryLoader::new(&global.root).load(&options)?,
    };
    Ok(module)
}

fn extend(mut base: Vec<String>, extra: Vec<String>) -> Vec<String> {
    base.extend(extra);
    base
}

/// Read a plan; `--dry-run` forces every step dry.
fn read_plan(path: &Path, dry_run: bool) -> SymdexResult<Transformation> {
    let text = std::fs::read_to_string(path).map_err(|_| SymdexError::FileNotFound {
        path: path.display().to_string(),
    })?;
    let mut plan: Transformation = serde_json::from_str(&text)
        .map_err(|e| SymdexError::invalid_options(format!("invalid plan: {}", e)))?;
    if dry_run {
        force_dry_run(&mut plan);
    }
    Ok(plan)
}

fn force_dry_run(plan: &mut Transformation) {
    match plan {
        Transformation::Rename(options) => options.dry_run = true,
        Transformation::ExtractInterfaces(options) => options.dry_run = true,
        Transformation::Chain { steps } => steps.iter_mut().for_each(force_dry_run),
    }
}

/// Transform output plus the optional test run.
#[derive(Debug, Serialize)]
struct TransformOutput {
    #[serde(flatten)]
    response: TransformResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    tests: Option<TestRun>,
}

/// Save, test and print the outcome of a transformation.
fn finish_transform(
    global: &GlobalArgs,
    config: &ResolvedConfig,
    apply: &ApplyArgs,
    module: &Module,
    mut response: TransformResponse,
) -> SymdexResult<ExitCode> {
    let failed = response.status != "ok";
    let mut tests = None;

    if !failed && !response.dry_run {
        let mut saver = FsSaver::new(&global.root);
        if let Some(snapshot) = &global.module {
            saver = saver.with_snapshot(snapshot);
        }
        let report = saver.save(module)?;
        response = response.with_files_written(report.files_written);

        if apply.test {
            let configured = config.test_command.as_ref().map(|c| c.value.as_slice());
            match resolve_test_command(apply.test_command.as_deref(), configured, &global.root)? {
                Some(command) => {
                    let timeout = Duration::from_secs(apply.timeout);
                    tests = Some(run_test_command(&command, &global.root, timeout)?);
                }
                None => tracing::warn!("no test command found; skipping tests"),
            }
        }
    }

    let tests_failed = tests.as_ref().is_some_and(|t| !t.success);
    let code = response.result.error.as_ref().map(|e| e.code);
    let output = TransformOutput { response, tests };
    emit(global, &output, || format_transform(&output))?;

    Ok(match code {
        Some(code) => ExitCode::from(code),
        None if tests_failed => ExitCode::FAILURE,
        None => ExitCode::SUCCESS,
    })
}

fn format_transform(output: &TransformOutput) -> String {
    let response = &output.response;
    let result = &response.result;
    let mut text = format!("{}\n", result.summary);
    for warning in &result.warnings {
        text.push_str(&format!("warning: {}\n", warning));
    }
    if response.dry_run {
        text.push_str(&format_preview(result));
    } else {
        text.push_str(&generate_unified_diff(&result.changes));
    }
    if let Some(tests) = &output.tests {
        let verdict = if tests.success { "passed" } else { "FAILED" };
        text.push_str(&format!("tests ({}): {}\n", tests.command.join(" "), verdict));
    }
    text
}

fn emit<T: Serialize>(
    global: &GlobalArgs,
    response: &T,
    text: impl FnOnce() -> String,
) -> SymdexResult<()> {
    let mut stdout = io::stdout();
    match global.format {
        OutputFormat::Json => emit_response(response, &mut stdout)?,
        OutputFormat::Text => stdout.write_all(text().as_bytes())?,
    }
    stdout.flush()?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
