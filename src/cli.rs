//! CLI front door.
//!
//! One function per command. Each takes the loaded module and resolved
//! configuration and returns a serializable response; `main.rs` owns
//! loading, saving and printing. Query commands never mutate the module.
//!
//! ## Error Handling
//!
//! All functions return `SymdexResult`. Transformation failures are not
//! errors here: they come back as a [`TransformResponse`] whose status is
//! `"error"`, so the caller can still print the result.

use symdex_core::error::{SymdexError, SymdexResult};
use symdex_core::index::{Index, Symbol, SymbolKind};
use symdex_core::model::Module;
use symdex_core::output::{
    ReferenceInfo, ReferencesResponse, SymbolInfo, SymbolsResponse, TransformResponse,
};
use symdex_core::transform::{
    ExtractInterfaces, ExtractionOptions, Rename, RenameOptions, Transformation, Transformer,
};

use crate::config::ResolvedConfig;

/// Filters of the `symbols` command; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SymbolQuery {
    pub name: Option<String>,
    pub kind: Option<SymbolKind>,
    pub file: Option<String>,
    pub parent_type: Option<String>,
}

impl SymbolQuery {
    fn matches(&self, symbol: &Symbol) -> bool {
        wildcard(self.kind, symbol.kind)
            && wildcard(self.file.as_deref(), symbol.file.as_str())
            && wildcard_opt(self.parent_type.as_deref(), symbol.parent_type.as_deref())
    }
}

/// `None` matches anything.
fn wildcard<T: PartialEq>(filter: Option<T>, value: T) -> bool {
    filter.is_none_or(|expected| expected == value)
}

fn wildcard_opt<T: PartialEq>(filter: Option<T>, value: Option<T>) -> bool {
    filter.is_none_or(|expected| value == Some(expected))
}

fn build_index(module: &Module, config: &ResolvedConfig) -> SymdexResult<Index> {
    Index::build(module, &config.index_options())
}

// ============================================================================
// Queries
// ============================================================================

/// List symbols matching `query`, with index statistics.
pub fn run_symbols(
    module: &Module,
    config: &ResolvedConfig,
    query: &SymbolQuery,
) -> SymdexResult<SymbolsResponse> {
    let index = build_index(module, config)?;
    let candidates = match (&query.name, &query.file) {
        (Some(name), _) => index.find_symbols_by_name(name),
        (None, Some(file)) => index.find_symbols_in_file(file),
        (None, None) => index.symbols().collect(),
    };
    let symbols = candidates
        .into_iter()
        .filter(|s| query.matches(s))
        .map(SymbolInfo::from)
        .collect();
    Ok(SymbolsResponse::new(symbols).with_stats(index.stats().clone()))
}

/// References to every symbol named `name`, optionally scoped by parent
/// type and package.
pub fn run_references(
    module: &Module,
    config: &ResolvedConfig,
    name: &str,
    parent_type: Option<&str>,
    package: Option<&str>,
) -> SymdexResult<ReferencesResponse> {
    let index = build_index(module, config)?;
    let package_path = match package {
        Some(p) => Some(
            module
                .find_package(p)
                .map(|pkg| pkg.path.clone())
                .ok_or_else(|| SymdexError::PackageNotFound {
                    path: p.to_string(),
                })?,
        ),
        None => None,
    };
    let targets: Vec<&Symbol> = index
        .find_symbols_by_name(name)
        .into_iter()
        .filter(|s| {
            wildcard_opt(parent_type, s.parent_type.as_deref())
                || wildcard_opt(parent_type, s.container.as_deref())
        })
        .filter(|s| wildcard(package_path.as_deref(), s.package.as_str()))
        .collect();
    if targets.is_empty() {
        return Err(SymdexError::symbol_not_found(
            name,
            parent_type.or(package).map(str::to_string),
        ));
    }
    let references = targets
        .iter()
        .flat_map(|s| index.find_references(s.id))
        .map(ReferenceInfo::from)
        .collect();
    let symbols = targets.into_iter().map(SymbolInfo::from).collect();
    Ok(ReferencesResponse::new(symbols, references))
}

/// The declaration covering `file:line:col`.
pub fn run_at(
    module: &Module,
    config: &ResolvedConfig,
    location: &str,
) -> SymdexResult<SymbolsResponse> {
    let (file, line, col) = parse_location(location)?;
    if module.file(&file).is_none() {
        return Err(SymdexError::FileNotFound { path: file });
    }
    let index = build_index(module, config)?;
    let symbol = index
        .find_symbol_at_position(&file, line, col)
        .ok_or_else(|| SymdexError::symbol_not_found(location, None))?;
    Ok(SymbolsResponse::new(vec![SymbolInfo::from(symbol)]))
}

/// Structs implementing the interface named `interface`, optionally
/// restricted to one package. A name declared as an interface in more than
/// one package is ambiguous without the restriction.
pub fn run_implementations(
    module: &Module,
    config: &ResolvedConfig,
    interface: &str,
    package: Option<&str>,
) -> SymdexResult<SymbolsResponse> {
    let package_path = match package {
        Some(p) => Some(
            module
                .find_package(p)
                .map(|pkg| pkg.path.clone())
                .ok_or_else(|| SymdexError::PackageNotFound {
                    path: p.to_string(),
                })?,
        ),
        None => None,
    };
    let index = build_index(module, config)?;
    let declared: Vec<&Symbol> = index
        .find_symbols_by_name(interface)
        .into_iter()
        .filter(|s| s.kind == SymbolKind::Interface)
        .filter(|s| package_path.as_ref().is_none_or(|path| *path == s.package))
        .collect();
    let target = match declared.as_slice() {
        [] => {
            return Err(SymdexError::symbol_not_found(
                interface,
                Some("interfaces".to_string()),
            ))
        }
        [one] => *one,
        many => {
            return Err(SymdexError::Ambiguous {
                name: interface.to_string(),
                candidates: many.iter().map(|s| s.qualified_name.clone()).collect(),
            })
        }
    };
    let symbols = index
        .find_implementations(target.id)
        .into_iter()
        .map(SymbolInfo::from)
        .collect();
    Ok(SymbolsResponse::new(symbols))
}

// ============================================================================
// Transformations
// ============================================================================

pub fn run_rename(module: &mut Module, options: RenameOptions) -> TransformResponse {
    let dry_run = options.dry_run;
    let rename = Rename::new(options);
    let result = rename.transform(module);
    TransformResponse::new(rename.name(), dry_run, result)
}

pub fn run_extract(module: &mut Module, options: ExtractionOptions) -> TransformResponse {
    let dry_run = options.dry_run;
    let extract = ExtractInterfaces::new(options);
    let result = extract.transform(module);
    TransformResponse::new(extract.name(), dry_run, result)
}

/// Run a transformation read from a plan, such as a chain.
///
/// `dry_run` reports whether every step of the plan runs dry.
pub fn run_plan(module: &mut Module, plan: &Transformation) -> TransformResponse {
    let result = plan.transform(module);
    TransformResponse::new(plan.name(), plan_is_dry(plan), result)
}

fn plan_is_dry(plan: &Transformation) -> bool {
    match plan {
        Transformation::Rename(options) => options.dry_run,
        Transformation::ExtractInterfaces(options) => options.dry_run,
        Transformation::Chain { steps } => steps.iter().all(plan_is_dry),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse `file:line:col`; line and column are 1-indexed.
pub fn parse_location(location: &str) -> SymdexResult<(String, u32, u32)> {
    let invalid = || {
        SymdexError::invalid_options(format!(
            "invalid location '{}', expected path:line:col",
            location
        ))
    };
    let mut parts = location.rsplitn(3, ':');
    let col = parts.next().and_then(|c| c.parse::<u32>().ok()).ok_or_else(invalid)?;
    let line = parts.next().and_then(|l| l.parse::<u32>().ok()).ok_or_else(invalid)?;
    let file = parts.next().filter(|f| !f.is_empty()).ok_or_else(invalid)?;
    if line == 0 || col == 0 {
        return Err(invalid());
    }
    Ok((file.to_string(), line, col))
}

/// Parse a symbol kind name as printed in output.
pub fn parse_kind(kind: &str) -> SymdexResult<SymbolKind> {
    serde_json::from_value(serde_json::Value::String(kind.to_string()))
        .map_err(|_| SymdexError::invalid_options(format!("unknown symbol kind '{}'", kind)))
}

/// One line per symbol: `file:line:col kind qualified_name`.
pub fn format_symbols(response: &SymbolsResponse) -> String {
    response
        .symbols
        .iter()
        .map(|s| {
            format!(
                "{}:{}:{} {} {}\n",
                s.location.file, s.location.line, s.location.col, s.kind, s.qualified_name
            )
        })
        .collect()
}

/// One line per reference: `file:line:col kind context`.
pub fn format_references(response: &ReferencesResponse) -> String {
    response
        .references
        .iter()
        .map(|r| {
            let context = if r.context.is_empty() { "-" } else { &r.context };
            format!(
                "{}:{}:{} {} {}\n",
                r.location.file, r.location.line, r.location.col, r.kind, context
            )
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use symdex_core::builder::ModuleBuilder;

    const AUTH: &str = "package auth

var DefaultTimeout = 5

type Session struct {
	Token string
}

func (s *Session) Close() error { return nil }

type Closer interface {
	Close() error
}

func Login() int {
	return DefaultTimeout
}
";

    fn module() -> Module {
        ModuleBuilder::new("example.com/app")
            .file("auth/auth.go", AUTH)
            .build()
            .unwrap()
    }

    fn config() -> ResolvedConfig {
        ResolvedConfig::default()
    }

    mod query_tests {
        use super::*;

        #[test]
        fn symbols_filter_by_kind() {
            let query = SymbolQuery {
                kind: Some(SymbolKind::Struct),
                ..Default::default()
            };
            let response = run_symbols(&module(), &config(), &query).unwrap();
            assert_eq!(response.count, 1);
            assert_eq!(response.symbols[0].name, "Session");
            assert!(response.stats.is_some());
        }

        #[test]
        fn references_report_context() {
            let response =
                run_references(&module(), &config(), "DefaultTimeout", None, None).unwrap();
            assert_eq!(response.count, 1);
            assert_eq!(response.references[0].context, "Login");
            assert_eq!(response.references[0].location.line, 16);

            let err = run_references(&module(), &config(), "Missing", None, None).unwrap_err();
            assert_eq!(err.error_code().code(), 3);
            let err = run_references(&module(), &config(), "DefaultTimeout", None, Some("nope"))
                .unwrap_err();
            assert!(matches!(err, SymdexError::PackageNotFound { .. }));
        }

        #[test]
        fn at_finds_declaration_on_line() {
            let response = run_at(&module(), &config(), "auth/auth.go:3:5").unwrap();
            assert_eq!(response.symbols[0].name, "DefaultTimeout");
            assert!(run_at(&module(), &config(), "auth/auth.go:3").is_err());
            assert!(matches!(
                run_at(&module(), &config(), "other.go:1:1"),
                Err(SymdexError::FileNotFound { .. })
            ));
        }

        #[test]
        fn implementations_of_interface() {
            let response = run_implementations(&module(), &config(), "Closer", None).unwrap();
            assert_eq!(response.count, 1);
            assert_eq!(response.symbols[0].name, "Session");
            assert!(run_implementations(&module(), &config(), "Session", None).is_err());
        }

        #[test]
        fn implementations_need_a_package_when_the_name_repeats() {
            let module = ModuleBuilder::new("example.com/app")
                .file("auth/auth.go", AUTH)
                .file(
                    "store/store.go",
                    "package store\n\ntype Closer interface {\n\tFlush()\n}\n\ntype Disk struct{}\n\nfunc (d Disk) Flush() {}\n",
                )
                .build()
                .unwrap();
            let err = run_implementations(&module, &config(), "Closer", None).unwrap_err();
            match err {
                SymdexError::Ambiguous { candidates, .. } => assert_eq!(candidates.len(), 2),
                other => panic!("expected ambiguity, got {:?}", other),
            }

            let response =
                run_implementations(&module, &config(), "Closer", Some("store")).unwrap();
            assert_eq!(response.count, 1);
            assert_eq!(response.symbols[0].name, "Disk");
            let response =
                run_implementations(&module, &config(), "Closer", Some("auth")).unwrap();
            assert_eq!(response.symbols[0].name, "Session");
        }

        #[test]
        fn text_formats_list_one_item_per_line() {
            let response = run_references(&module(), &config(), "DefaultTimeout", None, None)
                .unwrap();
            let text = format_references(&response);
            assert!(text.starts_with("auth/auth.go:16:"));
            assert!(text.trim_end().ends_with("reference Login"));
        }
    }

    mod transform_tests {
        use super::*;

        #[test]
        fn rename_dry_run_response() {
            let mut module = module();
            let response = run_rename(
                &mut module,
                RenameOptions {
                    old: "DefaultTimeout".to_string(),
                    new: "GlobalTimeout".to_string(),
                    dry_run: true,
                    ..Default::default()
                },
            );
            assert_eq!(response.status, "ok");
            assert!(response.dry_run);
            assert_eq!(response.transform, "rename");
            assert_eq!(response.result.changes.len(), 2);
            assert_eq!(module.revision, 0);
        }

        #[test]
        fn failed_extraction_is_an_error_response() {
            let mut module = module();
            let response = run_extract(
                &mut module,
                ExtractionOptions {
                    min_methods: 0,
                    ..Default::default()
                },
            );
            assert_eq!(response.status, "error");
            assert_eq!(response.result.error.unwrap().code, 2);
        }

        #[test]
        fn plans_run_chains() {
            let mut module = module();
            let plan: Transformation = serde_json::from_str(
                r#"{"transform": "chain", "steps": [
                    {"transform": "rename", "old": "Login", "new": "SignIn", "dry_run": true}
                ]}"#,
            )
            .unwrap();
            let response = run_plan(&mut module, &plan);
            assert_eq!(response.status, "ok");
            assert!(response.dry_run);
            assert_eq!(response.result.changes.len(), 1);
        }
    }

    mod helper_tests {
        use super::*;

        #[test]
        fn locations_parse() {
            assert_eq!(
                parse_location("auth/auth.go:3:5").unwrap(),
                ("auth/auth.go".to_string(), 3, 5)
            );
            assert!(parse_location("auth/auth.go:0:5").is_err());
            assert!(parse_location(":1:1").is_err());
            assert!(parse_location("x:y:z").is_err());
        }

        #[test]
        fn kinds_parse() {
            assert_eq!(parse_kind("interface").unwrap(), SymbolKind::Interface);
            assert!(parse_kind("class").is_err());
        }
    }
}
