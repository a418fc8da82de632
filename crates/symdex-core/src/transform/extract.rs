//! Interface extraction: find structs sharing a method set and declare an
//! interface for it.
//!
//! Structs are clustered by the exact text of their method names and
//! signatures. Every cluster with enough implementers and methods becomes
//! one interface declaration, named by a [`NamingStrategy`] and appended to
//! an existing file or written to a new one.

use std::collections::{BTreeMap, BTreeSet};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{SymdexError, SymdexResult};
use crate::index::{Index, IndexOptions, SymbolKind};
use crate::model::{normalize_text, Module, Shift, WalkSpans};
use crate::patch::Edit;
use crate::scan::parse_file;
use crate::transform::apply::apply_edits;
use crate::transform::{Change, TransformResult, Transformer};
use crate::validation::validate_identifier;

/// Suffix of source files created for extracted interfaces.
const SOURCE_SUFFIX: &str = ".go";

/// Interface name used when no better name can be derived.
const FALLBACK_NAME: &str = "Common";

// ============================================================================
// Options
// ============================================================================

/// Knobs of an extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    /// Fewest implementers a method set needs.
    pub min_types: usize,
    /// Fewest methods a method set needs.
    pub min_methods: usize,
    /// Glob patterns over package import paths to skip.
    pub exclude_packages: Vec<String>,
    /// Glob patterns over type names to skip.
    pub exclude_types: Vec<String>,
    /// Glob patterns over method names to leave out of method sets.
    pub exclude_methods: Vec<String>,
    /// Consider unexported types and methods.
    pub include_private: bool,
    /// Explicit interface name; wins over the naming strategy.
    pub interface_name: Option<String>,
    /// Package receiving the interfaces, by path or name.
    pub target_package: Option<String>,
    /// Existing file receiving the interfaces.
    pub target_file: Option<String>,
    /// Write each interface to a new file named after it.
    pub create_new_files: bool,
    pub dry_run: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        ExtractionOptions {
            min_types: 2,
            min_methods: 1,
            exclude_packages: Vec::new(),
            exclude_types: Vec::new(),
            exclude_methods: Vec::new(),
            include_private: false,
            interface_name: None,
            target_package: None,
            target_file: None,
            create_new_files: false,
            dry_run: false,
        }
    }
}

impl ExtractionOptions {
    /// Reject bad bounds, names and patterns before anything runs.
    pub fn validate(&self) -> SymdexResult<()> {
        if self.min_types < 1 {
            return Err(SymdexError::invalid_options("min_types must be at least 1"));
        }
        if self.min_methods < 1 {
            return Err(SymdexError::invalid_options("min_methods must be at least 1"));
        }
        if let Some(name) = &self.interface_name {
            validate_identifier(name)?;
        }
        Excludes::compile(self)?;
        Ok(())
    }
}

/// Compiled exclude patterns.
struct Excludes {
    packages: GlobSet,
    types: GlobSet,
    methods: GlobSet,
}

impl Excludes {
    fn compile(options: &ExtractionOptions) -> SymdexResult<Self> {
        Ok(Excludes {
            packages: glob_set(&options.exclude_packages)?,
            types: glob_set(&options.exclude_types)?,
            methods: glob_set(&options.exclude_methods)?,
        })
    }
}

fn glob_set(patterns: &[String]) -> SymdexResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            SymdexError::invalid_options(format!("invalid pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SymdexError::invalid_options(e.to_string()))
}

// ============================================================================
// Method patterns
// ============================================================================

/// One method of a method set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodShape {
    pub name: String,
    /// Parameters and results, whitespace-normalized.
    pub signature: String,
}

/// A struct implementing a method set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementer {
    pub name: String,
    pub package: String,
    pub file: String,
}

/// Structs sharing one exact method set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodPattern {
    /// Sorted by name.
    pub methods: Vec<MethodShape>,
    /// In declaration order.
    pub implementers: Vec<Implementer>,
}

impl MethodPattern {
    /// Clustering key: the joined method names and signatures.
    pub fn key(&self) -> String {
        pattern_key(&self.methods)
    }
}

fn pattern_key(methods: &[MethodShape]) -> String {
    methods
        .iter()
        .map(|m| format!("{}{}", m.name, m.signature))
        .collect::<Vec<_>>()
        .join(";")
}

/// Cluster the structs of `index` by method set.
///
/// Patterns below the thresholds of `options` are dropped. The result is
/// ordered by clustering key.
pub fn discover(index: &Index, options: &ExtractionOptions) -> SymdexResult<Vec<MethodPattern>> {
    let excludes = Excludes::compile(options)?;
    let mut patterns: BTreeMap<String, MethodPattern> = BTreeMap::new();

    for candidate in index.find_symbols_by_kind(SymbolKind::Struct) {
        if excludes.packages.is_match(&candidate.package)
            || excludes.types.is_match(&candidate.name)
        {
            continue;
        }
        let mut methods: Vec<MethodShape> = index
            .find_symbols_for_type(&candidate.name)
            .into_iter()
            .filter(|s| s.kind == SymbolKind::Method && s.package == candidate.package)
            .filter(|s| !excludes.methods.is_match(&s.name))
            .map(|s| MethodShape {
                name: s.name.clone(),
                signature: normalize_text(s.type_text.as_deref().unwrap_or_default()),
            })
            .collect();
        if methods.is_empty() {
            continue;
        }
        methods.sort();
        methods.dedup();
        let implementer = Implementer {
            name: candidate.name.clone(),
            package: candidate.package.clone(),
            file: candidate.file.clone(),
        };
        patterns
            .entry(pattern_key(&methods))
            .or_insert_with(|| MethodPattern {
                methods,
                implementers: Vec::new(),
            })
            .implementers
            .push(implementer);
    }

    let kept: Vec<MethodPattern> = patterns
        .into_values()
        .filter(|p| p.implementers.len() >= options.min_types && p.methods.len() >= options.min_methods)
        .collect();
    tracing::debug!(patterns = kept.len(), "discovered method patterns");
    Ok(kept)
}

// ============================================================================
// Naming
// ============================================================================

/// Chooses the name of an extracted interface.
pub trait NamingStrategy {
    fn name(&self, pattern: &MethodPattern) -> String;
}

/// Common CamelCase suffix of the implementer names (`FileReader`,
/// `NetReader` -> `Reader`), else the first method name with an `-er`
/// suffix (`Close` -> `Closer`), else `Common`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNaming;

impl NamingStrategy for DefaultNaming {
    fn name(&self, pattern: &MethodPattern) -> String {
        let names: Vec<&str> = pattern.implementers.iter().map(|i| i.name.as_str()).collect();
        if let Some(suffix) = common_word_suffix(&names) {
            if !names.contains(&suffix.as_str()) && validate_identifier(&suffix).is_ok() {
                return suffix;
            }
        }
        if let Some(first) = pattern.methods.first() {
            let name = if first.name.ends_with('e') {
                format!("{}r", first.name)
            } else {
                format!("{}er", first.name)
            };
            if validate_identifier(&name).is_ok() {
                return name;
            }
        }
        FALLBACK_NAME.to_string()
    }
}

/// Split a CamelCase name into words: `HTTPServerConn` -> `HTTP`, `Server`, `Conn`.
fn camel_words(name: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = name.char_indices().collect();
    let mut words = Vec::new();
    let mut start = 0;
    for i in 1..chars.len() {
        let (at, c) = chars[i];
        let prev = chars[i - 1].1;
        let next_lower = chars.get(i + 1).is_some_and(|(_, n)| n.is_lowercase());
        if c.is_uppercase()
            && (prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower))
        {
            words.push(&name[start..at]);
            start = at;
        }
    }
    if start < name.len() {
        words.push(&name[start..]);
    }
    words
}

fn common_word_suffix(names: &[&str]) -> Option<String> {
    let split: Vec<Vec<&str>> = names.iter().map(|n| camel_words(n)).collect();
    let shortest = split.iter().map(Vec::len).min()?;
    let mut common = 0;
    while common < shortest {
        let word = split[0][split[0].len() - 1 - common];
        if split.iter().all(|w| w[w.len() - 1 - common] == word) {
            common += 1;
        } else {
            break;
        }
    }
    if common == 0 {
        return None;
    }
    let words = &split[0][split[0].len() - common..];
    let mut suffix = words.concat();
    if let Some(first) = suffix.get(..1) {
        suffix = first.to_uppercase() + &suffix[1..];
    }
    Some(suffix)
}

/// `ReadCloser` -> `read_closer`.
fn snake_case(name: &str) -> String {
    camel_words(name)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Render an interface declaration for `pattern`.
pub fn render_interface(name: &str, pattern: &MethodPattern) -> String {
    let implementers: Vec<&str> = pattern.implementers.iter().map(|i| i.name.as_str()).collect();
    let mut out = format!(
        "// {} is implemented by {}.\ntype {} interface {{\n",
        name,
        implementers.join(", "),
        name
    );
    for method in &pattern.methods {
        out.push('\t');
        out.push_str(&method.name);
        out.push_str(&method.signature);
        out.push('\n');
    }
    out.push_str("}\n");
    out
}

// ============================================================================
// Transformer
// ============================================================================

/// The interface extraction transformer.
pub struct ExtractInterfaces {
    options: ExtractionOptions,
    naming: Box<dyn NamingStrategy>,
}

impl ExtractInterfaces {
    pub fn new(options: ExtractionOptions) -> Self {
        ExtractInterfaces {
            options,
            naming: Box::new(DefaultNaming),
        }
    }

    /// Replace the naming strategy. An explicit interface name still wins.
    pub fn with_naming(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.naming = Box::new(naming);
        self
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    /// Decide every interface, its name and where it goes, without touching
    /// `module`. Appends to one file are planned against the file's text as
    /// the earlier appends leave it, so a dry run and a real run report the
    /// same changes.
    pub fn plan(&self, module: &Module) -> SymdexResult<ExtractionPlan> {
        let options = &self.options;
        options.validate()?;
        let target_package = match &options.target_package {
            Some(p) => Some(
                module
                    .find_package(p)
                    .map(|pkg| pkg.path.clone())
                    .ok_or_else(|| SymdexError::PackageNotFound { path: p.clone() })?,
            ),
            None => None,
        };
        let target_file = match &options.target_file {
            Some(path) => {
                let package = module
                    .package_of_file(path)
                    .ok_or_else(|| SymdexError::FileNotFound { path: path.clone() })?;
                if target_package.as_ref().is_some_and(|p| *p != package.path) {
                    return Err(SymdexError::invalid_options(format!(
                        "target file {} is not in package {}",
                        path, package.path
                    )));
                }
                Some(path.clone())
            }
            None => None,
        };

        let index = Index::build(
            module,
            &IndexOptions {
                include_tests: false,
                include_private: options.include_private,
            },
        )?;
        let patterns = discover(&index, options)?;
        drop(index);

        let mut plan = ExtractionPlan {
            patterns: patterns.len(),
            ..Default::default()
        };
        // Names taken by earlier patterns, per package.
        let mut claimed: BTreeSet<(String, String)> = BTreeSet::new();
        // Text of each appended file after the appends planned so far.
        let mut pending: BTreeMap<String, String> = BTreeMap::new();

        for pattern in &patterns {
            let Some(first) = pattern.implementers.first() else {
                continue;
            };
            let name = options
                .interface_name
                .clone()
                .unwrap_or_else(|| self.naming.name(pattern));
            let package_path = target_package
                .clone()
                .or_else(|| {
                    target_file
                        .as_ref()
                        .and_then(|f| module.package_of_file(f))
                        .map(|p| p.path.clone())
                })
                .unwrap_or_else(|| first.package.clone());
            let Some(package) = module.package(&package_path) else {
                return Err(SymdexError::PackageNotFound { path: package_path });
            };
            if package.declares(&name) || !claimed.insert((package_path.clone(), name.clone())) {
                tracing::warn!(interface = %name, package = %package_path, "interface name taken; skipped");
                plan.warnings.push(format!(
                    "skipped interface {}: {} already declared in {}",
                    name, name, package_path
                ));
                continue;
            }

            let rendered = render_interface(&name, pattern);
            let file_path = match &target_file {
                Some(path) => path.clone(),
                None if options.create_new_files => {
                    let dir = package.directory();
                    let file = format!("{}{}", snake_case(&name), SOURCE_SUFFIX);
                    if dir.is_empty() {
                        file
                    } else {
                        format!("{}/{}", dir, file)
                    }
                }
                None if first.package == package_path => first.file.clone(),
                None => match package.files.iter().find(|f| !f.is_test) {
                    Some(file) => file.path.clone(),
                    None => {
                        return Err(SymdexError::invalid_model(format!(
                            "package {} has no source file",
                            package_path
                        )))
                    }
                },
            };

            let existing = pending
                .get(&file_path)
                .cloned()
                .or_else(|| module.file(&file_path).map(|f| f.content.clone()));
            let planned = match existing {
                Some(mut content) => {
                    let edit = append_edit(&file_path, &content, &rendered);
                    let change = Change::from_edit(&edit, &content);
                    content.push_str(&edit.replacement);
                    pending.insert(file_path.clone(), content);
                    PlannedInterface {
                        name,
                        rendered,
                        change,
                        placement: Placement::Append(edit),
                    }
                }
                None => {
                    let content = format!("package {}\n\n{}", package.name, rendered);
                    pending.insert(file_path.clone(), content.clone());
                    PlannedInterface {
                        name,
                        rendered,
                        change: Change {
                            file: file_path.clone(),
                            line: 1,
                            column: 1,
                            original: String::new(),
                            new: content,
                        },
                        placement: Placement::Create {
                            package: package_path,
                        },
                    }
                }
            };
            plan.interfaces.push(planned);
        }
        Ok(plan)
    }

    fn run(&self, module: &mut Module) -> SymdexResult<TransformResult> {
        let plan = self.plan(module)?;
        if !self.options.dry_run {
            for planned in &plan.interfaces {
                match &planned.placement {
                    Placement::Append(edit) => append_interface(module, edit, &planned.rendered)?,
                    Placement::Create { package } => {
                        create_file(module, package, &planned.change.file, &planned.change.new)?
                    }
                }
                tracing::info!(
                    interface = %planned.name,
                    file = %planned.change.file,
                    "extracted interface"
                );
            }
        }

        let verb = if self.options.dry_run { "Would extract" } else { "Extracted" };
        let summary = if plan.interfaces.is_empty() {
            "No qualifying method patterns".to_string()
        } else {
            format!(
                "{} {} interface(s) from {} pattern(s); {} new file(s)",
                verb,
                plan.interfaces.len(),
                plan.patterns,
                plan.new_files().len()
            )
        };
        let changes = plan.interfaces.into_iter().map(|p| p.change).collect();
        Ok(TransformResult::succeeded(summary, changes, plan.warnings))
    }
}

/// What an extraction run will do.
#[derive(Debug, Clone, Default)]
pub struct ExtractionPlan {
    /// Qualifying patterns, including skipped ones.
    pub patterns: usize,
    /// Interfaces to declare, in pattern order.
    pub interfaces: Vec<PlannedInterface>,
    pub warnings: Vec<String>,
}

impl ExtractionPlan {
    /// Paths of the files the plan creates.
    pub fn new_files(&self) -> Vec<&str> {
        self.interfaces
            .iter()
            .filter(|p| matches!(p.placement, Placement::Create { .. }))
            .map(|p| p.change.file.as_str())
            .collect()
    }
}

/// One interface of an [`ExtractionPlan`].
#[derive(Debug, Clone)]
pub struct PlannedInterface {
    pub name: String,
    /// The declaration text.
    pub rendered: String,
    pub change: Change,
    pub placement: Placement,
}

/// Where a planned interface lands.
#[derive(Debug, Clone)]
pub enum Placement {
    /// Appended to an existing file.
    Append(Edit),
    /// Written to a new file of this package.
    Create { package: String },
}

impl Transformer for ExtractInterfaces {
    fn name(&self) -> &str {
        "extract_interfaces"
    }

    fn transform(&self, module: &mut Module) -> TransformResult {
        match self.run(module) {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(error = %err, "interface extraction rejected");
                TransformResult::failed(&err)
            }
        }
    }
}

/// Insertion of `rendered` at the end of `content`, separated by a blank line.
fn append_edit(path: &str, content: &str, rendered: &str) -> Edit {
    let separator = if content.ends_with('\n') { "\n" } else { "\n\n" };
    Edit::insert(
        path,
        content.len() as u64,
        format!("{}{}", separator, rendered),
    )
}

/// Apply a planned append and register the declaration it holds.
fn append_interface(module: &mut Module, edit: &Edit, rendered: &str) -> SymdexResult<()> {
    let path = edit.file.as_str();
    let Some(file) = module.file(path) else {
        return Err(SymdexError::FileNotFound {
            path: path.to_string(),
        });
    };
    let separator_len = edit.replacement.len() - rendered.len();
    let insert_at = edit.span.start + separator_len as u64;

    // Scan the declaration on its own, then move it to where it lands.
    let header = format!("package {}\n", file.package_name);
    let snippet = parse_file(path, &format!("{}{}", header, rendered))?;
    let delta = insert_at as i64 - header.len() as i64;

    apply_edits(module, std::slice::from_ref(edit))?;
    let Some(file) = module.file_mut(path) else {
        return Err(SymdexError::FileNotFound {
            path: path.to_string(),
        });
    };
    for (name, mut decl) in snippet.types {
        decl.walk_spans(&mut Shift(delta));
        file.types.insert(name, decl);
    }
    Ok(())
}

fn create_file(module: &mut Module, package: &str, path: &str, content: &str) -> SymdexResult<()> {
    let mut file = parse_file(path, content)?;
    file.modified = true;
    let Some(pkg) = module.package_mut(package) else {
        return Err(SymdexError::PackageNotFound {
            path: package.to_string(),
        });
    };
    pkg.files.push(file);
    pkg.modified = true;
    module.touch();
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
