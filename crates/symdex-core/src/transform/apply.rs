//! Committing planned edits to a module.

use std::collections::BTreeMap;

use crate::error::SymdexResult;
use crate::model::{Module, SpanVisitor, WalkSpans};
use crate::patch::{detect_overlaps, Conflict, Edit, Span};

/// Apply `edits` to the files of `module`.
///
/// All edits are validated first (overlaps, missing files, stale content),
/// so a rejected plan changes nothing. Each file then has its edits spliced
/// in, every span of its declarations and syntax moved to the new text,
/// names whose span was replaced updated, and its declaration maps rekeyed.
/// Returns the modified file paths in order.
pub fn apply_edits(module: &mut Module, edits: &[Edit]) -> SymdexResult<Vec<String>> {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by(|a, b| (&a.file, a.span).cmp(&(&b.file, b.span)));
    sorted.dedup_by(|a, b| a.file == b.file && a.span == b.span && a.replacement == b.replacement);

    let owned: Vec<Edit> = sorted.iter().map(|e| (*e).clone()).collect();
    if let Some(conflict) = detect_overlaps(&owned).into_iter().next() {
        return Err(conflict.into());
    }

    let mut by_file: BTreeMap<&str, Vec<&Edit>> = BTreeMap::new();
    for edit in sorted {
        by_file.entry(edit.file.as_str()).or_default().push(edit);
    }
    for (path, file_edits) in &by_file {
        let Some(file) = module.file(path) else {
            return Err(Conflict::FileMissing {
                file: path.to_string(),
            }
            .into());
        };
        for edit in file_edits {
            edit.check(&file.content)?;
        }
    }

    let mut modified = Vec::new();
    for (path, file_edits) in by_file {
        let Some(file) = module.file_mut(path) else {
            continue;
        };
        let mut content = file.content.clone();
        for edit in file_edits.iter().rev() {
            content.replace_range(edit.span.range(), &edit.replacement);
        }
        file.content = content;
        file.walk_spans(&mut Remap { edits: &file_edits });
        file.rekey();
        module.mark_modified(path);
        tracing::debug!(file = path, edits = file_edits.len(), "applied edits");
        modified.push(path.to_string());
    }
    module.touch();
    Ok(modified)
}

/// Moves spans planned against the old text onto the new text.
struct Remap<'e> {
    /// Edits of one file, sorted by span.
    edits: &'e [&'e Edit],
}

impl Remap<'_> {
    fn offset(&self, offset: u64) -> u64 {
        let delta: i64 = self
            .edits
            .iter()
            .filter(|e| {
                if e.span.is_empty() {
                    offset > e.span.start
                } else {
                    e.span.end <= offset
                }
            })
            .map(|e| e.delta())
            .sum();
        (offset as i64 + delta).max(0) as u64
    }
}

impl SpanVisitor for Remap<'_> {
    fn visit_span(&mut self, span: &mut Span) {
        *span = Span::new(self.offset(span.start), self.offset(span.end));
    }

    fn visit_name(&mut self, name: &mut String, span: Span) {
        if let Some(edit) = self
            .edits
            .iter()
            .find(|e| !e.span.is_empty() && e.span == span)
        {
            *name = edit.replacement.clone();
        }
    }
}
