//! Unified diff generation utilities.
//!
//! Renders the changes of a transformation in unified diff format, one
//! hunk per change. Hunks show the replaced and replacing text only, not
//! surrounding context lines.

use std::collections::BTreeMap;

use crate::transform::Change;

/// Generate a unified diff from `changes`.
///
/// Files appear in path order and hunks in line order. A change spanning
/// several lines produces one `-`/`+` line per line of text; insertions
/// have an empty `-` side.
pub fn generate_unified_diff(changes: &[Change]) -> String {
    let mut by_file: BTreeMap<&str, Vec<&Change>> = BTreeMap::new();
    for change in changes {
        by_file.entry(&change.file).or_default().push(change);
    }

    let mut diff = String::new();
    for (file, mut file_changes) in by_file {
        file_changes.sort_by_key(|c| (c.line, c.column));
        diff.push_str(&format!("--- a/{}\n", file));
        diff.push_str(&format!("+++ b/{}\n", file));

        for change in file_changes {
            let removed = split_lines(&change.original);
            let added = split_lines(&change.new);
            diff.push_str(&format!(
                "@@ -{},{} +{},{} @@\n",
                change.line,
                removed.len(),
                change.line,
                added.len()
            ));
            for line in removed {
                diff.push_str(&format!("-{}\n", line));
            }
            for line in added {
                diff.push_str(&format!("+{}\n", line));
            }
        }
    }

    diff
}

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.trim_end_matches('\n').split('\n').collect()
}

// ============================================================================
// Tests
// ============================================================================
