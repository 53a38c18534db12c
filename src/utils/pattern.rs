//! Path pattern expansion with glob support.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Expand root-relative patterns into existing paths.
///
/// - Literal paths (no `*`, `?`, `[`, `]`) are returned when they exist
/// - Glob patterns expand to every match, in sorted order
/// - Patterns matching nothing contribute nothing
pub fn expand_under(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();

    for pattern in patterns {
        let joined = root.join(pattern);
        if !contains_glob_chars(pattern) {
            if joined.exists() {
                matches.push(joined);
            }
            continue;
        }

        let text = joined.to_string_lossy().into_owned();
        let mut found: Vec<PathBuf> = glob::glob(&text)
            .map_err(|e| {
                Error::validation_invalid_argument(
                    "clean",
                    format!("Invalid glob pattern '{}': {}", pattern, e),
                    Some(pattern.clone()),
                    None,
                )
            })?
            .filter_map(|entry| entry.ok())
            .collect();
        found.sort();
        matches.extend(found);
    }

    matches.dedup();
    Ok(matches)
}

fn contains_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[') || s.contains(']')
}
