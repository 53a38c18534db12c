//! Section lookup in `## <label>` structured changelogs.
//!
//! Sections are most-recent-first. A section's entries are the non-blank lines
//! between its header and the next `## ` header (or end of document).

use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::io;

const SECTION_PREFIX: &str = "## ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum SectionSelector {
    /// The first section in the document.
    Latest,
    /// The section whose label matches, ignoring brackets, a `v` prefix and a trailing date.
    Named(String),
}

impl SectionSelector {
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim).filter(|l| !l.is_empty()) {
            Some(label) => SectionSelector::Named(label.to_string()),
            None => SectionSelector::Latest,
        }
    }

    fn describe(&self) -> String {
        match self {
            SectionSelector::Latest => "latest".to_string(),
            SectionSelector::Named(label) => label.clone(),
        }
    }
}

/// A located section. Cheap to copy; [`Section::entries`] can be called any
/// number of times and walks the body lazily each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    label: &'a str,
    body: &'a str,
}

impl<'a> Section<'a> {
    /// Header text after `## `.
    pub fn label(&self) -> &'a str {
        self.label
    }

    /// Label with brackets, a `v` prefix and any ` - date` suffix removed.
    pub fn version(&self) -> &'a str {
        normalize_label(self.label)
    }

    pub fn entries(&self) -> impl Iterator<Item = &'a str> + Clone + 'a {
        self.body
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
    }
}

impl<'a> IntoIterator for Section<'a> {
    type Item = &'a str;
    type IntoIter = Box<dyn Iterator<Item = &'a str> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.entries())
    }
}

fn normalize_label(label: &str) -> &str {
    let head = label.split(" - ").next().unwrap_or(label).trim();
    let head = head.trim_start_matches('[');
    let head = head.split(']').next().unwrap_or(head).trim();
    head.strip_prefix('v').unwrap_or(head)
}

/// Header label at a line start, if the line is a section header.
fn header_label(line: &str) -> Option<&str> {
    line.strip_prefix(SECTION_PREFIX).map(str::trim)
}

pub fn extract_section<'a>(content: &'a str, selector: &SectionSelector) -> Result<Section<'a>> {
    let wanted = match selector {
        SectionSelector::Latest => None,
        SectionSelector::Named(label) => Some(normalize_label(label.trim())),
    };

    let mut offset = 0;
    let mut found: Option<(&str, usize)> = None;
    for line in content.split_inclusive('\n') {
        let next = offset + line.len();
        let text = line.trim_end_matches(['\n', '\r']);
        if let Some(label) = header_label(text) {
            if let Some((found_label, start)) = found {
                return Ok(Section {
                    label: found_label,
                    body: &content[start..offset],
                });
            }
            let matches = wanted.map_or(true, |w| normalize_label(label) == w);
            if matches {
                found = Some((label, next));
            }
        }
        offset = next;
    }

    match found {
        Some((label, start)) => Ok(Section {
            label,
            body: &content[start..],
        }),
        None => Err(Error::changelog_section_not_found(selector.describe(), None)),
    }
}

/// Read a changelog file; a missing file is reported as a missing section.
pub fn read(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::changelog_section_not_found(
            "latest",
            Some(path.display().to_string()),
        )
        .with_hint(format!("No changelog at {}", path.display())));
    }
    io::read_file(path, "read changelog")
}
