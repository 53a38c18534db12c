//! Release notes from the changelog, published as a tagged release.

mod coordinates;
mod github;

use serde::Serialize;

use crate::changelog::{self, SectionSelector};
use crate::error::Result;

pub use coordinates::RepositoryCoordinates;
pub use github::{GitHubPublisher, GITHUB_API};

/// `## {tag}` followed by the entries, one per line, in their original order.
pub fn assemble<I, S>(tag: &str, entries: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut notes = format!("## {}", tag);
    for entry in entries {
        notes.push('\n');
        notes.push_str(entry.as_ref());
    }
    notes
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseNotes {
    pub tag: String,
    pub section: String,
    pub entries: Vec<String>,
    pub text: String,
}

/// Pick a changelog section and assemble its notes under `tag`.
pub fn notes_from_changelog(
    content: &str,
    selector: &SectionSelector,
    tag: &str,
) -> Result<ReleaseNotes> {
    let section = changelog::extract_section(content, selector)?;
    let entries: Vec<String> = section.entries().map(str::to_string).collect();
    Ok(ReleaseNotes {
        tag: tag.to_string(),
        section: section.label().to_string(),
        text: assemble(tag, &entries),
        entries,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseRequest {
    pub tag: String,
    /// Commit the tag is created at.
    pub commit: String,
    pub notes: String,
    pub repository: RepositoryCoordinates,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishedRelease {
    pub id: u64,
    pub tag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
}

/// One call per release; no retry. The credential lives in the implementation.
pub trait ReleasePublisher {
    fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease>;
}
