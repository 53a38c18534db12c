use std::fmt;

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

/// `owner/name` of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryCoordinates {
    pub owner: String,
    pub name: String,
}

const SLUG: &str = r"^(?P<owner>[A-Za-z0-9_.-]+)/(?P<name>[A-Za-z0-9_.-]+?)(?:\.git)?/?$";
const REMOTE: &str =
    r"^(?:https?://(?:[^@/]+@)?|ssh://(?:[^@/]+@)?|[^@/]+@)[^/:]+[:/](?P<owner>[A-Za-z0-9_.-]+)/(?P<name>[A-Za-z0-9_.-]+?)(?:\.git)?/?$";

impl RepositoryCoordinates {
    /// Accepts `owner/name`, an https remote URL or an scp/ssh remote URL.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        for pattern in [SLUG, REMOTE] {
            let re = Regex::new(pattern)
                .map_err(|e| Error::internal_unexpected(format!("Invalid pattern: {}", e)))?;
            if let Some(caps) = re.captures(value) {
                return Ok(Self {
                    owner: caps["owner"].to_string(),
                    name: caps["name"].to_string(),
                });
            }
        }

        Err(Error::validation_invalid_argument(
            "repository",
            format!("Cannot read owner/name from '{}'", value),
            None,
            None,
        )
        .with_hint("Set 'repository' to owner/name"))
    }
}

impl fmt::Display for RepositoryCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
