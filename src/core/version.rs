//! Version descriptor derived once per run from repository state.

use semver::{BuildMetadata, Prerelease, Version};
use serde::Serialize;

use crate::error::{Error, Result};

const FALLBACK_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDescriptor {
    pub branch: String,
    pub sha: String,
    #[serde(serialize_with = "serialize_version")]
    pub version: Version,
    pub release_branch: bool,
}

fn serialize_version<S: serde::Serializer>(v: &Version, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_string())
}

/// Raw repository facts a descriptor is built from.
#[derive(Debug, Clone, Default)]
pub struct RepositoryState {
    pub branch: Option<String>,
    pub sha: Option<String>,
    /// Version text, either a plain semver or a `v`-prefixed tag.
    pub version: Option<String>,
}

impl VersionDescriptor {
    pub fn derive(state: RepositoryState, release_branches: &[String]) -> Result<Self> {
        let branch = state
            .branch
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| "HEAD".to_string());
        let sha = state.sha.unwrap_or_default();
        let raw = state.version.unwrap_or_else(|| FALLBACK_VERSION.to_string());
        let version = parse_version(&raw)?;
        let release_branch = is_release_branch(&branch, release_branches);

        Ok(Self {
            branch,
            sha,
            version,
            release_branch,
        })
    }

    pub fn major_minor_patch(&self) -> String {
        format!(
            "{}.{}.{}",
            self.version.major, self.version.minor, self.version.patch
        )
    }

    /// Tag used for GitHub releases, e.g. `v1.2.0`.
    pub fn release_tag(&self) -> String {
        format!("v{}", self.major_minor_patch())
    }

    /// Version stamped into packages and deployments.
    ///
    /// Release branches publish the plain version; any other branch gets a
    /// prerelease built from the branch slug and short SHA.
    pub fn package_version(&self) -> String {
        if self.release_branch {
            return self.major_minor_patch();
        }

        let mut version = Version::new(self.version.major, self.version.minor, self.version.patch);
        let mut pre = slugify_branch(&self.branch);
        let short = self.short_sha();
        if !short.is_empty() && short.chars().all(|c| c.is_ascii_alphanumeric()) {
            pre = format!("{}.g{}", pre, short);
        }
        version.pre = Prerelease::new(&pre)
            .or_else(|_| Prerelease::new("branch"))
            .unwrap_or(Prerelease::EMPTY);
        version.build = BuildMetadata::EMPTY;
        version.to_string()
    }

    /// First seven characters of the commit SHA.
    pub fn short_sha(&self) -> &str {
        match self.sha.char_indices().nth(7) {
            Some((end, _)) => &self.sha[..end],
            None => &self.sha,
        }
    }
}

fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let text = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(text).map_err(|e| {
        Error::config_invalid_value(
            "version",
            Some(raw.to_string()),
            format!("Invalid semantic version '{}': {}", raw, e),
        )
    })
}

/// Branch match that treats `origin/<name>` as `<name>`.
pub fn is_release_branch(branch: &str, release_branches: &[String]) -> bool {
    let normalized = branch.strip_prefix("origin/").unwrap_or(branch);
    release_branches
        .iter()
        .any(|b| b.strip_prefix("origin/").unwrap_or(b) == normalized)
}

fn slugify_branch(branch: &str) -> String {
    let slug: String = branch
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "branch".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branches() -> Vec<String> {
        vec!["master".to_string(), "main".to_string()]
    }

    fn state(branch: &str, version: &str) -> RepositoryState {
        RepositoryState {
            branch: Some(branch.to_string()),
            sha: Some("0123456789abcdef".to_string()),
            version: Some(version.to_string()),
        }
    }

    #[test]
    fn release_branch_gets_plain_version() {
        let d = VersionDescriptor::derive(state("master", "v1.2.0"), &branches()).unwrap();
        assert!(d.release_branch);
        assert_eq!(d.package_version(), "1.2.0");
        assert_eq!(d.release_tag(), "v1.2.0");
    }

    #[test]
    fn origin_prefixed_branch_counts_as_release() {
        let d = VersionDescriptor::derive(state("origin/master", "1.2.0"), &branches()).unwrap();
        assert!(d.release_branch);
    }

    #[test]
    fn feature_branch_gets_prerelease() {
        let d = VersionDescriptor::derive(state("feature/Fancy_UI", "1.2.0"), &branches()).unwrap();
        assert!(!d.release_branch);
        assert_eq!(d.package_version(), "1.2.0-feature-fancy-ui.g0123456");
    }

    #[test]
    fn missing_version_falls_back() {
        let d = VersionDescriptor::derive(RepositoryState::default(), &branches()).unwrap();
        assert_eq!(d.major_minor_patch(), "0.1.0");
        assert_eq!(d.branch, "HEAD");
        assert_eq!(d.package_version(), "0.1.0-head");
    }

    #[test]
    fn invalid_version_is_config_error() {
        let err = VersionDescriptor::derive(state("master", "one.two"), &branches()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn non_ascii_sha_override_does_not_panic() {
        let d = VersionDescriptor::derive(
            RepositoryState {
                branch: Some("dev".to_string()),
                sha: Some("ééééééééé".to_string()),
                version: Some("1.2.0".to_string()),
            },
            &branches(),
        )
        .unwrap();
        assert_eq!(d.short_sha(), "ééééééé");
        assert_eq!(d.package_version(), "1.2.0-dev");
    }

    #[test]
    fn short_sha_keeps_short_values_whole() {
        let mut d = VersionDescriptor::derive(state("dev", "1.0.0"), &branches()).unwrap();
        d.sha = "abc".to_string();
        assert_eq!(d.short_sha(), "abc");
        assert_eq!(d.package_version(), "1.0.0-dev.gabc");
    }
}
