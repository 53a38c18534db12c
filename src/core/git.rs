//! Read-only git queries used to derive version and repository coordinates.

use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::command;
use crate::version::RepositoryState;

/// Current branch name, or `None` on a detached HEAD or outside a repository.
pub fn current_branch(root: &Path) -> Option<String> {
    command::run_in_optional(root, "git", &["rev-parse", "--abbrev-ref", "HEAD"])
        .filter(|branch| branch != "HEAD")
}

pub fn head_commit(root: &Path) -> Option<String> {
    command::run_in_optional(root, "git", &["rev-parse", "HEAD"])
}

/// Most recent `v*` tag reachable from HEAD.
pub fn latest_version_tag(root: &Path) -> Option<String> {
    command::run_in_optional(
        root,
        "git",
        &["describe", "--tags", "--abbrev=0", "--match", "v[0-9]*"],
    )
}

pub fn remote_url(root: &Path, remote: &str) -> Result<String> {
    command::run_in(root, "git", &["remote", "get-url", remote], "git remote get-url")
        .map_err(|e| Error::git_command_failed(e.message))
}

/// Repository facts from git, each one optional.
pub fn repository_state(root: &Path) -> RepositoryState {
    RepositoryState {
        branch: current_branch(root),
        sha: head_commit(root),
        version: latest_version_tag(root),
    }
}
