//! Packaging stage: staged copies, version stamping and archiving.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::{archive, io};

/// Replace `placeholder` with the version inside a manifest file.
#[derive(Debug, Clone)]
pub struct ManifestStamp {
    pub file: PathBuf,
    pub placeholder: String,
}

/// The uploaded artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub path: String,
    pub files: usize,
    pub bytes: u64,
    pub sha256: String,
}

/// Copy `from` into `to`, replacing whatever `to` held.
pub fn stage(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        return Err(Error::deploy_packaging_failed(
            from.display().to_string(),
            "build output directory does not exist",
        ));
    }
    io::ensure_clean_dir(to, "stage build output")?;
    io::copy_dir_recursive(from, to, "stage build output")
}

/// Returns the number of placeholders replaced.
pub fn stamp_version(manifest: &ManifestStamp, version: &str) -> Result<usize> {
    if !manifest.file.is_file() {
        return Err(Error::deploy_packaging_failed(
            manifest.file.display().to_string(),
            "manifest not found",
        ));
    }
    let content = io::read_file(&manifest.file, "read manifest")?;
    let count = content.matches(manifest.placeholder.as_str()).count();
    if count > 0 {
        let stamped = content.replace(manifest.placeholder.as_str(), version);
        io::write_file(&manifest.file, &stamped, "stamp manifest")?;
    }
    Ok(count)
}

/// Archive a non-empty directory and digest the result.
pub fn build_artifact(source: &Path, dest: &Path) -> Result<Artifact> {
    let mut entries = fs::read_dir(source).map_err(|_| {
        Error::deploy_packaging_failed(source.display().to_string(), "source directory is missing")
    })?;
    if entries.next().is_none() {
        return Err(Error::deploy_packaging_failed(
            source.display().to_string(),
            "source directory is empty",
        ));
    }

    let summary = archive::zip_directory(source, dest)?;
    let sha256 = archive::sha256_file(dest)?;
    Ok(Artifact {
        path: summary.path,
        files: summary.files,
        bytes: summary.bytes,
        sha256,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stamp_replaces_every_placeholder() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("index.html");
        fs::write(&file, "<b>@@APP_VERSION@@</b><i>@@APP_VERSION@@</i>").unwrap();
        let manifest = ManifestStamp {
            file: file.clone(),
            placeholder: "@@APP_VERSION@@".into(),
        };

        assert_eq!(stamp_version(&manifest, "2.0.1").unwrap(), 2);
        assert_eq!(fs::read_to_string(&file).unwrap(), "<b>2.0.1</b><i>2.0.1</i>");
    }

    #[test]
    fn stamp_requires_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest = ManifestStamp {
            file: dir.path().join("index.html"),
            placeholder: "@@APP_VERSION@@".into(),
        };
        let err = stamp_version(&manifest, "1.0.0").unwrap_err();
        assert_eq!(err.code.as_str(), "deploy.packaging_failed");
    }

    #[test]
    fn empty_source_is_a_packaging_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("demo");
        fs::create_dir(&source).unwrap();

        let err = build_artifact(&source, &dir.path().join("out.zip")).unwrap_err();
        assert_eq!(err.code.as_str(), "deploy.packaging_failed");
        assert!(err.message.contains("empty"));

        let err = build_artifact(&dir.path().join("absent"), &dir.path().join("out.zip")).unwrap_err();
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn artifact_has_digest() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("demo");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("index.html"), "hi").unwrap();

        let artifact = build_artifact(&source, &dir.path().join("output/deployment.zip")).unwrap();
        assert_eq!(artifact.files, 1);
        assert_eq!(artifact.sha256.len(), 64);
    }

    #[test]
    fn stage_replaces_destination() {
        let dir = TempDir::new().unwrap();
        let dist = dir.path().join("dist");
        let target = dir.path().join("demo/dist");
        fs::create_dir_all(&dist).unwrap();
        fs::create_dir_all(&target).unwrap();
        fs::write(dist.join("app.js"), "new").unwrap();
        fs::write(target.join("stale.js"), "old").unwrap();

        stage(&dist, &target).unwrap();
        assert!(target.join("app.js").exists());
        assert!(!target.join("stale.js").exists());
    }
}
