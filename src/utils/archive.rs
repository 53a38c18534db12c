//! Zip archive creation and artifact digests.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub path: String,
    pub files: usize,
    pub bytes: u64,
}

fn zip_error(dest: &Path, e: zip::result::ZipError) -> Error {
    Error::internal_io(
        format!("{}: {}", dest.display(), e),
        Some("write archive".to_string()),
    )
}

fn io_error(path: &Path, e: io::Error) -> Error {
    Error::internal_io(
        format!("{}: {}", path.display(), e),
        Some("write archive".to_string()),
    )
}

/// Archive the contents of `source` (not the directory itself) into `dest`.
///
/// Entry names are relative to `source` and always use `/` separators.
/// Entries are written in sorted order so identical trees give identical listings.
pub fn zip_directory(source: &Path, dest: &Path) -> Result<ArchiveSummary> {
    let mut entries = Vec::new();
    collect_entries(source, source, &mut entries)?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let file = File::create(dest).map_err(|e| io_error(dest, e))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut files = 0;

    for (path, name) in &entries {
        if path.is_dir() {
            zip.add_directory(format!("{}/", name), options)
                .map_err(|e| zip_error(dest, e))?;
            continue;
        }

        zip.start_file(name.as_str(), options)
            .map_err(|e| zip_error(dest, e))?;
        let mut input = File::open(path).map_err(|e| io_error(path, e))?;
        io::copy(&mut input, &mut zip).map_err(|e| io_error(path, e))?;
        files += 1;
    }

    zip.finish().map_err(|e| zip_error(dest, e))?;

    let bytes = fs::metadata(dest).map_err(|e| io_error(dest, e))?.len();

    Ok(ArchiveSummary {
        path: dest.display().to_string(),
        files,
        bytes,
    })
}

fn collect_entries(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, String)>) -> Result<()> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| io_error(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    children.sort();

    for child in children {
        let name = child
            .strip_prefix(root)
            .unwrap_or(&child)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if child.is_dir() {
            out.push((child.clone(), name));
            collect_entries(root, &child, out)?;
        } else {
            out.push((child, name));
        }
    }

    Ok(())
}

/// Lowercase hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf).map_err(|e| io_error(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
