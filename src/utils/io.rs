//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents, mapping failures to `Error::internal_io`.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Write content to file, mapping failures to `Error::internal_io`.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Delete a file or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path, operation: &str) -> Result<bool> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return Ok(false);
    };

    result.map(|_| true).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Delete a directory if present, then create it empty.
pub fn ensure_clean_dir(path: &Path, operation: &str) -> Result<()> {
    remove_path(path, operation)?;
    fs::create_dir_all(path).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Copy a file, creating the destination's parent directories.
pub fn copy_file(from: &Path, to: &Path, operation: &str) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::internal_io(
                format!("{}: {}", parent.display(), e),
                Some(operation.to_string()),
            )
        })?;
    }
    fs::copy(from, to).map(|_| ()).map_err(|e| {
        Error::internal_io(
            format!("{} -> {}: {}", from.display(), to.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Recursively copy a directory tree into `to`, merging with existing content.
pub fn copy_dir_recursive(from: &Path, to: &Path, operation: &str) -> Result<()> {
    let entries = fs::read_dir(from).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", from.display(), e),
            Some(operation.to_string()),
        )
    })?;

    fs::create_dir_all(to).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", to.display(), e),
            Some(operation.to_string()),
        )
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))?;
        let source = entry.path();
        let dest = to.join(entry.file_name());
        if source.is_dir() {
            copy_dir_recursive(&source, &dest, operation)?;
        } else {
            copy_file(&source, &dest, operation)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn read_file_succeeds_for_existing_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "test content").unwrap();

        let content = read_file(temp.path(), "test read").unwrap();
        assert!(content.contains("test content"));
    }

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let err = read_file(Path::new("/nonexistent/path.txt"), "test read").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn remove_path_ignores_missing() {
        let dir = TempDir::new().unwrap();
        assert!(!remove_path(&dir.path().join("nope"), "test").unwrap());
    }

    #[test]
    fn ensure_clean_dir_empties_existing_dir() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("output");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.zip"), b"x").unwrap();

        ensure_clean_dir(&out, "test").unwrap();

        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn copy_dir_recursive_copies_nested_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("dist");
        fs::create_dir_all(src.join("assets")).unwrap();
        fs::write(src.join("index.js"), "js").unwrap();
        fs::write(src.join("assets/app.css"), "css").unwrap();

        let dest = dir.path().join("demo/dist");
        copy_dir_recursive(&src, &dest, "test").unwrap();

        assert_eq!(fs::read_to_string(dest.join("index.js")).unwrap(), "js");
        assert_eq!(fs::read_to_string(dest.join("assets/app.css")).unwrap(), "css");
    }
}
