//! Filesystem helpers: ignore-filtered recursive copy, recursive remove,
//! and symlinks.
//!
//! All walks are sorted by file name so copy order, and anything derived
//! from it, is deterministic across platforms.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::ignore::IgnorePatterns;

/// Recursively copy `from` into `to`, skipping every basename the ignore
/// list matches. Returns the forward-slash relative paths of the copied
/// files, in walk order.
pub fn copy_tree(from: &Path, to: &Path, ignores: &IgnorePatterns) -> Result<Vec<String>> {
    let mut copied = Vec::new();
    let walker = WalkDir::new(from)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !ignores.matches(&entry.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| from.to_path_buf());
            Error::io(path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .expect("walked entries live under the walk root");
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| Error::io(&target, e))?;
            copied.push(rel_to_string(rel));
        }
    }
    Ok(copied)
}

/// Remove a path if it exists, whether file, symlink, or directory tree.
pub fn remove_tree(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(path, e)),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::io(path, e))
}

/// Write a file, creating parent directories as needed.
pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, data).map_err(|e| Error::io(path, e))
}

/// Symlink a directory, replacing nothing; the target must not exist.
#[cfg(unix)]
pub fn symlink_dir(source: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, target).map_err(|e| Error::io(target, e))
}

#[cfg(windows)]
pub fn symlink_dir(source: &Path, target: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(source, target).map_err(|e| Error::io(target, e))
}

fn rel_to_string(rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

/// Collect the relative forward-slash paths of all files under `root`
/// with one of the given extensions, ignore-filtered and sorted.
pub fn scan_sources(
    root: &Path,
    ignores: &IgnorePatterns,
    extensions: &[&str],
    skip_dirs: &[&str],
) -> Result<Vec<String>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if ignores.matches(&name) {
                return false;
            }
            // Top-level directories with special meaning are not sources.
            !(entry.depth() == 1 && entry.file_type().is_dir() && skip_dirs.contains(&name.as_ref()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            Error::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !extensions.contains(&ext.as_str()) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walked entries live under the walk root");
        found.push(rel_to_string(rel));
    }
    Ok(found)
}

/// `PathBuf::from` with forward slashes honoured on every platform.
pub fn path_from_slash(rel: &str) -> PathBuf {
    rel.split('/').collect()
}
