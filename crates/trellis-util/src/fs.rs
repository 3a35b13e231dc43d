//! Filesystem utilities for Trellis.

use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Remove a directory and all its contents. No error if the directory is absent.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Write `content` to `path` through a sibling temp file and a rename.
///
/// # Errors
/// Returns an error if the temp file cannot be written or renamed.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), UtilError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, content).map_err(|source| UtilError::Io {
        path: tmp_path.display().to_string(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// A stable string key for `path`.
///
/// Existing paths are canonicalized. Paths that do not exist yet (unpack
/// destinations) are made absolute against the current directory instead.
pub fn canonical_key(path: &Path) -> String {
    if let Ok(canonical) = path.canonicalize() {
        return canonical.display().to_string();
    }
    if path.is_absolute() {
        return path.display().to_string();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path).display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

/// Expand glob `patterns` relative to `root` into a sorted, deduplicated file list.
///
/// A pattern without glob metacharacters names one file and is kept even
/// when it does not exist, so a missing local dependency still shows up.
///
/// # Errors
/// Returns an error if a pattern is not a valid glob.
pub fn expand_globs(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, UtilError> {
    let mut files = Vec::new();
    for pattern in patterns {
        let full = root.join(pattern);
        if !pattern.contains(['*', '?', '[']) {
            files.push(full);
            continue;
        }
        let full_str = full.display().to_string();
        let matches = glob::glob(&full_str).map_err(|e| UtilError::GlobPattern {
            pattern: full_str.clone(),
            message: e.to_string(),
        })?;
        let mut matched: Vec<PathBuf> = matches
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        matched.sort();
        files.extend(matched);
    }
    let mut seen = std::collections::HashSet::new();
    files.retain(|f| seen.insert(f.clone()));
    Ok(files)
}
