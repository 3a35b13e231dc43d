//! SHA-256 digests for unpack markers and unpack keys.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::UtilError;

fn hex(hasher: Sha256) -> String {
    format!("{:x}", hasher.finalize())
}

/// Digest of a file's content, streamed.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn file_digest(path: &Path) -> Result<String, UtilError> {
    let io_err = |source| UtilError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher).map_err(io_err)?;
    Ok(hex(hasher))
}

/// Digest of an ordered list of strings. Each part is length-prefixed.
pub fn composite_digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex(hasher)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn file_digest_of_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.aar");
        std::fs::write(&file, b"").unwrap();
        assert_eq!(
            file_digest(&file).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn file_digest_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.aar");
        std::fs::write(&file, b"v1").unwrap();
        let first = file_digest(&file).unwrap();
        std::fs::write(&file, b"v2").unwrap();
        assert_ne!(first, file_digest(&file).unwrap());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = file_digest(Path::new("/nonexistent/lib.aar")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/lib.aar"));
    }

    #[test]
    fn composite_parts_do_not_run_together() {
        assert_ne!(composite_digest(&["ab", "c"]), composite_digest(&["a", "bc"]));
        assert_ne!(composite_digest(&["a", "b"]), composite_digest(&["b", "a"]));
    }
}
