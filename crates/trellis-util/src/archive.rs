//! Zip extraction for library bundles.

use std::fs::File;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::error::UtilError;
use crate::fs::ensure_dir;

/// Extract every entry of the zip at `archive` into `dest`.
///
/// Entries whose names would escape `dest` (absolute paths, `..`) are
/// rejected before anything is written for them. Returns the number of
/// files written.
///
/// # Errors
/// Returns an error if the archive cannot be opened or read, contains an
/// unsafe entry, or a file cannot be written.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<usize, UtilError> {
    let archive_display = archive.display().to_string();
    let file = File::open(archive).map_err(|source| UtilError::Io {
        path: archive_display.clone(),
        source,
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| UtilError::Archive {
        path: archive_display.clone(),
        message: e.to_string(),
    })?;

    ensure_dir(dest)?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| UtilError::Archive {
            path: archive_display.clone(),
            message: e.to_string(),
        })?;

        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(UtilError::UnsafeArchiveEntry {
                path: archive_display,
                entry: entry.name().to_owned(),
            });
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            ensure_dir(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            ensure_dir(parent)?;
        }
        let mut out_file = File::create(&out_path).map_err(|source| UtilError::Io {
            path: out_path.display().to_string(),
            source,
        })?;
        io::copy(&mut entry, &mut out_file).map_err(|source| UtilError::Io {
            path: out_path.display().to_string(),
            source,
        })?;
        written += 1;
    }

    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use zip::write::FileOptions;
    use zip::ZipWriter;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_nested_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let aar = tmp.path().join("lib.aar");
        write_zip(
            &aar,
            &[
                ("AndroidManifest.xml", b"<manifest/>"),
                ("classes.jar", b"jar"),
                ("libs/extra.jar", b"extra"),
            ],
        );

        let dest = tmp.path().join("out");
        let count = extract_zip(&aar, &dest).unwrap();
        assert_eq!(count, 3);
        assert_eq!(std::fs::read(dest.join("libs/extra.jar")).unwrap(), b"extra");
    }

    #[test]
    fn rejects_parent_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let aar = tmp.path().join("evil.aar");
        write_zip(&aar, &[("../escape.txt", b"x")]);

        let dest = tmp.path().join("out");
        let err = extract_zip(&aar, &dest).unwrap_err();
        assert!(err.to_string().contains("unsafe entry"), "error was: {err}");
        assert!(!tmp.path().join("escape.txt").exists());
    }

    #[test]
    fn rejects_non_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join("bogus.aar");
        std::fs::write(&bogus, b"not a zip").unwrap();

        let err = extract_zip(&bogus, &tmp.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("cannot read archive"), "error was: {err}");
    }
}
