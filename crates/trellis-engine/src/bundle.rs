//! Unpacks library bundles into their exploded directories.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::prepare::PrepareTask;

const METADATA_FILE: &str = ".trellis-unpack.toml";

/// Recorded next to an unpacked bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpackMetadata {
    /// Bundle file the directory was unpacked from.
    pub source: String,
    /// SHA-256 of the bundle at unpack time.
    pub sha256: String,
}

/// Whether `unpack` touched the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackStatus {
    Extracted { files: usize },
    UpToDate,
}

/// Unpacks one bundle. Skips the work when the directory already holds
/// the same bundle content.
///
/// # Errors
/// Returns an error if the bundle cannot be hashed or extracted, or the
/// metadata cannot be written.
pub fn unpack(task: &PrepareTask) -> Result<UnpackStatus, EngineError> {
    let sha256 = trellis_util::hash::file_digest(&task.bundle)?;
    let source = task.bundle.display().to_string();
    let metadata_path = task.exploded_dir.join(METADATA_FILE);

    if let Some(existing) = read_metadata(&metadata_path) {
        if existing.sha256 == sha256 && existing.source == source {
            tracing::debug!("{} is up to date", task.coordinate);
            return Ok(UnpackStatus::UpToDate);
        }
    }

    // Stale content from an older bundle must not survive.
    trellis_util::fs::remove_dir_all_if_exists(&task.exploded_dir)?;
    let files = trellis_util::archive::extract_zip(&task.bundle, &task.exploded_dir)?;

    let metadata = UnpackMetadata { source, sha256 };
    let metadata_toml = toml::to_string_pretty(&metadata).map_err(|e| EngineError::Metadata {
        message: e.to_string(),
    })?;
    trellis_util::fs::write_atomic(&metadata_path, metadata_toml.as_bytes())?;

    Ok(UnpackStatus::Extracted { files })
}

fn read_metadata(path: &Path) -> Option<UnpackMetadata> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use trellis_util::ModuleCoordinate;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    use super::*;
    use crate::node::BundleData;

    fn write_bundle(path: &Path, classes: &[u8]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file("AndroidManifest.xml", FileOptions::default())
            .unwrap();
        zip.write_all(b"<manifest package=\"com.example.ui\"/>").unwrap();
        zip.start_file("classes.jar", FileOptions::default()).unwrap();
        zip.write_all(classes).unwrap();
        zip.start_file("libs/extra.jar", FileOptions::default()).unwrap();
        zip.write_all(b"extra").unwrap();
        zip.finish().unwrap();
    }

    fn task(bundle: PathBuf, exploded_dir: PathBuf) -> PrepareTask {
        PrepareTask {
            name: "prepareGUi1Library".to_owned(),
            coordinate: ModuleCoordinate::new("g", "ui", "1"),
            bundle,
            exploded_dir,
        }
    }

    #[test]
    fn unpacks_bundle_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = tmp.path().join("ui.aar");
        write_bundle(&bundle, b"classes");
        let exploded = tmp.path().join("exploded/g/ui/1");

        let status = unpack(&task(bundle, exploded.clone())).unwrap();
        assert_eq!(status, UnpackStatus::Extracted { files: 3 });

        let data = BundleData {
            exploded_dir: exploded.clone(),
        };
        assert!(data.manifest().is_file());
        assert_eq!(
            data.bundled_archives(),
            [exploded.join("classes.jar"), exploded.join("libs/extra.jar")]
        );
    }

    #[test]
    fn unchanged_bundle_is_not_unpacked_again() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = tmp.path().join("ui.aar");
        write_bundle(&bundle, b"classes");
        let t = task(bundle, tmp.path().join("exploded"));

        unpack(&t).unwrap();
        assert_eq!(unpack(&t).unwrap(), UnpackStatus::UpToDate);
    }

    #[test]
    fn changed_bundle_replaces_stale_content() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = tmp.path().join("ui.aar");
        write_bundle(&bundle, b"v1");
        let exploded = tmp.path().join("exploded");
        let t = task(bundle.clone(), exploded.clone());
        unpack(&t).unwrap();
        std::fs::write(exploded.join("stale.txt"), b"old").unwrap();

        write_bundle(&bundle, b"v2");
        assert!(matches!(unpack(&t).unwrap(), UnpackStatus::Extracted { .. }));
        assert!(!exploded.join("stale.txt").exists());
        assert_eq!(std::fs::read(exploded.join("classes.jar")).unwrap(), b"v2");
    }

    #[test]
    fn missing_bundle_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let t = task(tmp.path().join("absent.aar"), tmp.path().join("exploded"));
        let err = unpack(&t).unwrap_err();
        assert!(err.to_string().contains("absent.aar"), "error was: {err}");
    }
}
