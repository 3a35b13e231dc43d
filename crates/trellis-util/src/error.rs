//! Error types for trellis-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A glob pattern was invalid.
    #[error("invalid glob pattern `{pattern}`: {message}")]
    GlobPattern { pattern: String, message: String },

    /// A module coordinate string is malformed.
    #[error("invalid module coordinate \"{coordinate}\": {reason}")]
    InvalidCoordinate { coordinate: String, reason: String },

    /// A path segment cannot be turned into a safe directory name.
    #[error("cannot normalize path segment \"{segment}\"")]
    UnnormalizableSegment { segment: String },

    /// A zip archive could not be read.
    #[error("cannot read archive {path}: {message}")]
    Archive { path: String, message: String },

    /// A zip entry would be written outside the destination directory.
    #[error("archive {path} contains unsafe entry `{entry}`")]
    UnsafeArchiveEntry { path: String, entry: String },
}
