//! Error types for trellis-engine.

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] trellis_util::error::UtilError),

    /// A manifest operation failed.
    #[error("{0}")]
    Manifest(#[from] trellis_config::manifest::ManifestError),

    /// The resolution snapshot could not be loaded.
    #[error("{0}")]
    GraphFile(#[from] trellis_config::graph::GraphFileError),

    /// Build dimensions are declared inconsistently.
    #[error("{0}")]
    Variant(#[from] trellis_variant::VariantError),

    /// Sub-projects depend on each other in a loop.
    #[error("circular reference between projects: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// The resolution snapshot references a component it does not declare.
    #[error("component `{coordinate}` referenced by {referenced_by} is not declared in the resolution graph")]
    UnknownComponent {
        coordinate: String,
        referenced_by: String,
    },

    /// The resolution snapshot declares a component twice.
    #[error("component `{coordinate}` is declared more than once in the resolution graph")]
    DuplicateComponent { coordinate: String },

    /// A task edge points at a task that was never declared.
    #[error("task `{from}` depends on undeclared task `{to}`")]
    UnknownTask { from: String, to: String },

    /// No task has the requested name.
    #[error("task `{name}` not found")]
    TaskNotFound { name: String },

    /// Task dependencies form a loop.
    #[error("task dependency cycle: {}", .cycle.join(" -> "))]
    TaskCycle { cycle: Vec<String> },

    /// A reconciler only resolves one variant.
    #[error("dependency reconciler already used (state: {state})")]
    ReconcilerReused { state: String },

    /// No variant has the requested name.
    #[error("unknown variant `{name}`")]
    UnknownVariant { name: String },

    /// Unpacking a library bundle failed, here or in another worker.
    #[error("cannot unpack {key}: {message}")]
    UnpackFailed { key: String, message: String },

    /// Dependency problems were found while processing every variant.
    #[error("sync failed with {count} dependency issue(s)")]
    SyncFailed { count: usize },

    /// Unpack metadata could not be written.
    #[error("cannot process unpack metadata: {message}")]
    Metadata { message: String },
}
