//! Variant-aware dependency resolution and task wiring for Trellis.

#![forbid(unsafe_code)]

pub mod builder;
pub mod bundle;
pub mod cache;
pub mod classify;
pub mod error;
pub mod graph;
pub mod issue;
pub mod manager;
pub mod node;
pub mod prepare;
pub mod reconcile;
pub mod resolve;
pub mod session;
pub mod sync;
pub mod task;

pub use builder::{StepTaskBuilder, VariantTaskBuilder, VariantTaskContext};
pub use cache::{SharedArtifactCache, UnpackKey, UnpackOutcome};
pub use error::EngineError;
pub use graph::{ConfigurationResult, DependencyGraphProvider, ResolutionGraph};
pub use issue::{IssueKind, IssueRegistry, Severity, SyncIssue};
pub use manager::{ProjectModel, ResolveContext, VariantManager, VariantModel};
pub use prepare::{PrepareTask, PrepareTaskRegistry};
pub use reconcile::{DependencyReconciler, DependencyReport, ReconcileRequest, VariantDependencies};
pub use resolve::{PassSettings, ResolutionPass};
pub use session::{BuildSession, PrepareOutcome};
pub use sync::{clean, sync, LoadedProject, SyncOptions, SyncResult};
pub use task::{TaskGraph, TaskKey};
