//! Project sync: load the manifest and snapshot, resolve every variant,
//! wire the task graph, and optionally unpack library bundles.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use trellis_config::graph::GraphFile;
use trellis_config::manifest::{Manifest, SyncMode, MANIFEST_FILE};

use crate::builder::StepTaskBuilder;
use crate::error::EngineError;
use crate::graph::ResolutionGraph;
use crate::manager::{ProjectModel, ResolveContext, VariantManager};
use crate::prepare::PrepareTask;
use crate::resolve::PassSettings;
use crate::session::{BuildSession, PrepareOutcome};

/// Unpack directories live under `<build_dir>/intermediates/exploded-aar`.
pub const EXPLODED_DIR: &str = "intermediates/exploded-aar";

/// Options controlling a sync invocation.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Overrides `[sync] mode` from the manifest.
    pub mode: Option<SyncMode>,
    /// Unpack library bundles after wiring.
    pub prepare: bool,
    /// Restrict unpacking to one variant's bundles.
    pub variant: Option<String>,
}

/// One unpacked (or skipped) bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBundle {
    pub task: String,
    pub outcome: PrepareOutcome,
}

/// Result of a successful sync.
#[derive(Debug)]
pub struct SyncResult {
    pub project_name: String,
    pub mode: SyncMode,
    pub model: ProjectModel,
    pub prepared: Vec<PreparedBundle>,
    pub duration: Duration,
}

/// A loaded project, ready to resolve.
#[derive(Debug)]
pub struct LoadedProject {
    pub root: PathBuf,
    pub manifest: Manifest,
    pub graph: ResolutionGraph,
    pub settings: PassSettings,
}

impl LoadedProject {
    /// Read `trellis.toml` and its resolution snapshot from `project_root`.
    ///
    /// # Errors
    /// Returns an error if either file cannot be read or parsed.
    pub fn load(project_root: &Path) -> Result<Self, EngineError> {
        let manifest = Manifest::from_path(&project_root.join(MANIFEST_FILE))?;
        let graph_file = GraphFile::from_path(&project_root.join(&manifest.project.graph))?;
        let graph = ResolutionGraph::from_file(&graph_file, project_root)?;
        let settings = PassSettings {
            project_name: manifest.project.name.clone(),
            tested_project: manifest.project.tested_project.clone(),
            exploded_root: build_dir(project_root, &manifest).join(EXPLODED_DIR),
            excluded: manifest.variants.exclude.iter().cloned().collect::<BTreeSet<_>>(),
        };
        Ok(Self {
            root: project_root.to_path_buf(),
            manifest,
            graph,
            settings,
        })
    }
}

fn build_dir(project_root: &Path, manifest: &Manifest) -> PathBuf {
    project_root.join(&manifest.project.build_dir)
}

/// Run the sync pipeline.
///
/// Steps:
/// 1. Read `trellis.toml` and the resolution snapshot
/// 2. Enumerate variants
/// 3. Resolve and reconcile every variant, fail-at-end
/// 4. Wire per-variant tasks and umbrella tasks
/// 5. In standard mode, stop if any dependency issue was found
/// 6. Unpack library bundles in parallel (when requested)
///
/// # Errors
/// Returns an error if the project cannot be loaded, variants are
/// misdeclared, sub-projects form a cycle, an unpack fails, or, in
/// standard mode, any dependency issue was found.
pub fn sync(project_root: &Path, options: &SyncOptions) -> Result<SyncResult, EngineError> {
    let start = Instant::now();
    let project = LoadedProject::load(project_root)?;
    let mode = options.mode.unwrap_or(project.manifest.sync.mode);
    let manager = VariantManager::new(&project.manifest);

    let variants = manager.create_variants(None)?;
    let ctx = ResolveContext {
        provider: &project.graph,
        settings: &project.settings,
        mode,
    };
    let mut session = BuildSession::create();
    let model = manager.build_task_graphs(variants, &ctx, &mut StepTaskBuilder, &mut session)?;

    eprintln!(
        "    Resolved {} ({} variant(s), {} task(s))",
        project.manifest.project.name,
        model.variants.len(),
        model.graph.len()
    );

    let issue_count = model.issues.error_count();
    if mode == SyncMode::Standard && issue_count > 0 {
        session.dispose();
        for issue in model.issues.issues() {
            eprintln!("error: {issue}");
        }
        return Err(EngineError::SyncFailed { count: issue_count });
    }

    let prepared = if options.prepare {
        let tasks = select_prepare_tasks(&model, &session, options.variant.as_deref());
        let outcome = tasks.and_then(|tasks| run_prepare(&session, &tasks));
        session.dispose();
        outcome?
    } else {
        session.dispose();
        Vec::new()
    };

    Ok(SyncResult {
        project_name: project.manifest.project.name.clone(),
        mode,
        model,
        prepared,
        duration: start.elapsed(),
    })
}

fn select_prepare_tasks(
    model: &ProjectModel,
    session: &BuildSession,
    variant: Option<&str>,
) -> Result<Vec<PrepareTask>, EngineError> {
    let registry = session.prepare_registry();
    let Some(name) = variant else {
        return Ok(registry.tasks().to_vec());
    };
    let selected = model.variant(name).ok_or_else(|| EngineError::UnknownVariant {
        name: name.to_owned(),
    })?;
    Ok(selected
        .dependencies
        .libraries()
        .filter_map(|node| node.bundle_data())
        .filter_map(|data| registry.find_by_exploded_dir(&data.exploded_dir))
        .cloned()
        .collect())
}

fn run_prepare(session: &BuildSession, tasks: &[PrepareTask]) -> Result<Vec<PreparedBundle>, EngineError> {
    let mut prepared = Vec::with_capacity(tasks.len());
    for result in session.run_prepare_tasks(tasks) {
        let outcome = result.outcome?;
        match outcome {
            PrepareOutcome::Extracted => eprintln!("    Unpacked {}", result.task),
            PrepareOutcome::UpToDate => eprintln!("    Fresh {}", result.task),
            PrepareOutcome::Reused => {}
        }
        prepared.push(PreparedBundle {
            task: result.task,
            outcome,
        });
    }
    Ok(prepared)
}

/// Remove the project's build directory. Returns whether it existed.
///
/// # Errors
/// Returns an error if the manifest cannot be read or the directory cannot
/// be removed.
pub fn clean(project_root: &Path) -> Result<bool, EngineError> {
    let manifest = Manifest::from_path(&project_root.join(MANIFEST_FILE))?;
    let dir = build_dir(project_root, &manifest);
    let existed = dir.exists();
    trellis_util::fs::remove_dir_all_if_exists(&dir)?;
    Ok(existed)
}
