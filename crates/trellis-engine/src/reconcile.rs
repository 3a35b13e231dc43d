//! Cross-checks the compile and package results of one variant.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use trellis_config::manifest::SyncMode;

use crate::error::EngineError;
use crate::graph::{ConfigurationResult, DependencyGraphProvider};
use crate::issue::SyncIssue;
use crate::node::{BundleData, NodeArena, NodeId, ResolvedNode};
use crate::resolve::{PassSettings, ResolutionPass};

/// Progress of one variant's resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    NotStarted,
    ResolvingCompile,
    ResolvingPackage,
    Reconciling,
    Done,
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::ResolvingCompile => "resolving compile",
            Self::ResolvingPackage => "resolving package",
            Self::Reconciling => "reconciling",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Inputs of one reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileRequest<'a> {
    pub compile: &'a ConfigurationResult,
    pub package: &'a ConfigurationResult,
    /// Compile-only library bundles are allowed in library variants.
    pub is_library: bool,
    /// Dependencies of the variant under test, for application test variants.
    pub tested: Option<&'a VariantDependencies>,
    pub mode: SyncMode,
}

/// Scope of a local file dependency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocalArchive {
    pub compiled: bool,
    pub packaged: bool,
}

/// The reconciled dependency set of one variant.
#[derive(Debug, Clone, Default)]
pub struct VariantDependencies {
    pub arena: NodeArena,
    /// Library bundles reached directly from the roots and kept.
    pub direct_libraries: Vec<NodeId>,
    /// Every kept library bundle, pre-order, each once.
    pub library_bundles: Vec<NodeId>,
    pub code_archives: Vec<NodeId>,
    pub local_archives: BTreeMap<PathBuf, LocalArchive>,
    pub unresolved: BTreeSet<String>,
    pub issues: Vec<SyncIssue>,
    pub annotations_present: bool,
}

impl VariantDependencies {
    pub fn node(&self, id: NodeId) -> Option<&ResolvedNode> {
        self.arena.get(id)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.library_bundles.iter().filter_map(|id| self.arena.get(*id))
    }

    pub fn archives(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.code_archives.iter().filter_map(|id| self.arena.get(*id))
    }

    pub fn packaged_archives(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.archives().filter(|n| n.packaged)
    }

    pub fn compiled_archives(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.archives().filter(|n| n.compiled)
    }

    /// Serializable summary for reports and IDE output.
    pub fn report(&self) -> DependencyReport {
        DependencyReport {
            libraries: self
                .libraries()
                .map(|n| LibraryReport {
                    coordinate: n.coordinate.to_string(),
                    file: n.file.clone(),
                    exploded_dir: n.bundle_data().map(|d| d.exploded_dir.clone()),
                    manifest: n.bundle_data().map(BundleData::manifest),
                    bundled_archives: n
                        .bundle_data()
                        .map(BundleData::bundled_archives)
                        .unwrap_or_default(),
                    project: n.project.clone(),
                    optional: n.optional,
                })
                .collect(),
            archives: self
                .archives()
                .map(|n| ArchiveReport {
                    coordinate: n.coordinate.to_string(),
                    file: n.file.clone(),
                    compiled: n.compiled,
                    packaged: n.packaged,
                })
                .collect(),
            local_archives: self.local_archives.clone(),
            unresolved: self.unresolved.iter().cloned().collect(),
            issues: self.issues.clone(),
            annotations_present: self.annotations_present,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryReport {
    pub coordinate: String,
    pub file: PathBuf,
    pub exploded_dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    /// Code archives found inside the unpacked bundle. Empty before unpacking.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bundled_archives: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub coordinate: String,
    pub file: PathBuf,
    pub compiled: bool,
    pub packaged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub libraries: Vec<LibraryReport>,
    pub archives: Vec<ArchiveReport>,
    pub local_archives: BTreeMap<PathBuf, LocalArchive>,
    pub unresolved: Vec<String>,
    pub issues: Vec<SyncIssue>,
    pub annotations_present: bool,
}

/// Resolves both roots of a variant with one pass and reconciles them.
pub struct DependencyReconciler<'g> {
    pass: ResolutionPass<'g>,
    settings: &'g PassSettings,
    state: ResolutionState,
}

impl<'g> DependencyReconciler<'g> {
    pub fn new(provider: &'g dyn DependencyGraphProvider, settings: &'g PassSettings) -> Self {
        Self {
            pass: ResolutionPass::new(provider, settings),
            settings,
            state: ResolutionState::NotStarted,
        }
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    /// Modules classified by this reconciler's pass.
    pub fn classified_modules(&self) -> usize {
        self.pass.classified_modules()
    }

    fn advance(&mut self, next: ResolutionState) {
        tracing::debug!("{}: {} -> {next}", self.settings.project_name, self.state);
        self.state = next;
    }

    /// Resolve and reconcile one variant.
    ///
    /// Recoverable problems are returned as issues on the result.
    ///
    /// # Errors
    /// Returns `EngineError::CircularDependency` when sub-projects form a
    /// loop, or `EngineError::ReconcilerReused` on a second call.
    pub fn reconcile(
        &mut self,
        request: &ReconcileRequest<'_>,
    ) -> Result<VariantDependencies, EngineError> {
        if self.state != ResolutionState::NotStarted {
            return Err(EngineError::ReconcilerReused {
                state: self.state.to_string(),
            });
        }

        self.advance(ResolutionState::ResolvingCompile);
        let compile = self.pass.resolve(&request.compile.roots)?;
        self.advance(ResolutionState::ResolvingPackage);
        let package = self.pass.resolve(&request.package.roots)?;
        self.advance(ResolutionState::Reconciling);

        let output = self.pass.take_output();
        let mut deps = VariantDependencies {
            arena: output.arena,
            unresolved: output.unresolved,
            issues: output.issues,
            annotations_present: output.annotations_present,
            ..VariantDependencies::default()
        };
        let settings = self.settings;
        let project = settings.project_name.as_str();

        for id in &compile.libraries {
            if let Some(node) = deps.arena.get_mut(*id) {
                node.compiled = true;
            }
        }
        for id in &package.libraries {
            if let Some(node) = deps.arena.get_mut(*id) {
                node.packaged = true;
            }
        }

        let mut seen = HashSet::new();
        let candidates: Vec<NodeId> = compile
            .libraries
            .iter()
            .chain(&package.libraries)
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        for id in candidates {
            let Some(node) = deps.arena.get_mut(id) else {
                continue;
            };
            match (node.compiled, node.packaged) {
                (true, false) => {
                    if request.is_library || node.optional {
                        node.optional = true;
                        deps.direct_libraries.push(id);
                    } else {
                        deps.issues.push(SyncIssue::non_jar_provided(
                            project,
                            &node.coordinate.to_string(),
                        ));
                    }
                }
                (false, true) => {
                    deps.issues.push(SyncIssue::non_jar_package(
                        project,
                        &node.coordinate.to_string(),
                    ));
                }
                _ => deps.direct_libraries.push(id),
            }
        }

        let mut archives = ArchiveUnion::default();
        for id in &compile.archives {
            archives.add(&mut deps.arena, *id, true, false);
        }
        for id in &package.archives {
            archives.add(&mut deps.arena, *id, false, true);
        }

        let mut walk = LibraryWalk::default();
        for id in deps.direct_libraries.clone() {
            let optional = deps.arena.get(id).is_some_and(|n| n.optional);
            walk.visit(&mut deps.arena, id, optional, &mut archives);
        }
        for id in &walk.order {
            if let Some(node) = deps.arena.get_mut(*id) {
                if !node.packaged {
                    node.optional = true;
                }
            }
        }
        deps.library_bundles = walk.order;
        deps.code_archives = archives.order;

        if let Some(tested) = request.tested {
            exclude_tested(&mut deps, tested);
        }

        collect_local_files(&mut deps, project, request);

        let failed = request.compile.failed || request.package.failed;
        if request.mode == SyncMode::Standard && failed {
            let escalated: Vec<SyncIssue> =
                deps.unresolved.iter().map(|r| SyncIssue::unresolved(r)).collect();
            deps.issues.extend(escalated);
        }

        self.advance(ResolutionState::Done);
        Ok(deps)
    }
}

/// Identity-ordered union of code archive records.
#[derive(Default)]
struct ArchiveUnion {
    order: Vec<NodeId>,
    seen: HashSet<NodeId>,
}

impl ArchiveUnion {
    /// Add `id` and its archive children, OR-ing the scope flags.
    fn add(&mut self, arena: &mut NodeArena, id: NodeId, compiled: bool, packaged: bool) {
        let Some(node) = arena.get_mut(id) else {
            return;
        };
        let first = self.seen.insert(id);
        if !first && (node.compiled || !compiled) && (node.packaged || !packaged) {
            return;
        }
        if first {
            self.order.push(id);
        }
        node.compiled |= compiled;
        node.packaged |= packaged;
        let children = node.archive_children.clone();
        for child in children {
            self.add(arena, child, compiled, packaged);
        }
    }
}

/// Pre-order walk over kept library bundles.
#[derive(Default)]
struct LibraryWalk {
    order: Vec<NodeId>,
    listed: HashSet<NodeId>,
    visited: HashSet<(NodeId, bool)>,
}

impl LibraryWalk {
    fn visit(&mut self, arena: &mut NodeArena, id: NodeId, optional: bool, archives: &mut ArchiveUnion) {
        if !self.visited.insert((id, optional)) {
            return;
        }
        let Some(node) = arena.get_mut(id) else {
            return;
        };
        node.compiled = true;
        if !optional {
            node.packaged = true;
        }
        let libraries = node.library_children.clone();
        let children = node.archive_children.clone();
        if self.listed.insert(id) {
            self.order.push(id);
        }
        for child in children {
            archives.add(arena, child, true, !optional);
        }
        for child in libraries {
            let child_optional = optional || arena.get(child).is_some_and(|n| n.optional);
            self.visit(arena, child, child_optional, archives);
        }
    }
}

/// Stop packaging archives the package under test already ships.
fn exclude_tested(deps: &mut VariantDependencies, tested: &VariantDependencies) {
    let shipped: HashMap<String, String> = tested
        .packaged_archives()
        .map(|n| (n.coordinate.version_less_key(), n.coordinate.version.clone()))
        .collect();

    for id in &deps.code_archives {
        let Some(node) = deps.arena.get_mut(*id) else {
            continue;
        };
        if !node.packaged {
            continue;
        }
        let key = node.coordinate.version_less_key();
        let Some(tested_version) = shipped.get(&key) else {
            continue;
        };
        if *tested_version == node.coordinate.version {
            tracing::info!("{key} is packaged by the tested variant, not packaging it again");
            node.packaged = false;
        } else {
            deps.issues.push(SyncIssue::mismatch(
                &key,
                tested_version,
                &node.coordinate.version,
            ));
        }
    }

    let arena = &deps.arena;
    deps.code_archives
        .retain(|id| arena.get(*id).is_some_and(|n| n.compiled || n.packaged));
}

fn collect_local_files(deps: &mut VariantDependencies, project: &str, request: &ReconcileRequest<'_>) {
    let mut rejected = BTreeSet::new();
    let scoped = request
        .compile
        .files
        .iter()
        .map(|f| (f, true))
        .chain(request.package.files.iter().map(|f| (f, false)));

    for (file, compiled) in scoped {
        let is_jar = file
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jar"));
        if !is_jar {
            if rejected.insert(file.clone()) {
                deps.issues.push(SyncIssue::non_jar_local(project, file));
            }
            continue;
        }
        let entry = deps.local_archives.entry(file.clone()).or_default();
        if compiled {
            entry.compiled = true;
        } else {
            entry.packaged = true;
        }
    }
}
