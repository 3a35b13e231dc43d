//! Depth-first resolution of configuration roots into deduplicated nodes.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use crate::classify::{classify, ClassifyContext, ModuleChildren};
use crate::error::EngineError;
use crate::graph::{ComponentId, DependencyGraphProvider, Edge};
use crate::issue::SyncIssue;
use crate::node::{NodeArena, NodeId};

const ANNOTATIONS_GROUP: &str = "com.android.support";
const ANNOTATIONS_NAME: &str = "support-annotations";

/// Per-project inputs shared by every pass.
#[derive(Debug, Clone, Default)]
pub struct PassSettings {
    pub project_name: String,
    pub tested_project: Option<String>,
    pub exploded_root: PathBuf,
    /// `group:name` ids skipped during traversal.
    pub excluded: BTreeSet<String>,
}

/// Top-level nodes reached from one set of roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRoots {
    pub libraries: Vec<NodeId>,
    pub archives: Vec<NodeId>,
}

/// One resolution pass over a variant's compile and package roots.
///
/// Nodes are memoized by component for the whole pass, so a module reached
/// from both roots, or from several parents, is one node.
pub struct ResolutionPass<'g> {
    provider: &'g dyn DependencyGraphProvider,
    settings: &'g PassSettings,
    arena: NodeArena,
    found_libraries: HashMap<ComponentId, Vec<NodeId>>,
    found_archives: HashMap<ComponentId, Vec<NodeId>>,
    in_progress: HashSet<ComponentId>,
    unresolved: BTreeSet<String>,
    issues: Vec<SyncIssue>,
    annotations_present: bool,
    classified: usize,
}

impl<'g> ResolutionPass<'g> {
    pub fn new(provider: &'g dyn DependencyGraphProvider, settings: &'g PassSettings) -> Self {
        Self {
            provider,
            settings,
            arena: NodeArena::new(),
            found_libraries: HashMap::new(),
            found_archives: HashMap::new(),
            in_progress: HashSet::new(),
            unresolved: BTreeSet::new(),
            issues: Vec::new(),
            annotations_present: false,
            classified: 0,
        }
    }

    /// Resolve `roots`, reusing nodes created by earlier calls on this pass.
    ///
    /// Unresolved edges are recorded and skipped.
    ///
    /// # Errors
    /// Returns `EngineError::CircularDependency` when sub-projects depend on
    /// each other in a loop.
    pub fn resolve(&mut self, roots: &[Edge]) -> Result<ResolvedRoots, EngineError> {
        let mut out = ResolvedRoots::default();
        for edge in roots {
            match edge {
                Edge::Unresolved(request) => {
                    self.unresolved.insert(request.clone());
                }
                Edge::Resolved(id) => {
                    let chain: Vec<String> = self
                        .provider
                        .component(*id)
                        .and_then(|c| c.project.clone())
                        .into_iter()
                        .collect();
                    self.visit(*id, &chain, &mut out)?;
                }
            }
        }
        Ok(out)
    }

    fn visit(
        &mut self,
        id: ComponentId,
        chain: &[String],
        out: &mut ResolvedRoots,
    ) -> Result<(), EngineError> {
        let provider = self.provider;
        let Some(component) = provider.component(id) else {
            return Ok(());
        };

        if self
            .settings
            .excluded
            .contains(&component.coordinate.module_id())
        {
            tracing::info!("excluding {}", component.coordinate);
            return Ok(());
        }

        if component.coordinate.group == ANNOTATIONS_GROUP
            && component.coordinate.name == ANNOTATIONS_NAME
        {
            self.annotations_present = true;
        }

        if let Some(libraries) = self.found_libraries.get(&id) {
            tracing::debug!("reusing libraries of {}", component.coordinate);
            out.libraries.extend(libraries.iter().copied());
            return Ok(());
        }
        if let Some(archives) = self.found_archives.get(&id) {
            tracing::debug!("reusing archives of {}", component.coordinate);
            out.archives.extend(archives.iter().copied());
            return Ok(());
        }

        if !self.in_progress.insert(id) {
            tracing::warn!(
                "dependency cycle through {} ignored: module already being resolved",
                component.coordinate
            );
            return Ok(());
        }

        let mut children = ResolvedRoots::default();
        for edge in &component.dependencies {
            match edge {
                Edge::Unresolved(request) => {
                    self.unresolved.insert(request.clone());
                }
                Edge::Resolved(child) => {
                    let project = provider.component(*child).and_then(|c| c.project.as_deref());
                    match project {
                        Some(path) => {
                            if let Some(index) = chain.iter().position(|p| p == path) {
                                let mut cycle = chain.get(index..).unwrap_or_default().to_vec();
                                cycle.push(path.to_owned());
                                return Err(EngineError::CircularDependency { cycle });
                            }
                            let mut child_chain = chain.to_vec();
                            child_chain.push(path.to_owned());
                            self.visit(*child, &child_chain, &mut children)?;
                        }
                        None => self.visit(*child, chain, &mut children)?,
                    }
                }
            }
        }

        self.in_progress.remove(&id);
        self.classified += 1;

        let ctx = ClassifyContext {
            project_name: &self.settings.project_name,
            tested_project: self.settings.tested_project.as_deref(),
            exploded_root: &self.settings.exploded_root,
        };
        let classification = classify(
            component,
            &ModuleChildren {
                libraries: children.libraries,
                archives: children.archives,
            },
            &ctx,
        );

        let libraries: Vec<NodeId> = classification
            .libraries
            .into_iter()
            .map(|node| self.arena.push(node))
            .collect();
        let archives: Vec<NodeId> = classification
            .archives
            .into_iter()
            .map(|node| self.arena.push(node))
            .collect();

        for promoted in classification.promoted {
            if let Some(node) = self.arena.get_mut(promoted) {
                node.optional = true;
            }
            out.libraries.push(promoted);
        }
        self.issues.extend(classification.issues);

        out.libraries.extend(libraries.iter().copied());
        out.archives.extend(archives.iter().copied());
        if !libraries.is_empty() {
            self.found_libraries.insert(id, libraries);
        }
        self.found_archives.insert(id, archives);
        Ok(())
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn unresolved(&self) -> &BTreeSet<String> {
        &self.unresolved
    }

    pub fn issues(&self) -> &[SyncIssue] {
        &self.issues
    }

    pub fn annotations_present(&self) -> bool {
        self.annotations_present
    }

    /// Number of modules classified so far. Each module is classified once.
    pub fn classified_modules(&self) -> usize {
        self.classified
    }

    /// Move the arena and accumulated data out, leaving the pass empty.
    pub fn take_output(&mut self) -> PassOutput {
        self.found_libraries.clear();
        self.found_archives.clear();
        PassOutput {
            arena: std::mem::take(&mut self.arena),
            unresolved: std::mem::take(&mut self.unresolved),
            issues: std::mem::take(&mut self.issues),
            annotations_present: std::mem::replace(&mut self.annotations_present, false),
        }
    }
}

/// What a pass leaves behind once both roots are resolved.
#[derive(Debug, Clone, Default)]
pub struct PassOutput {
    pub arena: NodeArena,
    pub unresolved: BTreeSet<String>,
    pub issues: Vec<SyncIssue>,
    pub annotations_present: bool,
}
