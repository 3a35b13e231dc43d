//! The resolved module graph handed to the resolver.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use trellis_config::graph::{DependencyEntry, GraphFile};
use trellis_util::ModuleCoordinate;

use crate::error::EngineError;

/// Index of a component in a `ResolutionGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

/// An edge from a configuration root or a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Edge {
    Resolved(ComponentId),
    /// The selector the resolver attempted, e.g. `com.example:lib:+`.
    Unresolved(String),
}

/// One file published by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file: PathBuf,
    pub extension: String,
    pub classifier: Option<String>,
}

/// One resolved module with its outgoing edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub coordinate: ModuleCoordinate,
    /// Project path when the module is a sibling sub-project.
    pub project: Option<String>,
    pub dependencies: Vec<Edge>,
    pub artifacts: Vec<Artifact>,
}

/// The resolution result of one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigurationResult {
    pub name: String,
    pub roots: Vec<Edge>,
    /// Local file dependencies, already expanded.
    pub files: Vec<PathBuf>,
    pub failed: bool,
}

impl ConfigurationResult {
    /// Union of `parts` in order, first occurrence wins.
    pub fn merged(name: &str, parts: &[&ConfigurationResult]) -> Self {
        let mut roots = Vec::new();
        let mut seen_roots = HashSet::new();
        let mut files = Vec::new();
        let mut seen_files = HashSet::new();
        let mut failed = false;
        for part in parts {
            for root in &part.roots {
                if seen_roots.insert(root.clone()) {
                    roots.push(root.clone());
                }
            }
            for file in &part.files {
                if seen_files.insert(file.clone()) {
                    files.push(file.clone());
                }
            }
            failed |= part.failed;
        }
        Self {
            name: name.to_owned(),
            roots,
            files,
            failed,
        }
    }
}

/// Source of resolved components and configuration results.
pub trait DependencyGraphProvider {
    fn component(&self, id: ComponentId) -> Option<&Component>;

    fn configuration(&self, name: &str) -> Option<&ConfigurationResult>;

    /// Merge the named configurations; missing names contribute nothing.
    fn merged_configuration(&self, name: &str, sources: &[String]) -> ConfigurationResult {
        let parts: Vec<&ConfigurationResult> = sources
            .iter()
            .filter_map(|source| self.configuration(source))
            .collect();
        ConfigurationResult::merged(name, &parts)
    }
}

/// Arena-backed module graph shared by every configuration of a project.
#[derive(Debug, Clone, Default)]
pub struct ResolutionGraph {
    components: Vec<Component>,
    configurations: BTreeMap<String, ConfigurationResult>,
}

impl ResolutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component and return its id.
    pub fn add_component(&mut self, component: Component) -> ComponentId {
        self.components.push(component);
        ComponentId(self.components.len() - 1)
    }

    /// Add an edge from `from` to `edge`. Unknown ids are ignored.
    pub fn add_dependency(&mut self, from: ComponentId, edge: Edge) {
        if let Some(component) = self.components.get_mut(from.0) {
            component.dependencies.push(edge);
        }
    }

    pub fn add_configuration(&mut self, configuration: ConfigurationResult) {
        self.configurations
            .insert(configuration.name.clone(), configuration);
    }

    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (ComponentId(i), c))
    }

    pub fn configuration_names(&self) -> impl Iterator<Item = &str> {
        self.configurations.keys().map(String::as_str)
    }

    /// Build the graph from a parsed snapshot.
    ///
    /// Artifact paths and local file patterns are resolved against
    /// `project_root`.
    ///
    /// # Errors
    /// Returns an error if a coordinate is malformed, a component is
    /// declared twice, an edge names an undeclared component, or a file
    /// pattern is not a valid glob.
    pub fn from_file(file: &GraphFile, project_root: &Path) -> Result<Self, EngineError> {
        let mut graph = Self::new();
        let mut ids: HashMap<ModuleCoordinate, ComponentId> = HashMap::new();

        for entry in &file.components {
            let coordinate = ModuleCoordinate::parse(&entry.coordinate)?;
            if ids.contains_key(&coordinate) {
                return Err(EngineError::DuplicateComponent {
                    coordinate: entry.coordinate.clone(),
                });
            }
            let artifacts = entry
                .artifacts
                .iter()
                .map(|a| Artifact {
                    file: project_root.join(&a.file),
                    extension: a.extension.clone(),
                    classifier: a.classifier.clone().filter(|c| !c.is_empty()),
                })
                .collect();
            let id = graph.add_component(Component {
                coordinate: coordinate.clone(),
                project: entry.project.clone(),
                dependencies: Vec::new(),
                artifacts,
            });
            ids.insert(coordinate, id);
        }

        for (index, entry) in file.components.iter().enumerate() {
            let from = ComponentId(index);
            for dependency in &entry.dependencies {
                let edge = to_edge(dependency, &ids, &entry.coordinate)?;
                graph.add_dependency(from, edge);
            }
        }

        for (name, entry) in &file.configurations {
            let roots = entry
                .dependencies
                .iter()
                .map(|d| to_edge(d, &ids, name))
                .collect::<Result<Vec<_>, _>>()?;
            let files = trellis_util::fs::expand_globs(project_root, &entry.files)?;
            graph.add_configuration(ConfigurationResult {
                name: name.clone(),
                roots,
                files,
                failed: entry.failed,
            });
        }

        Ok(graph)
    }
}

fn to_edge(
    entry: &DependencyEntry,
    ids: &HashMap<ModuleCoordinate, ComponentId>,
    referenced_by: &str,
) -> Result<Edge, EngineError> {
    match entry {
        DependencyEntry::Unresolved { unresolved } => Ok(Edge::Unresolved(unresolved.clone())),
        DependencyEntry::Resolved { coordinate } => {
            let parsed = ModuleCoordinate::parse(coordinate)?;
            ids.get(&parsed)
                .copied()
                .map(Edge::Resolved)
                .ok_or_else(|| EngineError::UnknownComponent {
                    coordinate: coordinate.clone(),
                    referenced_by: referenced_by.to_owned(),
                })
        }
    }
}

impl DependencyGraphProvider for ResolutionGraph {
    fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.0)
    }

    fn configuration(&self, name: &str) -> Option<&ConfigurationResult> {
        self.configurations.get(name)
    }
}
