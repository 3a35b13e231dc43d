//! One prepare (unpack) task per unique library bundle, shared by all variants.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use trellis_util::ModuleCoordinate;
use trellis_variant::name::camel_case;

use crate::cache::UnpackKey;
use crate::node::ResolvedNode;

/// Non-transitive identity of a library bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleKey {
    pub coordinate: ModuleCoordinate,
    pub bundle: PathBuf,
    pub exploded_dir: PathBuf,
}

impl BundleKey {
    /// `None` for code archives.
    pub fn of(node: &ResolvedNode) -> Option<Self> {
        let data = node.bundle_data()?;
        Some(Self {
            coordinate: node.coordinate.clone(),
            bundle: node.file.clone(),
            exploded_dir: data.exploded_dir.clone(),
        })
    }
}

/// Unpacks one library bundle into its exploded directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepareTask {
    pub name: String,
    pub coordinate: ModuleCoordinate,
    pub bundle: PathBuf,
    pub exploded_dir: PathBuf,
}

impl PrepareTask {
    pub fn unpack_key(&self) -> UnpackKey {
        UnpackKey::for_bundle(&self.bundle, &self.exploded_dir)
    }
}

/// `prepare<CamelCasedCoordinate>Library`.
pub fn prepare_task_name(coordinate: &ModuleCoordinate) -> String {
    let words = coordinate.to_string().replace(':', " ");
    format!("prepare{}Library", camel_case(&words))
}

/// Session-wide registry of prepare tasks, filled lazily.
#[derive(Debug, Default)]
pub struct PrepareTaskRegistry {
    index: HashMap<BundleKey, usize>,
    tasks: Vec<PrepareTask>,
}

impl PrepareTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The prepare task for `node`, created on first request.
    /// Returns `None` when the node is not a library bundle.
    pub fn get_or_create(&mut self, node: &ResolvedNode) -> Option<&PrepareTask> {
        let key = BundleKey::of(node)?;
        let index = match self.index.get(&key) {
            Some(index) => *index,
            None => {
                let task = PrepareTask {
                    name: prepare_task_name(&key.coordinate),
                    coordinate: key.coordinate.clone(),
                    bundle: key.bundle.clone(),
                    exploded_dir: key.exploded_dir.clone(),
                };
                tracing::debug!("registered {}", task.name);
                self.tasks.push(task);
                let index = self.tasks.len() - 1;
                self.index.insert(key, index);
                index
            }
        };
        self.tasks.get(index)
    }

    pub fn get(&self, key: &BundleKey) -> Option<&PrepareTask> {
        self.index.get(key).and_then(|i| self.tasks.get(*i))
    }

    pub fn find_by_exploded_dir(&self, dir: &Path) -> Option<&PrepareTask> {
        self.tasks.iter().find(|t| t.exploded_dir == dir)
    }

    /// Tasks in creation order.
    pub fn tasks(&self) -> &[PrepareTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop every task. Only called when the session is disposed.
    pub fn unload(&mut self) {
        self.index.clear();
        self.tasks.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn bundle(coordinate: &str, file: &str) -> ResolvedNode {
        let coordinate = ModuleCoordinate::parse(coordinate).unwrap();
        let exploded = PathBuf::from("/build/exploded").join(&coordinate.name);
        ResolvedNode::bundle(coordinate, Path::new(file), None, exploded)
    }

    #[test]
    fn task_name_is_camel_cased_coordinate() {
        let coordinate = ModuleCoordinate::parse("com.android.support:appcompat-v7:22.0.0").unwrap();
        assert_eq!(
            prepare_task_name(&coordinate),
            "prepareComAndroidSupportAppcompatV72200Library"
        );
    }

    #[test]
    fn one_task_per_bundle_key() {
        let mut registry = PrepareTaskRegistry::new();
        let first = registry
            .get_or_create(&bundle("g:ui:1", "repo/ui.aar"))
            .unwrap()
            .clone();
        let again = registry
            .get_or_create(&bundle("g:ui:1", "repo/ui.aar"))
            .unwrap()
            .clone();
        assert_eq!(first, again);
        assert_eq!(registry.len(), 1);

        registry.get_or_create(&bundle("g:ui:1", "other/ui.aar"));
        assert_eq!(registry.len(), 2, "a different bundle file is a different key");
    }

    #[test]
    fn code_archives_have_no_task() {
        let mut registry = PrepareTaskRegistry::new();
        let jar = ResolvedNode::archive(
            ModuleCoordinate::new("g", "core", "1"),
            Path::new("core.jar"),
            None,
        );
        assert!(registry.get_or_create(&jar).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn unload_clears_registry() {
        let mut registry = PrepareTaskRegistry::new();
        let node = bundle("g:ui:1", "repo/ui.aar");
        registry.get_or_create(&node);
        let key = BundleKey::of(&node).unwrap();
        assert!(registry.get(&key).is_some());
        registry.unload();
        assert!(registry.get(&key).is_none());
        assert!(registry.tasks().is_empty());
    }
}
