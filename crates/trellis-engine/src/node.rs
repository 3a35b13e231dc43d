//! Resolved dependency nodes, stored in a per-pass arena.

use std::path::{Path, PathBuf};

use serde::Serialize;
use trellis_util::ModuleCoordinate;

/// Index of a node in a `NodeArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// Unpack layout of a library bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleData {
    /// Where the bundle is unpacked.
    pub exploded_dir: PathBuf,
}

impl BundleData {
    pub fn manifest(&self) -> PathBuf {
        self.exploded_dir.join("AndroidManifest.xml")
    }

    /// The bundle's main code archive.
    pub fn classes_jar(&self) -> PathBuf {
        self.exploded_dir.join("classes.jar")
    }

    /// Directory of additional archives shipped inside the bundle.
    pub fn libs_dir(&self) -> PathBuf {
        self.exploded_dir.join("libs")
    }

    /// Archives inside the unpacked bundle: `classes.jar` then `libs/*.jar`
    /// sorted. Empty until the bundle has been unpacked.
    pub fn bundled_archives(&self) -> Vec<PathBuf> {
        let mut archives = Vec::new();
        let classes = self.classes_jar();
        if classes.is_file() {
            archives.push(classes);
        }
        if let Ok(entries) = std::fs::read_dir(self.libs_dir()) {
            let mut libs: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("jar"))
                })
                .collect();
            libs.sort();
            archives.extend(libs);
        }
        archives
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    LibraryBundle(BundleData),
    CodeArchive,
}

/// One resolved module artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNode {
    pub coordinate: ModuleCoordinate,
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Library bundles this node depends on. Always empty for code archives.
    pub library_children: Vec<NodeId>,
    pub archive_children: Vec<NodeId>,
    pub optional: bool,
    pub compiled: bool,
    pub packaged: bool,
}

impl ResolvedNode {
    pub fn bundle(
        coordinate: ModuleCoordinate,
        file: &Path,
        project: Option<String>,
        exploded_dir: PathBuf,
    ) -> Self {
        Self {
            coordinate,
            file: file.to_path_buf(),
            project,
            kind: NodeKind::LibraryBundle(BundleData { exploded_dir }),
            library_children: Vec::new(),
            archive_children: Vec::new(),
            optional: false,
            compiled: false,
            packaged: false,
        }
    }

    pub fn archive(coordinate: ModuleCoordinate, file: &Path, project: Option<String>) -> Self {
        Self {
            coordinate,
            file: file.to_path_buf(),
            project,
            kind: NodeKind::CodeArchive,
            library_children: Vec::new(),
            archive_children: Vec::new(),
            optional: false,
            compiled: false,
            packaged: false,
        }
    }

    pub fn bundle_data(&self) -> Option<&BundleData> {
        match &self.kind {
            NodeKind::LibraryBundle(data) => Some(data),
            NodeKind::CodeArchive => None,
        }
    }
}

/// Owns every node created by one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<ResolvedNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: ResolvedNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> Option<&ResolvedNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ResolvedNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ResolvedNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}
