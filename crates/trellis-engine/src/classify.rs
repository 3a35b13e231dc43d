//! Artifact classification: library bundle, code archive, or unsupported.

use std::path::{Path, PathBuf};

use trellis_util::coordinate::normalize_path_segment;
use trellis_util::ModuleCoordinate;

use crate::graph::Component;
use crate::issue::SyncIssue;
use crate::node::{NodeId, ResolvedNode};

/// Extension of library bundles.
pub const EXT_LIBRARY_BUNDLE: &str = "aar";
/// Extension of plain code archives.
pub const EXT_CODE_ARCHIVE: &str = "jar";
const EXT_APPLICATION_PACKAGE: &str = "apk";
const EXT_APKLIB: &str = "apklib";

/// Inputs that do not vary between modules of one pass.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub project_name: &'a str,
    /// Project path of the package under test, for standalone test projects.
    pub tested_project: Option<&'a str>,
    /// Root of the per-bundle unpack directories.
    pub exploded_root: &'a Path,
}

/// Already-resolved children of the module being classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleChildren {
    pub libraries: Vec<NodeId>,
    pub archives: Vec<NodeId>,
}

/// New nodes and issues for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub libraries: Vec<ResolvedNode>,
    pub archives: Vec<ResolvedNode>,
    /// Nested libraries of a tested-project jar. The caller marks them
    /// optional and adds them to its own output.
    pub promoted: Vec<NodeId>,
    pub issues: Vec<SyncIssue>,
}

/// Classify every artifact of `component`.
///
/// Library bundles take both kinds of children; code archives take only
/// archive children. A jar with nested library bundles is an error unless
/// the module is the tested project.
pub fn classify(
    component: &Component,
    children: &ModuleChildren,
    ctx: &ClassifyContext<'_>,
) -> Classification {
    let mut out = Classification::default();
    let project = component.project.clone();

    for artifact in &component.artifacts {
        let coordinate = artifact_coordinate(&component.coordinate, artifact.classifier.as_deref());
        let name = coordinate.to_string();

        match artifact.extension.as_str() {
            EXT_LIBRARY_BUNDLE => {
                let exploded = ctx.exploded_root.join(exploded_path(&coordinate));
                let mut node =
                    ResolvedNode::bundle(coordinate, &artifact.file, project.clone(), exploded);
                node.library_children = children.libraries.clone();
                node.archive_children = children.archives.clone();
                out.libraries.push(node);
            }
            EXT_CODE_ARCHIVE => {
                if !children.libraries.is_empty() {
                    let is_tested = ctx.tested_project.is_some()
                        && ctx.tested_project == component.project.as_deref();
                    if is_tested {
                        out.promoted.extend(children.libraries.iter().copied());
                    } else {
                        out.issues.push(SyncIssue::jar_depends_on_aar(
                            &name,
                            &component.coordinate.to_string(),
                        ));
                    }
                }
                let mut node = ResolvedNode::archive(coordinate, &artifact.file, project.clone());
                node.archive_children = children.archives.clone();
                out.archives.push(node);
            }
            EXT_APPLICATION_PACKAGE => {
                out.issues.push(SyncIssue::dependency_is_apk(
                    &name,
                    ctx.project_name,
                    &artifact.file,
                ));
            }
            EXT_APKLIB => {
                out.issues.push(SyncIssue::dependency_is_apklib(&name));
            }
            other => {
                tracing::warn!("unrecognized dependency: '{name}' (extension: '{other}')");
            }
        }
    }

    out
}

fn artifact_coordinate(module: &ModuleCoordinate, classifier: Option<&str>) -> ModuleCoordinate {
    match classifier {
        Some(classifier) => ModuleCoordinate {
            classifier: Some(classifier.to_owned()),
            ..module.clone()
        },
        None => module.clone(),
    }
}

/// `group/name/version[/classifier]`, each segment normalized.
pub fn exploded_path(coordinate: &ModuleCoordinate) -> PathBuf {
    let mut path = PathBuf::new();
    path.push(segment(coordinate, &coordinate.group));
    path.push(segment(coordinate, &coordinate.name));
    path.push(segment(coordinate, &coordinate.version));
    if let Some(classifier) = &coordinate.classifier {
        path.push(segment(coordinate, classifier));
    }
    path
}

fn segment(coordinate: &ModuleCoordinate, raw: &str) -> String {
    match normalize_path_segment(raw) {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::info!("{e} for {coordinate}, using it as is");
            raw.to_owned()
        }
    }
}
