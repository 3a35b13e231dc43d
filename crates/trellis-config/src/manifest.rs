use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the project manifest.
pub const MANIFEST_FILE: &str = "trellis.toml";

/// The `trellis.toml` project manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub project: Project,
    #[serde(default)]
    pub variants: Variants,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub kind: ProjectKind,
    /// Project path of the application under test, for `kind = "test"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tested_project: Option<String>,
    /// Resolution snapshot, relative to the project root.
    #[serde(default = "default_graph")]
    pub graph: String,
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
}

/// What the project produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    #[default]
    Application,
    Library,
    /// A standalone test project for another application.
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variants {
    /// Flavor dimension order.
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default = "default_build_types")]
    pub build_types: Vec<BuildType>,
    #[serde(default)]
    pub flavors: Vec<Flavor>,
    /// Build type that gets an instrumented test variant.
    #[serde(default = "default_test_build_type")]
    pub test_build_type: String,
    /// Variants to skip.
    #[serde(default)]
    pub ignore: Vec<IgnoreRule>,
    /// Modules (`group:name`) dropped from every resolution.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for Variants {
    fn default() -> Self {
        Self {
            dimensions: Vec::new(),
            build_types: default_build_types(),
            flavors: Vec::new(),
            test_build_type: default_test_build_type(),
            ignore: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildType {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
}

/// A variant filter rule. A variant is ignored when its build type matches
/// (if given) and it carries every listed flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_type: Option<String>,
    #[serde(default)]
    pub flavors: Vec<String>,
}

impl IgnoreRule {
    /// Whether this rule vetoes the `build_type` x `flavors` variant.
    pub fn matches(&self, build_type: &str, flavors: &[&str]) -> bool {
        if self.build_type.as_deref().is_some_and(|b| b != build_type) {
            return false;
        }
        self.flavors.iter().all(|f| flavors.contains(&f.as_str()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub mode: SyncMode,
}

/// How dependency problems are surfaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Problems fail the run once every variant has been processed.
    #[default]
    Standard,
    /// Problems are reported as data and the run succeeds.
    Ide,
}

fn default_graph() -> String {
    "trellis-graph.toml".to_owned()
}

fn default_build_dir() -> String {
    "build".to_owned()
}

fn default_build_types() -> Vec<BuildType> {
    ["debug", "release"]
        .into_iter()
        .map(|name| BuildType {
            name: name.to_owned(),
        })
        .collect()
}

fn default_test_build_type() -> String {
    "debug".to_owned()
}

impl Manifest {
    /// Read and parse a `trellis.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str_at(&content, path)
    }

    fn from_str_at(content: &str, path: &Path) -> Result<Self, ManifestError> {
        toml::from_str(content).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid trellis.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Manifest, ManifestError> {
        Manifest::from_str_at(content, Path::new("trellis.toml"))
    }

    #[test]
    fn minimal_manifest_defaults() {
        let manifest = parse("[project]\nname = \"app\"\n").unwrap();
        assert_eq!(manifest.project.kind, ProjectKind::Application);
        assert_eq!(manifest.project.graph, "trellis-graph.toml");
        assert_eq!(manifest.project.build_dir, "build");
        let names: Vec<&str> = manifest
            .variants
            .build_types
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, ["debug", "release"]);
        assert_eq!(manifest.variants.test_build_type, "debug");
        assert_eq!(manifest.sync.mode, SyncMode::Standard);
    }

    #[test]
    fn full_manifest() {
        let manifest = parse(
            r#"
[project]
name = "lib"
kind = "library"

[variants]
dimensions = ["price", "abi"]
test_build_type = "release"
exclude = ["com.google.guava:guava"]

[[variants.build_types]]
name = "release"

[[variants.flavors]]
name = "free"
dimension = "price"

[[variants.flavors]]
name = "arm"
dimension = "abi"

[[variants.ignore]]
build_type = "release"
flavors = ["free"]

[sync]
mode = "ide"
"#,
        )
        .unwrap();
        assert_eq!(manifest.project.kind, ProjectKind::Library);
        assert_eq!(manifest.variants.dimensions, ["price", "abi"]);
        assert_eq!(manifest.variants.flavors.len(), 2);
        assert_eq!(manifest.variants.build_types.len(), 1);
        assert_eq!(manifest.variants.exclude, ["com.google.guava:guava"]);
        assert_eq!(manifest.sync.mode, SyncMode::Ide);
    }

    #[test]
    fn unknown_kind_rejected() {
        let err = parse("[project]\nname = \"x\"\nkind = \"daemon\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid trellis.toml"), "error was: {err}");
    }

    #[test]
    fn missing_file_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Manifest::from_path(&tmp.path().join(MANIFEST_FILE)).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }

    #[test]
    fn ignore_rule_matching() {
        let rule = IgnoreRule {
            build_type: Some("release".to_owned()),
            flavors: vec!["free".to_owned()],
        };
        assert!(rule.matches("release", &["free", "arm"]));
        assert!(!rule.matches("debug", &["free"]));
        assert!(!rule.matches("release", &["paid"]));

        let any_build_type = IgnoreRule {
            build_type: None,
            flavors: vec!["paid".to_owned()],
        };
        assert!(any_build_type.matches("debug", &["paid"]));
    }
}
