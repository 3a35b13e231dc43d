use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// The `trellis-graph.toml` resolution snapshot.
///
/// Components form one graph shared by every configuration; each
/// configuration lists its root edges into it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct GraphFile {
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
    #[serde(default)]
    pub configurations: BTreeMap<String, ConfigurationEntry>,
}

/// One resolved module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComponentEntry {
    /// `group:name:version[:classifier]`.
    pub coordinate: String,
    /// Set when the module is a sibling sub-project, e.g. `":lib"`.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactEntry>,
}

/// An edge of the graph: either a resolved component or a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DependencyEntry {
    Resolved { coordinate: String },
    Unresolved { unresolved: String },
}

/// One file produced by a module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactEntry {
    /// Path relative to the project root.
    pub file: String,
    /// `aar`, `jar`, `apk`, `apklib`, ...
    pub extension: String,
    #[serde(default)]
    pub classifier: Option<String>,
}

/// The resolution result of one named configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct ConfigurationEntry {
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
    /// Local file dependencies, glob patterns relative to the project root.
    #[serde(default)]
    pub files: Vec<String>,
    /// Whether the resolver reported a failure for this configuration.
    #[serde(default)]
    pub failed: bool,
}

impl GraphFile {
    /// Read and parse a `trellis-graph.toml` from the given path.
    /// Returns an empty graph if the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or contains invalid TOML.
    pub fn from_path(path: &Path) -> Result<Self, GraphFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| GraphFileError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| GraphFileError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GraphFileError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid resolution graph at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let graph = GraphFile::from_path(&tmp.path().join("trellis-graph.toml")).unwrap();
        assert!(graph.components.is_empty());
        assert!(graph.configurations.is_empty());
    }

    #[test]
    fn parse_components_and_configurations() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("trellis-graph.toml");
        fs::write(
            &path,
            r#"
[[components]]
coordinate = "com.example:ui:1.0"
dependencies = [
    { coordinate = "com.example:core:1.0" },
    { unresolved = "com.example:missing:+" },
]

[[components.artifacts]]
file = "repo/ui-1.0.aar"
extension = "aar"

[[components]]
coordinate = "com.example:core:1.0"
project = ":core"

[[components.artifacts]]
file = "repo/core-1.0.jar"
extension = "jar"
classifier = "tests"

[configurations.compile]
dependencies = [{ coordinate = "com.example:ui:1.0" }]
files = ["libs/*.jar"]

[configurations.apk]
failed = true
"#,
        )
        .unwrap();

        let graph = GraphFile::from_path(&path).unwrap();
        assert_eq!(graph.components.len(), 2);
        let ui = graph.components.first().unwrap();
        assert_eq!(
            ui.dependencies,
            [
                DependencyEntry::Resolved {
                    coordinate: "com.example:core:1.0".to_owned()
                },
                DependencyEntry::Unresolved {
                    unresolved: "com.example:missing:+".to_owned()
                },
            ]
        );
        let core = graph.components.get(1).unwrap();
        assert_eq!(core.project.as_deref(), Some(":core"));
        assert_eq!(
            core.artifacts.first().unwrap().classifier.as_deref(),
            Some("tests")
        );

        let compile = graph.configurations.get("compile").unwrap();
        assert_eq!(compile.files, ["libs/*.jar"]);
        assert!(!compile.failed);
        assert!(graph.configurations.get("apk").unwrap().failed);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("trellis-graph.toml");
        fs::write(&path, "[[components]]\nproject = 3\n").unwrap();
        let err = GraphFile::from_path(&path).unwrap_err();
        assert!(err.to_string().contains("invalid resolution graph"), "error was: {err}");
    }
}
