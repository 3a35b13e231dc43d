//! Module coordinate parsing and path-segment normalization.

use std::fmt;

use crate::error::UtilError;

/// The identity of a resolved module: `group:name:version[:classifier]`.
///
/// Resolved nodes are deduplicated by this value across a whole resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleCoordinate {
    /// Group, e.g. `"com.android.support"`.
    pub group: String,
    /// Module name, e.g. `"appcompat-v7"`.
    pub name: String,
    /// Version, e.g. `"22.0.0"`.
    pub version: String,
    /// Optional classifier, e.g. `"sources"`.
    pub classifier: Option<String>,
}

impl ModuleCoordinate {
    /// Create a coordinate without a classifier.
    pub fn new(group: &str, name: &str, version: &str) -> Self {
        Self {
            group: group.to_owned(),
            name: name.to_owned(),
            version: version.to_owned(),
            classifier: None,
        }
    }

    /// Builder method to attach a classifier.
    pub fn with_classifier(mut self, classifier: &str) -> Self {
        self.classifier = Some(classifier.to_owned());
        self
    }

    /// Parse a coordinate string.
    ///
    /// Accepted formats:
    /// - `"group:name:version"`
    /// - `"group:name:version:classifier"`
    ///
    /// # Errors
    /// Returns `UtilError::InvalidCoordinate` when the string does not have 3
    /// or 4 colon-separated parts, or any part is empty.
    pub fn parse(coord: &str) -> Result<Self, UtilError> {
        let parts: Vec<&str> = coord.split(':').collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(UtilError::InvalidCoordinate {
                coordinate: coord.to_owned(),
                reason: format!(
                    "expected group:name:version[:classifier], got {} parts",
                    parts.len()
                ),
            });
        }

        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                let label = match i {
                    0 => "group",
                    1 => "name",
                    2 => "version",
                    _ => "classifier",
                };
                return Err(UtilError::InvalidCoordinate {
                    coordinate: coord.to_owned(),
                    reason: format!("{label} is empty"),
                });
            }
        }

        let (Some(group), Some(name), Some(version)) = (parts.first(), parts.get(1), parts.get(2))
        else {
            return Err(UtilError::InvalidCoordinate {
                coordinate: coord.to_owned(),
                reason: "expected at least 3 parts".to_owned(),
            });
        };

        let mut result = Self::new(group, name, version);
        if let Some(classifier) = parts.get(3) {
            result.classifier = Some((*classifier).to_owned());
        }
        Ok(result)
    }

    /// The coordinate without its version: `group:name[:classifier]`.
    ///
    /// Two archives with the same key are the same module at possibly
    /// different versions.
    pub fn version_less_key(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!("{}:{}:{}", self.group, self.name, classifier),
            None => format!("{}:{}", self.group, self.name),
        }
    }

    /// `group:name`, the form used by exclusion rules.
    pub fn module_id(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }
}

impl fmt::Display for ModuleCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}

impl serde::Serialize for ModuleCoordinate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Make `segment` safe to use as a single directory name.
///
/// Each of `% < > : " / ? * \` becomes `@`, and every trailing dot or space
/// is also replaced by `@`.
///
/// # Errors
/// Returns `UtilError::UnnormalizableSegment` when `segment` is empty or
/// consists only of dots and spaces. Callers fall back to the raw string.
pub fn normalize_path_segment(segment: &str) -> Result<String, UtilError> {
    let replaced: String = segment
        .chars()
        .map(|c| {
            if matches!(c, '%' | '<' | '>' | ':' | '"' | '/' | '?' | '*' | '\\') {
                '@'
            } else {
                c
            }
        })
        .collect();

    let kept = replaced.trim_end_matches(['.', ' ']);
    if kept.is_empty() {
        return Err(UtilError::UnnormalizableSegment {
            segment: segment.to_owned(),
        });
    }

    let trailing = replaced.chars().count() - kept.chars().count();
    let mut normalized = String::with_capacity(replaced.len());
    normalized.push_str(kept);
    normalized.extend(std::iter::repeat('@').take(trailing));
    Ok(normalized)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_three_parts() {
        let coord = ModuleCoordinate::parse("com.android.support:appcompat-v7:22.0.0").unwrap();
        assert_eq!(coord.group, "com.android.support");
        assert_eq!(coord.name, "appcompat-v7");
        assert_eq!(coord.version, "22.0.0");
        assert!(coord.classifier.is_none());
    }

    #[test]
    fn parse_four_parts() {
        let coord = ModuleCoordinate::parse("org.example:core:1.0:tests").unwrap();
        assert_eq!(coord.classifier.as_deref(), Some("tests"));
        assert_eq!(coord.to_string(), "org.example:core:1.0:tests");
    }

    #[test]
    fn parse_rejects_too_few_parts() {
        let err = ModuleCoordinate::parse("org.example:core").unwrap_err();
        assert!(err.to_string().contains("2 parts"), "error was: {err}");
    }

    #[test]
    fn parse_rejects_empty_part() {
        let err = ModuleCoordinate::parse("org.example::1.0").unwrap_err();
        assert!(err.to_string().contains("name is empty"), "error was: {err}");
    }

    #[test]
    fn version_less_key_ignores_version() {
        let a = ModuleCoordinate::new("g", "lib", "1.0");
        let b = ModuleCoordinate::new("g", "lib", "2.0");
        assert_eq!(a.version_less_key(), b.version_less_key());
        assert_eq!(a.version_less_key(), "g:lib");
    }

    #[test]
    fn version_less_key_keeps_classifier() {
        let coord = ModuleCoordinate::new("g", "lib", "1.0").with_classifier("tests");
        assert_eq!(coord.version_less_key(), "g:lib:tests");
    }

    #[test]
    fn normalize_replaces_reserved_characters() {
        assert_eq!(normalize_path_segment("a:b").unwrap(), "a@b");
        assert_eq!(normalize_path_segment("x%<>\"/?*\\y").unwrap(), "x@@@@@@@@y");
    }

    #[test]
    fn normalize_replaces_trailing_dots_and_spaces() {
        assert_eq!(normalize_path_segment("name. .").unwrap(), "name@@@");
        assert_eq!(normalize_path_segment("1.0").unwrap(), "1.0");
    }

    #[test]
    fn normalize_only_dots_fails() {
        assert!(normalize_path_segment("...").is_err());
        assert!(normalize_path_segment("").is_err());
    }

    proptest! {
        #[test]
        fn normalized_segments_are_safe(segment in "[a-z.:%<>*/?\"\\\\ ]{1,16}") {
            if let Ok(normalized) = normalize_path_segment(&segment) {
                prop_assert_eq!(normalized.chars().count(), segment.chars().count());
                prop_assert!(!normalized.contains([':', '%', '<', '>', '*', '/', '?', '"', '\\']));
                prop_assert!(!normalized.ends_with('.'));
                prop_assert!(!normalized.ends_with(' '));
            } else {
                prop_assert!(segment.chars().all(|c| c == '.' || c == ' '));
            }
        }

        #[test]
        fn display_parse_identity(
            group in "[a-z]{1,8}(\\.[a-z]{1,8}){0,2}",
            name in "[a-z][a-z0-9-]{0,10}",
            version in "[0-9]{1,2}\\.[0-9]{1,2}",
        ) {
            let coord = ModuleCoordinate::new(&group, &name, &version);
            let reparsed = ModuleCoordinate::parse(&coord.to_string()).unwrap();
            prop_assert_eq!(coord, reparsed);
        }
    }
}
