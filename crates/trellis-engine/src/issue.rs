//! Recoverable dependency problems, collected as data.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;

/// How a sync issue affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// The kind of dependency problem. Codes are stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    UnresolvedDependency,
    DependencyIsApk,
    DependencyIsApklib,
    NonJarLocalDep,
    NonJarPackageDep,
    NonJarProvidedDep,
    JarDependsOnAar,
    MismatchDep,
}

impl IssueKind {
    pub fn code(self) -> u32 {
        match self {
            Self::UnresolvedDependency => 2,
            Self::DependencyIsApk => 3,
            Self::DependencyIsApklib => 4,
            Self::NonJarLocalDep => 5,
            Self::NonJarPackageDep => 6,
            Self::NonJarProvidedDep => 7,
            Self::JarDependsOnAar => 8,
            Self::MismatchDep => 9,
        }
    }

    /// Every dependency problem fails a standard-mode run.
    pub fn severity(self) -> Severity {
        Severity::Error
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnresolvedDependency => "UNRESOLVED_DEPENDENCY",
            Self::DependencyIsApk => "DEPENDENCY_IS_APK",
            Self::DependencyIsApklib => "DEPENDENCY_IS_APKLIB",
            Self::NonJarLocalDep => "NON_JAR_LOCAL_DEP",
            Self::NonJarPackageDep => "NON_JAR_PACKAGE_DEP",
            Self::NonJarProvidedDep => "NON_JAR_PROVIDED_DEP",
            Self::JarDependsOnAar => "JAR_DEPENDS_ON_AAR",
            Self::MismatchDep => "MISMATCH_DEP",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dependency problem found while resolving a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncIssue {
    pub kind: IssueKind,
    /// What the issue is about: a coordinate, a module id, or a file path.
    pub subject: String,
    pub message: String,
}

impl SyncIssue {
    pub fn new(kind: IssueKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn unresolved(request: &str) -> Self {
        Self::new(
            IssueKind::UnresolvedDependency,
            request,
            format!("Unable to resolve dependency '{request}'"),
        )
    }

    pub fn dependency_is_apk(name: &str, project: &str, file: &Path) -> Self {
        Self::new(
            IssueKind::DependencyIsApk,
            name,
            format!(
                "Dependency {name} on project {project} resolves to an APK archive which is not supported as a compilation dependency. File: {}",
                file.display()
            ),
        )
    }

    pub fn dependency_is_apklib(name: &str) -> Self {
        Self::new(
            IssueKind::DependencyIsApklib,
            name,
            format!(
                "Packaging for dependency {name} is 'apklib' and is not supported. Only 'aar' libraries are supported."
            ),
        )
    }

    pub fn jar_depends_on_aar(name: &str, module: &str) -> Self {
        Self::new(
            IssueKind::JarDependsOnAar,
            name,
            format!("Module '{module}' depends on one or more library bundles but is a jar"),
        )
    }

    pub fn non_jar_provided(project: &str, coordinate: &str) -> Self {
        Self::new(
            IssueKind::NonJarProvidedDep,
            coordinate,
            format!(
                "Project {project}: provided dependencies can only be jars. {coordinate} is a library bundle."
            ),
        )
    }

    pub fn non_jar_package(project: &str, coordinate: &str) -> Self {
        Self::new(
            IssueKind::NonJarPackageDep,
            coordinate,
            format!(
                "Project {project}: package dependencies can only be jars. {coordinate} is a library bundle."
            ),
        )
    }

    pub fn non_jar_local(project: &str, file: &Path) -> Self {
        let path = file.display().to_string();
        Self::new(
            IssueKind::NonJarLocalDep,
            path.clone(),
            format!(
                "Project {project}: only jar-type local dependencies are supported. Cannot handle: {path}"
            ),
        )
    }

    pub fn mismatch(module: &str, tested_version: &str, test_version: &str) -> Self {
        Self::new(
            IssueKind::MismatchDep,
            module,
            format!(
                "Conflict with dependency '{module}'. Resolved versions for app ({tested_version}) and test app ({test_version}) differ."
            ),
        )
    }
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Project-level issue list, deduplicated by kind and subject across variants.
#[derive(Debug, Default)]
pub struct IssueRegistry {
    seen: HashSet<(IssueKind, String)>,
    issues: Vec<SyncIssue>,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `issue` unless an equal kind/subject pair is already known.
    /// Returns whether it was new.
    pub fn record(&mut self, issue: SyncIssue) -> bool {
        if !self.seen.insert((issue.kind, issue.subject.clone())) {
            return false;
        }
        self.issues.push(issue);
        true
    }

    pub fn extend<'a>(&mut self, issues: impl IntoIterator<Item = &'a SyncIssue>) {
        for issue in issues {
            self.record(issue.clone());
        }
    }

    pub fn issues(&self) -> &[SyncIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Number of issues that fail a standard-mode run.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity() == Severity::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(IssueKind::UnresolvedDependency.code(), 2);
        assert_eq!(IssueKind::JarDependsOnAar.code(), 8);
        assert_eq!(IssueKind::MismatchDep.code(), 9);
    }

    #[test]
    fn registry_deduplicates_by_kind_and_subject() {
        let mut registry = IssueRegistry::new();
        assert!(registry.record(SyncIssue::unresolved("g:a:1")));
        assert!(!registry.record(SyncIssue::unresolved("g:a:1")));
        assert!(registry.record(SyncIssue::unresolved("g:b:1")));
        assert!(registry.record(SyncIssue::dependency_is_apklib("g:a:1")));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.error_count(), 3);
    }

    #[test]
    fn display_includes_kind() {
        let issue = SyncIssue::mismatch("g:lib", "1.0", "2.0");
        assert_eq!(
            issue.to_string(),
            "[MISMATCH_DEP] Conflict with dependency 'g:lib'. Resolved versions for app (1.0) and test app (2.0) differ."
        );
    }
}
