//! Variant enumeration, per-variant resolution, and task graph wiring.

use std::collections::{HashMap, HashSet};

use trellis_config::manifest::{IgnoreRule, Manifest, ProjectKind, SyncMode};
use trellis_variant::name::{capitalize, check_name};
use trellis_variant::{
    create_combinations, VariantAxis, VariantCombo, VariantDescriptor, VariantError, VariantType,
};

use crate::builder::{VariantTaskBuilder, VariantTaskContext};
use crate::error::EngineError;
use crate::graph::DependencyGraphProvider;
use crate::issue::IssueRegistry;
use crate::reconcile::{DependencyReconciler, ReconcileRequest, VariantDependencies};
use crate::resolve::PassSettings;
use crate::session::BuildSession;
use crate::task::{TaskGraph, TaskKey};

pub const ASSEMBLE: &str = "assemble";
pub const TEST: &str = "test";
pub const CONNECTED_CHECK: &str = "connectedCheck";
pub const CHECK: &str = "check";

/// Extra veto applied after the manifest's ignore rules. Returns `true` to
/// skip the variant.
pub type VariantFilter<'a> = &'a dyn Fn(&VariantDescriptor) -> bool;

/// Where dependencies come from and how problems are surfaced.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub provider: &'a dyn DependencyGraphProvider,
    pub settings: &'a PassSettings,
    pub mode: SyncMode,
}

/// One variant with its dependencies and tasks.
#[derive(Debug, Clone)]
pub struct VariantModel {
    pub descriptor: VariantDescriptor,
    pub dependencies: VariantDependencies,
    /// `None` for test variants.
    pub assemble: Option<TaskKey>,
    /// The task returned by the variant's builder.
    pub handle: TaskKey,
}

/// Every variant of a project and the wired task graph.
#[derive(Debug, Default)]
pub struct ProjectModel {
    pub variants: Vec<VariantModel>,
    pub graph: TaskGraph,
    pub issues: IssueRegistry,
}

impl ProjectModel {
    pub fn variant(&self, name: &str) -> Option<&VariantModel> {
        self.variants.iter().find(|v| v.descriptor.name == name)
    }
}

/// Builds the variants declared by a manifest.
#[derive(Debug, Clone)]
pub struct VariantManager {
    kind: ProjectKind,
    dimensions: Vec<String>,
    build_types: Vec<String>,
    flavors: Vec<VariantAxis>,
    test_build_type: String,
    ignore: Vec<IgnoreRule>,
}

impl VariantManager {
    pub fn new(manifest: &Manifest) -> Self {
        let variants = &manifest.variants;
        Self {
            kind: manifest.project.kind,
            dimensions: variants.dimensions.clone(),
            build_types: variants.build_types.iter().map(|b| b.name.clone()).collect(),
            flavors: variants
                .flavors
                .iter()
                .map(|f| match &f.dimension {
                    Some(dimension) => VariantAxis::in_dimension(&f.name, dimension),
                    None => VariantAxis::new(&f.name),
                })
                .collect(),
            test_build_type: variants.test_build_type.clone(),
            ignore: variants.ignore.clone(),
        }
    }

    /// Check build type and flavor names.
    ///
    /// # Errors
    /// Returns an error for reserved or colliding names, no build types, or
    /// a test build type that is not declared.
    pub fn validate(&self) -> Result<(), VariantError> {
        if self.build_types.is_empty() {
            return Err(VariantError::NoBuildTypes);
        }
        let mut seen = HashSet::new();
        let named = self
            .build_types
            .iter()
            .map(|b| ("build type", b.as_str()))
            .chain(self.flavors.iter().map(|f| ("flavor", f.name.as_str())));
        for (kind, name) in named {
            check_name(kind, name)?;
            if !seen.insert(name) {
                return Err(VariantError::NameCollision {
                    name: name.to_owned(),
                });
            }
        }
        if !self.build_types.contains(&self.test_build_type) {
            return Err(VariantError::UnknownTestBuildType {
                name: self.test_build_type.clone(),
            });
        }
        Ok(())
    }

    /// Enumerate every variant, test variants included.
    ///
    /// Order: combos in combinator order, each combo's build types in
    /// declaration order, each variant followed by its unit-test variant,
    /// and the combo's instrumented-test variant last.
    ///
    /// # Errors
    /// Returns an error if names are invalid or flavor dimensions are
    /// inconsistent.
    pub fn create_variants(
        &self,
        filter: Option<VariantFilter<'_>>,
    ) -> Result<Vec<VariantDescriptor>, VariantError> {
        self.validate()?;

        let combos = if self.flavors.is_empty() {
            vec![VariantCombo { axes: Vec::new() }]
        } else {
            create_combinations(&self.dimensions, &self.flavors)?
        };
        let variant_type = match self.kind {
            ProjectKind::Library => VariantType::Library,
            ProjectKind::Application | ProjectKind::Test => VariantType::Application,
        };
        let with_tests = self.kind != ProjectKind::Test;

        let mut variants = Vec::new();
        for combo in &combos {
            let flavor_names: Vec<&str> = combo.axes.iter().map(|a| a.name.as_str()).collect();
            let mut instrumented = None;
            for build_type in &self.build_types {
                let variant = VariantDescriptor::new(build_type, combo, variant_type);
                let ignored = self
                    .ignore
                    .iter()
                    .any(|rule| rule.matches(build_type, &flavor_names))
                    || filter.is_some_and(|f| f(&variant));
                if ignored {
                    tracing::debug!("ignoring variant {}", variant.name);
                    continue;
                }
                if with_tests {
                    let unit = VariantDescriptor::test_of(&variant, VariantType::UnitTest);
                    if *build_type == self.test_build_type {
                        instrumented = Some(VariantDescriptor::test_of(
                            &variant,
                            VariantType::InstrumentedTest,
                        ));
                    }
                    variants.push(variant);
                    variants.push(unit);
                } else {
                    variants.push(variant);
                }
            }
            variants.extend(instrumented);
        }
        Ok(variants)
    }

    /// Resolve every variant. Tested variants are resolved before their tests.
    ///
    /// # Errors
    /// Returns only fatal errors such as `CircularDependency`. Dependency
    /// problems are recorded on each result.
    pub fn resolve_variants(
        &self,
        variants: &[VariantDescriptor],
        ctx: &ResolveContext<'_>,
    ) -> Result<Vec<VariantDependencies>, EngineError> {
        let mut resolved: Vec<VariantDependencies> = Vec::with_capacity(variants.len());
        let mut by_name: HashMap<&str, usize> = HashMap::new();

        for variant in variants {
            let tested = variant
                .tested_variant
                .as_deref()
                .and_then(|name| by_name.get(name).copied())
                .and_then(|i| variants.get(i).zip(resolved.get(i)));

            let mut compile_names = variant.compile_configurations();
            let mut package_names = variant.package_configurations();
            let uses_parents = self.kind == ProjectKind::Library
                || variant.variant_type == VariantType::UnitTest;
            if let (true, Some((tested_variant, _))) = (uses_parents, tested) {
                compile_names.extend(tested_variant.compile_configurations());
                package_names.extend(tested_variant.package_configurations());
            }

            let compile = ctx
                .provider
                .merged_configuration(&format!("{}CompileClasspath", variant.name), &compile_names);
            let package = ctx
                .provider
                .merged_configuration(&format!("{}PackageClasspath", variant.name), &package_names);

            let tested_set = match (self.kind, tested) {
                (ProjectKind::Application, Some((_, deps))) => Some(deps),
                _ => None,
            };

            let request = ReconcileRequest {
                compile: &compile,
                package: &package,
                is_library: self.kind == ProjectKind::Library,
                tested: tested_set,
                mode: ctx.mode,
            };
            let dependencies =
                DependencyReconciler::new(ctx.provider, ctx.settings).reconcile(&request)?;
            tracing::debug!(
                "resolved {}: {} librar(ies), {} archive(s), {} issue(s)",
                variant.name,
                dependencies.library_bundles.len(),
                dependencies.code_archives.len(),
                dependencies.issues.len()
            );

            by_name.insert(variant.name.as_str(), resolved.len());
            resolved.push(dependencies);
        }
        Ok(resolved)
    }

    /// Resolve every variant, run `builder` for each, and wire umbrella tasks.
    ///
    /// All umbrella keys are declared before any edge is added.
    ///
    /// # Errors
    /// Returns fatal resolution errors, builder errors, and task cycles.
    pub fn build_task_graphs(
        &self,
        variants: Vec<VariantDescriptor>,
        ctx: &ResolveContext<'_>,
        builder: &mut dyn VariantTaskBuilder,
        session: &mut BuildSession,
    ) -> Result<ProjectModel, EngineError> {
        let resolved = self.resolve_variants(&variants, ctx)?;
        let mut model = ProjectModel::default();

        let assemble = model.graph.declare(ASSEMBLE, "Assembles all variants.");
        let test = model.graph.declare(TEST, "Runs every unit test variant.");
        let connected = model
            .graph
            .declare(CONNECTED_CHECK, "Runs every instrumented test variant.");
        let check = model.graph.declare(CHECK, "Runs all checks.");

        let mut umbrellas: Vec<Option<Umbrellas>> = Vec::with_capacity(variants.len());
        for variant in &variants {
            umbrellas.push(if variant.is_for_testing() {
                None
            } else {
                Some(Umbrellas::declare(&mut model.graph, variant))
            });
        }

        for ((variant, dependencies), umbrella) in variants.into_iter().zip(resolved).zip(umbrellas) {
            model.issues.extend(&dependencies.issues);

            let handle = {
                let mut task_ctx = VariantTaskContext {
                    graph: &mut model.graph,
                    assemble: umbrella.as_ref().map(|u| &u.variant),
                    prepare: session.prepare_registry_mut(),
                };
                builder.build(&mut task_ctx, &variant, &dependencies)?
            };

            match (&umbrella, variant.variant_type) {
                (Some(u), _) => u.wire(&mut model.graph, &assemble)?,
                (None, VariantType::UnitTest) => model.graph.depend(&test, &handle)?,
                (None, _) => model.graph.depend(&connected, &handle)?,
            }

            model.variants.push(VariantModel {
                descriptor: variant,
                dependencies,
                assemble: umbrella.map(|u| u.variant),
                handle,
            });
        }

        model.graph.depend(&check, &test)?;
        model.graph.validate()?;
        Ok(model)
    }
}

/// Assemble tasks a regular variant belongs to.
struct Umbrellas {
    variant: TaskKey,
    build_type: TaskKey,
    flavors: Vec<TaskKey>,
    combo: Option<TaskKey>,
}

impl Umbrellas {
    fn declare(graph: &mut TaskGraph, variant: &VariantDescriptor) -> Self {
        let build_type = graph.declare(
            &format!("assemble{}", capitalize(&variant.build_type)),
            &format!("Assembles all {} builds.", variant.build_type),
        );
        if variant.flavors.is_empty() {
            return Self {
                variant: build_type.clone(),
                build_type,
                flavors: Vec::new(),
                combo: None,
            };
        }

        let flavors = variant
            .flavors
            .iter()
            .map(|f| {
                graph.declare(
                    &format!("assemble{}", capitalize(&f.name)),
                    &format!("Assembles all {} builds.", f.name),
                )
            })
            .collect();
        let combo = (variant.flavors.len() > 1).then(|| {
            graph.declare(
                &format!("assemble{}", capitalize(&variant.flavor_name)),
                &format!("Assembles all {} builds.", variant.flavor_name),
            )
        });
        let task = graph.declare(
            &format!("assemble{}", capitalize(&variant.name)),
            &format!("Assembles the {} build.", variant.name),
        );
        Self {
            variant: task,
            build_type,
            flavors,
            combo,
        }
    }

    fn wire(&self, graph: &mut TaskGraph, assemble: &TaskKey) -> Result<(), EngineError> {
        graph.depend(assemble, &self.build_type)?;
        let parents = std::iter::once(&self.build_type)
            .chain(&self.flavors)
            .chain(self.combo.as_ref());
        for parent in parents {
            if *parent != self.variant {
                graph.depend(parent, &self.variant)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use trellis_config::manifest::{BuildType, Flavor, Project, SyncSettings, Variants};

    use super::*;
    use crate::builder::StepTaskBuilder;
    use crate::graph::{ConfigurationResult, Edge, ResolutionGraph};
    use crate::issue::IssueKind;
    use crate::resolve::tests::{settings, GraphBuilder};

    fn manifest(kind: ProjectKind, dimensions: &[&str], flavors: &[(&str, &str)]) -> Manifest {
        Manifest {
            project: Project {
                name: "app".to_owned(),
                kind,
                tested_project: None,
                graph: "trellis-graph.toml".to_owned(),
                build_dir: "build".to_owned(),
            },
            variants: Variants {
                dimensions: dimensions.iter().map(|d| (*d).to_owned()).collect(),
                flavors: flavors
                    .iter()
                    .map(|(name, dimension)| Flavor {
                        name: (*name).to_owned(),
                        dimension: (!dimension.is_empty()).then(|| (*dimension).to_owned()),
                    })
                    .collect(),
                ..Variants::default()
            },
            sync: SyncSettings::default(),
        }
    }

    fn names(variants: &[VariantDescriptor]) -> Vec<&str> {
        variants.iter().map(|v| v.name.as_str()).collect()
    }

    fn regular(variants: &[VariantDescriptor]) -> Vec<&str> {
        variants
            .iter()
            .filter(|v| !v.is_for_testing())
            .map(|v| v.name.as_str())
            .collect()
    }

    #[test]
    fn default_build_types_without_flavors() {
        let manager = VariantManager::new(&manifest(ProjectKind::Application, &[], &[]));
        let variants = manager.create_variants(None).unwrap();
        assert_eq!(regular(&variants), ["debug", "release"]);
        assert_eq!(
            names(&variants),
            [
                "debug",
                "debugUnitTest",
                "release",
                "releaseUnitTest",
                "debugAndroidTest"
            ]
        );
    }

    #[test]
    fn single_dimension_flavors() {
        let manager = VariantManager::new(&manifest(
            ProjectKind::Application,
            &[],
            &[("free", ""), ("paid", "")],
        ));
        let variants = manager.create_variants(None).unwrap();
        assert_eq!(
            regular(&variants),
            ["freeDebug", "freeRelease", "paidDebug", "paidRelease"]
        );
        let android_tests: Vec<&str> = variants
            .iter()
            .filter(|v| v.variant_type == VariantType::InstrumentedTest)
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(android_tests, ["freeDebugAndroidTest", "paidDebugAndroidTest"]);
    }

    #[test]
    fn ignore_rules_and_filter_veto_variants() {
        let mut m = manifest(
            ProjectKind::Application,
            &["tier", "abi"],
            &[("free", "tier"), ("paid", "tier"), ("arm", "abi"), ("x86", "abi")],
        );
        m.variants.ignore.push(IgnoreRule {
            build_type: Some("release".to_owned()),
            flavors: vec!["x86".to_owned()],
        });
        let manager = VariantManager::new(&m);
        let no_paid_arm = |v: &VariantDescriptor| v.flavor_name == "paidArm";
        let variants = manager.create_variants(Some(&no_paid_arm)).unwrap();
        assert_eq!(
            regular(&variants),
            [
                "freeArmDebug",
                "freeArmRelease",
                "freeX86Debug",
                "paidX86Debug"
            ]
        );
    }

    #[test]
    fn library_projects_build_library_variants() {
        let manager = VariantManager::new(&manifest(ProjectKind::Library, &[], &[]));
        let variants = manager.create_variants(None).unwrap();
        assert!(variants.first().unwrap().is_library());
    }

    #[test]
    fn test_projects_have_no_test_variants() {
        let manager = VariantManager::new(&manifest(ProjectKind::Test, &[], &[]));
        let variants = manager.create_variants(None).unwrap();
        assert_eq!(names(&variants), ["debug", "release"]);
    }

    #[test]
    fn invalid_names_rejected() {
        let manager = VariantManager::new(&manifest(ProjectKind::Application, &[], &[("testing", "")]));
        assert!(matches!(
            manager.create_variants(None),
            Err(VariantError::ReservedName { .. })
        ));

        let manager = VariantManager::new(&manifest(ProjectKind::Application, &[], &[("debug", "")]));
        assert!(matches!(
            manager.create_variants(None),
            Err(VariantError::NameCollision { .. })
        ));

        let mut m = manifest(ProjectKind::Application, &[], &[]);
        m.variants.test_build_type = "staging".to_owned();
        assert!(matches!(
            VariantManager::new(&m).create_variants(None),
            Err(VariantError::UnknownTestBuildType { .. })
        ));

        let mut m = manifest(ProjectKind::Application, &[], &[]);
        m.variants.build_types.clear();
        assert!(matches!(
            VariantManager::new(&m).create_variants(None),
            Err(VariantError::NoBuildTypes)
        ));

        let mut m = manifest(ProjectKind::Application, &[], &[]);
        m.variants.build_types.push(BuildType {
            name: "lint".to_owned(),
        });
        assert!(VariantManager::new(&m).create_variants(None).is_err());
    }

    fn configuration(graph: &mut ResolutionGraph, name: &str, roots: &[crate::graph::ComponentId]) {
        graph.add_configuration(ConfigurationResult {
            name: name.to_owned(),
            roots: roots.iter().map(|id| Edge::Resolved(*id)).collect(),
            files: Vec::new(),
            failed: false,
        });
    }

    fn build(
        manager: &VariantManager,
        graph: &ResolutionGraph,
        session: &mut BuildSession,
    ) -> Result<ProjectModel, EngineError> {
        let variants = manager.create_variants(None)?;
        let s = settings();
        let ctx = ResolveContext {
            provider: graph,
            settings: &s,
            mode: SyncMode::Standard,
        };
        manager.build_task_graphs(variants, &ctx, &mut StepTaskBuilder, session)
    }

    fn depends_on(model: &ProjectModel, task: &str) -> Vec<String> {
        model
            .graph
            .get(task)
            .unwrap()
            .depends_on
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn flavored_umbrellas_are_wired() {
        let manager = VariantManager::new(&manifest(
            ProjectKind::Application,
            &[],
            &[("free", ""), ("paid", "")],
        ));
        let mut session = BuildSession::create();
        let model = build(&manager, &ResolutionGraph::new(), &mut session).unwrap();

        assert_eq!(depends_on(&model, "assemble"), ["assembleDebug", "assembleRelease"]);
        assert_eq!(
            depends_on(&model, "assembleDebug"),
            ["assembleFreeDebug", "assemblePaidDebug"]
        );
        assert_eq!(
            depends_on(&model, "assembleFree"),
            ["assembleFreeDebug", "assembleFreeRelease"]
        );
        assert_eq!(depends_on(&model, "assembleFreeDebug"), ["packageFreeDebug"]);
        assert_eq!(
            depends_on(&model, "test"),
            [
                "testFreeDebugUnitTest",
                "testFreeReleaseUnitTest",
                "testPaidDebugUnitTest",
                "testPaidReleaseUnitTest"
            ]
        );
        assert_eq!(
            depends_on(&model, "connectedCheck"),
            ["connectedFreeDebugAndroidTest", "connectedPaidDebugAndroidTest"]
        );
        assert_eq!(depends_on(&model, "check"), ["test"]);
    }

    #[test]
    fn combo_umbrella_for_multiple_dimensions() {
        let manager = VariantManager::new(&manifest(
            ProjectKind::Application,
            &["tier", "abi"],
            &[("free", "tier"), ("arm", "abi")],
        ));
        let mut session = BuildSession::create();
        let model = build(&manager, &ResolutionGraph::new(), &mut session).unwrap();
        assert_eq!(
            depends_on(&model, "assembleFreeArm"),
            ["assembleFreeArmDebug", "assembleFreeArmRelease"]
        );
        assert!(model.graph.contains("assembleArm"));
    }

    #[test]
    fn flavorless_variant_assembles_through_build_type() {
        let manager = VariantManager::new(&manifest(ProjectKind::Application, &[], &[]));
        let mut session = BuildSession::create();
        let model = build(&manager, &ResolutionGraph::new(), &mut session).unwrap();
        assert_eq!(depends_on(&model, "assembleDebug"), ["packageDebug"]);
        let debug = model.variant("debug").unwrap();
        assert_eq!(debug.assemble.as_ref().unwrap().as_str(), "assembleDebug");
        let order: Vec<String> = model
            .graph
            .execution_order("assembleDebug")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            order,
            [
                "preBuild",
                "preDebugBuild",
                "prepareDebugDependencies",
                "compileDebugSources",
                "packageDebug",
                "assembleDebug"
            ]
        );
    }

    #[test]
    fn library_variants_bundle() {
        let manager = VariantManager::new(&manifest(ProjectKind::Library, &[], &[]));
        let mut session = BuildSession::create();
        let model = build(&manager, &ResolutionGraph::new(), &mut session).unwrap();
        assert_eq!(depends_on(&model, "assembleRelease"), ["bundleRelease"]);
        assert!(depends_on(&model, "connectedDebugAndroidTest").contains(&"bundleDebug".to_owned()));
    }

    #[test]
    fn shared_bundle_gets_one_prepare_task() {
        let mut b = GraphBuilder::new();
        let appcompat = b.module("com.android.support:appcompat-v7:22.0.0", "aar");
        configuration(&mut b.graph, "compile", &[appcompat]);

        let manager = VariantManager::new(&manifest(ProjectKind::Application, &[], &[]));
        let mut session = BuildSession::create();
        let model = build(&manager, &b.graph, &mut session).unwrap();

        assert_eq!(session.prepare_registry().len(), 1);
        let task = "prepareComAndroidSupportAppcompatV72200Library";
        for variant in ["Debug", "Release", "DebugUnitTest"] {
            let deps = depends_on(&model, &format!("prepare{variant}Dependencies"));
            assert!(deps.contains(&task.to_owned()), "{variant}: {deps:?}");
        }
        assert_eq!(depends_on(&model, task), ["preBuild"]);
        assert!(model.issues.is_empty());
    }

    #[test]
    fn instrumented_test_skips_packaging_tested_archives() {
        let mut b = GraphBuilder::new();
        let guava = b.module("com.google.guava:guava:18.0", "jar");
        let junit = b.module("junit:junit:4.12", "jar");
        configuration(&mut b.graph, "compile", &[guava]);
        configuration(&mut b.graph, "androidTestCompile", &[guava, junit]);

        let manager = VariantManager::new(&manifest(ProjectKind::Application, &[], &[]));
        let mut session = BuildSession::create();
        let model = build(&manager, &b.graph, &mut session).unwrap();

        let test = &model.variant("debugAndroidTest").unwrap().dependencies;
        let packaged: Vec<String> = test
            .packaged_archives()
            .map(|n| n.coordinate.to_string())
            .collect();
        assert_eq!(packaged, ["junit:junit:4.12"]);
        assert_eq!(test.compiled_archives().count(), 2);
    }

    #[test]
    fn dependency_issues_are_collected_once_per_project() {
        let mut b = GraphBuilder::new();
        let app = b.module("g:other-app:1", "apk");
        configuration(&mut b.graph, "compile", &[app]);

        let manager = VariantManager::new(&manifest(ProjectKind::Application, &[], &[]));
        let mut session = BuildSession::create();
        let model = build(&manager, &b.graph, &mut session).unwrap();

        assert_eq!(model.issues.len(), 1);
        assert_eq!(
            model.issues.issues().first().unwrap().kind,
            IssueKind::DependencyIsApk
        );
        assert_eq!(model.variant("release").unwrap().dependencies.issues.len(), 1);
    }

    #[test]
    fn project_cycle_fails_the_build() {
        let mut b = GraphBuilder::new();
        let a = b.project("p:a:1", "aar", ":a");
        let c = b.project("p:c:1", "aar", ":c");
        b.depends(a, c);
        b.depends(c, a);
        configuration(&mut b.graph, "compile", &[a]);

        let manager = VariantManager::new(&manifest(ProjectKind::Application, &[], &[]));
        let mut session = BuildSession::create();
        let err = build(&manager, &b.graph, &mut session).unwrap_err();
        assert!(matches!(err, EngineError::CircularDependency { .. }));
    }
}
