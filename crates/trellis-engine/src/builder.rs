//! The per-variant task builder seam and the conventional step tasks.

use trellis_variant::name::capitalize;
use trellis_variant::{VariantDescriptor, VariantType};

use crate::error::EngineError;
use crate::prepare::PrepareTaskRegistry;
use crate::reconcile::VariantDependencies;
use crate::task::{TaskGraph, TaskKey};

/// Name of the task every variant's pre-build step runs after.
pub const PRE_BUILD: &str = "preBuild";

/// What a builder may touch while wiring one variant.
pub struct VariantTaskContext<'a> {
    pub graph: &'a mut TaskGraph,
    /// The variant's assemble task. `None` for test variants.
    pub assemble: Option<&'a TaskKey>,
    pub prepare: &'a mut PrepareTaskRegistry,
}

/// Creates the build steps of one variant.
///
/// Implementations must attach their final step to `ctx.assemble` when it
/// is present, and return the task that represents the variant: the
/// package step for regular variants, the test run for test variants.
pub trait VariantTaskBuilder {
    fn build(
        &mut self,
        ctx: &mut VariantTaskContext<'_>,
        variant: &VariantDescriptor,
        dependencies: &VariantDependencies,
    ) -> Result<TaskKey, EngineError>;
}

/// Declares `pre<V>Build`, `prepare<V>Dependencies`, the shared
/// `prepare<Library>Library` tasks, `compile<V>Sources`, and the final
/// package, bundle, or test step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepTaskBuilder;

impl VariantTaskBuilder for StepTaskBuilder {
    fn build(
        &mut self,
        ctx: &mut VariantTaskContext<'_>,
        variant: &VariantDescriptor,
        dependencies: &VariantDependencies,
    ) -> Result<TaskKey, EngineError> {
        let v = capitalize(&variant.name);
        let pre_build = ctx.graph.declare(PRE_BUILD, "Runs before any variant is built.");

        let pre = ctx
            .graph
            .declare(&format!("pre{v}Build"), &format!("Prepares the {} build.", variant.name));
        ctx.graph.depend(&pre, &pre_build)?;

        let prepare = ctx.graph.declare(
            &format!("prepare{v}Dependencies"),
            &format!("Unpacks the library bundles of {}.", variant.name),
        );
        ctx.graph.depend(&prepare, &pre)?;

        for library in dependencies.libraries() {
            let Some((name, coordinate)) = ctx
                .prepare
                .get_or_create(library)
                .map(|t| (t.name.clone(), t.coordinate.to_string()))
            else {
                continue;
            };
            let task = ctx.graph.declare(&name, &format!("Unpacks {coordinate}."));
            ctx.graph.depend(&task, &pre_build)?;
            ctx.graph.depend(&prepare, &task)?;
        }

        let compile = ctx.graph.declare(
            &format!("compile{v}Sources"),
            &format!("Compiles the {} sources.", variant.name),
        );
        ctx.graph.depend(&compile, &prepare)?;

        let tested = variant.tested_variant.as_deref().map(capitalize);

        match variant.variant_type {
            VariantType::UnitTest => {
                if let Some(tested) = &tested {
                    link_if_declared(ctx.graph, &compile, &format!("compile{tested}Sources"))?;
                }
                let run = ctx
                    .graph
                    .declare(&format!("test{v}"), &format!("Runs the {} tests.", variant.name));
                ctx.graph.depend(&run, &compile)?;
                Ok(run)
            }
            VariantType::InstrumentedTest => {
                let package = ctx.graph.declare(
                    &format!("package{v}"),
                    &format!("Packages the {} test application.", variant.name),
                );
                ctx.graph.depend(&package, &compile)?;
                let run = ctx.graph.declare(
                    &format!("connected{v}"),
                    &format!("Runs the {} tests on connected devices.", variant.name),
                );
                ctx.graph.depend(&run, &package)?;
                if let Some(tested) = &tested {
                    link_if_declared(ctx.graph, &run, &format!("package{tested}"))?;
                    link_if_declared(ctx.graph, &run, &format!("bundle{tested}"))?;
                }
                Ok(run)
            }
            VariantType::Application | VariantType::Library => {
                let verb = if variant.is_library() { "bundle" } else { "package" };
                let package = ctx.graph.declare(
                    &format!("{verb}{v}"),
                    &format!("Packages the {} output.", variant.name),
                );
                ctx.graph.depend(&package, &compile)?;
                if let Some(assemble) = ctx.assemble {
                    ctx.graph.depend(assemble, &package)?;
                }
                Ok(package)
            }
        }
    }
}

fn link_if_declared(graph: &mut TaskGraph, from: &TaskKey, on: &str) -> Result<(), EngineError> {
    if graph.contains(on) {
        graph.depend(from, &TaskKey::new(on))?;
    }
    Ok(())
}
