#![forbid(unsafe_code)]

mod logger;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use trellis_config::manifest::{Manifest, SyncMode, MANIFEST_FILE};
use trellis_engine::reconcile::DependencyReport;
use trellis_engine::{SyncIssue, SyncOptions, SyncResult, VariantManager};
use trellis_variant::VariantType;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "trellis", about = "Variant-aware dependency resolution for Android-style builds")]
#[command(version)]
struct Cli {
    /// Show debug diagnostics
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    /// Only show errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the variants the manifest declares
    Variants,
    /// Show the resolved dependencies of a variant
    Deps {
        /// Variant name (e.g. "freeDebug")
        #[arg(long)]
        variant: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tasks, or the execution order of one variant
    Tasks {
        /// Variant whose task closure to print
        #[arg(long)]
        variant: Option<String>,
    },
    /// Resolve every variant and report dependency issues
    Sync {
        /// Report issues as data instead of failing
        #[arg(long)]
        ide: bool,
        /// Print the sync result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Unpack library bundles
    Prepare {
        /// Only unpack the bundles of this variant
        #[arg(long)]
        variant: Option<String>,
    },
    /// Remove the build directory
    Clean,
}

fn main() {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose, cli.quiet);

    let result = match cli.command {
        Command::Variants => cmd_variants(),
        Command::Deps { variant, json } => cmd_deps(&variant, json),
        Command::Tasks { variant } => cmd_tasks(variant.as_deref()),
        Command::Sync { ide, json } => cmd_sync(ide, json),
        Command::Prepare { variant } => cmd_prepare(variant),
        Command::Clean => cmd_clean(),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

/// Find the project root by looking for `trellis.toml` in the current directory.
fn project_root() -> Result<PathBuf, Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    if !cwd.join(MANIFEST_FILE).exists() {
        return Err(format!("no {MANIFEST_FILE} found in current directory").into());
    }
    Ok(cwd)
}

/// Sync without failing on dependency issues, for read-only commands.
fn inspect(root: &Path) -> Result<SyncResult, Box<dyn Error>> {
    let options = SyncOptions {
        mode: Some(SyncMode::Ide),
        ..SyncOptions::default()
    };
    Ok(trellis_engine::sync(root, &options)?)
}

fn cmd_variants() -> CliResult {
    let root = project_root()?;
    let manifest = Manifest::from_path(&root.join(MANIFEST_FILE))?;
    let variants = VariantManager::new(&manifest).create_variants(None)?;
    for variant in &variants {
        match &variant.tested_variant {
            Some(tested) => println!("{:<32} {} (tests {tested})", variant.name, variant.variant_type),
            None => println!("{:<32} {}", variant.name, variant.variant_type),
        }
    }
    Ok(())
}

fn cmd_deps(variant: &str, json: bool) -> CliResult {
    let root = project_root()?;
    let result = inspect(&root)?;
    let model = result
        .model
        .variant(variant)
        .ok_or_else(|| trellis_engine::EngineError::UnknownVariant {
            name: variant.to_owned(),
        })?;
    let report = model.dependencies.report();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

fn render_report(report: &DependencyReport) -> String {
    let mut out = String::new();
    out.push_str("libraries:\n");
    for library in &report.libraries {
        let optional = if library.optional { " (optional)" } else { "" };
        out.push_str(&format!("  {}{optional}\n", library.coordinate));
        for archive in &library.bundled_archives {
            out.push_str(&format!("    {}\n", archive.display()));
        }
    }
    out.push_str("archives:\n");
    for archive in &report.archives {
        out.push_str(&format!(
            "  {} [{}]\n",
            archive.coordinate,
            scope(archive.compiled, archive.packaged)
        ));
    }
    if !report.local_archives.is_empty() {
        out.push_str("local:\n");
        for (path, local) in &report.local_archives {
            out.push_str(&format!(
                "  {} [{}]\n",
                path.display(),
                scope(local.compiled, local.packaged)
            ));
        }
    }
    for request in &report.unresolved {
        out.push_str(&format!("unresolved: {request}\n"));
    }
    for issue in &report.issues {
        out.push_str(&format!("issue: {issue}\n"));
    }
    out
}

fn scope(compiled: bool, packaged: bool) -> &'static str {
    match (compiled, packaged) {
        (true, true) => "compile, package",
        (true, false) => "compile",
        (false, true) => "package",
        (false, false) => "none",
    }
}

fn cmd_tasks(variant: Option<&str>) -> CliResult {
    let root = project_root()?;
    let result = inspect(&root)?;
    let graph = &result.model.graph;

    let Some(name) = variant else {
        for task in graph.tasks() {
            println!("{:<48} {}", task.key, task.description);
        }
        return Ok(());
    };

    let model = result
        .model
        .variant(name)
        .ok_or_else(|| trellis_engine::EngineError::UnknownVariant {
            name: name.to_owned(),
        })?;
    let target = model.assemble.as_ref().unwrap_or(&model.handle);
    for key in graph.execution_order(target.as_str())? {
        println!("{key}");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SyncReport<'a> {
    project: &'a str,
    mode: SyncMode,
    variants: Vec<VariantReport<'a>>,
    issues: &'a [SyncIssue],
}

#[derive(Debug, Serialize)]
struct VariantReport<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    variant_type: VariantType,
    #[serde(skip_serializing_if = "Option::is_none")]
    tested_variant: Option<&'a str>,
    dependencies: DependencyReport,
}

fn sync_report(result: &SyncResult) -> SyncReport<'_> {
    SyncReport {
        project: &result.project_name,
        mode: result.mode,
        variants: result
            .model
            .variants
            .iter()
            .map(|v| VariantReport {
                name: &v.descriptor.name,
                variant_type: v.descriptor.variant_type,
                tested_variant: v.descriptor.tested_variant.as_deref(),
                dependencies: v.dependencies.report(),
            })
            .collect(),
        issues: result.model.issues.issues(),
    }
}

fn cmd_sync(ide: bool, json: bool) -> CliResult {
    let root = project_root()?;
    let options = SyncOptions {
        mode: ide.then_some(SyncMode::Ide),
        ..SyncOptions::default()
    };
    let result = trellis_engine::sync(&root, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sync_report(&result))?);
        return Ok(());
    }

    for issue in result.model.issues.issues() {
        tracing::warn!("{issue}");
    }
    eprintln!(
        "    Finished sync of {} in {:.2}s ({} issue(s))",
        result.project_name,
        result.duration.as_secs_f64(),
        result.model.issues.len()
    );
    Ok(())
}

fn cmd_prepare(variant: Option<String>) -> CliResult {
    let root = project_root()?;
    let options = SyncOptions {
        mode: None,
        prepare: true,
        variant,
    };
    let result = trellis_engine::sync(&root, &options)?;
    eprintln!(
        "    Prepared {} bundle(s) in {:.2}s",
        result.prepared.len(),
        result.duration.as_secs_f64()
    );
    Ok(())
}

fn cmd_clean() -> CliResult {
    let root = project_root()?;
    if trellis_engine::clean(&root)? {
        eprintln!("    Cleaned build directory");
    } else {
        eprintln!("    Nothing to clean");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_deps() {
        let cli = Cli::try_parse_from(["trellis", "deps", "--variant", "freeDebug", "--json"]).unwrap();
        match cli.command {
            Command::Deps { variant, json } => {
                assert_eq!(variant, "freeDebug");
                assert!(json);
            }
            other => panic!("expected Deps, got {other:?}"),
        }
    }

    #[test]
    fn deps_requires_variant() {
        assert!(Cli::try_parse_from(["trellis", "deps"]).is_err());
    }

    #[test]
    fn parse_sync_flags() {
        let cli = Cli::try_parse_from(["trellis", "sync", "--ide"]).unwrap();
        match cli.command {
            Command::Sync { ide, json } => {
                assert!(ide);
                assert!(!json);
            }
            other => panic!("expected Sync, got {other:?}"),
        }
    }

    #[test]
    fn global_verbosity_after_subcommand() {
        let cli = Cli::try_parse_from(["trellis", "tasks", "--variant", "debug", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.quiet);
        match cli.command {
            Command::Tasks { variant } => assert_eq!(variant.as_deref(), Some("debug")),
            other => panic!("expected Tasks, got {other:?}"),
        }
    }

    #[test]
    fn parse_prepare_and_clean() {
        let cli = Cli::try_parse_from(["trellis", "prepare"]).unwrap();
        assert!(matches!(cli.command, Command::Prepare { variant: None }));
        let cli = Cli::try_parse_from(["trellis", "clean"]).unwrap();
        assert!(matches!(cli.command, Command::Clean));
    }

    #[test]
    fn scope_labels() {
        assert_eq!(scope(true, true), "compile, package");
        assert_eq!(scope(true, false), "compile");
        assert_eq!(scope(false, true), "package");
    }

    fn sample_project() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_FILE),
            "[project]\nname = \"demo\"\n",
        )
        .unwrap();
        std::fs::create_dir_all(tmp.path().join("repo")).unwrap();
        std::fs::write(tmp.path().join("repo/core-1.0.jar"), b"jar").unwrap();
        std::fs::write(
            tmp.path().join("trellis-graph.toml"),
            r#"
[[components]]
coordinate = "com.example:core:1.0"
artifacts = [{ file = "repo/core-1.0.jar", extension = "jar" }]

[configurations.compile]
dependencies = [{ coordinate = "com.example:core:1.0" }, { unresolved = "com.example:gone:2" }]
"#,
        )
        .unwrap();
        tmp
    }

    #[test]
    fn report_renders_archives_and_unresolved() {
        let tmp = sample_project();
        let result = inspect(tmp.path()).unwrap();
        let debug = result.model.variant("debug").unwrap();
        let text = render_report(&debug.dependencies.report());
        assert!(text.contains("com.example:core:1.0 [compile, package]"), "got:\n{text}");
        assert!(text.contains("unresolved: com.example:gone:2"), "got:\n{text}");
    }

    #[test]
    fn sync_report_serializes_variants() {
        let tmp = sample_project();
        let result = inspect(tmp.path()).unwrap();
        let value = serde_json::to_value(sync_report(&result)).unwrap();
        assert_eq!(value["project"], "demo");
        assert_eq!(value["mode"], "ide");
        let names: Vec<&str> = value["variants"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            ["debug", "debugUnitTest", "release", "releaseUnitTest", "debugAndroidTest"]
        );
        assert_eq!(value["variants"][1]["tested_variant"], "debug");
    }
}
