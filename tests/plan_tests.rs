//! Build plan loading, validation and target resolution.

use anyhow::{Context, Result, ensure};
use camino::Utf8PathBuf;
use ninjaweave::graph::TargetGraphError;
use ninjaweave::plan::{BuildPlan, PlanError};
use rstest::{fixture, rstest};

const HEADER: &str = "context:\n  intermediates_dir: obj\n";

#[fixture]
fn sample() -> Result<BuildPlan> {
    let path = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/plan.yml");
    BuildPlan::from_path(&path).context("load sample plan")
}

#[rstest]
fn sample_plan_resolves_targets_with_environments(sample: Result<BuildPlan>) -> Result<()> {
    let plan = sample?;
    ensure!(plan.context.configuration.as_deref() == Some("Debug"), "context parsed");
    ensure!(plan.tools.len() == 4, "tool catalogue parsed");

    let resolved = plan.resolve_targets()?;
    let names: Vec<_> = resolved.keys().map(String::as_str).collect();
    ensure!(names == ["Core", "App"], "targets without environment drop out: {names:?}");

    let core = resolved.get("Core").context("Core")?;
    let executables: Vec<_> = core.invocations.iter().map(|i| i.executable.as_str()).collect();
    ensure!(
        executables == ["/usr/bin/cc", "/usr/bin/libtool"],
        "compile then archive: {executables:?}"
    );

    let app = resolved.get("App").context("App")?;
    let executables: Vec<_> = app.invocations.iter().map(|i| i.executable.as_str()).collect();
    ensure!(
        executables == ["/usr/bin/clang", "/bin/sh", "/usr/bin/clang", "/usr/bin/dsymutil"],
        "compile, script, link, symbols: {executables:?}"
    );
    let script = app.invocations.get(1).context("script invocation")?;
    let aux = script.auxiliary_files.first().context("auxiliary file")?;
    ensure!(aux.contents == b"#!/bin/sh\necho hello\n" && aux.executable, "{aux:?}");
    Ok(())
}

#[rstest]
fn sample_plan_graph_follows_declaration_order(sample: Result<BuildPlan>) -> Result<()> {
    let graph = sample?.graph()?;
    ensure!(graph.targets().collect::<Vec<_>>() == ["Core", "App", "Docs"], "order");
    ensure!(graph.dependencies("Docs").collect::<Vec<_>>() == ["App"], "Docs deps");
    Ok(())
}

#[rstest]
fn link_invocations_use_the_archive_linker_for_static_libraries(
    sample: Result<BuildPlan>,
) -> Result<()> {
    let plan = sample?;
    let core = plan.target("Core")?;
    let planned = plan.link_invocations(core)?;
    let archive = planned.first().context("archive")?;
    ensure!(
        archive.outputs == ["products/libCore.a"],
        "{:?}",
        archive.outputs
    );
    ensure!(
        archive.inputs == ["obj/Core.build/Objects-normal/x86_64/core.o"],
        "only .o outputs are archived: {:?}",
        archive.inputs
    );
    ensure!(plan.link_invocations(plan.target("Docs")?)?.is_empty(), "no linkage");
    Ok(())
}

#[rstest]
fn unknown_targets_are_reported(sample: Result<BuildPlan>) -> Result<()> {
    let plan = sample?;
    let err = plan.target("Missing").err().context("lookup should fail")?;
    ensure!(matches!(err, PlanError::UnknownTarget { ref name } if name == "Missing"));
    Ok(())
}

#[rstest]
#[case::cycle(
    "targets:\n  - name: A\n    depends_on: [B]\n  - name: B\n    depends_on: [A]\n",
    "cycle"
)]
#[case::unknown_dependency("targets:\n  - name: A\n    depends_on: [Ghost]\n", "unknown")]
#[case::duplicate("targets:\n  - name: A\n  - name: A\n", "duplicate")]
fn invalid_graphs_are_rejected_on_load(#[case] targets: &str, #[case] kind: &str) -> Result<()> {
    let yaml = format!("{HEADER}{targets}");
    let err = BuildPlan::from_str_named(&yaml, "plan.yml")
        .err()
        .context("plan should be rejected")?;
    let matched = match (&err, kind) {
        (PlanError::Graph(TargetGraphError::Cycle { cycle }), "cycle") => {
            cycle.first() == cycle.last()
        }
        (PlanError::Graph(TargetGraphError::UnknownDependency { dependency, .. }), "unknown") => {
            dependency == "Ghost"
        }
        (PlanError::DuplicateTarget { name }, "duplicate") => name == "A",
        _ => false,
    };
    ensure!(matched, "unexpected error for {kind}: {err:?}");
    Ok(())
}

#[test]
fn linkage_without_environment_is_an_error() -> Result<()> {
    let yaml = format!(
        "{HEADER}targets:\n  - name: A\n    linkage:\n      executable_name: A\n      executable_path: A\n      object_file_dir: obj/A\n"
    );
    let plan = BuildPlan::from_str_named(&yaml, "plan.yml")?;
    let err = plan.resolve_targets().err();
    ensure!(err.is_none(), "targets without environment are skipped, not linked");
    let err = plan
        .link_invocations(plan.target("A")?)
        .err()
        .context("linking should fail")?;
    ensure!(matches!(err, PlanError::LinkageWithoutEnvironment { .. }), "{err:?}");
    Ok(())
}

#[test]
fn missing_tools_surface_as_linkage_errors() -> Result<()> {
    let yaml = format!(
        "{HEADER}targets:\n  - name: A\n    environment:\n      working_directory: .\n      temp_dir: obj/A.build\n      products_dir: products\n    linkage:\n      executable_name: A\n      executable_path: A\n      object_file_dir: obj/A\n"
    );
    let plan = BuildPlan::from_str_named(&yaml, "plan.yml")?;
    let err = plan.resolve_targets().err().context("tools are missing")?;
    ensure!(
        matches!(&err, PlanError::Linkage { name, .. } if name == "A"),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn malformed_yaml_reports_location() -> Result<()> {
    let err = BuildPlan::from_str_named("context: [unterminated\n", "broken.yml")
        .err()
        .context("parse should fail")?;
    ensure!(matches!(err, PlanError::Parse { .. }), "{err:?}");
    let detail = format!("{:?}", miette::Report::new(err));
    ensure!(detail.contains("YAML parse error"), "{detail}");
    Ok(())
}
