//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! loads the build plan and runs the requested command.

use std::env;
use std::io::{self, Write};

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::{info, warn};

use crate::assemble::{BuildAssembler, BuildReport};
use crate::cli::{Cli, Commands, GenerateArgs};
use crate::plan::BuildPlan;
use crate::tools::{BuiltinToolDirectory, BuiltinToolResolver, NoBuiltinTools};

/// Execute the parsed [`Cli`] command.
///
/// # Errors
///
/// Returns an error if the plan cannot be loaded, linkage planning fails or
/// a generated file cannot be written.
pub fn run(cli: &Cli) -> Result<()> {
    if let Some(dir) = &cli.directory {
        env::set_current_dir(dir).with_context(|| format!("changing directory to {dir}"))?;
    }
    let plan = BuildPlan::from_path(&cli.file)
        .with_context(|| format!("loading build plan at {}", cli.file))?;

    match &cli.command {
        Commands::Generate(args) => generate(cli, &plan, args),
        Commands::Link { target } => link(&plan, target),
        Commands::Targets => list_targets(&plan),
    }
}

fn builtin_resolver(cli: &Cli) -> Box<dyn BuiltinToolResolver> {
    cli.builtin_dir.as_ref().map_or_else(
        || Box::new(NoBuiltinTools) as Box<dyn BuiltinToolResolver>,
        |dir| Box::new(BuiltinToolDirectory::new(dir.clone())),
    )
}

fn generate(cli: &Cli, plan: &BuildPlan, args: &GenerateArgs) -> Result<()> {
    let graph = plan.graph().context("validating target graph")?;
    let targets = plan.resolve_targets().context("resolving targets")?;
    let builtins = builtin_resolver(cli);
    let report = BuildAssembler::new(&plan.context, builtins.as_ref())
        .dry_run(args.dry_run)
        .assemble(&graph, &targets)
        .context("assembling build graph")?;
    summarise(&report);

    let mut stderr = io::stderr().lock();
    writeln!(stderr, "Wrote build graph: {}", report.root_graph)
        .context("writing summary to stderr")?;
    Ok(())
}

fn summarise(report: &BuildReport) {
    if !report.skipped_targets.is_empty() {
        warn!(
            targets = %report.skipped_targets.iter().join(", "),
            "targets skipped without an environment"
        );
    }
    for unresolved in &report.unresolved {
        warn!(
            target_name = %unresolved.target,
            executable = %unresolved.executable,
            "invocation skipped"
        );
    }
    info!(
        sub_graphs = report.sub_graphs.len(),
        directories = report.directory_edges,
        collisions = report.collisions.len(),
        "assembly complete"
    );
}

fn link(plan: &BuildPlan, name: &str) -> Result<()> {
    let target = plan.target(name)?;
    let invocations = plan.link_invocations(target)?;
    let json =
        serde_json::to_string_pretty(&invocations).context("serialising link invocations")?;
    write_stdout(&format!("{json}\n"))
}

fn list_targets(plan: &BuildPlan) -> Result<()> {
    let listing: String = plan
        .targets
        .iter()
        .map(|target| {
            if target.depends_on.is_empty() {
                format!("{}\n", target.name)
            } else {
                format!("{}: {}\n", target.name, target.depends_on.join(", "))
            }
        })
        .collect();
    write_stdout(&listing)
}

fn write_stdout(content: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write_all_ignoring_broken_pipe(&mut stdout, content.as_bytes())
        .context("writing to stdout")?;
    match stdout.flush() {
        Err(err) if err.kind() != io::ErrorKind::BrokenPipe => {
            Err(err).context("flushing stdout")
        }
        _ => Ok(()),
    }
}

fn write_all_ignoring_broken_pipe(writer: &mut impl Write, buf: &[u8]) -> io::Result<()> {
    match writer.write_all(buf) {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn broken_pipes_are_not_errors() {
        assert!(write_all_ignoring_broken_pipe(&mut BrokenPipe, b"data").is_ok());
    }

    #[test]
    fn other_write_errors_propagate() {
        let mut full: &mut [u8] = &mut [];
        let err = write_all_ignoring_broken_pipe(&mut full, b"data").expect_err("no space");
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }
}
