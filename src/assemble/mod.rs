//! Whole-build Ninja graph assembly.
//!
//! The root file declares the single `invoke` rule, one begin and one finish
//! marker per target, every output-directory edge, and a `subninja` include
//! for each target's own file. Begin markers wait (order-only) on the finish
//! markers of the target's direct dependencies, so targets start in
//! dependency order while Ninja remains free to run independent targets in
//! parallel.
//!
//! ```text
//! begin-target-Lib ─► Lib invocations ─► finish-target-Lib
//!                                              │
//!                                              ▼
//!                     begin-target-App ─► App invocations ─► finish-target-App
//! ```

mod files;
mod placeholders;
mod target;

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use placeholders::{Placeholder, PlaceholderCollision, PlaceholderRegistry, PlaceholderSource};
pub use target::{INVOKE_RULE, TargetAssembler, TargetEdges};

use crate::graph::TargetGraph;
use crate::invocation::ToolInvocation;
use crate::naming::{begin_marker, finish_marker};
use crate::ninja_gen::{BuildEdge, NinjaWriter};
use crate::target::{NINJA_FILE_NAME, ResolvedTarget, TargetResolver};
use crate::tools::BuiltinToolResolver;

/// First comment line of every generated Ninja file.
pub const GENERATOR_COMMENT: &str = "ninjaweave";

/// Errors that abort assembly.
#[derive(Debug, Error, Diagnostic)]
pub enum AssembleError {
    /// A root or per-target Ninja file could not be written.
    #[error("failed to write Ninja file {path}")]
    #[diagnostic(code(ninjaweave::assemble::write_graph))]
    WriteGraph {
        /// Destination that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// An auxiliary file requested by an invocation could not be written.
    #[error("failed to write auxiliary file {path}")]
    #[diagnostic(code(ninjaweave::assemble::write_auxiliary))]
    WriteAuxiliary {
        /// Destination that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// An invocation dropped because its executable could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedExecutable {
    /// Target owning the invocation.
    pub target: String,
    /// Executable as written in the invocation.
    pub executable: String,
}

/// Output directories that already have a creation edge.
#[derive(Debug, Default)]
pub struct OutputDirectories {
    seen: IndexSet<Utf8PathBuf>,
}

impl OutputDirectories {
    /// Record `dir`; returns `false` when it was already present.
    pub fn insert(&mut self, dir: Utf8PathBuf) -> bool {
        self.seen.insert(dir)
    }

    /// Whether a creation edge exists for `dir`.
    #[must_use]
    pub fn contains(&self, dir: &Utf8Path) -> bool {
        self.seen.contains(dir)
    }

    /// Directories in the order their edges were emitted.
    pub fn iter(&self) -> impl Iterator<Item = &Utf8Path> {
        self.seen.iter().map(Utf8PathBuf::as_path)
    }

    /// Number of directories recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no directory has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// State shared by every target during one assembly pass.
#[derive(Debug, Default)]
pub struct BuildState {
    /// Output directories with a creation edge.
    pub directories: OutputDirectories,
    /// Placeholder names handed out so far.
    pub placeholders: PlaceholderRegistry,
    /// Phony inputs that already have a no-op edge.
    pub phony_inputs: IndexSet<Utf8PathBuf>,
    /// Paths a real edge produces somewhere in the build: runnable
    /// invocation outputs and their directories.
    pub produced: IndexSet<Utf8PathBuf>,
}

impl BuildState {
    /// Record the paths `invocations` will produce so no phony edge is
    /// written for them, whichever target declares them first.
    pub fn record_produced(&mut self, invocations: &[ToolInvocation]) {
        for invocation in invocations {
            for output in &invocation.outputs {
                if let Some(dir) = target::output_directory(output) {
                    self.produced.insert(dir.to_owned());
                }
                if !invocation.is_marker() {
                    self.produced.insert(output.clone());
                }
            }
        }
    }
}

/// Build-wide facts recorded in the root file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildContext {
    /// Directory receiving the root Ninja file; bound as `builddir`.
    pub intermediates_dir: Utf8PathBuf,
    /// Build action, for example `build`.
    #[serde(default = "default_action")]
    pub action: String,
    /// Project being built, if built from a project.
    #[serde(default)]
    pub project: Option<String>,
    /// Workspace being built, if built from a workspace.
    #[serde(default)]
    pub workspace: Option<String>,
    /// Scheme name.
    #[serde(default)]
    pub scheme: Option<String>,
    /// Configuration name.
    #[serde(default)]
    pub configuration: Option<String>,
}

fn default_action() -> String {
    "build".to_owned()
}

impl BuildContext {
    /// Path of the root Ninja file.
    #[must_use]
    pub fn root_graph_path(&self) -> Utf8PathBuf {
        self.intermediates_dir.join(NINJA_FILE_NAME)
    }

    fn header_lines(&self) -> Vec<String> {
        let mut lines = vec![GENERATOR_COMMENT.to_owned(), format!("Action: {}", self.action)];
        if let Some(workspace) = &self.workspace {
            lines.push(format!("Workspace: {workspace}"));
        }
        if let Some(project) = &self.project {
            lines.push(format!("Project: {project}"));
        }
        if let Some(scheme) = &self.scheme {
            lines.push(format!("Scheme: {scheme}"));
        }
        if let Some(configuration) = &self.configuration {
            lines.push(format!("Configuration: {configuration}"));
        }
        lines
    }
}

/// Outcome of a whole-build assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Path of the root Ninja file.
    pub root_graph: Utf8PathBuf,
    /// Per-target Ninja files, in target order.
    pub sub_graphs: IndexMap<String, Utf8PathBuf>,
    /// Targets skipped because no environment was available.
    pub skipped_targets: Vec<String>,
    /// Invocations skipped because their executable was not found.
    pub unresolved: Vec<UnresolvedExecutable>,
    /// Phony outputs whose placeholder name had to be disambiguated.
    pub collisions: Vec<PlaceholderCollision>,
    /// Number of output-directory edges in the root file.
    pub directory_edges: usize,
}

/// Drives [`TargetAssembler`] over every target and writes the root file.
pub struct BuildAssembler<'a> {
    context: &'a BuildContext,
    builtins: &'a dyn BuiltinToolResolver,
    dry_run: bool,
}

impl<'a> BuildAssembler<'a> {
    /// Prepare an assembler for `context`.
    #[must_use]
    pub const fn new(context: &'a BuildContext, builtins: &'a dyn BuiltinToolResolver) -> Self {
        Self {
            context,
            builtins,
            dry_run: false,
        }
    }

    /// Skip auxiliary files when `dry_run` is set. Graph files are still
    /// written.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Assemble every target in `graph` and write all Ninja files.
    ///
    /// # Errors
    ///
    /// Returns an [`AssembleError`] when a Ninja file or auxiliary file
    /// cannot be written. Targets the resolver cannot supply are skipped
    /// and listed in the report instead.
    pub fn assemble(
        &self,
        graph: &TargetGraph,
        resolver: &dyn TargetResolver,
    ) -> Result<BuildReport, AssembleError> {
        let mut state = BuildState::default();
        let mut root = self.root_writer();
        let mut report = BuildReport {
            root_graph: self.context.root_graph_path(),
            ..BuildReport::default()
        };

        let resolved_targets: Vec<(&str, Option<ResolvedTarget>)> = graph
            .targets()
            .map(|name| (name, resolver.resolve(name)))
            .collect();
        for resolved in resolved_targets.iter().filter_map(|(_, lookup)| lookup.as_ref()) {
            state.record_produced(&resolved.invocations);
        }

        for (name, lookup) in resolved_targets {
            let mut begin = BuildEdge::phony(vec![begin_marker(name)]);
            begin.order_only = graph.dependencies(name).map(finish_marker).collect();
            root.build(begin);

            let Some(resolved) = lookup else {
                warn!(target_name = name, "target environment not available; skipping");
                report.skipped_targets.push(name.to_owned());
                continue;
            };

            let assembler = TargetAssembler::new(name, &resolved.environment, self.builtins)
                .dry_run(self.dry_run);
            assembler.emit_output_directories(&mut root, &resolved.invocations, &mut state);
            let (path, edges) = assembler.assemble_and_write(&resolved.invocations, &mut state)?;
            root.subninja(path.as_str());

            let mut finish = BuildEdge::phony(vec![finish_marker(name)]);
            finish.inputs = resolved
                .invocations
                .iter()
                .flat_map(|inv| inv.outputs.iter().map(ToString::to_string))
                .collect();
            finish.order_only = edges.placeholders.into_iter().map(|p| p.name).collect();
            root.build(finish);

            debug!(
                target_name = name,
                edges = edges.writer.edge_count(),
                "assembled target"
            );
            report.unresolved.extend(edges.unresolved);
            report.sub_graphs.insert(name.to_owned(), path);
        }

        files::write_graph_file(&report.root_graph, &root.serialize())?;
        info!(path = %report.root_graph, targets = graph.len(), "wrote build graph");
        report.collisions = state.placeholders.collisions().to_vec();
        report.directory_edges = state.directories.len();
        Ok(report)
    }

    fn root_writer(&self) -> NinjaWriter {
        let mut writer = NinjaWriter::new();
        for line in self.context.header_lines() {
            writer.comment(&line);
        }
        writer.newline();
        writer.binding("builddir", self.context.intermediates_dir.as_str());
        writer.newline();
        writer.rule(
            INVOKE_RULE,
            &[("command", "cd $dir && $exec"), ("description", "$description")],
        );
        writer
    }
}
