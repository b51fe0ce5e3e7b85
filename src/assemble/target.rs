//! Per-target sub-graph assembly.
//!
//! A target contributes three kinds of statements: directory-creation edges
//! (written to the root file because directories are shared between
//! targets), one edge per invocation (written to the target's own Ninja
//! file), and the auxiliary files those invocations expect on disk.

use std::iter;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use itertools::Itertools;
use tracing::{debug, error};

use super::placeholders::{Placeholder, PlaceholderSource};
use super::{AssembleError, BuildState, UnresolvedExecutable, files};
use crate::invocation::ToolInvocation;
use crate::naming::{begin_marker, first_line, shell_quote};
use crate::ninja_gen::{BuildEdge, NinjaWriter};
use crate::target::TargetEnvironment;
use crate::tools::{BuiltinToolResolver, resolve_executable};

/// The single pass-through rule every command edge uses.
pub const INVOKE_RULE: &str = "invoke";

/// Command used to create output directories.
const MKDIR: &str = "/bin/mkdir -p";

/// Result of assembling one target's sub-graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEdges {
    /// The target's Ninja statements.
    pub writer: NinjaWriter,
    /// Placeholder outputs produced by the emitted edges.
    pub placeholders: Vec<Placeholder>,
    /// Invocations dropped because their executable could not be found.
    pub unresolved: Vec<UnresolvedExecutable>,
}

/// Turns one target's invocations into Ninja statements.
pub struct TargetAssembler<'a> {
    name: &'a str,
    environment: &'a TargetEnvironment,
    builtins: &'a dyn BuiltinToolResolver,
    begin: String,
    dry_run: bool,
}

impl<'a> TargetAssembler<'a> {
    /// Prepare to assemble `name` using its resolved `environment`.
    #[must_use]
    pub fn new(
        name: &'a str,
        environment: &'a TargetEnvironment,
        builtins: &'a dyn BuiltinToolResolver,
    ) -> Self {
        Self {
            name,
            environment,
            builtins,
            begin: begin_marker(name),
            dry_run: false,
        }
    }

    /// Skip writing auxiliary files when `dry_run` is set.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Emit one creation edge per output directory not yet in `state`.
    ///
    /// Ninja allows a single edge per output across the whole graph, so the
    /// caller writes these into the root file and shares `state` between
    /// targets.
    pub fn emit_output_directories(
        &self,
        writer: &mut NinjaWriter,
        invocations: &[ToolInvocation],
        state: &mut BuildState,
    ) {
        for invocation in invocations {
            for dir in invocation.outputs.iter().filter_map(|o| output_directory(o)) {
                if !state.directories.insert(dir.to_owned()) {
                    continue;
                }
                let mut edge = BuildEdge::new(vec![dir.to_string()], INVOKE_RULE)
                    .bind("description", format!("MkDir {dir}"))
                    .bind("dir", self.quoted_working_directory(invocation))
                    .bind("exec", format!("{MKDIR} {}", shell_quote(dir.as_str())));
                edge.order_only.push(self.begin.clone());
                writer.build(edge);
            }
        }
    }

    /// Emit one edge per runnable invocation into `writer`.
    ///
    /// Marker invocations are skipped. Invocations whose executable cannot
    /// be resolved are logged, recorded and skipped. A phony input gets a
    /// no-op edge only if nothing in `state.produced` already builds it.
    pub fn emit_invocations(
        &self,
        writer: &mut NinjaWriter,
        invocations: &[ToolInvocation],
        state: &mut BuildState,
    ) -> (Vec<Placeholder>, Vec<UnresolvedExecutable>) {
        let declared: IndexSet<&Utf8Path> = invocations
            .iter()
            .flat_map(|inv| inv.outputs.iter().map(Utf8PathBuf::as_path))
            .collect();
        let mut placeholders = Vec::new();
        let mut unresolved = Vec::new();

        for invocation in invocations.iter().filter(|inv| !inv.is_marker()) {
            let Some(executable) = resolve_executable(
                &invocation.executable,
                &self.environment.search_paths,
                self.builtins,
            ) else {
                error!(
                    target_name = self.name,
                    executable = %invocation.executable,
                    "unable to find executable"
                );
                unresolved.push(UnresolvedExecutable {
                    target: self.name.to_owned(),
                    executable: invocation.executable.clone(),
                });
                continue;
            };

            let exec = iter::once(shell_quote(executable.as_str()))
                .chain(invocation.arguments.iter().map(|arg| shell_quote(arg)))
                .join(" ");
            let description = if invocation.description.is_empty() {
                first_line(&exec).to_owned()
            } else {
                first_line(&invocation.description).to_owned()
            };

            let mut outputs: Vec<String> =
                invocation.outputs.iter().map(ToString::to_string).collect();
            for phony in &invocation.phony_outputs {
                let placeholder = state
                    .placeholders
                    .assign(self.name, PlaceholderSource::PhonyOutput(phony.clone()));
                outputs.push(placeholder.name.clone());
                placeholders.push(placeholder);
            }
            if outputs.is_empty() {
                let placeholder = state
                    .placeholders
                    .assign(self.name, PlaceholderSource::Command(exec.clone()));
                debug!(
                    target_name = self.name,
                    placeholder = %placeholder.name,
                    "invocation declares no outputs"
                );
                outputs.push(placeholder.name.clone());
                placeholders.push(placeholder);
            }

            for phony_input in &invocation.phony_inputs {
                if declared.contains(phony_input.as_path())
                    || state.produced.contains(phony_input)
                    || !state.phony_inputs.insert(phony_input.clone())
                {
                    continue;
                }
                writer.build(BuildEdge::phony(vec![phony_input.to_string()]));
            }

            let mut edge = BuildEdge::new(outputs, INVOKE_RULE)
                .bind("description", description)
                .bind("dir", self.quoted_working_directory(invocation))
                .bind("exec", exec);
            edge.inputs = invocation.inputs.iter().map(ToString::to_string).collect();
            edge.implicit_inputs = invocation
                .input_dependencies
                .iter()
                .map(ToString::to_string)
                .collect();
            let directories: IndexSet<&Utf8Path> = invocation
                .outputs
                .iter()
                .filter_map(|o| output_directory(o))
                .collect();
            edge.order_only = invocation
                .order_dependencies
                .iter()
                .map(ToString::to_string)
                .chain(directories.into_iter().map(ToString::to_string))
                .chain(iter::once(self.begin.clone()))
                .collect();
            writer.build(edge);
        }

        (placeholders, unresolved)
    }

    /// Build the target's complete sub-graph: header plus invocation edges.
    pub fn sub_graph(&self, invocations: &[ToolInvocation], state: &mut BuildState) -> TargetEdges {
        let mut writer = NinjaWriter::new();
        writer.comment(super::GENERATOR_COMMENT);
        writer.comment(&format!("Target: {}", self.name));
        writer.newline();
        let (placeholders, unresolved) = self.emit_invocations(&mut writer, invocations, state);
        TargetEdges {
            writer,
            placeholders,
            unresolved,
        }
    }

    /// Write auxiliary files unless this is a dry run.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::WriteAuxiliary`] for the first file that
    /// cannot be written.
    pub fn materialize_auxiliary_files(
        &self,
        invocations: &[ToolInvocation],
    ) -> Result<(), AssembleError> {
        if self.dry_run {
            debug!(target_name = self.name, "dry run: skipping auxiliary files");
            return Ok(());
        }
        files::materialize_auxiliary_files(invocations)
    }

    /// Assemble the sub-graph, write it to the target's temp directory and
    /// materialise auxiliary files.
    ///
    /// # Errors
    ///
    /// Returns an [`AssembleError`] if the sub-graph or an auxiliary file
    /// cannot be written.
    pub fn assemble_and_write(
        &self,
        invocations: &[ToolInvocation],
        state: &mut BuildState,
    ) -> Result<(Utf8PathBuf, TargetEdges), AssembleError> {
        let edges = self.sub_graph(invocations, state);
        let path = self.environment.ninja_path();
        files::write_graph_file(&path, &edges.writer.serialize())?;
        self.materialize_auxiliary_files(invocations)?;
        Ok((path, edges))
    }

    fn quoted_working_directory(&self, invocation: &ToolInvocation) -> String {
        shell_quote(self.environment.working_directory_for(invocation).as_str()).into_owned()
    }
}

/// Directory holding `output`, or `None` for bare file names.
pub(super) fn output_directory(output: &Utf8Path) -> Option<&Utf8Path> {
    output.parent().filter(|dir| !dir.as_str().is_empty())
}
