//! Build plans: the YAML description of an already-resolved build.
//!
//! A plan names every target with its dependencies, its resolved
//! environment, the invocations its phases produced and, optionally, the
//! compilation summary and linkage settings the linkage planner needs. It
//! also carries the tool catalogue used to resolve linker identifiers.
//!
//! ```yaml
//! context:
//!   intermediates_dir: /tmp/obj
//!   project: Demo
//! tools:
//!   - identifier: com.apple.pbx.linkers.ld
//!     executable: /usr/bin/ld
//! targets:
//!   - name: Lib
//!   - name: App
//!     depends_on: [Lib]
//!     environment:
//!       working_directory: /src
//!       temp_dir: /tmp/obj/App.build
//!       products_dir: /tmp/products
//!     invocations:
//!       - executable: /bin/cp
//!         arguments: [a, /tmp/products/a]
//!         inputs: [a]
//!         outputs: [/tmp/products/a]
//! ```

mod diagnostics;

use std::fs;

use camino::Utf8Path;
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub use diagnostics::{YamlDiagnostic, map_yaml_error};

use crate::assemble::BuildContext;
use crate::graph::{TargetGraph, TargetGraphError};
use crate::invocation::ToolInvocation;
use crate::linkage::{CompilationSummary, LinkageError, LinkagePlanner, LinkageSettings, ToolSpec};
use crate::target::{ResolvedTarget, TargetEnvironment};

/// Default plan file name.
pub const DEFAULT_PLAN_FILE: &str = "build-plan.yml";

/// Errors raised while loading or using a build plan.
#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    /// The plan file could not be read.
    #[error("failed to read build plan {path}")]
    #[diagnostic(code(ninjaweave::plan::read))]
    Read {
        /// Plan path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The plan is not valid YAML or does not match the plan schema.
    #[error("failed to parse build plan {name}")]
    #[diagnostic(code(ninjaweave::plan::parse))]
    Parse {
        /// Plan name used in diagnostics.
        name: String,
        /// Located YAML diagnostic.
        #[source]
        #[diagnostic_source]
        source: Box<YamlDiagnostic>,
    },
    /// Two targets share a name.
    #[error("target '{name}' is declared more than once")]
    #[diagnostic(code(ninjaweave::plan::duplicate_target))]
    DuplicateTarget {
        /// Repeated name.
        name: String,
    },
    /// The dependency graph is invalid.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] TargetGraphError),
    /// A requested target is not in the plan.
    #[error("unknown target '{name}'")]
    #[diagnostic(code(ninjaweave::plan::unknown_target))]
    UnknownTarget {
        /// Requested name.
        name: String,
    },
    /// Linkage settings are present but the target has no environment.
    #[error("target '{name}' has linkage settings but no environment")]
    #[diagnostic(code(ninjaweave::plan::linkage_without_environment))]
    LinkageWithoutEnvironment {
        /// Target name.
        name: String,
    },
    /// Planning a target's link invocations failed.
    #[error("failed to plan linkage for target '{name}'")]
    #[diagnostic(code(ninjaweave::plan::linkage))]
    Linkage {
        /// Target name.
        name: String,
        /// Planner error.
        #[source]
        #[diagnostic_source]
        source: LinkageError,
    },
}

/// One target as described by the plan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetPlan {
    /// Unique target name.
    pub name: String,
    /// Targets that must finish before this one starts.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Resolved environment; absent when the target cannot be built.
    #[serde(default)]
    pub environment: Option<TargetEnvironment>,
    /// Invocations from the target's phases, in phase order.
    #[serde(default)]
    pub invocations: Vec<ToolInvocation>,
    /// What the compilation phase produced.
    #[serde(default)]
    pub compilation: Option<CompilationSummary>,
    /// Settings for the link phase.
    #[serde(default)]
    pub linkage: Option<LinkageSettings>,
}

/// A complete build plan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildPlan {
    /// Build-wide facts.
    pub context: BuildContext,
    /// Tool catalogue.
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Targets in build order.
    #[serde(default)]
    pub targets: Vec<TargetPlan>,
}

impl BuildPlan {
    /// Parse and validate a plan from YAML text. `name` labels diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when the YAML is malformed or the target graph
    /// is invalid.
    pub fn from_str_named(yaml: &str, name: &str) -> Result<Self, PlanError> {
        let plan: Self = serde_saphyr::from_str(yaml).map_err(|err| PlanError::Parse {
            name: name.to_owned(),
            source: Box::new(map_yaml_error(err, yaml, name)),
        })?;
        plan.graph()?;
        debug!(plan = name, targets = plan.targets.len(), "loaded build plan");
        Ok(plan)
    }

    /// Read, parse and validate the plan at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Read`] when the file cannot be read, or any error
    /// from [`BuildPlan::from_str_named`].
    pub fn from_path(path: &Utf8Path) -> Result<Self, PlanError> {
        let yaml = fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_str_named(&yaml, path.as_str())
    }

    /// Build and validate the target dependency graph.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DuplicateTarget`] or [`PlanError::Graph`].
    pub fn graph(&self) -> Result<TargetGraph, PlanError> {
        let mut graph = TargetGraph::new();
        for target in &self.targets {
            if graph.contains(&target.name) {
                return Err(PlanError::DuplicateTarget {
                    name: target.name.clone(),
                });
            }
            graph.add_target(target.name.clone());
        }
        for target in &self.targets {
            for dependency in &target.depends_on {
                graph.add_dependency(target.name.clone(), dependency.clone());
            }
        }
        graph.validate()?;
        Ok(graph)
    }

    /// The tool catalogue keyed by identifier. Later entries win.
    #[must_use]
    pub fn tool_catalog(&self) -> IndexMap<String, ToolSpec> {
        self.tools
            .iter()
            .map(|tool| (tool.identifier.clone(), tool.clone()))
            .collect()
    }

    /// Look up a target by name.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::UnknownTarget`] when no target is called `name`.
    pub fn target(&self, name: &str) -> Result<&TargetPlan, PlanError> {
        self.targets
            .iter()
            .find(|target| target.name == name)
            .ok_or_else(|| PlanError::UnknownTarget {
                name: name.to_owned(),
            })
    }

    /// Plan the link invocations of `target`; empty without linkage settings.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::LinkageWithoutEnvironment`] or
    /// [`PlanError::Linkage`].
    pub fn link_invocations(&self, target: &TargetPlan) -> Result<Vec<ToolInvocation>, PlanError> {
        let Some(settings) = &target.linkage else {
            return Ok(Vec::new());
        };
        let Some(environment) = &target.environment else {
            return Err(PlanError::LinkageWithoutEnvironment {
                name: target.name.clone(),
            });
        };
        let compilation = target.compilation.clone().unwrap_or_default();
        let planner = LinkagePlanner::new(&self.tool_catalog(), environment, settings, &compilation)
            .map_err(|source| PlanError::Linkage {
                name: target.name.clone(),
                source,
            })?;
        Ok(planner.plan())
    }

    /// Resolve every target that has an environment.
    ///
    /// Each target's invocations are its compile invocations, then its
    /// declared invocations, then its planned link invocations. Targets
    /// without an environment are left out, which the assembler reports as
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when linkage planning fails.
    pub fn resolve_targets(&self) -> Result<IndexMap<String, ResolvedTarget>, PlanError> {
        let mut resolved = IndexMap::new();
        for target in &self.targets {
            let Some(environment) = &target.environment else {
                debug!(target_name = %target.name, "no environment in plan");
                continue;
            };
            let compiled = target
                .compilation
                .iter()
                .flat_map(CompilationSummary::all_invocations)
                .cloned();
            let linked = self.link_invocations(target)?;
            let invocations = compiled
                .chain(target.invocations.iter().cloned())
                .chain(linked)
                .collect();
            resolved.insert(
                target.name.clone(),
                ResolvedTarget {
                    environment: environment.clone(),
                    invocations,
                },
            );
        }
        Ok(resolved)
    }
}
