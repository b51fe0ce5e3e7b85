//! Resolved per-target state handed to the assemblers.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::invocation::ToolInvocation;

/// File name used for every generated Ninja file.
pub const NINJA_FILE_NAME: &str = "build.ninja";

fn default_variants() -> Vec<String> {
    vec!["normal".to_owned()]
}

/// Settings resolved for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetEnvironment {
    /// Directories searched for bare executable names.
    #[serde(default)]
    pub search_paths: Vec<Utf8PathBuf>,
    /// Build variants such as `normal` or `debug`.
    #[serde(default = "default_variants")]
    pub variants: Vec<String>,
    /// Architectures the target is built for.
    #[serde(default)]
    pub architectures: Vec<String>,
    /// Directory commands run in unless an invocation says otherwise.
    pub working_directory: Utf8PathBuf,
    /// Target-specific temporary directory; holds the target's Ninja file.
    pub temp_dir: Utf8PathBuf,
    /// Directory final products are placed in.
    pub products_dir: Utf8PathBuf,
}

impl TargetEnvironment {
    /// Path of the Ninja file generated for this target.
    #[must_use]
    pub fn ninja_path(&self) -> Utf8PathBuf {
        self.temp_dir.join(NINJA_FILE_NAME)
    }

    /// Directory used for `invocation`, falling back to the target's.
    #[must_use]
    pub fn working_directory_for<'a>(&'a self, invocation: &'a ToolInvocation) -> &'a Utf8Path {
        if invocation.working_directory.as_str().is_empty() {
            &self.working_directory
        } else {
            &invocation.working_directory
        }
    }
}

/// A target's environment together with its ordered invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Resolved settings.
    pub environment: TargetEnvironment,
    /// Invocations in phase order.
    pub invocations: Vec<ToolInvocation>,
}

/// Supplies resolved targets to the whole-build assembler.
pub trait TargetResolver {
    /// Resolve `target`, or return `None` when its environment is unavailable.
    fn resolve(&self, target: &str) -> Option<ResolvedTarget>;
}

impl<S: std::hash::BuildHasher> TargetResolver for IndexMap<String, ResolvedTarget, S> {
    fn resolve(&self, target: &str) -> Option<ResolvedTarget> {
        self.get(target).cloned()
    }
}
