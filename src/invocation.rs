//! Finalised tool invocations.
//!
//! A [`ToolInvocation`] is the unit of work handed to the graph assembler:
//! one command line together with the files it reads, writes and orders
//! itself against. Upstream resolvers (including
//! [`crate::linkage::LinkagePlanner`]) produce them; the assembler consumes
//! each exactly once.
//!
//! # Examples
//!
//! ```
//! use ninjaweave::invocation::ToolInvocation;
//!
//! let invocation = ToolInvocation {
//!     executable: "cp".into(),
//!     arguments: vec!["in.txt".into(), "/out/in.txt".into()],
//!     inputs: vec!["in.txt".into()],
//!     outputs: vec!["/out/in.txt".into()],
//!     ..ToolInvocation::default()
//! };
//! assert!(!invocation.is_marker());
//! ```

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// A file written to disk before any invocation of the target runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuxiliaryFile {
    /// Destination path.
    pub path: Utf8PathBuf,
    /// File contents.
    #[serde(with = "text_bytes")]
    pub contents: Vec<u8>,
    /// Whether the file must carry execute permission.
    #[serde(default)]
    pub executable: bool,
}

impl AuxiliaryFile {
    /// Describe an auxiliary file at `path` holding `contents`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            executable: false,
        }
    }

    /// Mark the file as executable.
    #[must_use]
    pub const fn executable(mut self) -> Self {
        self.executable = true;
        self
    }
}

/// One fully resolved tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolInvocation {
    /// Executable path, search-path name, or `builtin-` identifier. Empty
    /// for marker invocations.
    pub executable: String,
    /// Arguments passed after the executable.
    pub arguments: Vec<String>,
    /// Directory the command runs in.
    pub working_directory: Utf8PathBuf,
    /// Files the command produces.
    pub outputs: Vec<Utf8PathBuf>,
    /// Files the command reads, in positional order.
    pub inputs: Vec<Utf8PathBuf>,
    /// Outputs another edge may already produce; tracked by placeholder.
    pub phony_outputs: Vec<Utf8PathBuf>,
    /// Inputs that may never exist on disk.
    pub phony_inputs: Vec<Utf8PathBuf>,
    /// Extra inputs that affect the result but are not positional.
    pub input_dependencies: Vec<Utf8PathBuf>,
    /// Nodes that must complete first without triggering rebuilds.
    pub order_dependencies: Vec<Utf8PathBuf>,
    /// Human-readable status text.
    pub description: String,
    /// Files materialised before the build runs.
    pub auxiliary_files: Vec<AuxiliaryFile>,
}

impl ToolInvocation {
    /// Return `true` when this invocation runs nothing and only wires
    /// dependencies.
    #[must_use]
    pub const fn is_marker(&self) -> bool {
        self.executable.is_empty()
    }
}

/// Serialise byte contents as UTF-8 text so plan files stay readable.
mod text_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(String::into_bytes)
    }
}
