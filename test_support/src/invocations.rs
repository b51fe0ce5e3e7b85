//! Fluent construction of [`ToolInvocation`] values for tests.
//!
//! # Examples
//!
//! ```rust
//! use test_support::InvocationBuilder;
//!
//! let invocation = InvocationBuilder::new("/bin/cp")
//!     .args(["a", "/out/a"])
//!     .input("a")
//!     .output("/out/a")
//!     .build();
//! assert_eq!(invocation.outputs.len(), 1);
//! ```

use camino::Utf8PathBuf;
use ninjaweave::invocation::{AuxiliaryFile, ToolInvocation};

/// Builds a [`ToolInvocation`] one field at a time.
#[derive(Debug, Clone, Default)]
pub struct InvocationBuilder {
    invocation: ToolInvocation,
}

impl InvocationBuilder {
    /// Start an invocation running `executable`.
    pub fn new(executable: &str) -> Self {
        Self {
            invocation: ToolInvocation {
                executable: executable.to_owned(),
                ..ToolInvocation::default()
            },
        }
    }

    /// Start a marker invocation, which has no executable.
    pub fn marker() -> Self {
        Self::default()
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invocation.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn working_directory(mut self, dir: &str) -> Self {
        self.invocation.working_directory = dir.into();
        self
    }

    /// Add a declared input.
    pub fn input(mut self, path: &str) -> Self {
        self.invocation.inputs.push(path.into());
        self
    }

    /// Add a declared output.
    pub fn output(mut self, path: &str) -> Self {
        self.invocation.outputs.push(path.into());
        self
    }

    /// Add a phony output.
    pub fn phony_output(mut self, path: &str) -> Self {
        self.invocation.phony_outputs.push(path.into());
        self
    }

    /// Add a phony input.
    pub fn phony_input(mut self, path: &str) -> Self {
        self.invocation.phony_inputs.push(path.into());
        self
    }

    /// Add an implicit input dependency.
    pub fn input_dependency(mut self, path: &str) -> Self {
        self.invocation.input_dependencies.push(path.into());
        self
    }

    /// Add an order-only dependency.
    pub fn order_dependency(mut self, path: &str) -> Self {
        self.invocation.order_dependencies.push(path.into());
        self
    }

    /// Set the status description.
    pub fn description(mut self, text: &str) -> Self {
        self.invocation.description = text.to_owned();
        self
    }

    /// Attach an auxiliary file.
    pub fn auxiliary(mut self, path: impl Into<Utf8PathBuf>, contents: &str, executable: bool) -> Self {
        let file = AuxiliaryFile::new(path, contents);
        self.invocation.auxiliary_files.push(if executable { file.executable() } else { file });
        self
    }

    /// Finish the invocation.
    pub fn build(self) -> ToolInvocation {
        self.invocation
    }
}
