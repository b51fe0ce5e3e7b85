//! Helpers for checking generated files with the system `ninja` binary.

use std::path::Path;
use std::process::{Command, ExitStatus};
use thiserror::Error;

/// Errors from running `ninja` against a generated graph.
#[derive(Error, Debug)]
pub enum NinjaCheckError {
    /// `ninja` could not be spawned, most likely because it is not on `PATH`.
    #[error("failed to spawn `ninja`: {0}")]
    Spawn(#[source] std::io::Error),
    /// `ninja` ran but rejected the graph.
    #[error("`ninja` exited with {status}: {stderr}")]
    Failed {
        /// Exit status.
        status: ExitStatus,
        /// Captured standard error.
        stderr: String,
    },
}

/// Whether a working `ninja` is on `PATH`. Callers skip their scenario when
/// this returns `false`.
pub fn ninja_available() -> bool {
    Command::new("ninja")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

/// Run `ninja -f <build_file> <args>` from the file's directory and return
/// its standard output.
pub fn ninja_tool(build_file: &Path, args: &[&str]) -> Result<String, NinjaCheckError> {
    let mut cmd = Command::new("ninja");
    cmd.arg("-f").arg(build_file).args(args);
    if let Some(dir) = build_file.parent() {
        cmd.current_dir(dir);
    }
    let output = cmd.output().map_err(NinjaCheckError::Spawn)?;
    if !output.status.success() {
        return Err(NinjaCheckError::Failed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
