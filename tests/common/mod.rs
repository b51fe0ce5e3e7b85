//! Shared helpers for integration tests.
//!
//! Integration tests under `tests/` compile as independent crates. This module
//! is included via `mod common;` in individual test files to share fixtures and
//! helpers while keeping test modules small and avoiding duplication.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use ninjaweave::assemble::BuildContext;
use ninjaweave::target::TargetEnvironment;
use rstest::fixture;
use tempfile::TempDir;

/// A temporary build root; paths below it are UTF-8.
pub struct Workspace {
    /// Keeps the directory alive for the test's duration.
    pub temp: TempDir,
    /// UTF-8 path of the directory.
    pub root: Utf8PathBuf,
}

impl Workspace {
    /// Build context writing the root graph to `<root>/obj`.
    pub fn context(&self) -> BuildContext {
        BuildContext {
            intermediates_dir: self.root.join("obj"),
            action: "build".to_owned(),
            project: Some("Demo".to_owned()),
            ..BuildContext::default()
        }
    }

    /// Environment for `target` with one variant and one architecture.
    pub fn environment(&self, target: &str) -> TargetEnvironment {
        environment_in(&self.root, target)
    }
}

/// Environment for `target` rooted at `root`.
pub fn environment_in(root: &Utf8Path, target: &str) -> TargetEnvironment {
    TargetEnvironment {
        search_paths: Vec::new(),
        variants: vec!["normal".to_owned()],
        architectures: vec!["x86_64".to_owned()],
        working_directory: root.join("src"),
        temp_dir: root.join("obj").join(format!("{target}.build")),
        products_dir: root.join("products"),
    }
}

/// Fixture: a fresh temporary build root.
#[fixture]
pub fn workspace() -> Result<Workspace> {
    let temp = tempfile::tempdir().context("create temp build root")?;
    let root = test_support::utf8_dir(&temp)?;
    Ok(Workspace { temp, root })
}

/// Count non-overlapping occurrences of `needle` in `haystack`.
pub fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
