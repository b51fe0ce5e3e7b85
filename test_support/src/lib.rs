//! Test utilities shared by unit and integration tests.
//!
//! Provides fake executables for search-path resolution, a fluent builder
//! for tool invocations, and helpers for checking generated files with the
//! system `ninja` binary.

pub mod invocations;
pub mod ninja;

pub use invocations::InvocationBuilder;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory holding an executable script called `name`.
///
/// Returns the directory (which must outlive the script) and the script path.
///
/// # Examples
///
/// ```rust
/// let (dir, path) = test_support::fake_executable("clang").expect("fake clang");
/// assert!(path.starts_with(dir.path()));
/// ```
pub fn fake_executable(name: &str) -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new().context("create temp dir for fake executable")?;
    let root = utf8_dir(&dir)?;
    let path = write_exec(&root, name)?;
    Ok((dir, path.into_std_path_buf()))
}

/// Write a minimal executable file named `name` inside `root`.
pub fn write_exec(root: &Utf8Path, name: &str) -> Result<Utf8PathBuf> {
    let path = root.join(name);
    fs::write(path.as_std_path(), b"#!/bin/sh\nexit 0\n")
        .with_context(|| format!("write exec stub {name}"))?;
    make_executable(&path)?;
    Ok(path)
}

/// Mark an existing file as executable on Unix; no-op elsewhere.
pub fn make_executable(path: &Utf8Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut perms = fs::metadata(path.as_std_path())
            .context("stat exec stub")?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path.as_std_path(), perms).context("chmod exec stub")?;
    }

    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

/// UTF-8 view of a temporary directory's path.
pub fn utf8_dir(dir: &TempDir) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .map_err(|path| anyhow!("temporary directory is not UTF-8: {}", path.display()))
}
