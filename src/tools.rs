//! Executable resolution for tool invocations.
//!
//! Ninja runs every command through the shell, so each invocation's
//! executable must become a concrete path before it is written into the
//! graph. Absolute paths pass through, bare names are searched for along the
//! target's search paths, and `builtin-` tools are handed to an injected
//! [`BuiltinToolResolver`].

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

/// Prefix reserved for tools the build system implements itself.
pub const BUILTIN_PREFIX: &str = "builtin-";

/// Maps a builtin tool identifier onto an executable Ninja can run.
#[cfg_attr(test, mockall::automock)]
pub trait BuiltinToolResolver {
    /// Return the executable implementing `name`, if one is available.
    fn resolve_builtin(&self, name: &str) -> Option<Utf8PathBuf>;
}

/// Resolver for builds where no builtin tool wrappers exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBuiltinTools;

impl BuiltinToolResolver for NoBuiltinTools {
    fn resolve_builtin(&self, name: &str) -> Option<Utf8PathBuf> {
        tracing::debug!(tool = name, "no builtin tool wrappers are configured");
        None
    }
}

/// Resolves `builtin-foo` to `<dir>/builtin-foo` when that file is executable.
#[derive(Debug, Clone)]
pub struct BuiltinToolDirectory {
    dir: Utf8PathBuf,
}

impl BuiltinToolDirectory {
    /// Look for builtin wrappers inside `dir`.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BuiltinToolResolver for BuiltinToolDirectory {
    fn resolve_builtin(&self, name: &str) -> Option<Utf8PathBuf> {
        let candidate = self.dir.join(name);
        is_executable(&candidate).then_some(candidate)
    }
}

/// Resolve `executable` to a path Ninja can run.
///
/// Returns `None` when a builtin tool has no wrapper or when a bare name is
/// not found on `search_paths`.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use ninjaweave::tools::{NoBuiltinTools, resolve_executable};
///
/// let resolved = resolve_executable("/bin/sh", &[], &NoBuiltinTools);
/// assert_eq!(resolved, Some(Utf8PathBuf::from("/bin/sh")));
/// assert_eq!(resolve_executable("builtin-copy", &[], &NoBuiltinTools), None);
/// ```
pub fn resolve_executable(
    executable: &str,
    search_paths: &[Utf8PathBuf],
    builtins: &dyn BuiltinToolResolver,
) -> Option<Utf8PathBuf> {
    if executable.starts_with(BUILTIN_PREFIX) {
        return builtins.resolve_builtin(executable);
    }
    let path = Utf8Path::new(executable);
    if path.is_absolute() {
        return Some(path.to_path_buf());
    }
    find_executable(executable, search_paths)
}

/// Search `search_paths` in order for an executable file called `name`.
#[must_use]
pub fn find_executable(name: &str, search_paths: &[Utf8PathBuf]) -> Option<Utf8PathBuf> {
    search_paths
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Utf8Path) -> bool {
    fs::metadata(path.as_std_path())
        .is_ok_and(|metadata| metadata.is_file() && has_execute_permission(&metadata))
}

#[cfg(unix)]
fn has_execute_permission(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_execute_permission(metadata: &fs::Metadata) -> bool {
    metadata.is_file()
}
