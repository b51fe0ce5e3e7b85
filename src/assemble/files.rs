//! Filesystem writes performed during assembly.
//!
//! Graph files and auxiliary files go through capability-based directory
//! handles opened on the nearest existing ancestor of the destination.

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::{debug, info};

use super::AssembleError;
use crate::invocation::{AuxiliaryFile, ToolInvocation};

/// Open the deepest existing ancestor of `path` and return it together with
/// the remainder of `path` relative to it.
fn open_ancestor(path: &Utf8Path) -> io::Result<(Dir, Utf8PathBuf)> {
    if path.is_relative() {
        let dir = Dir::open_ambient_dir(".", ambient_authority())?;
        return Ok((dir, path.to_owned()));
    }

    let mut ancestors = path.ancestors();
    ancestors.next();
    let (base, dir) = ancestors
        .find_map(|candidate| {
            Dir::open_ambient_dir(candidate, ambient_authority())
                .ok()
                .map(|dir| (candidate.to_owned(), dir))
        })
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no existing ancestor directory for {path}"),
            )
        })?;
    let relative = path
        .strip_prefix(&base)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?
        .to_owned();
    Ok((dir, relative))
}

fn write_bytes(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let (dir, relative) = open_ancestor(path)?;
    if let Some(parent) = relative.parent().filter(|p| !p.as_str().is_empty()) {
        dir.create_dir_all(parent)?;
    }
    let mut file = dir.create(&relative)?;
    file.write_all(contents)?;
    file.flush()?;
    file.sync_all()
}

/// Write a serialised Ninja file, creating its parent directories.
pub(super) fn write_graph_file(path: &Utf8Path, content: &str) -> Result<(), AssembleError> {
    write_bytes(path, content.as_bytes()).map_err(|source| AssembleError::WriteGraph {
        path: path.to_owned(),
        source,
    })?;
    info!("Wrote Ninja file to {path}");
    Ok(())
}

/// Write every auxiliary file declared by `invocations`.
///
/// Existing files are overwritten. Files flagged executable receive
/// `0o755` unless they already carry an execute bit.
pub(super) fn materialize_auxiliary_files(
    invocations: &[ToolInvocation],
) -> Result<(), AssembleError> {
    for file in invocations.iter().flat_map(|inv| &inv.auxiliary_files) {
        write_auxiliary_file(file).map_err(|source| AssembleError::WriteAuxiliary {
            path: file.path.clone(),
            source,
        })?;
        debug!(path = %file.path, executable = file.executable, "materialised auxiliary file");
    }
    Ok(())
}

fn write_auxiliary_file(file: &AuxiliaryFile) -> io::Result<()> {
    write_bytes(&file.path, &file.contents)?;
    if file.executable {
        ensure_executable(&file.path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn ensure_executable(path: &Utf8Path) -> io::Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    if perms.mode() & 0o111 != 0 {
        return Ok(());
    }
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Utf8Path) -> io::Result<()> {
    Ok(())
}
