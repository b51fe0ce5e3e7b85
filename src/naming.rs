//! Deterministic names for synthetic graph nodes plus shell quoting.
//!
//! Every node the assembler invents (target begin and finish markers, phony
//! output placeholders) is named here so that identical inputs always yield
//! byte-identical graph files.
//!
//! # Examples
//!
//! ```
//! use ninjaweave::naming::{begin_marker, finish_marker, shell_quote};
//!
//! assert_eq!(begin_marker("App"), "begin-target-App");
//! assert_eq!(finish_marker("App"), "finish-target-App");
//! assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
//! ```

use std::borrow::Cow;

use camino::Utf8Path;
use digest::Digest;
use md5::Md5;

/// Prefix for the phony edge that opens a target's build.
pub const BEGIN_TARGET_PREFIX: &str = "begin-target-";
/// Prefix for the phony edge that closes a target's build.
pub const FINISH_TARGET_PREFIX: &str = "finish-target-";
/// Prefix shared by every phony output placeholder.
pub const PHONY_OUTPUT_PREFIX: &str = ".phony-output-";

/// Name of the node that every invocation of `target` waits on.
#[must_use]
pub fn begin_marker(target: &str) -> String {
    format!("{BEGIN_TARGET_PREFIX}{target}")
}

/// Name of the node that completes once every output of `target` exists.
#[must_use]
pub fn finish_marker(target: &str) -> String {
    format!("{FINISH_TARGET_PREFIX}{target}")
}

/// Derive the fake output name standing in for a phony output.
///
/// Ninja rejects two edges producing the same output, yet tool chains that
/// modify an output in place need a second edge after the first. The second
/// edge instead produces this placeholder, named from the MD5 digest of the
/// real path so re-runs reproduce it exactly.
///
/// Identical paths collapse to identical names;
/// [`PlaceholderRegistry`](crate::assemble::PlaceholderRegistry) detects and
/// disambiguates such collisions across a build.
#[must_use]
pub fn phony_placeholder_name(output: &Utf8Path) -> String {
    placeholder_for_text(output.as_str())
}

/// Hash arbitrary text into a placeholder name.
pub(crate) fn placeholder_for_text(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    format!("{PHONY_OUTPUT_PREFIX}{digest:x}")
}

/// Return `text` up to its first line break.
///
/// Ninja status lines must fit on one line.
#[must_use]
pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

fn is_shell_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '@' | '%' | '_' | '-' | '+' | '=' | ':' | ',' | '.' | '/')
}

/// Quote `value` for a POSIX shell.
///
/// Values made only of `[A-Za-z0-9@%_\-+=:,./]` pass through unchanged.
/// Anything else is wrapped in single quotes, with embedded single quotes
/// rewritten as `'"'"'`.
#[must_use]
pub fn shell_quote(value: &str) -> Cow<'_, str> {
    if !value.is_empty() && value.chars().all(is_shell_safe) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(format!("'{}'", value.replace('\'', "'\"'\"'")))
}
