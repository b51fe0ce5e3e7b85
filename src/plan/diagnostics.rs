//! Source-annotated diagnostics for build plans that fail to parse.
//!
//! `serde_saphyr` reports line and column only, so the byte span shown by
//! [`miette`] is reconstructed from the plan text.

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_saphyr::{Error as YamlError, Location};
use thiserror::Error;

const YAML_HINTS: [(&str, &str); 3] = [
    (
        "did not find expected '-'",
        "Start list items with '-' and ensure proper indentation.",
    ),
    (
        "mapping values are not allowed",
        "Check for a stray ':' or add quotes around values where needed.",
    ),
    (
        "unknown field",
        "Check the key's spelling; build plans reject keys they do not know.",
    ),
];

/// A YAML error located in a named build plan.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(ninjaweave::plan::yaml))]
pub struct YamlDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("parse error here")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    #[source]
    source: YamlError,
    message: String,
}

// Lets `Box<YamlDiagnostic>` serve as a `#[diagnostic_source]`.
impl std::borrow::Borrow<dyn Diagnostic + 'static> for Box<YamlDiagnostic> {
    fn borrow(&self) -> &(dyn Diagnostic + 'static) {
        self.as_ref()
    }
}

/// Byte offset of a one-based line and column within `src`.
///
/// Offsets past the end of a line clamp to the line's end; `\r\n` endings
/// are tolerated.
fn byte_index(src: &str, line: u64, column: u64) -> usize {
    let target_line = usize::try_from(line.saturating_sub(1)).unwrap_or(usize::MAX);
    let target_column = usize::try_from(column.saturating_sub(1)).unwrap_or(usize::MAX);
    let mut offset = 0usize;
    for (idx, segment) in src.split_inclusive('\n').enumerate() {
        if idx == target_line {
            let line_text = segment.trim_end_matches(['\n', '\r']);
            let column_offset = line_text
                .char_indices()
                .nth(target_column)
                .map_or(line_text.len(), |(byte_idx, _)| byte_idx);
            return offset + column_offset;
        }
        offset += segment.len();
    }
    src.len()
}

fn to_span(src: &str, loc: Location) -> SourceSpan {
    let at = byte_index(src, loc.line(), loc.column());
    let len = src
        .get(at..)
        .and_then(|rest| rest.chars().next())
        .filter(|ch| *ch != '\n' && *ch != '\r')
        .map_or(0, char::len_utf8);
    SourceSpan::new(at.into(), len)
}

fn hint_for(message: &str, src: &str, loc: Option<Location>) -> Option<String> {
    let tab_indented = loc.is_some_and(|l| {
        let idx = usize::try_from(l.line().saturating_sub(1)).unwrap_or(usize::MAX);
        src.lines()
            .nth(idx)
            .is_some_and(|line| line.chars().take_while(|c| c.is_whitespace()).any(|c| c == '\t'))
    });
    if tab_indented {
        return Some("Use spaces for indentation; tabs are invalid in YAML.".to_owned());
    }
    let lower = message.to_lowercase();
    YAML_HINTS
        .iter()
        .find(|(needle, _)| lower.contains(*needle))
        .map(|(_, hint)| (*hint).to_owned())
}

/// Wrap a parse error from the plan called `name` into a diagnostic.
#[must_use]
pub fn map_yaml_error(err: YamlError, src: &str, name: &str) -> YamlDiagnostic {
    let loc = err.location();
    let (line, col, span) =
        loc.map_or((1, 1, None), |l| (l.line(), l.column(), Some(to_span(src, l))));
    let detail = err.to_string();
    let help = hint_for(&detail, src, loc);
    YamlDiagnostic {
        src: NamedSource::new(name, src.to_owned()),
        span,
        help,
        source: err,
        message: format!("YAML parse error at line {line}, column {col}: {detail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a: 1\nb: 2\n", 2, 1, 5)]
    #[case("a: 1\r\nb: 2\r\n", 2, 3, 8)]
    #[case("a: 1\n", 1, 40, 4)]
    #[case("a: 1\n", 9, 1, 5)]
    fn byte_index_clamps_to_line(
        #[case] src: &str,
        #[case] line: u64,
        #[case] column: u64,
        #[case] expected: usize,
    ) {
        assert_eq!(byte_index(src, line, column), expected);
    }

    #[test]
    fn tab_indentation_gets_a_hint() {
        let src = "\tkey: \"unterminated";
        let err = serde_saphyr::from_str::<serde_json::Value>(src).expect_err("tabs are invalid");
        let diagnostic = map_yaml_error(err, src, "plan.yml");
        assert!(diagnostic.to_string().starts_with("YAML parse error at line"));
        assert_eq!(
            diagnostic.help.as_deref(),
            Some("Use spaces for indentation; tabs are invalid in YAML.")
        );
    }
}
