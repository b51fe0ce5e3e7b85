//! Append-only Ninja file writer.
//!
//! The assembler never needs to revisit what it has emitted, so the writer
//! exposes only the primitive statements of the Ninja language (comments,
//! variable bindings, rules, build edges and `subninja` includes) and
//! serialises them in the order they were added.
//!
//! Paths in `build` lines escape `$`, spaces and colons; binding values
//! escape `$`. Rule commands are written verbatim so they can reference
//! edge-level variables such as `$exec`.

use std::fmt::{self, Display, Formatter, Write};

use itertools::Itertools;

/// Name of the built-in Ninja rule for edges without a command.
pub const PHONY_RULE: &str = "phony";

/// A single `build` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEdge {
    /// Explicit outputs.
    pub outputs: Vec<String>,
    /// Rule name; [`PHONY_RULE`] for placeholders.
    pub rule: String,
    /// Explicit inputs.
    pub inputs: Vec<String>,
    /// Implicit inputs written after `|`.
    pub implicit_inputs: Vec<String>,
    /// Order-only inputs written after `||`.
    pub order_only: Vec<String>,
    /// Edge-scoped variable bindings.
    pub bindings: Vec<(String, String)>,
}

impl BuildEdge {
    /// Start a phony edge producing `outputs`.
    #[must_use]
    pub fn phony(outputs: Vec<String>) -> Self {
        Self {
            outputs,
            rule: PHONY_RULE.to_owned(),
            ..Self::default()
        }
    }

    /// Start an edge running `rule` to produce `outputs`.
    #[must_use]
    pub fn new(outputs: Vec<String>, rule: &str) -> Self {
        Self {
            outputs,
            rule: rule.to_owned(),
            ..Self::default()
        }
    }

    /// Attach an edge-scoped binding.
    #[must_use]
    pub fn bind(mut self, name: &str, value: impl Into<String>) -> Self {
        self.bindings.push((name.to_owned(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Statement {
    Comment(String),
    Newline,
    Binding { name: String, value: String },
    Rule { name: String, bindings: Vec<(String, String)> },
    Build(BuildEdge),
    Subninja(String),
}

/// Accumulates Ninja statements and renders them as text.
///
/// # Examples
///
/// ```
/// use ninjaweave::ninja_gen::{BuildEdge, NinjaWriter};
///
/// let mut writer = NinjaWriter::new();
/// writer.comment("example");
/// writer.build(BuildEdge::phony(vec!["all".into()]));
/// assert_eq!(writer.serialize(), "# example\nbuild all: phony\n");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NinjaWriter {
    statements: Vec<Statement>,
}

impl NinjaWriter {
    /// Create an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            statements: Vec::new(),
        }
    }

    /// Append a `#` comment; multi-line text becomes several comments.
    pub fn comment(&mut self, text: &str) {
        for line in text.lines() {
            self.statements.push(Statement::Comment(line.to_owned()));
        }
    }

    /// Append a blank line.
    pub fn newline(&mut self) {
        self.statements.push(Statement::Newline);
    }

    /// Append a top-level variable binding.
    pub fn binding(&mut self, name: &str, value: &str) {
        self.statements.push(Statement::Binding {
            name: name.to_owned(),
            value: escape_value(value),
        });
    }

    /// Declare a rule. Binding values are written verbatim.
    pub fn rule(&mut self, name: &str, bindings: &[(&str, &str)]) {
        self.statements.push(Statement::Rule {
            name: name.to_owned(),
            bindings: bindings
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect(),
        });
    }

    /// Append a build edge.
    pub fn build(&mut self, edge: BuildEdge) {
        self.statements.push(Statement::Build(edge));
    }

    /// Include another Ninja file in a child scope.
    pub fn subninja(&mut self, path: &str) {
        self.statements.push(Statement::Subninja(path.to_owned()));
    }

    /// Number of `build` statements written so far.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.statements
            .iter()
            .filter(|statement| matches!(statement, Statement::Build(_)))
            .count()
    }

    /// Render every statement as Ninja text.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for statement in &self.statements {
            if let Err(err) = write!(out, "{statement}") {
                debug_assert!(false, "formatting into a String failed: {err}");
            }
        }
        out
    }
}

/// Escape a path for use in a `build` line.
#[must_use]
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '$' => out.push_str("$$"),
            ' ' => out.push_str("$ "),
            ':' => out.push_str("$:"),
            '\n' => out.push_str("$\n"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape a literal binding value.
#[must_use]
pub fn escape_value(value: &str) -> String {
    value.replace('$', "$$")
}

fn join(paths: &[String]) -> String {
    paths.iter().map(|path| escape_path(path)).join(" ")
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comment(text) => writeln!(f, "# {text}"),
            Self::Newline => writeln!(f),
            Self::Binding { name, value } => writeln!(f, "{name} = {value}"),
            Self::Rule { name, bindings } => {
                writeln!(f, "rule {name}")?;
                for (key, value) in bindings {
                    writeln!(f, "  {key} = {value}")?;
                }
                writeln!(f)
            }
            Self::Build(edge) => write!(f, "{}", DisplayEdge(edge)),
            Self::Subninja(path) => writeln!(f, "subninja {}", escape_path(path)),
        }
    }
}

struct DisplayEdge<'a>(&'a BuildEdge);

impl Display for DisplayEdge<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let edge = self.0;
        write!(f, "build {}: {}", join(&edge.outputs), edge.rule)?;
        if !edge.inputs.is_empty() {
            write!(f, " {}", join(&edge.inputs))?;
        }
        if !edge.implicit_inputs.is_empty() {
            write!(f, " | {}", join(&edge.implicit_inputs))?;
        }
        if !edge.order_only.is_empty() {
            write!(f, " || {}", join(&edge.order_only))?;
        }
        writeln!(f)?;
        for (key, value) in &edge.bindings {
            writeln!(f, "  {key} = {}", escape_value(value))?;
        }
        Ok(())
    }
}
