//! Whole-build registry of phony-output placeholders.
//!
//! Placeholder names come from hashing the real path, so two invocations
//! declaring the same phony output would otherwise share one fake output and
//! Ninja would reject the duplicate edge. The registry hands the plain name
//! to the first claimant and a numbered variant to every later one,
//! recording each collision.

use std::collections::HashMap;

use camino::Utf8PathBuf;
use tracing::warn;

use crate::naming::{phony_placeholder_name, placeholder_for_text};

/// What a placeholder stands in for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderSource {
    /// A phony output path declared by an invocation.
    PhonyOutput(Utf8PathBuf),
    /// The command line of an invocation that declares no outputs at all.
    Command(String),
}

/// A synthetic output node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Node name written into the graph.
    pub name: String,
    /// What the node tracks.
    pub source: PlaceholderSource,
}

/// A placeholder name that had to be disambiguated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderCollision {
    /// Target whose invocation hit the collision.
    pub target: String,
    /// Name the source would have received.
    pub base_name: String,
    /// Name actually assigned.
    pub assigned: String,
}

/// Assigns unique placeholder names across one build.
#[derive(Debug, Default)]
pub struct PlaceholderRegistry {
    claims: HashMap<String, usize>,
    collisions: Vec<PlaceholderCollision>,
}

impl PlaceholderRegistry {
    /// Claim a placeholder for `source` on behalf of `target`.
    pub fn assign(&mut self, target: &str, source: PlaceholderSource) -> Placeholder {
        let base_name = match &source {
            PlaceholderSource::PhonyOutput(path) => phony_placeholder_name(path),
            PlaceholderSource::Command(command) => placeholder_for_text(command),
        };
        let claims = self.claims.entry(base_name.clone()).or_insert(0);
        let name = if *claims == 0 {
            base_name.clone()
        } else {
            format!("{base_name}-{claims}")
        };
        *claims += 1;

        if name != base_name {
            warn!(
                target_name = target,
                placeholder = %base_name,
                assigned = %name,
                "duplicate phony output; disambiguating placeholder"
            );
            self.collisions.push(PlaceholderCollision {
                target: target.to_owned(),
                base_name,
                assigned: name.clone(),
            });
        }
        Placeholder { name, source }
    }

    /// Collisions recorded so far, in assignment order.
    #[must_use]
    pub fn collisions(&self) -> &[PlaceholderCollision] {
        &self.collisions
    }
}
