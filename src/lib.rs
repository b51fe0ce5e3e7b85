//! Ninja build-graph synthesis for resolved project builds.
//!
//! The crate turns per-target lists of [`invocation::ToolInvocation`]s into
//! a root Ninja file plus one sub-graph per target ([`assemble`]), and plans
//! the link, universal-binary and debug-symbol steps of a target
//! ([`linkage`]). Build plans in YAML ([`plan`]) feed both through the
//! `ninjaweave` command line tool.

pub mod assemble;
pub mod cli;
pub mod graph;
pub mod invocation;
pub mod linkage;
pub mod naming;
pub mod ninja_gen;
pub mod plan;
pub mod runner;
pub mod target;
pub mod tools;
