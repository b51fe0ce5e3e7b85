//! Command line interface definition using clap.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

use crate::plan::DEFAULT_PLAN_FILE;

/// Turn a resolved build plan into a Ninja build graph.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the build plan to read.
    #[arg(short, long, value_name = "PLAN", default_value = DEFAULT_PLAN_FILE)]
    pub file: Utf8PathBuf,

    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<Utf8PathBuf>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory holding executables for `builtin-` tools.
    #[arg(long, value_name = "DIR")]
    pub builtin_dir: Option<Utf8PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments accepted by the `generate` command.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct GenerateArgs {
    /// Write graph files but skip auxiliary files.
    #[arg(long)]
    pub dry_run: bool,
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Plan linkage, then write the root and per-target Ninja files.
    Generate(GenerateArgs),

    /// Print one target's planned link invocations as JSON.
    Link {
        /// Target whose linkage to plan.
        #[arg(long, value_name = "NAME")]
        target: String,
    },

    /// List targets with their direct dependencies.
    Targets,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["ninjaweave", "targets"], "build-plan.yml", None)]
    #[case(&["ninjaweave", "-C", "/work", "-f", "plan.yml", "targets"], "plan.yml", Some("/work"))]
    fn global_options(
        #[case] args: &[&str],
        #[case] file: &str,
        #[case] directory: Option<&str>,
    ) {
        let cli = Cli::try_parse_from(args).expect("parse");
        assert_eq!(cli.file, file);
        assert_eq!(cli.directory.as_deref().map(camino::Utf8Path::as_str), directory);
        assert_eq!(cli.command, Commands::Targets);
    }

    #[test]
    fn generate_accepts_dry_run() {
        let cli = Cli::try_parse_from(["ninjaweave", "-v", "generate", "--dry-run"]).expect("parse");
        assert!(cli.verbose);
        assert_eq!(cli.command, Commands::Generate(GenerateArgs { dry_run: true }));
    }

    #[test]
    fn link_requires_a_target() {
        assert!(Cli::try_parse_from(["ninjaweave", "link"]).is_err());
    }
}
