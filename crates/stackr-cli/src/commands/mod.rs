//! Command definitions and dispatch.

pub mod completions;
pub mod land;
pub mod rebase;
pub mod utils;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Stackr - rebase and land stacked pull requests.
#[derive(Debug, Parser)]
#[command(name = "stackr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// GitHub repository as OWNER/NAME. Defaults to the configured remote.
    #[arg(long, global = true, value_name = "OWNER/NAME")]
    pub repo: Option<String>,

    /// GitHub token. Falls back to `gh auth token`.
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Log more; repeat for more detail. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors and essential output.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rebase a pull request and everything stacked on it onto a new base.
    ///
    /// Finds the open pull requests whose head is BRANCH, rebases them and
    /// their dependents, force-pushes the results, and points the pull
    /// requests at the new base.
    Rebase {
        /// Branch to rebase onto, as named on the remote.
        #[arg(long, value_name = "BASE")]
        onto: String,

        /// Head branch of the pull requests to rebase. Defaults to the
        /// current branch.
        branch: Option<String>,

        /// Only rebase pull requests opened by this user.
        #[arg(long, value_name = "LOGIN")]
        author: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Squash-merge a pull request and restack its dependents onto its base.
    Land {
        /// Head branch of the pull request to land. Defaults to the current
        /// branch.
        branch: Option<String>,

        /// Skip the approval and build checks.
        #[arg(long)]
        no_check: bool,

        /// Use the generated commit message without opening an editor.
        #[arg(long)]
        no_edit: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rebase_requires_onto() {
        assert!(Cli::try_parse_from(["stackr", "rebase"]).is_err());
    }

    #[test]
    fn test_rebase_args() {
        let cli = Cli::try_parse_from([
            "stackr", "rebase", "--onto", "main", "feature", "--author", "octocat", "-vv",
        ])
        .unwrap();

        assert_eq!(cli.global.verbose, 2);
        match cli.command {
            Commands::Rebase {
                onto,
                branch,
                author,
                json,
            } => {
                assert_eq!(onto, "main");
                assert_eq!(branch.as_deref(), Some("feature"));
                assert_eq!(author.as_deref(), Some("octocat"));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_land_flags() {
        let cli = Cli::try_parse_from(["stackr", "land", "--no-check", "--no-edit", "-q"]).unwrap();

        assert!(cli.global.quiet);
        match cli.command {
            Commands::Land {
                branch,
                no_check,
                no_edit,
                ..
            } => {
                assert_eq!(branch, None);
                assert!(no_check);
                assert!(no_edit);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["stackr", "-q", "-v", "land"]).is_err());
    }
}
