//! Stackr CLI - rebase and land stacked pull requests.

use clap::Parser;

mod commands;
mod editor;
mod logging;
mod output;

use commands::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbose, cli.global.quiet);
    output::set_quiet(cli.global.quiet);

    let result = match cli.command {
        Commands::Rebase {
            onto,
            branch,
            author,
            json,
        } => commands::rebase::run(&cli.global, &onto, branch, author, json),
        Commands::Land {
            branch,
            no_check,
            no_edit,
            json,
        } => commands::land::run(&cli.global, branch, no_check, no_edit, json),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
