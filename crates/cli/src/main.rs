mod cli;
mod commands;
mod logging;
mod output;
mod prompt;

use anyhow::Result;
use clap::Parser;
use mystfig_core::{InsertRequest, OperationKind};

use crate::cli::{Cli, Command};
use crate::commands::Settings;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);

    let book = commands::load_book(&cli.root, cli.config.clone())?;
    let settings = |dry_run: bool, assume_yes: bool| Settings {
        json: cli.json,
        dry_run,
        assume_yes,
    };

    match cli.command {
        Command::Standardize {
            chapter,
            dry_run,
            yes,
        } => commands::renumber(
            &book,
            OperationKind::Standardize,
            chapter,
            settings(dry_run, yes),
        ),
        Command::Refactor {
            chapter,
            dry_run,
            yes,
        } => commands::renumber(
            &book,
            OperationKind::Refactor,
            chapter,
            settings(dry_run, yes),
        ),
        Command::Insert {
            image,
            chapter,
            position,
            name,
            dry_run,
            yes,
        } => commands::insert(
            &book,
            InsertRequest {
                image,
                chapter,
                position,
                name,
            },
            settings(dry_run, yes),
        ),
        Command::Unreferenced { output } => commands::unreferenced(&book, output, cli.json),
        Command::SyncCase { chapter, dry_run } => {
            commands::sync_case(&book, chapter, settings(dry_run, true))
        }
    }
}
