use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "mystfig",
    version,
    about = "Keep MyST figure filenames numbered in reading order"
)]
pub struct Cli {
    /// Book config (JSON, or TOML by extension). Falls back to MYSTFIG_CONFIG, then config.json.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory that relative config paths resolve against.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    /// Print reports as JSON on stdout.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Renumber figures by first appearance and give them descriptive names.
    Standardize {
        /// Only this chapter; every configured chapter otherwise.
        #[arg(long)]
        chapter: Option<u32>,
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Copy a new figure into a chapter, shifting later figures by one.
    Insert {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        chapter: u32,
        #[arg(long)]
        position: u32,
        /// Descriptive name; derived from the image filename when omitted.
        #[arg(long)]
        name: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Renumber figures from the primary document, keeping their current stems.
    Refactor {
        #[arg(long)]
        chapter: Option<u32>,
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// List images under the content root that no document refers to.
    Unreferenced {
        /// Also write the list, one path per line.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fix references whose filename case differs from the file on disk.
    SyncCase {
        #[arg(long)]
        chapter: Option<u32>,
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_insert_with_global_flags() {
        let cli = Cli::try_parse_from([
            "mystfig",
            "insert",
            "--image",
            "new/lens.png",
            "--chapter",
            "3",
            "--position",
            "2",
            "--name",
            "thin lens",
            "--json",
            "--root",
            "book",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.root, PathBuf::from("book"));
        match cli.command {
            Command::Insert {
                image,
                chapter,
                position,
                name,
                dry_run,
                yes,
            } => {
                assert_eq!(image, PathBuf::from("new/lens.png"));
                assert_eq!((chapter, position), (3, 2));
                assert_eq!(name.as_deref(), Some("thin lens"));
                assert!(!dry_run && !yes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_standardize_for_every_chapter() {
        let cli = Cli::try_parse_from(["mystfig", "standardize", "--dry-run", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Standardize {
                chapter: None,
                dry_run: true,
                yes: true
            }
        ));
        assert!(Cli::try_parse_from(["mystfig", "sync-case", "--chapter", "4"]).is_ok());
    }

    #[test]
    fn insert_requires_position() {
        assert!(Cli::try_parse_from(["mystfig", "insert", "--image", "a.png", "--chapter", "1"]).is_err());
    }
}
