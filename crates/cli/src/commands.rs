use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use mystfig_core::{
    find_unreferenced, insert_figure, refactor_chapter, standardize_chapter, sync_reference_case,
    write_unreferenced_list, Book, BookConfig, FigError, InsertRequest, OperationKind,
    OperationReport, RunOptions,
};

use crate::output::{render_plan, render_report, render_unreferenced};
use crate::prompt;

const CONFIG_ENV: &str = "MYSTFIG_CONFIG";
const DEFAULT_CONFIG: &str = "config.json";

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub json: bool,
    pub dry_run: bool,
    pub assume_yes: bool,
}

/// Builds the chapter registry from `--config`, `MYSTFIG_CONFIG` or `<root>/config.json`.
///
/// Without any config file the content directory is scanned for chapters.
pub fn load_book(root: &Path, config: Option<PathBuf>) -> Result<Book> {
    let explicit = config.or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
    let config = match explicit {
        Some(path) => {
            let path = root.join(path);
            BookConfig::load(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => {
            let path = root.join(DEFAULT_CONFIG);
            if path.exists() {
                BookConfig::load(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?
            } else {
                info!("no {DEFAULT_CONFIG} found, discovering chapters");
                BookConfig {
                    auto_discover: true,
                    ..BookConfig::default()
                }
            }
        }
    };
    Book::from_config(&config, root).context("invalid book configuration")
}

pub fn renumber(
    book: &Book,
    kind: OperationKind,
    chapter: Option<u32>,
    settings: Settings,
) -> Result<()> {
    let chapters = match chapter {
        Some(number) => vec![number],
        None => book.chapters.keys().copied().collect(),
    };
    if chapters.is_empty() {
        bail!("no chapters configured");
    }
    let options = RunOptions {
        dry_run: settings.dry_run,
    };

    let mut reports = Vec::new();
    let mut errors = 0usize;
    for number in chapters {
        let confirm = |report: &OperationReport| confirm_plan(report, settings);
        let result = match kind {
            OperationKind::Refactor => refactor_chapter(book, number, options, confirm),
            _ => standardize_chapter(book, number, options, confirm),
        };
        match result {
            Ok(report) => {
                if !settings.json {
                    print!("{}", render_report(&report));
                }
                reports.push(report);
            }
            Err(err @ FigError::UnknownChapter(_)) if chapter.is_some() => return Err(err.into()),
            Err(err) => {
                warn!("chapter {number} failed: {err}");
                errors += 1;
            }
        }
    }
    if settings.json {
        print_json(&reports)?;
    }
    finish(&reports, errors)
}

pub fn insert(book: &Book, request: InsertRequest, settings: Settings) -> Result<()> {
    let options = RunOptions {
        dry_run: settings.dry_run,
    };
    let report = insert_figure(book, &request, options, |report| {
        confirm_plan(report, settings)
    })?;
    emit(&report, settings)?;
    finish(std::slice::from_ref(&report), 0)
}

pub fn sync_case(book: &Book, chapter: Option<u32>, settings: Settings) -> Result<()> {
    let chapters = match chapter {
        Some(number) => vec![number],
        None => book.chapters.keys().copied().collect(),
    };
    let options = RunOptions {
        dry_run: settings.dry_run,
    };
    let mut reports = Vec::new();
    for number in chapters {
        let report = sync_reference_case(book, number, options)?;
        if !settings.json {
            print!("{}", render_report(&report));
            for fix in &report.mapping {
                println!("    {} -> {}", fix.old_filename, fix.new_filename);
            }
        }
        reports.push(report);
    }
    if settings.json {
        print_json(&reports)?;
    }
    finish(&reports, 0)
}

pub fn unreferenced(book: &Book, output: Option<PathBuf>, json: bool) -> Result<()> {
    let report = find_unreferenced(book)?;
    if let Some(path) = output {
        write_unreferenced_list(&report, &path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {} path(s) to {}", report.unreferenced.len(), path.display());
    }
    if json {
        print_json(&report)
    } else {
        print!("{}", render_unreferenced(&report));
        Ok(())
    }
}

fn confirm_plan(report: &OperationReport, settings: Settings) -> bool {
    if settings.assume_yes {
        return true;
    }
    eprint!("{}", render_plan(report));
    prompt::confirm("Proceed with these changes?")
}

fn emit(report: &OperationReport, settings: Settings) -> Result<()> {
    if settings.json {
        print_json(report)
    } else {
        print!("{}", render_report(report));
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn finish(reports: &[OperationReport], errors: usize) -> Result<()> {
    let failed = reports.iter().filter(|report| report.has_failures()).count();
    if errors > 0 || failed > 0 {
        bail!(
            "{} chapter(s) failed, {} finished with failures",
            errors,
            failed
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn explicit_toml_config_resolves_against_root() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("book.toml"),
            "[chapters.2]\ndir = \"content/Chap02Rays\"\nfile = \"Rays.md\"\n",
        )
        .unwrap();
        let book = load_book(dir.path(), Some(PathBuf::from("book.toml"))).unwrap();
        let chapter = book.chapter(2).unwrap();
        assert_eq!(chapter.dir, dir.path().join("content/Chap02Rays"));
        assert_eq!(chapter.code, "rays");
    }

    #[test]
    fn missing_default_config_falls_back_to_discovery() {
        let dir = tempdir().unwrap();
        let chapter = dir.path().join("content").join("Chap04Lenses");
        fs::create_dir_all(&chapter).unwrap();
        fs::write(chapter.join("Lenses.md"), "# Lenses\n").unwrap();
        let book = load_book(dir.path(), None).unwrap();
        assert_eq!(book.chapter(4).unwrap().primary_document, "Lenses.md");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_book(dir.path(), Some(PathBuf::from("nope.json"))).is_err());
    }
}
