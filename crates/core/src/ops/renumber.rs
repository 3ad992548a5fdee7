use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{directory_listing, file_name, write_documents, write_file, RunOptions};
use crate::config::{Book, Chapter};
use crate::error::Result;
use crate::execute::execute;
use crate::naming::{is_canonical, NamePolicy};
use crate::plan::plan;
use crate::report::{OperationKind, OperationReport, Outcome, PlannedRename};
use crate::resolve::{list_chapter_images, resolve_order_with, unreferenced};
use crate::rewrite::Rewriter;
use crate::scan::{chapter_documents, load_documents, scan_documents, ScanOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentScope {
    /// Every markdown file of the chapter, `Problems/` included.
    Chapter,
    /// Only the chapter's primary document.
    Primary,
}

/// Renumbers a chapter's figures by order of first appearance and fixes every reference.
pub fn standardize_chapter<C>(
    book: &Book,
    chapter: u32,
    options: RunOptions,
    confirm: C,
) -> Result<OperationReport>
where
    C: FnMut(&OperationReport) -> bool,
{
    renumber(
        book,
        chapter,
        OperationKind::Standardize,
        NamePolicy::Descriptive,
        DocumentScope::Chapter,
        options,
        confirm,
        write_file,
    )
}

/// Lighter renumbering: keeps each figure's stem and looks only at the primary document.
pub fn refactor_chapter<C>(
    book: &Book,
    chapter: u32,
    options: RunOptions,
    confirm: C,
) -> Result<OperationReport>
where
    C: FnMut(&OperationReport) -> bool,
{
    renumber(
        book,
        chapter,
        OperationKind::Refactor,
        NamePolicy::KeepStem,
        DocumentScope::Primary,
        options,
        confirm,
        write_file,
    )
}

#[allow(clippy::too_many_arguments)]
fn renumber<C, W>(
    book: &Book,
    number: u32,
    kind: OperationKind,
    policy: NamePolicy,
    scope: DocumentScope,
    options: RunOptions,
    mut confirm: C,
    write: W,
) -> Result<OperationReport>
where
    C: FnMut(&OperationReport) -> bool,
    W: FnMut(&Path, &str) -> io::Result<()>,
{
    let chapter = book.chapter(number)?;
    let mut report = OperationReport::new(kind, number, options.dry_run);
    if !chapter.dir.is_dir() {
        warn!("chapter {number} directory not found: {}", chapter.dir.display());
        return Ok(report);
    }

    let images_dir = chapter.images_dir();
    let images = list_chapter_images(&images_dir, &book.image_extensions)?;
    report.images_total = images.len();
    report.properly_named = images
        .iter()
        .filter(|path| file_name(path).is_some_and(|name| is_canonical(name, number)))
        .count();

    let paths = document_paths(chapter, scope)?;
    let (documents, unreadable) = load_documents(&paths);
    let mut scan = scan_documents(documents, Some(&images_dir), ScanOptions::default());
    scan.unreadable = unreadable;

    let mapping = resolve_order_with(number, &scan, policy)?;
    let rename_plan = plan(&mapping, &directory_listing(&images_dir)?)?;
    for blocked in &rename_plan.blocked {
        warn!("cannot rename {}: {}", blocked.entry, blocked.reason);
    }

    report.mapping = PlannedRename::from_mapping(&mapping);
    report.unreferenced = unreferenced(&images, &mapping);
    report.unresolved = std::mem::take(&mut scan.unresolved);
    report.unreadable = std::mem::take(&mut scan.unreadable);
    report.plan = rename_plan;
    info!(
        chapter = number,
        figures = mapping.len(),
        renames = mapping.renames_needed(),
        unresolved = report.unresolved.len(),
        "{} plan ready",
        kind.label()
    );

    if report.plan.is_empty() {
        return Ok(report);
    }
    if options.dry_run {
        report.outcome = Outcome::DryRun;
        return Ok(report);
    }
    if !confirm(&report) {
        info!(chapter = number, "{} cancelled", kind.label());
        report.outcome = Outcome::Cancelled;
        return Ok(report);
    }

    let outcome = execute(&report.plan, &book.sibling_extensions);
    let rewriter = Rewriter::new(
        outcome
            .applied
            .iter()
            .map(|applied| (applied.old_filename.clone(), applied.new_filename.clone())),
    );
    report.record_execution(outcome);
    let (updated, failures) =
        write_documents(&scan.documents, &rewriter, &scan.external_dirs(), write);
    report.documents_updated = updated;
    report.document_failures = failures;
    report.finish();

    info!(
        chapter = number,
        renamed = report.figures_renamed(),
        documents = report.documents_updated.len(),
        failures = report.failed.len() + report.document_failures.len(),
        "{} finished",
        kind.label()
    );
    Ok(report)
}

fn document_paths(chapter: &Chapter, scope: DocumentScope) -> Result<Vec<PathBuf>> {
    match scope {
        DocumentScope::Chapter => chapter_documents(chapter),
        DocumentScope::Primary => {
            let primary = chapter.primary_path();
            if primary.is_file() {
                Ok(vec![primary])
            } else {
                warn!("primary document not found: {}", primary.display());
                Ok(Vec::new())
            }
        }
    }
}
