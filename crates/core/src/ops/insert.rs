use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{directory_listing, file_name, write_documents, write_file, RunOptions};
use crate::config::Book;
use crate::error::{FigError, Result};
use crate::execute::{execute, RenameFailure};
use crate::naming::{
    canonical_filename, clean_descriptive, descriptive_name_of, extension_of, is_canonical,
};
use crate::plan::{plan, StepKind};
use crate::report::{InsertedFigure, OperationKind, OperationReport, Outcome, PlannedRename};
use crate::resolve::{existing_figures, resolve_insertion};
use crate::rewrite::Rewriter;
use crate::scan::{chapter_documents, load_documents, scan_documents, ScanOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertRequest {
    /// Image to copy into the chapter.
    pub image: PathBuf,
    pub chapter: u32,
    /// 1-based slot; values past the end are clamped.
    pub position: u32,
    /// Descriptive name; derived from the image filename when absent.
    pub name: Option<String>,
}

/// Opens a slot at `request.position` by shifting later figures up by one,
/// copies the new image (and its siblings) in, and updates references to the
/// shifted figures.
pub fn insert_figure<C>(
    book: &Book,
    request: &InsertRequest,
    options: RunOptions,
    mut confirm: C,
) -> Result<OperationReport>
where
    C: FnMut(&OperationReport) -> bool,
{
    let chapter = book.chapter(request.chapter)?;
    if request.position < 1 {
        return Err(FigError::InvalidPosition(request.position));
    }
    if !request.image.is_file() {
        return Err(FigError::SourceMissing(request.image.clone()));
    }
    let source_name = file_name(&request.image)
        .ok_or_else(|| FigError::SourceMissing(request.image.clone()))?;
    let extension = extension_of(source_name);
    if extension.is_empty() {
        return Err(FigError::Other(format!(
            "image has no extension: {}",
            request.image.display()
        )));
    }

    let number = request.chapter;
    let images_dir = chapter.images_dir();
    let existing = existing_figures(&images_dir, number, &book.image_extensions)?;
    let insertion = resolve_insertion(&existing, request.position, number)?;

    let descriptive = match &request.name {
        Some(name) => clean_descriptive(name),
        None => descriptive_name_of(source_name),
    };
    let filename = canonical_filename(number, insertion.position, &descriptive, extension);
    let destination = images_dir.join(&filename);

    let occupied = directory_listing(&images_dir)?;
    let shift_plan = plan(&insertion.shifts, &occupied)?;
    let vacated: HashSet<&PathBuf> = shift_plan
        .steps
        .iter()
        .filter(|step| step.kind != StepKind::FromTemporary)
        .map(|step| &step.from)
        .collect();
    if occupied.contains(&destination) && !vacated.contains(&destination) {
        return Err(FigError::SlotOccupied(destination));
    }

    let sibling_sources: Vec<(PathBuf, PathBuf)> = book
        .sibling_extensions
        .iter()
        .map(|ext| (request.image.with_extension(ext), destination.with_extension(ext)))
        .filter(|(from, to)| from.is_file() && from != &request.image && to != &destination)
        .collect();

    let paths = chapter_documents(chapter)?;
    let (documents, unreadable) = load_documents(&paths);
    let scan = scan_documents(documents, Some(&images_dir), ScanOptions::default());
    let external = scan.external_dirs();

    let mut report = OperationReport::new(OperationKind::Insert, number, options.dry_run);
    report.unreadable = unreadable;
    report.images_total = existing.len();
    report.properly_named = existing
        .iter()
        .filter(|figure| is_canonical(&figure.filename, number))
        .count();
    report.mapping = PlannedRename::from_mapping(&insertion.shifts);
    report.plan = shift_plan;
    report.inserted = Some(InsertedFigure {
        source: request.image.clone(),
        path: destination.clone(),
        filename: filename.clone(),
        siblings: sibling_sources.iter().map(|(_, to)| to.clone()).collect(),
        requested_position: insertion.requested,
        position: insertion.position,
    });
    info!(
        chapter = number,
        position = insertion.position,
        shifts = insertion.shifts.len(),
        "insert plan ready for {filename}"
    );

    if options.dry_run {
        report.outcome = Outcome::DryRun;
        return Ok(report);
    }
    if !confirm(&report) {
        report.outcome = Outcome::Cancelled;
        return Ok(report);
    }

    fs::create_dir_all(&images_dir)?;
    let outcome = execute(&report.plan, &book.sibling_extensions);
    let rewriter = Rewriter::new(
        outcome
            .applied
            .iter()
            .map(|applied| (applied.old_filename.clone(), applied.new_filename.clone())),
    );
    report.record_execution(outcome);

    for (from, to) in std::iter::once((request.image.clone(), destination.clone()))
        .chain(sibling_sources.into_iter())
    {
        if let Err(error) = copy_no_clobber(&from, &to) {
            warn!("failed to copy {} -> {}: {error}", from.display(), to.display());
            report.failed.push(RenameFailure {
                old_filename: file_name(&from).unwrap_or_default().to_string(),
                left_at: from.clone(),
                from,
                to,
                error,
                restored: true,
            });
            break;
        }
    }

    let (updated, failures) = write_documents(&scan.documents, &rewriter, &external, write_file);
    report.documents_updated = updated;
    report.document_failures = failures;
    report.finish();
    info!(
        chapter = number,
        shifted = report.figures_renamed(),
        documents = report.documents_updated.len(),
        "inserted {filename}"
    );
    Ok(report)
}

fn copy_no_clobber(from: &Path, to: &Path) -> std::result::Result<(), String> {
    if to.exists() {
        return Err(format!("{} already exists", to.display()));
    }
    fs::copy(from, to).map(|_| ()).map_err(|err| err.to_string())
}
