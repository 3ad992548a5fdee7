use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{info, warn};

use super::{file_name, write_documents, write_file, RunOptions};
use crate::config::Book;
use crate::error::Result;
use crate::report::{OperationKind, OperationReport, Outcome, PlannedRename};
use crate::resolve::list_chapter_images;
use crate::rewrite::Rewriter;
use crate::scan::{chapter_documents, load_documents, scan_documents, Resolution, ScanOptions};

/// Rewrites references whose filename differs from the file on disk only by letter case.
///
/// No file is renamed; the documents are brought in line with `Images/`.
pub fn sync_reference_case(book: &Book, number: u32, options: RunOptions) -> Result<OperationReport> {
    let chapter = book.chapter(number)?;
    let mut report = OperationReport::new(OperationKind::SyncCase, number, options.dry_run);
    let images_dir = chapter.images_dir();
    let images = list_chapter_images(&images_dir, &book.image_extensions)?;
    report.images_total = images.len();

    let on_disk: HashSet<&str> = images.iter().filter_map(|path| file_name(path)).collect();
    let by_lowercase: HashMap<String, &str> = on_disk
        .iter()
        .map(|name| (name.to_lowercase(), *name))
        .collect();

    let paths = chapter_documents(chapter)?;
    let (documents, unreadable) = load_documents(&paths);
    let scan = scan_documents(
        documents,
        Some(&images_dir),
        ScanOptions {
            bare_literals: true,
        },
    );
    report.unreadable = unreadable;

    let mut fixes: BTreeMap<String, String> = BTreeMap::new();
    for reference in &scan.references {
        let written = reference.filename.as_str();
        if matches!(reference.resolution, Resolution::External(_)) {
            continue;
        }
        if written.is_empty() || on_disk.contains(written) {
            continue;
        }
        match by_lowercase.get(&written.to_lowercase()) {
            Some(actual) => {
                fixes.insert(written.to_string(), actual.to_string());
            }
            None if reference.resolution.resolved_path().is_none() => {
                report.unresolved.push(reference.clone());
            }
            None => {}
        }
    }

    report.mapping = fixes
        .iter()
        .map(|(old, new)| PlannedRename {
            old_filename: old.clone(),
            new_filename: new.clone(),
            position: None,
            old_position: None,
            needs_rename: true,
        })
        .collect();
    info!(
        chapter = number,
        fixes = fixes.len(),
        "case sync plan ready"
    );
    if fixes.is_empty() {
        return Ok(report);
    }
    if options.dry_run {
        report.outcome = Outcome::DryRun;
        return Ok(report);
    }

    let rewriter = Rewriter::new(fixes);
    let (updated, failures) =
        write_documents(&scan.documents, &rewriter, &scan.external_dirs(), write_file);
    for failure in &failures {
        warn!("{} still has mismatched case", failure.path.display());
    }
    report.documents_updated = updated;
    report.document_failures = failures;
    report.finish();
    Ok(report)
}
