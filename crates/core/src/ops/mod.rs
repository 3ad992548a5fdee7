//! Chapter operations built from the scan → resolve → plan → execute → rewrite stages.
//!
//! Each operation finishes its read phase and its plan before the first
//! write. Dry runs return the plan without ever calling `confirm`; a `false`
//! from `confirm` cancels with nothing touched.

mod case_sync;
mod insert;
mod renumber;
mod unreferenced;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::report::DocumentFailure;
use crate::rewrite::Rewriter;
use crate::scan::Document;

pub use case_sync::sync_reference_case;
pub use insert::{insert_figure, InsertRequest};
pub use renumber::{refactor_chapter, standardize_chapter};
pub use unreferenced::{find_unreferenced, write_unreferenced_list};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

/// Every file currently in `dir`; empty when the directory does not exist.
pub(crate) fn directory_listing(dir: &Path) -> Result<BTreeSet<PathBuf>> {
    let mut listing = BTreeSet::new();
    if !dir.is_dir() {
        return Ok(listing);
    }
    for entry in fs::read_dir(dir)? {
        listing.insert(entry?.path());
    }
    Ok(listing)
}

/// Directory prefixes per document that must not be rewritten.
pub(crate) type ExternalDirs = HashMap<PathBuf, BTreeSet<String>>;

pub(crate) fn write_file(path: &Path, text: &str) -> io::Result<()> {
    fs::write(path, text)
}

/// Writes back every document the rewriter changes. Untouched documents are never written.
///
/// A failed write is recorded with the old names the document still holds;
/// the remaining documents are written regardless.
pub(crate) fn write_documents<W>(
    documents: &[Document],
    rewriter: &Rewriter,
    external: &ExternalDirs,
    mut write: W,
) -> (Vec<PathBuf>, Vec<DocumentFailure>)
where
    W: FnMut(&Path, &str) -> io::Result<()>,
{
    let mut updated = Vec::new();
    let mut failures = Vec::new();
    if rewriter.is_empty() {
        return (updated, failures);
    }
    let none = BTreeSet::new();
    for document in documents {
        let skipped = external.get(&document.path).unwrap_or(&none);
        let rewritten = rewriter.rewrite_skipping(&document.text, skipped);
        if !rewritten.changed() {
            continue;
        }
        match write(&document.path, &rewritten.text) {
            Ok(()) => {
                info!(
                    "updated {} ({} references)",
                    document.path.display(),
                    rewritten.replacements
                );
                updated.push(document.path.clone());
            }
            Err(err) => {
                warn!("failed to write {}: {err}", document.path.display());
                failures.push(DocumentFailure {
                    path: document.path.clone(),
                    error: err.to_string(),
                    stale_references: rewritten.matched.into_iter().collect(),
                });
            }
        }
    }
    (updated, failures)
}

pub(crate) fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}
