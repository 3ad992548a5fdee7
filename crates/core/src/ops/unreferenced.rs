use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::Book;
use crate::error::{FigError, Result};
use crate::report::UnreferencedReport;
use crate::scan::{load_documents, scan_document, ScanOptions};

/// Lists every image under the content root that no markdown file refers to.
///
/// References are matched by resolved location, trying the document's own
/// directory, its `Images/` folder and the parent directory. Bare
/// `Images/...` literals count as references here.
pub fn find_unreferenced(book: &Book) -> Result<UnreferencedReport> {
    let root = &book.content_root;
    if !root.is_dir() {
        return Err(FigError::Config(format!(
            "content directory not found: {}",
            root.display()
        )));
    }

    let mut images = Vec::new();
    let mut markdown = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.into_path();
        if is_markdown(&path) {
            markdown.push(path);
        } else if book.is_image(&path) {
            images.push(path);
        }
    }
    info!(
        images = images.len(),
        documents = markdown.len(),
        "scanning {} for image references",
        root.display()
    );

    let (documents, unreadable) = load_documents(&markdown);
    let options = ScanOptions {
        bare_literals: true,
    };
    let mut referenced = HashSet::new();
    let mut references_total = 0;
    for document in &documents {
        let base = document.path.parent().unwrap_or(root);
        for reference in scan_document(document, None, options) {
            references_total += 1;
            for candidate in candidates(base, &reference.raw_path, &reference.filename) {
                if candidate.is_file() {
                    referenced.insert(normalize(&candidate));
                }
            }
        }
    }

    let unreferenced: Vec<PathBuf> = images
        .iter()
        .filter(|image| !referenced.contains(&normalize(image)))
        .map(|image| image.strip_prefix(root).unwrap_or(image).to_path_buf())
        .collect();
    for path in &unreferenced {
        debug!("unreferenced: {}", path.display());
    }

    Ok(UnreferencedReport {
        content_root: root.clone(),
        documents_scanned: documents.len(),
        references_total,
        images_total: images.len(),
        unreferenced,
        unreadable,
    })
}

/// Writes the report as one relative path per line.
pub fn write_unreferenced_list(report: &UnreferencedReport, output: &Path) -> Result<()> {
    let mut file = fs::File::create(output)?;
    for path in &report.unreferenced {
        writeln!(file, "{}", path.display())?;
    }
    Ok(())
}

fn candidates(base: &Path, raw_path: &str, filename: &str) -> Vec<PathBuf> {
    let raw = raw_path.strip_prefix("./").unwrap_or(raw_path);
    let mut out = vec![base.join(raw)];
    if let Some(parent) = base.parent() {
        out.push(parent.join(raw));
    }
    if !filename.is_empty() && !filename.contains(['/', '\\']) {
        out.push(base.join("Images").join(filename));
    }
    out
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || name == "_build")
        .unwrap_or(false)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}
