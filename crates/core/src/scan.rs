//! Image reference scanner for MyST markdown.
//!
//! Recognised forms, each yielding one path token:
//! - fenced `{figure}` / `{image}` directives (backticks or colons),
//! - inline `![alt](path)` images,
//! - HTML `<img src="...">` elements,
//! - optionally, bare `Images/...` literals in prose.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Chapter;
use crate::error::Result;

static DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:`{3,}|:{3,})\{(?:figure|image)\}\s+(\S+)").unwrap());
static INLINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[.*?\]\(\s*<?([^)\s>]+)>?(?:\s+[^)]*)?\)").unwrap()
});
static HTML_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap());
static BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\.\./)?Images/[\w.\-]+\.[A-Za-z0-9]+").unwrap());

const SKIPPED_SCHEMES: &[&str] = &["http://", "https://", "ftp://", "data:"];
const IMAGES_SEGMENT: &str = "Images/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSyntax {
    Directive,
    InlineImage,
    HtmlImage,
    BareLiteral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "path", rename_all = "snake_case")]
pub enum Resolution {
    /// Exists inside the chapter's `Images/` directory.
    Resolved(PathBuf),
    /// Exists, but somewhere else (another chapter, a shared asset folder).
    External(PathBuf),
    Unresolved,
}

impl Resolution {
    pub fn resolved_path(&self) -> Option<&Path> {
        match self {
            Resolution::Resolved(path) => Some(path.as_path()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub document: PathBuf,
    pub line: usize,
    pub column: usize,
    pub syntax: ReferenceSyntax,
    pub raw_path: String,
    pub filename: String,
    pub line_text: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub bare_literals: bool,
}

/// A markdown document held in memory for the duration of an operation.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadableDocument {
    pub path: PathBuf,
    pub error: String,
}

/// Everything the read phase learned about one chapter.
#[derive(Debug, Clone, Default)]
pub struct ChapterScan {
    pub documents: Vec<Document>,
    pub references: Vec<Reference>,
    /// Resolved references, deduplicated by file, in first-appearance order.
    pub ordered: Vec<Reference>,
    pub unresolved: Vec<Reference>,
    pub unreadable: Vec<UnreadableDocument>,
}

impl ChapterScan {
    /// Directory prefixes, as written, of each document's references to files outside `Images/`.
    pub fn external_dirs(&self) -> HashMap<PathBuf, BTreeSet<String>> {
        let mut dirs: HashMap<PathBuf, BTreeSet<String>> = HashMap::new();
        for reference in &self.references {
            if !matches!(reference.resolution, Resolution::External(_)) {
                continue;
            }
            if let Some(prefix) = reference.raw_path.strip_suffix(reference.filename.as_str()) {
                dirs.entry(reference.document.clone())
                    .or_default()
                    .insert(prefix.to_string());
            }
        }
        dirs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawMatch {
    line: usize,
    column: usize,
    syntax: ReferenceSyntax,
    raw_path: String,
}

fn scan_lines(text: &str, options: ScanOptions) -> Vec<(RawMatch, String)> {
    let mut out = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut hits: Vec<(usize, usize, ReferenceSyntax, &str)> = Vec::new();
        let patterns: [(&Regex, ReferenceSyntax); 3] = [
            (&DIRECTIVE_RE, ReferenceSyntax::Directive),
            (&INLINE_RE, ReferenceSyntax::InlineImage),
            (&HTML_RE, ReferenceSyntax::HtmlImage),
        ];
        for (re, syntax) in patterns {
            for caps in re.captures_iter(line) {
                if let Some(token) = caps.get(1) {
                    hits.push((token.start(), token.end(), syntax, token.as_str()));
                }
            }
        }
        if options.bare_literals {
            for m in BARE_RE.find_iter(line) {
                let overlaps = hits
                    .iter()
                    .any(|(start, end, _, _)| m.start() < *end && *start < m.end());
                if !overlaps {
                    hits.push((m.start(), m.end(), ReferenceSyntax::BareLiteral, m.as_str()));
                }
            }
        }
        hits.sort_by_key(|(start, _, _, _)| *start);
        for (start, _, syntax, token) in hits {
            let Some(raw_path) = clean_path(token) else {
                continue;
            };
            out.push((
                RawMatch {
                    line: idx + 1,
                    column: start + 1,
                    syntax,
                    raw_path,
                },
                line.to_string(),
            ));
        }
    }
    out
}

fn clean_path(token: &str) -> Option<String> {
    let path = token
        .split('#')
        .next()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("")
        .trim();
    if path.is_empty() {
        return None;
    }
    let lower = path.to_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }
    Some(path.to_string())
}

/// Filename portion of a reference: text after the last `Images/`, or the basename.
pub fn reference_filename(raw_path: &str) -> String {
    if let Some(idx) = raw_path.rfind(IMAGES_SEGMENT) {
        return raw_path[idx + IMAGES_SEGMENT.len()..].to_string();
    }
    raw_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw_path)
        .to_string()
}

fn resolve(raw_path: &str, filename: &str, document: &Path, images_dir: Option<&Path>) -> Resolution {
    let is_plain = !filename.is_empty() && !filename.contains(['/', '\\']);
    let base = document.parent().unwrap_or_else(|| Path::new(""));
    let relative = base.join(raw_path);
    let Some(images_dir) = images_dir else {
        return if relative.is_file() {
            Resolution::Resolved(relative)
        } else {
            Resolution::Unresolved
        };
    };
    if relative.is_file() {
        return if is_plain && same_dir(relative.parent(), images_dir) {
            Resolution::Resolved(images_dir.join(filename))
        } else {
            Resolution::External(relative)
        };
    }
    if is_plain {
        let candidate = images_dir.join(filename);
        if candidate.is_file() {
            return Resolution::Resolved(candidate);
        }
    }
    Resolution::Unresolved
}

fn same_dir(dir: Option<&Path>, images_dir: &Path) -> bool {
    let Some(dir) = dir else {
        return false;
    };
    match (fs::canonicalize(dir), fs::canonicalize(images_dir)) {
        (Ok(dir), Ok(images_dir)) => dir == images_dir,
        _ => false,
    }
}

/// Scans one in-memory document, in line order then column order.
pub fn scan_document(
    document: &Document,
    images_dir: Option<&Path>,
    options: ScanOptions,
) -> Vec<Reference> {
    scan_lines(&document.text, options)
        .into_iter()
        .map(|(raw, line_text)| {
            let filename = reference_filename(&raw.raw_path);
            let resolution = resolve(&raw.raw_path, &filename, &document.path, images_dir);
            Reference {
                document: document.path.clone(),
                line: raw.line,
                column: raw.column,
                syntax: raw.syntax,
                raw_path: raw.raw_path,
                filename,
                line_text: line_text.trim().to_string(),
                resolution,
            }
        })
        .collect()
}

/// Markdown files of a chapter: its own `*.md` plus `Problems/*.md`, sorted by path.
pub fn chapter_documents(chapter: &Chapter) -> Result<Vec<PathBuf>> {
    if !chapter.dir.is_dir() {
        warn!("chapter directory not found: {}", chapter.dir.display());
        return Ok(Vec::new());
    }
    let mut paths = markdown_in(&chapter.dir)?;
    let problems = chapter.problems_dir();
    if problems.is_dir() {
        paths.extend(markdown_in(&problems)?);
    }
    paths.sort();
    Ok(paths)
}

fn markdown_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_md = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("md"))
            .unwrap_or(false);
        if is_md && path.is_file() {
            out.push(path);
        }
    }
    Ok(out)
}

pub fn load_documents(paths: &[PathBuf]) -> (Vec<Document>, Vec<UnreadableDocument>) {
    let mut documents = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for path in paths {
        match fs::read_to_string(path) {
            Ok(text) => documents.push(Document {
                path: path.clone(),
                text,
            }),
            Err(err) => {
                warn!("error reading {}: {err}", path.display());
                unreadable.push(UnreadableDocument {
                    path: path.clone(),
                    error: err.to_string(),
                });
            }
        }
    }
    (documents, unreadable)
}

/// Scans already-loaded documents, visiting them in the order given.
pub fn scan_documents(
    documents: Vec<Document>,
    images_dir: Option<&Path>,
    options: ScanOptions,
) -> ChapterScan {
    let mut scan = ChapterScan::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    for document in &documents {
        for reference in scan_document(document, images_dir, options) {
            match &reference.resolution {
                Resolution::Resolved(path) => {
                    if seen.insert(path.clone()) {
                        debug!(
                            "[{:02}] {} ({}:{})",
                            scan.ordered.len() + 1,
                            reference.filename,
                            reference.document.display(),
                            reference.line
                        );
                        scan.ordered.push(reference.clone());
                    }
                }
                Resolution::Unresolved => scan.unresolved.push(reference.clone()),
                Resolution::External(_) => {}
            }
            scan.references.push(reference);
        }
    }
    scan.documents = documents;
    scan
}

/// Read phase for one chapter: every document is loaded before anything is resolved.
pub fn scan_chapter(chapter: &Chapter, options: ScanOptions) -> Result<ChapterScan> {
    let paths = chapter_documents(chapter)?;
    let (documents, unreadable) = load_documents(&paths);
    let images_dir = chapter.images_dir();
    let mut scan = scan_documents(documents, Some(&images_dir), options);
    scan.unreadable = unreadable;
    Ok(scan)
}
