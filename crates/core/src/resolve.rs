use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::config::has_extension;
use crate::error::{FigError, Result};
use crate::naming::{parse_numbered, NamePolicy};
use crate::scan::ChapterScan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub old_filename: String,
    pub new_filename: String,
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    /// Position the figure will occupy once renamed.
    pub position: u32,
    /// Position encoded in the current filename, when it carries one.
    pub old_position: Option<u32>,
    pub descriptive_name: String,
    pub needs_rename: bool,
}

/// Ordered old-name → new-name table for one chapter.
///
/// Old names are the keys, so they are distinct by construction; `insert`
/// refuses a second entry that targets an already-claimed new name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameMapping {
    entries: IndexMap<String, MappingEntry>,
}

impl RenameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: MappingEntry) -> Result<()> {
        if self.entries.contains_key(&entry.old_filename) {
            return Err(FigError::Other(format!(
                "duplicate mapping for {}",
                entry.old_filename
            )));
        }
        if self
            .entries
            .values()
            .any(|existing| existing.new_path == entry.new_path)
        {
            return Err(FigError::AliasedTarget(entry.new_path));
        }
        self.entries.insert(entry.old_filename.clone(), entry);
        Ok(())
    }

    pub fn get(&self, old_filename: &str) -> Option<&MappingEntry> {
        self.entries.get(old_filename)
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.entries.values().any(|entry| entry.old_path == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.values()
    }

    pub fn pending(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.values().filter(|entry| entry.needs_rename)
    }

    pub fn renames_needed(&self) -> usize {
        self.pending().count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn resolve_order(chapter: u32, scan: &ChapterScan) -> Result<RenameMapping> {
    resolve_order_with(chapter, scan, NamePolicy::Descriptive)
}

/// Assigns positions 1, 2, 3... to the chapter's resolved figures in first-appearance order.
pub fn resolve_order_with(
    chapter: u32,
    scan: &ChapterScan,
    policy: NamePolicy,
) -> Result<RenameMapping> {
    let mut mapping = RenameMapping::new();
    let mut seen = HashSet::new();
    for reference in &scan.ordered {
        let Some(old_path) = reference.resolution.resolved_path() else {
            continue;
        };
        if !seen.insert(old_path.to_path_buf()) {
            continue;
        }
        let Some(old_filename) = old_path.file_name().and_then(|n| n.to_str()) else {
            warn!("skipping non utf-8 filename {}", old_path.display());
            continue;
        };
        let position = mapping.len() as u32 + 1;
        let (descriptive_name, new_filename) = policy.rename(chapter, position, old_filename);
        let new_path = old_path.with_file_name(&new_filename);
        mapping.insert(MappingEntry {
            old_filename: old_filename.to_string(),
            needs_rename: old_filename != new_filename,
            new_filename,
            old_path: old_path.to_path_buf(),
            new_path,
            position,
            old_position: parse_numbered(old_filename, chapter).map(|n| n.position),
            descriptive_name,
        })?;
    }
    Ok(mapping)
}

/// A figure already carrying this chapter's numeric prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingFigure {
    pub path: PathBuf,
    pub filename: String,
    pub position: u32,
    pub name: String,
    pub extension: String,
}

pub fn existing_figures(
    images_dir: &Path,
    chapter: u32,
    extensions: &[String],
) -> Result<Vec<ExistingFigure>> {
    let mut figures = Vec::new();
    for path in list_chapter_images(images_dir, extensions)? {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(numbered) = parse_numbered(filename, chapter) {
            figures.push(ExistingFigure {
                filename: filename.to_string(),
                path: path.clone(),
                position: numbered.position,
                name: numbered.name,
                extension: numbered.extension,
            });
        }
    }
    figures.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    Ok(figures)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insertion {
    pub requested: u32,
    pub position: u32,
    /// Shift-by-one renames, highest position first.
    pub shifts: RenameMapping,
}

impl Insertion {
    pub fn adjusted(&self) -> bool {
        self.requested != self.position
    }
}

pub fn resolve_insertion(
    existing: &[ExistingFigure],
    insert_position: u32,
    chapter: u32,
) -> Result<Insertion> {
    if insert_position < 1 {
        return Err(FigError::InvalidPosition(insert_position));
    }
    let last = existing.len() as u32 + 1;
    let position = insert_position.min(last);
    if position != insert_position {
        warn!(
            "position {insert_position} is beyond the end of chapter {chapter}; adjusting to {position}"
        );
    }

    let mut shifted: Vec<&ExistingFigure> = existing
        .iter()
        .filter(|figure| figure.position >= position)
        .collect();
    shifted.sort_by(|a, b| {
        b.position
            .cmp(&a.position)
            .then_with(|| b.filename.cmp(&a.filename))
    });

    let mut shifts = RenameMapping::new();
    for figure in shifted {
        let new_position = figure.position + 1;
        let new_filename = format!(
            "{chapter:02}_{new_position:02}_{}.{}",
            figure.name, figure.extension
        );
        shifts.insert(MappingEntry {
            old_filename: figure.filename.clone(),
            new_path: figure.path.with_file_name(&new_filename),
            needs_rename: figure.filename != new_filename,
            new_filename,
            old_path: figure.path.clone(),
            position: new_position,
            old_position: Some(figure.position),
            descriptive_name: figure.name.clone(),
        })?;
    }
    Ok(Insertion {
        requested: insert_position,
        position,
        shifts,
    })
}

/// Image files of a chapter, sorted; a missing directory yields an empty list.
pub fn list_chapter_images(images_dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !images_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut images = Vec::new();
    for entry in fs::read_dir(images_dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// On-disk images the mapping never mentions. They are reported, never touched.
pub fn unreferenced(images: &[PathBuf], mapping: &RenameMapping) -> Vec<PathBuf> {
    images
        .iter()
        .filter(|path| !mapping.contains_path(path))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{Reference, ReferenceSyntax, Resolution};

    fn resolved(dir: &Path, filename: &str) -> Reference {
        Reference {
            document: dir.join("chapter.md"),
            line: 1,
            column: 1,
            syntax: ReferenceSyntax::Directive,
            raw_path: format!("Images/{filename}"),
            filename: filename.to_string(),
            line_text: String::new(),
            resolution: Resolution::Resolved(dir.join("Images").join(filename)),
        }
    }

    fn figure(position: u32, name: &str) -> ExistingFigure {
        let filename = format!("03_{position:02}_{name}.png");
        ExistingFigure {
            path: PathBuf::from("/c/Images").join(&filename),
            filename,
            position,
            name: name.to_string(),
            extension: "png".to_string(),
        }
    }

    #[test]
    fn order_follows_first_appearance() {
        let dir = PathBuf::from("/book/Chap10");
        let scan = ChapterScan {
            ordered: vec![
                resolved(&dir, "10_01_core.png"),
                resolved(&dir, "cladding.png"),
                resolved(&dir, "Fiber_03_mode_waveguide_210308.png"),
            ],
            ..Default::default()
        };
        let mapping = resolve_order(10, &scan).unwrap();
        let entries: Vec<&MappingEntry> = mapping.iter().collect();
        assert_eq!(entries.len(), 3);
        assert!(!entries[0].needs_rename);
        assert_eq!(entries[0].old_position, Some(1));
        assert_eq!(entries[1].new_filename, "10_02_cladding.png");
        assert_eq!(entries[2].new_filename, "10_03_mode_waveguide.png");
        assert_eq!(
            entries[2].new_path,
            dir.join("Images").join("10_03_mode_waveguide.png")
        );
        assert_eq!(mapping.renames_needed(), 2);
    }

    #[test]
    fn insertion_shifts_descending() {
        let existing = vec![figure(1, "a"), figure(2, "b"), figure(3, "c")];
        let insertion = resolve_insertion(&existing, 2, 3).unwrap();
        assert_eq!(insertion.position, 2);
        assert!(!insertion.adjusted());
        let shifts: Vec<(&str, &str)> = insertion
            .shifts
            .iter()
            .map(|e| (e.old_filename.as_str(), e.new_filename.as_str()))
            .collect();
        assert_eq!(
            shifts,
            vec![("03_03_c.png", "03_04_c.png"), ("03_02_b.png", "03_03_b.png")]
        );
    }

    #[test]
    fn insertion_clamps_and_rejects_zero() {
        let existing = vec![figure(1, "a"), figure(2, "b")];
        let insertion = resolve_insertion(&existing, 999, 3).unwrap();
        assert_eq!(insertion.position, 3);
        assert!(insertion.adjusted());
        assert!(insertion.shifts.is_empty());
        assert!(matches!(
            resolve_insertion(&existing, 0, 3),
            Err(FigError::InvalidPosition(0))
        ));
    }

    #[test]
    fn mapping_refuses_aliased_targets() {
        let mut mapping = RenameMapping::new();
        let entry = MappingEntry {
            old_filename: "a.png".into(),
            new_filename: "03_01_x.png".into(),
            old_path: "/i/a.png".into(),
            new_path: "/i/03_01_x.png".into(),
            position: 1,
            old_position: None,
            descriptive_name: "x".into(),
            needs_rename: true,
        };
        mapping.insert(entry.clone()).unwrap();
        let mut other = entry;
        other.old_filename = "b.png".into();
        other.old_path = "/i/b.png".into();
        assert!(matches!(
            mapping.insert(other),
            Err(FigError::AliasedTarget(_))
        ));
    }

    #[test]
    fn unreferenced_lists_images_outside_mapping() {
        let dir = PathBuf::from("/book/Chap03");
        let scan = ChapterScan {
            ordered: vec![resolved(&dir, "used.png")],
            ..Default::default()
        };
        let mapping = resolve_order(3, &scan).unwrap();
        let images = vec![
            dir.join("Images").join("unused.png"),
            dir.join("Images").join("used.png"),
        ];
        assert_eq!(
            unreferenced(&images, &mapping),
            vec![dir.join("Images").join("unused.png")]
        );
    }
}
