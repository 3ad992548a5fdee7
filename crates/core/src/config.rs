use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{FigError, Result};

static CHAPTER_DIR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^chap(\d+)").unwrap());
static CHAPTER_TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Chap\d+(.+)$").unwrap());

const CODE_LEN: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterConfig {
    pub dir: String,
    pub file: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// On-disk configuration, JSON (`config.json`) or TOML (`*.toml`).
///
/// Chapter keys are chapter numbers; keys starting with `_` are metadata and
/// are skipped, except `_auto_discover` / `_content_directory` which are
/// honoured as aliases of the top-level fields.
#[derive(Debug, Clone, Deserialize)]
pub struct BookConfig {
    #[serde(default = "default_content_root")]
    pub content_root: String,
    #[serde(default)]
    pub chapters: BTreeMap<String, Value>,
    #[serde(default)]
    pub chapter_codes: BTreeMap<String, Value>,
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    #[serde(default = "default_sibling_extensions")]
    pub sibling_extensions: Vec<String>,
    #[serde(default)]
    pub auto_discover: bool,
}

fn default_content_root() -> String {
    "content".to_string()
}

fn default_image_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "svg", "webp"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_sibling_extensions() -> Vec<String> {
    vec!["ai".to_string()]
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            chapters: BTreeMap::new(),
            chapter_codes: BTreeMap::new(),
            image_extensions: default_image_extensions(),
            sibling_extensions: default_sibling_extensions(),
            auto_discover: false,
        }
    }
}

impl BookConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            Self::from_toml_str(&raw)
        } else {
            Self::from_json_str(&raw)
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn wants_discovery(&self) -> bool {
        self.auto_discover
            || self
                .chapters
                .get("_auto_discover")
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    fn content_dir(&self) -> &str {
        self.chapters
            .get("_content_directory")
            .and_then(Value::as_str)
            .unwrap_or(&self.content_root)
    }

    fn explicit_chapters(&self) -> Result<BTreeMap<u32, ChapterConfig>> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.chapters {
            if key.starts_with('_') {
                continue;
            }
            let number: u32 = key
                .trim()
                .parse()
                .map_err(|_| FigError::Config(format!("chapter key '{key}' is not a number")))?;
            if number == 0 {
                return Err(FigError::Config("chapter numbers start at 1".to_string()));
            }
            let chapter: ChapterConfig = serde_json::from_value(value.clone())
                .map_err(|err| FigError::Config(format!("chapter {number}: {err}")))?;
            out.insert(number, chapter);
        }
        Ok(out)
    }

    fn explicit_code_for(&self, dir: &Path) -> Option<String> {
        let dir_name = dir.file_name()?.to_str()?;
        self.chapter_codes
            .get(dir_name)
            .and_then(Value::as_str)
            .map(|code| code.to_string())
    }
}

/// One chapter of the book, resolved against the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub number: u32,
    pub dir: PathBuf,
    pub primary_document: String,
    pub code: String,
}

impl Chapter {
    pub fn images_dir(&self) -> PathBuf {
        self.dir.join("Images")
    }

    pub fn problems_dir(&self) -> PathBuf {
        self.dir.join("Problems")
    }

    pub fn primary_path(&self) -> PathBuf {
        self.dir.join(&self.primary_document)
    }
}

/// Chapter registry plus the extension tables, built once per process.
#[derive(Debug, Clone)]
pub struct Book {
    pub root: PathBuf,
    pub content_root: PathBuf,
    pub chapters: BTreeMap<u32, Chapter>,
    pub image_extensions: Vec<String>,
    pub sibling_extensions: Vec<String>,
}

impl Book {
    pub fn from_config(config: &BookConfig, root: &Path) -> Result<Self> {
        if config.image_extensions.is_empty() {
            return Err(FigError::Config(
                "image_extensions must list at least one extension".to_string(),
            ));
        }
        let content_root = root.join(config.content_dir());
        let mut chapters = BTreeMap::new();
        if config.wants_discovery() {
            for mut chapter in discover_chapters(&content_root)? {
                if let Some(code) = config.explicit_code_for(&chapter.dir) {
                    chapter.code = code;
                }
                chapters.insert(chapter.number, chapter);
            }
        }
        for (number, entry) in config.explicit_chapters()? {
            let dir = root.join(&entry.dir);
            let code = entry
                .code
                .clone()
                .or_else(|| config.explicit_code_for(&dir))
                .unwrap_or_else(|| derive_code(&dir, number));
            chapters.insert(
                number,
                Chapter {
                    number,
                    dir,
                    primary_document: entry.file.clone(),
                    code,
                },
            );
        }
        debug!(chapters = chapters.len(), "chapter registry ready");
        Ok(Self {
            root: root.to_path_buf(),
            content_root,
            chapters,
            image_extensions: lowercase_all(&config.image_extensions),
            sibling_extensions: lowercase_all(&config.sibling_extensions),
        })
    }

    pub fn chapter(&self, number: u32) -> Result<&Chapter> {
        self.chapters
            .get(&number)
            .ok_or(FigError::UnknownChapter(number))
    }

    pub fn is_image(&self, path: &Path) -> bool {
        has_extension(path, &self.image_extensions)
    }
}

pub(crate) fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lower = ext.to_lowercase();
            extensions.iter().any(|candidate| *candidate == lower)
        })
        .unwrap_or(false)
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim_start_matches('.').to_lowercase())
        .collect()
}

fn derive_code(dir: &Path, number: u32) -> String {
    dir.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| CHAPTER_TITLE_RE.captures(name))
        .map(|caps| caps[1].chars().take(CODE_LEN).collect::<String>().to_lowercase())
        .unwrap_or_else(|| format!("ch{number:02}"))
}

/// Finds `Chap<NN>...` directories, picking the largest markdown file as the
/// chapter's primary document.
fn discover_chapters(content_root: &Path) -> Result<Vec<Chapter>> {
    if !content_root.is_dir() {
        warn!("content directory not found: {}", content_root.display());
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(content_root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut chapters = Vec::new();
    for dir in dirs {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(number) = CHAPTER_DIR_RE
            .captures(name)
            .and_then(|caps| caps[1].parse::<u32>().ok())
        else {
            continue;
        };
        let mut largest: Option<(u64, String)> = None;
        for entry in fs::read_dir(&dir)?.filter_map(|e| e.ok()) {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !file_name.ends_with(".md") || file_name.starts_with('.') {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if largest.as_ref().map_or(true, |(best, _)| size > *best) {
                largest = Some((size, file_name));
            }
        }
        let Some((_, primary_document)) = largest else {
            warn!("no markdown files found in {}", dir.display());
            continue;
        };
        let code = derive_code(&dir, number);
        chapters.push(Chapter {
            number,
            dir,
            primary_document,
            code,
        });
    }
    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn json_config_skips_metadata_keys() {
        let raw = r#"{
            "chapters": {
                "_comment": "chapter table",
                "2": {"dir": "content/Chap02GeometricalOptics", "file": "GeometricalOptics.md"},
                "7": {"dir": "content/Chap07Diffraction", "file": "DiffractiveOptics.md", "code": "diff"}
            },
            "chapter_codes": {"Chap02GeometricalOptics": "geo"}
        }"#;
        let config = BookConfig::from_json_str(raw).unwrap();
        let book = Book::from_config(&config, Path::new("/book")).unwrap();
        assert_eq!(book.chapters.len(), 2);
        let geo = book.chapter(2).unwrap();
        assert_eq!(geo.code, "geo");
        assert_eq!(geo.dir, PathBuf::from("/book/content/Chap02GeometricalOptics"));
        assert_eq!(book.chapter(7).unwrap().code, "diff");
        assert_eq!(book.image_extensions[0], "png");
        assert_eq!(book.sibling_extensions, vec!["ai".to_string()]);
        assert!(matches!(book.chapter(3), Err(FigError::UnknownChapter(3))));
    }

    #[test]
    fn toml_config_is_accepted() {
        let raw = r#"
            image_extensions = ["PNG", ".svg"]

            [chapters.10]
            dir = "content/Chap10FiberOptics"
            file = "FiberOptics.md"
        "#;
        let config = BookConfig::from_toml_str(raw).unwrap();
        let book = Book::from_config(&config, Path::new(".")).unwrap();
        assert_eq!(book.chapter(10).unwrap().code, "fiber");
        assert_eq!(book.image_extensions, vec!["png".to_string(), "svg".to_string()]);
        assert!(book.is_image(Path::new("x/10_01_core.PNG")));
    }

    #[test]
    fn rejects_bad_chapter_keys() {
        let raw = r#"{"chapters": {"one": {"dir": "a", "file": "b.md"}}}"#;
        let config = BookConfig::from_json_str(raw).unwrap();
        assert!(matches!(
            Book::from_config(&config, Path::new(".")),
            Err(FigError::Config(_))
        ));
    }

    #[test]
    fn discovers_chapters_and_keeps_explicit_overrides() {
        let dir = tempdir().unwrap();
        let content = dir.path().join("content");
        let basics = content.join("Chap01Basics");
        let wave = content.join("Chap05Wave");
        fs::create_dir_all(&basics).unwrap();
        fs::create_dir_all(&wave).unwrap();
        fs::create_dir_all(content.join("Appendix")).unwrap();
        fs::write(basics.join("Basics.md"), "# Basics\n".repeat(20)).unwrap();
        fs::write(basics.join("Notes.md"), "# n\n").unwrap();
        fs::write(wave.join("Wave.md"), "# Wave\n").unwrap();

        let raw = r#"{
            "auto_discover": true,
            "chapters": {"5": {"dir": "content/Chap05Wave", "file": "Override.md", "code": "wv"}}
        }"#;
        let config = BookConfig::from_json_str(raw).unwrap();
        let book = Book::from_config(&config, dir.path()).unwrap();
        assert_eq!(book.chapters.len(), 2);
        let basics = book.chapter(1).unwrap();
        assert_eq!(basics.primary_document, "Basics.md");
        assert_eq!(basics.code, "basic");
        assert_eq!(book.chapter(5).unwrap().primary_document, "Override.md");
        assert_eq!(book.chapter(5).unwrap().code, "wv");
    }
}
