//! Filename codec for the `<chapter>_<position>_<descriptive>.<ext>` convention.
//!
//! Every figure of a chapter lives in `Images/` under a name such as
//! `03_07_lens_diagram.png`. Legacy names (`Fiber_03_mode_waveguide_210308.png`,
//! `NewtonRings.jpg`) are mapped onto that grammar by [`descriptive_name_of`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const FALLBACK_NAME: &str = "figure";

static CANONICAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2})_(\d{2})_([a-z0-9]+(?:_[a-z0-9]+)*)\.([A-Za-z0-9]+)$").unwrap()
});
static NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})_(\d+)_(.+)\.(\w+)$").unwrap());
static LEADING_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}_\d{1,2}_").unwrap());
static SNAKE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}_\d{2}_").unwrap());
static POSITION_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+_\d+_").unwrap());
static VESTIGIAL_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+_\d+[a-z]?_").unwrap());
static VESTIGIAL_DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+_\d+[a-z]?_").unwrap());
static DATE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_\d{6}$").unwrap());
static LOWER_UPPER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());
static ACRONYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static REPEATED_SEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Split-acronym repairs applied after snake-casing.
const ACRONYM_FIXES: &[(&str, &str)] = &[("si_o_2", "sio2"), ("si_o2", "sio2")];

/// A filename that fully satisfies the canonical grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalName {
    pub chapter: u32,
    pub position: u32,
    pub descriptive: String,
    pub extension: String,
}

/// A chapter-prefixed filename whose descriptive part may still be legacy text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedName {
    pub position: u32,
    pub name: String,
    pub extension: String,
}

/// How a resolved figure's new descriptive segment is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamePolicy {
    /// Cleaned, snake-cased descriptive name.
    #[default]
    Descriptive,
    /// Original stem with only a numeric position prefix removed.
    KeepStem,
}

impl NamePolicy {
    /// Returns `(descriptive, new_filename)` for a figure currently named `filename`.
    pub fn rename(self, chapter: u32, position: u32, filename: &str) -> (String, String) {
        let ext = extension_of(filename);
        match self {
            NamePolicy::Descriptive => {
                let descriptive = descriptive_name_of(filename);
                let new_name = canonical_filename(chapter, position, &descriptive, ext);
                (descriptive, new_name)
            }
            NamePolicy::KeepStem => {
                let stem = strip_position_prefix(stem_of(filename));
                let stem = if stem.is_empty() {
                    FALLBACK_NAME.to_string()
                } else {
                    stem
                };
                let new_name = if ext.is_empty() {
                    format!("{chapter:02}_{position:02}_{stem}")
                } else {
                    format!("{chapter:02}_{position:02}_{stem}.{ext}")
                };
                (stem, new_name)
            }
        }
    }
}

pub fn parse_canonical(filename: &str) -> Option<CanonicalName> {
    let caps = CANONICAL_RE.captures(filename)?;
    Some(CanonicalName {
        chapter: caps[1].parse().ok()?,
        position: caps[2].parse().ok()?,
        descriptive: caps[3].to_string(),
        extension: caps[4].to_string(),
    })
}

pub fn is_canonical(filename: &str, chapter: u32) -> bool {
    parse_canonical(filename)
        .map(|name| name.chapter == chapter)
        .unwrap_or(false)
}

/// Looser match used when listing figures that already carry a chapter prefix.
pub fn parse_numbered(filename: &str, chapter: u32) -> Option<NumberedName> {
    let caps = NUMBERED_RE.captures(filename)?;
    let file_chapter: u32 = caps[1].parse().ok()?;
    if file_chapter != chapter {
        return None;
    }
    Some(NumberedName {
        position: caps[2].parse().ok()?,
        name: caps[3].to_string(),
        extension: caps[4].to_string(),
    })
}

pub fn canonical_filename(chapter: u32, position: u32, descriptive: &str, ext: &str) -> String {
    format!("{chapter:02}_{position:02}_{descriptive}.{ext}")
}

/// Derives the descriptive segment for any filename.
///
/// Canonical names keep their segment untouched so repeated runs never
/// compound a rename. Everything else goes through legacy cleanup: position
/// prefix, vestigial `Word_03_` / `2_05a_` prefixes and `_YYMMDD` suffixes are
/// stripped before snake-casing. Results shorter than two characters fall back
/// to `"figure"`.
pub fn descriptive_name_of(filename: &str) -> String {
    let filename = basename(filename);
    if let Some(canonical) = parse_canonical(filename) {
        return canonical.descriptive;
    }
    let stem = stem_of(filename);
    let name = LEADING_PREFIX_RE.replace(stem, "");
    let name = VESTIGIAL_WORD_RE.replace(&name, "");
    let name = VESTIGIAL_DIGITS_RE.replace(&name, "");
    let name = DATE_SUFFIX_RE.replace(&name, "");
    clean_descriptive(&name)
}

/// Snake-cases free text into a descriptive segment, falling back to `"figure"`.
pub fn clean_descriptive(text: &str) -> String {
    let snake = to_snake_case(text);
    if snake.chars().count() < 2 {
        FALLBACK_NAME.to_string()
    } else {
        snake
    }
}

pub fn to_snake_case(name: &str) -> String {
    let name = SNAKE_PREFIX_RE.replace(name, "");
    let name = LOWER_UPPER_RE.replace_all(&name, "${1}_${2}");
    let name = ACRONYM_RE.replace_all(&name, "${1}_${2}");
    let lower = name.to_lowercase();
    let separated = NON_WORD_RE.replace_all(&lower, "_");
    let collapsed = REPEATED_SEP_RE.replace_all(&separated, "_");
    let mut result = collapsed.trim_matches('_').to_string();
    for (split, joined) in ACRONYM_FIXES {
        result = result.replace(split, joined);
    }
    result
}

pub fn strip_position_prefix(stem: &str) -> String {
    POSITION_PREFIX_RE.replace(stem, "").into_owned()
}

pub fn stem_of(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    }
}

pub fn extension_of(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[idx + 1..],
        _ => "",
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_canonical_names() {
        assert!(is_canonical("03_07_lens_diagram.png", 3));
        assert!(is_canonical("10_04_mode_waveguide.png", 10));
        assert!(!is_canonical("03_07_lens_diagram.png", 4));
        assert!(!is_canonical("3_07_lens.png", 3));
        assert!(!is_canonical("03_07_Lens.png", 3));
        assert!(!is_canonical("03_07_lens__diagram.png", 3));
        assert!(!is_canonical("03_07__lens.png", 3));
        assert!(!is_canonical("03_07_lens_.png", 3));
        assert!(!is_canonical("03_07_lens", 3));
    }

    #[test]
    fn strips_vestigial_prefix_and_date() {
        assert_eq!(
            descriptive_name_of("Fiber_03_mode_waveguide_210308.png"),
            "mode_waveguide"
        );
        assert_eq!(descriptive_name_of("2_05a_prism.jpg"), "prism");
        assert_eq!(descriptive_name_of("1_4_Newton rings.jpg"), "newton_rings");
    }

    #[test]
    fn converts_case_styles() {
        assert_eq!(descriptive_name_of("NewtonRings.png"), "newton_rings");
        assert_eq!(descriptive_name_of("HTMLParser.png"), "html_parser");
        assert_eq!(descriptive_name_of("lens-diagram.v2.png"), "lens_diagram_v2");
        assert_eq!(descriptive_name_of("__odd--name__.png"), "odd_name");
    }

    #[test]
    fn rejoins_split_acronyms() {
        assert_eq!(descriptive_name_of("SiO2Layer.png"), "sio2_layer");
        assert_eq!(to_snake_case("si o 2 film"), "sio2_film");
    }

    #[test]
    fn short_results_fall_back_to_figure() {
        assert_eq!(descriptive_name_of("a.png"), "figure");
        assert_eq!(descriptive_name_of("___.png"), "figure");
        assert_eq!(descriptive_name_of(""), "figure");
        assert_eq!(clean_descriptive("Beam Splitter"), "beam_splitter");
        assert_eq!(clean_descriptive("?"), "figure");
    }

    #[test]
    fn canonical_names_keep_their_segment() {
        assert_eq!(descriptive_name_of("03_01_a.png"), "a");
        assert_eq!(descriptive_name_of("05_02_fig_3_lens.png"), "fig_3_lens");
        assert_eq!(descriptive_name_of("Images/03_02_b.png"), "b");
    }

    #[test]
    fn formats_canonical_filenames() {
        assert_eq!(
            canonical_filename(10, 4, "mode_waveguide", "png"),
            "10_04_mode_waveguide.png"
        );
        assert_eq!(canonical_filename(3, 12, "x1", "svg"), "03_12_x1.svg");
    }

    #[test]
    fn parses_numbered_names_for_a_chapter() {
        let parsed = parse_numbered("03_05_Lens Diagram.png", 3).unwrap();
        assert_eq!(parsed.position, 5);
        assert_eq!(parsed.name, "Lens Diagram");
        assert_eq!(parsed.extension, "png");
        assert!(parse_numbered("04_05_lens.png", 3).is_none());
    }

    #[test]
    fn keep_stem_policy_only_drops_position_prefix() {
        let (stem, name) = NamePolicy::KeepStem.rename(1, 4, "1_01_Newton_rings.jpg");
        assert_eq!(stem, "Newton_rings");
        assert_eq!(name, "01_04_Newton_rings.jpg");
        let (_, name) = NamePolicy::Descriptive.rename(1, 4, "1_01_Newton_rings.jpg");
        assert_eq!(name, "01_04_newton_rings.jpg");
    }
}
