//! Whole-token filename substitution inside document text.
//!
//! A filename only matches when it is not glued to other filename characters:
//! `b.png` is left alone inside `03_01_b.png` or `b.png.bak`, but replaced in
//! `Images/b.png`, `(b.png)` or at the end of a sentence. Names are tried
//! longest first so a name never shadows a longer one it prefixes.
//!
//! [`Rewriter::rewrite_skipping`] leaves names alone when the path written in
//! front of them is one of the given directories (another chapter's
//! `Images/`, say).

use std::borrow::Cow;
use std::collections::BTreeSet;

use itertools::Itertools;
use regex::Regex;
use tracing::warn;

use crate::resolve::RenameMapping;

#[derive(Debug, Clone)]
pub struct Rewritten<'a> {
    pub text: Cow<'a, str>,
    pub replacements: usize,
    /// Old names that were found and replaced.
    pub matched: BTreeSet<String>,
}

impl Rewritten<'_> {
    pub fn changed(&self) -> bool {
        self.replacements > 0
    }
}

#[derive(Debug, Clone)]
pub struct Rewriter {
    pairs: Vec<(String, String)>,
    matcher: Option<Regex>,
}

impl Rewriter {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .filter(|(old, new)| !old.is_empty() && old != new)
            .collect();
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        pairs.dedup_by(|a, b| a.0 == b.0);

        let matcher = if pairs.is_empty() {
            None
        } else {
            let pattern = pairs.iter().map(|(old, _)| regex::escape(old)).join("|");
            match Regex::new(&pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    warn!("cannot build filename matcher: {err}");
                    None
                }
            }
        };
        Self { pairs, matcher }
    }

    /// Rewriter for every entry of `mapping` that changes name.
    pub fn from_mapping(mapping: &RenameMapping) -> Self {
        Self::new(
            mapping
                .pending()
                .map(|entry| (entry.old_filename.clone(), entry.new_filename.clone())),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn rewrite<'a>(&self, text: &'a str) -> Rewritten<'a> {
        self.rewrite_skipping(text, &BTreeSet::new())
    }

    /// Like [`Rewriter::rewrite`], except where the name follows one of `skipped_dirs`.
    pub fn rewrite_skipping<'a>(&self, text: &'a str, skipped_dirs: &BTreeSet<String>) -> Rewritten<'a> {
        let unchanged = Rewritten {
            text: Cow::Borrowed(text),
            replacements: 0,
            matched: BTreeSet::new(),
        };
        let Some(matcher) = &self.matcher else {
            return unchanged;
        };

        let mut out: Option<String> = None;
        let mut matched = BTreeSet::new();
        let mut replacements = 0;
        let mut copied = 0;
        let mut cursor = 0;

        while let Some(found) = matcher.find_at(text, cursor) {
            let start = found.start();
            let skipped = !skipped_dirs.is_empty() && skipped_dirs.contains(path_prefix(text, start));
            match self.replacement_at(text, start).filter(|_| !skipped) {
                Some((old, new)) => {
                    let buf = out.get_or_insert_with(|| String::with_capacity(text.len()));
                    buf.push_str(&text[copied..start]);
                    buf.push_str(new);
                    copied = start + old.len();
                    cursor = copied;
                    replacements += 1;
                    matched.insert(old.to_string());
                }
                None => {
                    cursor = start + text[start..].chars().next().map_or(1, char::len_utf8);
                }
            }
            if cursor >= text.len() {
                break;
            }
        }

        match out {
            Some(mut buf) => {
                buf.push_str(&text[copied..]);
                Rewritten {
                    text: Cow::Owned(buf),
                    replacements,
                    matched,
                }
            }
            None => unchanged,
        }
    }

    fn replacement_at(&self, text: &str, start: usize) -> Option<(&str, &str)> {
        if !left_boundary(text, start) {
            return None;
        }
        let rest = &text[start..];
        self.pairs
            .iter()
            .find(|(old, _)| rest.starts_with(old.as_str()) && right_boundary(&rest[old.len()..]))
            .map(|(old, new)| (old.as_str(), new.as_str()))
    }
}

/// Rewrites `text` with the renames of `mapping`; unchanged text comes back as is.
pub fn rewrite(text: &str, mapping: &RenameMapping) -> String {
    Rewriter::from_mapping(mapping).rewrite(text).text.into_owned()
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn left_boundary(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !(is_word(c) || c == '-' || c == '.'))
}

/// The path text directly in front of `start`, up to the enclosing delimiter.
fn path_prefix(text: &str, start: usize) -> &str {
    let head = &text[..start];
    let from = head
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace() || "()[]<>\"'=`".contains(*c))
        .map_or(0, |(idx, c)| idx + c.len_utf8());
    &head[from..]
}

fn right_boundary(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        // sentence-ending period
        Some('.') => !chars.next().is_some_and(is_word),
        Some(c) => !(is_word(c) || c == '-'),
    }
}
