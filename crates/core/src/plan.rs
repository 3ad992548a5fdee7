//! Orders a rename mapping into steps that never overwrite a file.
//!
//! A step is only emitted once its target is no longer the current name of
//! another pending figure. When every remaining entry waits on another one
//! (a cycle such as `a → b`, `b → a`), the first of them is parked under a
//! temporary name and finished later.
//!
//! Sibling assets follow a figure by basename. When several figures share a
//! basename (`lens.png` and `lens.svg`) it is unclear which one owns
//! `lens.ai`, so none of them carries siblings and the plan lists them.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FigError, Result};
use crate::resolve::{MappingEntry, RenameMapping};

const TEMP_PREFIX: &str = "_tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Direct,
    ToTemporary,
    FromTemporary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameStep {
    /// Old filename of the mapping entry this step belongs to.
    pub entry: String,
    pub new_filename: String,
    pub from: PathBuf,
    pub to: PathBuf,
    pub kind: StepKind,
    /// Whether sibling assets move together with this figure.
    pub siblings: bool,
}

impl RenameStep {
    /// Whether this step leaves the figure under its final name.
    pub fn is_final(&self) -> bool {
        self.kind != StepKind::ToTemporary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedRename {
    pub entry: String,
    pub target: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    pub steps: Vec<RenameStep>,
    pub blocked: Vec<BlockedRename>,
    /// Figures whose basename is shared with another figure; their siblings stay put.
    pub shared_stems: Vec<String>,
}

impl RenamePlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn temporaries(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.kind == StepKind::ToTemporary)
            .count()
    }

    pub fn is_blocked(&self, entry: &str) -> bool {
        self.blocked.iter().any(|blocked| blocked.entry == entry)
    }
}

/// Builds the rename plan for `mapping`.
///
/// `occupied` is every path currently present in the target directories. An
/// entry whose target is occupied by a file that is not itself being renamed
/// away is reported as blocked, together with anything waiting on it.
pub fn plan(mapping: &RenameMapping, occupied: &BTreeSet<PathBuf>) -> Result<RenamePlan> {
    let mut pending: Vec<&MappingEntry> = mapping
        .pending()
        .filter(|entry| entry.old_path != entry.new_path)
        .collect();

    let mut targets = HashSet::new();
    for entry in &pending {
        if !targets.insert(entry.new_path.as_path()) {
            return Err(FigError::AliasedTarget(entry.new_path.clone()));
        }
    }

    let shared_stems = shared_stems(mapping);
    let carries_siblings = |entry: &MappingEntry| !shared_stems.contains(&entry.old_filename);

    let blocked = split_blocked(&mut pending, occupied);

    pending.sort_by(|a, b| {
        b.position
            .cmp(&a.position)
            .then_with(|| b.old_position.cmp(&a.old_position))
    });

    let mut reserved: HashSet<PathBuf> = occupied.iter().cloned().collect();
    reserved.extend(mapping.iter().map(|entry| entry.old_path.clone()));
    reserved.extend(mapping.iter().map(|entry| entry.new_path.clone()));

    let mut current: Vec<PathBuf> = pending.iter().map(|entry| entry.old_path.clone()).collect();
    let mut live: HashSet<PathBuf> = current.iter().cloned().collect();
    let mut remaining: Vec<usize> = (0..pending.len()).collect();
    let mut steps = Vec::with_capacity(pending.len());
    let mut counter = 0usize;

    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .position(|&idx| !live.contains(&pending[idx].new_path));
        match ready {
            Some(slot) => {
                let idx = remaining.remove(slot);
                let entry = pending[idx];
                live.remove(&current[idx]);
                let kind = if current[idx] == entry.old_path {
                    StepKind::Direct
                } else {
                    StepKind::FromTemporary
                };
                steps.push(RenameStep {
                    entry: entry.old_filename.clone(),
                    new_filename: entry.new_filename.clone(),
                    from: current[idx].clone(),
                    to: entry.new_path.clone(),
                    kind,
                    siblings: carries_siblings(entry),
                });
            }
            None => {
                let idx = remaining[0];
                let entry = pending[idx];
                let temp = temporary_path(&current[idx], &mut counter, &reserved);
                debug!(
                    "breaking rename cycle: parking {} as {}",
                    entry.old_filename,
                    temp.display()
                );
                reserved.insert(temp.clone());
                live.remove(&current[idx]);
                live.insert(temp.clone());
                steps.push(RenameStep {
                    entry: entry.old_filename.clone(),
                    new_filename: entry.new_filename.clone(),
                    from: current[idx].clone(),
                    to: temp.clone(),
                    kind: StepKind::ToTemporary,
                    siblings: carries_siblings(entry),
                });
                current[idx] = temp;
            }
        }
    }

    Ok(RenamePlan {
        steps,
        blocked,
        shared_stems,
    })
}

/// Old filenames of every figure whose path without extension matches another figure's.
fn shared_stems(mapping: &RenameMapping) -> Vec<String> {
    let mut by_stem: HashMap<PathBuf, Vec<&str>> = HashMap::new();
    for entry in mapping.iter() {
        by_stem
            .entry(entry.old_path.with_extension(""))
            .or_default()
            .push(entry.old_filename.as_str());
    }
    let mut shared: Vec<String> = by_stem
        .into_values()
        .filter(|names| names.len() > 1)
        .flatten()
        .map(str::to_string)
        .collect();
    shared.sort();
    for name in &shared {
        warn!("{name} shares its basename with another figure; sibling assets stay in place");
    }
    shared
}

/// Removes entries that can never complete, including those waiting on a blocked one.
fn split_blocked(
    pending: &mut Vec<&MappingEntry>,
    occupied: &BTreeSet<PathBuf>,
) -> Vec<BlockedRename> {
    let sources: HashSet<PathBuf> = pending.iter().map(|entry| entry.old_path.clone()).collect();
    let mut blocked = Vec::new();
    let mut stuck: HashSet<PathBuf> = HashSet::new();

    pending.retain(|entry| {
        if occupied.contains(&entry.new_path) && !sources.contains(&entry.new_path) {
            blocked.push(BlockedRename {
                entry: entry.old_filename.clone(),
                target: entry.new_path.clone(),
                reason: format!("{} already exists", display_name(&entry.new_path)),
            });
            stuck.insert(entry.old_path.clone());
            false
        } else {
            true
        }
    });

    loop {
        let before = pending.len();
        pending.retain(|entry| {
            if stuck.contains(&entry.new_path) {
                blocked.push(BlockedRename {
                    entry: entry.old_filename.clone(),
                    target: entry.new_path.clone(),
                    reason: format!(
                        "{} is held by a blocked rename",
                        display_name(&entry.new_path)
                    ),
                });
                stuck.insert(entry.old_path.clone());
                false
            } else {
                true
            }
        });
        if pending.len() == before {
            break;
        }
    }
    blocked
}

fn temporary_path(current: &Path, counter: &mut usize, reserved: &HashSet<PathBuf>) -> PathBuf {
    let filename = display_name(current);
    loop {
        let candidate = current.with_file_name(format!("{TEMP_PREFIX}{}_{filename}", *counter));
        *counter += 1;
        if !reserved.contains(&candidate) && !candidate.exists() {
            return candidate;
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
