//! Applies a [`RenamePlan`] to the filesystem.
//!
//! Every move refuses to replace an existing file. Sibling assets (the `.ai`
//! source of an exported figure, for example) travel with their image; if a
//! sibling cannot follow, the image is moved back. A failed entry is recorded
//! and the remaining independent entries still run.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::plan::{RenamePlan, StepKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRename {
    pub old_filename: String,
    pub new_filename: String,
    pub from: PathBuf,
    pub to: PathBuf,
    pub siblings: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameFailure {
    pub old_filename: String,
    pub from: PathBuf,
    pub to: PathBuf,
    pub error: String,
    /// The figure is back under its original name.
    pub restored: bool,
    /// Where the figure is after the failure.
    pub left_at: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub applied: Vec<AppliedRename>,
    pub failed: Vec<RenameFailure>,
}

impl ExecutionOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A move that did not complete, and where its image ended up.
#[derive(Debug)]
struct MoveError {
    message: String,
    image_at: PathBuf,
}

pub fn execute(plan: &RenamePlan, sibling_extensions: &[String]) -> ExecutionOutcome {
    execute_with(plan, sibling_extensions, rename_no_clobber)
}

/// Same as [`execute`] with an injectable move primitive.
///
/// A figure that cannot be moved back after a failure and is left under its
/// final name is also listed in `applied`, so references follow it.
pub fn execute_with<F>(plan: &RenamePlan, sibling_extensions: &[String], mut rename: F) -> ExecutionOutcome
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let mut outcome = ExecutionOutcome::default();
    let mut origins: HashMap<&str, PathBuf> = HashMap::new();
    let mut failed: Vec<&str> = Vec::new();

    for step in &plan.steps {
        if failed.contains(&step.entry.as_str()) {
            continue;
        }
        let extensions: &[String] = if step.siblings { sibling_extensions } else { &[] };
        match move_with_siblings(&step.from, &step.to, extensions, &mut rename) {
            Ok(siblings) => {
                debug!("renamed {} -> {}", step.from.display(), step.to.display());
                if step.kind == StepKind::ToTemporary {
                    origins.insert(step.entry.as_str(), step.from.clone());
                    continue;
                }
                let from = origins
                    .remove(step.entry.as_str())
                    .unwrap_or_else(|| step.from.clone());
                outcome.applied.push(AppliedRename {
                    old_filename: step.entry.clone(),
                    new_filename: step.new_filename.clone(),
                    from,
                    to: step.to.clone(),
                    siblings,
                });
            }
            Err(err) => {
                warn!(
                    "failed to rename {} -> {}: {}",
                    step.from.display(),
                    step.to.display(),
                    err.message
                );
                let origin = origins
                    .remove(step.entry.as_str())
                    .unwrap_or_else(|| step.from.clone());
                let mut left_at = err.image_at;
                let landed = step.is_final() && left_at == step.to;
                if left_at != origin && !landed {
                    left_at = match move_with_siblings(&left_at, &origin, extensions, &mut rename) {
                        Ok(_) => origin.clone(),
                        Err(undo) => undo.image_at,
                    };
                }
                let restored = left_at == origin;
                if !restored {
                    warn!("{} left as {}", step.entry, left_at.display());
                }
                if landed {
                    outcome.applied.push(AppliedRename {
                        old_filename: step.entry.clone(),
                        new_filename: step.new_filename.clone(),
                        from: origin.clone(),
                        to: step.to.clone(),
                        siblings: Vec::new(),
                    });
                }
                outcome.failed.push(RenameFailure {
                    old_filename: step.entry.clone(),
                    from: origin,
                    to: step.to.clone(),
                    error: err.message,
                    restored,
                    left_at,
                });
                failed.push(step.entry.as_str());
            }
        }
    }
    outcome
}

/// Moves an image and any siblings, undoing partial work on failure.
fn move_with_siblings<F>(
    from: &Path,
    to: &Path,
    sibling_extensions: &[String],
    rename: &mut F,
) -> Result<Vec<PathBuf>, MoveError>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    rename(from, to).map_err(|err| MoveError {
        message: err.to_string(),
        image_at: from.to_path_buf(),
    })?;

    let own_ext = from
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());
    let mut moved: Vec<(PathBuf, PathBuf)> = Vec::new();
    for ext in sibling_extensions {
        if own_ext.as_deref() == Some(ext.as_str()) {
            continue;
        }
        let sibling_from = from.with_extension(ext);
        if !sibling_from.is_file() {
            continue;
        }
        let sibling_to = to.with_extension(ext);
        if let Err(err) = rename(&sibling_from, &sibling_to) {
            let mut message = format!("sibling {}: {err}", sibling_from.display());
            for (undo_from, undo_to) in moved.iter().rev() {
                if let Err(undo) = rename(undo_to, undo_from) {
                    message.push_str(&format!("; {} not moved back: {undo}", undo_to.display()));
                }
            }
            let image_at = match rename(to, from) {
                Ok(()) => from.to_path_buf(),
                Err(undo) => {
                    message.push_str(&format!("; image not moved back: {undo}"));
                    to.to_path_buf()
                }
            };
            return Err(MoveError { message, image_at });
        }
        moved.push((sibling_from, sibling_to));
    }
    Ok(moved.into_iter().map(|(_, to)| to).collect())
}

pub fn rename_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    fs::rename(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RenameStep;
    use tempfile::tempdir;

    fn step(dir: &Path, from: &str, to: &str, kind: StepKind, entry: &str, new: &str) -> RenameStep {
        RenameStep {
            entry: entry.to_string(),
            new_filename: new.to_string(),
            from: dir.join(from),
            to: dir.join(to),
            kind,
            siblings: true,
        }
    }

    #[test]
    fn moves_image_and_sibling() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("lens.png"), b"png").unwrap();
        fs::write(dir.path().join("lens.ai"), b"ai").unwrap();
        let plan = RenamePlan {
            steps: vec![step(
                dir.path(),
                "lens.png",
                "03_01_lens.png",
                StepKind::Direct,
                "lens.png",
                "03_01_lens.png",
            )],
            ..RenamePlan::default()
        };
        let outcome = execute(&plan, &["ai".to_string()]);
        assert!(outcome.is_clean());
        assert_eq!(outcome.applied.len(), 1);
        assert!(dir.path().join("03_01_lens.png").is_file());
        assert!(dir.path().join("03_01_lens.ai").is_file());
        assert!(!dir.path().join("lens.ai").exists());
    }

    #[test]
    fn refuses_to_clobber() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        fs::write(dir.path().join("b.png"), b"b").unwrap();
        let plan = RenamePlan {
            steps: vec![step(dir.path(), "a.png", "b.png", StepKind::Direct, "a.png", "b.png")],
            ..RenamePlan::default()
        };
        let outcome = execute(&plan, &[]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(fs::read(dir.path().join("b.png")).unwrap(), b"b");
        assert!(dir.path().join("a.png").is_file());
    }

    #[test]
    fn failed_final_step_restores_parked_figure() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x.png"), b"x").unwrap();
        fs::write(dir.path().join("other.png"), b"o").unwrap();
        let plan = RenamePlan {
            steps: vec![
                step(dir.path(), "x.png", "_tmp0_x.png", StepKind::ToTemporary, "x.png", "y.png"),
                step(dir.path(), "other.png", "03_02_other.png", StepKind::Direct, "other.png", "03_02_other.png"),
                step(dir.path(), "_tmp0_x.png", "y.png", StepKind::FromTemporary, "x.png", "y.png"),
            ],
            ..RenamePlan::default()
        };
        let target = dir.path().join("y.png");
        let outcome = execute_with(&plan, &[], |from, to| {
            if to == target {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            rename_no_clobber(from, to)
        });
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].old_filename, "other.png");
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.failed[0].restored);
        assert_eq!(outcome.failed[0].left_at, dir.path().join("x.png"));
        assert!(dir.path().join("x.png").is_file());
        assert!(!dir.path().join("_tmp0_x.png").exists());
    }

    #[test]
    fn sibling_failure_rolls_back_image() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("lens.png"), b"png").unwrap();
        fs::write(dir.path().join("lens.ai"), b"ai").unwrap();
        fs::write(dir.path().join("03_01_lens.ai"), b"stale").unwrap();
        let plan = RenamePlan {
            steps: vec![step(
                dir.path(),
                "lens.png",
                "03_01_lens.png",
                StepKind::Direct,
                "lens.png",
                "03_01_lens.png",
            )],
            ..RenamePlan::default()
        };
        let outcome = execute(&plan, &["ai".to_string()]);
        assert_eq!(outcome.failed.len(), 1);
        assert!(dir.path().join("lens.png").is_file());
        assert!(!dir.path().join("03_01_lens.png").exists());
        assert_eq!(fs::read(dir.path().join("03_01_lens.ai")).unwrap(), b"stale");
    }

    #[test]
    fn figure_stuck_under_new_name_is_reported_and_applied() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("lens.png"), b"png").unwrap();
        fs::write(dir.path().join("lens.ai"), b"ai").unwrap();
        let plan = RenamePlan {
            steps: vec![step(
                dir.path(),
                "lens.png",
                "03_01_lens.png",
                StepKind::Direct,
                "lens.png",
                "03_01_lens.png",
            )],
            ..RenamePlan::default()
        };
        let mut calls = 0;
        let outcome = execute_with(&plan, &["ai".to_string()], |from, to| {
            calls += 1;
            if calls == 1 {
                return rename_no_clobber(from, to);
            }
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        });
        let target = dir.path().join("03_01_lens.png");
        assert!(target.is_file());
        assert!(!dir.path().join("lens.png").exists());
        assert_eq!(outcome.failed.len(), 1);
        assert!(!outcome.failed[0].restored);
        assert_eq!(outcome.failed[0].left_at, target);
        assert!(outcome.failed[0].error.contains("image not moved back"));
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].new_filename, "03_01_lens.png");
        assert!(outcome.applied[0].siblings.is_empty());
    }

    #[test]
    fn step_without_siblings_leaves_them_alone() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("lens.png"), b"png").unwrap();
        fs::write(dir.path().join("lens.ai"), b"ai").unwrap();
        let mut only = step(
            dir.path(),
            "lens.png",
            "03_01_lens.png",
            StepKind::Direct,
            "lens.png",
            "03_01_lens.png",
        );
        only.siblings = false;
        let plan = RenamePlan {
            steps: vec![only],
            ..RenamePlan::default()
        };
        let outcome = execute(&plan, &["ai".to_string()]);
        assert!(outcome.is_clean());
        assert!(dir.path().join("03_01_lens.png").is_file());
        assert!(dir.path().join("lens.ai").is_file());
    }
}
