use std::path::PathBuf;

use serde::Serialize;

use crate::execute::{AppliedRename, ExecutionOutcome, RenameFailure};
use crate::plan::RenamePlan;
use crate::resolve::RenameMapping;
use crate::scan::{Reference, UnreadableDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Standardize,
    Insert,
    Refactor,
    SyncCase,
}

impl OperationKind {
    pub fn label(self) -> &'static str {
        match self {
            OperationKind::Standardize => "standardize",
            OperationKind::Insert => "insert",
            OperationKind::Refactor => "refactor",
            OperationKind::SyncCase => "sync-case",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NothingToDo,
    DryRun,
    Cancelled,
    Completed,
    CompletedWithFailures,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedRename {
    pub old_filename: String,
    pub new_filename: String,
    pub position: Option<u32>,
    pub old_position: Option<u32>,
    pub needs_rename: bool,
}

impl PlannedRename {
    pub fn from_mapping(mapping: &RenameMapping) -> Vec<Self> {
        mapping
            .iter()
            .map(|entry| Self {
                old_filename: entry.old_filename.clone(),
                new_filename: entry.new_filename.clone(),
                position: Some(entry.position),
                old_position: entry.old_position,
                needs_rename: entry.needs_rename,
            })
            .collect()
    }
}

/// A document that could not be rewritten after its figures were renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: String,
    /// Old filenames this document still refers to.
    pub stale_references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertedFigure {
    pub source: PathBuf,
    pub path: PathBuf,
    pub filename: String,
    pub siblings: Vec<PathBuf>,
    pub requested_position: u32,
    pub position: u32,
}

impl InsertedFigure {
    pub fn adjusted(&self) -> bool {
        self.requested_position != self.position
    }
}

/// Everything an operation learned and did for one chapter.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub operation: OperationKind,
    pub chapter: u32,
    pub dry_run: bool,
    pub outcome: Outcome,
    pub images_total: usize,
    pub properly_named: usize,
    pub mapping: Vec<PlannedRename>,
    pub plan: RenamePlan,
    pub applied: Vec<AppliedRename>,
    pub failed: Vec<RenameFailure>,
    pub documents_updated: Vec<PathBuf>,
    pub document_failures: Vec<DocumentFailure>,
    pub unresolved: Vec<Reference>,
    pub unreferenced: Vec<PathBuf>,
    pub unreadable: Vec<UnreadableDocument>,
    pub inserted: Option<InsertedFigure>,
}

impl OperationReport {
    pub fn new(operation: OperationKind, chapter: u32, dry_run: bool) -> Self {
        Self {
            operation,
            chapter,
            dry_run,
            outcome: Outcome::NothingToDo,
            images_total: 0,
            properly_named: 0,
            mapping: Vec::new(),
            plan: RenamePlan::default(),
            applied: Vec::new(),
            failed: Vec::new(),
            documents_updated: Vec::new(),
            document_failures: Vec::new(),
            unresolved: Vec::new(),
            unreferenced: Vec::new(),
            unreadable: Vec::new(),
            inserted: None,
        }
    }

    pub fn renames_planned(&self) -> usize {
        self.mapping.iter().filter(|entry| entry.needs_rename).count()
    }

    pub fn figures_renamed(&self) -> usize {
        self.applied.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
            || !self.document_failures.is_empty()
            || !self.plan.blocked.is_empty()
    }

    pub(crate) fn record_execution(&mut self, outcome: ExecutionOutcome) {
        self.applied = outcome.applied;
        self.failed.extend(outcome.failed);
    }

    pub(crate) fn finish(&mut self) {
        self.outcome = if self.has_failures() {
            Outcome::CompletedWithFailures
        } else {
            Outcome::Completed
        };
    }
}

/// Content-wide listing of images no document refers to.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UnreferencedReport {
    pub content_root: PathBuf,
    pub documents_scanned: usize,
    pub references_total: usize,
    pub images_total: usize,
    pub unreferenced: Vec<PathBuf>,
    pub unreadable: Vec<UnreadableDocument>,
}
