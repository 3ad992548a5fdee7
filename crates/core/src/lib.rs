mod config;
mod error;
mod execute;
mod naming;
mod ops;
mod plan;
mod report;
mod resolve;
mod rewrite;
mod scan;

pub use config::{Book, BookConfig, Chapter, ChapterConfig};
pub use error::{FigError, Result};
pub use execute::{execute, execute_with, rename_no_clobber, AppliedRename, ExecutionOutcome, RenameFailure};
pub use naming::{
    canonical_filename, clean_descriptive, descriptive_name_of, extension_of, is_canonical,
    parse_canonical, parse_numbered, stem_of, strip_position_prefix, to_snake_case,
    CanonicalName, NamePolicy, NumberedName,
};
pub use ops::{
    find_unreferenced, insert_figure, refactor_chapter, standardize_chapter,
    sync_reference_case, write_unreferenced_list, InsertRequest, RunOptions,
};
pub use plan::{plan, BlockedRename, RenamePlan, RenameStep, StepKind};
pub use report::{
    DocumentFailure, InsertedFigure, OperationKind, OperationReport, Outcome, PlannedRename,
    UnreferencedReport,
};
pub use resolve::{
    existing_figures, list_chapter_images, resolve_insertion, resolve_order, resolve_order_with,
    unreferenced, ExistingFigure, Insertion, MappingEntry, RenameMapping,
};
pub use rewrite::{rewrite, Rewriter, Rewritten};
pub use scan::{
    chapter_documents, load_documents, reference_filename, scan_chapter, scan_document,
    scan_documents, ChapterScan, Document, Reference, ReferenceSyntax, Resolution, ScanOptions,
    UnreadableDocument,
};
