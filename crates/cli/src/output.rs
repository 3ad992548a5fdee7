use std::fmt::Write as _;
use std::path::Path;

use mystfig_core::{OperationReport, Outcome, StepKind, UnreferencedReport};

/// Planned renames, shown before the confirmation prompt and on dry runs.
pub fn render_plan(report: &OperationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Chapter {} ({}): {} of {} images properly named, {} rename(s) planned",
        report.chapter,
        report.operation.label(),
        report.properly_named,
        report.images_total,
        report.renames_planned()
    );
    if let Some(inserted) = &report.inserted {
        let _ = writeln!(
            out,
            "  + {} -> {}",
            inserted.source.display(),
            inserted.filename
        );
        if inserted.adjusted() {
            let _ = writeln!(
                out,
                "  position {} adjusted to {}",
                inserted.requested_position, inserted.position
            );
        }
    }
    for step in &report.plan.steps {
        let marker = match step.kind {
            StepKind::Direct => " ",
            StepKind::ToTemporary => ">",
            StepKind::FromTemporary => "<",
        };
        let _ = writeln!(
            out,
            " {marker} {} -> {}",
            file_label(&step.from),
            file_label(&step.to)
        );
    }
    for blocked in &report.plan.blocked {
        let _ = writeln!(out, "  ! {} blocked: {}", blocked.entry, blocked.reason);
    }
    if !report.plan.shared_stems.is_empty() {
        let _ = writeln!(
            out,
            "  ~ sibling assets left in place, basename shared by: {}",
            report.plan.shared_stems.join(", ")
        );
    }
    out
}

pub fn render_report(report: &OperationReport) -> String {
    let mut out = render_plan(report);
    let status = match report.outcome {
        Outcome::NothingToDo => "nothing to do",
        Outcome::DryRun => "dry run, no changes made",
        Outcome::Cancelled => "cancelled, no changes made",
        Outcome::Completed => "done",
        Outcome::CompletedWithFailures => "finished with failures",
    };
    let _ = writeln!(
        out,
        "  {status}: {} figure(s) renamed, {} document(s) updated",
        report.figures_renamed(),
        report.documents_updated.len()
    );
    for failure in &report.failed {
        let _ = write!(
            out,
            "  ! {} -> {}: {}",
            file_label(&failure.from),
            file_label(&failure.to),
            failure.error
        );
        if !failure.restored {
            let _ = write!(out, " (now at {})", file_label(&failure.left_at));
        }
        out.push('\n');
    }
    for failure in &report.document_failures {
        let _ = writeln!(
            out,
            "  ! {} not updated ({}); stale references: {}",
            failure.path.display(),
            failure.error,
            failure.stale_references.join(", ")
        );
    }
    for reference in &report.unresolved {
        let _ = writeln!(
            out,
            "  ? {}:{} {} not found",
            file_label(&reference.document),
            reference.line,
            reference.raw_path
        );
    }
    if !report.unreferenced.is_empty() {
        let _ = writeln!(out, "  unreferenced images:");
        for path in &report.unreferenced {
            let _ = writeln!(out, "    {}", file_label(path));
        }
    }
    for unreadable in &report.unreadable {
        let _ = writeln!(
            out,
            "  ! could not read {}: {}",
            unreadable.path.display(),
            unreadable.error
        );
    }
    out
}

pub fn render_unreferenced(report: &UnreferencedReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} image(s), {} document(s), {} reference(s) under {}",
        report.images_total,
        report.documents_scanned,
        report.references_total,
        report.content_root.display()
    );
    if report.unreferenced.is_empty() {
        let _ = writeln!(out, "All images are referenced.");
    } else {
        let _ = writeln!(out, "{} unreferenced image(s):", report.unreferenced.len());
        for path in &report.unreferenced {
            let _ = writeln!(out, "  {}", path.display());
        }
    }
    out
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
