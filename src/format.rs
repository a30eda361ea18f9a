//! Rendering command output as text or JSON.

use std::fmt::Write as _;

use anyhow::{Context as _, Result};
use clap::ValueEnum;
use recap::oplog::Operation;
use recap::repository::{FileNode, Index, RebuildReport, TimeRange};
use serde::Serialize;

/// Output format for structured data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON - machine-parseable
    Json,
}

/// Serialize `data` as pretty JSON.
pub fn to_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data).context("JSON serialization failed")
}

fn range(range: Option<TimeRange>) -> String {
    range.map_or_else(|| "-".to_owned(), |r| format!("{}..{}", r.first, r.last))
}

fn links(index: &Index, file: &FileNode) -> String {
    let mut out = String::new();
    if let Some(node) = file.moved_from.and_then(|id| index.file(id)) {
        let _ = write!(out, " (from {})", node.key);
    }
    if let Some(node) = file.moved_to.and_then(|id| index.file(id)) {
        let _ = write!(out, " (to {})", node.key);
    }
    if file.evicted {
        out.push_str(" [gone]");
    }
    out
}

/// The index as an indented tree followed by the rebuild summary.
pub fn index_text(index: &Index, report: &RebuildReport) -> String {
    let mut out = String::new();
    if let Some(ws) = index.workspace() {
        let _ = writeln!(out, "{} [{}]", ws.name, range(ws.range));
    }
    for (project_id, project) in index.list_projects() {
        let _ = writeln!(out, "  {} [{}]", project.name, range(project.range));
        for (package_id, package) in index.list_packages(project_id) {
            let _ = writeln!(out, "    {} [{}]", package.name, range(package.range));
            for (_, file) in index.list_files(package_id) {
                let _ = writeln!(
                    out,
                    "      {} ({} ops) [{}]{}",
                    file.name,
                    file.operations.len(),
                    range(file.range),
                    links(index, file)
                );
            }
        }
    }
    let _ = writeln!(
        out,
        "\n{} files scanned, {} skipped, {} operations, {} structural, {} repairs",
        report.files_scanned,
        report.skipped_count(),
        index.operation_count(),
        report.structural_operations,
        report.repairs
    );
    for path in &report.skipped {
        let _ = writeln!(out, "  skipped: {}", path.display());
    }
    out
}

#[derive(Serialize)]
struct IndexJson<'a> {
    index: &'a Index,
    report: &'a RebuildReport,
    fingerprint: String,
}

/// The index, rebuild report and fingerprint as JSON.
pub fn index_json(index: &Index, report: &RebuildReport) -> Result<String> {
    to_json(&IndexJson {
        index,
        report,
        fingerprint: index.fingerprint(),
    })
}

/// One operation per line.
pub fn operations_text(ops: &[Operation]) -> String {
    let mut out = String::new();
    for (i, op) in ops.iter().enumerate() {
        let _ = writeln!(out, "{i:>5}  {op}");
    }
    out
}
