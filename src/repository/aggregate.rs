//! Rebuilding the index from a directory of durable logs.
//!
//! # Algorithm
//!
//! ```text
//! aggregate(root)
//!   ├── find_log_files: <root>/**/*.<ext>, sorted by path
//!   ├── decode each file        (failure → warn, skip, continue)   1 unit/file
//!   ├── drop operations whose OpKey was already routed
//!   ├── route each operation    (cancellation checked per op)      1 unit/file
//!   │     ├── non-resource / Added / Changed → create-if-absent + append
//!   │     ├── Removed                         → append, evict
//!   │     ├── Moved/Renamed (destination)     → create + append, evict origin, link
//!   │     └── Moved/Renamed (origin)          → append to origin node
//!   ├── fix_mismatches: per-file order repair
//!   └── set_time_ranges
//! ```
//!
//! The index is built in a local value; callers only ever see a complete
//! index or an error.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use recap_oplog::{
    ChangeKind, CodecError, MoveSide, OpKey, OpKind, Operation, OperationLog, ResourceTarget, codec,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cancel::{CancellationToken, Progress};
use super::index::{FileId, Index};
use super::path::FileKey;

// ---------------------------------------------------------------------------
// Errors and report
// ---------------------------------------------------------------------------

/// Why a rebuild was abandoned.
#[derive(Debug)]
pub enum RebuildError {
    /// The caller cancelled the rebuild.
    Cancelled,

    /// The history directory could not be turned into a search pattern.
    Pattern {
        /// The directory being scanned.
        root: PathBuf,
        /// Error detail from the pattern parser.
        detail: String,
    },
}

impl fmt::Display for RebuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(
                f,
                "rebuild cancelled; the index was cleared.\n  \
                 To fix: run the rebuild again to repopulate it."
            ),
            Self::Pattern { root, detail } => write!(
                f,
                "cannot scan history directory {}: {detail}\n  \
                 To fix: move the history directory to a path without glob metacharacters.",
                root.display()
            ),
        }
    }
}

impl std::error::Error for RebuildError {}

/// Why one log file was skipped.
#[derive(Debug)]
pub enum LogFileError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file is not a valid operation log.
    Codec(CodecError),
}

impl fmt::Display for LogFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "read failed: {e}"),
            Self::Codec(e) => write!(f, "decode failed: {e}"),
        }
    }
}

impl std::error::Error for LogFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Codec(e) => Some(e),
        }
    }
}

/// What a successful rebuild did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Log files found under the root.
    pub files_scanned: usize,
    /// Log files that could not be read or decoded.
    pub skipped: Vec<PathBuf>,
    /// Operations routed into file nodes.
    pub operations_routed: usize,
    /// Resource operations on projects or packages (not routed to files).
    pub structural_operations: usize,
    /// Ordering repairs and duplicates removed by the consistency pass.
    pub repairs: usize,
}

impl RebuildReport {
    /// Number of log files skipped.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

// ---------------------------------------------------------------------------
// Scanning and decoding
// ---------------------------------------------------------------------------

/// Every file under `root` whose extension is `extension`, sorted by path.
///
/// Unreadable directories and entries are skipped. A missing root yields an
/// empty list.
///
/// # Errors
/// Returns [`RebuildError::Pattern`] if `root` cannot be used in a glob pattern.
pub fn find_log_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>, RebuildError> {
    if root.is_file() {
        let matches = root.extension().is_some_and(|e| e == extension);
        return Ok(if matches { vec![root.to_owned()] } else { Vec::new() });
    }

    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let pattern = format!("{escaped}/**/*.{extension}");
    let entries = glob::glob(&pattern).map_err(|e| RebuildError::Pattern {
        root: root.to_owned(),
        detail: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(error = %e, "skipping unreadable history entry");
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Read and decode one durable log file.
///
/// # Errors
/// Returns [`LogFileError`] if the file cannot be read or is not a valid log.
pub fn read_log_file(path: &Path) -> Result<OperationLog, LogFileError> {
    let bytes = std::fs::read(path).map_err(LogFileError::Io)?;
    codec::from_bytes(&bytes).map_err(LogFileError::Codec)
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Build a fresh index from every log file under `root`.
///
/// Progress is reported as two units per log file: one when it is decoded,
/// one when its operations are routed.
///
/// # Errors
/// Returns [`RebuildError::Cancelled`] if `cancel` fires, or
/// [`RebuildError::Pattern`] if the root cannot be scanned. Per-file decode
/// failures are not errors; they are listed in [`RebuildReport::skipped`].
#[tracing::instrument(skip(cancel, progress), fields(root = %root.display()))]
pub fn aggregate(
    root: &Path,
    extension: &str,
    cancel: &CancellationToken,
    progress: &mut dyn Progress,
) -> Result<(Index, RebuildReport), RebuildError> {
    let files = find_log_files(root, extension)?;
    progress.begin(files.len() * 2);
    let result = aggregate_files(root, &files, cancel, progress);
    progress.done();
    result
}

fn aggregate_files(
    root: &Path,
    files: &[PathBuf],
    cancel: &CancellationToken,
    progress: &mut dyn Progress,
) -> Result<(Index, RebuildReport), RebuildError> {
    let mut report = RebuildReport {
        files_scanned: files.len(),
        ..RebuildReport::default()
    };

    let mut batches: Vec<Vec<Operation>> = Vec::with_capacity(files.len());
    for path in files {
        if cancel.is_cancelled() {
            return Err(RebuildError::Cancelled);
        }
        match read_log_file(path) {
            Ok(log) => batches.push(log.into_operations()),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping history file");
                report.skipped.push(path.clone());
                batches.push(Vec::new());
            }
        }
        progress.worked(1);
    }

    // Overlapping logs repeat operations. A repeated move or removal would
    // evict and relink nodes a second time, so duplicates never reach routing.
    let mut seen: HashSet<OpKey> = HashSet::new();
    let mut duplicates = 0;
    let mut index = Index::new(root.display().to_string());
    for batch in batches {
        for op in batch {
            if cancel.is_cancelled() {
                return Err(RebuildError::Cancelled);
            }
            if !seen.insert(op.key()) {
                duplicates += 1;
                continue;
            }
            route(&mut index, op, &mut report);
        }
        progress.worked(1);
    }
    if duplicates > 0 {
        debug!(duplicates, "dropped operations repeated across logs");
    }

    report.repairs = duplicates + index.fix_mismatches();
    index.set_time_ranges();

    info!(
        files = report.files_scanned,
        skipped = report.skipped_count(),
        operations = index.operation_count(),
        repairs = report.repairs,
        "index rebuilt"
    );
    Ok((index, report))
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

fn register(index: &mut Index, key: &FileKey, op: Operation) -> FileId {
    let id = index.ensure_file(key, op.path.as_deref());
    index.push(id, op);
    id
}

/// Route one operation into the index.
fn route(index: &mut Index, op: Operation, report: &mut RebuildReport) {
    let key = FileKey::from_path(op.path.as_deref());
    let (target, change, side, identical) = match &op.kind {
        OpKind::Resource(rc) => (rc.target, rc.change, rc.side, rc.identical_path.clone()),
        _ => {
            register(index, &key, op);
            report.operations_routed += 1;
            return;
        }
    };

    if target != ResourceTarget::File {
        debug!(resource = target.label(), change = %change, "structural change not routed to a file");
        report.structural_operations += 1;
        return;
    }
    report.operations_routed += 1;

    match change {
        ChangeKind::Added | ChangeKind::Changed => {
            register(index, &key, op);
        }
        ChangeKind::Removed => {
            register(index, &key, op);
            index.evict(&key);
        }
        ChangeKind::Moved | ChangeKind::Renamed => match side {
            MoveSide::Destination => route_destination(index, &key, identical.as_deref(), op),
            MoveSide::Origin => route_origin(index, &key, identical.as_deref(), op),
        },
    }
}

/// A move/rename seen from the new location: the destination node exists
/// before the origin is evicted and linked to it.
fn route_destination(index: &mut Index, key: &FileKey, origin_path: Option<&str>, op: Operation) {
    let destination = register(index, key, op);

    let origin_key = FileKey::from_path(origin_path);
    if origin_key == *key {
        debug!(file = %key, "move keeps the same lookup key; nothing to link");
        return;
    }
    match index.evict(&origin_key) {
        Some(origin) => index.link_move(origin, destination),
        None => debug!(
            origin = %origin_key,
            destination = %key,
            "origin of move not indexed; no lineage link"
        ),
    }
}

/// A move/rename seen from the old location. If the destination record was
/// routed first, the origin is already evicted; follow the link back to it.
fn route_origin(index: &mut Index, key: &FileKey, destination_path: Option<&str>, op: Operation) {
    if let Some(live) = index.find_file_by_key(key) {
        index.push(live, op);
        return;
    }
    let evicted_origin = destination_path
        .and_then(|p| index.find_file(p))
        .and_then(|dest| index.file(dest))
        .and_then(|dest| dest.moved_from);
    match evicted_origin {
        Some(origin) => index.push(origin, op),
        None => {
            register(index, key, op);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
