//! Capture: turning editor events into a live operation log and flushing it
//! to durable log files.
//!
//! # Flow
//!
//! ```text
//! editor events ──► Recorder::record / file_* / resource_changed
//!                        │  stamp (timestamp, sequence, author), append
//!                        ▼
//!                   live OperationLog (Mutex)
//!                        │  flush: sort, encode, write <dir>/<ms>.json, clear
//!                        ▼
//!                   durable log files ──► Repository::rebuild
//! ```
//!
//! A single mutex guards both appends and the flush critical section, so no
//! operation can slip in between sorting and clearing.

use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use recap_oplog::{FileAction, ModelError, OpKind, Operation, OperationLog, ResourceChange, codec};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::RecapConfig;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of wall-clock milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from recording operations or flushing the live log.
///
/// A rejected operation is never appended. A failed flush keeps every
/// pending operation; the next flush retries.
#[derive(Debug)]
pub enum CaptureError {
    /// The operation breaks a per-variant rule and would make its log file
    /// unreadable.
    Invalid {
        /// The rejected operation, rendered.
        op: String,
        /// The rule it breaks.
        source: ModelError,
    },
    /// Creating or writing a log file failed.
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The log could not be serialized.
    Encode(serde_json::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { op, source } => write!(
                f,
                "rejected operation {op}: {source}\n  \
                 To fix: record lifecycle events through the file_* methods, or \
                 complete the payload before appending."
            ),
            Self::Io { path, source } => write!(
                f,
                "failed to write history file {}: {source}\n  \
                 To fix: check that the history directory exists and is writable.",
                path.display()
            ),
            Self::Encode(e) => write!(f, "failed to encode operation log: {e}"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invalid { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Encode(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Live {
    log: OperationLog,
    last_stamp: Option<(u64, u32)>,
}

/// Owner of the live operation log.
pub struct Recorder {
    history_dir: PathBuf,
    extension: String,
    author: String,
    flush_on_save: bool,
    flush_on_close: bool,
    clock: Box<dyn Clock>,
    live: Mutex<Live>,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("history_dir", &self.history_dir)
            .field("author", &self.author)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// A recorder writing `*.json` logs into `history_dir`, flushing on save
    /// and close.
    #[must_use]
    pub fn new(history_dir: impl Into<PathBuf>, author: impl Into<String>) -> Self {
        Self {
            history_dir: history_dir.into(),
            extension: "json".to_owned(),
            author: author.into(),
            flush_on_save: true,
            flush_on_close: true,
            clock: Box::new(SystemClock),
            live: Mutex::new(Live::default()),
        }
    }

    /// A recorder set up from the configuration of `workspace_root`.
    #[must_use]
    pub fn from_config(workspace_root: &Path, config: &RecapConfig) -> Self {
        let mut recorder = Self::new(config.history_dir(workspace_root), &config.capture.author)
            .with_flush_policy(config.capture.flush_on_save, config.capture.flush_on_close);
        config
            .history
            .extension
            .trim_start_matches('.')
            .clone_into(&mut recorder.extension);
        recorder
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Choose whether save and close events flush the log.
    #[must_use]
    pub fn with_flush_policy(mut self, on_save: bool, on_close: bool) -> Self {
        self.flush_on_save = on_save;
        self.flush_on_close = on_close;
        self
    }

    /// Directory flushed logs are written to.
    #[must_use]
    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    /// Author stamped on recorded operations.
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    fn lock(&self) -> MutexGuard<'_, Live> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp, validate and append an operation.
    ///
    /// The timestamp never goes backwards; operations within the same
    /// millisecond get increasing sequence numbers in arrival order. A
    /// rejected operation consumes no sequence number.
    ///
    /// # Errors
    /// Returns [`CaptureError::Invalid`] if the payload breaks a per-variant
    /// rule; nothing is appended.
    pub fn record(&self, path: Option<&str>, kind: OpKind) -> Result<Operation, CaptureError> {
        let now = self.clock.now_millis();
        let mut live = self.lock();
        let (timestamp, sequence) = match live.last_stamp {
            Some((last, seq)) if now <= last => (last, seq + 1),
            _ => (now, 0),
        };
        let op = Operation::new(timestamp, sequence, path.map(str::to_owned), self.author.as_str(), kind);
        check(&op)?;
        live.last_stamp = Some((timestamp, sequence));
        debug!(op = %op, "recorded");
        live.log.append(op.clone());
        Ok(op)
    }

    /// Append an operation built elsewhere, unchanged.
    ///
    /// # Errors
    /// Returns [`CaptureError::Invalid`] if the operation breaks a
    /// per-variant rule; nothing is appended.
    pub fn operation_produced(&self, op: Operation) -> Result<(), CaptureError> {
        check(&op)?;
        self.lock().log.append(op);
        Ok(())
    }

    /// A file was opened with `snapshot` as its content.
    ///
    /// # Errors
    /// See [`record`](Self::record).
    pub fn file_opened(&self, path: &str, snapshot: &str) -> Result<Operation, CaptureError> {
        self.file_event(path, FileAction::Open, Some(snapshot))
    }

    /// A file's editor became active.
    ///
    /// # Errors
    /// See [`record`](Self::record).
    pub fn file_activated(&self, path: &str) -> Result<Operation, CaptureError> {
        self.file_event(path, FileAction::Activate, None)
    }

    /// A file was saved with `snapshot` as its content. Flushes if configured.
    ///
    /// # Errors
    /// Returns the flush error; the save itself is always recorded.
    pub fn file_saved(&self, path: &str, snapshot: &str) -> Result<Option<PathBuf>, CaptureError> {
        self.file_event(path, FileAction::Save, Some(snapshot))?;
        if self.flush_on_save {
            self.flush()
        } else {
            Ok(None)
        }
    }

    /// A file was closed with `snapshot` as its content. Flushes if configured.
    ///
    /// # Errors
    /// Returns the flush error; the close itself is always recorded.
    pub fn file_closed(&self, path: &str, snapshot: &str) -> Result<Option<PathBuf>, CaptureError> {
        self.file_event(path, FileAction::Close, Some(snapshot))?;
        if self.flush_on_close {
            self.flush()
        } else {
            Ok(None)
        }
    }

    /// A project, package or file was added, removed, moved, renamed or
    /// changed at `path`.
    ///
    /// # Errors
    /// Returns [`CaptureError::Invalid`] for a move or rename without its
    /// counterpart path, or any other change that names one.
    pub fn resource_changed(&self, change: ResourceChange, path: &str) -> Result<Operation, CaptureError> {
        self.record(Some(path), OpKind::Resource(change))
    }

    fn file_event(
        &self,
        path: &str,
        action: FileAction,
        snapshot: Option<&str>,
    ) -> Result<Operation, CaptureError> {
        self.record(
            Some(path),
            OpKind::File {
                action,
                snapshot: snapshot.map(str::to_owned),
            },
        )
    }

    /// Number of operations not yet flushed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().log.len()
    }

    /// Copy of the operations not yet flushed, in arrival order.
    #[must_use]
    pub fn pending_operations(&self) -> Vec<Operation> {
        self.lock().log.operations().to_vec()
    }

    /// Sort the live log, write it to a new log file, and clear it.
    ///
    /// The file is named after the flush time in milliseconds; if that name
    /// is taken the millisecond is bumped until a free name is found.
    ///
    /// # Errors
    /// Returns [`CaptureError`] if writing fails. Pending operations are kept.
    #[tracing::instrument(skip(self), fields(dir = %self.history_dir.display()))]
    pub fn flush(&self) -> Result<Option<PathBuf>, CaptureError> {
        let mut live = self.lock();
        if live.log.is_empty() {
            return Ok(None);
        }
        live.log.sort();
        let bytes = codec::to_bytes(&live.log).map_err(CaptureError::Encode)?;
        let path = self.write_new_file(&bytes)?;

        info!(file = %path.display(), operations = live.log.len(), "flushed operation log");
        live.log.clear();
        Ok(Some(path))
    }

    /// Write `bytes` to a fresh `<ms>.<ext>` file: temp file, fsync, then a
    /// no-clobber rename.
    fn write_new_file(&self, bytes: &[u8]) -> Result<PathBuf, CaptureError> {
        let dir = &self.history_dir;
        let io_err = |path: &Path| {
            let path = path.to_owned();
            move |source| CaptureError::Io { path, source }
        };

        std::fs::create_dir_all(dir).map_err(io_err(dir))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err(dir))?;
        tmp.write_all(bytes).map_err(io_err(tmp.path()))?;
        tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;

        let mut stamp = self.clock.now_millis();
        loop {
            let target = dir.join(format!("{stamp}.{}", self.extension));
            match tmp.persist_noclobber(&target) {
                Ok(_) => return Ok(target),
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(file = %target.display(), "history file name taken");
                    tmp = e.file;
                    stamp += 1;
                }
                Err(e) => return Err(io_err(&target)(e.error)),
            }
        }
    }
}

fn check(op: &Operation) -> Result<(), CaptureError> {
    op.validate().map_err(|source| CaptureError::Invalid {
        op: op.to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
