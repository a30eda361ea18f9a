//! The repository: an index of every recorded operation, grouped by file.
//!
//! [`Repository`] owns the current [`Index`] and rebuilds it from the
//! durable log files under a history directory.
//!
//! | Call | Effect |
//! |------|--------|
//! | [`Repository::rebuild`] | scan, decode, route; swap in the new index |
//! | [`Repository::refresh`] | rebuild only if a log changed since the last update |
//! | [`Repository::clear`] | drop the index, fire [`RepositoryEvent::Cleared`] |
//!
//! A failed or cancelled rebuild leaves an empty index behind, never a
//! partial one.

pub mod aggregate;
pub mod cancel;
pub mod index;
pub mod path;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

pub use aggregate::{RebuildError, RebuildReport, find_log_files, read_log_file};
pub use cancel::{CancellationToken, CountingProgress, NoProgress, Progress};
pub use index::{FileId, FileNode, Index, PackageId, PackageNode, ProjectId, ProjectNode, TimeRange};
pub use path::FileKey;

use crate::config::RecapConfig;

/// Default extension of durable log files.
pub const DEFAULT_EXTENSION: &str = "json";

/// Change notification delivered to [`Repository::subscribe`] listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepositoryEvent {
    /// A rebuild completed and a new index is in place.
    Updated,
    /// The index was reset to empty.
    Cleared,
}

/// Result of [`Repository::refresh`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No log changed since the last update; the index was left alone.
    Unchanged,
    /// The index was rebuilt.
    Rebuilt(RebuildReport),
}

type Listener = Box<dyn Fn(&RepositoryEvent) + Send>;

/// Owner of the operation index for one history directory.
pub struct Repository {
    root: PathBuf,
    extension: String,
    index: Index,
    last_update: Option<SystemTime>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("extension", &self.extension)
            .field("files", &self.index.all_files().count())
            .field("last_update", &self.last_update)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Repository {
    /// An empty repository over the log files under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_owned(),
            index: Index::default(),
            last_update: None,
            listeners: Vec::new(),
        }
    }

    /// A repository over the configured history directory of `workspace_root`.
    #[must_use]
    pub fn from_config(workspace_root: &Path, config: &RecapConfig) -> Self {
        Self::new(config.history_dir(workspace_root)).with_extension(&config.history.extension)
    }

    /// Use `extension` (without the dot) to recognise log files.
    #[must_use]
    pub fn with_extension(mut self, extension: &str) -> Self {
        extension.trim_start_matches('.').clone_into(&mut self.extension);
        self
    }

    /// The directory being scanned.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The current index. Empty until the first successful rebuild.
    #[must_use]
    pub const fn index(&self) -> &Index {
        &self.index
    }

    /// Start time of the last successful rebuild.
    #[must_use]
    pub const fn last_update(&self) -> Option<SystemTime> {
        self.last_update
    }

    /// Register a listener for [`RepositoryEvent`]s.
    pub fn subscribe(&mut self, listener: impl Fn(&RepositoryEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Rebuild the index from every log file under the root.
    ///
    /// # Errors
    /// On cancellation or a scan failure the index is cleared,
    /// [`RepositoryEvent::Cleared`] is fired, and the error is returned.
    pub fn rebuild(
        &mut self,
        cancel: &CancellationToken,
        progress: &mut dyn Progress,
    ) -> Result<RebuildReport, RebuildError> {
        let started = SystemTime::now();
        match aggregate::aggregate(&self.root, &self.extension, cancel, progress) {
            Ok((index, report)) => {
                self.index = index;
                self.last_update = Some(started);
                self.notify(RepositoryEvent::Updated);
                Ok(report)
            }
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "rebuild failed; index cleared");
                self.clear();
                Err(e)
            }
        }
    }

    /// Rebuild only if no rebuild has succeeded yet or a log file was
    /// modified after the last update.
    ///
    /// # Errors
    /// Same as [`rebuild`](Self::rebuild).
    pub fn refresh(
        &mut self,
        cancel: &CancellationToken,
        progress: &mut dyn Progress,
    ) -> Result<RefreshOutcome, RebuildError> {
        let files = find_log_files(&self.root, &self.extension)?;
        if files.is_empty() {
            debug!(root = %self.root.display(), "no history files; nothing to refresh");
            return Ok(RefreshOutcome::Unchanged);
        }
        if !self.modified_since_update(&files) {
            return Ok(RefreshOutcome::Unchanged);
        }
        self.rebuild(cancel, progress).map(RefreshOutcome::Rebuilt)
    }

    /// Reset the index to empty and notify listeners.
    pub fn clear(&mut self) {
        self.index = Index::default();
        self.last_update = None;
        self.notify(RepositoryEvent::Cleared);
    }

    fn modified_since_update(&self, files: &[PathBuf]) -> bool {
        let Some(last) = self.last_update else {
            return true;
        };
        files.iter().any(
            |file| match std::fs::metadata(file).and_then(|m| m.modified()) {
                Ok(modified) => modified > last,
                Err(_) => true,
            },
        )
    }

    fn notify(&self, event: RepositoryEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }
}
