//! Cooperative cancellation and progress reporting for long rebuilds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shareable cancellation flag.
///
/// Cloning yields a handle to the same flag: one side calls
/// [`cancel`](Self::cancel), the rebuild polls
/// [`is_cancelled`](Self::is_cancelled) between units of work.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Return `true` once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Receives incremental progress from a rebuild.
///
/// Purely informational: implementations must not influence the result.
pub trait Progress {
    /// Work is starting; `total_units` units will be reported.
    fn begin(&mut self, total_units: usize);

    /// `units` more units are done.
    fn worked(&mut self, units: usize);

    /// Work has finished (successfully or not).
    fn done(&mut self) {}
}

/// A [`Progress`] that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn begin(&mut self, _total_units: usize) {}

    fn worked(&mut self, _units: usize) {}
}

/// A [`Progress`] that counts units, for tests and summaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountingProgress {
    /// Units announced by `begin`.
    pub total: usize,
    /// Units reported so far.
    pub completed: usize,
    /// Whether `done` was called.
    pub finished: bool,
}

impl Progress for CountingProgress {
    fn begin(&mut self, total_units: usize) {
        self.total = total_units;
        self.completed = 0;
        self.finished = false;
    }

    fn worked(&mut self, units: usize) {
        self.completed += units;
    }

    fn done(&mut self) {
        self.finished = true;
    }
}
