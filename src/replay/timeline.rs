//! Focal state for replaying one file.

use std::fmt;

use recap_oplog::Operation;

use super::reconstruct::{ReplayError, reconstruct};
use super::search::find_focal_index;
use crate::repository::{FileId, Index};

/// Delivered to [`Timeline::subscribe`] listeners when the focus moves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FocusChanged {
    /// New focal operation index.
    pub index: usize,
    /// Timestamp of the focal operation.
    pub timestamp: u64,
    /// Whether the text at the focus could be reconstructed.
    pub reconstructed: bool,
}

type Listener = Box<dyn Fn(&FocusChanged) + Send>;

/// A file's operations with a movable focus and the text at that focus.
///
/// ```text
/// ops:    ●──────●───●──────────●
///                    ▲ focal index / focal time
/// text:   reconstruct(ops, focal index)
/// ```
pub struct Timeline {
    ops: Vec<Operation>,
    focal: Option<usize>,
    text: Option<String>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("operations", &self.ops.len())
            .field("focal", &self.focal)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

impl Timeline {
    /// A timeline over `ops`, sorted by `(timestamp, sequence)`. No focus yet.
    #[must_use]
    pub fn new(mut ops: Vec<Operation>) -> Self {
        ops.sort_by_key(Operation::order_key);
        Self {
            ops,
            focal: None,
            text: None,
            listeners: Vec::new(),
        }
    }

    /// The timeline of one indexed file, or `None` for an unknown handle.
    #[must_use]
    pub fn for_file(index: &Index, file: FileId) -> Option<Self> {
        index.file(file).map(|node| Self::new(node.operations.clone()))
    }

    /// The merged timeline of a file and every file it was moved or renamed
    /// from, so replay can start from a snapshot taken under an old name.
    #[must_use]
    pub fn with_lineage(index: &Index, file: FileId) -> Option<Self> {
        index.file(file)?;
        let ops = index
            .lineage(file)
            .into_iter()
            .filter_map(|id| index.file(id))
            .flat_map(|node| node.operations.iter().cloned())
            .collect();
        Some(Self::new(ops))
    }

    /// The operations, in replay order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Index of the focal operation.
    #[must_use]
    pub const fn focal_index(&self) -> Option<usize> {
        self.focal
    }

    /// Timestamp of the focal operation.
    #[must_use]
    pub fn focal_time(&self) -> Option<u64> {
        self.focal.map(|i| self.ops[i].timestamp)
    }

    /// Text at the focus, if it could be reconstructed.
    #[must_use]
    pub fn current_text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Register a listener for focus changes.
    pub fn subscribe(&mut self, listener: impl Fn(&FocusChanged) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Move the focus to operation `index` and reconstruct the text there.
    ///
    /// The focus moves even when reconstruction fails; the text is then
    /// cleared.
    ///
    /// # Errors
    /// Returns [`ReplayError::IndexOutOfRange`] (focus unchanged) or the
    /// reconstruction error.
    pub fn go_to(&mut self, index: usize) -> Result<&str, ReplayError> {
        if index >= self.ops.len() {
            return Err(ReplayError::IndexOutOfRange {
                index,
                len: self.ops.len(),
            });
        }
        let result = reconstruct(&self.ops, index);
        self.focal = Some(index);
        self.text = result.as_ref().ok().cloned();

        let event = FocusChanged {
            index,
            timestamp: self.ops[index].timestamp,
            reconstructed: self.text.is_some(),
        };
        for listener in &self.listeners {
            listener(&event);
        }

        result?;
        Ok(self.text.as_deref().unwrap_or_default())
    }

    /// Focus the operation closest in time to `t`. No-op on an empty timeline.
    ///
    /// # Errors
    /// Same as [`go_to`](Self::go_to).
    pub fn find_focal_time(&mut self, t: u64) -> Result<Option<usize>, ReplayError> {
        match find_focal_index(&self.ops, t) {
            Some(index) => self.go_to(index).map(|_| Some(index)),
            None => Ok(None),
        }
    }

    /// Focus the next operation (the first one if nothing is focused yet).
    /// Returns `Ok(None)` at the end.
    ///
    /// # Errors
    /// Same as [`go_to`](Self::go_to).
    pub fn step_forward(&mut self) -> Result<Option<usize>, ReplayError> {
        let next = self.focal.map_or(0, |i| i + 1);
        if next >= self.ops.len() {
            return Ok(None);
        }
        self.go_to(next).map(|_| Some(next))
    }

    /// Focus the previous operation. Returns `Ok(None)` at the start or when
    /// nothing is focused.
    ///
    /// # Errors
    /// Same as [`go_to`](Self::go_to).
    pub fn step_backward(&mut self) -> Result<Option<usize>, ReplayError> {
        match self.focal.and_then(|i| i.checked_sub(1)) {
            Some(prev) => self.go_to(prev).map(|_| Some(prev)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use recap_oplog::{FileAction, OpKind, TextEdit};

    use super::*;

    const PATH: &str = "/P/src/A.java";

    fn ops() -> Vec<Operation> {
        vec![
            Operation::file(100, 0, PATH, "a", FileAction::Open, Some("abc".to_owned())).unwrap(),
            Operation::new(
                200,
                0,
                Some(PATH.to_owned()),
                "a",
                OpKind::TextEdit(TextEdit::new(1, "X", "b")),
            ),
            Operation::new(
                300,
                0,
                Some(PATH.to_owned()),
                "a",
                OpKind::TextEdit(TextEdit::new(3, "!", "")),
            ),
        ]
    }

    #[test]
    fn go_to_reconstructs_and_notifies() {
        let mut timeline = Timeline::new(ops());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        timeline.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        assert_eq!(timeline.go_to(1).unwrap(), "aXc");
        assert_eq!(timeline.focal_index(), Some(1));
        assert_eq!(timeline.focal_time(), Some(200));
        assert_eq!(timeline.current_text(), Some("aXc"));
        assert_eq!(
            *events.lock().unwrap(),
            vec![FocusChanged {
                index: 1,
                timestamp: 200,
                reconstructed: true
            }]
        );
    }

    #[test]
    fn go_to_out_of_range_keeps_focus() {
        let mut timeline = Timeline::new(ops());
        timeline.go_to(0).unwrap();
        assert!(matches!(
            timeline.go_to(3),
            Err(ReplayError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert_eq!(timeline.focal_index(), Some(0));
    }

    #[test]
    fn find_focal_time_picks_nearest() {
        let mut timeline = Timeline::new(ops());
        assert_eq!(timeline.find_focal_time(250).unwrap(), Some(1));
        assert_eq!(timeline.find_focal_time(260).unwrap(), Some(2));
        assert_eq!(timeline.current_text(), Some("aXc!"));
    }

    #[test]
    fn empty_timeline_has_no_focus() {
        let mut timeline = Timeline::new(Vec::new());
        assert_eq!(timeline.find_focal_time(10).unwrap(), None);
        assert_eq!(timeline.step_forward().unwrap(), None);
        assert_eq!(timeline.focal_time(), None);
    }

    #[test]
    fn stepping_walks_both_ways() {
        let mut timeline = Timeline::new(ops());
        assert_eq!(timeline.step_backward().unwrap(), None);
        assert_eq!(timeline.step_forward().unwrap(), Some(0));
        assert_eq!(timeline.step_forward().unwrap(), Some(1));
        assert_eq!(timeline.step_forward().unwrap(), Some(2));
        assert_eq!(timeline.step_forward().unwrap(), None);
        assert_eq!(timeline.step_backward().unwrap(), Some(1));
        assert_eq!(timeline.current_text(), Some("aXc"));
    }

    #[test]
    fn new_sorts_operations() {
        let mut shuffled = ops();
        shuffled.reverse();
        let timeline = Timeline::new(shuffled);
        let stamps: Vec<u64> = timeline.operations().iter().map(|o| o.timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[test]
    fn failed_reconstruction_moves_focus_and_clears_text() {
        let edit_only = vec![Operation::new(
            5,
            0,
            Some(PATH.to_owned()),
            "a",
            OpKind::TextEdit(TextEdit::new(0, "x", "")),
        )];
        let mut timeline = Timeline::new(edit_only);
        assert_eq!(
            timeline.go_to(0),
            Err(ReplayError::NoBaseState { index: 0 })
        );
        assert_eq!(timeline.focal_index(), Some(0));
        assert_eq!(timeline.current_text(), None);
    }
}
