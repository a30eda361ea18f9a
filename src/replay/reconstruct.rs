//! Rebuilding a file's text at a point in its operation history.
//!
//! ```text
//! ops:   [Open "abc"] [Edit @1 -"b" +"X"] [Save "aXc"] [Edit @3 +"!"]
//!             ▲ base for 0..=1              ▲ base for 2..=3
//! ```
//!
//! The base is the latest snapshot-bearing operation at or before the
//! target; every text edit after it, up to the target, is replayed on top.

use std::fmt;

use recap_oplog::{OpKind, Operation, TextEdit};
use tracing::warn;

/// Why a reconstruction failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayError {
    /// No snapshot-bearing operation at or before `index`.
    NoBaseState {
        /// Target operation index.
        index: usize,
    },

    /// An edit addressed text beyond the end of the buffer.
    OffsetOutOfRange {
        /// Index of the offending operation.
        index: usize,
        /// The edit's offset.
        offset: usize,
        /// Characters the edit wanted to remove.
        deleted: usize,
        /// Buffer length (characters) at that point.
        len: usize,
    },

    /// The target index is past the end of the operation list.
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of operations.
        len: usize,
    },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBaseState { index } => write!(
                f,
                "no file snapshot at or before operation {index}\n  \
                 To fix: replay with the file's rename lineage, or pick a later point."
            ),
            Self::OffsetOutOfRange {
                index,
                offset,
                deleted,
                len,
            } => write!(
                f,
                "operation {index} edits characters {offset}..{} of a {len}-character text\n  \
                 To fix: the history for this file is inconsistent; rebuild from its logs.",
                offset + deleted
            ),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "operation index {index} out of range (file has {len} operations)")
            }
        }
    }
}

impl std::error::Error for ReplayError {}

// ---------------------------------------------------------------------------
// TextBuffer
// ---------------------------------------------------------------------------

/// A text addressed by character offset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextBuffer {
    chars: Vec<char>,
}

impl TextBuffer {
    /// A buffer holding `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
        }
    }

    /// Length in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Return `true` if the buffer holds no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Apply the text effect of `op`, the operation at position `index`.
    ///
    /// Compound children are applied to a copy that replaces the buffer only
    /// if every child succeeds. Non-text operations are no-ops.
    ///
    /// # Errors
    /// Returns [`ReplayError::OffsetOutOfRange`]; the buffer is unchanged.
    pub fn apply(&mut self, op: &Operation, index: usize) -> Result<(), ReplayError> {
        match &op.kind {
            OpKind::TextEdit(edit) => self.apply_edit(edit, index),
            OpKind::Compound { edits, .. } => {
                let mut scratch = self.clone();
                for edit in edits {
                    scratch.apply_edit(edit, index)?;
                }
                *self = scratch;
                Ok(())
            }
            OpKind::Copy { .. }
            | OpKind::File { .. }
            | OpKind::Command { .. }
            | OpKind::Resource(_) => Ok(()),
        }
    }

    fn apply_edit(&mut self, edit: &TextEdit, index: usize) -> Result<(), ReplayError> {
        let deleted = edit.deleted.chars().count();
        let end = edit
            .offset
            .checked_add(deleted)
            .filter(|&end| end <= self.chars.len())
            .ok_or(ReplayError::OffsetOutOfRange {
                index,
                offset: edit.offset,
                deleted,
                len: self.chars.len(),
            })?;

        if !self.chars[edit.offset..end].iter().copied().eq(edit.deleted.chars()) {
            let found: String = self.chars[edit.offset..end].iter().collect();
            warn!(
                index,
                offset = edit.offset,
                expected = %edit.deleted,
                found = %found,
                "recorded deletion does not match replayed text"
            );
        }
        self.chars.splice(edit.offset..end, edit.inserted.chars());
        Ok(())
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.chars.iter().try_for_each(|c| fmt::Write::write_char(f, *c))
    }
}

// ---------------------------------------------------------------------------
// reconstruct
// ---------------------------------------------------------------------------

/// The file's text immediately after `ops[index]` was applied.
///
/// # Errors
/// - [`ReplayError::IndexOutOfRange`] if `index >= ops.len()`
/// - [`ReplayError::NoBaseState`] if no snapshot precedes `index`
/// - [`ReplayError::OffsetOutOfRange`] if an edit does not fit the text
pub fn reconstruct(ops: &[Operation], index: usize) -> Result<String, ReplayError> {
    if index >= ops.len() {
        return Err(ReplayError::IndexOutOfRange {
            index,
            len: ops.len(),
        });
    }
    let base = ops[..=index]
        .iter()
        .rposition(Operation::is_base_state)
        .ok_or(ReplayError::NoBaseState { index })?;

    let mut buffer = TextBuffer::new(ops[base].snapshot().unwrap_or_default());
    for (i, op) in ops.iter().enumerate().take(index + 1).skip(base + 1) {
        buffer.apply(op, i)?;
    }
    Ok(buffer.to_string())
}
