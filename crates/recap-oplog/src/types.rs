//! Operation struct and OpKind enum: the unit of the edit history.
//!
//! Every recordable action (a text edit, a clipboard copy, a compound
//! refactoring edit, a file lifecycle event, a menu command, a resource
//! change) is one [`Operation`]. The action-specific payload lives in
//! [`OpKind`], a closed sum type so replay can dispatch exhaustively.
//!
//! # Ordering and identity
//!
//! Operations are totally ordered by `(timestamp, sequence)`; see
//! [`Operation::order_key`]. Two operations with the same path, timestamp,
//! sequence and author are the *same* operation ([`Operation::key`]); the
//! repository uses that key to merge overlapping logs idempotently.
//!
//! Derived `PartialEq` compares every field and is what codec round trips
//! are checked against.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// A single recorded action on a source file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Wall-clock time of the action, in milliseconds since the Unix epoch.
    pub timestamp: u64,

    /// Arrival order among operations sharing the same `timestamp`.
    pub sequence: u32,

    /// Logical path of the target file, e.g. `/Project/src/org/demo/Main.java`.
    pub path: Option<String>,

    /// Identity of the person who performed the action.
    pub author: String,

    /// What happened.
    pub kind: OpKind,
}

/// Identity of an operation: equal keys mean the same recorded action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpKey {
    /// See [`Operation::path`].
    pub path: Option<String>,
    /// See [`Operation::timestamp`].
    pub timestamp: u64,
    /// See [`Operation::sequence`].
    pub sequence: u32,
    /// See [`Operation::author`].
    pub author: String,
}

impl Operation {
    /// Create an operation.
    pub fn new(
        timestamp: u64,
        sequence: u32,
        path: Option<String>,
        author: impl Into<String>,
        kind: OpKind,
    ) -> Self {
        Self {
            timestamp,
            sequence,
            path,
            author: author.into(),
            kind,
        }
    }

    /// Create a file lifecycle operation, enforcing the snapshot rule.
    ///
    /// # Errors
    /// Returns [`ModelError`] if `snapshot` is missing for Open/Save/Close or
    /// present for Activate.
    pub fn file(
        timestamp: u64,
        sequence: u32,
        path: impl Into<String>,
        author: impl Into<String>,
        action: FileAction,
        snapshot: Option<String>,
    ) -> Result<Self, ModelError> {
        let op = Self::new(
            timestamp,
            sequence,
            Some(path.into()),
            author,
            OpKind::File { action, snapshot },
        );
        op.validate()?;
        Ok(op)
    }

    /// The sort key: `(timestamp, sequence)`.
    #[must_use]
    pub const fn order_key(&self) -> (u64, u32) {
        (self.timestamp, self.sequence)
    }

    /// Compare two operations chronologically.
    #[must_use]
    pub fn chronological(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }

    /// The identity key of this operation.
    #[must_use]
    pub fn key(&self) -> OpKey {
        OpKey {
            path: self.path.clone(),
            timestamp: self.timestamp,
            sequence: self.sequence,
            author: self.author.clone(),
        }
    }

    /// Return `true` if `other` records the same action (equal identity keys).
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.sequence == other.sequence
            && self.path == other.path
            && self.author == other.author
    }

    /// Return `true` for operations that change text (edits and compounds).
    #[must_use]
    pub const fn is_text_edit(&self) -> bool {
        matches!(self.kind, OpKind::TextEdit(_) | OpKind::Compound { .. })
    }

    /// Return `true` for resource change operations.
    #[must_use]
    pub const fn is_resource(&self) -> bool {
        matches!(self.kind, OpKind::Resource(_))
    }

    /// The full-text snapshot carried by this operation, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<&str> {
        match &self.kind {
            OpKind::File { snapshot, .. } => snapshot.as_deref(),
            OpKind::Resource(rc) => rc.snapshot.as_deref(),
            _ => None,
        }
    }

    /// Return `true` if this operation's snapshot can seed a reconstruction.
    ///
    /// Open/Save/Close snapshots and the snapshot of an added file are the
    /// text of the file at that instant. A `Changed` resource snapshot is
    /// not: the capture side records it empty.
    #[must_use]
    pub fn is_base_state(&self) -> bool {
        match &self.kind {
            OpKind::File { snapshot, .. } => snapshot.is_some(),
            OpKind::Resource(rc) => rc.change == ChangeKind::Added && rc.snapshot.is_some(),
            _ => false,
        }
    }

    /// Check the per-variant payload rules.
    ///
    /// # Errors
    /// Returns the first [`ModelError`] found.
    pub fn validate(&self) -> Result<(), ModelError> {
        match &self.kind {
            OpKind::File { action, snapshot } => match (action.requires_snapshot(), snapshot) {
                (true, None) => Err(ModelError::SnapshotRequired { action: *action }),
                (false, Some(_)) => Err(ModelError::UnexpectedSnapshot { action: *action }),
                _ => Ok(()),
            },
            OpKind::Resource(rc) => match (rc.change.is_move(), &rc.identical_path) {
                (true, None) => Err(ModelError::MissingIdenticalPath { change: rc.change }),
                (false, Some(_)) => Err(ModelError::UnexpectedIdenticalPath { change: rc.change }),
                _ => Ok(()),
            },
            OpKind::TextEdit(_)
            | OpKind::Copy { .. }
            | OpKind::Compound { .. }
            | OpKind::Command { .. } => Ok(()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} {} {}",
            self.timestamp,
            self.sequence,
            self.path.as_deref().unwrap_or("-"),
            self.kind
        )
    }
}

// ---------------------------------------------------------------------------
// OpKind
// ---------------------------------------------------------------------------

/// The kind of action recorded by an [`Operation`].
///
/// Serialized with a `"type"` tag: `{"type":"text_edit","offset":3,…}` etc.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpKind {
    /// Text inserted and/or deleted at one offset.
    TextEdit(TextEdit),

    /// Text copied to the clipboard. Does not change the file.
    Copy {
        /// Offset of the copied region.
        offset: usize,
        /// The copied text.
        copied: String,
    },

    /// Several edits performed as one logical action (e.g. a refactoring).
    Compound {
        /// Label of the logical action.
        group: String,
        /// Child edits, in application order.
        edits: Vec<TextEdit>,
    },

    /// A file was opened, activated, saved or closed.
    File {
        /// Which lifecycle event.
        action: FileAction,
        /// Full text of the file; absent only for `Activate`.
        snapshot: Option<String>,
    },

    /// A menu or tool command with no direct text effect.
    Command {
        /// Identifier of the invoked command.
        command_id: String,
    },

    /// A project, package or file was added, removed, moved, renamed or changed.
    Resource(ResourceChange),
}

impl OpKind {
    /// Short lowercase label used in listings.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::TextEdit(edit) => edit.subtype.label(),
            Self::Copy { .. } => "copy",
            Self::Compound { .. } => "compound",
            Self::File { action, .. } => action.label(),
            Self::Command { .. } => "command",
            Self::Resource(rc) => rc.change.label(),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextEdit(edit) => write!(f, "{edit}"),
            Self::Copy { offset, copied } => write!(f, "copy @{offset} {copied:?}"),
            Self::Compound { group, edits } => {
                write!(f, "compound({group}) [{} edits]", edits.len())
            }
            Self::File { action, snapshot } => {
                write!(f, "{}", action.label())?;
                if let Some(text) = snapshot {
                    write!(f, " ({} chars)", text.chars().count())?;
                }
                Ok(())
            }
            Self::Command { command_id } => write!(f, "command {command_id}"),
            Self::Resource(rc) => {
                write!(f, "{} {}", rc.target.label(), rc.change.label())?;
                if let Some(other) = &rc.identical_path {
                    let arrow = match rc.side {
                        MoveSide::Destination => "from",
                        MoveSide::Origin => "to",
                    };
                    write!(f, " {arrow} {other}")?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TextEdit
// ---------------------------------------------------------------------------

/// A positional replacement: `deleted` removed and `inserted` added at `offset`.
///
/// Offsets count characters (Unicode scalar values) from the start of the file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    /// Character offset where the edit starts.
    pub offset: usize,
    /// Text inserted at `offset` (may be empty).
    pub inserted: String,
    /// Text removed at `offset` (may be empty).
    pub deleted: String,
    /// How the edit was performed.
    pub subtype: EditKind,
}

impl TextEdit {
    /// A plain typing edit.
    pub fn new(offset: usize, inserted: impl Into<String>, deleted: impl Into<String>) -> Self {
        Self {
            offset,
            inserted: inserted.into(),
            deleted: deleted.into(),
            subtype: EditKind::Edit,
        }
    }

    /// Same edit, tagged with a different subtype.
    #[must_use]
    pub const fn with_subtype(mut self, subtype: EditKind) -> Self {
        self.subtype = subtype;
        self
    }
}

impl fmt::Display for TextEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @{}", self.subtype.label(), self.offset)?;
        if !self.inserted.is_empty() {
            write!(f, " +{:?}", self.inserted)?;
        }
        if !self.deleted.is_empty() {
            write!(f, " -{:?}", self.deleted)?;
        }
        Ok(())
    }
}

/// How a text edit was performed.
///
/// Replay treats all subtypes alike: the recorded insert/delete pair already
/// is the net change, including for undo and redo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    /// Typing or any other direct edit.
    #[default]
    Edit,
    /// Cut to clipboard.
    Cut,
    /// Paste from clipboard.
    Paste,
    /// Undo of a previous edit.
    Undo,
    /// Redo of an undone edit.
    Redo,
}

impl EditKind {
    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Cut => "cut",
            Self::Paste => "paste",
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

// ---------------------------------------------------------------------------
// File lifecycle
// ---------------------------------------------------------------------------

/// A file lifecycle event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    /// The file was opened in an editor.
    Open,
    /// The editor holding the file became active.
    Activate,
    /// The file was saved.
    Save,
    /// The editor holding the file was closed.
    Close,
}

impl FileAction {
    /// Return `true` if this event must carry a full-text snapshot.
    #[must_use]
    pub const fn requires_snapshot(self) -> bool {
        !matches!(self, Self::Activate)
    }

    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Activate => "activate",
            Self::Save => "save",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Resource changes
// ---------------------------------------------------------------------------

/// A structural change to a project, package or file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// What kind of resource changed.
    pub target: ResourceTarget,
    /// What happened to it.
    pub change: ChangeKind,
    /// The counterpart path of a move or rename; absent otherwise.
    pub identical_path: Option<String>,
    /// Full text after the change, for added or changed files.
    pub snapshot: Option<String>,
    /// Which end of a move/rename this record was captured on.
    #[serde(default)]
    pub side: MoveSide,
}

impl ResourceChange {
    /// A change without a counterpart path.
    #[must_use]
    pub const fn new(target: ResourceTarget, change: ChangeKind, snapshot: Option<String>) -> Self {
        Self {
            target,
            change,
            identical_path: None,
            snapshot,
            side: MoveSide::Destination,
        }
    }

    /// A move or rename of a file, recorded on the destination: the
    /// operation's path is the new location and `from` is the old one.
    pub fn moved_from(change: ChangeKind, from: impl Into<String>) -> Self {
        Self {
            target: ResourceTarget::File,
            change,
            identical_path: Some(from.into()),
            snapshot: None,
            side: MoveSide::Destination,
        }
    }

    /// A move or rename of a file, recorded on the origin: the operation's
    /// path is the old location and `to` is the new one.
    pub fn moved_to(change: ChangeKind, to: impl Into<String>) -> Self {
        Self {
            target: ResourceTarget::File,
            change,
            identical_path: Some(to.into()),
            snapshot: None,
            side: MoveSide::Origin,
        }
    }
}

/// The kind of resource a [`ResourceChange`] applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTarget {
    /// A whole project.
    Project,
    /// A package (source directory).
    Package,
    /// A single source file.
    File,
}

impl ResourceTarget {
    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Package => "package",
            Self::File => "file",
        }
    }
}

/// What happened to a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Created.
    Added,
    /// Deleted.
    Removed,
    /// Moved to another container, same name.
    Moved,
    /// Renamed.
    Renamed,
    /// Content changed outside an editor.
    Changed,
}

impl ChangeKind {
    /// Return `true` for `Moved` and `Renamed`.
    #[must_use]
    pub const fn is_move(self) -> bool {
        matches!(self, Self::Moved | Self::Renamed)
    }

    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Moved => "moved",
            Self::Renamed => "renamed",
            Self::Changed => "changed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The end of a move/rename a resource record was captured on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveSide {
    /// Recorded on the old location; `identical_path` is the new one.
    Origin,
    /// Recorded on the new location; `identical_path` is the old one.
    #[default]
    Destination,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
