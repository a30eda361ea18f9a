//! Error types for the operation model and the log codec.

use thiserror::Error;

use crate::types::{ChangeKind, FileAction};

/// An operation whose payload breaks a per-variant rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Open, Save and Close must carry the full text of the file.
    #[error("{action} operation must carry a snapshot")]
    SnapshotRequired {
        /// The lifecycle event missing its snapshot.
        action: FileAction,
    },

    /// Activate never carries a snapshot.
    #[error("{action} operation must not carry a snapshot")]
    UnexpectedSnapshot {
        /// The lifecycle event that carried one.
        action: FileAction,
    },

    /// Moves and renames must name their counterpart path.
    #[error("{change} resource change must name its counterpart path")]
    MissingIdenticalPath {
        /// The move or rename.
        change: ChangeKind,
    },

    /// Only moves and renames have a counterpart path.
    #[error("{change} resource change must not name a counterpart path")]
    UnexpectedIdenticalPath {
        /// The offending change kind.
        change: ChangeKind,
    },
}

/// Why a durable log document could not be turned back into a log.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bytes are not JSON, or the JSON does not match the document schema.
    #[error("malformed log document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The document is JSON but not a recap operation log.
    #[error("not an operation log (format `{found}`)")]
    WrongFormat {
        /// The `format` field that was found.
        found: String,
    },

    /// The document was written by an incompatible version.
    #[error("unsupported log version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// The version in the document.
        found: u32,
        /// The version this build reads.
        supported: u32,
    },

    /// An operation decoded but violates a model rule.
    #[error("operation {index} is invalid: {source}")]
    InvalidOperation {
        /// Position of the operation in the document.
        index: usize,
        /// The rule that was broken.
        #[source]
        source: ModelError,
    },
}
