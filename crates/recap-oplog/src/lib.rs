//! Edit operation model, session log, and durable log codec.
//!
//! This is the leaf crate of recap. It knows nothing about directories,
//! repositories or replay; it defines what an edit history *is*:
//!
//! - [`types`]: [`Operation`] and the [`OpKind`] variants, ordering and identity
//! - [`log`]: [`OperationLog`], the append-only per-session container
//! - [`codec`]: lossless conversion to and from the durable JSON document
//! - [`error`]: [`ModelError`] and [`CodecError`]

pub mod codec;
pub mod error;
pub mod log;
pub mod types;

pub use error::{CodecError, ModelError};
pub use log::OperationLog;
pub use types::{
    ChangeKind, EditKind, FileAction, MoveSide, OpKey, OpKind, Operation, ResourceChange,
    ResourceTarget, TextEdit,
};
