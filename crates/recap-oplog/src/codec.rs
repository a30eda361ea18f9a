//! Durable representation of an [`OperationLog`].
//!
//! A log is stored as a tree of attribute-value records, i.e. a JSON document:
//!
//! ```text
//! {
//!   "format": "recap-oplog",
//!   "version": 1,
//!   "operations": [
//!     { "timestamp": 1700000000000, "sequence": 0, "path": "/P/src/A.java",
//!       "author": "alice", "kind": { "type": "file", "action": "open", "snapshot": "…" } },
//!     …
//!   ]
//! }
//! ```
//!
//! Encoding is lossless: `decode(&encode(&log)) == Some(log)` for every
//! variant. Decoding never panics; a document that is not a valid log
//! yields `None` from [`decode`] (or the reason from [`try_decode`]), which
//! callers treat as a per-file, recoverable failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;
use crate::log::OperationLog;
use crate::types::Operation;

/// Value of the `format` field of every log document.
pub const FORMAT: &str = "recap-oplog";

/// Document version written by this build.
pub const VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    format: &'a str,
    version: u32,
    operations: &'a [Operation],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    format: String,
    version: u32,
    operations: Vec<Operation>,
}

/// Encode a log into its document tree.
#[must_use]
pub fn encode(log: &OperationLog) -> Value {
    let doc = DocumentRef {
        format: FORMAT,
        version: VERSION,
        operations: log.operations(),
    };
    // Every field is a string, integer, option, or enum: serializing to a
    // `Value` cannot fail.
    serde_json::to_value(doc).unwrap_or(Value::Null)
}

/// Decode a document tree into a log, or `None` if it is not a valid log.
#[must_use]
pub fn decode(document: &Value) -> Option<OperationLog> {
    try_decode(document).ok()
}

/// Decode a document tree into a log, reporting why it failed.
///
/// # Errors
/// Returns [`CodecError`] if the document has the wrong shape, format or
/// version, or holds an operation that breaks a model rule.
pub fn try_decode(document: &Value) -> Result<OperationLog, CodecError> {
    let doc = Document::deserialize(document)?;
    if doc.format != FORMAT {
        return Err(CodecError::WrongFormat { found: doc.format });
    }
    if doc.version != VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: doc.version,
            supported: VERSION,
        });
    }
    for (index, op) in doc.operations.iter().enumerate() {
        op.validate()
            .map_err(|source| CodecError::InvalidOperation { index, source })?;
    }
    Ok(OperationLog::from(doc.operations))
}

/// Encode a log as pretty-printed UTF-8 JSON bytes.
///
/// # Errors
/// Returns an error if serialization fails (shouldn't happen for valid logs).
pub fn to_bytes(log: &OperationLog) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(&encode(log))
}

/// Parse UTF-8 JSON bytes and decode them.
///
/// # Errors
/// Returns [`CodecError::Malformed`] for bytes that are not JSON, and any
/// [`try_decode`] error otherwise.
pub fn from_bytes(bytes: &[u8]) -> Result<OperationLog, CodecError> {
    let document: Value = serde_json::from_slice(bytes)?;
    try_decode(&document)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
