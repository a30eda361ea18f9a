//! Replay: find the operation nearest a moment and rebuild the text there.
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`latest_operation_before`] / [`earliest_operation_after`] | neighbours of a timestamp |
//! | [`find_focal_index`] | nearest neighbour, ties to the earlier |
//! | [`reconstruct`] | text after a given operation |
//! | [`Timeline`] | focus, stepping and change notification for one file |

pub mod reconstruct;
pub mod search;
pub mod timeline;

pub use reconstruct::{ReplayError, TextBuffer, reconstruct};
pub use search::{earliest_operation_after, find_focal_index, latest_operation_before};
pub use timeline::{FocusChanged, Timeline};
