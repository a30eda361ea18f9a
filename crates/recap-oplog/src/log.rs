//! The per-session operation log.
//!
//! An [`OperationLog`] is the in-memory, append-only record of one capture
//! session. Capture order is not guaranteed to be chronological (several
//! listeners feed the same log), so the log is [`sort`](OperationLog::sort)ed
//! before it is written out.

use serde::{Deserialize, Serialize};

use crate::types::Operation;

/// An ordered, append-only sequence of operations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationLog {
    ops: Vec<Operation>,
}

impl OperationLog {
    /// An empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Append an operation at the tail.
    pub fn append(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// Stable sort by `(timestamp, sequence)`.
    pub fn sort(&mut self) {
        self.ops.sort_by_key(Operation::order_key);
    }

    /// Return `true` if the log is non-decreasing by `(timestamp, sequence)`.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.ops
            .windows(2)
            .all(|w| w[0].order_key() <= w[1].order_key())
    }

    /// Drop every operation. Copies already written to disk are unaffected.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Return `true` if the log holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operation at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Operation> {
        self.ops.get(index)
    }

    /// The most recently appended operation.
    #[must_use]
    pub fn last(&self) -> Option<&Operation> {
        self.ops.last()
    }

    /// Iterate in log order.
    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.ops.iter()
    }

    /// All operations as a slice.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Consume the log, returning its operations.
    #[must_use]
    pub fn into_operations(self) -> Vec<Operation> {
        self.ops
    }
}

impl From<Vec<Operation>> for OperationLog {
    fn from(ops: Vec<Operation>) -> Self {
        Self { ops }
    }
}

impl FromIterator<Operation> for OperationLog {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

impl Extend<Operation> for OperationLog {
    fn extend<I: IntoIterator<Item = Operation>>(&mut self, iter: I) {
        self.ops.extend(iter);
    }
}

impl<'a> IntoIterator for &'a OperationLog {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl IntoIterator for OperationLog {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OpKind, TextEdit};

    fn op(ts: u64, seq: u32, marker: &str) -> Operation {
        Operation::new(
            ts,
            seq,
            Some("/P/src/A.java".to_owned()),
            "alice",
            OpKind::TextEdit(TextEdit::new(0, marker, "")),
        )
    }

    #[test]
    fn append_and_random_access() {
        let mut log = OperationLog::new();
        assert!(log.is_empty());
        log.append(op(2, 0, "a"));
        log.append(op(1, 0, "b"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.get(1), Some(&op(1, 0, "b")));
        assert_eq!(log.last(), Some(&op(1, 0, "b")));
        assert!(log.get(2).is_none());
    }

    #[test]
    fn sort_orders_by_timestamp_then_sequence() {
        let mut log: OperationLog = vec![op(5, 1, "c"), op(3, 0, "a"), op(5, 0, "b")]
            .into_iter()
            .collect();
        assert!(!log.is_sorted());
        log.sort();
        assert!(log.is_sorted());
        let markers: Vec<_> = log.iter().map(|o| o.order_key()).collect();
        assert_eq!(markers, vec![(3, 0), (5, 0), (5, 1)]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut log = OperationLog::from(vec![op(5, 0, "first"), op(1, 0, "x"), op(5, 0, "second")]);
        log.sort();
        assert_eq!(log.get(1), Some(&op(5, 0, "first")));
        assert_eq!(log.get(2), Some(&op(5, 0, "second")));
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = OperationLog::from(vec![op(1, 0, "a")]);
        let flushed = log.clone();
        log.clear();
        assert!(log.is_empty());
        assert_eq!(flushed.len(), 1);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::types::{OpKind, TextEdit};
    use proptest::prelude::*;

    fn arb_op() -> impl Strategy<Value = Operation> {
        (0u64..50, 0u32..4, "[a-z]{0,3}").prop_map(|(ts, seq, text)| {
            Operation::new(ts, seq, None, "p", OpKind::TextEdit(TextEdit::new(0, text, "")))
        })
    }

    proptest! {
        #[test]
        fn prop_sorted_log_is_non_decreasing(ops in prop::collection::vec(arb_op(), 0..40)) {
            let mut log = OperationLog::from(ops.clone());
            log.sort();
            prop_assert!(log.is_sorted());
            prop_assert_eq!(log.len(), ops.len());
            for pair in log.operations().windows(2) {
                prop_assert!(pair[0].order_key() <= pair[1].order_key());
            }
        }

        #[test]
        fn prop_sort_is_idempotent(ops in prop::collection::vec(arb_op(), 0..40)) {
            let mut once = OperationLog::from(ops);
            once.sort();
            let mut twice = once.clone();
            twice.sort();
            prop_assert_eq!(once, twice);
        }
    }
}
