//! Neighbour search over a chronologically sorted operation slice.
//!
//! All three searches are binary searches (`partition_point`) and assume
//! `ops` is sorted by timestamp.

use recap_oplog::Operation;

/// Index of the last operation with `timestamp <= t`.
#[must_use]
pub fn latest_operation_before(ops: &[Operation], t: u64) -> Option<usize> {
    ops.partition_point(|op| op.timestamp <= t).checked_sub(1)
}

/// Index of the first operation with `timestamp >= t`.
#[must_use]
pub fn earliest_operation_after(ops: &[Operation], t: u64) -> Option<usize> {
    let i = ops.partition_point(|op| op.timestamp < t);
    (i < ops.len()).then_some(i)
}

/// The operation closest in time to `t`.
///
/// With neighbours on both sides the nearer one wins; a tie goes to the
/// earlier one.
#[must_use]
pub fn find_focal_index(ops: &[Operation], t: u64) -> Option<usize> {
    match (
        latest_operation_before(ops, t),
        earliest_operation_after(ops, t),
    ) {
        (Some(before), Some(after)) => {
            let to_before = t - ops[before].timestamp;
            let to_after = ops[after].timestamp - t;
            Some(if to_before <= to_after { before } else { after })
        }
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use recap_oplog::{OpKind, TextEdit};

    use super::*;

    fn at(timestamps: &[u64]) -> Vec<Operation> {
        timestamps
            .iter()
            .map(|&ts| {
                Operation::new(
                    ts,
                    0,
                    Some("/P/src/A.java".to_owned()),
                    "a",
                    OpKind::TextEdit(TextEdit::new(0, "x", "")),
                )
            })
            .collect()
    }

    #[test]
    fn equidistant_picks_earlier() {
        let ops = at(&[100, 200]);
        assert_eq!(find_focal_index(&ops, 150), Some(0));
        assert_eq!(find_focal_index(&ops, 160), Some(1));
        assert_eq!(find_focal_index(&ops, 140), Some(0));
    }

    #[test]
    fn one_sided_neighbours() {
        let ops = at(&[100, 200]);
        assert_eq!(find_focal_index(&ops, 50), Some(0));
        assert_eq!(find_focal_index(&ops, 500), Some(1));
        assert_eq!(latest_operation_before(&ops, 50), None);
        assert_eq!(earliest_operation_after(&ops, 500), None);
    }

    #[test]
    fn empty_slice_has_no_focus() {
        assert_eq!(find_focal_index(&[], 10), None);
    }

    #[test]
    fn exact_hits_are_inclusive() {
        let ops = at(&[100, 100, 200]);
        assert_eq!(latest_operation_before(&ops, 100), Some(1));
        assert_eq!(earliest_operation_after(&ops, 100), Some(0));
        assert_eq!(earliest_operation_after(&ops, 200), Some(2));
    }

    proptest! {
        #[test]
        fn focal_is_a_nearest_operation(
            mut stamps in proptest::collection::vec(0u64..10_000, 1..40),
            t in 0u64..10_000,
        ) {
            stamps.sort_unstable();
            let ops = at(&stamps);
            let focal = find_focal_index(&ops, t).unwrap();
            let best = stamps.iter().map(|&s| s.abs_diff(t)).min().unwrap();
            prop_assert_eq!(ops[focal].timestamp.abs_diff(t), best);
        }

        #[test]
        fn neighbours_bracket_t(
            mut stamps in proptest::collection::vec(0u64..1_000, 0..40),
            t in 0u64..1_000,
        ) {
            stamps.sort_unstable();
            let ops = at(&stamps);
            if let Some(b) = latest_operation_before(&ops, t) {
                prop_assert!(ops[b].timestamp <= t);
                prop_assert!(ops.get(b + 1).is_none_or(|next| next.timestamp > t));
            }
            if let Some(a) = earliest_operation_after(&ops, t) {
                prop_assert!(ops[a].timestamp >= t);
                prop_assert!(a == 0 || ops[a - 1].timestamp < t);
            }
        }
    }
}
