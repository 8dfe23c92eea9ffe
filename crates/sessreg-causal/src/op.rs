//! Write records and the total order over them.
//!
//! Every accepted write becomes an immutable [`Operation`] stamped with the
//! originating replica's vector clock at the moment of creation. Replicas
//! keep their applied log sorted oldest-first under [`order`]:
//!
//! - causally related operations sort in dominance order (the dominated,
//!   older one first), so the last log entry is always the most recent;
//! - concurrent operations sort by origin id, larger first. Concurrent
//!   operations always come from distinct origins, so this is a strict
//!   total order and the smaller-origin write of a concurrent pair ends up
//!   last, winning the register.
//!
//! [`admissible`] is the one-off admission rule used during gossip merge:
//! an operation may be applied as soon as the current clock covers all of
//! its prerequisites at coordinates other than its own origin, and it is
//! the *next contiguous* write from that origin. Each replica gossips its
//! own writes in order, so any gap in the origin coordinate is on its way
//! in the same push.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sessreg_clock as clock;

use crate::protocol::OpType;

/// A durable record of a single write.
///
/// Two operations are equal iff all four fields match. The vector stored
/// here is an independent copy of the origin's clock; nothing may alias it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OpType,
    pub vc: Vec<u64>,
    pub origin: u64,
    pub data: u64,
}

/// The strict total order over operations (oldest first).
pub fn order(a: &Operation, b: &Operation) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if clock::concurrent(&a.vc, &b.vc) {
        // Concurrent: larger origin id sorts earlier.
        b.origin.cmp(&a.origin)
    } else if clock::dominates(&a.vc, &b.vc) {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// Sort under [`order`] and drop exact duplicates.
pub fn dedup_and_sort(mut ops: Vec<Operation>) -> Vec<Operation> {
    ops.sort_by(order);
    ops.dedup();
    ops
}

/// One-off admission: can `op` be applied directly against clock `cur`?
///
/// Requires `op` to be the next contiguous write from its origin
/// (`op.vc[origin] == cur[origin] + 1`) and `cur` to already cover every
/// other coordinate of `op.vc`.
pub fn admissible(cur: &[u64], op: &Operation) -> bool {
    assert_eq!(cur.len(), op.vc.len(), "vector clocks must have equal length");
    op.vc.iter().enumerate().all(|(i, &entry)| {
        if i as u64 == op.origin {
            entry == cur[i] + 1
        } else {
            cur[i] >= entry
        }
    })
}

/// Pointwise maximum of the clocks in `ops`, or `None` for an empty log.
pub fn max_version(ops: &[Operation]) -> Option<Vec<u64>> {
    if ops.is_empty() {
        return None;
    }
    let clocks: Vec<&[u64]> = ops.iter().map(|op| op.vc.as_slice()).collect();
    Some(clock::max_pointwise(&clocks))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(vc: Vec<u64>, origin: u64, data: u64) -> Operation {
        Operation {
            kind: OpType::Write,
            vc,
            origin,
            data,
        }
    }

    #[test]
    fn related_operations_sort_oldest_first() {
        let older = write(vec![1, 0, 0], 0, 10);
        let newer = write(vec![2, 0, 0], 0, 20);

        assert_eq!(order(&older, &newer), Ordering::Less);
        assert_eq!(order(&newer, &older), Ordering::Greater);

        let sorted = dedup_and_sort(vec![newer.clone(), older.clone()]);
        assert_eq!(sorted, vec![older, newer]);
    }

    #[test]
    fn concurrent_operations_sort_larger_origin_first() {
        let from_zero = write(vec![1, 0, 0], 0, 100);
        let from_one = write(vec![0, 1, 0], 1, 200);

        let sorted = dedup_and_sort(vec![from_zero.clone(), from_one.clone()]);
        assert_eq!(sorted, vec![from_one, from_zero]);

        // The last entry decides the register value.
        assert_eq!(sorted.last().map(|op| op.data), Some(100));
    }

    #[test]
    fn dedup_drops_exact_duplicates_only() {
        let a = write(vec![1, 0], 0, 1);
        let b = write(vec![1, 1], 1, 2);

        let deduped = dedup_and_sort(vec![a.clone(), b.clone(), a.clone(), b.clone()]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped, vec![a, b]);
    }

    #[test]
    fn next_contiguous_write_is_admissible() {
        let cur = vec![0, 0, 0];
        let first = write(vec![1, 0, 0], 0, 1);
        assert!(admissible(&cur, &first));

        let cur = vec![1, 0, 0];
        let second = write(vec![2, 0, 0], 0, 2);
        assert!(admissible(&cur, &second));
    }

    #[test]
    fn skipping_an_origin_write_is_not_admissible() {
        // Two-off in the origin coordinate: must wait for [1,0,0].
        let cur = vec![0, 0, 0];
        let second = write(vec![2, 0, 0], 0, 2);
        assert!(!admissible(&cur, &second));
    }

    #[test]
    fn unmet_foreign_prerequisite_is_not_admissible() {
        // Depends on origin 1's first write, which cur has not seen.
        let cur = vec![1, 0, 0];
        let op = write(vec![2, 1, 0], 0, 3);
        assert!(!admissible(&cur, &op));

        // Once cur covers it, the same op goes through.
        let cur = vec![1, 1, 0];
        assert!(admissible(&cur, &op));
    }

    #[test]
    fn max_version_over_log() {
        let ops = vec![
            write(vec![1, 2, 3], 2, 0),
            write(vec![2, 1, 4], 0, 0),
            write(vec![0, 3, 2], 1, 0),
        ];
        assert_eq!(max_version(&ops), Some(vec![2, 3, 4]));
        assert_eq!(max_version(&[]), None);
    }
}
