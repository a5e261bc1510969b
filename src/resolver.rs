// Reference-set resolver: enumerate an SA interval, map every row to the
// reference sequence containing it, and deduplicate per window.

use crate::index::RefIndex;
use crate::search::SaInterval;

/// Per-worker scratch for resolving intervals to reference-id sets. The
/// seen array replaces a hash set: one flag per reference id, zero on entry
/// and on exit of every resolve call (only touched cells are cleared).
pub struct RidResolver {
    seen: Vec<bool>,
    /// Cap on enumerated SA rows per window, 0 = unlimited. Deep repeats
    /// can make an interval cover a large share of the SA; with the cap the
    /// emitted set is a prefix of the full one.
    max_rows: u64,
}

impl RidResolver {
    pub fn new(n_refs: usize, max_rows: u64) -> Self {
        RidResolver {
            seen: vec![false; n_refs],
            max_rows,
        }
    }

    /// Fill rids with the reference ids intersecting the interval, ordered
    /// by first appearance in SA-scan order. Empty intervals produce an
    /// empty set.
    pub fn resolve(
        &mut self,
        idx: &RefIndex,
        itv: SaInterval,
        match_len: usize,
        rids: &mut Vec<i32>,
    ) {
        rids.clear();
        if itv.is_empty() {
            return;
        }
        let mut remaining = if self.max_rows == 0 { u64::MAX } else { self.max_rows };
        for row in itv.k..=itv.l {
            if remaining == 0 {
                log::debug!(
                    "interval of width {} truncated after {} rows",
                    itv.width(),
                    self.max_rows
                );
                break;
            }
            remaining -= 1;
            let pos_f = match idx.sa_to_pos(row, match_len) {
                Some((pos_f, _is_rev)) => pos_f,
                None => continue,
            };
            let rid = match idx.pos2rid(pos_f) {
                Some(rid) => rid,
                None => continue,
            };
            if !self.seen[rid as usize] {
                self.seen[rid as usize] = true;
                rids.push(rid);
            }
        }
        for &rid in rids.iter() {
            self.seen[rid as usize] = false;
        }
    }
}
