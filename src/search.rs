// k-mer search engine: cold backward search, kLCP rolling extension, and
// the per-read window walk with the skip-after-fail heuristic.
//
// The query window is scanned left to right; because the index is over the
// reversed bidirectional text, the backward-search update per symbol is the
// classical one and the resulting interval is the SA interval of the window
// itself in reference coordinates (see index.rs for the mapping back).

use crate::bwt::Bwt;
use crate::klcp::Klcp;

/// Inclusive SA row interval; empty iff k > l.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaInterval {
    pub k: u64,
    pub l: u64,
}

impl SaInterval {
    pub const EMPTY: SaInterval = SaInterval { k: 1, l: 0 };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.k > self.l
    }

    /// Number of occurrences the interval covers.
    #[inline]
    pub fn width(&self) -> u64 {
        if self.is_empty() { 0 } else { self.l - self.k + 1 }
    }
}

/// Full backward search of one window starting from the whole SA range.
/// Returns the interval and the number of symbols consumed before the
/// search failed or finished (an ambiguous symbol fails without consuming).
pub fn cold_search(bwt: &Bwt, window: &[u8]) -> (SaInterval, usize) {
    let mut k = 0u64;
    let mut l = bwt.seq_len;
    for (i, &c) in window.iter().enumerate() {
        if c > 3 {
            return (SaInterval::EMPTY, i);
        }
        let (ok, ol) = bwt.range_rank(k, l, c);
        k = bwt.l2[c as usize] + ok + 1;
        l = bwt.l2[c as usize] + ol;
        if k > l {
            return (SaInterval::EMPTY, i + 1);
        }
    }
    (SaInterval { k, l }, window.len())
}

/// Slide the window one position: drop its leftmost symbol, append c.
///
/// The previous interval is widened to its run in the kLCP bitvector,
/// which is exactly the SA range of the (k-1)-symbol overlap the two
/// windows share; one backward-search step then appends the new symbol.
/// The result is bit-for-bit what cold_search would produce for the new
/// window, in two rank queries instead of k.
pub fn rolling_extend(bwt: &Bwt, klcp: &Klcp, prev: SaInterval, c: u8) -> SaInterval {
    debug_assert!(!prev.is_empty());
    if c > 3 {
        return SaInterval::EMPTY;
    }
    let wk = klcp.decrease_k(prev.k);
    let wl = klcp.increase_l(prev.l);
    let (ok, ol) = bwt.range_rank(wk, wl, c);
    let k = bwt.l2[c as usize] + ok + 1;
    let l = bwt.l2[c as usize] + ol;
    if k > l {
        return SaInterval::EMPTY;
    }
    SaInterval { k, l }
}

/// Walk every length-k_len window of a read in increasing start order,
/// calling emit exactly once per window. Rolling extension is used whenever
/// a kLCP is supplied and the previous window matched; anything else
/// (including an ambiguous symbol entering the window) cold-starts.
///
/// With skip_after_fail, the first failing window after a match advances
/// the start by k_len - 2 positions; the skipped windows still emit (as
/// empty) so output stays aligned one line per window. Later failures in
/// the same streak advance by one.
pub fn scan_read<F>(
    bwt: &Bwt,
    klcp: Option<&Klcp>,
    seq: &[u8],
    k_len: usize,
    skip_after_fail: bool,
    mut emit: F,
) where
    F: FnMut(usize, SaInterval),
{
    debug_assert!(klcp.map_or(true, |klcp| klcp.k as usize == k_len));
    if k_len == 0 || seq.len() < k_len {
        return;
    }
    let last = seq.len() - k_len;
    let mut prev = SaInterval::EMPTY;
    let mut start = 0usize;
    let mut had_hit = false;
    let mut zero_streak = 0usize;

    while start <= last {
        let itv = match klcp {
            Some(klcp) if start > 0 && !prev.is_empty() => {
                rolling_extend(bwt, klcp, prev, seq[start + k_len - 1])
            }
            _ => cold_search(bwt, &seq[start..start + k_len]).0,
        };
        emit(start, itv);
        prev = itv;

        if skip_after_fail {
            if !itv.is_empty() {
                had_hit = true;
                zero_streak = 0;
            } else if had_hit {
                if zero_streak == 0 {
                    let jump = k_len.saturating_sub(2);
                    for skipped in start + 1..=(start + jump).min(last) {
                        emit(skipped, SaInterval::EMPTY);
                    }
                    zero_streak = jump;
                    start += jump;
                } else {
                    zero_streak += 1;
                }
            }
        }
        start += 1;
    }
}
