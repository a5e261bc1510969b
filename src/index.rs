// Combined index handle: the BWT machinery plus the reference-name table.
// All contact with the on-disk index formats goes through here, so the
// search and resolver code never sees a file layout.

use crate::bwt::Bwt;
use crate::reftable::RefTable;
use std::io;
use std::path::Path;

pub struct RefIndex {
    pub bwt: Bwt,
    pub refs: RefTable,
}

impl RefIndex {
    pub fn load(prefix: &Path) -> io::Result<Self> {
        let refs = RefTable::restore(prefix)?;
        let bwt = Bwt::load(prefix)?;
        if bwt.seq_len != refs.l_pac * 2 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "index text length {} does not match reference length {} (both strands)",
                    bwt.seq_len,
                    refs.l_pac * 2
                ),
            ));
        }
        log::info!(
            "loaded index: {} sequences, {} bp",
            refs.n_seqs,
            refs.l_pac
        );
        Ok(RefIndex { bwt, refs })
    }

    pub fn n_refs(&self) -> usize {
        self.refs.n_seqs as usize
    }

    /// Map an SA row of a match of length match_len to a forward-strand text
    /// position. The index is over the reversed bidirectional text, so the
    /// suffix position q corresponds to a match starting at seq_len - q -
    /// match_len; matches in the reverse-complement half are folded back
    /// onto the forward strand.
    pub fn sa_to_pos(&self, row: u64, match_len: usize) -> Option<(u64, bool)> {
        let seq_len = self.bwt.seq_len;
        let len = match_len as u64;
        let q = self.bwt.sa(row);
        if q + len > seq_len {
            // the suffix at this row is shorter than the match
            return None;
        }
        let p = seq_len - q - len;
        if p >= self.refs.l_pac {
            Some((seq_len - p - len, true))
        } else {
            Some((p, false))
        }
    }

    pub fn pos2rid(&self, pos_f: u64) -> Option<i32> {
        self.refs.pos2rid(pos_f)
    }
}
