// BWT of the indexed text with occurrence checkpoints and a sampled
// suffix array.
//
// The index is built over the reverse of the bidirectional reference text
// (forward concatenation followed by its reverse complement), so callers
// scan query windows in the natural direction while this module runs
// classical backward search underneath.
//
// SA rows are 0..=seq_len; `primary` is the row whose suffix starts at text
// position 0 (the conceptual BWT holds the sentinel there). The packed BWT
// stores seq_len two-bit symbols with the sentinel removed, and every row
// index is shifted across `primary` before touching the packed data.

use crate::utils::{BinaryRead, BinaryWrite};
use lazy_static::lazy_static;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const BWT_MAGIC: &[u8; 4] = b"KMFM";
pub const SA_MAGIC: &[u8; 4] = b"KMSA";
pub const FORMAT_VERSION: u32 = 1;

const CP_SHIFT: u64 = 6; // occurrence checkpoint every 64 symbols
const CP_MASK: u64 = 63;

/// Occurrence checkpoint: cumulative per-base counts at the block start plus
/// a one-hot encoding of the block for popcount queries.
#[derive(Debug, Clone, Copy)]
pub struct CpOcc {
    pub counts: [u64; 4],
    pub bits: [u64; 4],
}

lazy_static! {
    // mask[y] has the top y bits set
    static ref ONE_HOT_MASK: Vec<u64> = {
        let mut array = vec![0u64; 64];
        let base = 0x8000000000000000u64;
        array[1] = base;
        for i in 2..64 {
            array[i] = (array[i - 1] >> 1) | base;
        }
        array
    };
}

#[derive(Debug, Default)]
pub struct Bwt {
    pub seq_len: u64,
    pub primary: u64,
    /// l2[c] = number of text symbols strictly smaller than c; l2[4] = seq_len.
    pub l2: [u64; 5],
    /// 2-bit packed BWT, sentinel removed; symbol j is byte j/4, low pairs first.
    pub bwt_data: Vec<u8>,
    pub cp_occ: Vec<CpOcc>,
    pub sa_intv: u32,
    pub n_sa: u64,
    pub sa_samples: Vec<u64>,
}

impl Bwt {
    #[inline]
    pub fn base(&self, j: u64) -> u8 {
        (self.bwt_data[(j >> 2) as usize] >> ((j & 3) << 1)) & 3
    }

    /// Rebuild the occurrence checkpoints from the packed BWT. Called once
    /// after load or construction; the structure is read-only afterwards.
    pub fn build_cp_occ(&mut self) {
        let size = ((self.seq_len >> CP_SHIFT) + 1) as usize;
        let mut cp: Vec<CpOcc> = Vec::with_capacity(size);
        cp.push(CpOcc { counts: [0; 4], bits: [0; 4] });

        let mut counts = [0u64; 4];
        let mut block = [0u64; 4];
        for pos in 0..self.seq_len {
            let c = self.base(pos) as usize;
            block[c] |= 1u64 << (63 - (pos & CP_MASK));
            counts[c] += 1;
            if (pos + 1) & CP_MASK == 0 {
                let last = cp.len() - 1;
                cp[last].bits = block;
                cp.push(CpOcc { counts, bits: [0; 4] });
                block = [0u64; 4];
            }
        }
        let last = cp.len() - 1;
        cp[last].bits = block;
        self.cp_occ = cp;
    }

    // count of c in the packed BWT prefix [0, end)
    #[inline]
    fn cp_prefix(&self, end: u64, c: u8) -> u64 {
        let cp = &self.cp_occ[(end >> CP_SHIFT) as usize];
        let y = (end & CP_MASK) as usize;
        cp.counts[c as usize] + (cp.bits[c as usize] & ONE_HOT_MASK[y]).count_ones() as u64
    }

    /// Occurrences of c among conceptual BWT rows [0, i], i in 0..=seq_len.
    #[inline]
    pub fn occ(&self, i: u64, c: u8) -> u64 {
        debug_assert!(i <= self.seq_len);
        let end = i + 1 - (i >= self.primary) as u64;
        self.cp_prefix(end, c)
    }

    /// Paired rank for one backward-search step over the row interval [k, l]:
    /// occurrences of c strictly before row k and up to row l.
    #[inline]
    pub fn range_rank(&self, k: u64, l: u64, c: u8) -> (u64, u64) {
        let ok = if k == 0 { 0 } else { self.occ(k - 1, c) };
        let ol = self.occ(l, c);
        (ok, ol)
    }

    // LF step: row of the text suffix one position to the left
    #[inline]
    fn inv_psi(&self, k: u64) -> u64 {
        if k == self.primary {
            return 0;
        }
        let j = k - (k > self.primary) as u64;
        let c = self.base(j);
        self.l2[c as usize] + self.occ(k, c)
    }

    /// Suffix-array value at row k, via LF walking to the nearest sample.
    pub fn sa(&self, mut k: u64) -> u64 {
        debug_assert!(k <= self.seq_len);
        let mask = self.sa_intv as u64 - 1;
        let mut off = 0u64;
        while k & mask != 0 {
            if k == self.primary {
                // suffix at text position 0; off LF steps were taken to get here
                return off;
            }
            off += 1;
            k = self.inv_psi(k);
        }
        self.sa_samples[(k / self.sa_intv as u64) as usize] + off
    }

    pub fn dump(&self, prefix: &Path) -> io::Result<()> {
        let mut bwt_file =
            BufWriter::new(File::create(crate::reftable::with_suffix(prefix, ".bwt"))?);
        bwt_file.write_all(BWT_MAGIC)?;
        bwt_file.write_u32_le(FORMAT_VERSION)?;
        bwt_file.write_u64_le(self.seq_len)?;
        bwt_file.write_u64_le(self.primary)?;
        bwt_file.write_u64_array_le(&self.l2)?;
        bwt_file.write_all(&self.bwt_data)?;
        bwt_file.flush()?;

        let mut sa_file =
            BufWriter::new(File::create(crate::reftable::with_suffix(prefix, ".sa"))?);
        sa_file.write_all(SA_MAGIC)?;
        sa_file.write_u32_le(FORMAT_VERSION)?;
        sa_file.write_u64_le(self.seq_len)?;
        sa_file.write_u32_le(self.sa_intv)?;
        sa_file.write_u64_le(self.n_sa)?;
        sa_file.write_u64_array_le(&self.sa_samples)?;
        sa_file.flush()?;

        Ok(())
    }

    pub fn load(prefix: &Path) -> io::Result<Self> {
        let mut bwt = Bwt::default();

        let mut bwt_file =
            BufReader::new(File::open(crate::reftable::with_suffix(prefix, ".bwt"))?);
        check_header(&mut bwt_file, BWT_MAGIC, ".bwt")?;
        bwt.seq_len = bwt_file.read_u64_le()?;
        bwt.primary = bwt_file.read_u64_le()?;
        for slot in bwt.l2.iter_mut() {
            *slot = bwt_file.read_u64_le()?;
        }
        if bwt.primary > bwt.seq_len || bwt.l2[4] != bwt.seq_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "inconsistent .bwt header",
            ));
        }
        let n_bytes = bwt.seq_len.div_ceil(4) as usize;
        bwt.bwt_data = vec![0u8; n_bytes];
        bwt_file.read_exact(&mut bwt.bwt_data)?;

        let mut sa_file =
            BufReader::new(File::open(crate::reftable::with_suffix(prefix, ".sa"))?);
        check_header(&mut sa_file, SA_MAGIC, ".sa")?;
        let sa_seq_len = sa_file.read_u64_le()?;
        if sa_seq_len != bwt.seq_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(".sa is for a text of length {}, .bwt has {}", sa_seq_len, bwt.seq_len),
            ));
        }
        bwt.sa_intv = sa_file.read_u32_le()?;
        if bwt.sa_intv == 0 || !bwt.sa_intv.is_power_of_two() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("suffix-array sample interval {} is not a power of two", bwt.sa_intv),
            ));
        }
        bwt.n_sa = sa_file.read_u64_le()?;
        if bwt.n_sa != bwt.seq_len / bwt.sa_intv as u64 + 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "suffix-array sample count disagrees with text length",
            ));
        }
        bwt.sa_samples = Vec::with_capacity(bwt.n_sa as usize);
        for _ in 0..bwt.n_sa {
            bwt.sa_samples.push(sa_file.read_u64_le()?);
        }

        bwt.build_cp_occ();
        log::debug!(
            "loaded BWT: seq_len={}, primary={}, sa_intv={}, n_sa={}",
            bwt.seq_len,
            bwt.primary,
            bwt.sa_intv,
            bwt.n_sa
        );
        Ok(bwt)
    }
}

fn check_header<R: Read>(file: &mut R, magic: &[u8; 4], what: &str) -> io::Result<()> {
    let mut got = [0u8; 4];
    file.read_exact(&mut got)?;
    if &got != magic {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} file has wrong magic", what),
        ));
    }
    let version = file.read_u32_le()?;
    if version != FORMAT_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} file has unsupported version {}", what, version),
        ));
    }
    Ok(())
}
