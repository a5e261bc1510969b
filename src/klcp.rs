// kLCP bitvector for k-mer windows of length k: bit i is 1 iff the suffixes
// at SA rows i and i+1 share a prefix of length >= k-1. Maximal runs of
// 1-bits therefore delimit the SA intervals of (k-1)-length strings, and
// widening a window's interval to its run yields exactly the suffixes that
// share the (k-1)-symbol overlap between one window and the next. That is
// what lets the search slide the window with a single rank step: widen,
// then backward-search the one new symbol. Marking >= k instead would lose
// every k-mer whose (k+1)-length bridge with the previous window is absent
// from the text.

use crate::bitvec::Bitvec;
use crate::bwt::Bwt;
use crate::reftable::{pac_base, with_suffix, RefTable};
use crate::utils::{BinaryRead, BinaryWrite};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const KLCP_MAGIC: &[u8; 4] = b"KLCP";
pub const KLCP_VERSION: u32 = 1;

pub struct Klcp {
    pub k: u32,
    bits: Bitvec,
}

/// `<prefix>.<k>.bit.klcp`
pub fn klcp_filename(prefix: &Path, k: u32) -> PathBuf {
    with_suffix(prefix, &format!(".{}.bit.klcp", k))
}

impl Klcp {
    pub fn n_bits(&self) -> u64 {
        self.bits.n_bits()
    }

    /// Left end of the run of 1-bits containing row i: the largest j <= i
    /// with j = 0 or bit j-1 clear.
    #[inline]
    pub fn decrease_k(&self, i: u64) -> u64 {
        if i == 0 {
            return 0;
        }
        match self.bits.prev_zero(i - 1) {
            Some(z) => z + 1,
            None => 0,
        }
    }

    /// Right end of the run of 1-bits containing row i: the smallest j >= i
    /// with bit j clear (bits past the end read as clear).
    #[inline]
    pub fn increase_l(&self, i: u64) -> u64 {
        self.bits.next_zero(i)
    }

    /// Offline construction against a loaded index, for k-mer windows of
    /// length k: for every adjacent SA row pair, recover both suffix
    /// positions through the sampled SA and compare at most k-1 symbols of
    /// the text. The text is never materialised; a symbol is one access
    /// into the packed forward reference (the indexed text is
    /// complement(P) ++ reverse(P)).
    pub fn build(bwt: &Bwt, refs: &RefTable, k: u32) -> io::Result<Klcp> {
        if k == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "k-mer length must be positive",
            ));
        }
        let pac = refs.load_pac()?;
        let l_pac = refs.l_pac;
        let seq_len = bwt.seq_len;
        let text = |q: u64| -> u8 {
            if q < l_pac {
                3 - pac_base(&pac, q)
            } else {
                pac_base(&pac, seq_len - 1 - q)
            }
        };

        let limit = (k - 1) as u64;
        let mut bits = Bitvec::new(seq_len);
        let mut prev_pos = bwt.sa(0);
        for i in 0..seq_len {
            let a = prev_pos;
            let b = bwt.sa(i + 1);
            prev_pos = b;
            if a + limit > seq_len || b + limit > seq_len {
                continue; // one suffix is shorter than k-1
            }
            let mut shared = true;
            for j in 0..limit {
                if text(a + j) != text(b + j) {
                    shared = false;
                    break;
                }
            }
            if shared {
                bits.set(i);
            }
        }
        bits.index();
        log::info!(
            "built kLCP for k={}: {} of {} bits set",
            k,
            bits.count_ones(),
            seq_len
        );
        Ok(Klcp { k, bits })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(KLCP_MAGIC)?;
        file.write_u32_le(KLCP_VERSION)?;
        file.write_u32_le(self.k)?;
        file.write_u64_le(self.bits.n_bits())?;
        self.bits.write_words(&mut file)?;
        file.flush()
    }

    pub fn restore(path: &Path) -> io::Result<Klcp> {
        let mut file = BufReader::new(File::open(path)?);
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != KLCP_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "kLCP file has wrong magic",
            ));
        }
        let version = file.read_u32_le()?;
        if version != KLCP_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("kLCP file has unsupported version {}", version),
            ));
        }
        let k = file.read_u32_le()?;
        let n_bits = file.read_u64_le()?;
        let bits = Bitvec::read_words(&mut file, n_bits)?;
        Ok(Klcp { k, bits })
    }

    /// Load the kLCP for the given index prefix and reject any disagreement
    /// with the runtime k or the loaded text length.
    pub fn restore_for(prefix: &Path, k: u32, seq_len: u64) -> io::Result<Klcp> {
        let path = klcp_filename(prefix, k);
        let klcp = Self::restore(&path)?;
        if klcp.k != k {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("kLCP file {} was built for k={}, not k={}", path.display(), klcp.k, k),
            ));
        }
        if klcp.bits.n_bits() != seq_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "kLCP file {} covers {} rows but the index text has {}",
                    path.display(),
                    klcp.bits.n_bits(),
                    seq_len
                ),
            ));
        }
        Ok(klcp)
    }

    #[cfg(test)]
    pub(crate) fn from_bits(k: u32, bits: Bitvec) -> Klcp {
        Klcp { k, bits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn klcp_from(pattern: &[u8]) -> Klcp {
        let mut bits = Bitvec::new(pattern.len() as u64);
        for (i, &b) in pattern.iter().enumerate() {
            if b == 1 {
                bits.set(i as u64);
            }
        }
        bits.index();
        Klcp::from_bits(3, bits)
    }

    #[test]
    fn run_navigation() {
        //            0  1  2  3  4  5  6  7
        let klcp = klcp_from(&[0, 1, 1, 0, 0, 1, 0, 1]);
        // run [1, 3] (bits 1 and 2 link rows 1-2-3)
        assert_eq!(klcp.decrease_k(1), 1);
        assert_eq!(klcp.decrease_k(2), 1);
        assert_eq!(klcp.decrease_k(3), 1);
        assert_eq!(klcp.increase_l(1), 3);
        assert_eq!(klcp.increase_l(2), 3);
        assert_eq!(klcp.increase_l(3), 3);
        // singleton row 4
        assert_eq!(klcp.decrease_k(4), 4);
        assert_eq!(klcp.increase_l(4), 4);
        // run [5, 6]
        assert_eq!(klcp.decrease_k(6), 5);
        assert_eq!(klcp.increase_l(5), 6);
        // trailing set bit links rows 7 and 8; bit 8 is past the end and reads 0
        assert_eq!(klcp.decrease_k(8), 7);
        assert_eq!(klcp.increase_l(7), 8);
        assert_eq!(klcp.increase_l(8), 8);
        // left edge
        assert_eq!(klcp.decrease_k(0), 0);
    }
}
