// Packed bitvector with rank support and nearest-zero scans.
//
// Bits are stored LSB-first inside 64-bit words. Rank uses one precomputed
// count per 512-bit superblock plus an in-word popcount tail. The structure
// is built once (set bits, then index()) and read-only afterwards.

use crate::utils::{BinaryRead, BinaryWrite};
use std::io::{self, Read, Write};

const WORD_BITS: u64 = 64;
const BLOCK_WORDS: usize = 8; // 512-bit superblocks

#[derive(Debug, Clone)]
pub struct Bitvec {
    n_bits: u64,
    words: Vec<u64>,
    blocks: Vec<u64>, // ones in words[0 .. b * BLOCK_WORDS]
}

impl Bitvec {
    pub fn new(n_bits: u64) -> Self {
        let n_words = n_bits.div_ceil(WORD_BITS) as usize;
        Bitvec {
            n_bits,
            words: vec![0u64; n_words],
            blocks: Vec::new(),
        }
    }

    pub fn from_words(words: Vec<u64>, n_bits: u64) -> io::Result<Self> {
        if words.len() as u64 != n_bits.div_ceil(WORD_BITS) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bitvector word count {} does not cover {} bits", words.len(), n_bits),
            ));
        }
        let mut bv = Bitvec {
            n_bits,
            words,
            blocks: Vec::new(),
        };
        // padding bits past n_bits must stay zero for the scans below
        if n_bits % WORD_BITS != 0 {
            if let Some(last) = bv.words.last_mut() {
                *last &= (1u64 << (n_bits % WORD_BITS)) - 1;
            }
        }
        bv.index();
        Ok(bv)
    }

    pub fn n_bits(&self) -> u64 {
        self.n_bits
    }

    pub fn set(&mut self, i: u64) {
        debug_assert!(i < self.n_bits);
        self.words[(i / WORD_BITS) as usize] |= 1u64 << (i % WORD_BITS);
    }

    /// Rebuild the superblock counts. Must be called after the last set()
    /// and before any rank query.
    pub fn index(&mut self) {
        let n_blocks = self.words.len().div_ceil(BLOCK_WORDS);
        self.blocks = Vec::with_capacity(n_blocks + 1);
        let mut ones = 0u64;
        for (w, &word) in self.words.iter().enumerate() {
            if w % BLOCK_WORDS == 0 {
                self.blocks.push(ones);
            }
            ones += word.count_ones() as u64;
        }
        if self.blocks.is_empty() {
            self.blocks.push(0);
        }
    }

    #[inline]
    pub fn is_set(&self, i: u64) -> bool {
        debug_assert!(i < self.n_bits);
        self.words[(i / WORD_BITS) as usize] >> (i % WORD_BITS) & 1 == 1
    }

    /// Number of 1-bits in [0, i], inclusive.
    pub fn rank1(&self, i: u64) -> u64 {
        debug_assert!(i < self.n_bits);
        let w = (i / WORD_BITS) as usize;
        let b = w / BLOCK_WORDS;
        let mut r = self.blocks[b];
        for j in b * BLOCK_WORDS..w {
            r += self.words[j].count_ones() as u64;
        }
        let tail = i % WORD_BITS;
        let mask = if tail == 63 { !0u64 } else { (1u64 << (tail + 1)) - 1 };
        r + (self.words[w] & mask).count_ones() as u64
    }

    pub fn count_ones(&self) -> u64 {
        if self.n_bits == 0 { 0 } else { self.rank1(self.n_bits - 1) }
    }

    /// Position of the nearest 0-bit at or after i. Bits at or past n_bits
    /// read as zero, so the result is at most n_bits.
    pub fn next_zero(&self, i: u64) -> u64 {
        if i >= self.n_bits {
            return i;
        }
        let mut w = (i / WORD_BITS) as usize;
        let mut x = !self.words[w] & (!0u64 << (i % WORD_BITS));
        loop {
            if x != 0 {
                return w as u64 * WORD_BITS + x.trailing_zeros() as u64;
            }
            w += 1;
            if w >= self.words.len() {
                return self.n_bits;
            }
            x = !self.words[w];
        }
    }

    /// Position of the nearest 0-bit at or before i, if any.
    pub fn prev_zero(&self, i: u64) -> Option<u64> {
        debug_assert!(i < self.n_bits);
        let mut w = (i / WORD_BITS) as usize;
        let mut x = !self.words[w] & (!0u64 >> (63 - i % WORD_BITS));
        loop {
            if x != 0 {
                return Some(w as u64 * WORD_BITS + 63 - x.leading_zeros() as u64);
            }
            if w == 0 {
                return None;
            }
            w -= 1;
            x = !self.words[w];
        }
    }

    pub fn write_words<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u64_array_le(&self.words)
    }

    pub fn read_words<R: Read>(input: &mut R, n_bits: u64) -> io::Result<Self> {
        let n_words = n_bits.div_ceil(WORD_BITS) as usize;
        let mut words = Vec::with_capacity(n_words);
        for _ in 0..n_words {
            words.push(input.read_u64_le()?);
        }
        Self::from_words(words, n_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn naive_rank1(bits: &[bool], i: usize) -> u64 {
        bits[..=i].iter().filter(|&&b| b).count() as u64
    }

    fn build(bits: &[bool]) -> Bitvec {
        let mut bv = Bitvec::new(bits.len() as u64);
        for (i, &b) in bits.iter().enumerate() {
            if b {
                bv.set(i as u64);
            }
        }
        bv.index();
        bv
    }

    #[test]
    fn empty_and_all_ones() {
        let bv = build(&[]);
        assert_eq!(bv.count_ones(), 0);
        assert_eq!(bv.next_zero(0), 0);

        let bv = build(&vec![true; 130]);
        assert_eq!(bv.count_ones(), 130);
        assert_eq!(bv.next_zero(0), 130);
        assert_eq!(bv.next_zero(129), 130);
        assert_eq!(bv.prev_zero(129), None);
    }

    #[test]
    fn rank_matches_naive_on_random_bits() {
        let mut rng = StdRng::seed_from_u64(7);
        for &n in &[1usize, 63, 64, 65, 511, 512, 513, 1500] {
            let bits: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.7)).collect();
            let bv = build(&bits);
            for i in 0..n {
                assert_eq!(bv.rank1(i as u64), naive_rank1(&bits, i), "n={} i={}", n, i);
                assert_eq!(bv.is_set(i as u64), bits[i]);
            }
        }
    }

    #[test]
    fn zero_scans_match_naive() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 700usize;
        let bits: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.9)).collect();
        let bv = build(&bits);
        for i in 0..n {
            let naive_next = (i..n).find(|&j| !bits[j]).unwrap_or(n) as u64;
            assert_eq!(bv.next_zero(i as u64), naive_next, "next i={}", i);
            let naive_prev = (0..=i).rev().find(|&j| !bits[j]).map(|j| j as u64);
            assert_eq!(bv.prev_zero(i as u64), naive_prev, "prev i={}", i);
        }
        assert_eq!(bv.next_zero(n as u64), n as u64);
    }

    #[test]
    fn word_roundtrip_clears_padding() {
        let bits = vec![true; 70];
        let bv = build(&bits);
        let mut buf = Vec::new();
        bv.write_words(&mut buf).unwrap();
        // corrupt a padding bit; from_words must clear it
        buf[9] |= 0x80;
        let back = Bitvec::read_words(&mut &buf[..], 70).unwrap();
        assert_eq!(back.count_ones(), 70);
        assert_eq!(back.next_zero(0), 70);
    }
}
