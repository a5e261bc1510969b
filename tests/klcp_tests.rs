mod common;

use common::build_index;
use kmatch::index::RefIndex;
use kmatch::klcp::{klcp_filename, Klcp};
use rand::prelude::*;
use std::fs;

// bit i of the structure, probed through the run navigation: a clear bit
// is its own run end
fn bit(klcp: &Klcp, i: u64) -> bool {
    klcp.increase_l(i) > i
}

fn naive_lcp(text: &[u8], a: usize, b: usize) -> usize {
    let mut l = 0;
    while a + l < text.len() && b + l < text.len() && text[a + l] == text[b + l] {
        l += 1;
    }
    l
}

#[test]
fn builder_marks_exactly_the_overlapping_pairs() {
    let mut rng = StdRng::seed_from_u64(21);
    let seq: String = (0..500).map(|_| *b"ACGT".choose(&mut rng).unwrap() as char).collect();
    let dir = tempfile::tempdir().unwrap();
    let built = build_index(dir.path(), "idx", &[("chr", &seq)], 8);
    let idx = RefIndex::load(&built.prefix).unwrap();

    for k in [2u32, 5, 11] {
        let klcp = Klcp::build(&idx.bwt, &idx.refs, k).unwrap();
        assert_eq!(klcp.n_bits(), idx.bwt.seq_len);
        for i in 0..idx.bwt.seq_len {
            let a = built.sa[i as usize] as usize;
            let b = built.sa[i as usize + 1] as usize;
            let expected = naive_lcp(&built.text, a, b) >= (k - 1) as usize;
            assert_eq!(bit(&klcp, i), expected, "k={} bit {}", k, i);
        }
    }
}

#[test]
fn klcp_roundtrips_through_its_file() {
    let mut rng = StdRng::seed_from_u64(3);
    let seq: String = (0..200).map(|_| *b"ACGT".choose(&mut rng).unwrap() as char).collect();
    let dir = tempfile::tempdir().unwrap();
    let built = build_index(dir.path(), "idx", &[("chr", &seq)], 8);
    let idx = RefIndex::load(&built.prefix).unwrap();

    let k = 7u32;
    let klcp = Klcp::build(&idx.bwt, &idx.refs, k).unwrap();
    let path = klcp_filename(&built.prefix, k);
    klcp.save(&path).unwrap();

    let back = Klcp::restore_for(&built.prefix, k, idx.bwt.seq_len).unwrap();
    assert_eq!(back.k, k);
    assert_eq!(back.n_bits(), klcp.n_bits());
    for i in 0..klcp.n_bits() {
        assert_eq!(bit(&back, i), bit(&klcp, i), "bit {}", i);
    }
}

#[test]
fn mismatched_k_or_length_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let built = build_index(dir.path(), "idx", &[("chr", "ACGTACGTACGTACGT")], 4);
    let idx = RefIndex::load(&built.prefix).unwrap();

    let klcp = Klcp::build(&idx.bwt, &idx.refs, 4).unwrap();
    klcp.save(&klcp_filename(&built.prefix, 4)).unwrap();

    // no file for k=5 at all
    assert!(Klcp::restore_for(&built.prefix, 5, idx.bwt.seq_len).is_err());

    // header k disagreeing with the requested k
    fs::copy(
        klcp_filename(&built.prefix, 4),
        klcp_filename(&built.prefix, 6),
    )
    .unwrap();
    assert!(Klcp::restore_for(&built.prefix, 6, idx.bwt.seq_len).is_err());

    // text length disagreeing with the loaded index
    assert!(Klcp::restore_for(&built.prefix, 4, idx.bwt.seq_len + 64).is_err());

    // and the matching combination loads
    assert!(Klcp::restore_for(&built.prefix, 4, idx.bwt.seq_len).is_ok());
}

#[test]
fn corrupt_magic_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let built = build_index(dir.path(), "idx", &[("chr", "ACGTACGTACGTACGT")], 4);
    let idx = RefIndex::load(&built.prefix).unwrap();

    let klcp = Klcp::build(&idx.bwt, &idx.refs, 3).unwrap();
    let path = klcp_filename(&built.prefix, 3);
    klcp.save(&path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes[0] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();
    assert!(Klcp::restore(&path).is_err());
}
