mod common;

use common::codes;
use flate2::write::GzEncoder;
use flate2::Compression;
use kmatch::bam_reader::{BamReader, SELECT_READ1, SELECT_SINGLE};
use kmatch::fastq_reader::FastqReader;
use noodles_bgzf as bgzf;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[test]
fn fastq_batches_decode_to_base_codes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reads.fq");
    std::fs::write(&path, "@a\nACGTN\n+\nIIIII\n@b desc\nttgca\n+\nIIIII\n").unwrap();

    let mut reader = FastqReader::open(&path, 0).unwrap();
    let batch = reader.read_batch(10).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.names, vec!["a", "b"]);
    assert_eq!(batch.seqs[0], codes("ACGTN"));
    assert_eq!(batch.seqs[1], codes("TTGCA")); // lower case decodes too
    assert!(reader.read_batch(10).unwrap().is_empty());
}

#[test]
fn gzipped_fastq_is_detected_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reads.fq.gz");
    let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    enc.write_all(b"@a\nACGT\n+\nIIII\n").unwrap();
    enc.finish().unwrap();

    let mut reader = FastqReader::open(&path, 0).unwrap();
    let batch = reader.read_batch(10).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.seqs[0], codes("ACGT"));
}

#[test]
fn fastq_batch_size_is_respected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reads.fq");
    let mut content = String::new();
    for i in 0..5 {
        content.push_str(&format!("@r{}\nACGT\n+\nIIII\n", i));
    }
    std::fs::write(&path, content).unwrap();

    let mut reader = FastqReader::open(&path, 0).unwrap();
    assert_eq!(reader.read_batch(2).unwrap().len(), 2);
    assert_eq!(reader.read_batch(2).unwrap().len(), 2);
    assert_eq!(reader.read_batch(2).unwrap().len(), 1);
    assert!(reader.read_batch(2).unwrap().is_empty());
}

fn nib(c: u8) -> u8 {
    match c {
        b'A' => 1,
        b'C' => 2,
        b'G' => 4,
        b'T' => 8,
        _ => 15,
    }
}

fn bam_record(name: &str, seq: &str, flag: u16) -> Vec<u8> {
    let mut rec = Vec::new();
    rec.extend((-1i32).to_le_bytes()); // ref_id
    rec.extend((-1i32).to_le_bytes()); // pos
    rec.push((name.len() + 1) as u8);
    rec.push(0); // mapq
    rec.extend(0u16.to_le_bytes()); // bin
    rec.extend(0u16.to_le_bytes()); // n_cigar_op
    rec.extend(flag.to_le_bytes());
    rec.extend((seq.len() as i32).to_le_bytes());
    rec.extend((-1i32).to_le_bytes()); // next_ref_id
    rec.extend((-1i32).to_le_bytes()); // next_pos
    rec.extend(0i32.to_le_bytes()); // tlen
    rec.extend(name.as_bytes());
    rec.push(0);
    for pair in seq.as_bytes().chunks(2) {
        let hi = nib(pair[0]);
        let lo = if pair.len() > 1 { nib(pair[1]) } else { 0 };
        rec.push(hi << 4 | lo);
    }
    rec.extend(std::iter::repeat(30u8).take(seq.len()));
    rec
}

fn write_bam(path: &Path, records: &[Vec<u8>]) {
    let mut writer = bgzf::Writer::new(File::create(path).unwrap());
    writer.write_all(b"BAM\x01").unwrap();
    writer.write_all(&0i32.to_le_bytes()).unwrap(); // l_text
    writer.write_all(&0i32.to_le_bytes()).unwrap(); // n_ref
    for rec in records {
        writer.write_all(&(rec.len() as i32).to_le_bytes()).unwrap();
        writer.write_all(rec).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn bam_records_decode_and_filter_on_pairing_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reads.bam");
    write_bam(
        &path,
        &[
            bam_record("s1", "ACGTN", 0),
            bam_record("p1", "GGGG", 0x1 | 0x40),
            bam_record("p2", "CCCC", 0x1 | 0x80),
        ],
    );

    // everything
    let mut all = BamReader::open(&path, 0, 0).unwrap();
    let batch = all.read_batch(10).unwrap();
    assert_eq!(batch.names, vec!["s1", "p1", "p2"]);
    assert_eq!(batch.seqs[0], codes("ACGTN"));
    assert_eq!(batch.seqs[1], codes("GGGG"));

    // single-end only
    let mut se = BamReader::open(&path, SELECT_SINGLE, 0).unwrap();
    let batch = se.read_batch(10).unwrap();
    assert_eq!(batch.names, vec!["s1"]);

    // first of pair only
    let mut r1 = BamReader::open(&path, SELECT_READ1, 0).unwrap();
    let batch = r1.read_batch(10).unwrap();
    assert_eq!(batch.names, vec!["p1"]);
}

#[test]
fn reverse_strand_bam_records_are_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reads.bam");
    write_bam(&path, &[bam_record("r", "AACG", 0x10)]);

    let mut reader = BamReader::open(&path, 0, 0).unwrap();
    let batch = reader.read_batch(10).unwrap();
    assert_eq!(batch.len(), 1);
    // stored AACG on the reverse strand reads back as its reverse complement
    assert_eq!(batch.seqs[0], codes("CGTT"));
}

#[test]
fn non_bam_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reads.bam");
    let mut writer = bgzf::Writer::new(File::create(&path).unwrap());
    writer.write_all(b"not a bam").unwrap();
    writer.finish().unwrap();
    assert!(BamReader::open(&path, 0, 0).is_err());
}
