// FASTQ read input using bio::io::fastq, with gzip auto-detection by file
// extension. Sequences are decoded to 2-bit base codes (4 = ambiguous) and
// optionally quality-trimmed before they reach the search engine.

use crate::reftable::NST_NT4_TABLE;
use bio::io::fastq;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// One batch of decoded reads.
pub struct ReadBatch {
    pub names: Vec<String>,
    pub seqs: Vec<Vec<u8>>,
}

impl ReadBatch {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            seqs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ReadBatch {
    fn default() -> Self {
        Self::new()
    }
}

const MIN_READ_LEN: usize = 35;

/// Length to keep after BWA-style 3'-end quality trimming. Qualities are
/// Phred+33; a threshold of 0 disables trimming, and reads never trim below
/// MIN_READ_LEN bases.
pub fn trimmed_len(trim_qual: u8, qual: &[u8], len: usize) -> usize {
    if trim_qual < 1 || qual.len() != len || len < MIN_READ_LEN {
        return len;
    }
    let mut s = 0i32;
    let mut max = 0i32;
    let mut max_l = len - 1;
    let mut l = len as i64 - 1;
    while l >= MIN_READ_LEN as i64 - 1 {
        s += trim_qual as i32 - (qual[l as usize] as i32 - 33);
        if s < 0 {
            break;
        }
        if s > max {
            max = s;
            max_l = l as usize;
        }
        l -= 1;
    }
    max_l + 1
}

pub struct FastqReader {
    records: fastq::Records<BufReader<Box<dyn Read>>>,
    trim_qual: u8,
    malformed: u64,
}

impl FastqReader {
    /// Open a FASTQ file, decompressing when the path ends in .gz.
    pub fn open(path: &Path, trim_qual: u8) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Self {
            records: fastq::Reader::new(reader).records(),
            trim_qual,
            malformed: 0,
        })
    }

    /// Pull up to batch_size reads; an empty batch means end of stream.
    /// Malformed records are counted and skipped.
    pub fn read_batch(&mut self, batch_size: usize) -> io::Result<ReadBatch> {
        let mut batch = ReadBatch::new();
        let mut consecutive_errors = 0u32;
        while batch.len() < batch_size {
            match self.records.next() {
                Some(Ok(record)) => {
                    consecutive_errors = 0;
                    let keep = trimmed_len(self.trim_qual, record.qual(), record.seq().len());
                    let seq: Vec<u8> = record.seq()[..keep]
                        .iter()
                        .map(|&b| NST_NT4_TABLE[b as usize])
                        .collect();
                    batch.names.push(record.id().to_string());
                    batch.seqs.push(seq);
                }
                Some(Err(e)) => {
                    self.malformed += 1;
                    consecutive_errors += 1;
                    // a parser stuck at a truncated tail reports the same
                    // error forever without consuming input
                    if consecutive_errors > 100 {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("giving up after {} consecutive malformed records: {}", consecutive_errors, e),
                        ));
                    }
                    log::warn!("skipping malformed read record: {}", e);
                }
                None => break,
            }
        }
        Ok(batch)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }
}
