// Minimal BAM read input: BGZF-compressed container, records filtered on
// the pairing flags the way the original single/first/second switches work.
// Only the fields the matcher needs are decoded; alignments, CIGARs and
// tags are skipped over.

use crate::fastq_reader::{trimmed_len, ReadBatch};
use noodles_bgzf as bgzf;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::utils::BinaryRead;

pub const SELECT_READ1: u8 = 1;
pub const SELECT_READ2: u8 = 2;
pub const SELECT_SINGLE: u8 = 4;
pub const SELECT_ALL: u8 = 7;

const FLAG_READ1: u16 = 0x40;
const FLAG_READ2: u16 = 0x80;
const FLAG_REVERSE: u16 = 0x10;

// BAM packs bases as 4-bit codes over "=ACMGRSVTWYHKDBN"
const NIB_NT4_TABLE: [u8; 16] = [4, 0, 1, 4, 2, 4, 4, 4, 3, 4, 4, 4, 4, 4, 4, 4];

// records can't meaningfully exceed this; larger sizes mean a corrupt stream
const MAX_RECORD_SIZE: usize = 1 << 26;

pub struct BamReader {
    inner: bgzf::Reader<File>,
    select: u8,
    trim_qual: u8,
    malformed: u64,
    eof: bool,
}

impl BamReader {
    /// Open a BAM file and position the stream at the first record.
    /// select is a mask of SELECT_* bits; 0 selects everything.
    pub fn open(path: &Path, select: u8, trim_qual: u8) -> io::Result<Self> {
        let mut inner = bgzf::Reader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        inner.read_exact(&mut magic)?;
        if &magic != b"BAM\x01" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not a BAM file", path.display()),
            ));
        }
        let l_text = inner.read_i32_le()?;
        if l_text < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "negative BAM header length"));
        }
        skip(&mut inner, l_text as u64)?;
        let n_ref = inner.read_i32_le()?;
        for _ in 0..n_ref {
            let l_name = inner.read_i32_le()?;
            if l_name < 0 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "negative BAM name length"));
            }
            skip(&mut inner, l_name as u64 + 4)?;
        }

        Ok(BamReader {
            inner,
            select: if select == 0 { SELECT_ALL } else { select },
            trim_qual,
            malformed: 0,
            eof: false,
        })
    }

    pub fn read_batch(&mut self, batch_size: usize) -> io::Result<ReadBatch> {
        let mut batch = ReadBatch::new();
        let mut buf = Vec::new();
        while !self.eof && batch.len() < batch_size {
            let block_size = match self.read_block_size()? {
                Some(size) => size,
                None => {
                    self.eof = true;
                    break;
                }
            };
            buf.resize(block_size, 0);
            self.inner.read_exact(&mut buf)?;
            match self.decode_record(&buf) {
                Ok(Some((name, seq))) => {
                    batch.names.push(name);
                    batch.seqs.push(seq);
                }
                Ok(None) => {} // filtered out
                Err(e) => {
                    self.malformed += 1;
                    log::warn!("skipping malformed BAM record: {}", e);
                }
            }
        }
        Ok(batch)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    // None at a clean end of stream
    fn read_block_size(&mut self) -> io::Result<Option<usize>> {
        let mut bytes = [0u8; 4];
        match self.inner.read_exact(&mut bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        let size = i32::from_le_bytes(bytes);
        if size < 0 || size as usize > MAX_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unreasonable BAM record size {}", size),
            ));
        }
        Ok(Some(size as usize))
    }

    fn decode_record(&self, buf: &[u8]) -> io::Result<Option<(String, Vec<u8>)>> {
        let mut cur = buf;
        let _ref_id = cur.read_i32_le()?;
        let _pos = cur.read_i32_le()?;
        let l_read_name = cur.read_u8_le()? as usize;
        let _mapq = cur.read_u8_le()?;
        let _bin = cur.read_u16_le()?;
        let n_cigar_op = cur.read_u16_le()? as usize;
        let flag = cur.read_u16_le()?;
        let l_seq = cur.read_i32_le()?;
        let _next_ref_id = cur.read_i32_le()?;
        let _next_pos = cur.read_i32_le()?;
        let _tlen = cur.read_i32_le()?;
        if l_seq < 0 || l_read_name == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad record fields"));
        }
        let l_seq = l_seq as usize;

        let selected = if flag & FLAG_READ1 != 0 {
            self.select & SELECT_READ1
        } else if flag & FLAG_READ2 != 0 {
            self.select & SELECT_READ2
        } else {
            self.select & SELECT_SINGLE
        };
        if selected == 0 {
            return Ok(None);
        }

        let need = l_read_name + 4 * n_cigar_op + l_seq.div_ceil(2) + l_seq;
        if cur.len() < need {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "record truncated"));
        }
        let name = String::from_utf8_lossy(&cur[..l_read_name - 1]).into_owned();
        let seq_off = l_read_name + 4 * n_cigar_op;
        let packed = &cur[seq_off..seq_off + l_seq.div_ceil(2)];
        let qual_raw = &cur[seq_off + l_seq.div_ceil(2)..seq_off + l_seq.div_ceil(2) + l_seq];

        let mut seq: Vec<u8> = (0..l_seq)
            .map(|i| {
                let nib = packed[i / 2] >> (if i % 2 == 0 { 4 } else { 0 }) & 0xF;
                NIB_NT4_TABLE[nib as usize]
            })
            .collect();
        // 0xFF means qualities absent
        let mut qual: Vec<u8> = if qual_raw.first() == Some(&0xFF) {
            Vec::new()
        } else {
            qual_raw.iter().map(|&q| q.saturating_add(33)).collect()
        };

        // restore original read orientation
        if flag & FLAG_REVERSE != 0 {
            seq.reverse();
            for c in seq.iter_mut() {
                if *c < 4 {
                    *c = 3 - *c;
                }
            }
            qual.reverse();
        }

        let keep = trimmed_len(self.trim_qual, &qual, seq.len());
        seq.truncate(keep);
        Ok(Some((name, seq)))
    }
}

fn skip<R: Read>(reader: &mut R, n: u64) -> io::Result<()> {
    io::copy(&mut reader.by_ref().take(n), &mut io::sink()).and_then(|copied| {
        if copied == n {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated BAM header"))
        }
    })
}
