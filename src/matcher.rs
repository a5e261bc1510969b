// Read-stream driver: pulls read batches, walks every window of every read
// through the search engine and resolver, and serializes per-window output.

use crate::bam_reader::BamReader;
use crate::fastq_reader::{FastqReader, ReadBatch};
use crate::index::RefIndex;
use crate::klcp::Klcp;
use crate::reftable::NT4_CHARS;
use crate::resolver::RidResolver;
use crate::search::{scan_read, SaInterval};
use crate::utils;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const DEFAULT_BATCH_SIZE: usize = 1 << 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadInput {
    Fastq,
    /// BAM with a mask of bam_reader::SELECT_* bits (0 = everything).
    Bam { select: u8 },
}

#[derive(Debug, Clone)]
pub struct MatchOpt {
    pub k_len: usize,
    pub use_klcp: bool,
    pub output_rids: bool,
    pub skip_after_fail: bool,
    pub trim_qual: u8,
    /// Cap on enumerated SA rows per window, 0 = unlimited.
    pub max_rows: u64,
    pub n_threads: usize,
    pub batch_size: usize,
    pub input: ReadInput,
}

impl Default for MatchOpt {
    fn default() -> Self {
        MatchOpt {
            k_len: 14,
            use_klcp: false,
            output_rids: false,
            skip_after_fail: false,
            trim_qual: 0,
            max_rows: 0,
            n_threads: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            input: ReadInput::Fastq,
        }
    }
}

#[derive(Debug, Default)]
pub struct MatchStats {
    pub reads: u64,
    pub malformed: u64,
    pub match_time: f64,
}

enum BatchReader {
    Fastq(FastqReader),
    Bam(BamReader),
}

impl BatchReader {
    fn open(path: &Path, opt: &MatchOpt) -> io::Result<Self> {
        match opt.input {
            ReadInput::Fastq => Ok(BatchReader::Fastq(FastqReader::open(path, opt.trim_qual)?)),
            ReadInput::Bam { select } => {
                Ok(BatchReader::Bam(BamReader::open(path, select, opt.trim_qual)?))
            }
        }
    }

    fn read_batch(&mut self, batch_size: usize) -> io::Result<ReadBatch> {
        match self {
            BatchReader::Fastq(r) => r.read_batch(batch_size),
            BatchReader::Bam(r) => r.read_batch(batch_size),
        }
    }

    fn malformed(&self) -> u64 {
        match self {
            BatchReader::Fastq(r) => r.malformed(),
            BatchReader::Bam(r) => r.malformed(),
        }
    }
}

/// Stream reads against the index. Output goes to `output` or stdout; the
/// kLCP is loaded and validated when rolling extension is requested.
pub fn match_core(
    prefix: &Path,
    reads_path: &Path,
    output: Option<&Path>,
    opt: &MatchOpt,
) -> io::Result<MatchStats> {
    let idx = RefIndex::load(prefix)?;
    let klcp = if opt.use_klcp {
        let klcp = Klcp::restore_for(prefix, opt.k_len as u32, idx.bwt.seq_len)?;
        log::info!("using kLCP rolling extension with k={}", opt.k_len);
        Some(klcp)
    } else {
        None
    };

    let mut reader = BatchReader::open(reads_path, opt)?;
    let raw: Box<dyn Write> = match output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    let mut writer = BufWriter::new(raw);

    let mut stats = MatchStats::default();
    let mut resolver = RidResolver::new(idx.n_refs(), opt.max_rows);
    let mut rids: Vec<i32> = Vec::new();
    let mut line: Vec<u8> = Vec::new();

    loop {
        let batch = reader.read_batch(opt.batch_size)?;
        if batch.is_empty() {
            break;
        }
        let t0 = utils::realtime();
        if opt.n_threads > 1 {
            let rendered: Vec<Vec<u8>> = batch
                .seqs
                .par_iter()
                .map_init(
                    || (RidResolver::new(idx.n_refs(), opt.max_rows), Vec::new()),
                    |(resolver, rids), seq| {
                        let mut out = Vec::new();
                        render_read(&idx, klcp.as_ref(), opt, seq, resolver, rids, &mut out);
                        out
                    },
                )
                .collect();
            for out in rendered {
                writer.write_all(&out)?;
            }
        } else {
            for seq in &batch.seqs {
                line.clear();
                render_read(&idx, klcp.as_ref(), opt, seq, &mut resolver, &mut rids, &mut line);
                writer.write_all(&line)?;
            }
        }
        stats.match_time += utils::realtime() - t0;
        stats.reads += batch.len() as u64;
        log::info!("processed {} reads so far", stats.reads);
    }
    writer.flush()?;

    stats.malformed = reader.malformed();
    if stats.malformed > 0 {
        log::warn!("skipped {} malformed read records", stats.malformed);
    }
    log::info!("match time: {:.2} sec", stats.match_time);
    log::debug!("cpu time: {:.2} sec", utils::cputime());
    Ok(stats)
}

// One read: optional "#<bases>" header, then one line per window when
// reference-set output is on. Without it only the intervals are computed.
fn render_read(
    idx: &RefIndex,
    klcp: Option<&Klcp>,
    opt: &MatchOpt,
    seq: &[u8],
    resolver: &mut RidResolver,
    rids: &mut Vec<i32>,
    out: &mut Vec<u8>,
) {
    if opt.output_rids {
        out.push(b'#');
        out.extend(seq.iter().map(|&c| NT4_CHARS[c.min(4) as usize]));
        out.push(b'\n');
    }
    scan_read(
        &idx.bwt,
        klcp,
        seq,
        opt.k_len,
        opt.skip_after_fail,
        |_start, itv: SaInterval| {
            if opt.output_rids {
                resolver.resolve(idx, itv, opt.k_len, rids);
                let _ = write!(out, "{}", rids.len());
                for rid in rids.iter() {
                    let _ = write!(out, " {}", rid);
                }
                out.push(b'\n');
            }
        },
    );
}
