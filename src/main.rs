use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kmatch::bam_reader;
use kmatch::index::RefIndex;
use kmatch::klcp::{klcp_filename, Klcp};
use kmatch::matcher::{self, MatchOpt, ReadInput};

#[derive(Parser)]
#[command(name = "kmatch")]
#[command(about = "Exact k-mer matching against an FM-indexed reference collection", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream reads and report, per k-mer window, the references containing it
    Match {
        /// Index prefix (the .bwt/.sa/.ann/.amb/.pac files)
        #[arg(value_name = "PREFIX")]
        index: PathBuf,

        /// Reads, FASTQ (optionally gzipped) or BAM with -b
        #[arg(value_name = "READS")]
        reads: PathBuf,

        /// Length of k-mer
        #[arg(short = 'k', long, value_name = "INT", default_value = "14")]
        kmer_length: usize,

        /// Use the kLCP bitvector for rolling window extension
        #[arg(short = 'u', long)]
        use_klcp: bool,

        /// Output the set of reference ids for every k-mer window
        #[arg(short = 'v', long)]
        output_rids: bool,

        /// Skip k-2 windows after a failing window
        #[arg(short = 's', long)]
        skip_after_fail: bool,

        /// Write output to FILE instead of stdout
        #[arg(short = 'f', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Quality threshold for 3'-end read trimming, 0 disables
        #[arg(short = 'q', long, value_name = "INT", default_value = "0")]
        trim_qual: u8,

        /// Cap on enumerated suffix-array rows per window, 0 = unlimited
        #[arg(short = 'c', long, value_name = "INT", default_value = "0")]
        max_rows: u64,

        /// Worker threads for read batches
        #[arg(short = 't', long, value_name = "INT", default_value = "1")]
        threads: usize,

        /// The input is in the BAM format
        #[arg(short = 'b', long)]
        bam: bool,

        /// Use single-end reads only (effective with -b)
        #[arg(short = '0', long)]
        bam_se: bool,

        /// Use the 1st read in a pair (effective with -b)
        #[arg(short = '1', long)]
        bam_read1: bool,

        /// Use the 2nd read in a pair (effective with -b)
        #[arg(short = '2', long)]
        bam_read2: bool,

        /// Reads per batch
        #[arg(long, value_name = "INT", default_value = "262144")]
        batch_size: usize,

        /// Verbosity: 1=error, 2=warning, 3=message, 4+=debugging
        #[arg(long, value_name = "INT", default_value = "3")]
        verbosity: i32,
    },

    /// Build the kLCP bitvector for a fixed k against an existing index
    Index {
        /// Index prefix (the .bwt/.sa/.ann/.amb/.pac files)
        #[arg(value_name = "PREFIX")]
        index: PathBuf,

        /// Length of k-mer
        #[arg(short = 'k', long, value_name = "INT", default_value = "14")]
        kmer_length: usize,

        /// Verbosity: 1=error, 2=warning, 3=message, 4+=debugging
        #[arg(long, value_name = "INT", default_value = "3")]
        verbosity: i32,
    },
}

fn init_logger(verbosity: i32) {
    let log_level = match verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Match {
            index,
            reads,
            kmer_length,
            use_klcp,
            output_rids,
            skip_after_fail,
            output,
            trim_qual,
            max_rows,
            threads,
            bam,
            bam_se,
            bam_read1,
            bam_read2,
            batch_size,
            verbosity,
        } => {
            init_logger(verbosity);

            if kmer_length == 0 {
                log::error!("k-mer length must be positive");
                std::process::exit(1);
            }

            let mut n_threads = threads.max(1);
            let max_threads = num_cpus::get() * 2;
            if n_threads > max_threads {
                log::warn!(
                    "thread count {} exceeds recommended maximum {}, capping",
                    n_threads,
                    max_threads
                );
                n_threads = max_threads;
            }
            if n_threads > 1 {
                if let Err(e) = rayon::ThreadPoolBuilder::new()
                    .num_threads(n_threads)
                    .build_global()
                {
                    log::warn!("failed to configure thread pool: {}", e);
                }
            }

            let input = if bam {
                let mut select = 0u8;
                if bam_se {
                    select |= bam_reader::SELECT_SINGLE;
                }
                if bam_read1 {
                    select |= bam_reader::SELECT_READ1;
                }
                if bam_read2 {
                    select |= bam_reader::SELECT_READ2;
                }
                ReadInput::Bam { select }
            } else {
                if bam_se || bam_read1 || bam_read2 {
                    log::warn!("-0/-1/-2 have no effect without -b");
                }
                ReadInput::Fastq
            };

            let opt = MatchOpt {
                k_len: kmer_length,
                use_klcp,
                output_rids,
                skip_after_fail,
                trim_qual,
                max_rows,
                n_threads,
                batch_size: batch_size.max(1),
                input,
            };

            match matcher::match_core(&index, &reads, output.as_deref(), &opt) {
                Ok(stats) => {
                    log::info!("done: {} reads", stats.reads);
                }
                Err(e) => {
                    log::error!("match failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Index {
            index,
            kmer_length,
            verbosity,
        } => {
            init_logger(verbosity);

            let idx = match RefIndex::load(&index) {
                Ok(idx) => idx,
                Err(e) => {
                    log::error!("couldn't load index from {}: {}", index.display(), e);
                    std::process::exit(1);
                }
            };

            let t0 = kmatch::utils::realtime();
            let result = Klcp::build(&idx.bwt, &idx.refs, kmer_length as u32)
                .and_then(|klcp| klcp.save(&klcp_filename(&index, kmer_length as u32)));
            match result {
                Ok(()) => {
                    log::info!(
                        "wrote {} in {:.2} sec",
                        klcp_filename(&index, kmer_length as u32).display(),
                        kmatch::utils::realtime() - t0
                    );
                }
                Err(e) => {
                    log::error!("kLCP construction failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
