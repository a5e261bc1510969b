pub mod bam_reader; // BAM read input (pairing-flag filtered)
pub mod bitvec; // packed bitvector with rank and nearest-zero scans
pub mod bwt; // BWT, occurrence checkpoints, sampled suffix array
pub mod fastq_reader; // FASTQ read input with quality trimming
pub mod index; // combined index handle and position mapping
pub mod klcp; // kLCP bitvector: navigation, builder, file format
pub mod matcher; // read-stream driver
pub mod reftable; // reference-name table (.ann/.amb/.pac)
pub mod resolver; // SA interval -> deduplicated reference-id set
pub mod search; // cold search, rolling extension, window walk
pub mod utils;
