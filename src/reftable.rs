// Reference-name table: maps positions in the packed forward concatenation
// to reference sequence ids. Stored as the textual .ann/.amb pair next to
// the 2-bit packed .pac file.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// ASCII base -> 2-bit code, 4 for anything ambiguous.
pub const NST_NT4_TABLE: [u8; 256] = [
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 0, 4, 1, 4, 4, 4, 2, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 0, 4, 1, 4, 4, 4, 2, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
];

/// Code -> ASCII base for output.
pub const NT4_CHARS: [u8; 5] = *b"ACGTN";

/// Base from the 2-bit packed forward reference. High-order pairs first
/// within each byte.
#[inline]
pub fn pac_base(pac: &[u8], pos: u64) -> u8 {
    (pac[(pos >> 2) as usize] >> ((!pos & 3) << 1)) & 3
}

/// One named sequence of the concatenation.
#[derive(Debug, Clone)]
pub struct RefAnn {
    pub offset: u64,
    pub len: i32,
    pub n_ambs: i32,
    pub gi: u32,
    pub name: String,
    pub anno: String,
}

/// A run of ambiguous input bases.
#[derive(Debug, Clone)]
pub struct RefHole {
    pub offset: u64,
    pub len: i32,
    pub amb: char,
}

#[derive(Debug)]
pub struct RefTable {
    pub l_pac: u64,
    pub n_seqs: i32,
    pub seed: u32,
    pub anns: Vec<RefAnn>,
    pub n_holes: i32,
    pub ambs: Vec<RefHole>,
    pub pac_file_path: Option<PathBuf>,
}

fn bad_data(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("malformed .ann/.amb: {}", what))
}

fn next_line(lines: &mut impl Iterator<Item = io::Result<String>>, what: &str) -> io::Result<String> {
    lines.next().ok_or_else(|| bad_data(what))?
}

impl RefTable {
    pub fn dump(&self, prefix: &Path) -> io::Result<()> {
        let mut ann_file =
            BufWriter::new(File::create(with_suffix(prefix, ".ann"))?);
        writeln!(ann_file, "{} {} {}", self.l_pac, self.n_seqs, self.seed)?;
        for p in &self.anns {
            if p.anno.is_empty() {
                writeln!(ann_file, "{} {}", p.gi, p.name)?;
            } else {
                writeln!(ann_file, "{} {} {}", p.gi, p.name, p.anno)?;
            }
            writeln!(ann_file, "{} {} {}", p.offset, p.len, p.n_ambs)?;
        }
        ann_file.flush()?;

        let mut amb_file =
            BufWriter::new(File::create(with_suffix(prefix, ".amb"))?);
        writeln!(amb_file, "{} {} {}", self.l_pac, self.n_seqs, self.n_holes)?;
        for p in &self.ambs {
            writeln!(amb_file, "{} {} {}", p.offset, p.len, p.amb)?;
        }
        amb_file.flush()?;

        Ok(())
    }

    pub fn restore(prefix: &Path) -> io::Result<Self> {
        let ann_file = BufReader::new(File::open(with_suffix(prefix, ".ann"))?);
        let mut lines = ann_file.lines();

        let header = next_line(&mut lines, "missing .ann header")?;
        let mut fields = header.split_whitespace();
        let l_pac: u64 = parse_field(fields.next(), "l_pac")?;
        let n_seqs: i32 = parse_field(fields.next(), "n_seqs")?;
        let seed: u32 = parse_field(fields.next(), "seed")?;

        let mut anns = Vec::with_capacity(n_seqs as usize);
        for _ in 0..n_seqs {
            let name_line = next_line(&mut lines, "missing sequence name line")?;
            let mut parts = name_line.splitn(3, ' ');
            let gi: u32 = parse_field(parts.next(), "gi")?;
            let name = parts.next().ok_or_else(|| bad_data("missing name"))?.to_string();
            let anno = parts.next().unwrap_or("").to_string();

            let coord_line = next_line(&mut lines, "missing sequence coordinate line")?;
            let mut coords = coord_line.split_whitespace();
            let offset: u64 = parse_field(coords.next(), "offset")?;
            let len: i32 = parse_field(coords.next(), "len")?;
            let n_ambs: i32 = parse_field(coords.next(), "n_ambs")?;

            anns.push(RefAnn { offset, len, n_ambs, gi, name, anno });
        }

        let amb_file = BufReader::new(File::open(with_suffix(prefix, ".amb"))?);
        let mut amb_lines = amb_file.lines();

        let amb_header = next_line(&mut amb_lines, "missing .amb header")?;
        let n_holes: i32 = parse_field(amb_header.split_whitespace().nth(2), "n_holes")?;

        let mut ambs = Vec::with_capacity(n_holes as usize);
        for _ in 0..n_holes {
            let line = next_line(&mut amb_lines, "missing hole line")?;
            let mut fields = line.split_whitespace();
            let offset: u64 = parse_field(fields.next(), "hole offset")?;
            let len: i32 = parse_field(fields.next(), "hole len")?;
            let amb = fields
                .next()
                .and_then(|s| s.chars().next())
                .ok_or_else(|| bad_data("missing hole char"))?;
            ambs.push(RefHole { offset, len, amb });
        }

        Ok(RefTable {
            l_pac,
            n_seqs,
            seed,
            anns,
            n_holes,
            ambs,
            pac_file_path: Some(with_suffix(prefix, ".pac")),
        })
    }

    /// Which sequence contains forward position pos_f, None past the
    /// concatenation end.
    pub fn pos2rid(&self, pos_f: u64) -> Option<i32> {
        if pos_f >= self.l_pac || self.n_seqs == 0 {
            return None;
        }
        let mut left = 0usize;
        let mut right = self.n_seqs as usize;
        let mut mid = 0usize;
        while left < right {
            mid = (left + right) >> 1;
            if pos_f >= self.anns[mid].offset {
                if mid == self.n_seqs as usize - 1 || pos_f < self.anns[mid + 1].offset {
                    break;
                }
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        Some(mid as i32)
    }

    /// Load the whole packed forward reference.
    pub fn load_pac(&self) -> io::Result<Vec<u8>> {
        let path = self
            .pac_file_path
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "pac file path not set"))?;
        let mut pac = Vec::new();
        File::open(path)?.read_to_end(&mut pac)?;
        let need = self.l_pac.div_ceil(4);
        if (pac.len() as u64) < need {
            return Err(bad_data("pac file shorter than l_pac"));
        }
        Ok(pac)
    }
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, what: &str) -> io::Result<T> {
    field
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| bad_data(what))
}

/// prefix + suffix without treating the suffix as a replacement extension,
/// so an index prefix like "refs.v2" keeps its dot.
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos2rid_picks_containing_sequence() {
        let table = RefTable {
            l_pac: 12,
            n_seqs: 3,
            seed: 11,
            anns: vec![
                RefAnn { offset: 0, len: 4, n_ambs: 0, gi: 0, name: "a".into(), anno: String::new() },
                RefAnn { offset: 4, len: 4, n_ambs: 0, gi: 0, name: "b".into(), anno: String::new() },
                RefAnn { offset: 8, len: 4, n_ambs: 0, gi: 0, name: "c".into(), anno: String::new() },
            ],
            n_holes: 0,
            ambs: Vec::new(),
            pac_file_path: None,
        };
        assert_eq!(table.pos2rid(0), Some(0));
        assert_eq!(table.pos2rid(3), Some(0));
        assert_eq!(table.pos2rid(4), Some(1));
        assert_eq!(table.pos2rid(7), Some(1));
        assert_eq!(table.pos2rid(8), Some(2));
        assert_eq!(table.pos2rid(11), Some(2));
        assert_eq!(table.pos2rid(12), None);
    }

    #[test]
    fn pac_base_uses_high_order_pairs_first() {
        // ACGT packed into one byte: A=0 C=1 G=2 T=3
        let byte = (0 << 6) | (1 << 4) | (2 << 2) | 3;
        let pac = [byte];
        assert_eq!(pac_base(&pac, 0), 0);
        assert_eq!(pac_base(&pac, 1), 1);
        assert_eq!(pac_base(&pac, 2), 2);
        assert_eq!(pac_base(&pac, 3), 3);
    }
}
