use std::collections::BTreeMap;

use itertools::Itertools;

use crate::libs::fragment::Fragment;
use crate::libs::{Ori, Pos};

/// Per-column classification of a block's alignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentStat {
    pub ident_nogap: Pos,
    pub ident_gap: Pos,
    pub noident_nogap: Pos,
    pub noident_gap: Pos,
    pub pure_gap: Pos,
    pub total: Pos,
}

impl AlignmentStat {
    /// Identity over all columns; pure-gap columns count against it.
    pub fn identity(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.ident_nogap as f64 / self.total as f64
        }
    }

    /// Share of gapped columns among the non-pure-gap ones.
    pub fn gaps(&self) -> f64 {
        let gaps = self.ident_gap + self.noident_gap;
        let nogaps = self.ident_nogap + self.noident_nogap;
        if gaps + nogaps == 0 {
            0.0
        } else {
            gaps as f64 / (gaps + nogaps) as f64
        }
    }
}

/// An unordered group of fragments asserted pairwise homologous.
#[derive(Debug, Clone, Default)]
pub struct Block {
    name: String,
    weak: bool,
    fragments: Vec<Fragment>,
}

impl Block {
    pub fn new() -> Self {
        Block::default()
    }

    pub fn with_name(name: &str) -> Self {
        Block {
            name: name.to_string(),
            ..Block::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Weak blocks are ineligible for joining and similar rewrites.
    pub fn weak(&self) -> bool {
        self.weak
    }

    pub fn set_weak(&mut self, weak: bool) {
        self.weak = weak;
    }

    pub fn insert(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn remove(&mut self, index: usize) -> Fragment {
        self.fragments.remove(index)
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragments_mut(&mut self) -> &mut Vec<Fragment> {
        &mut self.fragments
    }

    pub fn front(&self) -> Option<&Fragment> {
        self.fragments.first()
    }

    pub fn size(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of alignment columns: the maximum row length, or the
    /// maximum fragment length if the block is unaligned.
    pub fn alignment_length(&self) -> Pos {
        self.fragments
            .iter()
            .map(|f| f.alignment_length())
            .max()
            .unwrap_or(0)
    }

    /// Whether every fragment carries a row.
    pub fn has_rows(&self) -> bool {
        !self.is_empty() && self.fragments.iter().all(|f| f.row().is_some())
    }

    /// Classify one column: `(ident, gap, pure_gap)`.
    pub fn test_column(&self, col: Pos) -> (bool, bool, bool) {
        let mut seen_letter = 0u8;
        let mut ident = true;
        let mut gap = false;
        for f in &self.fragments {
            match f.alignment_at(col) {
                None => gap = true,
                Some(c) => {
                    if seen_letter == 0 {
                        seen_letter = c;
                    } else if c != seen_letter {
                        ident = false;
                    }
                }
            }
        }
        (ident, gap, seen_letter == 0)
    }

    /// Column statistics over the whole alignment.
    pub fn make_stat(&self) -> AlignmentStat {
        let mut stat = AlignmentStat {
            total: self.alignment_length(),
            ..AlignmentStat::default()
        };
        for col in 0..stat.total {
            let (ident, gap, pure_gap) = self.test_column(col);
            if pure_gap {
                stat.pure_gap += 1;
            } else if ident && !gap {
                stat.ident_nogap += 1;
            } else if ident && gap {
                stat.ident_gap += 1;
            } else if !ident && !gap {
                stat.noident_nogap += 1;
            } else {
                stat.noident_gap += 1;
            }
        }
        stat
    }

    pub fn identity(&self) -> f64 {
        self.make_stat().identity()
    }

    /// `(max_len - min_len) / avg_len` over fragment lengths.
    pub fn spreading(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let lengths: Vec<Pos> = self.fragments.iter().map(|f| f.length()).collect();
        let max = *lengths.iter().max().unwrap();
        let min = *lengths.iter().min().unwrap();
        let avg = lengths.iter().sum::<Pos>() / lengths.len() as Pos;
        if avg == 0 {
            0.0
        } else {
            (max - min) as f64 / avg as f64
        }
    }

    /// Per-column majority consensus; ties break to the alphabetically
    /// smaller letter, pure-gap columns contribute `-`.
    pub fn consensus(&self) -> String {
        let mut out = String::with_capacity(self.alignment_length() as usize);
        for col in 0..self.alignment_length() {
            let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
            for c in self.fragments.iter().filter_map(|f| f.alignment_at(col)) {
                *counts.entry(c).or_insert(0) += 1;
            }
            // alphabetical iteration + strictly-greater updates break
            // ties toward the smaller letter
            let mut best = b'-';
            let mut best_count = 0;
            for (c, count) in counts {
                if count > best_count {
                    best = c;
                    best_count = count;
                }
            }
            out.push(best as char);
        }
        out
    }

    /// Orientation under which two blocks cover the same sequences with
    /// a consistent relative orientation: +1 as-is, -1 after inversing
    /// `other`, 0 if they do not correspond.
    pub fn match_ori(&self, other: &Block) -> Ori {
        if self.size() != other.size() || self.is_empty() {
            return 0;
        }
        let key = |b: &Block, flip: bool| -> Vec<(String, Ori)> {
            b.fragments
                .iter()
                .map(|f| {
                    (
                        f.seq_name().to_string(),
                        if flip { -f.ori() } else { f.ori() },
                    )
                })
                .sorted()
                .collect()
        };
        let ours = key(self, false);
        if ours == key(other, false) {
            1
        } else if ours == key(other, true) {
            -1
        } else {
            0
        }
    }

    /// Inverse every fragment of the block.
    pub fn inverse(&mut self) {
        for f in &mut self.fragments {
            f.inverse();
        }
    }

    /// Sub-block over alignment columns `[start, stop]`. Fragments with
    /// no material inside the range are left out.
    pub fn slice(&self, start: Pos, stop: Pos) -> Block {
        assert!(start <= stop);
        let mut out = Block::new();
        out.set_weak(self.weak);
        for f in &self.fragments {
            match f.row() {
                Some(row) => {
                    let mut f_start = row.nearest_in_fragment(start);
                    let mut f_stop = row.nearest_in_fragment(stop);
                    if f_start == -1 || f_stop == -1 {
                        continue;
                    }
                    if row.map_to_alignment(f_start) < start {
                        f_start += 1;
                    }
                    if row.map_to_alignment(f_stop) > stop {
                        f_stop -= 1;
                    }
                    if f_start > f_stop || f_start >= f.length() {
                        continue;
                    }
                    let mut sub = f.subfragment(f_start, f_stop);
                    sub.set_row(Some(row.slice(start, stop)));
                    out.insert(sub);
                }
                None => {
                    if start >= f.length() {
                        continue;
                    }
                    let f_stop = stop.min(f.length() - 1);
                    out.insert(f.subfragment(start, f_stop));
                }
            }
        }
        out.set_canonical_name();
        out
    }

    /// Order-independent canonical name derived from the content.
    pub fn canonical_name(&self) -> String {
        let mut acc: u64 = 0;
        for f in &self.fragments {
            acc ^= f.hash().wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ f.length() as u64;
        }
        let folded = (acc ^ (acc >> 32)) as u32;
        format!("{}x{}_{:08x}", self.size(), self.alignment_length(), folded)
    }

    pub fn set_canonical_name(&mut self) {
        self.name = self.canonical_name();
    }

    /// A stem block covers every input genome exactly once.
    pub fn is_stem(&self, genomes: &[String]) -> bool {
        let counts = self
            .fragments
            .iter()
            .map(|f| f.seq().genome().to_string())
            .counts();
        genomes.iter().all(|g| counts.get(g) == Some(&1)) && counts.len() == genomes.len()
    }

    /// Structural equality: same fragments (as multisets, coordinates
    /// and gap patterns), name ignored.
    pub fn equal_content(&self, other: &Block) -> bool {
        if self.size() != other.size() {
            return false;
        }
        let key = |b: &Block| -> Vec<(String, Pos, Pos, Ori, String)> {
            b.fragments
                .iter()
                .map(|f| {
                    (
                        f.seq_name().to_string(),
                        f.min_pos(),
                        f.max_pos(),
                        f.ori(),
                        f.alignment_string(),
                    )
                })
                .sorted()
                .collect()
        };
        key(self) == key(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::row::{Row, RowKind};
    use crate::libs::seq::Sequence;
    use std::sync::Arc;

    fn block_of(texts: &[&str]) -> (Block, Vec<Arc<Sequence>>) {
        let mut block = Block::new();
        let mut seqs = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let plain: String = text.chars().filter(|&c| c != '-').collect();
            let seq = Arc::new(Sequence::new(&format!("s{}", i), &plain));
            seqs.push(seq.clone());
            let mut f = Fragment::new(seq, 0, plain.len() as Pos - 1, 1);
            if text.contains('-') {
                f.set_row(Some(Row::from_alignment_string(RowKind::Map, text)));
            }
            block.insert(f);
        }
        (block, seqs)
    }

    #[test]
    fn stat_classifies_columns() {
        let (block, _seqs) = block_of(&["ACGT-A", "A-GTTA", "ACGTTA"]);
        let stat = block.make_stat();
        assert_eq!(stat.total, 6);
        assert_eq!(stat.ident_nogap, 4); // A, G, T, A
        assert_eq!(stat.ident_gap, 2); // C and T columns with one gap
        assert_eq!(stat.noident_nogap, 0);
        assert_eq!(stat.pure_gap, 0);
        assert!((stat.identity() - 4.0 / 6.0).abs() < 1e-9);
        assert!((stat.gaps() - 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn consensus_breaks_ties_alphabetically() {
        let (block, _seqs) = block_of(&["ACGT", "ACGA", "TCGA"]);
        // col 0: A,A,T -> A; col 3: T,A,A -> A
        assert_eq!(block.consensus(), "ACGA");
        let (tied, _seqs) = block_of(&["AG", "GA"]);
        assert_eq!(tied.consensus(), "AA");
    }

    #[test]
    fn alignment_length_is_max_row() {
        let (block, _seqs) = block_of(&["ACGT-A", "A-GTTA", "ACGTTA"]);
        assert_eq!(block.alignment_length(), 6);
        assert!(!block.has_rows()); // the ungapped member has no row
    }

    #[test]
    fn slice_clips_by_columns() {
        let (block, _seqs) = block_of(&["ACGT-A", "A-GTTA", "ACGTTA"]);
        let sub = block.slice(1, 3);
        assert_eq!(sub.size(), 3);
        for f in sub.fragments() {
            assert!(f.length() >= 2 && f.length() <= 3);
        }
        let texts: Vec<String> = sub.fragments().iter().map(|f| f.alignment_string()).collect();
        assert_eq!(texts, vec!["CGT", "-GT", "CGT"]);
    }

    #[test]
    fn canonical_name_ignores_order() {
        let (block, _seqs) = block_of(&["ACGT", "AGGT"]);
        let mut reversed = Block::new();
        for f in block.fragments().iter().rev() {
            reversed.insert(f.clone());
        }
        assert_eq!(block.canonical_name(), reversed.canonical_name());
    }

    #[test]
    fn match_ori_detects_inversion() {
        let seq0 = Arc::new(Sequence::new("s0", "ACGTACGT"));
        let seq1 = Arc::new(Sequence::new("s1", "ACGTACGT"));
        let mut a = Block::new();
        a.insert(Fragment::new(seq0.clone(), 0, 3, 1));
        a.insert(Fragment::new(seq1.clone(), 0, 3, -1));
        let mut b = Block::new();
        b.insert(Fragment::new(seq0.clone(), 4, 7, 1));
        b.insert(Fragment::new(seq1.clone(), 4, 7, -1));
        assert_eq!(a.match_ori(&b), 1);
        b.inverse();
        assert_eq!(a.match_ori(&b), -1);
        b.insert(Fragment::new(seq0, 0, 1, 1));
        assert_eq!(a.match_ori(&b), 0);
    }

    #[test]
    fn stem_blocks_cover_each_genome_once() {
        let mut s0 = Sequence::new("g1.chr1", "ACGT");
        s0.set_genome("g1");
        let mut s1 = Sequence::new("g2.chr1", "ACGT");
        s1.set_genome("g2");
        let mut block = Block::new();
        block.insert(Fragment::new(Arc::new(s0), 0, 3, 1));
        block.insert(Fragment::new(Arc::new(s1), 0, 3, 1));
        let genomes = vec!["g1".to_string(), "g2".to_string()];
        assert!(block.is_stem(&genomes));
        assert!(!block.is_stem(&["g1".to_string()]));
    }
}
