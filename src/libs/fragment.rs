use std::cmp::Ordering;
use std::sync::Arc;

use crate::libs::row::Row;
use crate::libs::seq::{complement, Sequence};
use crate::libs::{Ori, Pos};

/// An oriented interval `[min_pos, max_pos]` on a sequence, optionally
/// carrying the alignment row that places it inside its block.
#[derive(Debug, Clone)]
pub struct Fragment {
    seq: Arc<Sequence>,
    min_pos: Pos,
    max_pos: Pos,
    ori: Ori,
    row: Option<Row>,
}

impl Fragment {
    pub fn new(seq: Arc<Sequence>, min_pos: Pos, max_pos: Pos, ori: Ori) -> Self {
        assert!(ori == 1 || ori == -1);
        Fragment {
            seq,
            min_pos,
            max_pos,
            ori,
            row: None,
        }
    }

    pub fn with_row(seq: Arc<Sequence>, min_pos: Pos, max_pos: Pos, ori: Ori, row: Row) -> Self {
        let mut f = Fragment::new(seq, min_pos, max_pos, ori);
        f.set_row(Some(row));
        f
    }

    pub fn seq(&self) -> &Arc<Sequence> {
        &self.seq
    }

    pub fn seq_name(&self) -> &str {
        self.seq.name()
    }

    pub fn min_pos(&self) -> Pos {
        self.min_pos
    }

    pub fn set_min_pos(&mut self, min_pos: Pos) {
        self.min_pos = min_pos;
    }

    pub fn max_pos(&self) -> Pos {
        self.max_pos
    }

    pub fn set_max_pos(&mut self, max_pos: Pos) {
        self.max_pos = max_pos;
    }

    pub fn ori(&self) -> Ori {
        self.ori
    }

    pub fn set_ori(&mut self, ori: Ori) {
        assert!(ori == 1 || ori == -1);
        self.ori = ori;
    }

    pub fn length(&self) -> Pos {
        self.max_pos - self.min_pos + 1
    }

    /// Length of the owning block's alignment as seen by this fragment.
    pub fn alignment_length(&self) -> Pos {
        match &self.row {
            Some(row) => row.length(),
            None => self.length(),
        }
    }

    /// First position of the fragment in its own orientation.
    pub fn begin_pos(&self) -> Pos {
        if self.ori == 1 {
            self.min_pos
        } else {
            self.max_pos
        }
    }

    pub fn set_begin_pos(&mut self, begin_pos: Pos) {
        if self.ori == 1 {
            self.min_pos = begin_pos;
        } else {
            self.max_pos = begin_pos;
        }
    }

    /// Last position of the fragment in its own orientation.
    pub fn last_pos(&self) -> Pos {
        if self.ori == 1 {
            self.max_pos
        } else {
            self.min_pos
        }
    }

    pub fn set_last_pos(&mut self, last_pos: Pos) {
        if self.ori == 1 {
            self.max_pos = last_pos;
        } else {
            self.min_pos = last_pos;
        }
    }

    /// Set both ends in oriented coordinates; the orientation follows
    /// from their order.
    pub fn set_begin_last(&mut self, begin_pos: Pos, last_pos: Pos) {
        if begin_pos <= last_pos {
            self.min_pos = begin_pos;
            self.max_pos = last_pos;
            self.ori = 1;
        } else {
            self.max_pos = begin_pos;
            self.min_pos = last_pos;
            self.ori = -1;
        }
    }

    /// Position just past the fragment in its own orientation.
    pub fn end_pos(&self) -> Pos {
        if self.ori == 1 {
            self.max_pos + 1
        } else {
            self.min_pos - 1
        }
    }

    /// Flip the orientation, inversing the attached row as well.
    pub fn inverse(&mut self) {
        self.ori = -self.ori;
        let length = self.length();
        if let Some(row) = self.row.take() {
            self.row = Some(row.inversed(length));
        }
    }

    pub fn row(&self) -> Option<&Row> {
        self.row.as_ref()
    }

    pub fn set_row(&mut self, row: Option<Row>) {
        if let Some(r) = &row {
            assert!(
                r.length() >= self.length(),
                "row of {} columns cannot cover a fragment of length {}",
                r.length(),
                self.length()
            );
        }
        self.row = row;
    }

    pub fn take_row(&mut self) -> Option<Row> {
        self.row.take()
    }

    pub fn valid(&self) -> bool {
        self.min_pos <= self.max_pos && self.max_pos < self.seq.len()
    }

    pub fn has(&self, pos: Pos) -> bool {
        self.min_pos <= pos && pos <= self.max_pos
    }

    /// Character at a non-negative fragment position.
    pub fn raw_at(&self, pos: Pos) -> u8 {
        let raw = self.seq.char_at(self.begin_pos() + self.ori as Pos * pos);
        if self.ori == 1 {
            raw
        } else {
            complement(raw)
        }
    }

    /// Character at a fragment position; negative counts from the end.
    pub fn at(&self, pos: Pos) -> u8 {
        self.raw_at(if pos >= 0 { pos } else { self.length() + pos })
    }

    /// Character under an alignment column, `None` for gap columns and
    /// columns beyond the row.
    pub fn alignment_at(&self, align_pos: Pos) -> Option<u8> {
        let pos = match &self.row {
            Some(row) => row.map_to_fragment(align_pos),
            None => align_pos,
        };
        if pos >= 0 && pos < self.length() {
            Some(self.raw_at(pos))
        } else {
            None
        }
    }

    /// Ungapped text of the fragment in its own orientation.
    pub fn str(&self) -> String {
        self.seq.substr(self.begin_pos(), self.length(), self.ori)
    }

    /// Gapped text as placed in the block, `-` for gaps.
    pub fn alignment_string(&self) -> String {
        match &self.row {
            Some(row) => row.alignment_string(|f| self.raw_at(f)),
            None => self.str(),
        }
    }

    /// Text between fragment positions; negatives count from the end.
    pub fn substr(&self, from: Pos, to: Pos) -> String {
        let from = if from < 0 { self.length() + from } else { from };
        let to = if to < 0 { self.length() + to } else { to };
        let seq_pos = self.begin_pos() + self.ori as Pos * from;
        self.seq.substr(seq_pos, to - from + 1, self.ori)
    }

    /// New rowless fragment covering positions `from..=to` of this one.
    /// `from > to` yields the opposite orientation.
    pub fn subfragment(&self, from: Pos, to: Pos) -> Fragment {
        let (lo, hi, flip) = if from <= to {
            (from, to, false)
        } else {
            (to, from, true)
        };
        let mut result = Fragment::new(self.seq.clone(), 0, 0, 1);
        result.set_ori(self.ori);
        let begin = self.begin_pos() + self.ori as Pos * lo;
        let last = self.begin_pos() + self.ori as Pos * hi;
        if self.ori == 1 {
            result.min_pos = begin;
            result.max_pos = last;
        } else {
            result.max_pos = begin;
            result.min_pos = last;
        }
        if flip {
            result.inverse();
        }
        result
    }

    /// Identifier of the form `NAME_BEGIN_LAST`. A single-position
    /// reverse fragment gets `LAST = -1` to stay distinguishable.
    pub fn id(&self) -> String {
        let a = self.begin_pos();
        let mut b = self.last_pos();
        if a == b && self.ori == -1 {
            b = -1;
        }
        format!("{}_{}_{}", self.seq.name(), a, b)
    }

    /// Orientation-independent content hash.
    pub fn hash(&self) -> u64 {
        self.seq.hash(self.begin_pos(), self.length(), self.ori)
    }

    /// Number of positions shared with another fragment.
    pub fn common_positions(&self, other: &Fragment) -> Pos {
        if self.seq_name() != other.seq_name() {
            return 0;
        }
        let max_min = self.min_pos.max(other.min_pos);
        let min_max = self.max_pos.min(other.max_pos);
        if max_min <= min_max {
            min_max - max_min + 1
        } else {
            0
        }
    }

    /// Shared interval as a fragment in this fragment's orientation.
    pub fn common_fragment(&self, other: &Fragment) -> Option<Fragment> {
        if self.seq_name() != other.seq_name() {
            return None;
        }
        let max_min = self.min_pos.max(other.min_pos);
        let min_max = self.max_pos.min(other.max_pos);
        if max_min <= min_max {
            Some(Fragment::new(self.seq.clone(), max_min, min_max, self.ori))
        } else {
            None
        }
    }

    /// Distance in positions between two fragments of one sequence,
    /// zero if they touch or overlap.
    pub fn dist_to(&self, other: &Fragment) -> Pos {
        assert_eq!(self.seq_name(), other.seq_name());
        if self.common_positions(other) > 0 {
            0
        } else if self.min_pos < other.min_pos {
            other.min_pos - self.max_pos - 1
        } else {
            self.min_pos - other.max_pos - 1
        }
    }

    pub fn is_subfragment_of(&self, other: &Fragment) -> bool {
        self.seq_name() == other.seq_name()
            && self.min_pos >= other.min_pos
            && self.max_pos <= other.max_pos
    }

    pub fn is_internal_subfragment_of(&self, other: &Fragment) -> bool {
        self.seq_name() == other.seq_name()
            && self.min_pos > other.min_pos
            && self.max_pos < other.max_pos
    }

    fn key(&self) -> (Pos, Pos, Ori, &str) {
        (self.min_pos, self.max_pos, self.ori, self.seq.name())
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Fragment {}

impl PartialOrd for Fragment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fragment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}
