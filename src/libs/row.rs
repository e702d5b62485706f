use std::collections::BTreeMap;

use crate::libs::Pos;

/// Representation of an alignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Map-backed, cheap incremental binding.
    Map,
    /// Array-backed, compact and fast to scan.
    Compact,
}

/// A partial monotone injection between fragment positions
/// `[0, fragment_length)` and alignment columns `[0, length)`.
#[derive(Debug, Clone)]
pub enum Row {
    Map(MapRow),
    Compact(CompactRow),
}

#[derive(Debug, Clone, Default)]
pub struct MapRow {
    length: Pos,
    f2a: BTreeMap<Pos, Pos>,
    a2f: BTreeMap<Pos, Pos>,
}

#[derive(Debug, Clone, Default)]
pub struct CompactRow {
    // alignment column -> fragment position, -1 for gaps
    to_fragment: Vec<Pos>,
}

impl Row {
    pub fn new(kind: RowKind) -> Self {
        match kind {
            RowKind::Map => Row::Map(MapRow::default()),
            RowKind::Compact => Row::Compact(CompactRow::default()),
        }
    }

    /// Build a row of `length` columns with no gaps.
    pub fn identity(kind: RowKind, length: Pos) -> Self {
        let mut row = Row::new(kind);
        for i in 0..length {
            row.bind(i, i);
        }
        row
    }

    /// Build a row from a gapped string, binding fragment positions
    /// 0, 1, 2, … to the non-gap columns.
    pub fn from_alignment_string(kind: RowKind, text: &str) -> Self {
        let mut row = Row::new(kind);
        row.grow(text);
        row
    }

    pub fn kind(&self) -> RowKind {
        match self {
            Row::Map(_) => RowKind::Map,
            Row::Compact(_) => RowKind::Compact,
        }
    }

    /// Alignment length (number of columns).
    pub fn length(&self) -> Pos {
        match self {
            Row::Map(r) => r.length,
            Row::Compact(r) => r.to_fragment.len() as Pos,
        }
    }

    /// Number of bound fragment positions.
    pub fn fragment_length(&self) -> Pos {
        match self {
            Row::Map(r) => r.f2a.len() as Pos,
            Row::Compact(r) => r.to_fragment.iter().filter(|&&f| f != -1).count() as Pos,
        }
    }

    /// Bind a fragment position to an alignment column.
    /// Both sides must be unbound and the binding must keep the mapping
    /// monotone; violations are programming errors.
    pub fn bind(&mut self, fragment_pos: Pos, align_pos: Pos) {
        assert!(fragment_pos >= 0 && align_pos >= 0);
        assert_eq!(
            self.map_to_fragment(align_pos),
            -1,
            "column {} is already bound",
            align_pos
        );
        assert_eq!(
            self.map_to_alignment(fragment_pos),
            -1,
            "fragment position {} is already bound",
            fragment_pos
        );
        match self {
            Row::Map(r) => {
                if let Some((&f, &a)) = r.f2a.range(..fragment_pos).next_back() {
                    assert!(a < align_pos, "binding breaks monotonicity after ({}, {})", f, a);
                }
                if let Some((&f, &a)) = r.f2a.range(fragment_pos + 1..).next() {
                    assert!(a > align_pos, "binding breaks monotonicity before ({}, {})", f, a);
                }
                r.f2a.insert(fragment_pos, align_pos);
                r.a2f.insert(align_pos, fragment_pos);
                r.length = r.length.max(align_pos + 1);
            }
            Row::Compact(r) => {
                if r.to_fragment.len() as Pos <= align_pos {
                    r.to_fragment.resize(align_pos as usize + 1, -1);
                }
                let before = r.to_fragment[..align_pos as usize]
                    .iter()
                    .rev()
                    .find(|&&f| f != -1);
                if let Some(&f) = before {
                    assert!(f < fragment_pos, "binding breaks monotonicity");
                }
                let after = r.to_fragment[align_pos as usize + 1..]
                    .iter()
                    .find(|&&f| f != -1);
                if let Some(&f) = after {
                    assert!(f > fragment_pos, "binding breaks monotonicity");
                }
                r.to_fragment[align_pos as usize] = fragment_pos;
            }
        }
    }

    /// Column of a fragment position, -1 if unbound.
    pub fn map_to_alignment(&self, fragment_pos: Pos) -> Pos {
        match self {
            Row::Map(r) => r.f2a.get(&fragment_pos).copied().unwrap_or(-1),
            Row::Compact(r) => r
                .to_fragment
                .iter()
                .position(|&f| f == fragment_pos)
                .map(|a| a as Pos)
                .unwrap_or(-1),
        }
    }

    /// Fragment position of a column, -1 if the column is a gap.
    pub fn map_to_fragment(&self, align_pos: Pos) -> Pos {
        match self {
            Row::Map(r) => r.a2f.get(&align_pos).copied().unwrap_or(-1),
            Row::Compact(r) => {
                if align_pos < 0 || align_pos >= r.to_fragment.len() as Pos {
                    -1
                } else {
                    r.to_fragment[align_pos as usize]
                }
            }
        }
    }

    /// Fragment position nearest to the column: the last bound column at
    /// or before `align_pos`, or the first bound column after it.
    /// -1 if the row has no bindings.
    pub fn nearest_in_fragment(&self, align_pos: Pos) -> Pos {
        let direct = self.map_to_fragment(align_pos);
        if direct != -1 {
            return direct;
        }
        match self {
            Row::Map(r) => r
                .a2f
                .range(..align_pos)
                .next_back()
                .or_else(|| r.a2f.range(align_pos + 1..).next())
                .map(|(_, &f)| f)
                .unwrap_or(-1),
            Row::Compact(r) => {
                let len = r.to_fragment.len() as Pos;
                let left_end = align_pos.clamp(0, len) as usize;
                let right_start = (align_pos + 1).clamp(0, len) as usize;
                r.to_fragment[..left_end]
                    .iter()
                    .rev()
                    .find(|&&f| f != -1)
                    .or_else(|| r.to_fragment[right_start..].iter().find(|&&f| f != -1))
                    .copied()
                    .unwrap_or(-1)
            }
        }
    }

    /// Sub-row over columns `[a_from, a_to]`, rebased so that both its
    /// columns and its fragment positions start at zero.
    pub fn slice(&self, a_from: Pos, a_to: Pos) -> Row {
        assert!(a_from <= a_to);
        let mut out = Row::new(self.kind());
        let mut f_base = -1;
        for a in a_from..=a_to {
            let f = self.map_to_fragment(a);
            if f == -1 {
                continue;
            }
            if f_base == -1 {
                f_base = f;
            }
            out.bind(f - f_base, a - a_from);
        }
        out.set_length(a_to - a_from + 1);
        out
    }

    /// Append columns from a gapped string, binding successive fragment
    /// positions to its non-gap columns.
    pub fn grow(&mut self, text: &str) {
        let start = self.length();
        let mut next_f = match self {
            Row::Map(r) => r.f2a.keys().next_back().map(|&f| f + 1).unwrap_or(0),
            Row::Compact(r) => r
                .to_fragment
                .iter()
                .rev()
                .find(|&&f| f != -1)
                .map(|&f| f + 1)
                .unwrap_or(0),
        };
        for (i, c) in text.bytes().enumerate() {
            if c != b'-' && c != b'.' {
                self.bind(next_f, start + i as Pos);
                next_f += 1;
            }
        }
        self.set_length(start + text.len() as Pos);
    }

    /// Force the column count (pure-gap tails carry no bindings).
    pub fn set_length(&mut self, length: Pos) {
        match self {
            Row::Map(r) => r.length = r.length.max(length),
            Row::Compact(r) => {
                if (r.to_fragment.len() as Pos) < length {
                    r.to_fragment.resize(length as usize, -1);
                }
            }
        }
    }

    /// Row with both axes reversed, used when a fragment flips its
    /// orientation. `fragment_length` is the owning fragment's length.
    pub fn inversed(&self, fragment_length: Pos) -> Row {
        let length = self.length();
        let mut out = Row::new(self.kind());
        for (f, a) in self.bindings().into_iter().rev() {
            out.bind(fragment_length - 1 - f, length - 1 - a);
        }
        out.set_length(length);
        out
    }

    /// Convert between representations.
    pub fn to_kind(&self, kind: RowKind) -> Row {
        if self.kind() == kind {
            return self.clone();
        }
        let mut out = Row::new(kind);
        for (f, a) in self.bindings() {
            out.bind(f, a);
        }
        out.set_length(self.length());
        out
    }

    /// All `(fragment_pos, column)` bindings in column order.
    pub fn bindings(&self) -> Vec<(Pos, Pos)> {
        match self {
            Row::Map(r) => r.a2f.iter().map(|(&a, &f)| (f, a)).collect(),
            Row::Compact(r) => r
                .to_fragment
                .iter()
                .enumerate()
                .filter(|(_, &f)| f != -1)
                .map(|(a, &f)| (f, a as Pos))
                .collect(),
        }
    }

    /// Gapped text of this row over the fragment characters produced by
    /// `at`, using `-` for gaps.
    pub fn alignment_string<F: Fn(Pos) -> u8>(&self, at: F) -> String {
        let mut out = String::with_capacity(self.length() as usize);
        for a in 0..self.length() {
            let f = self.map_to_fragment(a);
            if f == -1 {
                out.push('-');
            } else {
                out.push(at(f) as char);
            }
        }
        out
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.length() == other.length() && self.bindings() == other.bindings()
    }
}

impl Eq for Row {}
