use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::{Excluded, Unbounded};

use crate::libs::blockset::{BlockId, BlockSet};
use crate::libs::block::Block;
use crate::libs::fragment::Fragment;
use crate::libs::{Ori, Pos};

/// Non-owning handle of a fragment: its block and the index inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragId {
    pub block: BlockId,
    pub idx: usize,
}

/// Sort key of a fragment inside a per-sequence index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FragKey {
    pub min_pos: Pos,
    pub max_pos: Pos,
    pub ori: Ori,
    pub frag: FragId,
}

impl FragKey {
    pub fn of(f: &Fragment, id: FragId) -> Self {
        FragKey {
            min_pos: f.min_pos(),
            max_pos: f.max_pos(),
            ori: f.ori(),
            frag: id,
        }
    }
}

/// Index storage: sorted vector for read-heavy phases, tree for
/// incremental updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcKind {
    Vector,
    Tree,
}

#[derive(Debug, Clone)]
enum SeqIndex {
    Vector(Vec<FragKey>),
    Tree(BTreeSet<FragKey>),
}

#[derive(Debug, Clone)]
struct SeqEntry {
    index: SeqIndex,
    circular: bool,
}

/// Per-sequence sorted collection of fragment handles with neighbor and
/// overlap queries. With `cycles_allowed`, neighbor queries wrap around
/// on circular sequences.
#[derive(Debug, Clone)]
pub struct FragmentCollection {
    kind: FcKind,
    cycles_allowed: bool,
    by_seq: BTreeMap<String, SeqEntry>,
    prepared: bool,
}

impl FragmentCollection {
    pub fn new(kind: FcKind) -> Self {
        FragmentCollection {
            kind,
            cycles_allowed: true,
            by_seq: BTreeMap::new(),
            prepared: kind == FcKind::Tree,
        }
    }

    pub fn cycles_allowed(&self) -> bool {
        self.cycles_allowed
    }

    pub fn set_cycles_allowed(&mut self, cycles_allowed: bool) {
        self.cycles_allowed = cycles_allowed;
    }

    pub fn clear(&mut self) {
        self.by_seq.clear();
        self.prepared = self.kind == FcKind::Tree;
    }

    pub fn is_empty(&self) -> bool {
        self.by_seq.values().all(|e| match &e.index {
            SeqIndex::Vector(v) => v.is_empty(),
            SeqIndex::Tree(t) => t.is_empty(),
        })
    }

    pub fn add_fragment(&mut self, f: &Fragment, id: FragId) {
        let key = FragKey::of(f, id);
        let circular = f.seq().circular();
        let kind = self.kind;
        let entry = self
            .by_seq
            .entry(f.seq_name().to_string())
            .or_insert_with(|| SeqEntry {
                index: match kind {
                    FcKind::Vector => SeqIndex::Vector(Vec::new()),
                    FcKind::Tree => SeqIndex::Tree(BTreeSet::new()),
                },
                circular,
            });
        match &mut entry.index {
            SeqIndex::Vector(v) => {
                v.push(key);
                self.prepared = false;
            }
            SeqIndex::Tree(t) => {
                t.insert(key);
            }
        }
    }

    pub fn remove_fragment(&mut self, f: &Fragment, id: FragId) {
        let key = FragKey::of(f, id);
        if let Some(entry) = self.by_seq.get_mut(f.seq_name()) {
            match &mut entry.index {
                SeqIndex::Vector(v) => v.retain(|&k| k != key),
                SeqIndex::Tree(t) => {
                    t.remove(&key);
                }
            }
        }
    }

    pub fn add_block(&mut self, id: BlockId, block: &Block) {
        for (idx, f) in block.fragments().iter().enumerate() {
            self.add_fragment(f, FragId { block: id, idx });
        }
    }

    pub fn remove_block(&mut self, id: BlockId, block: &Block) {
        for (idx, f) in block.fragments().iter().enumerate() {
            self.remove_fragment(f, FragId { block: id, idx });
        }
    }

    pub fn add_bs(&mut self, bs: &BlockSet) {
        for (id, block) in bs.blocks() {
            self.add_block(id, block);
        }
    }

    pub fn remove_bs(&mut self, bs: &BlockSet) {
        for (id, block) in bs.blocks() {
            self.remove_block(id, block);
        }
    }

    /// Sort vector storages and check the index for duplicates.
    /// Queries on a vector-backed collection require `prepare` first.
    pub fn prepare(&mut self) {
        for entry in self.by_seq.values_mut() {
            if let SeqIndex::Vector(v) = &mut entry.index {
                v.sort();
                for pair in v.windows(2) {
                    assert!(pair[0] < pair[1], "duplicate fragment in collection");
                }
            }
        }
        self.prepared = true;
    }

    fn entry(&self, seq_name: &str) -> Option<&SeqEntry> {
        assert!(self.prepared, "prepare() the collection before querying");
        self.by_seq.get(seq_name)
    }

    fn sorted(&self, seq_name: &str) -> Vec<FragKey> {
        match self.entry(seq_name).map(|e| &e.index) {
            Some(SeqIndex::Vector(v)) => v.clone(),
            Some(SeqIndex::Tree(t)) => t.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    pub fn seq_names(&self) -> Vec<String> {
        self.by_seq.keys().cloned().collect()
    }

    /// All fragment keys of one sequence in positional order.
    pub fn fragments_of(&self, seq_name: &str) -> Vec<FragKey> {
        self.sorted(seq_name)
    }

    fn wraps(&self, entry: &SeqEntry) -> bool {
        self.cycles_allowed && entry.circular
    }

    /// Successor along the sequence, wrapping on circular sequences.
    pub fn next(&self, seq_name: &str, key: FragKey) -> Option<FragKey> {
        let entry = self.entry(seq_name)?;
        let succ = match &entry.index {
            SeqIndex::Vector(v) => {
                let i = match v.binary_search(&key) {
                    Ok(i) => i + 1,
                    Err(i) => i,
                };
                v.get(i).copied()
            }
            SeqIndex::Tree(t) => t.range((Excluded(key), Unbounded)).next().copied(),
        };
        succ.or_else(|| {
            if self.wraps(entry) {
                let first = match &entry.index {
                    SeqIndex::Vector(v) => v.first().copied(),
                    SeqIndex::Tree(t) => t.iter().next().copied(),
                };
                first.filter(|&f| f != key)
            } else {
                None
            }
        })
    }

    /// Predecessor along the sequence, wrapping on circular sequences.
    pub fn prev(&self, seq_name: &str, key: FragKey) -> Option<FragKey> {
        let entry = self.entry(seq_name)?;
        let pred = match &entry.index {
            SeqIndex::Vector(v) => {
                let i = match v.binary_search(&key) {
                    Ok(i) => i,
                    Err(i) => i,
                };
                if i == 0 {
                    None
                } else {
                    v.get(i - 1).copied()
                }
            }
            SeqIndex::Tree(t) => t.range(..key).next_back().copied(),
        };
        pred.or_else(|| {
            if self.wraps(entry) {
                let last = match &entry.index {
                    SeqIndex::Vector(v) => v.last().copied(),
                    SeqIndex::Tree(t) => t.iter().next_back().copied(),
                };
                last.filter(|&l| l != key)
            } else {
                None
            }
        })
    }

    /// Neighbor in sequence direction `ori`.
    pub fn neighbor(&self, seq_name: &str, key: FragKey, ori: Ori) -> Option<FragKey> {
        if ori == 1 {
            self.next(seq_name, key)
        } else {
            self.prev(seq_name, key)
        }
    }

    /// Neighbor in the fragment's own orientation.
    pub fn logical_neighbor(&self, seq_name: &str, key: FragKey, ori: Ori) -> Option<FragKey> {
        self.neighbor(seq_name, key, key.ori * ori)
    }

    pub fn are_neighbors(&self, seq_name: &str, a: FragKey, b: FragKey) -> bool {
        self.next(seq_name, a) == Some(b) || self.prev(seq_name, a) == Some(b)
    }

    pub fn has_overlap(&self) -> bool {
        for seq_name in self.by_seq.keys() {
            let keys = self.sorted(seq_name);
            let mut max_end: Option<Pos> = None;
            for key in keys {
                if let Some(end) = max_end {
                    if key.min_pos <= end {
                        return true;
                    }
                }
                max_end = Some(max_end.map_or(key.max_pos, |e: Pos| e.max(key.max_pos)));
            }
        }
        false
    }

    /// All pairs of overlapping fragments, per sequence, in scan order.
    pub fn find_overlap_fragments(&self) -> Vec<(FragKey, FragKey)> {
        let mut result = Vec::new();
        for seq_name in self.by_seq.keys() {
            let keys = self.sorted(seq_name);
            let mut active: Vec<FragKey> = Vec::new();
            for key in keys {
                active.retain(|a| a.max_pos >= key.min_pos);
                for &a in &active {
                    result.push((a, key));
                }
                active.push(key);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::seq::Sequence;
    use std::sync::Arc;

    fn collection(kind: FcKind, circular: bool) -> (FragmentCollection, Vec<Fragment>) {
        let mut seq = Sequence::new("s1", "ACGTACGTACGTACGT");
        seq.set_circular(circular);
        let seq = Arc::new(seq);
        let frags = vec![
            Fragment::new(seq.clone(), 0, 3, 1),
            Fragment::new(seq.clone(), 5, 7, -1),
            Fragment::new(seq.clone(), 9, 12, 1),
        ];
        let mut fc = FragmentCollection::new(kind);
        for (i, f) in frags.iter().enumerate() {
            fc.add_fragment(f, FragId { block: 0, idx: i });
        }
        fc.prepare();
        (fc, frags)
    }

    fn key(frags: &[Fragment], i: usize) -> FragKey {
        FragKey::of(&frags[i], FragId { block: 0, idx: i })
    }

    #[test]
    fn linear_neighbors() {
        for kind in [FcKind::Vector, FcKind::Tree] {
            let (mut fc, frags) = collection(kind, false);
            fc.set_cycles_allowed(false);
            let (a, b, c) = (key(&frags, 0), key(&frags, 1), key(&frags, 2));
            assert_eq!(fc.next("s1", a), Some(b));
            assert_eq!(fc.prev("s1", b), Some(a));
            assert_eq!(fc.next("s1", c), None);
            assert_eq!(fc.prev("s1", a), None);
            assert!(fc.are_neighbors("s1", a, b));
            assert!(!fc.are_neighbors("s1", a, c));
        }
    }

    #[test]
    fn circular_neighbors_wrap() {
        for kind in [FcKind::Vector, FcKind::Tree] {
            let (fc, frags) = collection(kind, true);
            let (a, c) = (key(&frags, 0), key(&frags, 2));
            assert_eq!(fc.next("s1", c), Some(a));
            assert_eq!(fc.prev("s1", a), Some(c));
            assert!(fc.are_neighbors("s1", a, c));
        }
    }

    #[test]
    fn linear_sequences_never_wrap() {
        let (fc, frags) = collection(FcKind::Vector, false);
        let (a, c) = (key(&frags, 0), key(&frags, 2));
        assert_eq!(fc.next("s1", c), None);
        assert_eq!(fc.prev("s1", a), None);
    }

    #[test]
    fn logical_neighbor_follows_orientation() {
        let (fc, frags) = collection(FcKind::Vector, false);
        let (a, b, c) = (key(&frags, 0), key(&frags, 1), key(&frags, 2));
        // b is reverse, so its logical successor lies leftward
        assert_eq!(fc.logical_neighbor("s1", b, 1), Some(a));
        assert_eq!(fc.logical_neighbor("s1", b, -1), Some(c));
        assert_eq!(fc.logical_neighbor("s1", a, 1), Some(b));
    }

    #[test]
    fn overlap_detection() {
        let seq = Arc::new(Sequence::new("s1", "ACGTACGTACGT"));
        let mut fc = FragmentCollection::new(FcKind::Vector);
        let long = Fragment::new(seq.clone(), 0, 9, 1);
        let inside = Fragment::new(seq.clone(), 2, 3, 1);
        let beyond = Fragment::new(seq.clone(), 10, 11, 1);
        fc.add_fragment(&long, FragId { block: 0, idx: 0 });
        fc.add_fragment(&inside, FragId { block: 1, idx: 0 });
        fc.add_fragment(&beyond, FragId { block: 2, idx: 0 });
        fc.prepare();
        assert!(fc.has_overlap());
        let pairs = fc.find_overlap_fragments();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.frag.block, 0);
        assert_eq!(pairs[0].1.frag.block, 1);
    }

    #[test]
    fn tree_allows_incremental_removal() {
        let (mut fc, frags) = collection(FcKind::Tree, false);
        fc.remove_fragment(&frags[1], FragId { block: 0, idx: 1 });
        let (a, c) = (key(&frags, 0), key(&frags, 2));
        assert_eq!(fc.next("s1", a), Some(c));
        assert!(!fc.has_overlap());
    }
}
