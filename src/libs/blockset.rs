use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::libs::block::Block;
use crate::libs::error::{PangeneError, Result};
use crate::libs::seq::Sequence;
use crate::libs::{Ori, Pos};

/// Stable handle of a block inside its block set.
pub type BlockId = u64;

/// One row of a block-set alignment: the blocks met along a sequence,
/// column-aligned against the other rows, `None` for gap columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BsaRow {
    pub ori: Ori,
    pub cells: Vec<Option<(String, Ori)>>,
}

impl BsaRow {
    pub fn length(&self) -> usize {
        self.cells.len()
    }
}

/// A named second-level alignment over blocks, one row per sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bsa {
    rows: BTreeMap<String, BsaRow>,
}

impl Bsa {
    pub fn new() -> Self {
        Bsa::default()
    }

    pub fn set_row(&mut self, seq_name: &str, row: BsaRow) {
        self.rows.insert(seq_name.to_string(), row);
    }

    pub fn row(&self, seq_name: &str) -> Option<&BsaRow> {
        self.rows.get(seq_name)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&String, &BsaRow)> {
        self.rows.iter()
    }

    pub fn length(&self) -> usize {
        self.rows.values().map(|r| r.length()).max().unwrap_or(0)
    }
}

/// Owning collection of sequences, blocks and named block-set
/// alignments. Blocks are kept in insertion order; handles stay valid
/// until the block is erased.
#[derive(Debug, Clone, Default)]
pub struct BlockSet {
    sequences: Vec<Arc<Sequence>>,
    blocks: IndexMap<BlockId, Block>,
    next_id: BlockId,
    bsas: BTreeMap<String, Bsa>,
}

impl BlockSet {
    pub fn new() -> Self {
        BlockSet::default()
    }

    pub fn add_sequence(&mut self, seq: Arc<Sequence>) -> Result<()> {
        if self.find_sequence(seq.name()).is_some() {
            return Err(PangeneError::Invariant(format!(
                "duplicate sequence name {}",
                seq.name()
            )));
        }
        self.sequences.push(seq);
        Ok(())
    }

    pub fn sequences(&self) -> &[Arc<Sequence>] {
        &self.sequences
    }

    pub fn find_sequence(&self, name: &str) -> Option<Arc<Sequence>> {
        self.sequences
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Sorted distinct genome tags of the contained sequences.
    pub fn genomes(&self) -> Vec<String> {
        self.sequences
            .iter()
            .map(|s| s.genome().to_string())
            .filter(|g| !g.is_empty())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn total_sequence_length(&self) -> Pos {
        self.sequences.iter().map(|s| s.len()).sum()
    }

    /// Insert a block; an empty name is replaced by the canonical one.
    pub fn insert(&mut self, mut block: Block) -> BlockId {
        if block.name().is_empty() {
            block.set_canonical_name();
        }
        let id = self.next_id;
        self.next_id += 1;
        self.blocks.insert(id, block);
        id
    }

    pub fn erase(&mut self, id: BlockId) -> Option<Block> {
        self.blocks.shift_remove(&id)
    }

    pub fn has(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(&id)
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter().map(|(&id, b)| (id, b))
    }

    pub fn blocks_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Drop all blocks (and with them all fragments). Sequences stay.
    pub fn clear_blocks(&mut self) {
        self.blocks.clear();
    }

    pub fn set_bsa(&mut self, name: &str, bsa: Bsa) {
        self.bsas.insert(name.to_string(), bsa);
    }

    pub fn bsa(&self, name: &str) -> Option<&Bsa> {
        self.bsas.get(name)
    }

    pub fn bsa_names(&self) -> Vec<String> {
        self.bsas.keys().cloned().collect()
    }

    /// Enforce the universal data-model invariants.
    pub fn validate(&self) -> Result<()> {
        for (id, block) in self.blocks() {
            let mut row_length: Option<Pos> = None;
            let mut all_rows = true;
            for f in block.fragments() {
                if self.find_sequence(f.seq_name()).is_none() {
                    return Err(PangeneError::Invariant(format!(
                        "block {} ({}) references unknown sequence {}",
                        block.name(),
                        id,
                        f.seq_name()
                    )));
                }
                if !f.valid() {
                    return Err(PangeneError::Invariant(format!(
                        "fragment {} is off its sequence",
                        f.id()
                    )));
                }
                match f.row() {
                    Some(row) => {
                        if row.length() < f.length() {
                            return Err(PangeneError::Invariant(format!(
                                "fragment {} has a row shorter than itself",
                                f.id()
                            )));
                        }
                        if let Some(len) = row_length {
                            if len != row.length() {
                                return Err(PangeneError::Invariant(format!(
                                    "block {} mixes row lengths {} and {}",
                                    block.name(),
                                    len,
                                    row.length()
                                )));
                            }
                        }
                        row_length = Some(row.length());
                    }
                    None => all_rows = false,
                }
            }
            if let (Some(len), true) = (row_length, all_rows) {
                if len != block.alignment_length() {
                    return Err(PangeneError::Invariant(format!(
                        "block {} alignment length mismatch",
                        block.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Content equality used by the round-trip law: sequences compared
    /// by attributes and text, blocks as multisets of fragments.
    pub fn equal_content(&self, other: &BlockSet) -> bool {
        let seq_key = |bs: &BlockSet| -> Vec<(String, String, String, bool, String)> {
            bs.sequences
                .iter()
                .map(|s| {
                    (
                        s.name().to_string(),
                        s.genome().to_string(),
                        s.chromosome().to_string(),
                        s.circular(),
                        s.text(),
                    )
                })
                .sorted()
                .collect()
        };
        if seq_key(self) != seq_key(other) {
            return false;
        }
        let block_key = |bs: &BlockSet| -> Vec<Vec<(String, Pos, Pos, Ori, String)>> {
            bs.blocks
                .values()
                .map(|b| {
                    b.fragments()
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
                        .collect::<Vec<_>>()
                })
                .sorted()
                .collect()
        };
        block_key(self) == block_key(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::fragment::Fragment;

    fn sample() -> BlockSet {
        let mut bs = BlockSet::new();
        let seq = Arc::new(Sequence::new("s1", "ACGTACGT"));
        bs.add_sequence(seq.clone()).unwrap();
        let mut block = Block::new();
        block.insert(Fragment::new(seq, 0, 3, 1));
        bs.insert(block);
        bs
    }

    #[test]
    fn duplicate_sequence_rejected() {
        let mut bs = sample();
        let dup = Arc::new(Sequence::new("s1", "AAAA"));
        assert!(bs.add_sequence(dup).is_err());
    }

    #[test]
    fn insert_names_blocks_canonically() {
        let bs = sample();
        let (_, block) = bs.blocks().next().unwrap();
        assert!(!block.name().is_empty());
        assert!(block.name().starts_with("1x4_"));
    }

    #[test]
    fn erase_drops_handles() {
        let mut bs = sample();
        let id = bs.block_ids()[0];
        assert!(bs.has(id));
        bs.erase(id);
        assert!(!bs.has(id));
        assert!(bs.is_empty());
        assert_eq!(bs.sequences().len(), 1);
    }

    #[test]
    fn validate_catches_off_sequence_fragments() {
        let mut bs = sample();
        let seq = bs.find_sequence("s1").unwrap();
        let mut bad = Block::new();
        bad.insert(Fragment::new(seq, 5, 9, 1));
        bs.insert(bad);
        assert!(bs.validate().is_err());
    }

    #[test]
    fn validate_catches_foreign_sequences() {
        let mut bs = sample();
        let foreign = Arc::new(Sequence::new("other", "ACGT"));
        let mut bad = Block::new();
        bad.insert(Fragment::new(foreign, 0, 3, 1));
        bs.insert(bad);
        assert!(bs.validate().is_err());
    }

    #[test]
    fn empty_set_is_valid_content_equal() {
        let a = BlockSet::new();
        let b = BlockSet::new();
        assert!(a.validate().is_ok());
        assert!(a.equal_content(&b));
    }

    #[test]
    fn bsa_rows_are_kept_by_name() {
        let mut bs = sample();
        let mut bsa = Bsa::new();
        bsa.set_row(
            "s1",
            BsaRow {
                ori: 1,
                cells: vec![Some(("b1".to_string(), 1)), None],
            },
        );
        bs.set_bsa("default", bsa);
        assert_eq!(bs.bsa_names(), vec!["default".to_string()]);
        let row = bs.bsa("default").unwrap().row("s1").unwrap();
        assert_eq!(row.length(), 2);
        assert_eq!(bs.bsa("default").unwrap().length(), 2);
    }
}
