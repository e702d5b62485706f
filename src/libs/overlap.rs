use crate::libs::block::Block;
use crate::libs::blockset::BlockSet;
use crate::libs::error::{PangeneError, Result};
use crate::libs::fc::{FcKind, FragKey, FragmentCollection};
use crate::libs::processor::{Context, Options, OptValue, Processor};
use crate::libs::Pos;

/// Split `block` at the sequence interval `[ov_min, ov_max]` of its
/// fragment `idx`, yielding the pieces left of, inside and right of the
/// corresponding alignment columns.
fn split_block(
    block: &Block,
    idx: usize,
    ov_min: Pos,
    ov_max: Pos,
) -> (Option<Block>, Block, Option<Block>) {
    let f = &block.fragments()[idx];
    let (p_lo, p_hi) = if f.ori() == 1 {
        (ov_min - f.min_pos(), ov_max - f.min_pos())
    } else {
        (f.max_pos() - ov_max, f.max_pos() - ov_min)
    };
    let (c_lo, c_hi) = match f.row() {
        Some(row) => {
            let a = row.map_to_alignment(p_lo);
            let b = row.map_to_alignment(p_hi);
            (a.min(b), a.max(b))
        }
        None => (p_lo, p_hi),
    };
    let length = block.alignment_length();
    let left = if c_lo > 0 {
        Some(block.slice(0, c_lo - 1))
    } else {
        None
    };
    let mid = block.slice(c_lo, c_hi);
    let right = if c_hi < length - 1 {
        Some(block.slice(c_hi + 1, length - 1))
    } else {
        None
    };
    (left, mid, right)
}

/// Drop fragments below the minimum length; `None` when nothing is left.
fn prune(mut block: Block, min_fragment: Pos) -> Option<Block> {
    block
        .fragments_mut()
        .retain(|f| f.length() >= min_fragment);
    if block.is_empty() {
        None
    } else {
        block.set_canonical_name();
        Some(block)
    }
}

/// Merge the two overlap slices, dropping coordinate duplicates. Rows
/// survive only when both sides agree on the column count.
fn merge_overlap(a_mid: Block, b_mid: Block) -> Block {
    let mut merged = a_mid.clone();
    for f in b_mid.fragments() {
        if !merged.fragments().iter().any(|existing| existing == f) {
            merged.insert(f.clone());
        }
    }
    if a_mid.alignment_length() != b_mid.alignment_length() {
        for f in merged.fragments_mut() {
            f.set_row(None);
        }
    }
    merged.set_canonical_name();
    merged
}

/// Splits overlapping blocks until no two fragments of the set share a
/// sequence position partially; the result tiles every sequence.
pub struct OverlapsResolver {
    options: Options,
}

impl OverlapsResolver {
    pub fn new() -> Self {
        let mut options = Options::new();
        options.add(
            "min-fragment",
            "Shortest piece kept when splitting overlaps",
            OptValue::Int(1),
        );
        OverlapsResolver { options }
    }
}

impl Default for OverlapsResolver {
    fn default() -> Self {
        OverlapsResolver::new()
    }
}

fn overlap_pair(bs: &BlockSet) -> Option<(FragKey, FragKey)> {
    let mut fc = FragmentCollection::new(FcKind::Vector);
    fc.set_cycles_allowed(false);
    fc.add_bs(bs);
    fc.prepare();
    fc.find_overlap_fragments().into_iter().next()
}

impl Processor for OverlapsResolver {
    fn name(&self) -> &'static str {
        "OverlapsResolver"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        let min_fragment = self.options.int_("min-fragment", &ctx.meta)?;
        let mut rounds = 0usize;
        loop {
            ctx.check_interrupt()?;
            let bs = ctx.bs_mut("target")?;
            let Some((a, b)) = overlap_pair(bs) else {
                break;
            };
            rounds += 1;
            if rounds > 1_000_000 {
                return Err(PangeneError::Invariant(
                    "overlap resolution does not converge".to_string(),
                ));
            }

            if a.frag.block == b.frag.block {
                // an overlap inside one block (tandem expansion);
                // drop the later fragment
                let block = bs.get_mut(a.frag.block).expect("indexed block");
                block.remove(b.frag.idx);
                block.set_canonical_name();
                continue;
            }

            let ov_min = a.min_pos.max(b.min_pos);
            let ov_max = a.max_pos.min(b.max_pos);
            let block_a = bs.get(a.frag.block).expect("indexed block").clone();
            let block_b = bs.get(b.frag.block).expect("indexed block").clone();
            let (a_left, a_mid, a_right) = split_block(&block_a, a.frag.idx, ov_min, ov_max);
            let (b_left, b_mid, b_right) = split_block(&block_b, b.frag.idx, ov_min, ov_max);

            bs.erase(a.frag.block);
            bs.erase(b.frag.block);
            let mut pieces: Vec<Block> = Vec::new();
            pieces.push(merge_overlap(a_mid, b_mid));
            pieces.extend(a_left);
            pieces.extend(a_right);
            pieces.extend(b_left);
            pieces.extend(b_right);
            for piece in pieces {
                if let Some(kept) = prune(piece, min_fragment) {
                    bs.insert(kept);
                }
            }
        }
        log::debug!("OverlapsResolver: {} splits", rounds);
        Ok(())
    }
}

/// Fails when any partial overlap remains in the target block set.
pub struct CheckNoOverlaps {
    options: Options,
}

impl CheckNoOverlaps {
    pub fn new() -> Self {
        CheckNoOverlaps {
            options: Options::new(),
        }
    }
}

impl Default for CheckNoOverlaps {
    fn default() -> Self {
        CheckNoOverlaps::new()
    }
}

impl Processor for CheckNoOverlaps {
    fn name(&self) -> &'static str {
        "CheckNoOverlaps"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        let bs = ctx.bs("target")?;
        let mut fc = FragmentCollection::new(FcKind::Vector);
        fc.set_cycles_allowed(false);
        fc.add_bs(bs);
        fc.prepare();
        if fc.has_overlap() {
            return Err(PangeneError::Invariant(
                "block set still contains overlapping fragments".to_string(),
            ));
        }
        Ok(())
    }
}
