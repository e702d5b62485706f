use crate::libs::aligner::make_aligner;
use crate::libs::block::Block;
use crate::libs::blockset::{BlockId, BlockSet};
use crate::libs::error::Result;
use crate::libs::fc::{FcKind, FragId, FragKey, FragmentCollection};
use crate::libs::fragment::Fragment;
use crate::libs::processor::{Context, Options, OptValue, Processor};
use crate::libs::row::{Row, RowKind};
use crate::libs::{Ori, Pos};

/// Fuses adjacent collinear blocks of equal size. Two blocks join when
/// every fragment of one has its partner in the other as a logical
/// neighbor on the same sequence with the same orientation, and the
/// per-sequence gaps are uniform enough.
pub struct Joiner {
    options: Options,
}

impl Joiner {
    pub fn new() -> Self {
        let mut options = Options::new();
        options.add(
            "aligner",
            "Aligner used for the inter-fragment regions",
            OptValue::Str("similar".to_string()),
        );
        options.add(
            "max-gap",
            "Largest allowed gap between joined fragments, -1 for no limit",
            OptValue::Int(-1),
        );
        options.add(
            "gap-ratio",
            "Largest allowed max/min gap ratio, -1 for no limit",
            OptValue::Decimal(-1.0),
        );
        Joiner { options }
    }
}

impl Default for Joiner {
    fn default() -> Self {
        Joiner::new()
    }
}

struct JoinParams {
    max_gap: Pos,
    gap_ratio: f64,
}

fn fragment_at<'a>(bs: &'a BlockSet, id: FragId) -> &'a Fragment {
    &bs.get(id.block).expect("indexed block").fragments()[id.idx]
}

/// The block adjacent to `front` of the given block in direction `ori`.
fn neighbor_block(
    bs: &BlockSet,
    fc: &FragmentCollection,
    id: BlockId,
    ori: Ori,
) -> Option<BlockId> {
    let block = bs.get(id)?;
    let f = block.front()?;
    let key = FragKey::of(f, FragId { block: id, idx: 0 });
    let neighbor = fc.neighbor(f.seq_name(), key, ori)?;
    Some(neighbor.frag.block)
}

/// The pairing of `one`'s fragments with `another`'s in logical
/// direction `lori`, or `None` when the blocks are not joinable that
/// way. `flip` tells whether `another` matches after inversion.
fn pairing(
    bs: &BlockSet,
    fc: &FragmentCollection,
    one_id: BlockId,
    another_id: BlockId,
    lori: Ori,
    flip: bool,
) -> Option<Vec<(usize, FragId)>> {
    let one = bs.get(one_id)?;
    let mut pairs = Vec::with_capacity(one.size());
    for (idx, f) in one.fragments().iter().enumerate() {
        let key = FragKey::of(
            f,
            FragId {
                block: one_id,
                idx,
            },
        );
        let partner_key = fc.logical_neighbor(f.seq_name(), key, lori)?;
        if partner_key.frag.block != another_id {
            return None;
        }
        let partner = fragment_at(bs, partner_key.frag);
        if partner.seq_name() != f.seq_name() {
            return None;
        }
        let wanted_ori = if flip { -f.ori() } else { f.ori() };
        if partner.ori() != wanted_ori {
            return None;
        }
        if !fc.are_neighbors(f.seq_name(), key, partner_key) {
            return None;
        }
        pairs.push((idx, partner_key.frag));
    }
    // injective: each partner used once, so the whole of `another` is
    // covered (sizes are equal)
    let mut partners: Vec<FragId> = pairs.iter().map(|&(_, p)| p).collect();
    partners.sort();
    partners.dedup();
    if partners.len() != one.size() {
        return None;
    }
    Some(pairs)
}

fn gaps_are_uniform(bs: &BlockSet, pairs: &[(usize, FragId)], one: &Block, params: &JoinParams) -> bool {
    let mut min_gap: Option<Pos> = None;
    let mut max_gap: Option<Pos> = None;
    for &(idx, partner_id) in pairs {
        let f = &one.fragments()[idx];
        let partner = fragment_at(bs, partner_id);
        let dist = f.dist_to(partner);
        min_gap = Some(min_gap.map_or(dist, |g| g.min(dist)));
        max_gap = Some(max_gap.map_or(dist, |g| g.max(dist)));
    }
    let (min_gap, max_gap) = (min_gap.unwrap_or(0), max_gap.unwrap_or(0));
    if params.max_gap >= 0 && max_gap > params.max_gap {
        return false;
    }
    if params.gap_ratio >= 0.0
        && (max_gap + 1) as f64 / (min_gap + 1) as f64 > params.gap_ratio
    {
        return false;
    }
    true
}

/// Merge one pair of fragments into a fragment spanning both.
fn join_fragments(f: &Fragment, partner: &Fragment) -> Fragment {
    let mut joined = Fragment::new(
        f.seq().clone(),
        f.min_pos().min(partner.min_pos()),
        f.max_pos().max(partner.max_pos()),
        f.ori(),
    );
    joined.set_ori(f.ori());
    joined
}

/// Build the joined block, re-aligning the inter-fragment regions when
/// both parents carry alignments.
fn join_blocks(
    bs: &BlockSet,
    one_id: BlockId,
    pairs: &[(usize, FragId)],
    lori: Ori,
    flip: bool,
    aligner_name: &str,
) -> Block {
    let one = bs.get(one_id).expect("indexed block");
    let another_id = pairs[0].1.block;
    let another = bs.get(another_id).expect("indexed block");
    let aln = one.has_rows() && another.has_rows();

    let mut result = Block::new();
    let mut middles: Vec<String> = Vec::new();
    let mut parts: Vec<(String, String)> = Vec::new();
    for &(idx, partner_id) in pairs {
        let f = &one.fragments()[idx];
        let mut partner = fragment_at(bs, partner_id).clone();
        if flip {
            partner.inverse();
        }
        let joined = join_fragments(f, &partner);
        if aln {
            let (gap_min, gap_max) = if f.max_pos() < partner.min_pos() {
                (f.max_pos() + 1, partner.min_pos() - 1)
            } else {
                (partner.max_pos() + 1, f.min_pos() - 1)
            };
            let middle = if gap_min <= gap_max {
                Fragment::new(f.seq().clone(), gap_min, gap_max, f.ori()).str()
            } else {
                String::new()
            };
            middles.push(middle);
            parts.push((f.alignment_string(), partner.alignment_string()));
        }
        result.insert(joined);
    }
    if aln {
        make_aligner(aligner_name).align_seqs(&mut middles);
        for (i, (f_text, partner_text)) in parts.iter().enumerate() {
            let row_text = if lori == 1 {
                format!("{}{}{}", f_text, middles[i], partner_text)
            } else {
                format!("{}{}{}", partner_text, middles[i], f_text)
            };
            let row = Row::from_alignment_string(RowKind::Compact, &row_text);
            result.fragments_mut()[i].set_row(Some(row));
        }
    }
    result.set_canonical_name();
    result
}

/// Try to fuse two blocks; `None` if the joinability predicate fails.
fn try_join(
    bs: &BlockSet,
    fc: &FragmentCollection,
    one_id: BlockId,
    another_id: BlockId,
    params: &JoinParams,
    aligner_name: &str,
) -> Option<Block> {
    let one = bs.get(one_id)?;
    let another = bs.get(another_id)?;
    if one.weak() || another.weak() {
        return None;
    }
    if one.size() != another.size() || one.size() < 2 {
        return None;
    }
    let match_ori = one.match_ori(another);
    if match_ori == 0 {
        return None;
    }
    let flip = match_ori == -1;
    for lori in [1, -1] {
        if let Some(pairs) = pairing(bs, fc, one_id, another_id, lori, flip) {
            if !gaps_are_uniform(bs, &pairs, one, params) {
                return None;
            }
            return Some(join_blocks(bs, one_id, &pairs, lori, flip, aligner_name));
        }
    }
    None
}

impl Processor for Joiner {
    fn name(&self) -> &'static str {
        "Joiner"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        let params = JoinParams {
            max_gap: self.options.int_("max-gap", &ctx.meta)?,
            gap_ratio: self.options.decimal_("gap-ratio", &ctx.meta)?,
        };
        let aligner_name = self.options.str_("aligner", &ctx.meta)?;
        let mut bs = ctx.take_bs("target")?;

        let mut fc = FragmentCollection::new(FcKind::Tree);
        fc.set_cycles_allowed(false);
        fc.add_bs(&bs);

        let mut joins = 0usize;
        let mut ids = bs.block_ids();
        ids.sort_by_key(|&id| {
            std::cmp::Reverse(bs.get(id).map(|b| b.size()).unwrap_or(0))
        });
        for id in ids {
            if !bs.has(id) {
                continue;
            }
            let mut current = id;
            for ori in [-1, 1] {
                loop {
                    let Some(other_id) = neighbor_block(&bs, &fc, current, ori) else {
                        break;
                    };
                    if other_id == current || !bs.has(other_id) {
                        break;
                    }
                    let Some(new_block) =
                        try_join(&bs, &fc, current, other_id, &params, &aligner_name)
                    else {
                        break;
                    };
                    fc.remove_block(current, bs.get(current).expect("current block"));
                    fc.remove_block(other_id, bs.get(other_id).expect("other block"));
                    bs.erase(current);
                    bs.erase(other_id);
                    let new_id = bs.insert(new_block);
                    fc.add_block(new_id, bs.get(new_id).expect("joined block"));
                    current = new_id;
                    joins += 1;
                }
            }
        }
        log::debug!("Joiner: {} joins", joins);
        ctx.set_bs("target", bs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::processor::{run_processor, Meta};
    use crate::libs::seq::Sequence;
    use std::sync::Arc;

    fn two_seqs() -> (Arc<Sequence>, Arc<Sequence>) {
        (
            Arc::new(Sequence::new("s1", "tggtcCGAGATgcgggcc")),
            Arc::new(Sequence::new("s2", "tggtcCGAGATgcgggcc")),
        )
    }

    fn block_on_both(
        seq1: &Arc<Sequence>,
        seq2: &Arc<Sequence>,
        min: Pos,
        max: Pos,
    ) -> Block {
        let mut block = Block::new();
        block.insert(Fragment::new(seq1.clone(), min, max, 1));
        block.insert(Fragment::new(seq2.clone(), min, max, 1));
        block
    }

    fn run_joiner(bs: BlockSet) -> BlockSet {
        let mut ctx = Context::new(Meta::new());
        ctx.set_bs("target", bs);
        run_processor(&Joiner::new(), &mut ctx).unwrap();
        ctx.take_bs("target").unwrap()
    }

    #[test]
    fn joins_three_collinear_blocks() {
        let (seq1, seq2) = two_seqs();
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        bs.insert(block_on_both(&seq1, &seq2, 5, 6));
        bs.insert(block_on_both(&seq1, &seq2, 8, 10));
        bs.insert(block_on_both(&seq1, &seq2, 11, 12));

        let bs = run_joiner(bs);
        assert_eq!(bs.blocks_count(), 1);
        let (_, block) = bs.blocks().next().unwrap();
        assert_eq!(block.size(), 2);
        for f in block.fragments() {
            assert_eq!(f.length(), 8);
            assert_eq!((f.min_pos(), f.max_pos()), (5, 12));
        }
        bs.validate().unwrap();
    }

    #[test]
    fn join_rebuilds_rows_over_the_gap() {
        let (seq1, seq2) = two_seqs();
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        let mut left = block_on_both(&seq1, &seq2, 5, 6);
        let mut right = block_on_both(&seq1, &seq2, 8, 10);
        for block in [&mut left, &mut right] {
            for f in block.fragments_mut() {
                let len = f.length();
                f.set_row(Some(Row::identity(RowKind::Compact, len)));
            }
        }
        bs.insert(left);
        bs.insert(right);

        let bs = run_joiner(bs);
        assert_eq!(bs.blocks_count(), 1);
        let (_, block) = bs.blocks().next().unwrap();
        assert!(block.has_rows());
        assert_eq!(block.alignment_length(), 6);
        for f in block.fragments() {
            assert_eq!(f.length(), 6);
            assert_eq!(f.alignment_string(), f.str());
        }
        bs.validate().unwrap();
    }

    #[test]
    fn weak_blocks_never_join() {
        let (seq1, seq2) = two_seqs();
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        let mut weak = block_on_both(&seq1, &seq2, 5, 6);
        weak.set_weak(true);
        bs.insert(weak);
        bs.insert(block_on_both(&seq1, &seq2, 8, 10));

        let bs = run_joiner(bs);
        assert_eq!(bs.blocks_count(), 2);
    }

    #[test]
    fn different_sizes_never_join() {
        let (seq1, seq2) = two_seqs();
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        bs.insert(block_on_both(&seq1, &seq2, 5, 6));
        let mut bigger = block_on_both(&seq1, &seq2, 8, 10);
        bigger.insert(Fragment::new(seq1.clone(), 14, 16, 1));
        bs.insert(bigger);

        let bs = run_joiner(bs);
        assert_eq!(bs.blocks_count(), 2);
    }

    #[test]
    fn gap_limit_blocks_joining() {
        let (seq1, seq2) = two_seqs();
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        bs.insert(block_on_both(&seq1, &seq2, 5, 6));
        bs.insert(block_on_both(&seq1, &seq2, 11, 12));

        let mut ctx = Context::new(Meta::new());
        ctx.set_bs("target", bs);
        let mut joiner = Joiner::new();
        joiner.options_mut().set("max-gap", "2").unwrap();
        run_processor(&joiner, &mut ctx).unwrap();
        assert_eq!(ctx.bs("target").unwrap().blocks_count(), 2);
    }

    #[test]
    fn inverted_partner_joins_after_flip() {
        let (seq1, seq2) = two_seqs();
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        bs.insert(block_on_both(&seq1, &seq2, 5, 6));
        let mut inverted = block_on_both(&seq1, &seq2, 8, 10);
        inverted.inverse();
        bs.insert(inverted);

        let bs = run_joiner(bs);
        assert_eq!(bs.blocks_count(), 1);
        let (_, block) = bs.blocks().next().unwrap();
        for f in block.fragments() {
            assert_eq!((f.min_pos(), f.max_pos(), f.ori()), (5, 10, 1));
        }
    }
}
