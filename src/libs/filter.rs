use crate::libs::block::Block;
use crate::libs::blockset::{BlockId, BlockSet};
use crate::libs::error::Result;
use crate::libs::fragment::Fragment;
use crate::libs::jobs::{process_blocks, BlocksJob, Mutations};
use crate::libs::processor::{Context, Meta, Options, OptValue, Processor};
use crate::libs::Pos;

pub fn add_size_limits_options(options: &mut Options) {
    options.add_global(
        "min-fragment",
        "Minimum length of fragments",
        OptValue::Int(0),
        "MIN_LENGTH",
    );
    options.add(
        "max-fragment",
        "Maximum length of fragments, -1 for no limit",
        OptValue::Int(-1),
    );
    options.add("min-block", "Minimum number of fragments in a block", OptValue::Int(2));
    options.add(
        "max-block",
        "Maximum number of fragments in a block, -1 for no limit",
        OptValue::Int(-1),
    );
    options.add("min-spreading", "Minimum fragment length spreading", OptValue::Decimal(0.0));
    options.add_global(
        "max-spreading",
        "Maximum fragment length spreading",
        OptValue::Decimal(0.0),
        "MAX_SPREADING",
    );
    options.add_global(
        "min-identity",
        "Minimum block identity",
        OptValue::Decimal(0.0),
        "MIN_IDENTITY",
    );
    options.add("max-identity", "Maximum block identity", OptValue::Decimal(1.0));
    options.add("min-gaps", "Minimum share of gapped columns", OptValue::Decimal(0.0));
    options.add("max-gaps", "Maximum share of gapped columns", OptValue::Decimal(0.2));
}

/// Resolved length requirements of one run.
#[derive(Debug, Clone)]
struct LengthRequirements {
    min_fragment: Pos,
    max_fragment: Pos,
    min_block: i64,
    max_block: i64,
    min_spreading: f64,
    max_spreading: f64,
    min_identity: f64,
    max_identity: f64,
    min_gaps: f64,
    max_gaps: f64,
    edge_window_check: bool,
}

impl LengthRequirements {
    fn read(options: &Options, meta: &Meta) -> Result<Self> {
        Ok(LengthRequirements {
            min_fragment: options.int_("min-fragment", meta)?,
            max_fragment: options.int_("max-fragment", meta)?,
            min_block: options.int_("min-block", meta)?,
            max_block: options.int_("max-block", meta)?,
            min_spreading: options.decimal_("min-spreading", meta)?,
            max_spreading: options.decimal_("max-spreading", meta)?,
            min_identity: options.decimal_("min-identity", meta)?,
            max_identity: options.decimal_("max-identity", meta)?,
            min_gaps: options.decimal_("min-gaps", meta)?,
            max_gaps: options.decimal_("max-gaps", meta)?,
            edge_window_check: options.bool_("edge-window-check", meta)?,
        })
    }

    /// Window size used both for edge checks and sub-block search: the
    /// minimum fragment length inflated by the allowed share of gaps.
    fn max_frame(&self, alignment_length: Pos) -> Pos {
        let nongaps = (1.0 - self.max_gaps).clamp(0.5, 0.999);
        let frame = (self.min_fragment as f64 / nongaps) as Pos + 1;
        frame.min(alignment_length)
    }
}

/// Running column-class counters over a window.
#[derive(Debug, Clone, Copy, Default)]
struct IdentGapStat {
    ident_nogap: i64,
    ident_gap: i64,
    noident_nogap: i64,
    noident_gap: i64,
}

impl IdentGapStat {
    fn add(&mut self, gap: bool, ident: bool) {
        match (gap, ident) {
            (true, true) => self.ident_gap += 1,
            (true, false) => self.noident_gap += 1,
            (false, true) => self.ident_nogap += 1,
            (false, false) => self.noident_nogap += 1,
        }
    }

    fn del(&mut self, gap: bool, ident: bool) {
        match (gap, ident) {
            (true, true) => self.ident_gap -= 1,
            (true, false) => self.noident_gap -= 1,
            (false, true) => self.ident_nogap -= 1,
            (false, false) => self.noident_nogap -= 1,
        }
    }

    fn total(&self) -> i64 {
        self.ident_nogap + self.ident_gap + self.noident_nogap + self.noident_gap
    }

    fn identity(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.ident_nogap as f64 / self.total() as f64
        }
    }

    fn gaps(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            (self.ident_gap + self.noident_gap) as f64 / self.total() as f64
        }
    }
}

fn good_contents(stat: &IdentGapStat, lr: &LengthRequirements) -> bool {
    let identity = stat.identity();
    let gaps = stat.gaps();
    identity <= lr.max_identity
        && identity >= lr.min_identity
        && gaps <= lr.max_gaps
        && gaps >= lr.min_gaps
}

/// Per-fragment window lengths between two alignment columns must stay
/// within bounds, and so must their spreading.
fn good_lengths(block: &Block, start: Pos, stop: Pos, lr: &LengthRequirements) -> bool {
    if block.is_empty() {
        return false;
    }
    let mut lengths: Vec<Pos> = Vec::with_capacity(block.size());
    for fragment in block.fragments() {
        let row = fragment.row().expect("sub-block search needs rows");
        let mut f_start = row.nearest_in_fragment(start);
        let mut f_stop = row.nearest_in_fragment(stop);
        if f_start == -1 || f_stop == -1 {
            return false;
        }
        if row.map_to_alignment(f_start) < start {
            f_start += 1;
        }
        if row.map_to_alignment(f_stop) > stop {
            f_stop -= 1;
        }
        let f_length = f_stop - f_start + 1;
        if (lr.max_fragment != -1 && f_length > lr.max_fragment) || f_length < lr.min_fragment {
            return false;
        }
        lengths.push(f_length);
    }
    let max = *lengths.iter().max().expect("non-empty");
    let min = *lengths.iter().min().expect("non-empty");
    let avg = lengths.iter().sum::<Pos>() / lengths.len() as Pos;
    let spreading = if avg == 0 {
        0.0
    } else {
        (max - min) as f64 / avg as f64
    };
    spreading <= lr.max_spreading && spreading >= lr.min_spreading
}

/// Quality gate for blocks: drops bad blocks, carves good sub-blocks
/// out of bad ones, or copies good blocks to the `other` block set.
pub struct Filter {
    options: Options,
}

impl Filter {
    pub fn new() -> Self {
        let mut options = Options::new();
        add_size_limits_options(&mut options);
        options.add(
            "find-subblocks",
            "Find and add good subblocks of bad blocks",
            OptValue::Bool(true),
        );
        options.add(
            "good-to-other",
            "Do not remove bad blocks, but copy good blocks to the other blockset",
            OptValue::Bool(false),
        );
        options.add(
            "edge-window-check",
            "Additionally require good content in the edge windows",
            OptValue::Bool(true),
        );
        options.add_rule("min-fragment >= 0");
        Filter { options }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::new()
    }
}

fn is_good_fragment(fragment: &Fragment, lr: &LengthRequirements) -> bool {
    fragment.valid()
        && fragment.length() >= lr.min_fragment
        && (lr.max_fragment == -1 || fragment.length() <= lr.max_fragment)
}

/// Remove bad fragments in place; true if anything was removed.
fn filter_block(block: &mut Block, lr: &LengthRequirements) -> bool {
    let before = block.size();
    block.fragments_mut().retain(|f| is_good_fragment(f, lr));
    block.size() != before
}

fn is_good_block(block: &Block, lr: &LengthRequirements) -> bool {
    if block.fragments().iter().any(|f| !is_good_fragment(f, lr)) {
        return false;
    }
    let size = block.size() as i64;
    if size < lr.min_block {
        return false;
    }
    if lr.max_block != -1 && size > lr.max_block {
        return false;
    }
    let spreading = block.spreading();
    if spreading < lr.min_spreading || spreading > lr.max_spreading {
        return false;
    }
    if block.has_rows() {
        let stat = block.make_stat();
        let identity = stat.identity();
        let gaps_total = stat.ident_gap + stat.noident_gap;
        let gaps = if stat.total == 0 {
            0.0
        } else {
            gaps_total as f64 / stat.total as f64
        };
        if identity < lr.min_identity || identity > lr.max_identity {
            return false;
        }
        if gaps < lr.min_gaps || gaps > lr.max_gaps {
            return false;
        }
        // asymmetric branch of the source: blocks filtered for high
        // identity must also look good near both edges
        if lr.min_identity > 0.05 && lr.edge_window_check {
            let alignment_length = block.alignment_length();
            let frame = lr.max_frame(alignment_length);
            let mut stat_start = IdentGapStat::default();
            for pos in 0..frame {
                let (ident, gap, _) = block.test_column(pos);
                stat_start.add(gap, ident);
            }
            if !good_contents(&stat_start, lr) {
                return false;
            }
            let mut stat_stop = IdentGapStat::default();
            for pos in (alignment_length - frame)..alignment_length {
                let (ident, gap, _) = block.test_column(pos);
                stat_stop.add(gap, ident);
            }
            if !good_contents(&stat_stop, lr) {
                return false;
            }
        }
    }
    true
}

/// Sliding-window search for maximal good column ranges of a bad block.
fn find_good_subblocks(block: &Block, lr: &LengthRequirements) -> Vec<Block> {
    let mut result = Vec::new();
    if (block.size() as i64) < lr.min_block {
        return result;
    }
    if !block.has_rows() {
        return result;
    }
    let alignment_length = block.alignment_length();
    if alignment_length < lr.min_fragment {
        return result;
    }
    let mut gap = vec![false; alignment_length as usize];
    let mut ident = vec![false; alignment_length as usize];
    for col in 0..alignment_length {
        let (ident1, gap1, _) = block.test_column(col);
        ident[col as usize] = ident1;
        gap[col as usize] = gap1;
    }
    let min_test = lr.min_fragment;
    let max_test = lr.max_frame(alignment_length);
    let mut cand = vec![false; alignment_length as usize];
    for test in (min_test..=max_test).rev() {
        if test <= 0 || test > alignment_length {
            continue;
        }
        let mut start: Pos = 0;
        let mut stop: Pos = test - 1;
        let mut stat = IdentGapStat::default();
        for pos in start..=stop {
            stat.add(gap[pos as usize], ident[pos as usize]);
        }
        loop {
            if good_contents(&stat, lr) {
                for j in start..=stop {
                    cand[j as usize] = true;
                }
            }
            if stop + 1 >= alignment_length {
                break;
            }
            stop += 1;
            stat.add(gap[stop as usize], ident[stop as usize]);
            stat.del(gap[start as usize], ident[start as usize]);
            start += 1;
        }
    }
    // maximal candidate runs become sub-block slices
    let mut run_start: Pos = -1;
    let mut runs: Vec<(Pos, Pos)> = Vec::new();
    for i in 0..alignment_length {
        if cand[i as usize] && run_start == -1 {
            run_start = i;
        } else if !cand[i as usize] && run_start != -1 {
            runs.push((run_start, i - 1));
            run_start = -1;
        }
    }
    if run_start != -1 {
        runs.push((run_start, alignment_length - 1));
    }
    for (start, stop) in runs {
        if !good_lengths(block, start, stop, lr) {
            continue;
        }
        let sub = block.slice(start, stop);
        if is_good_block(&sub, lr) {
            result.push(sub);
        }
    }
    result
}

impl Processor for Filter {
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn declared_slots(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("target", "Target blockset"),
            ("other", "Receives good blocks with good-to-other"),
        ]
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        let job = FilterJob {
            options: &self.options,
            lr: LengthRequirements::read(&self.options, &ctx.meta)?,
            good_to_other: self.options.bool_("good-to-other", &ctx.meta)?,
            find_subblocks: self.options.bool_("find-subblocks", &ctx.meta)?,
        };
        process_blocks(&job, ctx, "target")
    }
}

struct FilterJob<'a> {
    options: &'a Options,
    lr: LengthRequirements,
    good_to_other: bool,
    find_subblocks: bool,
}

impl BlocksJob for FilterJob<'_> {
    type Data = Mutations;

    fn job_options(&self) -> &Options {
        self.options
    }

    fn before_thread(&self) -> Mutations {
        Mutations::default()
    }

    fn process_block(
        &self,
        id: BlockId,
        block: &Block,
        _bs: &BlockSet,
        data: &mut Mutations,
    ) -> Result<()> {
        let good = is_good_block(block, &self.lr);
        if self.good_to_other {
            if good {
                data.insert_other.push(block.clone());
            }
            return Ok(());
        }
        if good {
            return Ok(());
        }
        if self.find_subblocks {
            let subblocks = find_good_subblocks(block, &self.lr);
            if !subblocks.is_empty() {
                data.erase.push(id);
                data.insert.extend(subblocks);
                return Ok(());
            }
        }
        let mut copy = block.clone();
        if filter_block(&mut copy, &self.lr) {
            if is_good_block(&copy, &self.lr) {
                copy.set_canonical_name();
                data.replace.push((id, copy));
                return Ok(());
            }
            if self.find_subblocks {
                let subblocks = find_good_subblocks(&copy, &self.lr);
                if !subblocks.is_empty() {
                    data.erase.push(id);
                    data.insert.extend(subblocks);
                    return Ok(());
                }
            }
        }
        data.erase.push(id);
        Ok(())
    }

    fn after_thread(&self, data: Mutations, _bs: &BlockSet) -> Result<Mutations> {
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::processor::run_processor;
    use crate::libs::row::{Row, RowKind};
    use crate::libs::seq::Sequence;
    use std::sync::Arc;

    fn lenient_filter() -> Filter {
        let mut filter = Filter::new();
        let options = filter.options_mut();
        options.set("min-fragment", "1").unwrap();
        options.set("min-identity", "0.0").unwrap();
        options.set("max-spreading", "9.9").unwrap();
        options.set("max-gaps", "1.0").unwrap();
        filter
    }

    fn ctx_with(bs: BlockSet) -> Context {
        let mut ctx = Context::new(Meta::new());
        ctx.set_bs("target", bs);
        ctx
    }

    fn aligned_block(seqs: &[Arc<Sequence>], texts: &[&str], min: Pos) -> Block {
        let mut block = Block::new();
        for (seq, text) in seqs.iter().zip(texts) {
            let plain_len = text.chars().filter(|&c| c != '-').count() as Pos;
            let mut f = Fragment::new(seq.clone(), min, min + plain_len - 1, 1);
            f.set_row(Some(Row::from_alignment_string(RowKind::Compact, text)));
            block.insert(f);
        }
        block
    }

    #[test]
    fn short_blocks_are_dropped() {
        let seq1 = Arc::new(Sequence::new("s1", "TGGTCCGAGATGCGGGCC"));
        let seq2 = Arc::new(Sequence::new("s2", "TGGTCCGAGATGCGGGCC"));
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        for (min, max) in [(5, 7), (8, 9), (10, 12)] {
            let mut block = Block::new();
            block.insert(Fragment::new(seq1.clone(), min, max, 1));
            block.insert(Fragment::new(seq2.clone(), min, max, 1));
            bs.insert(block);
        }
        let mut ctx = ctx_with(bs);
        let mut filter = lenient_filter();
        filter.options_mut().set("min-fragment", "3").unwrap();
        filter.options_mut().set("min-block", "1").unwrap();
        run_processor(&filter, &mut ctx).unwrap();
        let bs = ctx.bs("target").unwrap();
        assert_eq!(bs.blocks_count(), 2);
        assert!(bs
            .blocks()
            .all(|(_, b)| b.fragments().iter().all(|f| f.length() == 3)));
    }

    #[test]
    fn small_blocks_fail_min_block() {
        let seq = Arc::new(Sequence::new("s1", "ACGTACGTACGT"));
        let mut bs = BlockSet::new();
        bs.add_sequence(seq.clone()).unwrap();
        let mut block = Block::new();
        block.insert(Fragment::new(seq.clone(), 0, 5, 1));
        bs.insert(block);
        let mut ctx = ctx_with(bs);
        run_processor(&lenient_filter(), &mut ctx).unwrap();
        assert!(ctx.bs("target").unwrap().is_empty());
    }

    #[test]
    fn identity_gate_uses_alignment() {
        let seq1 = Arc::new(Sequence::new("s1", "ACGTACGTAA"));
        let seq2 = Arc::new(Sequence::new("s2", "ACGTTTTTAA"));
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        bs.insert(aligned_block(
            &[seq1.clone(), seq2.clone()],
            &["ACGTACGTAA", "ACGTTTTTAA"],
            0,
        ));
        let mut ctx = ctx_with(bs);
        let mut filter = lenient_filter();
        filter.options_mut().set("min-identity", "0.9").unwrap();
        filter.options_mut().set("find-subblocks", "false").unwrap();
        filter.options_mut().set("edge-window-check", "false").unwrap();
        run_processor(&filter, &mut ctx).unwrap();
        // identity 7/10 < 0.9
        assert!(ctx.bs("target").unwrap().is_empty());
    }

    #[test]
    fn subblock_carving_keeps_the_good_core() {
        // identical core flanked by disagreeing columns
        let seq1 = Arc::new(Sequence::new("s1", "TTACGTACGTAA"));
        let seq2 = Arc::new(Sequence::new("s2", "GGACGTACGTCC"));
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        bs.insert(aligned_block(
            &[seq1.clone(), seq2.clone()],
            &["TTACGTACGTAA", "GGACGTACGTCC"],
            0,
        ));
        let mut ctx = ctx_with(bs);
        let mut filter = lenient_filter();
        filter.options_mut().set("min-fragment", "4").unwrap();
        filter.options_mut().set("min-identity", "0.95").unwrap();
        run_processor(&filter, &mut ctx).unwrap();
        let bs = ctx.bs("target").unwrap();
        assert_eq!(bs.blocks_count(), 1);
        let (_, sub) = bs.blocks().next().unwrap();
        assert_eq!(sub.size(), 2);
        for f in sub.fragments() {
            assert_eq!(f.str(), "ACGTACGT");
        }
        bs.validate().unwrap();
    }

    #[test]
    fn good_to_other_copies_without_removing() {
        let seq1 = Arc::new(Sequence::new("s1", "ACGTACGT"));
        let seq2 = Arc::new(Sequence::new("s2", "ACGTACGT"));
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        let mut good = Block::new();
        good.insert(Fragment::new(seq1.clone(), 0, 7, 1));
        good.insert(Fragment::new(seq2.clone(), 0, 7, 1));
        bs.insert(good);
        let mut bad = Block::new();
        bad.insert(Fragment::new(seq1.clone(), 0, 0, 1));
        bs.insert(bad);

        let mut ctx = ctx_with(bs);
        let mut filter = lenient_filter();
        filter.options_mut().set("good-to-other", "true").unwrap();
        run_processor(&filter, &mut ctx).unwrap();
        assert_eq!(ctx.bs("target").unwrap().blocks_count(), 2);
        let other = ctx.bs("other").unwrap();
        assert_eq!(other.blocks_count(), 1);
        assert_eq!(other.blocks().next().unwrap().1.size(), 2);
    }

    #[test]
    fn empty_blockset_passes() {
        let mut ctx = ctx_with(BlockSet::new());
        run_processor(&lenient_filter(), &mut ctx).unwrap();
        assert!(ctx.bs("target").unwrap().is_empty());
    }
}
