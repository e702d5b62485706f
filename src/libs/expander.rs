use crate::libs::block::Block;
use crate::libs::blockset::{BlockId, BlockSet};
use crate::libs::error::Result;
use crate::libs::fc::{FcKind, FragmentCollection};
use crate::libs::fragment::Fragment;
use crate::libs::jobs::{process_blocks, BlocksJob, Mutations};
use crate::libs::pair_aligner::PairAligner;
use crate::libs::processor::{Context, Options, OptValue, Processor};
use crate::libs::{Ori, Pos};

fn add_expander_options(options: &mut Options) {
    options.add(
        "batch",
        "Length of the piece passed to the pair aligner at a time",
        OptValue::Int(100),
    );
    options.add(
        "gap-range",
        "Max distance from the main diagonal of considered states",
        OptValue::Int(5),
    );
    options.add(
        "max-errors",
        "Max number of errors in one batch of pair alignment",
        OptValue::Int(5),
    );
    options.add("gap-penalty", "Gap open or extension penalty", OptValue::Int(2));
    options.add_rule("batch > 0");
    options.add_rule("max-errors >= 0");
    options.add_rule("gap-range >= 0");
}

#[derive(Debug, Clone)]
struct ExpanderParams {
    batch: Pos,
    aligner: PairAligner,
}

fn read_params(options: &Options, ctx: &Context) -> Result<ExpanderParams> {
    Ok(ExpanderParams {
        batch: options.int_("batch", &ctx.meta)?,
        aligner: PairAligner::new(
            options.int_("max-errors", &ctx.meta)?,
            options.int_("gap-range", &ctx.meta)?,
            options.int_("gap-penalty", &ctx.meta)?,
        ),
    })
}

/// Characters available outside the fragment in direction `dir`
/// (+1 past `last_pos`, -1 before `begin_pos`), reading outward in the
/// fragment's orientation.
fn flank_available(f: &Fragment, dir: Ori, offset: Pos) -> Pos {
    let step = (f.ori() * dir) as Pos;
    let anchor = if dir == 1 { f.last_pos() } else { f.begin_pos() };
    let first = anchor + step * (1 + offset);
    if step == 1 {
        (f.seq().len() - first).max(0)
    } else {
        (first + 1).max(0)
    }
}

fn flank_chars(f: &Fragment, dir: Ori, offset: Pos, count: Pos) -> Vec<u8> {
    let step = (f.ori() * dir) as Pos;
    let anchor = if dir == 1 { f.last_pos() } else { f.begin_pos() };
    (0..count)
        .map(|i| {
            let pos = anchor + step * (1 + offset + i);
            let c = f.seq().char_at(pos);
            if f.ori() == 1 {
                c
            } else {
                crate::libs::seq::complement(c)
            }
        })
        .collect()
}

/// How far `f` can follow `g` in direction `dir`, in whole batches.
/// A batch that exceeds the error budget stops the growth; its partial
/// progress is discarded.
fn pairwise_extension(f: &Fragment, g: &Fragment, dir: Ori, params: &ExpanderParams) -> Pos {
    let mut off_f: Pos = 0;
    let mut off_g: Pos = 0;
    loop {
        let avail_f = flank_available(f, dir, off_f);
        let avail_g = flank_available(g, dir, off_g);
        let b_f = avail_f.min(params.batch);
        let b_g = avail_g.min(params.batch);
        if b_f == 0 || b_g == 0 {
            break;
        }
        let s1 = flank_chars(f, dir, off_f, b_f);
        let s2 = flank_chars(g, dir, off_g, b_g);
        match params.aligner.align(&s1, &s2) {
            None => break,
            Some((u1, u2)) => {
                if u1 == 0 && u2 == 0 {
                    break;
                }
                off_f += u1;
                off_g += u2;
                if u1 < s1.len() as Pos && u2 < s2.len() as Pos {
                    break;
                }
            }
        }
    }
    off_f
}

/// Expanded copy of the block, or `None` when nothing grows. Every
/// fragment is extended to the intersection of its pairwise extensions;
/// rows are dropped since the old alignment no longer covers the new
/// coordinates.
fn expand_block(block: &Block, params: &ExpanderParams) -> Option<Block> {
    if block.size() < 2 {
        return None;
    }
    let mut result = block.clone();
    let mut changed = false;
    for dir in [1, -1] {
        let fragments = result.fragments().to_vec();
        let n = fragments.len();
        let mut extensions = vec![Pos::MAX; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let ext = pairwise_extension(&fragments[i], &fragments[j], dir, params);
                extensions[i] = extensions[i].min(ext);
                if extensions[i] == 0 {
                    break;
                }
            }
        }
        for (f, &ext) in result.fragments_mut().iter_mut().zip(&extensions) {
            if ext == 0 || ext == Pos::MAX {
                continue;
            }
            if dir == 1 {
                f.set_last_pos(f.last_pos() + f.ori() as Pos * ext);
            } else {
                f.set_begin_pos(f.begin_pos() - f.ori() as Pos * ext);
            }
            f.set_row(None);
            changed = true;
        }
    }
    if changed {
        for f in result.fragments_mut() {
            f.set_row(None);
        }
        result.set_canonical_name();
        Some(result)
    } else {
        None
    }
}

/// Grows every fragment of every block outward by greedy banded batch
/// alignment against the other members of its block.
pub struct FragmentsExpander {
    options: Options,
}

impl FragmentsExpander {
    pub fn new() -> Self {
        let mut options = Options::new();
        add_expander_options(&mut options);
        FragmentsExpander { options }
    }
}

impl Default for FragmentsExpander {
    fn default() -> Self {
        FragmentsExpander::new()
    }
}

impl Processor for FragmentsExpander {
    fn name(&self) -> &'static str {
        "FragmentsExpander"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        let job = ExpandJob {
            options: &self.options,
            params: read_params(&self.options, ctx)?,
        };
        process_blocks(&job, ctx, "target")
    }
}

struct ExpandJob<'a> {
    options: &'a Options,
    params: ExpanderParams,
}

impl BlocksJob for ExpandJob<'_> {
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
        if let Some(expanded) = expand_block(block, &self.params) {
            data.replace.push((id, expanded));
        }
        Ok(())
    }

    fn after_thread(&self, data: Mutations, _bs: &BlockSet) -> Result<Mutations> {
        Ok(data)
    }
}

/// Whether two whole fragments align batch-by-batch within the error
/// budget, both consumed to their ends.
fn fragments_aligned(f1: &Fragment, f2: &Fragment, params: &ExpanderParams) -> bool {
    let t1 = f1.str().into_bytes();
    let t2 = f2.str().into_bytes();
    let mut p1: Pos = 0;
    let mut p2: Pos = 0;
    let n1 = t1.len() as Pos;
    let n2 = t2.len() as Pos;
    while p1 < n1 || p2 < n2 {
        let b1 = (n1 - p1).min(params.batch);
        let b2 = (n2 - p2).min(params.batch);
        if b1 == 0 || b2 == 0 {
            // one side is exhausted, the tail of the other cannot align
            return false;
        }
        let s1 = &t1[p1 as usize..(p1 + b1) as usize];
        let s2 = &t2[p2 as usize..(p2 + b2) as usize];
        match params.aligner.align(s1, s2) {
            None => return false,
            Some((u1, u2)) => {
                if u1 == 0 && u2 == 0 {
                    return false;
                }
                p1 += u1;
                p2 += u2;
                if u1 < b1 && u2 < b2 {
                    return false;
                }
            }
        }
    }
    true
}

/// Adds to blocks new fragments made from collinear neighbors of other
/// blocks, when they align with a fragment already in the block.
pub struct BlocksExpander {
    options: Options,
}

impl BlocksExpander {
    pub fn new() -> Self {
        let mut options = Options::new();
        add_expander_options(&mut options);
        BlocksExpander { options }
    }
}

impl Default for BlocksExpander {
    fn default() -> Self {
        BlocksExpander::new()
    }
}

impl Processor for BlocksExpander {
    fn name(&self) -> &'static str {
        "BlocksExpander"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        let params = read_params(&self.options, ctx)?;
        let bs = ctx.bs("target")?;
        let mut fc = FragmentCollection::new(FcKind::Vector);
        fc.set_cycles_allowed(false);
        fc.add_bs(bs);
        fc.prepare();

        // adoptions per block, decided against the unmodified set
        let mut adoptions: Vec<(BlockId, Fragment)> = Vec::new();
        for (id, block) in bs.blocks() {
            if block.weak() {
                continue;
            }
            // blocks adjacent to this one on some sequence
            let mut neighbor_blocks: Vec<BlockId> = Vec::new();
            for (idx, f) in block.fragments().iter().enumerate() {
                let key = crate::libs::fc::FragKey::of(
                    f,
                    crate::libs::fc::FragId { block: id, idx },
                );
                for dir in [1, -1] {
                    if let Some(neighbor) = fc.neighbor(f.seq_name(), key, dir) {
                        if neighbor.frag.block != id
                            && !neighbor_blocks.contains(&neighbor.frag.block)
                        {
                            neighbor_blocks.push(neighbor.frag.block);
                        }
                    }
                }
            }
            // any of the neighbor block's fragments may complete ours
            for donor_id in neighbor_blocks {
                let Some(donor_block) = bs.get(donor_id) else {
                    continue;
                };
                for donor in donor_block.fragments() {
                    let mut candidate = donor.clone();
                    candidate.set_row(None);
                    let already = block
                        .fragments()
                        .iter()
                        .any(|existing| *existing == candidate);
                    if already {
                        continue;
                    }
                    let mut flipped = candidate.clone();
                    flipped.inverse();
                    let adopted = if block
                        .fragments()
                        .iter()
                        .any(|f| fragments_aligned(f, &candidate, &params))
                    {
                        Some(candidate)
                    } else if block
                        .fragments()
                        .iter()
                        .any(|f| fragments_aligned(f, &flipped, &params))
                    {
                        Some(flipped)
                    } else {
                        None
                    };
                    if let Some(fragment) = adopted {
                        let duplicate = adoptions
                            .iter()
                            .any(|(b, a)| *b == id && *a == fragment);
                        if !duplicate {
                            adoptions.push((id, fragment));
                        }
                    }
                }
            }
        }

        let adopted = adoptions.len();
        let bs = ctx.bs_mut("target")?;
        for (id, fragment) in adoptions {
            if let Some(block) = bs.get_mut(id) {
                // the old alignment does not cover the newcomer
                for f in block.fragments_mut() {
                    f.set_row(None);
                }
                block.insert(fragment);
                block.set_canonical_name();
            }
        }
        log::debug!("BlocksExpander: {} fragments adopted", adopted);
        Ok(())
    }
}
