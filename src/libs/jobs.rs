use crossbeam::channel;

use crate::libs::block::Block;
use crate::libs::blockset::{BlockId, BlockSet};
use crate::libs::error::{PangeneError, Result};
use crate::libs::processor::{Context, Options};
use crate::libs::Pos;

/// Block-set changes collected by one worker, applied under the
/// single-threaded merge.
#[derive(Debug, Default)]
pub struct Mutations {
    pub replace: Vec<(BlockId, Block)>,
    pub erase: Vec<BlockId>,
    pub insert: Vec<Block>,
    /// Blocks destined for the `other` block set.
    pub insert_other: Vec<Block>,
}

impl Mutations {
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty()
            && self.erase.is_empty()
            && self.insert.is_empty()
            && self.insert_other.is_empty()
    }

    fn merge(&mut self, other: Mutations) {
        self.replace.extend(other.replace);
        self.erase.extend(other.erase);
        self.insert.extend(other.insert);
        self.insert_other.extend(other.insert_other);
    }
}

/// Work that distributes over blocks: `before_thread` once per worker,
/// `process_block` per block, `after_thread` once per worker under the
/// single-threaded merge.
pub trait BlocksJob: Sync {
    type Data: Send;

    /// Option table carrying at least the common `workers` option.
    fn job_options(&self) -> &Options;

    fn before_thread(&self) -> Self::Data;

    fn process_block(
        &self,
        id: BlockId,
        block: &Block,
        bs: &BlockSet,
        data: &mut Self::Data,
    ) -> Result<()>;

    fn after_thread(&self, data: Self::Data, bs: &BlockSet) -> Result<Mutations>;
}

/// Number of workers for a `workers` option value; -1 means all cores.
pub fn resolve_workers(requested: i64) -> usize {
    if requested == -1 {
        num_cpus::get()
    } else {
        requested.max(1) as usize
    }
}

/// Dispatch the job's blocks over a worker pool and commit the merged
/// mutations. `workers == 1` runs inline, without queue locks, and
/// propagates errors directly.
pub fn process_blocks<J: BlocksJob>(job: &J, ctx: &mut Context, slot: &str) -> Result<()> {
    let workers = resolve_workers(job.job_options().int_("workers", &ctx.meta)?);
    let mut bs = ctx.take_bs(slot)?;
    let result = process_blocks_of(job, &mut bs, workers);
    let sequences: Vec<_> = bs.sequences().to_vec();
    ctx.set_bs(slot, bs);
    let mut to_other = result?;
    if !to_other.is_empty() {
        if !ctx.has_bs("other") {
            ctx.set_bs("other", BlockSet::new());
        }
        let other = ctx.bs_mut("other")?;
        for seq in sequences {
            if other.find_sequence(seq.name()).is_none() {
                other.add_sequence(seq)?;
            }
        }
        to_other.sort_by_key(|b| b.canonical_name());
        for block in to_other {
            other.insert(block);
        }
    }
    Ok(())
}

fn process_blocks_of<J: BlocksJob>(
    job: &J,
    bs: &mut BlockSet,
    workers: usize,
) -> Result<Vec<Block>> {
    // Large blocks first to reduce tail latency.
    let mut ids = bs.block_ids();
    ids.sort_by_key(|&id| {
        let block = bs.get(id).expect("listed block");
        std::cmp::Reverse(block.alignment_length() * block.size() as Pos)
    });

    let mut mutations = Mutations::default();
    if workers <= 1 {
        let mut data = job.before_thread();
        for id in ids {
            let block = bs.get(id).expect("listed block");
            job.process_block(id, block, bs, &mut data)?;
        }
        mutations.merge(job.after_thread(data, bs)?);
    } else {
        let shared: &BlockSet = bs;
        let (tx, rx) = channel::unbounded::<BlockId>();
        for id in ids {
            tx.send(id).expect("queue is open");
        }
        drop(tx);

        let mut outcomes: Vec<std::result::Result<J::Data, String>> = Vec::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let rx = rx.clone();
                    scope.spawn(move || -> std::result::Result<J::Data, String> {
                        let mut data = job.before_thread();
                        for id in rx.iter() {
                            let block = shared.get(id).expect("listed block");
                            job.process_block(id, block, shared, &mut data)
                                .map_err(|e| e.to_string())?;
                        }
                        Ok(data)
                    })
                })
                .collect();
            for handle in handles {
                outcomes.push(
                    handle
                        .join()
                        .unwrap_or_else(|_| Err("worker panicked".to_string())),
                );
            }
        });

        let mut errors = Vec::new();
        let mut datas = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(data) => datas.push(data),
                Err(msg) => errors.push(msg),
            }
        }
        if !errors.is_empty() {
            return Err(PangeneError::Worker(errors));
        }
        for data in datas {
            mutations.merge(job.after_thread(data, bs)?);
        }
    }

    let to_other = std::mem::take(&mut mutations.insert_other);
    apply_mutations(bs, mutations);
    Ok(to_other)
}

/// Replacements and erasures first, then insertions sorted by canonical
/// name so that the result does not depend on worker scheduling.
pub fn apply_mutations(bs: &mut BlockSet, mut mutations: Mutations) {
    for (id, block) in mutations.replace {
        if let Some(slot) = bs.get_mut(id) {
            *slot = block;
        }
    }
    for id in mutations.erase {
        bs.erase(id);
    }
    mutations
        .insert
        .sort_by_key(|b| b.canonical_name());
    for block in mutations.insert {
        bs.insert(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::fragment::Fragment;
    use crate::libs::processor::{Meta, Processor};
    use crate::libs::seq::Sequence;
    use std::sync::Arc;

    struct Doubler {
        options: Options,
        fail_on_empty: bool,
    }

    impl Doubler {
        fn new(workers: i64) -> Self {
            let mut options = Options::new();
            options.set_value("workers", crate::libs::processor::OptValue::Int(workers)).unwrap();
            Doubler {
                options,
                fail_on_empty: false,
            }
        }
    }

    impl Processor for Doubler {
        fn name(&self) -> &'static str {
            "Doubler"
        }
        fn options(&self) -> &Options {
            &self.options
        }
        fn options_mut(&mut self) -> &mut Options {
            &mut self.options
        }
        fn run_impl(&self, ctx: &mut Context) -> Result<()> {
            process_blocks(self, ctx, "target")
        }
    }

    impl BlocksJob for Doubler {
        type Data = Mutations;

        fn job_options(&self) -> &Options {
            &self.options
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
            if self.fail_on_empty && block.is_empty() {
                return Err(PangeneError::Invariant("empty block".to_string()));
            }
            data.erase.push(id);
            data.insert.push(block.clone());
            data.insert.push(block.clone());
            Ok(())
        }

        fn after_thread(&self, data: Mutations, _bs: &BlockSet) -> Result<Mutations> {
            Ok(data)
        }
    }

    fn sample_ctx(blocks: usize) -> Context {
        let seq = Arc::new(Sequence::new("s1", "ACGTACGTACGTACGTACGT"));
        let mut bs = BlockSet::new();
        bs.add_sequence(seq.clone()).unwrap();
        for i in 0..blocks {
            let mut block = Block::new();
            block.insert(Fragment::new(seq.clone(), i as Pos, i as Pos + 3, 1));
            bs.insert(block);
        }
        let mut ctx = Context::new(Meta::new());
        ctx.set_bs("target", bs);
        ctx
    }

    #[test]
    fn single_worker_runs_inline() {
        let mut ctx = sample_ctx(3);
        let job = Doubler::new(1);
        process_blocks(&job, &mut ctx, "target").unwrap();
        assert_eq!(ctx.bs("target").unwrap().blocks_count(), 6);
    }

    #[test]
    fn parallel_result_is_deterministic() {
        let mut a = sample_ctx(8);
        let mut b = sample_ctx(8);
        process_blocks(&Doubler::new(1), &mut a, "target").unwrap();
        process_blocks(&Doubler::new(4), &mut b, "target").unwrap();
        let names = |ctx: &Context| -> Vec<String> {
            ctx.bs("target")
                .unwrap()
                .blocks()
                .map(|(_, b)| b.name().to_string())
                .collect()
        };
        assert_eq!(names(&a), names(&b));
        assert_eq!(a.bs("target").unwrap().blocks_count(), 16);
    }

    #[test]
    fn worker_errors_are_aggregated() {
        let mut ctx = sample_ctx(2);
        ctx.bs_mut("target").unwrap().insert(Block::new());
        let mut job = Doubler::new(3);
        job.fail_on_empty = true;
        let err = process_blocks(&job, &mut ctx, "target").unwrap_err();
        assert!(matches!(err, PangeneError::Worker(_)));
        // the blockset is put back even on failure
        assert!(ctx.bs("target").is_ok());

        let mut inline = Doubler::new(1);
        inline.fail_on_empty = true;
        let mut ctx2 = sample_ctx(0);
        ctx2.bs_mut("target").unwrap().insert(Block::new());
        let err = process_blocks(&inline, &mut ctx2, "target").unwrap_err();
        assert!(matches!(err, PangeneError::Invariant(_)));
    }

    #[test]
    fn empty_blockset_is_fine() {
        let mut ctx = sample_ctx(0);
        process_blocks(&Doubler::new(4), &mut ctx, "target").unwrap();
        assert!(ctx.bs("target").unwrap().is_empty());
    }
}
