use std::sync::Arc;
use std::sync::Mutex;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::libs::block::Block;
use crate::libs::bloom::BloomFilter;
use crate::libs::error::{PangeneError, Result};
use crate::libs::fragment::Fragment;
use crate::libs::jobs::resolve_workers;
use crate::libs::processor::{Context, Options, OptValue, Processor};
use crate::libs::seq::{reverse_complement, SeqHasher, Sequence};
use crate::libs::{Ori, Pos};

/// Call `f(start, hash, symmetric)` for every k-mer window of `text`
/// free of `N`. `mode` selects the hash: 0 canonical, +1 forward
/// strand, -1 reverse strand. `symmetric` marks windows whose forward
/// and reverse-complement hashes coincide (palindrome candidates, which
/// count as an occurrence on each strand).
fn for_each_window(text: &[u8], k: usize, mode: Ori, mut f: impl FnMut(usize, u64, bool)) {
    if text.len() < k || k == 0 {
        return;
    }
    let mut hasher = SeqHasher::new(k);
    let mut n_in_window = 0usize;
    for (i, &c) in text.iter().enumerate() {
        if i < k {
            hasher.push(c);
        } else {
            let evicted = text[i - k];
            hasher.roll(c, evicted);
            if evicted == b'N' {
                n_in_window -= 1;
            }
        }
        if c == b'N' {
            n_in_window += 1;
        }
        if i + 1 >= k && n_in_window == 0 {
            let hash = match mode {
                0 => hasher.canonical(),
                1 => hasher.fwd(),
                _ => hasher.rc(),
            };
            let symmetric = mode == 0 && hasher.fwd() == hasher.rc();
            f(i + 1 - k, hash, symmetric);
        }
    }
}

type Occurrence = (usize, usize, Ori); // sequence index, min_pos, ori

/// Finds every k-mer occurring at least twice across the sequences of
/// the target block set and emits it as a block of length-k fragments.
///
/// Pass 1 streams all windows through a Bloom filter; hashes whose
/// `test_and_add` answers `true` become candidates. Pass 2 re-streams
/// and reconciles candidates in an exact table keyed on the literal
/// k-mer bytes, sharded over workers by the high bits of the hash.
pub struct AnchorFinder {
    options: Options,
}

impl AnchorFinder {
    pub fn new() -> Self {
        let mut options = Options::new();
        options.add_global(
            "anchor-size",
            "Length of anchoring k-mers",
            OptValue::Int(0),
            "ANCHOR_SIZE",
        );
        options.add(
            "only-ori",
            "Emit anchors of one strand only: 1, -1 or 0 for both",
            OptValue::Int(0),
        );
        options.add(
            "no-palindromes",
            "Discard k-mers equal to their reverse complement",
            OptValue::Bool(true),
        );
        options.add(
            "error-prob",
            "False positive probability of the Bloom prefilter",
            OptValue::Decimal(0.001),
        );
        options.add_rule("anchor-size > 0");
        options.add_rule("error-prob > 0");
        AnchorFinder { options }
    }
}

impl Default for AnchorFinder {
    fn default() -> Self {
        AnchorFinder::new()
    }
}

struct Params {
    k: usize,
    mode: Ori,
    eliminate_palindromes: bool,
}

fn shard_of(hash: u64, workers: usize) -> usize {
    (hash >> 48) as usize % workers
}

/// One worker's reconciliation pass over its hash shard.
fn reconcile_shard(
    texts: &[Vec<u8>],
    candidates: &FxHashSet<u64>,
    params: &Params,
    workers: usize,
    shard: usize,
) -> FxHashMap<Vec<u8>, Vec<Occurrence>> {
    let mut table: FxHashMap<Vec<u8>, Vec<Occurrence>> = FxHashMap::default();
    for (seq_idx, text) in texts.iter().enumerate() {
        for_each_window(text, params.k, params.mode, |start, hash, _| {
            if shard_of(hash, workers) != shard || !candidates.contains(&hash) {
                return;
            }
            let fwd = text[start..start + params.k].to_vec();
            let rc = reverse_complement(&fwd);
            match params.mode {
                0 => {
                    if fwd == rc {
                        if !params.eliminate_palindromes {
                            let bucket = table.entry(fwd).or_default();
                            bucket.push((seq_idx, start, 1));
                            bucket.push((seq_idx, start, -1));
                        }
                    } else if fwd < rc {
                        table.entry(fwd).or_default().push((seq_idx, start, 1));
                    } else {
                        table.entry(rc).or_default().push((seq_idx, start, -1));
                    }
                }
                1 => {
                    table.entry(fwd).or_default().push((seq_idx, start, 1));
                }
                _ => {
                    table.entry(rc).or_default().push((seq_idx, start, -1));
                }
            }
        });
    }
    table
}

fn blocks_of_table(
    table: FxHashMap<Vec<u8>, Vec<Occurrence>>,
    seqs: &[Arc<Sequence>],
    k: usize,
) -> Vec<Block> {
    let mut blocks = Vec::new();
    for (_, occurrences) in table {
        if occurrences.len() < 2 {
            continue;
        }
        let mut block = Block::new();
        for (seq_idx, start, ori) in occurrences {
            block.insert(Fragment::new(
                seqs[seq_idx].clone(),
                start as Pos,
                (start + k - 1) as Pos,
                ori,
            ));
        }
        block.set_canonical_name();
        blocks.push(block);
    }
    blocks
}

impl Processor for AnchorFinder {
    fn name(&self) -> &'static str {
        "AnchorFinder"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        let meta = &ctx.meta;
        let k = self.options.int_("anchor-size", meta)? as usize;
        let mode = self.options.int_("only-ori", meta)? as Ori;
        if !(-1..=1).contains(&mode) {
            return Err(PangeneError::Option(
                "only-ori must be -1, 0 or 1".to_string(),
            ));
        }
        let params = Params {
            k,
            mode,
            eliminate_palindromes: self.options.bool_("no-palindromes", meta)?,
        };
        let error_prob = self.options.decimal_("error-prob", meta)?;
        let workers = resolve_workers(self.options.int_("workers", meta)?);

        let seqs: Vec<Arc<Sequence>> = ctx.bs("target")?.sequences().to_vec();
        let texts: Vec<Vec<u8>> = seqs.iter().map(|s| s.text().into_bytes()).collect();

        let windows: usize = texts
            .iter()
            .map(|t| t.len().saturating_sub(k - 1))
            .sum();
        let bloom = BloomFilter::new(windows.max(1), error_prob);

        // Pass 1: Bloom prefilter; repeats answer true.
        let collect_candidates = |text: &Vec<u8>| -> Vec<u64> {
            let mut seen = Vec::new();
            for_each_window(text, k, mode, |_, hash, symmetric| {
                let mut hit = bloom.test_and_add(hash);
                if symmetric {
                    // a palindromic window occurs on both strands at once
                    hit = bloom.test_and_add(hash) || hit;
                }
                if hit {
                    seen.push(hash);
                }
            });
            seen
        };
        let candidates: FxHashSet<u64> = if workers == 1 {
            texts.iter().flat_map(collect_candidates).collect()
        } else {
            texts
                .par_iter()
                .map(collect_candidates)
                .flatten()
                .collect::<Vec<_>>()
                .into_iter()
                .collect()
        };
        log::debug!(
            "AnchorFinder: {} candidate hashes of {} windows",
            candidates.len(),
            windows
        );

        // Pass 2: exact reconciliation, one shard per worker.
        let sink: Mutex<Vec<Block>> = Mutex::new(Vec::new());
        if workers == 1 {
            let table = reconcile_shard(&texts, &candidates, &params, 1, 0);
            sink.lock().expect("sink").extend(blocks_of_table(table, &seqs, k));
        } else {
            std::thread::scope(|scope| {
                for shard in 0..workers {
                    let texts = &texts;
                    let candidates = &candidates;
                    let params = &params;
                    let seqs = &seqs;
                    let sink = &sink;
                    scope.spawn(move || {
                        let table = reconcile_shard(texts, candidates, params, workers, shard);
                        let blocks = blocks_of_table(table, seqs, k);
                        sink.lock().expect("sink").extend(blocks);
                    });
                }
            });
        }

        let mut blocks = sink.into_inner().expect("sink");
        blocks.sort_by_key(|b| b.name().to_string());
        let found = blocks.len();
        let bs = ctx.bs_mut("target")?;
        for block in blocks {
            bs.insert(block);
        }
        log::info!("AnchorFinder: {} anchor blocks", found);
        Ok(())
    }
}
