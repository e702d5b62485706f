use crate::libs::block::Block;
use crate::libs::blockset::{BlockId, BlockSet};
use crate::libs::error::Result;
use crate::libs::jobs::{process_blocks, BlocksJob, Mutations};
use crate::libs::processor::{Context, Options, OptValue, Processor};
use crate::libs::row::{Row, RowKind};

/// The pluggable multiple-alignment seam. Implementations gap the given
/// strings in place so that all end up the same length with homologous
/// columns. Single strings pass through unchanged.
pub trait Aligner: Send + Sync {
    fn name(&self) -> &'static str;

    fn align_seqs(&self, seqs: &mut Vec<String>);
}

/// Pads every string with trailing gaps to the longest one.
pub struct DummyAligner;

impl Aligner for DummyAligner {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn align_seqs(&self, seqs: &mut Vec<String>) {
        let max = seqs.iter().map(|s| s.len()).max().unwrap_or(0);
        for s in seqs {
            while s.len() < max {
                s.push('-');
            }
        }
    }
}

/// Center-star progressive aligner over unit-cost global alignments.
/// Good enough for the near-identical members of one block; a complete
/// aligner stays out of scope.
pub struct SimilarAligner;

fn nw_pair(a: &[u8], b: &[u8]) -> (String, String) {
    let n = a.len();
    let m = b.len();
    let mut dp = vec![vec![0i64; m + 1]; n + 1];
    for i in 0..=n {
        dp[i][0] = i as i64;
    }
    for j in 0..=m {
        dp[0][j] = j as i64;
    }
    for i in 1..=n {
        for j in 1..=m {
            let mismatch = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j - 1] + mismatch)
                .min(dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1);
        }
    }
    let mut ga = String::new();
    let mut gb = String::new();
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 {
            let mismatch = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            if dp[i][j] == dp[i - 1][j - 1] + mismatch {
                ga.push(a[i - 1] as char);
                gb.push(b[j - 1] as char);
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if i > 0 && dp[i][j] == dp[i - 1][j] + 1 {
            ga.push(a[i - 1] as char);
            gb.push('-');
            i -= 1;
        } else {
            ga.push('-');
            gb.push(b[j - 1] as char);
            j -= 1;
        }
    }
    (ga.chars().rev().collect(), gb.chars().rev().collect())
}

/// Merge a new gapped copy of the center into the running alignment,
/// inserting the missing gap columns everywhere.
fn merge_into(msa: &mut Vec<String>, center_new: &str, member_new: &str) {
    let center_old = msa[0].clone();
    let mut merged_rows: Vec<String> = vec![String::new(); msa.len() + 1];
    let old: Vec<char> = center_old.chars().collect();
    let new: Vec<char> = center_new.chars().collect();
    let member: Vec<char> = member_new.chars().collect();
    let rows: Vec<Vec<char>> = msa.iter().map(|r| r.chars().collect()).collect();
    let (mut oi, mut ni) = (0usize, 0usize);
    loop {
        let old_gap = oi < old.len() && old[oi] == '-';
        let new_gap = ni < new.len() && new[ni] == '-';
        if oi >= old.len() && ni >= new.len() {
            break;
        }
        if old_gap && !new_gap {
            // a column only the running alignment has
            for (r, row) in rows.iter().enumerate() {
                merged_rows[r].push(row[oi]);
            }
            merged_rows[msa.len()].push('-');
            oi += 1;
        } else if new_gap && !old_gap {
            // a column only the new pairwise alignment has
            for (r, _) in rows.iter().enumerate() {
                merged_rows[r].push('-');
            }
            merged_rows[msa.len()].push(member[ni]);
            ni += 1;
        } else {
            for (r, row) in rows.iter().enumerate() {
                merged_rows[r].push(if oi < row.len() { row[oi] } else { '-' });
            }
            merged_rows[msa.len()].push(if ni < member.len() { member[ni] } else { '-' });
            oi += 1;
            ni += 1;
        }
    }
    *msa = merged_rows;
}

impl Aligner for SimilarAligner {
    fn name(&self) -> &'static str {
        "similar"
    }

    fn align_seqs(&self, seqs: &mut Vec<String>) {
        if seqs.len() <= 1 {
            return;
        }
        let center = seqs[0].clone();
        let mut msa = vec![center.clone()];
        for member in seqs.iter().skip(1) {
            let (gc, gm) = nw_pair(center.as_bytes(), member.as_bytes());
            merge_into(&mut msa, &gc, &gm);
        }
        *seqs = msa;
    }
}

pub fn make_aligner(name: &str) -> Box<dyn Aligner> {
    match name {
        "dummy" => Box::new(DummyAligner),
        _ => Box::new(SimilarAligner),
    }
}

/// Realise alignment rows on every block that lacks them. A block of
/// one fragment receives an identity row.
pub struct Align {
    options: Options,
}

impl Align {
    pub fn new() -> Self {
        let mut options = Options::new();
        options.add(
            "aligner",
            "Aligner used for unaligned blocks: similar or dummy",
            OptValue::Str("similar".to_string()),
        );
        Align { options }
    }
}

impl Default for Align {
    fn default() -> Self {
        Align::new()
    }
}

impl Processor for Align {
    fn name(&self) -> &'static str {
        "Align"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        let job = AlignJob::of(self, ctx)?;
        process_blocks(&job, ctx, "target")
    }
}

struct AlignJob<'a> {
    parent: &'a Align,
    aligner: Box<dyn Aligner>,
}

impl<'a> AlignJob<'a> {
    fn of(parent: &'a Align, ctx: &Context) -> Result<Self> {
        let aligner = make_aligner(&parent.options.str_("aligner", &ctx.meta)?);
        Ok(AlignJob { parent, aligner })
    }
}

impl BlocksJob for AlignJob<'_> {
    type Data = Mutations;

    fn job_options(&self) -> &Options {
        self.parent.options()
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
        if block.is_empty() {
            return Ok(());
        }
        let aligned = block.has_rows()
            && block
                .fragments()
                .iter()
                .all(|f| f.alignment_length() == block.alignment_length());
        if aligned {
            return Ok(());
        }
        let mut texts: Vec<String> = block.fragments().iter().map(|f| f.str()).collect();
        self.aligner.align_seqs(&mut texts);
        let mut replacement = block.clone();
        for (f, text) in replacement.fragments_mut().iter_mut().zip(&texts) {
            f.set_row(Some(Row::from_alignment_string(RowKind::Compact, text)));
        }
        data.replace.push((id, replacement));
        Ok(())
    }

    fn after_thread(&self, data: Mutations, _bs: &BlockSet) -> Result<Mutations> {
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::fragment::Fragment;
    use crate::libs::processor::{run_processor, Meta};
    use crate::libs::seq::Sequence;
    use std::sync::Arc;

    #[test]
    fn nw_places_single_gap() {
        let (a, b) = nw_pair(b"ACGT", b"AGT");
        assert_eq!(a, "ACGT");
        assert_eq!(b.len(), 4);
        assert_eq!(b.chars().filter(|&c| c == '-').count(), 1);
    }

    #[test]
    fn similar_aligner_handles_equal_strings() {
        let mut seqs = vec!["ACGT".to_string(), "ACGT".to_string(), "ACGT".to_string()];
        SimilarAligner.align_seqs(&mut seqs);
        assert_eq!(seqs, vec!["ACGT", "ACGT", "ACGT"]);
    }

    #[test]
    fn similar_aligner_gaps_unequal_strings() {
        let mut seqs = vec!["ACGTACGT".to_string(), "ACGTCGT".to_string(), "ACGTACG".to_string()];
        SimilarAligner.align_seqs(&mut seqs);
        let len = seqs[0].len();
        assert!(seqs.iter().all(|s| s.len() == len));
        assert_eq!(seqs[0].replace('-', ""), "ACGTACGT");
        assert_eq!(seqs[1].replace('-', ""), "ACGTCGT");
        assert_eq!(seqs[2].replace('-', ""), "ACGTACG");
    }

    #[test]
    fn align_processor_realises_rows() {
        let seq1 = Arc::new(Sequence::new("s1", "ACGTACGT"));
        let seq2 = Arc::new(Sequence::new("s2", "ACGTCGT"));
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        let mut block = Block::new();
        block.insert(Fragment::new(seq1.clone(), 0, 7, 1));
        block.insert(Fragment::new(seq2, 0, 6, 1));
        bs.insert(block);
        let mut single = Block::new();
        single.insert(Fragment::new(seq1, 0, 3, 1));
        bs.insert(single);

        let mut ctx = Context::new(Meta::new());
        ctx.set_bs("target", bs);
        run_processor(&Align::new(), &mut ctx).unwrap();

        let bs = ctx.bs("target").unwrap();
        bs.validate().unwrap();
        for (_, block) in bs.blocks() {
            assert!(block.has_rows());
        }
        let single = bs
            .blocks()
            .find(|(_, b)| b.size() == 1)
            .map(|(_, b)| b)
            .unwrap();
        // identity row, no gaps
        assert_eq!(single.alignment_length(), 4);
        assert_eq!(single.front().unwrap().alignment_string(), "ACGT");
    }
}
