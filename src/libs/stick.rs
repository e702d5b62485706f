use std::collections::BTreeMap;

use crate::libs::error::Result;
use crate::libs::processor::{Context, Options, OptValue, Processor};
use crate::libs::Pos;

/// Sorted positions of fragment edges on one sequence. Elements are
/// `min_pos` or `max_pos + 1` values.
pub type Boundaries = Vec<Pos>;

pub fn avg_element(boundaries: &[Pos]) -> Pos {
    if boundaries.is_empty() {
        0
    } else {
        boundaries.iter().sum::<Pos>() / boundaries.len() as Pos
    }
}

/// Value of the element nearest to `pos`; the vector must be sorted.
pub fn nearest_element(boundaries: &[Pos], pos: Pos) -> Pos {
    match boundaries.binary_search(&pos) {
        Ok(_) => pos,
        Err(i) => {
            let after = boundaries.get(i);
            let before = if i > 0 { boundaries.get(i - 1) } else { None };
            match (before, after) {
                (Some(&b), Some(&a)) => {
                    if pos - b <= a - pos {
                        b
                    } else {
                        a
                    }
                }
                (Some(&b), None) => b,
                (None, Some(&a)) => a,
                (None, None) => pos,
            }
        }
    }
}

/// Sort the boundaries and merge groups closer than `min_distance`
/// into their average; edges near the sequence ends snap to them.
pub fn select_boundaries(boundaries: &mut Boundaries, min_distance: Pos, length: Pos) {
    boundaries.sort();
    boundaries.dedup();
    let mut merged: Boundaries = Vec::new();
    let mut group: Vec<Pos> = Vec::new();
    for &b in boundaries.iter() {
        if group.last().map_or(true, |&last| b - last < min_distance) {
            group.push(b);
        } else {
            merged.push(avg_element(&group));
            group = vec![b];
        }
    }
    if !group.is_empty() {
        merged.push(avg_element(&group));
    }
    for b in &mut merged {
        if *b < min_distance {
            *b = 0;
        } else if length - *b < min_distance {
            *b = length;
        }
    }
    merged.dedup();
    *boundaries = merged;
}

/// Moves fragment edges to shared per-sequence boundaries, so that
/// near-identical edges of different blocks meet exactly.
pub struct Stick {
    options: Options,
}

impl Stick {
    pub fn new() -> Self {
        let mut options = Options::new();
        options.add(
            "min-distance",
            "Edges closer than this merge into one boundary",
            OptValue::Int(10),
        );
        options.add_rule("min-distance > 0");
        Stick { options }
    }
}

impl Default for Stick {
    fn default() -> Self {
        Stick::new()
    }
}

impl Processor for Stick {
    fn name(&self) -> &'static str {
        "Stick"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        let min_distance = self.options.int_("min-distance", &ctx.meta)?;
        let bs = ctx.bs_mut("target")?;

        let mut seq_boundaries: BTreeMap<String, Boundaries> = BTreeMap::new();
        for (_, block) in bs.blocks() {
            for f in block.fragments() {
                let b = seq_boundaries.entry(f.seq_name().to_string()).or_default();
                b.push(f.min_pos());
                b.push(f.max_pos() + 1);
            }
        }
        for (name, boundaries) in &mut seq_boundaries {
            let length = bs
                .find_sequence(name)
                .map(|s| s.len())
                .unwrap_or(Pos::MAX);
            select_boundaries(boundaries, min_distance, length);
        }

        let mut moved = 0usize;
        let ids = bs.block_ids();
        for id in ids {
            let block = bs.get_mut(id).expect("listed block");
            let mut changed = false;
            for f in block.fragments_mut() {
                let boundaries = &seq_boundaries[f.seq_name()];
                let new_min = nearest_element(boundaries, f.min_pos());
                let new_max = nearest_element(boundaries, f.max_pos() + 1) - 1;
                if new_min == f.min_pos() && new_max == f.max_pos() {
                    continue;
                }
                if new_min > new_max || new_min < 0 || new_max >= f.seq().len() {
                    continue;
                }
                f.set_min_pos(new_min);
                f.set_max_pos(new_max);
                // the old row no longer matches the new coordinates
                f.set_row(None);
                changed = true;
                moved += 1;
            }
            if changed {
                block.set_canonical_name();
            }
        }
        log::debug!("Stick: {} fragment edges moved", moved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::block::Block;
    use crate::libs::blockset::BlockSet;
    use crate::libs::fragment::Fragment;
    use crate::libs::processor::{run_processor, Meta};
    use crate::libs::seq::Sequence;
    use std::sync::Arc;

    #[test]
    fn nearest_element_prefers_left_on_ties() {
        let b = vec![0, 10, 20];
        assert_eq!(nearest_element(&b, 4), 0);
        assert_eq!(nearest_element(&b, 5), 0);
        assert_eq!(nearest_element(&b, 6), 10);
        assert_eq!(nearest_element(&b, 10), 10);
        assert_eq!(nearest_element(&b, 99), 20);
    }

    #[test]
    fn close_boundaries_merge() {
        let mut b = vec![100, 102, 200, 203, 500];
        select_boundaries(&mut b, 5, 1000);
        assert_eq!(b, vec![101, 201, 500]);
    }

    #[test]
    fn edges_snap_to_sequence_ends() {
        let mut b = vec![3, 50, 97];
        select_boundaries(&mut b, 5, 100);
        assert_eq!(b, vec![0, 50, 100]);
    }

    #[test]
    fn stick_aligns_adjacent_block_edges() {
        let text: String = "ACGT".repeat(30);
        let seq1 = Arc::new(Sequence::new("s1", &text));
        let seq2 = Arc::new(Sequence::new("s2", &text));
        let mut bs = BlockSet::new();
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();
        // edges at 60/61 should meet
        let mut left = Block::new();
        left.insert(Fragment::new(seq1.clone(), 10, 59, 1));
        left.insert(Fragment::new(seq2.clone(), 10, 60, 1));
        bs.insert(left);
        let mut right = Block::new();
        right.insert(Fragment::new(seq1.clone(), 62, 110, 1));
        right.insert(Fragment::new(seq2.clone(), 62, 110, 1));
        bs.insert(right);

        let mut ctx = Context::new(Meta::new());
        ctx.set_bs("target", bs);
        let mut stick = Stick::new();
        stick.options_mut().set("min-distance", "4").unwrap();
        run_processor(&stick, &mut ctx).unwrap();

        let bs = ctx.bs("target").unwrap();
        let mut mins: Vec<Pos> = Vec::new();
        let mut maxs: Vec<Pos> = Vec::new();
        for (_, block) in bs.blocks() {
            for f in block.fragments() {
                mins.push(f.min_pos());
                maxs.push(f.max_pos());
            }
        }
        // both left fragments end at the same boundary, both right
        // fragments start where the left ones ended
        maxs.sort();
        mins.sort();
        assert_eq!(maxs[0], maxs[1]);
        assert_eq!(mins[2], mins[3]);
        assert_eq!(maxs[1] + 1, mins[2]);
        bs.validate().unwrap();
    }
}
