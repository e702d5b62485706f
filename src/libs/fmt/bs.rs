use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::libs::block::Block;
use crate::libs::blockset::BlockSet;
use crate::libs::error::{PangeneError, Result};
use crate::libs::fragment::Fragment;
use crate::libs::row::{Row, RowKind};
use crate::libs::seq::Sequence;
use crate::libs::Pos;

const LINE: usize = 60;

fn write_wrapped(w: &mut dyn Write, text: &str) -> std::io::Result<()> {
    for chunk in text.as_bytes().chunks(LINE) {
        w.write_all(chunk)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Write a block set in the line-oriented text format: sequence records
/// first, then one record per fragment.
pub fn write_blockset(bs: &BlockSet, w: &mut dyn Write) -> Result<()> {
    for seq in bs.sequences() {
        write!(w, ">{}", seq.name())?;
        if !seq.genome().is_empty() {
            write!(w, " genome={}", seq.genome())?;
        }
        if !seq.chromosome().is_empty() {
            write!(w, " chromosome={}", seq.chromosome())?;
        }
        if seq.circular() {
            write!(w, " circular=1")?;
        }
        writeln!(w)?;
        write_wrapped(w, &seq.text())?;
        writeln!(w)?;
    }
    for (_, block) in bs.blocks() {
        for f in block.fragments() {
            write!(w, ">{} block={}", f.id(), block.name())?;
            if f.row().is_none() {
                write!(w, " norow")?;
            }
            writeln!(w)?;
            write_wrapped(w, &f.alignment_string())?;
            writeln!(w)?;
        }
    }
    Ok(())
}

struct Record {
    header: String,
    body: String,
    line: usize,
}

fn records(reader: &mut dyn BufRead, file: &str) -> Result<Vec<Record>> {
    let mut result: Vec<Record> = Vec::new();
    let mut line_no = 0;
    for line in reader.lines() {
        let line = line?;
        line_no += 1;
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix('>') {
            result.push(Record {
                header: rest.to_string(),
                body: String::new(),
                line: line_no,
            });
        } else if !line.is_empty() {
            match result.last_mut() {
                Some(r) => r.body.push_str(line),
                None => {
                    return Err(PangeneError::Parse {
                        file: file.to_string(),
                        line: line_no,
                        message: "record body before the first header".to_string(),
                    })
                }
            }
        }
    }
    Ok(result)
}

/// Split `NAME_BEGIN_LAST` from the right, since sequence names may
/// contain underscores themselves.
fn parse_fragment_id(id: &str) -> Option<(String, Pos, Pos)> {
    let mut it = id.rsplitn(3, '_');
    let last: Pos = it.next()?.parse().ok()?;
    let begin: Pos = it.next()?.parse().ok()?;
    let name = it.next()?.to_string();
    if name.is_empty() {
        return None;
    }
    Some((name, begin, last))
}

fn parse_fragment_record(bs: &BlockSet, rec: &Record, file: &str) -> Result<(String, Fragment)> {
    let err = |message: String| PangeneError::Parse {
        file: file.to_string(),
        line: rec.line,
        message,
    };

    let mut words = rec.header.split_whitespace();
    let id = words.next().ok_or_else(|| err("empty header".to_string()))?;
    let mut block_name = None;
    let mut norow = false;
    for word in words {
        if let Some(v) = word.strip_prefix("block=") {
            block_name = Some(v.to_string());
        } else if word == "norow" {
            norow = true;
        }
    }
    let block_name = block_name.ok_or_else(|| err("missing block= attribute".to_string()))?;

    let (seq_name, begin, last) =
        parse_fragment_id(id).ok_or_else(|| err(format!("bad fragment id {}", id)))?;
    let seq = bs
        .find_sequence(&seq_name)
        .ok_or_else(|| err(format!("unknown sequence {}", seq_name)))?;

    let mut fragment = Fragment::new(seq, 0, 0, 1);
    if last == -1 && begin != -1 {
        // single-position reverse fragment
        fragment.set_begin_last(begin, begin);
        fragment.set_ori(-1);
    } else {
        fragment.set_begin_last(begin, last);
    }
    if !fragment.valid() {
        return Err(err(format!("fragment {} is off its sequence", id)));
    }

    let plain: String = rec.body.chars().filter(|&c| c != '-').collect();
    if fragment.str() != plain.to_ascii_uppercase() {
        return Err(err(format!(
            "fragment {} text does not match its sequence",
            id
        )));
    }
    if !norow {
        fragment.set_row(Some(Row::from_alignment_string(RowKind::Compact, &rec.body)));
    }
    Ok((block_name, fragment))
}

/// Parse the block-set text format. With `skip_bad`, malformed fragment
/// records are logged and skipped instead of failing the whole read.
pub fn read_blockset(
    reader: &mut dyn BufRead,
    file: &str,
    compact: bool,
    skip_bad: bool,
) -> Result<BlockSet> {
    let mut bs = BlockSet::new();
    let mut blocks: BTreeMap<String, Block> = BTreeMap::new();

    for rec in records(reader, file)? {
        if rec.header.contains("block=") {
            match parse_fragment_record(&bs, &rec, file) {
                Ok((block_name, fragment)) => {
                    blocks
                        .entry(block_name.clone())
                        .or_insert_with(|| Block::with_name(&block_name))
                        .insert(fragment);
                }
                Err(e) if skip_bad => {
                    log::warn!("skipping block record: {}", e);
                }
                Err(e) => return Err(e),
            }
        } else {
            let mut words = rec.header.split_whitespace();
            let name = words.next().unwrap_or("").to_string();
            if name.is_empty() {
                return Err(PangeneError::Parse {
                    file: file.to_string(),
                    line: rec.line,
                    message: "empty sequence header".to_string(),
                });
            }
            let mut seq = if compact {
                Sequence::new_compact(&name, &rec.body)
            } else {
                Sequence::new(&name, &rec.body)
            };
            for word in words {
                if let Some(v) = word.strip_prefix("genome=") {
                    seq.set_genome(v);
                } else if let Some(v) = word.strip_prefix("chromosome=") {
                    seq.set_chromosome(v);
                } else if let Some(v) = word.strip_prefix("circular=") {
                    seq.set_circular(v == "1" || v == "true");
                }
            }
            bs.add_sequence(Arc::new(seq))?;
        }
    }

    for (_, block) in blocks {
        bs.insert(block);
    }
    Ok(bs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn sample() -> BlockSet {
        let mut bs = BlockSet::new();
        let mut seq1 = Sequence::new("g1.chr1", "TGGTCCGAGCGGACGGCC");
        seq1.set_genome("g1");
        seq1.set_chromosome("chr1");
        let seq1 = Arc::new(seq1);
        let seq2 = Arc::new(Sequence::new("g2_chr1", "TGGTCCGAGCGGACGGCC"));
        bs.add_sequence(seq1.clone()).unwrap();
        bs.add_sequence(seq2.clone()).unwrap();

        let mut aligned = Block::with_name("a1");
        aligned.insert(Fragment::with_row(
            seq1.clone(),
            2,
            6,
            1,
            Row::from_alignment_string(RowKind::Compact, "GTC-CG"),
        ));
        aligned.insert(Fragment::with_row(
            seq2.clone(),
            9,
            13,
            -1,
            Row::from_alignment_string(RowKind::Compact, "GT-CCG"),
        ));
        bs.insert(aligned);

        let mut raw = Block::with_name("r1");
        raw.insert(Fragment::new(seq1, 0, 1, 1));
        raw.insert(Fragment::new(seq2, 0, 1, -1));
        bs.insert(raw);
        bs
    }

    #[test]
    fn roundtrip_preserves_content() {
        let bs = sample();
        let mut out = Vec::new();
        write_blockset(&bs, &mut out).unwrap();
        let parsed =
            read_blockset(&mut BufReader::new(&out[..]), "t.bs", false, false).unwrap();
        assert!(bs.equal_content(&parsed));

        // and the text itself is stable
        let mut out2 = Vec::new();
        write_blockset(&parsed, &mut out2).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            String::from_utf8(out2).unwrap()
        );
    }

    #[test]
    fn long_bodies_are_wrapped() {
        let mut bs = BlockSet::new();
        let text: String = "ACGT".repeat(40);
        bs.add_sequence(Arc::new(Sequence::new("s", &text))).unwrap();
        let mut out = Vec::new();
        write_blockset(&bs, &mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.lines().all(|l| l.len() <= 60));
        let parsed =
            read_blockset(&mut BufReader::new(&out[..]), "t.bs", true, false).unwrap();
        assert!(bs.equal_content(&parsed));
    }

    #[test]
    fn bad_record_fails_or_skips() {
        let data = b">s1\nACGT\n\n>s1_0_9 block=b1 norow\nACGTACGTAA\n\n>s1_0_1 block=b2 norow\nAC\n";
        let err = read_blockset(&mut BufReader::new(&data[..]), "t.bs", false, false);
        assert!(err.is_err());

        let bs = read_blockset(&mut BufReader::new(&data[..]), "t.bs", false, true).unwrap();
        assert_eq!(bs.blocks_count(), 1);
        let (_, block) = bs.blocks().next().unwrap();
        assert_eq!(block.name(), "b2");
    }

    #[test]
    fn reverse_singleton_id_roundtrip() {
        let mut bs = BlockSet::new();
        let seq = Arc::new(Sequence::new("s1", "ACGT"));
        bs.add_sequence(seq.clone()).unwrap();
        let mut block = Block::with_name("b");
        block.insert(Fragment::new(seq, 2, 2, -1));
        bs.insert(block);
        let mut out = Vec::new();
        write_blockset(&bs, &mut out).unwrap();
        let parsed =
            read_blockset(&mut BufReader::new(&out[..]), "t.bs", false, false).unwrap();
        assert!(bs.equal_content(&parsed));
    }
}
