use std::io::BufRead;
use std::sync::Arc;

use crate::libs::error::{PangeneError, Result};
use crate::libs::seq::Sequence;

/// Parse a FASTA header of the form
/// `>NAME [genome=G] [chromosome=C] [circular=0|1]`.
fn parse_header(line: &str) -> (String, String, String, bool) {
    let mut words = line[1..].split_whitespace();
    let name = words.next().unwrap_or("").to_string();
    let mut genome = String::new();
    let mut chromosome = String::new();
    let mut circular = false;
    for word in words {
        if let Some(v) = word.strip_prefix("genome=") {
            genome = v.to_string();
        } else if let Some(v) = word.strip_prefix("chromosome=") {
            chromosome = v.to_string();
        } else if let Some(v) = word.strip_prefix("circular=") {
            circular = v == "1" || v == "true";
        }
    }
    (name, genome, chromosome, circular)
}

fn build(name: &str, text: &str, compact: bool) -> Sequence {
    if compact {
        Sequence::new_compact(name, text)
    } else {
        Sequence::new(name, text)
    }
}

/// Read all sequences of a FASTA stream. `compact` selects the packed
/// storage strategy.
pub fn read_fasta(reader: &mut dyn BufRead, file: &str, compact: bool) -> Result<Vec<Arc<Sequence>>> {
    let mut result = Vec::new();
    let mut header: Option<(String, String, String, bool)> = None;
    let mut text = String::new();
    let mut line_no = 0;

    let flush = |header: &Option<(String, String, String, bool)>,
                     text: &mut String,
                     result: &mut Vec<Arc<Sequence>>| {
        if let Some((name, genome, chromosome, circular)) = header {
            let mut seq = build(name, text, compact);
            seq.set_genome(genome);
            seq.set_chromosome(chromosome);
            seq.set_circular(*circular);
            result.push(Arc::new(seq));
        }
        text.clear();
    };

    for line in reader.lines() {
        let line = line?;
        line_no += 1;
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix('>') {
            if rest.trim().is_empty() {
                return Err(PangeneError::Parse {
                    file: file.to_string(),
                    line: line_no,
                    message: "empty FASTA header".to_string(),
                });
            }
            flush(&header, &mut text, &mut result);
            header = Some(parse_header(line));
        } else if !line.is_empty() {
            if header.is_none() {
                return Err(PangeneError::Parse {
                    file: file.to_string(),
                    line: line_no,
                    message: "sequence data before the first header".to_string(),
                });
            }
            text.push_str(line);
        }
    }
    flush(&header, &mut text, &mut result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn reads_headers_and_attrs() {
        let data = b">g1.chr1 genome=g1 chromosome=chr1 circular=1\nACGT\nacgt\n\n>plain\nTTTT\n";
        let seqs = read_fasta(&mut BufReader::new(&data[..]), "t.fa", false).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0].name(), "g1.chr1");
        assert_eq!(seqs[0].genome(), "g1");
        assert_eq!(seqs[0].chromosome(), "chr1");
        assert!(seqs[0].circular());
        assert_eq!(seqs[0].text(), "ACGTACGT");
        assert_eq!(seqs[1].name(), "plain");
        assert!(!seqs[1].circular());
    }

    #[test]
    fn compact_store_reads_the_same() {
        let data = b">s\nACGTNNNNACGT\n";
        let seqs = read_fasta(&mut BufReader::new(&data[..]), "t.fa", true).unwrap();
        assert_eq!(seqs[0].text(), "ACGTNNNNACGT");
    }

    #[test]
    fn data_before_header_is_a_parse_error() {
        let data = b"ACGT\n";
        let err = read_fasta(&mut BufReader::new(&data[..]), "t.fa", false).unwrap_err();
        assert!(err.to_string().contains("t.fa:1"));
    }
}
