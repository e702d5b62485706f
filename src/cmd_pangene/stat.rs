use std::collections::BTreeMap;
use std::io::Write;

use clap::*;

use pangene::libs::blockset::BlockSet;
use pangene::libs::Pos;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("stat")
        .about("Summarises a block set")
        .after_help(
            r###"
Prints sequence, block and coverage numbers, the mean identity of
aligned blocks and the count of stem blocks (blocks covering every
genome exactly once).

Examples:
1. Summarise:
   pangene stat pangenome.bs

2. Consensus sequences of all blocks:
   pangene stat pangenome.bs --consensus -o consensus.fa

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Input block-set file"),
        )
        .arg(
            Arg::new("consensus")
                .long("consensus")
                .action(ArgAction::SetTrue)
                .help("Write block consensus sequences as FASTA instead"),
        );
    super::common_args(cmd)
}

fn coverage(bs: &BlockSet) -> (Pos, Pos) {
    let mut by_seq: BTreeMap<&str, Vec<(Pos, Pos)>> = BTreeMap::new();
    for (_, block) in bs.blocks() {
        for f in block.fragments() {
            by_seq
                .entry(f.seq_name())
                .or_default()
                .push((f.min_pos(), f.max_pos()));
        }
    }
    let mut covered = 0;
    for intervals in by_seq.values_mut() {
        intervals.sort();
        let mut last_end: Pos = -1;
        for &(min, max) in intervals.iter() {
            let from = min.max(last_end + 1);
            if max >= from {
                covered += max - from + 1;
                last_end = max;
            }
        }
    }
    (covered, bs.total_sequence_length())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let mut ctx = super::make_context(args)?;
    super::load_target(&mut ctx, args)?;
    let bs = ctx.bs("target")?;
    let mut writer = pangene::writer(args.get_one::<String>("outfile").unwrap())?;

    //----------------------------
    // Output
    //----------------------------
    if args.get_flag("consensus") {
        for (_, block) in bs.blocks() {
            let consensus: String = block
                .consensus()
                .chars()
                .filter(|&c| c != '-')
                .collect();
            writeln!(writer, ">{}", block.name())?;
            writeln!(writer, "{}", consensus)?;
        }
        return Ok(());
    }

    let genomes = bs.genomes();
    let fragments: usize = bs.blocks().map(|(_, b)| b.size()).sum();
    let aligned: Vec<f64> = bs
        .blocks()
        .filter(|(_, b)| b.has_rows())
        .map(|(_, b)| b.identity())
        .collect();
    let stem = bs
        .blocks()
        .filter(|(_, b)| b.is_stem(&genomes))
        .count();
    let (covered, total) = coverage(bs);

    writeln!(writer, "sequences\t{}", bs.sequences().len())?;
    writeln!(writer, "genomes\t{}", genomes.len())?;
    writeln!(writer, "total length\t{}", total)?;
    writeln!(writer, "blocks\t{}", bs.blocks_count())?;
    writeln!(writer, "fragments\t{}", fragments)?;
    writeln!(
        writer,
        "coverage\t{:.4}",
        if total == 0 {
            0.0
        } else {
            covered as f64 / total as f64
        }
    )?;
    writeln!(writer, "aligned blocks\t{}", aligned.len())?;
    writeln!(
        writer,
        "mean identity\t{:.4}",
        if aligned.is_empty() {
            0.0
        } else {
            aligned.iter().sum::<f64>() / aligned.len() as f64
        }
    )?;
    writeln!(writer, "stem blocks\t{}", stem)?;
    Ok(())
}
