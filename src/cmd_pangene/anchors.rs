use clap::*;

use pangene::libs::anchor::AnchorFinder;
use pangene::libs::blockset::BlockSet;
use pangene::libs::fmt::fa::read_fasta;
use pangene::libs::processor::{run_processor, Processor};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("anchors")
        .about("Finds anchor blocks: k-mers occurring twice or more")
        .after_help(
            r###"
Streams the input sequences through a Bloom prefilter, reconciles the
candidate k-mers exactly, and emits every repeated k-mer as a block of
fragments of that length.

Notes:
* Supports both plain text and gzipped (.gz) files
* Reads from stdin if the input file is 'stdin'
* Sequence headers may carry genome=, chromosome= and circular= attributes
* ANCHOR_SIZE from the registry is the default --anchor-size

Examples:
1. Find anchors of length 5:
   pangene anchors tests/data/pair.fa --anchor-size 5

2. Forward strand only, into a file:
   pangene anchors tests/data/pair.fa --anchor-size 5 --only-ori 1 -o anchors.bs

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Input FASTA file"),
        )
        .arg(
            Arg::new("anchor-size")
                .long("anchor-size")
                .value_parser(value_parser!(i64))
                .num_args(1)
                .help("Length of anchoring k-mers"),
        )
        .arg(
            Arg::new("only-ori")
                .long("only-ori")
                .value_parser(value_parser!(i64))
                .allow_negative_numbers(true)
                .num_args(1)
                .help("Emit anchors of one strand only: 1, -1 or 0 for both"),
        )
        .arg(
            Arg::new("no-palindromes")
                .long("no-palindromes")
                .value_parser(value_parser!(bool))
                .num_args(1)
                .help("Discard k-mers equal to their reverse complement"),
        )
        .arg(
            Arg::new("error-prob")
                .long("error-prob")
                .value_parser(value_parser!(f64))
                .num_args(1)
                .help("False positive probability of the Bloom prefilter"),
        );
    super::common_args(cmd)
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let mut ctx = super::make_context(args)?;
    let infile = args.get_one::<String>("infile").unwrap();
    let compact = args.get_flag("compact");

    let mut finder = AnchorFinder::new();
    let options = finder.options_mut();
    if let Some(v) = args.get_one::<i64>("anchor-size") {
        options.set("anchor-size", &v.to_string())?;
    }
    if let Some(v) = args.get_one::<i64>("only-ori") {
        options.set("only-ori", &v.to_string())?;
    }
    if let Some(v) = args.get_one::<bool>("no-palindromes") {
        options.set("no-palindromes", &v.to_string())?;
    }
    if let Some(v) = args.get_one::<f64>("error-prob") {
        options.set("error-prob", &v.to_string())?;
    }

    //----------------------------
    // Operating
    //----------------------------
    let mut reader = pangene::reader(infile)?;
    let mut bs = BlockSet::new();
    for seq in read_fasta(&mut reader, infile, compact)? {
        bs.add_sequence(seq)?;
    }
    ctx.set_bs("target", bs);
    run_processor(&finder, &mut ctx)?;

    //----------------------------
    // Output
    //----------------------------
    super::write_target(&ctx, args)
}
