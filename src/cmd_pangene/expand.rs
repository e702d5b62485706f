use clap::*;

use pangene::libs::expander::{BlocksExpander, FragmentsExpander};
use pangene::libs::processor::{run_processor, Processor};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("expand")
        .about("Grows anchor fragments outward by banded batch alignment")
        .after_help(
            r###"
Each fragment is extended to the intersection of its pairwise
extensions; a batch exceeding --max-errors stops the growth. With
--blocks, blocks additionally adopt aligned fragments from their
neighbor blocks.

Examples:
1. Expand a block set:
   pangene expand anchors.bs -o expanded.bs

2. Strict expansion in small batches:
   pangene expand anchors.bs --max-errors 0 --batch 10

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
            Arg::new("batch")
                .long("batch")
                .value_parser(value_parser!(i64))
                .num_args(1)
                .help("Length of the piece passed to the pair aligner at a time"),
        )
        .arg(
            Arg::new("max-errors")
                .long("max-errors")
                .value_parser(value_parser!(i64))
                .num_args(1)
                .help("Max number of errors in one batch of pair alignment"),
        )
        .arg(
            Arg::new("gap-range")
                .long("gap-range")
                .value_parser(value_parser!(i64))
                .num_args(1)
                .help("Max distance from the main diagonal of considered states"),
        )
        .arg(
            Arg::new("gap-penalty")
                .long("gap-penalty")
                .value_parser(value_parser!(i64))
                .num_args(1)
                .help("Gap open or extension penalty"),
        )
        .arg(
            Arg::new("blocks")
                .long("blocks")
                .action(ArgAction::SetTrue)
                .help("Also adopt aligned fragments from neighbor blocks"),
        );
    super::common_args(cmd)
}

fn forward(processor: &mut dyn Processor, args: &ArgMatches) -> anyhow::Result<()> {
    for name in ["batch", "max-errors", "gap-range", "gap-penalty"] {
        if let Some(v) = args.get_one::<i64>(name) {
            processor.options_mut().set(name, &v.to_string())?;
        }
    }
    Ok(())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let mut ctx = super::make_context(args)?;
    super::load_target(&mut ctx, args)?;

    let mut expander = FragmentsExpander::new();
    forward(&mut expander, args)?;

    //----------------------------
    // Operating
    //----------------------------
    run_processor(&expander, &mut ctx)?;
    if args.get_flag("blocks") {
        let mut blocks_expander = BlocksExpander::new();
        forward(&mut blocks_expander, args)?;
        run_processor(&blocks_expander, &mut ctx)?;
    }

    //----------------------------
    // Output
    //----------------------------
    super::write_target(&ctx, args)
}
