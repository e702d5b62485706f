use clap::*;

use pangene::libs::joiner::Joiner;
use pangene::libs::processor::{run_processor, Processor};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("join")
        .about("Fuses adjacent collinear blocks of equal size")
        .after_help(
            r###"
Two blocks join when every fragment of one has its partner in the
other as a logical neighbor with the same orientation, and the gaps
between them are uniform enough. Weak blocks never join. Larger blocks
are tried first.

Examples:
1. Join blocks:
   pangene join tiled.bs -o joined.bs

2. Limit the gap between joined fragments:
   pangene join tiled.bs --max-gap 100

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
            Arg::new("max-gap")
                .long("max-gap")
                .value_parser(value_parser!(i64))
                .allow_negative_numbers(true)
                .num_args(1)
                .help("Largest allowed gap between joined fragments, -1 for no limit"),
        )
        .arg(
            Arg::new("gap-ratio")
                .long("gap-ratio")
                .value_parser(value_parser!(f64))
                .allow_negative_numbers(true)
                .num_args(1)
                .help("Largest allowed max/min gap ratio, -1 for no limit"),
        )
        .arg(
            Arg::new("aligner")
                .long("aligner")
                .value_parser(["similar", "dummy"])
                .num_args(1)
                .help("Aligner used for the inter-fragment regions"),
        );
    super::common_args(cmd)
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let mut ctx = super::make_context(args)?;
    super::load_target(&mut ctx, args)?;

    let mut joiner = Joiner::new();
    if let Some(v) = args.get_one::<i64>("max-gap") {
        joiner.options_mut().set("max-gap", &v.to_string())?;
    }
    if let Some(v) = args.get_one::<f64>("gap-ratio") {
        joiner.options_mut().set("gap-ratio", &v.to_string())?;
    }
    if let Some(v) = args.get_one::<String>("aligner") {
        joiner.options_mut().set("aligner", v)?;
    }

    //----------------------------
    // Operating
    //----------------------------
    run_processor(&joiner, &mut ctx)?;

    //----------------------------
    // Output
    //----------------------------
    super::write_target(&ctx, args)
}
