use clap::*;

use pangene::libs::aligner::Align;
use pangene::libs::processor::{run_processor, Processor};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("align")
        .about("Realises alignment rows on unaligned blocks")
        .after_help(
            r###"
Blocks already carrying consistent rows are left alone; single-fragment
blocks receive identity rows.

Examples:
1. Align all blocks:
   pangene align joined.bs -o aligned.bs

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
            Arg::new("aligner")
                .long("aligner")
                .value_parser(["similar", "dummy"])
                .num_args(1)
                .help("Aligner used for unaligned blocks"),
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

    let mut align = Align::new();
    if let Some(v) = args.get_one::<String>("aligner") {
        align.options_mut().set("aligner", v)?;
    }

    //----------------------------
    // Operating
    //----------------------------
    run_processor(&align, &mut ctx)?;

    //----------------------------
    // Output
    //----------------------------
    super::write_target(&ctx, args)
}
