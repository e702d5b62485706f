use clap::*;

use pangene::libs::processor::{run_processor, Processor};
use pangene::libs::stick::Stick;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("stick")
        .about("Moves close fragment edges to shared boundaries")
        .after_help(
            r###"
Collects fragment edges per sequence, merges edges closer than
--min-distance into one boundary and moves fragments to the nearest
selected boundary. Edges near sequence ends snap to them.

Examples:
1. Merge edges closer than 10 bp:
   pangene stick tiled.bs --min-distance 10 -o sticked.bs

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
            Arg::new("min-distance")
                .long("min-distance")
                .value_parser(value_parser!(i64))
                .num_args(1)
                .help("Edges closer than this merge into one boundary"),
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

    let mut stick = Stick::new();
    if let Some(v) = args.get_one::<i64>("min-distance") {
        stick.options_mut().set("min-distance", &v.to_string())?;
    }

    //----------------------------
    // Operating
    //----------------------------
    run_processor(&stick, &mut ctx)?;

    //----------------------------
    // Output
    //----------------------------
    super::write_target(&ctx, args)
}
