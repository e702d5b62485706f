use clap::*;

use pangene::libs::overlap::{CheckNoOverlaps, OverlapsResolver};
use pangene::libs::processor::{run_processor, Processor};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("resolve")
        .about("Splits overlapping blocks into a consistent tiling")
        .after_help(
            r###"
Iterates until no two fragments overlap partially on any sequence.
Overlapping pairs split their blocks into left residue, overlap and
right residue; pieces shorter than --min-fragment are dropped.

Examples:
1. Resolve overlaps:
   pangene resolve expanded.bs -o tiled.bs

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
            Arg::new("min-fragment")
                .long("min-fragment")
                .value_parser(value_parser!(i64))
                .num_args(1)
                .help("Shortest piece kept when splitting overlaps"),
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

    let mut resolver = OverlapsResolver::new();
    if let Some(v) = args.get_one::<i64>("min-fragment") {
        resolver.options_mut().set("min-fragment", &v.to_string())?;
    }

    //----------------------------
    // Operating
    //----------------------------
    run_processor(&resolver, &mut ctx)?;
    run_processor(&CheckNoOverlaps::new(), &mut ctx)?;

    //----------------------------
    // Output
    //----------------------------
    super::write_target(&ctx, args)
}
