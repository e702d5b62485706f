use clap::*;

use pangene::libs::filter::Filter;
use pangene::libs::processor::{run_processor, Processor};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("filter")
        .about("Drops blocks failing quality and carves good sub-blocks")
        .after_help(
            r###"
Blocks must satisfy the fragment-length, block-size, spreading,
identity and gap limits. Bad blocks are removed; with
--find-subblocks (default), their good column ranges survive as new
blocks. With --good-to-other, good blocks are copied to the other
block set instead and the target is left unchanged.

Registry values MIN_LENGTH, MIN_IDENTITY and MAX_SPREADING provide the
defaults for --min-fragment, --min-identity and --max-spreading.

Examples:
1. Filter with defaults:
   pangene filter joined.bs -o filtered.bs

2. Keep short blocks of two or more fragments:
   pangene filter joined.bs --min-fragment 3 --min-block 2

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Input block-set file"),
        );
    let cmd = int_args(
        cmd,
        &[
            ("min-fragment", "Minimum length of fragments"),
            ("max-fragment", "Maximum length of fragments, -1 for no limit"),
            ("min-block", "Minimum number of fragments in a block"),
            ("max-block", "Maximum number of fragments, -1 for no limit"),
        ],
    );
    let cmd = decimal_args(
        cmd,
        &[
            ("min-spreading", "Minimum fragment length spreading"),
            ("max-spreading", "Maximum fragment length spreading"),
            ("min-identity", "Minimum block identity"),
            ("max-identity", "Maximum block identity"),
            ("min-gaps", "Minimum share of gapped columns"),
            ("max-gaps", "Maximum share of gapped columns"),
        ],
    );
    let cmd = cmd
        .arg(
            Arg::new("find-subblocks")
                .long("find-subblocks")
                .value_parser(value_parser!(bool))
                .num_args(1)
                .help("Find and add good subblocks of bad blocks"),
        )
        .arg(
            Arg::new("good-to-other")
                .long("good-to-other")
                .action(ArgAction::SetTrue)
                .help("Copy good blocks to the other block set, keep the target"),
        )
        .arg(
            Arg::new("edge-window-check")
                .long("edge-window-check")
                .value_parser(value_parser!(bool))
                .num_args(1)
                .help("Additionally require good content in the edge windows"),
        )
        .arg(
            Arg::new("other-outfile")
                .long("other-outfile")
                .num_args(1)
                .help("Where to write the other block set with --good-to-other"),
        );
    super::common_args(cmd)
}

fn int_args(mut cmd: Command, names: &[(&'static str, &'static str)]) -> Command {
    for &(name, help) in names {
        cmd = cmd.arg(
            Arg::new(name)
                .long(name)
                .value_parser(value_parser!(i64))
                .allow_negative_numbers(true)
                .num_args(1)
                .help(help),
        );
    }
    cmd
}

fn decimal_args(mut cmd: Command, names: &[(&'static str, &'static str)]) -> Command {
    for &(name, help) in names {
        cmd = cmd.arg(
            Arg::new(name)
                .long(name)
                .value_parser(value_parser!(f64))
                .num_args(1)
                .help(help),
        );
    }
    cmd
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let mut ctx = super::make_context(args)?;
    super::load_target(&mut ctx, args)?;

    let mut filter = Filter::new();
    for name in ["min-fragment", "max-fragment", "min-block", "max-block"] {
        if let Some(v) = args.get_one::<i64>(name) {
            filter.options_mut().set(name, &v.to_string())?;
        }
    }
    for name in [
        "min-spreading",
        "max-spreading",
        "min-identity",
        "max-identity",
        "min-gaps",
        "max-gaps",
    ] {
        if let Some(v) = args.get_one::<f64>(name) {
            filter.options_mut().set(name, &v.to_string())?;
        }
    }
    if let Some(v) = args.get_one::<bool>("find-subblocks") {
        filter.options_mut().set("find-subblocks", &v.to_string())?;
    }
    if let Some(v) = args.get_one::<bool>("edge-window-check") {
        filter
            .options_mut()
            .set("edge-window-check", &v.to_string())?;
    }
    if args.get_flag("good-to-other") {
        filter.options_mut().set("good-to-other", "true")?;
    }

    //----------------------------
    // Operating
    //----------------------------
    run_processor(&filter, &mut ctx)?;

    //----------------------------
    // Output
    //----------------------------
    super::write_target(&ctx, args)?;
    if args.get_flag("good-to-other") {
        if let Some(path) = args.get_one::<String>("other-outfile") {
            let mut writer = pangene::writer(path)?;
            if ctx.has_bs("other") {
                pangene::libs::fmt::bs::write_blockset(ctx.bs("other")?, &mut writer)?;
            }
        }
    }
    Ok(())
}
