use clap::*;

use pangene::libs::blockset::BlockSet;
use pangene::libs::processor::{Context, Meta};

pub mod align;
pub mod anchors;
pub mod build;
pub mod expand;
pub mod filter;
pub mod join;
pub mod resolve;
pub mod stat;
pub mod stick;

/// Arguments every subcommand understands.
pub fn common_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("config")
            .long("config")
            .short('c')
            .num_args(1)
            .help("Configuration file with NAME = value lines"),
    )
    .arg(
        Arg::new("set")
            .long("set")
            .action(ArgAction::Append)
            .num_args(1)
            .value_name("NAME=VALUE")
            .help("Override a registry value"),
    )
    .arg(
        Arg::new("workers")
            .long("workers")
            .value_parser(value_parser!(i64))
            .num_args(1)
            .allow_negative_numbers(true)
            .help("Number of worker threads, -1 for all cores"),
    )
    .arg(
        Arg::new("compact")
            .long("compact")
            .action(ArgAction::SetTrue)
            .help("Use the 2-bit packed sequence store"),
    )
    .arg(
        Arg::new("outfile")
            .long("outfile")
            .short('o')
            .num_args(1)
            .default_value("stdout")
            .help("Output filename. [stdout] for screen"),
    )
}

/// Registry populated in precedence order:
/// defaults < environment < config file < --set overrides.
pub fn make_context(args: &ArgMatches) -> anyhow::Result<Context> {
    let mut meta = Meta::new();
    meta.load_env();
    if let Some(config) = args.get_one::<String>("config") {
        let mut reader = pangene::reader(config)?;
        meta.load_config(&mut reader, config)?;
    }
    if let Some(sets) = args.get_many::<String>("set") {
        let sets: Vec<String> = sets.cloned().collect();
        meta.apply_sets(&sets)?;
    }
    if let Some(&workers) = args.get_one::<i64>("workers") {
        meta.set("WORKERS", &workers.to_string());
    }
    Ok(Context::new(meta))
}

/// Load the target block set of a subcommand from its input file.
pub fn load_target(ctx: &mut Context, args: &ArgMatches) -> anyhow::Result<()> {
    let infile = args.get_one::<String>("infile").expect("required arg");
    let compact = args.get_flag("compact");
    let mut reader = pangene::reader(infile)?;
    let bs = pangene::libs::fmt::bs::read_blockset(&mut reader, infile, compact, false)?;
    ctx.set_bs("target", bs);
    Ok(())
}

/// Write a named block set to the `--outfile` destination.
pub fn write_bs(bs: &BlockSet, args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = pangene::writer(args.get_one::<String>("outfile").unwrap())?;
    pangene::libs::fmt::bs::write_blockset(bs, &mut writer)?;
    Ok(())
}

/// Write the target block set of the context.
pub fn write_target(ctx: &Context, args: &ArgMatches) -> anyhow::Result<()> {
    write_bs(ctx.bs("target")?, args)
}
