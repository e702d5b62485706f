use clap::*;

use pangene::libs::aligner::Align;
use pangene::libs::anchor::AnchorFinder;
use pangene::libs::blockset::BlockSet;
use pangene::libs::expander::FragmentsExpander;
use pangene::libs::filter::Filter;
use pangene::libs::fmt::fa::read_fasta;
use pangene::libs::joiner::Joiner;
use pangene::libs::overlap::{CheckNoOverlaps, OverlapsResolver};
use pangene::libs::processor::{run_processor, Pipe, TempFiles};
use pangene::libs::stick::Stick;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("build")
        .about("Builds a pan-genome block set from FASTA sequences")
        .after_help(
            r###"
Runs the canonical pipeline:
anchors -> expand -> resolve -> stick -> resolve -> align -> join ->
filter -> align -> check.

Per-step options are forwarded with repeated --opt NAME=VALUE, e.g.
--opt anchor-size=9 --opt max-errors=0. Unknown names are skipped per
step, so one override list feeds the whole pipeline. Registry values
(ANCHOR_SIZE, MIN_LENGTH, MIN_IDENTITY, MAX_SPREADING, WORKERS) come
from the environment, --config and --set, in that order.

Examples:
1. Build a pan-genome:
   pangene build genomes.fa -o pangenome.bs

2. A toy run with small thresholds:
   pangene build toy.fa --set ANCHOR_SIZE=5 --set MIN_LENGTH=5

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
            Arg::new("opt")
                .long("opt")
                .action(ArgAction::Append)
                .num_args(1)
                .value_name("NAME=VALUE")
                .help("Forward an option to every pipeline step that has it"),
        )
        .arg(
            Arg::new("tree")
                .long("tree")
                .action(ArgAction::SetTrue)
                .help("Print the processor tree and exit"),
        )
        .arg(
            Arg::new("dump-stages")
                .long("dump-stages")
                .action(ArgAction::SetTrue)
                .help("Keep a block-set dump of every stage in temp files"),
        );
    super::common_args(cmd)
}

fn make_pipe() -> Pipe {
    let mut pipe = Pipe::new("BuildPangenome");
    pipe.add(Box::new(AnchorFinder::new()));
    pipe.add(Box::new(FragmentsExpander::new()));
    pipe.add(Box::new(OverlapsResolver::new()));
    pipe.add(Box::new(Stick::new()));
    pipe.add(Box::new(OverlapsResolver::new()));
    pipe.add(Box::new(Align::new()));
    pipe.add(Box::new(Joiner::new()));
    pipe.add(Box::new(Filter::new()));
    pipe.add(Box::new(Align::new()));
    pipe.add(Box::new(CheckNoOverlaps::new()));
    pipe
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let mut pipe = make_pipe();
    if args.get_flag("tree") {
        print!("{}", pipe.tree());
        return Ok(());
    }
    if let Some(opts) = args.get_many::<String>("opt") {
        let mut tokens: Vec<String> = Vec::new();
        for assignment in opts {
            let (name, value) = assignment.split_once('=').ok_or_else(|| {
                anyhow::anyhow!("bad --opt '{}', expected NAME=VALUE", assignment)
            })?;
            tokens.push(format!("--{}", name));
            tokens.push(value.to_string());
        }
        pipe.apply_to_children(&tokens)?;
    }

    let mut ctx = super::make_context(args)?;
    let infile = args.get_one::<String>("infile").unwrap();
    let compact = args.get_flag("compact");

    //----------------------------
    // Operating
    //----------------------------
    let mut reader = pangene::reader(infile)?;
    let mut bs = BlockSet::new();
    for seq in read_fasta(&mut reader, infile, compact)? {
        bs.add_sequence(seq)?;
    }
    ctx.set_bs("target", bs);

    let mut temps = TempFiles::new(args.get_flag("dump-stages"));
    for child in pipe.children() {
        ctx.check_interrupt()?;
        run_processor(&**child, &mut ctx)?;
        if args.get_flag("dump-stages") {
            let path = temps.create()?;
            let mut writer = std::io::BufWriter::new(std::fs::File::create(&path)?);
            pangene::libs::fmt::bs::write_blockset(ctx.bs("target")?, &mut writer)?;
            log::info!("{}: dumped to {}", child.name(), path.display());
        }
    }
    ctx.bs("target")?.validate()?;

    //----------------------------
    // Output
    //----------------------------
    super::write_target(&ctx, args)
}
