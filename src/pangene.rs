extern crate clap;
use clap::*;

use pangene::libs::error::PangeneError;

mod cmd_pangene;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let app = Command::new("pangene")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`pangene` builds nucleotide pan-genomes")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .subcommand(cmd_pangene::anchors::make_subcommand())
        .subcommand(cmd_pangene::expand::make_subcommand())
        .subcommand(cmd_pangene::resolve::make_subcommand())
        .subcommand(cmd_pangene::stick::make_subcommand())
        .subcommand(cmd_pangene::align::make_subcommand())
        .subcommand(cmd_pangene::join::make_subcommand())
        .subcommand(cmd_pangene::filter::make_subcommand())
        .subcommand(cmd_pangene::stat::make_subcommand())
        .subcommand(cmd_pangene::build::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Pipeline:
    * build   - FASTA to pan-genome block set in one go

* Steps:
    * anchors - exact-seed anchor discovery with Bloom prefiltering
    * expand  - grow anchors by banded batch alignment
    * resolve - split overlaps into a consistent tiling
    * stick   - merge near-identical fragment edges
    * align   - realise alignment rows
    * join    - fuse adjacent collinear blocks
    * filter  - quality gate, sub-block carving

* Inspection:
    * stat    - block set summary and consensus output

"###,
        );

    // Check which subcommand the user ran...
    let result = match app.get_matches().subcommand() {
        Some(("anchors", sub_matches)) => cmd_pangene::anchors::execute(sub_matches),
        Some(("expand", sub_matches)) => cmd_pangene::expand::execute(sub_matches),
        Some(("resolve", sub_matches)) => cmd_pangene::resolve::execute(sub_matches),
        Some(("stick", sub_matches)) => cmd_pangene::stick::execute(sub_matches),
        Some(("align", sub_matches)) => cmd_pangene::align::execute(sub_matches),
        Some(("join", sub_matches)) => cmd_pangene::join::execute(sub_matches),
        Some(("filter", sub_matches)) => cmd_pangene::filter::execute(sub_matches),
        Some(("stat", sub_matches)) => cmd_pangene::stat::execute(sub_matches),
        Some(("build", sub_matches)) => cmd_pangene::build::execute(sub_matches),
        _ => unreachable!(),
    };

    if let Err(e) = result {
        eprintln!("pangene: {}", e);
        let code = e
            .downcast_ref::<PangeneError>()
            .map(|pe| pe.exit_code())
            .unwrap_or(255);
        std::process::exit(code);
    }
}
