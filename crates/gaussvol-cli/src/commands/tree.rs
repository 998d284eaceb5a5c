use crate::cli::TreeArgs;
use crate::config::PartialEngineConfig;
use crate::error::Result;
use gaussvol::core::io::atoms::read_atoms;
use gaussvol::workflows::inspect::{TreeReport, inspect_tree};
use std::fmt::Write;
use tracing::info;

pub fn run(args: TreeArgs) -> Result<()> {
    let engine_args = &args.engine;
    let config = PartialEngineConfig::load(engine_args.config.as_deref())?
        .merge_with_cli(engine_args)?;

    info!("Loading atoms from {:?}", &engine_args.input);
    let system = read_atoms(&engine_args.input)?;

    let report = inspect_tree(&system, &config)?;
    print!("{}", format_report(&report));
    Ok(())
}

pub fn format_report(report: &TreeReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} nodes in {} sections, deepest overlap of order {}",
        stats.nodes, stats.sections, stats.max_level
    );
    if stats.truncated > 0 {
        let _ = writeln!(out, "{} overlaps beyond the maximum order dropped", stats.truncated);
    }

    let _ = writeln!(out, "\n{:>8} {:>8} {:>10} {:>10} {:>7}", "section", "roots", "nodes", "capacity", "fill");
    for occupancy in &report.occupancy {
        let fill = if occupancy.capacity == 0 {
            0.0
        } else {
            100.0 * occupancy.nodes as f64 / occupancy.capacity as f64
        };
        let _ = writeln!(
            out,
            "{:>8} {:>8} {:>10} {:>10} {:>6.1}%",
            occupancy.section, occupancy.roots, occupancy.nodes, occupancy.capacity, fill
        );
    }

    let _ = writeln!(out, "\n{:>14} {:>8}", "nodes per atom", "atoms");
    for (count, atoms) in report.overlap_histogram() {
        let _ = writeln!(out, "{:>14} {:>8}", count, atoms);
    }
    out
}
