use crate::cli::EvaluateArgs;
use crate::config::PartialEngineConfig;
use crate::error::Result;
use gaussvol::core::io::atoms::{read_atoms, write_results};
use gaussvol::engine::evaluator::Evaluation;
use gaussvol::workflows;
use std::fmt::Write;
use tracing::info;

pub fn run(args: EvaluateArgs) -> Result<()> {
    let engine_args = &args.engine;
    let partial_config = PartialEngineConfig::load(engine_args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(engine_args)?;

    info!("Loading atoms from {:?}", &engine_args.input);
    let system = read_atoms(&engine_args.input)?;

    let result = workflows::evaluate::run(&system, &config)?;
    print!("{}", format_breakdown(&result.evaluation));

    if let Some(output) = &args.output {
        info!("Writing per-atom results to {:?}", output);
        write_results(output, &result.atoms)?;
        println!("Per-atom results written to: {}", output.display());
    }

    Ok(())
}

/// Renders the energy breakdown of an evaluation as an aligned table.
pub fn format_breakdown(evaluation: &Evaluation) -> String {
    let terms = &evaluation.terms;
    let stats = &evaluation.stats;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Model {} | {} atoms | {} tree nodes in {} sections",
        evaluation.model,
        evaluation.gradients.len(),
        stats.tree.nodes,
        stats.tree.sections
    );
    let mut row = |label: &str, value: f64| {
        let _ = writeln!(out, "  {:<14} {:>16.6} kcal/mol", label, value);
    };
    row("Surface area", terms.surface_area);
    if evaluation.model.has_solvation() {
        row("GB self", terms.gb_self);
        row("GB pair", terms.gb_pair);
        row("Dispersion", terms.dispersion);
    }
    row("Total", evaluation.energy());
    if stats.probes > 0 {
        let _ = writeln!(
            out,
            "  {} of {} solvent probes retained",
            stats.probes, stats.probe_candidates
        );
    }
    out
}
