use clap::{Args, Parser, Subcommand};
use gaussvol::engine::config::Model;
use gaussvol::tree::{BuildStrategy, ReductionStrategy};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "GaussVol CLI - Gaussian overlap volumes, surface-area energies and AGBNP implicit solvation from the command line.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate the energy and gradient of an atom file with one of the energy models.
    Evaluate(EvaluateArgs),
    /// Build the overlap tree of an atom file and report how it fills its sections.
    Tree(TreeArgs),
}

/// Inputs and engine overrides shared by every subcommand.
#[derive(Args, Debug)]
pub struct EngineArgs {
    /// Path to the input atom file (CSV with x,y,z,radius,gamma,alpha,charge,hydrogen).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to an engine configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the energy model (gvolsa, agbnp1, agbnp2).
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<Model>,

    /// Override the tree build strategy (sequential, level-synchronous, single-pass).
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<BuildStrategy>,

    /// Override how per-atom results are combined across sections (per-section, atomic).
    #[arg(long, value_name = "STRATEGY")]
    pub reduction: Option<ReductionStrategy>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S solvent.dielectric-out=78.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `evaluate` subcommand.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Write per-atom self volumes, Born radii and gradients to this CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `tree` subcommand.
#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_parses_overrides() {
        let cli = Cli::parse_from([
            "gaussvol",
            "-vv",
            "evaluate",
            "-i",
            "atoms.csv",
            "--model",
            "agbnp2",
            "--strategy",
            "single-pass",
            "-S",
            "tree.max-order=8",
            "-o",
            "out.csv",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Evaluate(args) = cli.command else {
            panic!("Expected 'evaluate' subcommand");
        };
        assert_eq!(args.engine.input, PathBuf::from("atoms.csv"));
        assert_eq!(args.engine.model, Some(Model::Agbnp2));
        assert_eq!(args.engine.strategy, Some(BuildStrategy::SinglePass));
        assert_eq!(args.engine.set_values, vec!["tree.max-order=8".to_string()]);
        assert_eq!(args.output, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::parse_from(["gaussvol", "tree", "-i", "atoms.csv", "-j", "4", "-q"]);
        assert_eq!(cli.threads, Some(4));
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Tree(_)));
    }

    #[test]
    fn unknown_model_is_rejected() {
        let result = Cli::try_parse_from(["gaussvol", "evaluate", "-i", "a.csv", "-m", "pbsa"]);
        assert!(result.is_err());
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["gaussvol", "tree"]).is_err());
    }
}
