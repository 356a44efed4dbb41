mod common;
mod run_analyze;
mod run_batch;
mod run_simulate;
mod run_subgraph;

use crate::common::*;
use run_analyze::*;
use run_batch::*;
use run_simulate::*;
use run_subgraph::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about, term_width = 80)]
///
/// Propagate expression changes through pathway graphs and test the
/// resulting node and pathway perturbations.
///
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Perturbation, impact and bootstrap p-values of one expression profile
    Analyze(AnalyzeArgs),
    /// Three-state simulation of constrained nodes
    Simulate(SimulateArgs),
    /// Pathway scores of every sample in an expression matrix
    Batch(BatchArgs),
    /// Edges downstream of a node
    Subgraph(SubgraphArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Analyze(args) => {
            run_analyze(args)?;
        }
        Commands::Simulate(args) => {
            run_simulate(args)?;
        }
        Commands::Batch(args) => {
            run_batch(args)?;
        }
        Commands::Subgraph(args) => {
            run_subgraph(args)?;
        }
    }

    Ok(())
}
