use crate::common::*;

use lupin::output::write_tsv;
use lupin::simulation::read_constraints;
use pvalue_util::Adjuster;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    repo: RepositoryArgs,

    #[arg(
        short = 'c',
        long = "constraints",
        required = true,
        help = "Constrained nodes (`id over|under|both`)"
    )]
    constraint_file: Box<str>,

    #[arg(long, default_value_t = 100, help = "Trials of the observed constraints")]
    trials: usize,

    #[arg(long, default_value_t = 100, help = "Random constraint sets")]
    random_sets: usize,

    #[arg(long, default_value_t = 10, help = "Trials per random constraint set")]
    random_trials: usize,

    #[arg(
        long,
        default_value_t = 2.0,
        help = "Mean magnitude of a constrained node",
        long_help = "Constrained nodes draw |N(mean, sd)|; under-expressed \n\
		     nodes take the negative, `both` a random sign."
    )]
    mean: f64,

    #[arg(long, default_value_t = 0.5, help = "Standard deviation of the magnitude")]
    sd: f64,

    #[arg(long, default_value_t = 1e-3, help = "Scores within ±epsilon are unaffected")]
    epsilon: f64,

    #[arg(
        long,
        value_enum,
        default_value = "total-perturbation",
        help = "Score classified per trial"
    )]
    score: ScoreKind,

    #[arg(long, default_value = "bh", help = "Multiple-testing adjustment")]
    adjuster: Box<str>,

    #[arg(long, default_value_t = 42, help = "Random seed")]
    seed: u64,

    #[arg(long, default_value_t = 0, help = "Number of threads (0: all cores)")]
    threads: usize,

    #[arg(short, long, required = true, help = "Output header")]
    out: Box<str>,

    #[arg(
        long,
        short,
        help = "verbosity",
        long_help = "Enable verbose output `RUST_LOG=info`"
    )]
    verbose: bool,
}

pub fn run_simulate(args: &SimulateArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);

    let (repo, ctx) = args.repo.load()?;
    let constraints = read_constraints(&args.constraint_file, &ctx.graph)?;
    let sets = node_sets(&repo);

    let sampler = ConstraintSampler {
        mean: args.mean,
        sd: args.sd,
    };
    let sim_args = SimulationArgs {
        n_trials: args.trials,
        n_random: args.random_sets,
        n_random_trials: args.random_trials,
        n_threads: args.threads,
        seed: args.seed,
        score: args.score,
        epsilon: args.epsilon,
        adjuster: Adjuster::from_name(&args.adjuster),
        stop: None,
    };

    let sim = run_simulation(&ctx, &sets, &constraints, &sampler, &sim_args)?;
    info!(
        "{} trials, {} random sets completed, {} failed, {} skipped",
        sim.n_trials_completed, sim.n_random_completed, sim.n_failed, sim.n_skipped
    );

    write_tsv(&sim.rows, &format!("{}.simulation.tsv.gz", args.out))?;
    Ok(())
}
