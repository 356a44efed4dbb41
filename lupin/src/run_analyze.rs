use crate::common::*;

use lupin::output::write_tsv;
use lupin::pathway_stats::set_members;
use pathway_data::{ExpressionFile, ExpressionMatrix, ExpressionSource};
use pvalue_util::{Adjuster, BrownContext, Combiner};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    repo: RepositoryArgs,

    #[arg(
        short = 'x',
        long = "expr",
        required = true,
        help = "Expression table (`id value`)",
        long_help = "Log-fold changes, one `id value` pair per line. \n\
		     Missing or malformed values are read as 0."
    )]
    expr_file: Box<str>,

    #[arg(
        long,
        default_value_t = 1000,
        help = "Bootstrap iterations"
    )]
    iter: usize,

    #[arg(
        long,
        value_enum,
        default_value = "accumulator",
        help = "Pathway score to test"
    )]
    score: ScoreKind,

    #[arg(
        long,
        default_value = "stouffer",
        help = "Combiner of ORA and bootstrap p-values",
        long_help = "fisher, stouffer, mean, logit, wilkinson, sump, product, vote. \n\
		     Unknown names fall back to stouffer."
    )]
    combiner: Box<str>,

    #[arg(
        long,
        default_value = "bh",
        help = "Multiple-testing adjustment",
        long_help = "none, bonferroni, holm, hochberg, bh, by. \n\
		     Unknown names fall back to bh."
    )]
    adjuster: Box<str>,

    #[arg(
        long,
        default_value_t = 0.0,
        help = "Nodes with |expression| above this are differentially expressed"
    )]
    de_threshold: f64,

    #[arg(
        long = "brown",
        help = "Reference expression matrix for the Brown's method column",
        long_help = "Optional `id sample1 sample2 ...` matrix. When given, \n\
		     member node p-values of each pathway are also combined \n\
		     by the empirical Brown's method."
    )]
    brown_file: Option<Box<str>>,

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

pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);

    let (repo, ctx) = args.repo.load()?;
    let expr = ExpressionFile::new(&args.expr_file).expression()?;
    let dense = expr.to_dense(&ctx.graph);
    let n_nonzero = dense.iter().filter(|&&x| x != 0.0).count();
    info!("{} of {} graph nodes with non-zero expression", n_nonzero, ctx.num_nodes());

    let observed = Propagator::new().run(&ctx, &dense)?;

    let sets = node_sets(&repo);
    let boot_args = BootstrapArgs {
        n_iter: args.iter,
        n_threads: args.threads,
        seed: args.seed,
        score: args.score,
        stop: None,
    };
    let boot = run_bootstrap(
        &ctx,
        &observed,
        &set_members(&sets),
        &Permutation::new(&dense),
        &boot_args,
    )?;

    let brown = match args.brown_file.as_deref() {
        Some(file) => {
            let mat = ExpressionMatrix::from_file(file)?;
            let brown = BrownContext::from_rows(mat.ids.clone(), &mat.rows())?;
            let covered = ctx
                .graph
                .nodes()
                .iter()
                .filter(|n| brown.contains(&n.id))
                .count();
            info!(
                "{} of {} nodes found in the Brown's method reference",
                covered,
                ctx.num_nodes()
            );
            Some(brown)
        }
        None => None,
    };

    let stats_args = PathwayStatsArgs {
        de_threshold: args.de_threshold,
        combiner: Combiner::from_name(&args.combiner),
        adjuster: Adjuster::from_name(&args.adjuster),
    };
    let (nodes, pathways) =
        pathway_statistics(&ctx.graph, &sets, &observed, &boot, brown.as_ref(), &stats_args)?;

    write_tsv(&nodes, &format!("{}.nodes.tsv.gz", args.out))?;
    write_tsv(&pathways, &format!("{}.pathways.tsv.gz", args.out))?;

    let params = serde_json::json!({
        "command": "analyze",
        "edges": args.repo.edge_file,
        "expression": args.expr_file,
        "weight_policy": args.repo.weight_policy,
        "iterations": args.iter,
        "completed": boot.n_completed,
        "failed": boot.n_failed,
        "score": format!("{:?}", args.score),
        "combiner": format!("{:?}", stats_args.combiner),
        "adjuster": format!("{:?}", stats_args.adjuster),
        "de_threshold": args.de_threshold,
        "seed": args.seed,
        "num_nodes": ctx.num_nodes(),
        "num_pathways": sets.len(),
    });
    write_lines(
        &[serde_json::to_string_pretty(&params)?],
        &format!("{}.params.json", args.out),
    )?;

    info!("done");
    Ok(())
}
