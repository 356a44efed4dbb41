use crate::common::*;

use lupin::batch::{batch_records, BatchScores, PathwayScorer};
use lupin::output::TsvSink;
use lupin::pathway_stats::set_members;
use pathway_data::ExpressionMatrix;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    repo: RepositoryArgs,

    #[arg(
        short = 'x',
        long = "matrix",
        required = true,
        help = "Expression matrix (`id sample1 sample2 ...`)"
    )]
    matrix_file: Box<str>,

    #[arg(long, default_value_t = 0, help = "Worker threads (0: all cores)")]
    workers: usize,

    #[arg(long, default_value_t = 128, help = "Capacity of each queue")]
    queue_capacity: usize,

    #[arg(
        long,
        default_value_t = 200,
        help = "Join polls before interrupting workers"
    )]
    max_join_retries: usize,

    #[arg(long, default_value_t = 50, help = "Milliseconds between join polls")]
    join_poll_ms: u64,

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

pub fn run_batch(args: &BatchArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);

    let (repo, ctx) = args.repo.load()?;
    let matrix = ExpressionMatrix::from_file(&args.matrix_file)?;
    let sets = node_sets(&repo);
    let ids: Arc<[Box<str>]> = sets.iter().map(|s| s.id.clone()).collect();
    let members = Arc::new(set_members(&sets));
    let ctx = Arc::new(ctx);

    let config = PipelineConfig {
        n_workers: args.workers,
        queue_capacity: args.queue_capacity,
        max_join_retries: args.max_join_retries,
        join_poll: Duration::from_millis(args.join_poll_ms),
    };

    let sink = TsvSink::<BatchScores>::new(&format!("{}.batch.tsv.gz", args.out))?;
    let records: Vec<_> = batch_records(&matrix, &ctx).collect();

    let (summary, _) = run_pipeline(
        records,
        |_| PathwayScorer::new(ctx.clone(), ids.clone(), members.clone()),
        sink,
        &config,
    )?;

    if summary.n_written < summary.n_read {
        log::warn!(
            "{} of {} samples written ({} failed, {} dropped)",
            summary.n_written,
            summary.n_read,
            summary.n_failed,
            summary.n_dropped
        );
    }
    Ok(())
}
