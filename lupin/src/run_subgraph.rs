use crate::common::*;

use lupin::output::write_edge_list;

#[derive(Args, Debug)]
pub struct SubgraphArgs {
    #[command(flatten)]
    repo: RepositoryArgs,

    #[arg(short, long, required = true, help = "Start node identifier")]
    start: Box<str>,

    #[arg(
        short,
        long,
        default_value = "stdout",
        help = "Output edge list (`stdout` or a file)"
    )]
    out: Box<str>,

    #[arg(long, help = "Also write the subgraph as JSON")]
    json: Option<Box<str>>,

    #[arg(
        long,
        short,
        help = "verbosity",
        long_help = "Enable verbose output `RUST_LOG=info`"
    )]
    verbose: bool,
}

pub fn run_subgraph(args: &SubgraphArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);

    let types = args.repo.type_registry()?;
    let repo = PathwayRepository::from_files(
        &args.repo.edge_file,
        args.repo.node_file.as_deref(),
        args.repo.virtual_file.as_deref(),
        &types,
    )?;
    let graph = repo.graph();
    let start = graph
        .index_of(&args.start)
        .ok_or_else(|| anyhow::anyhow!("unknown node `{}`", args.start))?;

    let sub = graph.downstream_subgraph(start);
    info!(
        "{} nodes, {} edges downstream of {}",
        sub.count_nodes(),
        sub.count_edges(),
        args.start
    );

    let policy =
        EdgeWeightPolicy::from_name(&args.repo.weight_policy, types.edge_subtypes.max_priority());
    write_edge_list(&sub, &policy, &args.out)?;

    if let Some(file) = args.json.as_deref() {
        write_lines(&[serde_json::to_string(&sub.to_record())?], file)?;
    }
    Ok(())
}
