pub use clap::{Args, Parser, Subcommand};
pub use log::info;

pub use lupin::*;
pub use pathway_data::common_io::write_lines;
pub use pathway_data::{EdgeWeightPolicy, GraphSource, PathwayRepository, TypeRegistry};

/// Inputs shared by every subcommand
#[derive(Args, Debug)]
pub struct RepositoryArgs {
    #[arg(
        short = 'e',
        long = "edges",
        required = true,
        help = "Pathway edge table",
        long_help = "Tab-separated edge table with columns \n\
		     `pathway_id pathway_name source target edge_type subtypes`, \n\
		     where `subtypes` is comma-separated. May be gzipped."
    )]
    pub edge_file: Box<str>,

    #[arg(
        long = "nodes",
        help = "Node table (`id name type`)",
        long_help = "Optional node table with columns `id name type`. \n\
		     Nodes only seen in the edge table are genes."
    )]
    pub node_file: Option<Box<str>>,

    #[arg(
        long = "virtual",
        help = "Virtual pathways (`id name member,member,...`)",
        long_help = "Optional table of named node subsets tested \n\
		     alongside the source pathways."
    )]
    pub virtual_file: Option<Box<str>>,

    #[arg(long, help = "Extra node types (`NAME sign`)")]
    pub node_types: Option<Box<str>>,

    #[arg(long, help = "Extra edge subtypes (`NAME weight priority symbol`)")]
    pub edge_subtypes: Option<Box<str>>,

    #[arg(
        long,
        default_value = "default",
        help = "Edge weight policy (default, sign, priority)",
        long_help = "How an edge's descriptions turn into a weight. \n\
		     `default` uses the subtype weight, `sign` its sign, \n\
		     `priority` scales it by priority / max priority."
    )]
    pub weight_policy: Box<str>,
}

impl RepositoryArgs {
    pub fn type_registry(&self) -> anyhow::Result<TypeRegistry> {
        let mut types = TypeRegistry::default();
        if let Some(file) = self.node_types.as_deref() {
            types.node_types.extend_from_file(file)?;
        }
        if let Some(file) = self.edge_subtypes.as_deref() {
            types.edge_subtypes.extend_from_file(file)?;
        }
        Ok(types)
    }

    /// Repository plus a propagation context over its merged graph
    pub fn load(&self) -> anyhow::Result<(PathwayRepository, PropagationContext)> {
        let types = self.type_registry()?;
        let repo = PathwayRepository::from_files(
            &self.edge_file,
            self.node_file.as_deref(),
            self.virtual_file.as_deref(),
            &types,
        )?;
        let policy = EdgeWeightPolicy::from_name(&self.weight_policy, types.edge_subtypes.max_priority());
        let ctx = PropagationContext::new(repo.graph().clone(), &policy);
        Ok((repo, ctx))
    }
}

pub fn init_logger(verbose: bool) {
    if verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}
