//! Perturbation propagation and significance testing on pathway graphs

pub mod batch; // per-sample scores through the pipeline
pub mod bootstrap; // empirical null distributions
pub mod output; // TSV writers
pub mod pathway_stats; // ORA, impact factor, combined and adjusted p-values
pub mod pipeline; // bounded producer/consumer harness
pub mod propagation;
pub mod simulation; // three-state constraint simulation

pub use bootstrap::{run_bootstrap, BootstrapArgs, BootstrapResult, Permutation, Randomizer, ScoreKind};
pub use pathway_stats::{node_sets, pathway_statistics, NodeSet, PathwayStatsArgs};
pub use pipeline::{run_pipeline, BlockingQueue, OutputSink, PipelineConfig, PipelineSummary, RecordProcessor};
pub use propagation::{PerturbationResult, PropagationContext, Propagator};
pub use simulation::{run_simulation, Constraint, ConstraintKind, ConstraintSampler, SimulationArgs};
