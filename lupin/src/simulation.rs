//! Three-state perturbation simulation.
//!
//! A set of constrained nodes (over-expressed, under-expressed, or
//! either) is sampled many times and propagated. Each node and node set
//! is classified per trial as activated, inhibited, or unaffected, and
//! summarized by an activity score `log10((act + 1) / (inh + 1))`.
//! Significance comes from random constraint sets of the same size and
//! kinds.

use crate::bootstrap::{entity_scores, resolve_threads, stop_requested, EmpiricalCounter, Randomizer, ScoreKind};
use crate::pathway_stats::{set_members, NodeSet};
use crate::propagation::{PropagationContext, Propagator};

use fnv::FnvHashSet as HashSet;
use indicatif::ParallelProgressIterator;
use log::{info, warn};
use pathway_data::common_io::read_lines_of_words_delim;
use pathway_data::WeightedGraph;
use pvalue_util::Adjuster;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    Over,
    Under,
    Both,
}

impl ConstraintKind {
    pub fn from_name(name: &str) -> anyhow::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "over" | "overexpression" | "up" | "+" => Ok(Self::Over),
            "under" | "underexpression" | "down" | "-" => Ok(Self::Under),
            "both" | "any" | "+-" => Ok(Self::Both),
            _ => Err(anyhow::anyhow!("unknown constraint `{}`", name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub node: usize,
    pub kind: ConstraintKind,
}

/// Parse `node_id<TAB>kind` lines; a repeated node keeps its first kind
pub fn read_constraints(file: &str, graph: &WeightedGraph) -> anyhow::Result<Vec<Constraint>> {
    let out = read_lines_of_words_delim(file, &['\t', ' ', ','], -1)?;
    let mut seen = HashSet::default();
    let mut ret = vec![];
    for words in out.lines.iter() {
        let words: Vec<&str> = words.iter().map(|w| w.as_ref()).filter(|w| !w.is_empty()).collect();
        if words.len() < 2 {
            continue;
        }
        let node = graph
            .index_of(words[0])
            .ok_or_else(|| anyhow::anyhow!("{}: unknown node `{}`", file, words[0]))?;
        let kind = ConstraintKind::from_name(words[1])?;
        if seen.insert(node) {
            ret.push(Constraint { node, kind });
        } else {
            warn!("{}: repeated constraint on `{}`", file, words[0]);
        }
    }
    info!("{} constraints from {}", ret.len(), file);
    Ok(ret)
}

/// Gaussian magnitudes for constrained nodes
#[derive(Debug, Clone, Copy)]
pub struct ConstraintSampler {
    pub mean: f64,
    pub sd: f64,
}

impl Default for ConstraintSampler {
    fn default() -> Self {
        Self { mean: 2.0, sd: 0.5 }
    }
}

/// Constrained nodes get sampled values, every other node 0
pub struct ConstrainedExpression {
    constraints: Vec<Constraint>,
    normal: Normal<f64>,
}

impl ConstrainedExpression {
    pub fn new(constraints: Vec<Constraint>, sampler: &ConstraintSampler) -> anyhow::Result<Self> {
        let normal = Normal::new(sampler.mean, sampler.sd)?;
        Ok(Self {
            constraints,
            normal,
        })
    }
}

impl Randomizer for ConstrainedExpression {
    fn sample(&self, rng: &mut StdRng, out: &mut [f64]) {
        out.fill(0.0);
        for c in self.constraints.iter() {
            let x = self.normal.sample(rng).abs();
            out[c.node] = match c.kind {
                ConstraintKind::Over => x,
                ConstraintKind::Under => -x,
                ConstraintKind::Both => {
                    if rng.random_bool(0.5) {
                        x
                    } else {
                        -x
                    }
                }
            };
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationArgs {
    /// trials of the observed constraint set
    pub n_trials: usize,
    /// random constraint sets
    pub n_random: usize,
    /// trials of each random constraint set
    pub n_random_trials: usize,
    pub n_threads: usize,
    pub seed: u64,
    pub score: ScoreKind,
    /// scores within `±epsilon` count as unaffected
    pub epsilon: f64,
    pub adjuster: Adjuster,
    pub stop: Option<Arc<AtomicBool>>,
}

impl Default for SimulationArgs {
    fn default() -> Self {
        Self {
            n_trials: 100,
            n_random: 100,
            n_random_trials: 10,
            n_threads: 0,
            seed: 42,
            score: ScoreKind::TotalPerturbation,
            epsilon: 1e-3,
            adjuster: Adjuster::BH,
            stop: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub id: Box<str>,
    pub name: Box<str>,
    /// `node` or `pathway`
    pub entity: &'static str,
    pub activated: usize,
    pub inhibited: usize,
    pub unaffected: usize,
    pub activity: f64,
    pub pvalue: f64,
    pub adjusted_pvalue: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub rows: Vec<SimulationResult>,
    pub n_trials_completed: usize,
    pub n_random_completed: usize,
    pub n_failed: usize,
    /// trials and random sets skipped after a stop request
    pub n_skipped: usize,
}

pub fn activity_score(activated: usize, inhibited: usize) -> f64 {
    ((activated as f64 + 1.0) / (inhibited as f64 + 1.0)).log10()
}

/// Activated and inhibited counts of one constraint set, sequentially
#[allow(clippy::too_many_arguments)]
fn count_states<R: Randomizer>(
    ctx: &PropagationContext,
    sets: &[Vec<usize>],
    randomizer: &R,
    n_trials: usize,
    rng: &mut StdRng,
    args: &SimulationArgs,
    prop: &mut Propagator,
    expr: &mut [f64],
) -> anyhow::Result<(Vec<usize>, Vec<usize>)> {
    let ne = ctx.num_nodes() + sets.len();
    let mut act = vec![0; ne];
    let mut inh = vec![0; ne];
    for _ in 0..n_trials {
        randomizer.sample(rng, expr);
        let res = prop.run(ctx, expr)?;
        for (j, x) in entity_scores(ctx, &res, sets, args.score).into_iter().enumerate() {
            if x > args.epsilon {
                act[j] += 1;
            } else if x < -args.epsilon {
                inh[j] += 1;
            }
        }
    }
    Ok((act, inh))
}

///
/// Run the observed constraint set and a random population
///
/// * `ctx` - shared graph, weights and order
/// * `sets` - pathways and virtual pathways
/// * `constraints` - observed constraint set
/// * `sampler` - Gaussian parameters
/// * `args` - trial counts, threads, seed
///
pub fn run_simulation(
    ctx: &PropagationContext,
    sets: &[NodeSet],
    constraints: &[Constraint],
    sampler: &ConstraintSampler,
    args: &SimulationArgs,
) -> anyhow::Result<SimulationOutput> {
    if args.n_trials == 0 || args.n_random == 0 || args.n_random_trials == 0 {
        return Err(anyhow::anyhow!("trial counts must be positive"));
    }
    let nn = ctx.num_nodes();
    if constraints.len() > nn {
        return Err(anyhow::anyhow!(
            "{} constraints on {} nodes",
            constraints.len(),
            nn
        ));
    }

    let members = set_members(sets);
    let ne = nn + members.len();
    let observed = ConstrainedExpression::new(constraints.to_vec(), sampler)?;
    let n_threads = resolve_threads(args.n_threads);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()?;

    /////////////////////////////////
    // first simulation (observed) //
    /////////////////////////////////

    info!("simulating {} constrained nodes, {} trials", constraints.len(), args.n_trials);

    let act: Vec<AtomicUsize> = (0..ne).map(|_| AtomicUsize::new(0)).collect();
    let inh: Vec<AtomicUsize> = (0..ne).map(|_| AtomicUsize::new(0)).collect();
    let n_trials_completed = AtomicUsize::new(0);
    let n_failed = AtomicUsize::new(0);
    let n_skipped = AtomicUsize::new(0);

    pool.install(|| {
        (0..args.n_trials)
            .into_par_iter()
            .progress_count(args.n_trials as u64)
            .for_each_init(
                || (Propagator::new(), vec![0.0; nn]),
                |(prop, expr), t| {
                    if stop_requested(&args.stop) {
                        n_skipped.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(t as u64));
                    match count_states(ctx, &members, &observed, 1, &mut rng, args, prop, expr) {
                        Ok((a, i)) => {
                            for j in 0..ne {
                                act[j].fetch_add(a[j], Ordering::Relaxed);
                                inh[j].fetch_add(i[j], Ordering::Relaxed);
                            }
                            n_trials_completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!("trial {}: {}", t, e);
                            n_failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
            )
    });

    let n_trials_completed = n_trials_completed.into_inner();
    let act: Vec<usize> = act.into_iter().map(|x| x.into_inner()).collect();
    let inh: Vec<usize> = inh.into_iter().map(|x| x.into_inner()).collect();
    let activity: Vec<f64> = (0..ne).map(|j| activity_score(act[j], inh[j])).collect();

    ///////////////////////
    // random population //
    ///////////////////////

    info!(
        "{} random constraint sets, {} trials each",
        args.n_random, args.n_random_trials
    );

    let kinds: Vec<ConstraintKind> = constraints.iter().map(|c| c.kind).collect();
    let counter = EmpiricalCounter::new(ne);
    let n_random_completed = AtomicUsize::new(0);
    let offset = args.seed.wrapping_add(args.n_trials as u64);

    pool.install(|| {
        (0..args.n_random)
            .into_par_iter()
            .progress_count(args.n_random as u64)
            .for_each_init(
                || (Propagator::new(), vec![0.0; nn]),
                |(prop, expr), r| {
                    if stop_requested(&args.stop) {
                        n_skipped.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    let mut rng = StdRng::seed_from_u64(offset.wrapping_add(r as u64));
                    let random: Vec<Constraint> = rand::seq::index::sample(&mut rng, nn, kinds.len())
                        .into_iter()
                        .zip(kinds.iter())
                        .map(|(node, &kind)| Constraint { node, kind })
                        .collect();

                    let run = ConstrainedExpression::new(random, sampler).and_then(|randomizer| {
                        count_states(ctx, &members, &randomizer, args.n_random_trials, &mut rng, args, prop, expr)
                    });

                    match run {
                        Ok((a, i)) => {
                            for j in 0..ne {
                                counter.record(j, activity[j], activity_score(a[j], i[j]));
                            }
                            n_random_completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!("random set {}: {}", r, e);
                            n_failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
            )
    });

    let n_random_completed = n_random_completed.into_inner();
    let n_failed = n_failed.into_inner();
    let n_skipped = n_skipped.into_inner();
    if n_random_completed < args.n_random {
        warn!(
            "{} of {} random sets completed ({} skipped)",
            n_random_completed, args.n_random, n_skipped
        );
    }

    let pvalues: Vec<f64> = (0..ne)
        .map(|j| counter.directional_pvalue(j, activity[j], n_random_completed))
        .collect();
    let mut adjusted = args.adjuster.adjust(&pvalues[..nn]);
    adjusted.extend(args.adjuster.adjust(&pvalues[nn..]));

    let unaffected = |j: usize| n_trials_completed.saturating_sub(act[j] + inh[j]);

    let mut rows = Vec::with_capacity(ne);
    for (i, node) in ctx.graph.nodes().iter().enumerate() {
        rows.push(SimulationResult {
            id: node.id.clone(),
            name: node.name.clone(),
            entity: "node",
            activated: act[i],
            inhibited: inh[i],
            unaffected: unaffected(i),
            activity: activity[i],
            pvalue: pvalues[i],
            adjusted_pvalue: adjusted[i],
        });
    }
    for (s, set) in sets.iter().enumerate() {
        let j = nn + s;
        rows.push(SimulationResult {
            id: set.id.clone(),
            name: set.name.clone(),
            entity: "pathway",
            activated: act[j],
            inhibited: inh[j],
            unaffected: unaffected(j),
            activity: activity[j],
            pvalue: pvalues[j],
            adjusted_pvalue: adjusted[j],
        });
    }

    Ok(SimulationOutput {
        rows,
        n_trials_completed,
        n_random_completed,
        n_failed,
        n_skipped,
    })
}
