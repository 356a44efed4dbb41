//! Bootstrap null distributions for node and node-set scores.
//!
//! Every iteration draws a randomized expression vector, propagates it,
//! and compares each entity's score with the observed one. Counters are
//! atomic so iterations can run on any number of threads; iteration `i`
//! always uses `StdRng::seed_from_u64(seed + i)`, wrapping on overflow.

use crate::propagation::{PerturbationResult, PropagationContext, Propagator};

use indicatif::ParallelProgressIterator;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Which pathway-level score is tested
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreKind {
    /// `Σ sign (pert - expr)`; nodes use `pert - expr`
    #[default]
    Accumulator,
    /// `Σ sign pert`; nodes use `pert`
    TotalPerturbation,
}

/// Node scores followed by one score per node set
pub fn entity_scores(
    ctx: &PropagationContext,
    result: &PerturbationResult,
    sets: &[Vec<usize>],
    score: ScoreKind,
) -> Vec<f64> {
    let nn = result.perturbation.len();
    let mut ret = Vec::with_capacity(nn + sets.len());
    match score {
        ScoreKind::Accumulator => {
            ret.extend((0..nn).map(|n| result.node_accumulator(n)));
            ret.extend(sets.iter().map(|s| result.accumulator(&ctx.graph, s)));
        }
        ScoreKind::TotalPerturbation => {
            ret.extend_from_slice(&result.perturbation);
            ret.extend(sets.iter().map(|s| result.total_perturbation(&ctx.graph, s)));
        }
    }
    ret
}

/// Draws one randomized expression vector per iteration
pub trait Randomizer: Sync {
    fn sample(&self, rng: &mut StdRng, out: &mut [f64]);
}

/// Shuffle the observed values across all nodes
pub struct Permutation {
    values: Vec<f64>,
}

impl Permutation {
    pub fn new(observed: &[f64]) -> Self {
        Self {
            values: observed.to_vec(),
        }
    }
}

impl Randomizer for Permutation {
    fn sample(&self, rng: &mut StdRng, out: &mut [f64]) {
        out.copy_from_slice(&self.values);
        out.shuffle(rng);
    }
}

/// "reached or exceeded" counters, one set per entity
pub struct EmpiricalCounter {
    abs_ge: Vec<AtomicUsize>,
    upper: Vec<AtomicUsize>,
    lower: Vec<AtomicUsize>,
}

fn zeros(n: usize) -> Vec<AtomicUsize> {
    (0..n).map(|_| AtomicUsize::new(0)).collect()
}

impl EmpiricalCounter {
    pub fn new(n: usize) -> Self {
        Self {
            abs_ge: zeros(n),
            upper: zeros(n),
            lower: zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.abs_ge.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abs_ge.is_empty()
    }

    pub fn record(&self, i: usize, observed: f64, random: f64) {
        if !random.is_finite() {
            return;
        }
        if random.abs() >= observed.abs() {
            self.abs_ge[i].fetch_add(1, Ordering::Relaxed);
        }
        if random >= observed {
            self.upper[i].fetch_add(1, Ordering::Relaxed);
        }
        if random <= observed {
            self.lower[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn abs_count(&self, i: usize) -> usize {
        self.abs_ge[i].load(Ordering::Relaxed)
    }

    pub fn upper_count(&self, i: usize) -> usize {
        self.upper[i].load(Ordering::Relaxed)
    }

    pub fn lower_count(&self, i: usize) -> usize {
        self.lower[i].load(Ordering::Relaxed)
    }

    /// `(count + 1) / (n + 1)` on the magnitude counter
    pub fn pvalue(&self, i: usize, n_completed: usize) -> f64 {
        add_one_pvalue(self.abs_count(i), n_completed)
    }

    /// Upper tail for a positive observation, lower tail for a negative
    /// one, and 1 for zero
    pub fn directional_pvalue(&self, i: usize, observed: f64, n_completed: usize) -> f64 {
        if observed > 0.0 {
            add_one_pvalue(self.upper_count(i), n_completed)
        } else if observed < 0.0 {
            add_one_pvalue(self.lower_count(i), n_completed)
        } else {
            1.0
        }
    }
}

pub fn add_one_pvalue(count: usize, n: usize) -> f64 {
    ((count + 1) as f64 / (n + 1) as f64).min(1.0)
}

/// `0` means every available core
pub fn resolve_threads(n_threads: usize) -> usize {
    if n_threads == 0 {
        num_cpus::get()
    } else {
        n_threads
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapArgs {
    pub n_iter: usize,
    pub n_threads: usize,
    pub seed: u64,
    pub score: ScoreKind,
    /// once raised, remaining iterations are skipped
    pub stop: Option<Arc<AtomicBool>>,
}

impl Default for BootstrapArgs {
    fn default() -> Self {
        Self {
            n_iter: 1000,
            n_threads: 0,
            seed: 42,
            score: ScoreKind::default(),
            stop: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapResult {
    /// observed scores: nodes first, then node sets
    pub observed: Vec<f64>,
    pub pvalues: Vec<f64>,
    pub num_nodes: usize,
    pub n_completed: usize,
    pub n_failed: usize,
    pub n_skipped: usize,
}

impl BootstrapResult {
    pub fn node_pvalues(&self) -> &[f64] {
        &self.pvalues[..self.num_nodes]
    }

    pub fn set_pvalues(&self) -> &[f64] {
        &self.pvalues[self.num_nodes..]
    }
}

pub(crate) fn stop_requested(stop: &Option<Arc<AtomicBool>>) -> bool {
    stop.as_ref().is_some_and(|s| s.load(Ordering::Relaxed))
}

///
/// Empirical p-values of node and node-set scores
///
/// * `ctx` - shared graph, weights and order
/// * `observed` - observed propagation
/// * `sets` - node sets (pathways) under test
/// * `randomizer` - null expression generator
/// * `args` - iterations, threads, seed and score
///
pub fn run_bootstrap<R: Randomizer>(
    ctx: &PropagationContext,
    observed: &PerturbationResult,
    sets: &[Vec<usize>],
    randomizer: &R,
    args: &BootstrapArgs,
) -> anyhow::Result<BootstrapResult> {
    if args.n_iter == 0 {
        return Err(anyhow::anyhow!("need at least one bootstrap iteration"));
    }

    let nn = ctx.num_nodes();
    let obs = entity_scores(ctx, observed, sets, args.score);
    let counter = EmpiricalCounter::new(obs.len());
    let n_completed = AtomicUsize::new(0);
    let n_failed = AtomicUsize::new(0);
    let n_skipped = AtomicUsize::new(0);

    let n_threads = resolve_threads(args.n_threads);
    info!(
        "bootstrap: {} iterations over {} nodes, {} sets, {} threads",
        args.n_iter,
        nn,
        sets.len(),
        n_threads
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()?;

    pool.install(|| {
        (0..args.n_iter)
            .into_par_iter()
            .progress_count(args.n_iter as u64)
            .for_each_init(
                || (Propagator::new(), vec![0.0; nn]),
                |(prop, expr), i| {
                    if stop_requested(&args.stop) {
                        n_skipped.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(i as u64));
                    randomizer.sample(&mut rng, expr);
                    match prop.run(ctx, expr) {
                        Ok(res) => {
                            let random = entity_scores(ctx, &res, sets, args.score);
                            for (j, (&o, &r)) in obs.iter().zip(random.iter()).enumerate() {
                                counter.record(j, o, r);
                            }
                            n_completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!("iteration {}: {}", i, e);
                            n_failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
            )
    });

    let n_completed = n_completed.into_inner();
    let n_failed = n_failed.into_inner();
    let n_skipped = n_skipped.into_inner();
    if n_completed < args.n_iter {
        warn!(
            "bootstrap: {} of {} iterations completed ({} failed, {} skipped)",
            n_completed, args.n_iter, n_failed, n_skipped
        );
    }

    let pvalues = (0..obs.len())
        .map(|j| counter.pvalue(j, n_completed))
        .collect();

    Ok(BootstrapResult {
        observed: obs,
        pvalues,
        num_nodes: nn,
        n_completed,
        n_failed,
        n_skipped,
    })
}
