use lupin::*;
use pathway_data::types::TypeRegistry;
use pathway_data::{EdgeDescription, EdgeWeightPolicy, Node, WeightedGraph};
use rand::rngs::StdRng;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn chain(n: usize) -> anyhow::Result<WeightedGraph> {
    let types = TypeRegistry::default();
    let mut g = WeightedGraph::new();
    for i in 0..n {
        let id = format!("n{}", i);
        g.add_node(Node::new(&id, &id, types.node_types.get("GENE")));
    }
    for i in 1..n {
        g.add_edge(
            &format!("n{}", i - 1),
            &format!("n{}", i),
            EdgeDescription {
                edge_type: types.edge_types.get("PPREL"),
                subtype: types.edge_subtypes.get("ACTIVATION"),
                pathway: None,
            },
        )?;
    }
    Ok(g)
}

/// Null expression that is always zero
struct Silent;

impl Randomizer for Silent {
    fn sample(&self, _rng: &mut StdRng, out: &mut [f64]) {
        out.fill(0.0);
    }
}

#[test]
fn never_exceeded_gives_one_over_n_plus_one() -> anyhow::Result<()> {
    let ctx = PropagationContext::new(chain(4)?, &EdgeWeightPolicy::Default);
    let expr = [3.0, 0.0, 0.0, 0.0];
    let observed = Propagator::new().run(&ctx, &expr)?;
    let sets = vec![vec![0, 1, 2, 3]];

    let args = BootstrapArgs {
        n_iter: 99,
        n_threads: 2,
        score: ScoreKind::TotalPerturbation,
        ..Default::default()
    };
    let boot = run_bootstrap(&ctx, &observed, &sets, &Silent, &args)?;

    assert_eq!(boot.n_completed, 99);
    assert_eq!(boot.node_pvalues().len(), 4);
    for &p in boot.node_pvalues() {
        assert_eq!(p, 0.01);
    }
    assert_eq!(boot.set_pvalues(), &[0.01]);
    Ok(())
}

#[test]
fn results_do_not_depend_on_threads() -> anyhow::Result<()> {
    let ctx = PropagationContext::new(chain(6)?, &EdgeWeightPolicy::Default);
    let expr = [1.0, -0.5, 0.0, 2.0, 0.0, 0.3];
    let observed = Propagator::new().run(&ctx, &expr)?;
    let sets = vec![vec![0, 1, 2], vec![3, 4, 5]];
    let perm = Permutation::new(&expr);

    let mut args = BootstrapArgs {
        n_iter: 200,
        n_threads: 1,
        seed: 7,
        ..Default::default()
    };
    let one = run_bootstrap(&ctx, &observed, &sets, &perm, &args)?;
    args.n_threads = 4;
    let four = run_bootstrap(&ctx, &observed, &sets, &perm, &args)?;

    assert_eq!(one.pvalues, four.pvalues);
    assert!(one.pvalues.iter().all(|&p| p > 0.0 && p <= 1.0));
    Ok(())
}

#[test]
fn stop_flag_keeps_partial_results() -> anyhow::Result<()> {
    let ctx = PropagationContext::new(chain(3)?, &EdgeWeightPolicy::Default);
    let expr = [1.0, 0.0, 0.0];
    let observed = Propagator::new().run(&ctx, &expr)?;

    let args = BootstrapArgs {
        n_iter: 50,
        n_threads: 1,
        stop: Some(Arc::new(AtomicBool::new(true))),
        ..Default::default()
    };
    let boot = run_bootstrap(&ctx, &observed, &[], &Silent, &args)?;
    assert_eq!(boot.n_completed, 0);
    assert_eq!(boot.n_skipped, 50);
    assert!(boot.pvalues.iter().all(|&p| p == 1.0));
    Ok(())
}

#[test]
fn zero_iterations_is_an_error() -> anyhow::Result<()> {
    let ctx = PropagationContext::new(chain(2)?, &EdgeWeightPolicy::Default);
    let observed = Propagator::new().run(&ctx, &[0.0, 0.0])?;
    let args = BootstrapArgs {
        n_iter: 0,
        ..Default::default()
    };
    assert!(run_bootstrap(&ctx, &observed, &[], &Silent, &args).is_err());
    Ok(())
}

#[test]
fn largest_seed_wraps_around() -> anyhow::Result<()> {
    let ctx = PropagationContext::new(chain(3)?, &EdgeWeightPolicy::Default);
    let expr = [1.0, 0.0, 0.0];
    let observed = Propagator::new().run(&ctx, &expr)?;
    let args = BootstrapArgs {
        n_iter: 3,
        n_threads: 1,
        seed: u64::MAX,
        ..Default::default()
    };
    let boot = run_bootstrap(&ctx, &observed, &[vec![0, 1, 2]], &Permutation::new(&expr), &args)?;
    assert_eq!(boot.n_completed, 3);
    assert_eq!(boot.n_failed, 0);
    Ok(())
}

#[test]
fn simulation_counts_skipped_work() -> anyhow::Result<()> {
    let ctx = PropagationContext::new(chain(3)?, &EdgeWeightPolicy::Default);
    let constraints = [Constraint {
        node: 0,
        kind: ConstraintKind::Both,
    }];
    let mut args = SimulationArgs {
        n_trials: 4,
        n_random: 6,
        n_random_trials: 2,
        n_threads: 1,
        seed: u64::MAX - 1,
        ..Default::default()
    };
    let sim = run_simulation(&ctx, &[], &constraints, &ConstraintSampler::default(), &args)?;
    assert_eq!(sim.n_trials_completed, 4);
    assert_eq!(sim.n_random_completed, 6);
    assert_eq!(sim.n_skipped, 0);

    args.stop = Some(Arc::new(AtomicBool::new(true)));
    let sim = run_simulation(&ctx, &[], &constraints, &ConstraintSampler::default(), &args)?;
    assert_eq!(sim.n_trials_completed, 0);
    assert_eq!(sim.n_random_completed, 0);
    assert_eq!(sim.n_skipped, 4 + 6);
    assert!(sim.rows.iter().all(|r| r.pvalue == 1.0));
    Ok(())
}
