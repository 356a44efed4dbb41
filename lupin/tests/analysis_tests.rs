use approx::assert_abs_diff_eq;
use lupin::output::{write_tsv, TsvSink};
use lupin::pathway_stats::set_members;
use lupin::*;
use pathway_data::common_io::{read_lines_of_words_delim, write_lines};
use pathway_data::*;
use pvalue_util::{Adjuster, BrownContext, Combiner};

struct Inputs {
    _dir: tempfile::TempDir,
    edges: String,
    groups: String,
    expr: String,
    matrix: String,
    out: String,
}

fn write_inputs() -> anyhow::Result<Inputs> {
    let dir = tempfile::tempdir()?;
    let path = |x: &str| dir.path().join(x).to_str().unwrap().to_string();

    let edges = path("edges.tsv.gz");
    write_lines(
        &[
            "hsa01\tGrowth\tEGFR\tGRB2\tPPREL\tactivation",
            "hsa01\tGrowth\tGRB2\tSOS1\tPPREL\tactivation",
            "hsa01\tGrowth\tSOS1\tRAS\tPPREL\tactivation",
            "hsa02\tStress\tRAS\tMAPK\tPPREL\tactivation,phosphorylation",
            "hsa02\tStress\tDUSP\tMAPK\tPPREL\tinhibition",
            "hsa02\tStress\tMAPK\tFOS\tGEREL\texpression",
        ],
        &edges,
    )?;

    let groups = path("groups.tsv");
    write_lines(&["meta:out\tOutputs\tFOS,MAPK"], &groups)?;

    let expr = path("expr.tsv");
    write_lines(&["EGFR\t2.0", "DUSP\t-1.0", "FOS\tNaN", "ABSENT\t5"], &expr)?;

    let matrix = path("matrix.tsv");
    write_lines(
        &[
            "id\ts1\ts2\ts3\ts4\ts5",
            "FOS\t1\t2\t3\t4\t5",
            "MAPK\t1.1\t2.1\t2.9\t4.2\t5.0",
            "EGFR\t5\t1\t4\t2\t3",
        ],
        &matrix,
    )?;

    let out = path("result/analysis");
    Ok(Inputs {
        _dir: dir,
        edges,
        groups,
        expr,
        matrix,
        out,
    })
}

#[test]
fn analyze_from_tables() -> anyhow::Result<()> {
    let inp = write_inputs()?;
    let types = TypeRegistry::default();
    let repo = PathwayRepository::from_files(&inp.edges, None, Some(&inp.groups), &types)?;
    let ctx = PropagationContext::new(repo.graph().clone(), &EdgeWeightPolicy::Default);
    assert_eq!(ctx.num_nodes(), 7);

    let expr = ExpressionFile::new(&inp.expr).expression()?;
    let dense = expr.to_dense(&ctx.graph);
    let observed = Propagator::new().run(&ctx, &dense)?;

    let at = |id: &str| ctx.graph.index_of(id).unwrap();
    // EGFR -> GRB2 -> SOS1 -> RAS carry the full signal
    assert_abs_diff_eq!(observed.perturbation[at("RAS")], 2.0, epsilon = 1e-12);
    // RAS (+2) and DUSP (-1, inhibition) meet at MAPK
    assert_abs_diff_eq!(observed.perturbation[at("MAPK")], 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(observed.perturbation[at("FOS")], 3.0, epsilon = 1e-12);

    let sets = node_sets(&repo);
    assert_eq!(sets.len(), 3);
    assert!(sets[2].is_virtual);

    let boot_args = BootstrapArgs {
        n_iter: 200,
        n_threads: 2,
        ..Default::default()
    };
    let boot = run_bootstrap(&ctx, &observed, &set_members(&sets), &Permutation::new(&dense), &boot_args)?;
    assert_eq!(boot.n_completed, 200);

    let mat = ExpressionMatrix::from_file(&inp.matrix)?;
    let brown = BrownContext::from_rows(mat.ids.clone(), &mat.rows())?;

    let stats_args = PathwayStatsArgs {
        de_threshold: 0.5,
        combiner: Combiner::Fisher,
        adjuster: Adjuster::Holm,
    };
    let (nodes, pathways) =
        pathway_statistics(&ctx.graph, &sets, &observed, &boot, Some(&brown), &stats_args)?;

    assert_eq!(nodes.len(), 7);
    assert_eq!(pathways.len(), 3);
    for p in pathways.iter() {
        assert!((0.0..=1.0).contains(&p.p_ora));
        assert!((0.0..=1.0).contains(&p.p_combined));
        assert!(p.p_adjusted >= p.p_combined);
        assert!(p.impact_factor.is_finite());
        let brown = p.p_brown.ok_or(anyhow::anyhow!("no Brown column"))?;
        assert!((0.0..=1.0).contains(&brown));
    }

    // hsa01 holds one of the two DE nodes: P(X >= 1), N = 7, K = 2, n = 4
    let growth = &pathways[0];
    assert_eq!(growth.n_de, 1);
    assert_abs_diff_eq!(growth.p_ora, 1.0 - 3.0 / 21.0, epsilon = 1e-12);

    let meta = &pathways[2];
    assert_eq!(meta.n_de, 0);
    assert_eq!(meta.p_ora, 1.0);

    write_tsv(&nodes, &format!("{}.nodes.tsv.gz", inp.out))?;
    write_tsv(&pathways, &format!("{}.pathways.tsv.gz", inp.out))?;
    let back = read_lines_of_words_delim(&format!("{}.pathways.tsv.gz", inp.out), "\t", 0)?;
    assert_eq!(back.header.len(), 13);
    assert_eq!(back.lines.len(), 3);
    assert_eq!(back.lines[0][0].as_ref(), "hsa01");

    let json = serde_json::to_string(&pathways[0])?;
    assert!(json.contains("\"impact_factor\""));
    Ok(())
}

#[test]
fn brown_column_with_one_member() -> anyhow::Result<()> {
    let brown = BrownContext::from_rows(vec!["FOS".into()], &[vec![1.0, 2.0, 3.0]])?;
    assert!(brown.contains("FOS"));
    assert!(!brown.contains("RAS"));
    assert_eq!(pvalue_util::empirical_brown(&[0.037], &["FOS"], &brown)?, 0.037);
    assert_eq!(pvalue_util::empirical_brown(&[], &[], &brown)?, 1.0);
    Ok(())
}

#[test]
fn simulation_sees_downstream_activation() -> anyhow::Result<()> {
    let inp = write_inputs()?;
    let repo = PathwayRepository::from_files(&inp.edges, None, None, &TypeRegistry::default())?;
    let ctx = PropagationContext::new(repo.graph().clone(), &EdgeWeightPolicy::Default);
    let sets = node_sets(&repo);

    let egfr = ctx.graph.index_of("EGFR").unwrap();
    let constraints = [Constraint {
        node: egfr,
        kind: ConstraintKind::Over,
    }];
    let args = SimulationArgs {
        n_trials: 20,
        n_random: 30,
        n_random_trials: 5,
        n_threads: 2,
        ..Default::default()
    };
    let sim = run_simulation(&ctx, &sets, &constraints, &ConstraintSampler::default(), &args)?;
    assert_eq!(sim.n_trials_completed, 20);
    assert_eq!(sim.n_random_completed, 30);
    assert_eq!(sim.rows.len(), 7 + 2);

    let row = |id: &str| sim.rows.iter().find(|r| r.id.as_ref() == id).unwrap();

    for id in ["EGFR", "GRB2", "SOS1", "RAS", "MAPK", "FOS"] {
        let r = row(id);
        assert_eq!(r.activated, 20, "{}", id);
        assert_abs_diff_eq!(r.activity, 21f64.log10(), epsilon = 1e-12);
        // five random trials can never reach twenty
        assert_abs_diff_eq!(r.pvalue, 1.0 / 31.0, epsilon = 1e-12);
    }

    let dusp = row("DUSP");
    assert_eq!(dusp.unaffected, 20);
    assert_eq!(dusp.activity, 0.0);
    assert_eq!(dusp.pvalue, 1.0);

    let growth = row("hsa01");
    assert_eq!(growth.entity, "pathway");
    assert_eq!(growth.activated, 20);
    Ok(())
}

#[test]
fn streaming_sink_writes_header_and_rows() -> anyhow::Result<()> {
    let inp = write_inputs()?;
    let repo = PathwayRepository::from_files(&inp.edges, None, Some(&inp.groups), &TypeRegistry::default())?;
    let ctx = std::sync::Arc::new(PropagationContext::new(repo.graph().clone(), &EdgeWeightPolicy::Default));
    let sets = node_sets(&repo);
    let ids: std::sync::Arc<[Box<str>]> = sets.iter().map(|s| s.id.clone()).collect();
    let members = std::sync::Arc::new(set_members(&sets));

    let mat = ExpressionMatrix::from_file(&inp.matrix)?;
    let records: Vec<_> = lupin::batch::batch_records(&mat, &ctx).collect();
    let file = format!("{}.batch.tsv.gz", inp.out);
    let sink = TsvSink::<lupin::batch::BatchScores>::new(&file)?;

    let config = PipelineConfig {
        n_workers: 2,
        ..Default::default()
    };
    let (summary, _) = run_pipeline(
        records,
        |_| lupin::batch::PathwayScorer::new(ctx.clone(), ids.clone(), members.clone()),
        sink,
        &config,
    )?;
    assert_eq!(summary.n_written, 5);

    let back = read_lines_of_words_delim(&file, "\t", 0)?;
    assert_eq!(back.header.len(), 4);
    assert_eq!(back.lines.len(), 5 * 3);
    Ok(())
}

#[test]
fn finished_gz_sink_is_complete_without_drop() -> anyhow::Result<()> {
    let inp = write_inputs()?;
    let file = format!("{}.kept.tsv.gz", inp.out);
    let mut sink = TsvSink::<lupin::batch::BatchScores>::new(&file)?;
    let ids: std::sync::Arc<[Box<str>]> = ["p1", "p2"].iter().map(|&x| x.into()).collect();
    for s in 0..50 {
        sink.write(lupin::batch::BatchScores {
            sample: format!("s{}", s).into(),
            pathways: ids.clone(),
            accumulator: vec![s as f64, 0.5],
            total_perturbation: vec![1.0, -(s as f64)],
        })?;
    }
    sink.finish()?;
    // a detached writer thread never drops its sink
    std::mem::forget(sink);

    let back = read_lines_of_words_delim(&file, "\t", 0)?;
    assert_eq!(back.header.len(), 4);
    assert_eq!(back.lines.len(), 100);
    assert_eq!(back.lines[99][0].as_ref(), "s49");
    Ok(())
}
