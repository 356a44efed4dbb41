use pathway_data::common_io::write_lines;
use pathway_data::*;

fn write_repository(dir: &std::path::Path) -> anyhow::Result<(String, String, String)> {
    let edges = dir.join("edges.tsv");
    let nodes = dir.join("nodes.tsv");
    let groups = dir.join("groups.tsv");

    let edge_lines = vec![
        "# pathway_id\tname\tsource\ttarget\ttype\tsubtypes",
        "path:01\tSignalling\tEGFR\tGRB2\tPPREL\tactivation,phosphorylation",
        "path:01\tSignalling\tGRB2\tSOS1\tPPREL\tactivation",
        "path:01\tSignalling\tSOS1\tRAS\tPPREL\tactivation",
        "path:02\tFeedback\tRAS\tEGFR\tGEREL\trepression",
        "path:02\tFeedback\tRAS\tC00001\tPCREL\tcompound",
        "path:02\tFeedback\tmiR-21\tRAS\tMGREL\tmirna_inhibition",
    ];
    write_lines(&edge_lines, edges.to_str().unwrap())?;

    let node_lines = vec![
        "EGFR\tEGFR\tgene",
        "GRB2\tGRB2\tgene",
        "C00001\tWater\tcompound",
        "miR-21\thsa-miR-21\tmirna",
        "XYZ\tmystery\tglycan",
    ];
    write_lines(&node_lines, nodes.to_str().unwrap())?;

    let group_lines = vec!["meta:ras\tRAS module\tRAS,SOS1,NOT_A_NODE"];
    write_lines(&group_lines, groups.to_str().unwrap())?;

    Ok((
        edges.to_str().unwrap().to_string(),
        nodes.to_str().unwrap().to_string(),
        groups.to_str().unwrap().to_string(),
    ))
}

#[test]
fn load_repository_from_tables() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (edges, nodes, groups) = write_repository(dir.path())?;
    let types = TypeRegistry::default();
    let repo = PathwayRepository::from_files(&edges, Some(&nodes), Some(&groups), &types)?;

    let g = repo.graph();
    assert_eq!(g.count_nodes(), 7);
    assert_eq!(g.count_edges(), 6);
    assert_eq!(repo.num_pathways(), 2);

    let p1 = repo.pathway_by_id("path:01").ok_or(anyhow::anyhow!("missing"))?;
    assert_eq!(p1.name.as_ref(), "Signalling");
    assert_eq!(p1.nodes.len(), 4);
    assert_eq!(p1.edges.len(), 3);

    let water = g.node_by_id("C00001").ok_or(anyhow::anyhow!("missing"))?;
    assert_eq!(water.name.as_ref(), "Water");
    assert_eq!(water.sign(), 0.0);
    let xyz = g.node_by_id("XYZ").ok_or(anyhow::anyhow!("missing"))?;
    assert_eq!(xyz.node_type.name.as_ref(), "OTHER");

    let egfr_grb2 = g
        .get_edge_by_id("EGFR", "GRB2")
        .ok_or(anyhow::anyhow!("missing"))?;
    assert_eq!(egfr_grb2.descriptions.len(), 2);
    assert_eq!(egfr_grb2.compute_weight(&EdgeWeightPolicy::Default), 1.0);
    assert_eq!(
        g.get_edge_by_id("miR-21", "RAS")
            .ok_or(anyhow::anyhow!("missing"))?
            .compute_weight(&EdgeWeightPolicy::Default),
        -1.0
    );

    assert!(repo.has_virtual_pathway("meta:ras"));
    assert!(!repo.has_virtual_pathway("meta:none"));
    assert_eq!(repo.nodes_of_virtual_pathway("meta:ras").map(|x| x.len()), Some(2));
    assert_eq!(repo.virtual_pathways().count(), 1);

    let sub = repo
        .pathway_graph("path:02")
        .ok_or(anyhow::anyhow!("missing"))?;
    assert_eq!(sub.count_nodes(), 4);
    assert_eq!(sub.count_edges(), 3);

    let mut expr = ExpressionVector::new();
    expr.insert("RAS", 1.5);
    expr.insert("GRB2", -0.2);
    expr.insert("not_in_graph", 9.0);
    let de = expr.differentially_expressed(g, 0.5);
    assert_eq!(de, vec![g.index_of("RAS").ok_or(anyhow::anyhow!("missing"))?]);
    assert_eq!(expr.differentially_expressed(g, 0.0).len(), 2);
    Ok(())
}

#[test]
fn graph_record_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (edges, nodes, _) = write_repository(dir.path())?;
    let repo = PathwayRepository::from_files(&edges, Some(&nodes), None, &TypeRegistry::default())?;

    let record = repo.graph().to_record();
    let json = serde_json::to_string(&record)?;
    let back: GraphRecord = serde_json::from_str(&json)?;
    assert_eq!(record, back);

    let g = WeightedGraph::from_record(back)?;
    assert_eq!(g.count_nodes(), repo.graph().count_nodes());
    assert_eq!(g.count_edges(), repo.graph().count_edges());
    for e in repo.graph().edges() {
        let f = g.get_edge(e.start, e.end).ok_or(anyhow::anyhow!("lost edge"))?;
        assert_eq!(e, f);
    }
    Ok(())
}

#[test]
fn malformed_expression_defaults_to_zero() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("expr.tsv.gz");
    let file = file.to_str().unwrap();
    write_lines(&["EGFR\t2.5", "GRB2\tNA", "SOS1\t-1e-1", "RAS"], file)?;

    let expr = ExpressionFile::new(file).expression()?;
    assert_eq!(expr.len(), 4);
    approx::assert_abs_diff_eq!(expr.get("EGFR"), 2.5);
    approx::assert_abs_diff_eq!(expr.get("GRB2"), 0.0);
    approx::assert_abs_diff_eq!(expr.get("SOS1"), -0.1);
    approx::assert_abs_diff_eq!(expr.get("unobserved"), 0.0);
    Ok(())
}

#[test]
fn expression_matrix_columns_are_samples() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("matrix.tsv");
    let file = file.to_str().unwrap();
    write_lines(&["id\ts1\ts2", "EGFR\t1\t2", "RAS\toops\t-3"], file)?;

    let mat = ExpressionMatrix::from_file(file)?;
    assert_eq!(mat.num_samples(), 2);
    assert_eq!(mat.sample(1).get("RAS"), -3.0);
    assert_eq!(mat.sample(0).get("RAS"), 0.0);
    assert_eq!(mat.rows(), vec![vec![1.0, 2.0], vec![0.0, -3.0]]);
    Ok(())
}
