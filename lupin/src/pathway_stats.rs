//! Node and pathway result tables of one observed propagation

use crate::bootstrap::BootstrapResult;
use crate::propagation::PerturbationResult;

use log::info;
use pathway_data::{differentially_expressed_nodes, GraphSource, WeightedGraph};
use pvalue_util::{empirical_brown, Adjuster, BrownContext, Combiner};
use serde::Serialize;
use statrs::distribution::{DiscreteCDF, Hypergeometric};

/// A pathway or virtual pathway as a set of merged-graph nodes
#[derive(Debug, Clone)]
pub struct NodeSet {
    pub id: Box<str>,
    pub name: Box<str>,
    pub is_virtual: bool,
    pub nodes: Vec<usize>,
}

/// Pathways first, then virtual pathways
pub fn node_sets(source: &dyn GraphSource) -> Vec<NodeSet> {
    let mut ret: Vec<NodeSet> = source
        .pathways()
        .map(|p| NodeSet {
            id: p.id.clone(),
            name: p.name.clone(),
            is_virtual: false,
            nodes: p.nodes.clone(),
        })
        .collect();
    ret.extend(source.virtual_pathways().map(|v| NodeSet {
        id: v.id.clone(),
        name: v.name.clone(),
        is_virtual: true,
        nodes: v.nodes.clone(),
    }));
    ret
}

pub fn set_members(sets: &[NodeSet]) -> Vec<Vec<usize>> {
    sets.iter().map(|s| s.nodes.clone()).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeResult {
    pub id: Box<str>,
    pub name: Box<str>,
    pub expression: f64,
    pub perturbation: f64,
    pub accumulator: f64,
    pub pvalue: f64,
    pub adjusted_pvalue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathwayResult {
    pub id: Box<str>,
    pub name: Box<str>,
    pub is_virtual: bool,
    pub n_nodes: usize,
    pub n_de: usize,
    pub accumulator: f64,
    pub total_perturbation: f64,
    pub impact_factor: f64,
    pub p_ora: f64,
    pub p_boot: f64,
    pub p_combined: f64,
    pub p_adjusted: f64,
    /// member node p-values combined by the empirical Brown's method
    pub p_brown: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PathwayStatsArgs {
    /// nodes with `|expression| > de_threshold` are differentially expressed
    pub de_threshold: f64,
    pub combiner: Combiner,
    pub adjuster: Adjuster,
}

impl Default for PathwayStatsArgs {
    fn default() -> Self {
        Self {
            de_threshold: 0.0,
            combiner: Combiner::Stouffer,
            adjuster: Adjuster::BH,
        }
    }
}

///
/// Hypergeometric upper tail `P(X >= k)`
///
/// * `population` - number of nodes in the graph
/// * `successes` - number of differentially expressed nodes
/// * `draws` - pathway size
/// * `k` - differentially expressed nodes in the pathway
///
pub fn ora_pvalue(population: usize, successes: usize, draws: usize, k: usize) -> anyhow::Result<f64> {
    if k == 0 || population == 0 {
        return Ok(1.0);
    }
    let hyper = Hypergeometric::new(population as u64, successes as u64, draws as u64)?;
    Ok(hyper.sf((k - 1) as u64).clamp(0.0, 1.0))
}

/// `ln(1/p_ora) + Σ|pert| / (mean|ΔE| n_de)`
pub fn impact_factor(p_ora: f64, sum_abs_pert: f64, mean_abs_de: f64, n_de: usize) -> f64 {
    let first = -p_ora.max(f64::MIN_POSITIVE).ln();
    let second = if n_de > 0 && mean_abs_de > 0.0 {
        sum_abs_pert / (mean_abs_de * n_de as f64)
    } else {
        0.0
    };
    first + second
}

fn node_table(
    graph: &WeightedGraph,
    observed: &PerturbationResult,
    boot: &BootstrapResult,
    adjuster: Adjuster,
) -> Vec<NodeResult> {
    let pvalues = boot.node_pvalues();
    let adjusted = adjuster.adjust(pvalues);
    graph
        .nodes()
        .iter()
        .enumerate()
        .map(|(i, node)| NodeResult {
            id: node.id.clone(),
            name: node.name.clone(),
            expression: observed.expression[i],
            perturbation: observed.perturbation[i],
            accumulator: observed.node_accumulator(i),
            pvalue: pvalues[i],
            adjusted_pvalue: adjusted[i],
        })
        .collect()
}

///
/// Per-node and per-pathway statistics
///
/// * `graph` - the graph `observed` was computed on
/// * `sets` - the node sets `boot` was computed for
/// * `observed` - observed propagation
/// * `boot` - bootstrap p-values
/// * `brown` - optional reference data for the Brown's method column
/// * `args` - DE threshold, combiner and adjuster
///
pub fn pathway_statistics(
    graph: &WeightedGraph,
    sets: &[NodeSet],
    observed: &PerturbationResult,
    boot: &BootstrapResult,
    brown: Option<&BrownContext>,
    args: &PathwayStatsArgs,
) -> anyhow::Result<(Vec<NodeResult>, Vec<PathwayResult>)> {
    if boot.pvalues.len() != graph.count_nodes() + sets.len() {
        return Err(anyhow::anyhow!(
            "bootstrap covers {} entities, expected {}",
            boot.pvalues.len(),
            graph.count_nodes() + sets.len()
        ));
    }

    let nodes = node_table(graph, observed, boot, args.adjuster);

    let de_nodes = differentially_expressed_nodes(&observed.expression, args.de_threshold);
    let mut is_de = vec![false; graph.count_nodes()];
    for &n in de_nodes.iter() {
        is_de[n] = true;
    }
    let n_de_total = de_nodes.len();
    let mean_abs_de = if n_de_total > 0 {
        de_nodes
            .iter()
            .map(|&n| observed.expression[n].abs())
            .sum::<f64>()
            / n_de_total as f64
    } else {
        0.0
    };
    info!(
        "{} of {} nodes differentially expressed",
        n_de_total,
        graph.count_nodes()
    );

    let node_p = boot.node_pvalues();
    let mut rows = Vec::with_capacity(sets.len());
    for (s, set) in sets.iter().enumerate() {
        let n_de = set.nodes.iter().filter(|&&n| is_de[n]).count();
        let p_ora = ora_pvalue(graph.count_nodes(), n_de_total, set.nodes.len(), n_de)?;
        let sum_abs_pert: f64 = set.nodes.iter().map(|&n| observed.perturbation[n].abs()).sum();
        let p_boot = boot.set_pvalues()[s];
        let p_combined = args.combiner.combine(&[p_ora, p_boot])?;

        let p_brown = match brown {
            Some(ctx) => {
                let ids: Vec<&str> = set.nodes.iter().map(|&n| graph.node(n).id.as_ref()).collect();
                let pv: Vec<f64> = set.nodes.iter().map(|&n| node_p[n]).collect();
                Some(empirical_brown(&pv, &ids, ctx)?)
            }
            None => None,
        };

        rows.push(PathwayResult {
            id: set.id.clone(),
            name: set.name.clone(),
            is_virtual: set.is_virtual,
            n_nodes: set.nodes.len(),
            n_de,
            accumulator: observed.accumulator(graph, &set.nodes),
            total_perturbation: observed.total_perturbation(graph, &set.nodes),
            impact_factor: impact_factor(p_ora, sum_abs_pert, mean_abs_de, n_de),
            p_ora,
            p_boot,
            p_combined,
            p_adjusted: p_combined,
            p_brown,
        });
    }

    let combined: Vec<f64> = rows.iter().map(|r| r.p_combined).collect();
    for (r, q) in rows.iter_mut().zip(args.adjuster.adjust(&combined)) {
        r.p_adjusted = q;
    }

    Ok((nodes, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ora_matches_closed_form() -> anyhow::Result<()> {
        // N = 10, K = 3, n = 2: P(X >= 2) = C(3,2) / C(10,2)
        assert_abs_diff_eq!(ora_pvalue(10, 3, 2, 2)?, 3.0 / 45.0, epsilon = 1e-12);
        // P(X >= 1) = 1 - C(7,2)/C(10,2)
        assert_abs_diff_eq!(ora_pvalue(10, 3, 2, 1)?, 1.0 - 21.0 / 45.0, epsilon = 1e-12);
        assert_eq!(ora_pvalue(10, 3, 2, 0)?, 1.0);
        Ok(())
    }

    #[test]
    fn impact_factor_terms() {
        assert_abs_diff_eq!(impact_factor(1.0, 5.0, 1.0, 0), 0.0);
        assert_abs_diff_eq!(
            impact_factor(0.1, 3.0, 0.5, 2),
            10f64.ln() + 3.0,
            epsilon = 1e-12
        );
        assert!(impact_factor(0.0, 0.0, 0.0, 0).is_finite());
    }
}
