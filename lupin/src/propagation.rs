//! Perturbation propagation over a weighted pathway graph.
//!
//! The perturbation of node `n` is its own expression plus, for every
//! upstream node `u`,
//!
//! ```text
//! w(u, n) * pert(u) / Σ_v |w(u, v)|
//! ```
//!
//! Nodes are evaluated in pseudo-topological order. Inside one top-level
//! evaluation a node that is re-entered through a cycle contributes its
//! seed value (its expression) instead of recursing again. Once a node is
//! finished its value is final for the rest of the run.

use pathway_data::{topological_order, EdgeWeightPolicy, EdgeWeights, WeightedGraph};

/// Read-only inputs shared by every propagation worker
#[derive(Debug, Clone)]
pub struct PropagationContext {
    pub graph: WeightedGraph,
    pub weights: EdgeWeights,
    /// evaluation order
    pub order: Vec<usize>,
}

impl PropagationContext {
    pub fn new(graph: WeightedGraph, policy: &EdgeWeightPolicy) -> Self {
        let weights = EdgeWeights::new(&graph, policy);
        let order = topological_order(&graph);
        Self {
            graph,
            weights,
            order,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.count_nodes()
    }

    /// Signed contribution of `u` to `n` given `pert(u)`.
    /// `None` when not finite (e.g., `u` has no outgoing weight).
    fn contribution(&self, u: usize, n: usize, pert_u: f64) -> Option<f64> {
        let x = self.weights.weight(u, n) * pert_u / self.weights.total_abs_outgoing(u);
        x.is_finite().then_some(x)
    }
}

/// Output of one propagation run, indexed like the graph's nodes
#[derive(Debug, Clone, PartialEq)]
pub struct PerturbationResult {
    pub perturbation: Vec<f64>,
    pub expression: Vec<f64>,
    /// number of node finalizations; equals the number of nodes
    pub n_finalized: usize,
}

impl PerturbationResult {
    /// `pert(n) - expr(n)`
    pub fn node_accumulator(&self, n: usize) -> f64 {
        self.perturbation[n] - self.expression[n]
    }

    /// `Σ sign(n) (pert(n) - expr(n))` over `nodes`
    pub fn accumulator(&self, graph: &WeightedGraph, nodes: &[usize]) -> f64 {
        nodes
            .iter()
            .map(|&n| graph.node(n).sign() * self.node_accumulator(n))
            .sum()
    }

    /// `Σ sign(n) pert(n)` over `nodes`
    pub fn total_perturbation(&self, graph: &WeightedGraph, nodes: &[usize]) -> f64 {
        nodes
            .iter()
            .map(|&n| graph.node(n).sign() * self.perturbation[n])
            .sum()
    }
}

/// One pending node on the evaluation stack
struct Frame {
    node: usize,
    /// next incoming neighbour to visit
    next: usize,
    sum: f64,
}

/// Private memo state of one worker.
///
/// A `Propagator` can be reused for many runs against the same context;
/// every call to [`Propagator::run`] starts from a clean state.
#[derive(Default)]
pub struct Propagator {
    finalized: Vec<Option<f64>>,
    /// seed or finished value of each node within the current start
    chain: Vec<Option<f64>>,
    touched: Vec<usize>,
    stack: Vec<Frame>,
    n_finalized: usize,
}

impl Propagator {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, nn: usize) {
        self.finalized.clear();
        self.finalized.resize(nn, None);
        self.chain.clear();
        self.chain.resize(nn, None);
        self.touched.clear();
        self.stack.clear();
        self.n_finalized = 0;
    }

    fn clear_chain(&mut self) {
        for &i in self.touched.iter() {
            self.chain[i] = None;
        }
        self.touched.clear();
    }

    fn seed(&mut self, n: usize, expr: &[f64]) {
        self.chain[n] = Some(expr[n]);
        self.touched.push(n);
        self.stack.push(Frame {
            node: n,
            next: 0,
            sum: 0.0,
        });
    }

    /// Evaluate `pert(start, start)` with an explicit stack
    fn evaluate(&mut self, ctx: &PropagationContext, start: usize, expr: &[f64]) -> f64 {
        if let Some(v) = self.finalized[start] {
            return v;
        }
        self.clear_chain();
        self.seed(start, expr);

        loop {
            let Some(top) = self.stack.last_mut() else {
                break;
            };
            let n = top.node;
            let upstream = ctx.graph.ingoing_nodes(n);

            if top.next < upstream.len() {
                let u = upstream[top.next];
                match self.chain[u].or(self.finalized[u]) {
                    Some(pert_u) => {
                        if let Some(x) = ctx.contribution(u, n, pert_u) {
                            top.sum += x;
                        }
                        top.next += 1;
                    }
                    None => self.seed(u, expr),
                }
            } else {
                let value = expr[n] + top.sum;
                self.stack.pop();
                self.chain[n] = Some(value);
                self.finalized[n] = Some(value);
                self.n_finalized += 1;
                if self.stack.is_empty() {
                    return value;
                }
            }
        }
        self.finalized[start].unwrap_or(expr[start])
    }

    ///
    /// Propagate one expression vector
    ///
    /// * `ctx` - shared graph, weights and order
    /// * `expr` - expression aligned with node indices
    ///
    pub fn run(&mut self, ctx: &PropagationContext, expr: &[f64]) -> anyhow::Result<PerturbationResult> {
        let nn = ctx.num_nodes();
        if expr.len() != nn {
            return Err(anyhow::anyhow!(
                "{} expression values for {} nodes",
                expr.len(),
                nn
            ));
        }

        self.reset(nn);
        for &node in ctx.order.iter() {
            self.evaluate(ctx, node, expr);
        }

        let perturbation = self
            .finalized
            .iter()
            .zip(expr.iter())
            .map(|(p, &x)| p.unwrap_or(x))
            .collect();

        Ok(PerturbationResult {
            perturbation,
            expression: expr.to_vec(),
            n_finalized: self.n_finalized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pathway_data::types::TypeRegistry;
    use pathway_data::{EdgeDescription, Node};

    fn edge(types: &TypeRegistry, subtype: &str) -> EdgeDescription {
        EdgeDescription {
            edge_type: types.edge_types.get("PPREL"),
            subtype: types.edge_subtypes.get(subtype),
            pathway: None,
        }
    }

    fn graph_of(edges: &[(&str, &str, &str)]) -> anyhow::Result<WeightedGraph> {
        let types = TypeRegistry::default();
        let mut g = WeightedGraph::new();
        for &(a, b, s) in edges {
            for x in [a, b] {
                g.add_node(Node::new(x, x, types.node_types.get("GENE")));
            }
            g.add_edge(a, b, edge(&types, s))?;
        }
        Ok(g)
    }

    #[test]
    fn source_nodes_keep_expression() -> anyhow::Result<()> {
        let g = graph_of(&[("a", "b", "ACTIVATION")])?;
        let ctx = PropagationContext::new(g, &EdgeWeightPolicy::Default);
        let out = Propagator::new().run(&ctx, &[3.0, 0.0])?;
        assert_abs_diff_eq!(out.perturbation[0], 3.0);
        assert_abs_diff_eq!(out.perturbation[1], 3.0);
        assert_eq!(out.n_finalized, 2);
        Ok(())
    }

    #[test]
    fn zero_outgoing_weight_is_skipped() -> anyhow::Result<()> {
        let g = graph_of(&[("a", "b", "BINDING_ASSOCIATION")])?;
        let ctx = PropagationContext::new(g, &EdgeWeightPolicy::Default);
        let out = Propagator::new().run(&ctx, &[1.0, 0.5])?;
        assert_eq!(out.perturbation, vec![1.0, 0.5]);
        Ok(())
    }

    #[test]
    fn length_mismatch_is_an_error() -> anyhow::Result<()> {
        let g = graph_of(&[("a", "b", "ACTIVATION")])?;
        let ctx = PropagationContext::new(g, &EdgeWeightPolicy::Default);
        assert!(Propagator::new().run(&ctx, &[1.0]).is_err());
        Ok(())
    }

    #[test]
    fn reuse_gives_identical_results() -> anyhow::Result<()> {
        let g = graph_of(&[
            ("a", "b", "ACTIVATION"),
            ("b", "c", "INHIBITION"),
            ("c", "a", "ACTIVATION"),
        ])?;
        let ctx = PropagationContext::new(g, &EdgeWeightPolicy::Default);
        let mut prop = Propagator::new();
        let first = prop.run(&ctx, &[1.0, -2.0, 0.5])?;
        prop.run(&ctx, &[0.0, 0.0, 9.0])?;
        let again = prop.run(&ctx, &[1.0, -2.0, 0.5])?;
        assert_eq!(first, again);
        Ok(())
    }
}
