use crate::graph::WeightedGraph;
use std::cmp::Ordering;

/// Fewer incoming dependencies first, then more outgoing dependents
fn priority_cmp(graph: &WeightedGraph, a: usize, b: usize) -> Ordering {
    graph
        .in_degree(a)
        .cmp(&graph.in_degree(b))
        .then_with(|| graph.out_degree(b).cmp(&graph.out_degree(a)))
        .then_with(|| a.cmp(&b))
}

/// Pseudo-topological order of all nodes.
///
/// Depth-first preorder with an explicit stack. Unvisited nodes are
/// tried as roots in `priority_cmp` order, and the unvisited successors
/// of each emitted node are expanded in the same order. Every node
/// appears exactly once; cycles are cut by the visited set.
pub fn topological_order(graph: &WeightedGraph) -> Vec<usize> {
    let nn = graph.count_nodes();
    let mut roots: Vec<usize> = (0..nn).collect();
    roots.sort_by(|&a, &b| priority_cmp(graph, a, b));

    let mut visited = vec![false; nn];
    let mut order = Vec::with_capacity(nn);
    let mut stack = vec![];

    for &root in roots.iter() {
        if visited[root] {
            continue;
        }
        stack.push(root);
        while let Some(i) = stack.pop() {
            if visited[i] {
                continue;
            }
            visited[i] = true;
            order.push(i);

            let mut next: Vec<usize> = graph
                .outgoing_nodes(i)
                .iter()
                .copied()
                .filter(|&j| !visited[j])
                .collect();
            next.sort_by(|&a, &b| priority_cmp(graph, a, b));
            // the highest-priority neighbour is popped first
            stack.extend(next.into_iter().rev());
        }
    }

    debug_assert_eq!(order.len(), nn);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeDescription, Node};
    use crate::types::TypeRegistry;

    fn build(ids: &[&str], edges: &[(&str, &str)]) -> anyhow::Result<WeightedGraph> {
        let reg = TypeRegistry::default();
        let mut g = WeightedGraph::new();
        for id in ids {
            g.add_node(Node::new(id, id, reg.node_types.get("GENE")));
        }
        for (s, e) in edges {
            g.add_edge(
                s,
                e,
                EdgeDescription {
                    edge_type: reg.edge_types.get("PPREL"),
                    subtype: reg.edge_subtypes.get("ACTIVATION"),
                    pathway: None,
                },
            )?;
        }
        Ok(g)
    }

    #[test]
    fn dag_is_expanded_depth_first() -> anyhow::Result<()> {
        let g = build(
            &["f", "e", "d", "c", "b", "a"],
            &[("a", "b"), ("a", "c"), ("c", "d"), ("b", "e"), ("b", "d"), ("d", "f")],
        )?;
        let order = topological_order(&g);
        let ids: Vec<&str> = order.iter().map(|&i| g.node(i).id.as_ref()).collect();
        // b before c (more dependents), e before d (fewer dependencies)
        assert_eq!(ids, vec!["a", "b", "e", "d", "f", "c"]);
        Ok(())
    }

    #[test]
    fn cycle_is_entered_from_the_root() -> anyhow::Result<()> {
        let g = build(
            &["0", "1", "2", "3", "4"],
            &[("0", "3"), ("3", "2"), ("2", "3"), ("3", "1"), ("2", "4")],
        )?;
        assert_eq!(topological_order(&g), vec![0, 3, 2, 4, 1]);
        Ok(())
    }

    #[test]
    fn cycles_still_give_a_permutation() -> anyhow::Result<()> {
        let g = build(
            &["a", "b", "c", "d", "lonely"],
            &[("a", "b"), ("b", "c"), ("c", "a"), ("c", "d"), ("d", "d")],
        )?;
        let mut order = topological_order(&g);
        assert_eq!(order.len(), 5);
        order.sort();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert!(topological_order(&WeightedGraph::new()).is_empty());
        Ok(())
    }
}
