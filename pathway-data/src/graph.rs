use crate::types::{EdgeSubType, EdgeType, NodeType};
use crate::weights::EdgeWeightPolicy;
use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use serde::{Deserialize, Serialize};

/// A gene, protein, metabolite, or any other pathway entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Box<str>,
    pub name: Box<str>,
    pub node_type: NodeType,
}

impl Node {
    pub fn new(id: &str, name: &str, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type,
        }
    }

    pub fn sign(&self) -> f64 {
        self.node_type.sign
    }
}

/// One interaction annotated on an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub edge_type: EdgeType,
    pub subtype: EdgeSubType,
    pub pathway: Option<Box<str>>,
}

/// A directed edge `start -> end` with one or more descriptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub start: usize,
    pub end: usize,
    pub descriptions: Vec<EdgeDescription>,
}

impl Edge {
    /// Effective weight of this edge under `policy`.
    ///
    /// Only the descriptions with the highest subtype priority count;
    /// their policy weights are summed. Node values never enter here.
    pub fn compute_weight(&self, policy: &EdgeWeightPolicy) -> f64 {
        let top = match self.descriptions.iter().map(|d| d.subtype.priority).max() {
            Some(p) => p,
            None => return 0.0,
        };
        let w: f64 = self
            .descriptions
            .iter()
            .filter(|d| d.subtype.priority == top)
            .map(|d| policy.description_weight(self, d))
            .sum();
        if w.is_finite() {
            w
        } else {
            0.0
        }
    }
}

/// Directed multigraph of pathway entities.
///
/// Nodes are addressed by dense indices; `node_index` maps identifiers
/// back to indices. Parallel interactions between the same ordered pair
/// are folded into one `Edge` with several descriptions.
#[derive(Debug, Clone, Default)]
pub struct WeightedGraph {
    nodes: Vec<Node>,
    node_index: HashMap<Box<str>, usize>,
    edges: Vec<Edge>,
    edge_index: HashMap<(usize, usize), usize>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

/// Serializable snapshot of a `WeightedGraph`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl WeightedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless its identifier exists; returns its index
    pub fn add_node(&mut self, node: Node) -> usize {
        if let Some(&i) = self.node_index.get(&node.id) {
            return i;
        }
        let i = self.nodes.len();
        self.node_index.insert(node.id.clone(), i);
        self.nodes.push(node);
        self.outgoing.push(vec![]);
        self.incoming.push(vec![]);
        i
    }

    /// Add an interaction. If the pair already has an edge, the
    /// description is appended to it (exact duplicates are ignored).
    pub fn add_edge(
        &mut self,
        start: &str,
        end: &str,
        description: EdgeDescription,
    ) -> anyhow::Result<usize> {
        let s = self
            .index_of(start)
            .ok_or_else(|| anyhow::anyhow!("unknown start node {}", start))?;
        let e = self
            .index_of(end)
            .ok_or_else(|| anyhow::anyhow!("unknown end node {}", end))?;
        Ok(self.add_edge_by_index(s, e, description))
    }

    pub fn add_edge_by_index(&mut self, start: usize, end: usize, description: EdgeDescription) -> usize {
        if let Some(&k) = self.edge_index.get(&(start, end)) {
            let edge = &mut self.edges[k];
            if !edge.descriptions.contains(&description) {
                edge.descriptions.push(description);
            }
            return k;
        }
        let k = self.edges.len();
        self.edges.push(Edge {
            start,
            end,
            descriptions: vec![description],
        });
        self.edge_index.insert((start, end), k);
        self.outgoing[start].push(end);
        self.incoming[end].push(start);
        k
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    pub fn node(&self, i: usize) -> &Node {
        &self.nodes[i]
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn outgoing_nodes(&self, i: usize) -> &[usize] {
        &self.outgoing[i]
    }

    pub fn ingoing_nodes(&self, i: usize) -> &[usize] {
        &self.incoming[i]
    }

    pub fn get_edge(&self, start: usize, end: usize) -> Option<&Edge> {
        self.edge_index.get(&(start, end)).map(|&k| &self.edges[k])
    }

    pub fn get_edge_by_id(&self, start: &str, end: &str) -> Option<&Edge> {
        self.get_edge(self.index_of(start)?, self.index_of(end)?)
    }

    pub fn in_degree(&self, i: usize) -> usize {
        self.incoming[i].len()
    }

    pub fn out_degree(&self, i: usize) -> usize {
        self.outgoing[i].len()
    }

    pub fn count_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn count_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes without outgoing edges
    pub fn endpoints(&self) -> Vec<usize> {
        (0..self.count_nodes())
            .filter(|&i| self.out_degree(i) == 0)
            .collect()
    }

    /// Visit every node reachable from `start` along outgoing edges.
    ///
    /// * `start` - node index to start from
    /// * `include_start` - visit `start` itself (unless it is only
    ///   reached again through a cycle)
    /// * `visitor` - called once per reachable node, depth-first
    pub fn traverse_downstream<F>(&self, start: usize, include_start: bool, mut visitor: F)
    where
        F: FnMut(usize, &Node),
    {
        let mut visited: HashSet<usize> = HashSet::default();
        let mut stack = vec![start];
        visited.insert(start);

        while let Some(i) = stack.pop() {
            if i != start || include_start {
                visitor(i, &self.nodes[i]);
            }
            for &j in self.outgoing[i].iter().rev() {
                if visited.insert(j) {
                    stack.push(j);
                }
            }
        }
    }

    /// The subgraph of everything reachable from `start`, including it
    pub fn downstream_subgraph(&self, start: usize) -> WeightedGraph {
        let mut members = vec![];
        self.traverse_downstream(start, true, |i, _| members.push(i));
        self.induced_subgraph(&members)
    }

    /// Keep `members` and every edge among them
    pub fn induced_subgraph(&self, members: &[usize]) -> WeightedGraph {
        let mut ret = WeightedGraph::new();
        let mut remap: HashMap<usize, usize> = HashMap::default();
        for &i in members {
            remap.insert(i, ret.add_node(self.nodes[i].clone()));
        }
        for edge in self.edges.iter() {
            if let (Some(&s), Some(&e)) = (remap.get(&edge.start), remap.get(&edge.end)) {
                for d in edge.descriptions.iter() {
                    ret.add_edge_by_index(s, e, d.clone());
                }
            }
        }
        ret
    }

    pub fn to_record(&self) -> GraphRecord {
        GraphRecord {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub fn from_record(record: GraphRecord) -> anyhow::Result<Self> {
        let mut ret = WeightedGraph::new();
        for node in record.nodes {
            ret.add_node(node);
        }
        let n = ret.count_nodes();
        for edge in record.edges {
            if edge.start >= n || edge.end >= n {
                return Err(anyhow::anyhow!(
                    "edge ({}, {}) refers to a missing node",
                    edge.start,
                    edge.end
                ));
            }
            for d in edge.descriptions {
                ret.add_edge_by_index(edge.start, edge.end, d);
            }
        }
        Ok(ret)
    }
}
