use crate::graph::{Edge, EdgeDescription, WeightedGraph};
use fnv::FnvHashMap as HashMap;
use log::warn;

/// How a single edge description turns into a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeWeightPolicy {
    /// static weight of the subtype
    #[default]
    Default,
    /// only the sign of the static weight
    Sign,
    /// static weight scaled by `priority / max_priority`
    Priority { max_priority: i32 },
}

impl EdgeWeightPolicy {
    /// Select a policy by name, falling back to `default`
    pub fn from_name(name: &str, max_priority: i32) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "default" | "static" => Self::Default,
            "sign" | "signum" => Self::Sign,
            "priority" => Self::Priority { max_priority },
            _ => {
                warn!("unknown edge weight policy `{}`, using `default`", name);
                Self::Default
            }
        }
    }

    pub fn description_weight(&self, _edge: &Edge, desc: &EdgeDescription) -> f64 {
        let w = desc.subtype.weight;
        match self {
            Self::Default => w,
            Self::Sign => {
                if w > 0.0 {
                    1.0
                } else if w < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Self::Priority { max_priority } => {
                if *max_priority > 0 {
                    w * (desc.subtype.priority as f64) / (*max_priority as f64)
                } else {
                    w
                }
            }
        }
    }
}

/// Read-only weights of a graph under one policy.
///
/// Built once and shared by every propagation worker.
#[derive(Debug, Clone)]
pub struct EdgeWeights {
    weight: HashMap<(usize, usize), f64>,
    total_abs_out: Vec<f64>,
}

impl EdgeWeights {
    pub fn new(graph: &WeightedGraph, policy: &EdgeWeightPolicy) -> Self {
        let mut weight = HashMap::default();
        let mut total_abs_out = vec![0.0; graph.count_nodes()];
        for edge in graph.edges() {
            let w = edge.compute_weight(policy);
            weight.insert((edge.start, edge.end), w);
            total_abs_out[edge.start] += w.abs();
        }
        Self {
            weight,
            total_abs_out,
        }
    }

    /// Weight of `start -> end` (0 if absent)
    pub fn weight(&self, start: usize, end: usize) -> f64 {
        self.weight.get(&(start, end)).copied().unwrap_or(0.0)
    }

    /// Sum of absolute outgoing weights of a node
    pub fn total_abs_outgoing(&self, node: usize) -> f64 {
        self.total_abs_out[node]
    }

    pub fn num_nodes(&self) -> usize {
        self.total_abs_out.len()
    }
}
