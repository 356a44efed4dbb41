//! Pathway graphs and their inputs
//!
//! This library provides:
//! - runtime-extensible node/edge type registries
//! - a directed, weighted multigraph of pathway entities
//! - pseudo-topological ordering for graphs with cycles
//! - edge weight policies
//! - pathway repositories with virtual pathways
//! - expression vectors and matrices

pub mod common_io; // gz-aware line readers and writers
pub mod expression;
pub mod graph;
pub mod repository;
pub mod topological;
pub mod types;
pub mod weights;

pub use expression::{
    differentially_expressed_nodes, ExpressionFile, ExpressionMatrix, ExpressionSource,
    ExpressionVector,
};
pub use graph::{Edge, EdgeDescription, GraphRecord, Node, WeightedGraph};
pub use repository::{GraphSource, Pathway, PathwayRepository, VirtualPathway};
pub use topological::topological_order;
pub use types::{EdgeSubType, EdgeType, NodeType, TypeRegistry};
pub use weights::{EdgeWeightPolicy, EdgeWeights};
