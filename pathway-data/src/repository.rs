//! Pathway repositories: a merged meta-pathway graph, the pathways it
//! was built from, and named virtual pathways.

use crate::common_io::read_lines_of_words_delim;
use crate::graph::{EdgeDescription, Node, WeightedGraph};
use crate::types::TypeRegistry;
use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use log::{info, warn};

/// A source pathway inside the merged graph
#[derive(Debug, Clone)]
pub struct Pathway {
    pub id: Box<str>,
    pub name: Box<str>,
    /// node indices in the merged graph
    pub nodes: Vec<usize>,
    /// `(start, end)` node index pairs in the merged graph
    pub edges: Vec<(usize, usize)>,
}

/// A named node subset that is not a single source pathway
#[derive(Debug, Clone)]
pub struct VirtualPathway {
    pub id: Box<str>,
    pub name: Box<str>,
    pub nodes: Vec<usize>,
}

/// Access to a graph and its pathway partitioning
pub trait GraphSource {
    fn graph(&self) -> &WeightedGraph;

    fn pathway_by_id(&self, id: &str) -> Option<&Pathway>;

    fn nodes_of_virtual_pathway(&self, id: &str) -> Option<&[usize]>;

    fn has_virtual_pathway(&self, id: &str) -> bool {
        self.nodes_of_virtual_pathway(id).is_some()
    }

    fn pathways(&self) -> Box<dyn Iterator<Item = &Pathway> + '_>;

    fn virtual_pathways(&self) -> Box<dyn Iterator<Item = &VirtualPathway> + '_>;
}

/// In-memory repository
#[derive(Debug, Clone, Default)]
pub struct PathwayRepository {
    graph: WeightedGraph,
    pathways: Vec<Pathway>,
    pathway_index: HashMap<Box<str>, usize>,
    virtual_pathways: Vec<VirtualPathway>,
    virtual_index: HashMap<Box<str>, usize>,
}

impl GraphSource for PathwayRepository {
    fn graph(&self) -> &WeightedGraph {
        &self.graph
    }

    fn pathway_by_id(&self, id: &str) -> Option<&Pathway> {
        self.pathway_index.get(id).map(|&k| &self.pathways[k])
    }

    fn nodes_of_virtual_pathway(&self, id: &str) -> Option<&[usize]> {
        self.virtual_index
            .get(id)
            .map(|&k| self.virtual_pathways[k].nodes.as_slice())
    }

    fn pathways(&self) -> Box<dyn Iterator<Item = &Pathway> + '_> {
        Box::new(self.pathways.iter())
    }

    fn virtual_pathways(&self) -> Box<dyn Iterator<Item = &VirtualPathway> + '_> {
        Box::new(self.virtual_pathways.iter())
    }
}

/// One row of an edge table
pub struct EdgeRecord<'a> {
    pub pathway_id: &'a str,
    pub pathway_name: &'a str,
    pub source: &'a str,
    pub target: &'a str,
    pub edge_type: &'a str,
    pub subtypes: &'a [&'a str],
}

impl PathwayRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_pathways(&self) -> usize {
        self.pathways.len()
    }

    pub fn num_virtual_pathways(&self) -> usize {
        self.virtual_pathways.len()
    }

    /// Register a node in the merged graph
    pub fn add_node(&mut self, node: Node) -> usize {
        self.graph.add_node(node)
    }

    fn pathway_mut(&mut self, id: &str, name: &str) -> &mut Pathway {
        let k = match self.pathway_index.get(id) {
            Some(&k) => k,
            None => {
                let k = self.pathways.len();
                self.pathways.push(Pathway {
                    id: id.into(),
                    name: name.into(),
                    nodes: vec![],
                    edges: vec![],
                });
                self.pathway_index.insert(id.into(), k);
                k
            }
        };
        &mut self.pathways[k]
    }

    /// Add one interaction of a pathway. Endpoints unknown to the graph
    /// are created with the default node type.
    pub fn add_interaction(&mut self, rec: &EdgeRecord, types: &TypeRegistry) -> anyhow::Result<()> {
        let mut ends = [0usize; 2];
        for (k, id) in [rec.source, rec.target].iter().enumerate() {
            ends[k] = match self.graph.index_of(id) {
                Some(i) => i,
                None => self
                    .graph
                    .add_node(Node::new(id, id, types.node_types.get("GENE"))),
            };
        }
        let [s, e] = ends;

        let edge_type = types.edge_types.get(rec.edge_type);
        let pathway: Box<str> = rec.pathway_id.into();
        let subtypes: &[&str] = if rec.subtypes.is_empty() {
            &[crate::types::UNKNOWN_EDGE_SUBTYPE]
        } else {
            rec.subtypes
        };
        for sub in subtypes {
            if !types.edge_subtypes.contains(sub) {
                warn!("unknown edge subtype `{}`; using UNKNOWN", sub);
            }
            self.graph.add_edge_by_index(
                s,
                e,
                EdgeDescription {
                    edge_type: edge_type.clone(),
                    subtype: types.edge_subtypes.get(sub),
                    pathway: Some(pathway.clone()),
                },
            );
        }

        let pw = self.pathway_mut(rec.pathway_id, rec.pathway_name);
        for i in [s, e] {
            if !pw.nodes.contains(&i) {
                pw.nodes.push(i);
            }
        }
        if !pw.edges.contains(&(s, e)) {
            pw.edges.push((s, e));
        }
        Ok(())
    }

    /// Add a virtual pathway; unknown members are skipped
    pub fn add_virtual_pathway(&mut self, id: &str, name: &str, members: &[&str]) -> usize {
        let mut seen: HashSet<usize> = HashSet::default();
        let mut nodes = vec![];
        let mut n_missing = 0;
        for m in members {
            match self.graph.index_of(m) {
                Some(i) => {
                    if seen.insert(i) {
                        nodes.push(i);
                    }
                }
                None => n_missing += 1,
            }
        }
        if n_missing > 0 {
            warn!(
                "virtual pathway {}: {} of {} members not in the graph",
                id,
                n_missing,
                members.len()
            );
        }
        let vp = VirtualPathway {
            id: id.into(),
            name: name.into(),
            nodes,
        };
        let k = match self.virtual_index.get(id) {
            Some(&k) => {
                self.virtual_pathways[k] = vp;
                k
            }
            None => {
                self.virtual_pathways.push(vp);
                self.virtual_pathways.len() - 1
            }
        };
        self.virtual_index.insert(id.into(), k);
        k
    }

    /// Subgraph of one source pathway
    pub fn pathway_graph(&self, id: &str) -> Option<WeightedGraph> {
        let pw = self.pathway_by_id(id)?;
        Some(self.graph.induced_subgraph(&pw.nodes))
    }

    ///
    /// Read a repository from tab-separated tables
    ///
    /// * `edge_file` - `pathway_id pathway_name source target edge_type subtypes`
    ///   where `subtypes` is a comma-separated list
    /// * `node_file` - optional `id name type` rows
    /// * `virtual_file` - optional `id name member,member,...` rows
    ///
    pub fn from_files(
        edge_file: &str,
        node_file: Option<&str>,
        virtual_file: Option<&str>,
        types: &TypeRegistry,
    ) -> anyhow::Result<Self> {
        let mut repo = Self::new();

        if let Some(node_file) = node_file {
            let out = read_lines_of_words_delim(node_file, "\t", -1)?;
            let mut n_other = 0;
            for words in out.lines.iter().filter(|w| !w[0].is_empty()) {
                let name = words.get(1).map(|x| x.as_ref()).unwrap_or(words[0].as_ref());
                let type_name = words.get(2).map(|x| x.as_ref()).unwrap_or("GENE");
                if !types.node_types.contains(type_name) {
                    n_other += 1;
                }
                repo.add_node(Node::new(&words[0], name, types.node_types.get(type_name)));
            }
            if n_other > 0 {
                warn!("{} nodes with unknown types were set to OTHER", n_other);
            }
        }

        let out = read_lines_of_words_delim(edge_file, "\t", -1)?;
        for (i, words) in out.lines.iter().enumerate() {
            if words.len() == 1 && words[0].is_empty() {
                continue;
            }
            if words.len() < 5 {
                return Err(anyhow::anyhow!(
                    "{}: line {} has {} columns; expected at least 5",
                    edge_file,
                    i + 1,
                    words.len()
                ));
            }
            let subtypes: Vec<&str> = words
                .get(5)
                .map(|s| s.split(',').map(|x| x.trim()).filter(|x| !x.is_empty()).collect())
                .unwrap_or_default();
            repo.add_interaction(
                &EdgeRecord {
                    pathway_id: &words[0],
                    pathway_name: &words[1],
                    source: &words[2],
                    target: &words[3],
                    edge_type: &words[4],
                    subtypes: &subtypes,
                },
                types,
            )?;
        }

        if let Some(virtual_file) = virtual_file {
            let out = read_lines_of_words_delim(virtual_file, "\t", -1)?;
            for words in out.lines.iter().filter(|w| w.len() >= 3) {
                let members: Vec<&str> = words[2].split(',').map(|x| x.trim()).collect();
                repo.add_virtual_pathway(&words[0], &words[1], &members);
            }
        }

        info!(
            "repository: {} nodes, {} edges, {} pathways, {} virtual pathways",
            repo.graph.count_nodes(),
            repo.graph.count_edges(),
            repo.num_pathways(),
            repo.num_virtual_pathways()
        );
        Ok(repo)
    }
}
