//! Runtime-extensible registries of node types, edge types, and edge
//! subtypes.
//!
//! Pathway repositories describe nodes and relations with free-form
//! type names. Each registry maps a name to a small value record and
//! falls back to a documented default entry (`OTHER` or `UNKNOWN`) for
//! names it has never seen.

use crate::common_io::read_lines_of_words_delim;
use fnv::FnvHashMap as HashMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const OTHER_NODE_TYPE: &str = "OTHER";
pub const OTHER_EDGE_TYPE: &str = "OTHER";
pub const UNKNOWN_EDGE_SUBTYPE: &str = "UNKNOWN";

/// A node category with the sign used to combine perturbations into
/// pathway accumulators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    pub name: Box<str>,
    pub sign: f64,
}

/// A relation category (e.g., `PPREL`, `GEREL`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeType {
    pub name: Box<str>,
}

/// A relation subtype carrying the static weight of an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSubType {
    pub name: Box<str>,
    pub weight: f64,
    pub priority: i32,
    pub symbol: Box<str>,
}

fn normalize(name: &str) -> Box<str> {
    name.trim().to_ascii_uppercase().replace([' ', '-', '/'], "_").into_boxed_str()
}

/// Parse a resource file into rows of words, skipping blank lines
fn resource_rows(file: &str, min_cols: usize) -> anyhow::Result<Vec<Vec<Box<str>>>> {
    let out = read_lines_of_words_delim(file, "\t", -1)?;
    let mut rows = vec![];
    for (i, words) in out.lines.into_iter().enumerate() {
        if words.iter().all(|w| w.trim().is_empty()) {
            continue;
        }
        if words.len() < min_cols {
            return Err(anyhow::anyhow!(
                "{}: line {} needs {} columns, found {}",
                file,
                i + 1,
                min_cols,
                words.len()
            ));
        }
        rows.push(words);
    }
    Ok(rows)
}

fn parse_number<T: std::str::FromStr>(file: &str, word: &str) -> anyhow::Result<T> {
    word.trim()
        .parse::<T>()
        .map_err(|_| anyhow::anyhow!("{}: failed to parse `{}`", file, word))
}

///////////////////////
// node type lookups //
///////////////////////

#[derive(Debug, Clone)]
pub struct NodeTypeRegistry {
    types: HashMap<Box<str>, NodeType>,
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        let mut ret = Self {
            types: HashMap::default(),
        };
        for (name, sign) in [
            ("GENE", 1.0),
            ("MIRNA", 1.0),
            ("COMPOUND", 0.0),
            ("MAP", 0.0),
            (OTHER_NODE_TYPE, 0.0),
        ] {
            ret.add(name, sign);
        }
        ret
    }
}

impl NodeTypeRegistry {
    pub fn add(&mut self, name: &str, sign: f64) -> NodeType {
        let name = normalize(name);
        let ty = NodeType {
            name: name.clone(),
            sign,
        };
        self.types.insert(name, ty.clone());
        ty
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(&normalize(name))
    }

    /// Look up a node type, falling back to `OTHER`
    pub fn get(&self, name: &str) -> NodeType {
        match self.types.get(&normalize(name)) {
            Some(ty) => ty.clone(),
            None => self.other(),
        }
    }

    pub fn other(&self) -> NodeType {
        self.types
            .get(OTHER_NODE_TYPE)
            .cloned()
            .unwrap_or(NodeType {
                name: OTHER_NODE_TYPE.into(),
                sign: 0.0,
            })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Add entries from `NAME<TAB>sign` lines
    pub fn extend_from_file(&mut self, file: &str) -> anyhow::Result<()> {
        let rows = resource_rows(file, 2)?;
        for words in rows.iter() {
            let sign = parse_number::<f64>(file, &words[1])?;
            self.add(&words[0], sign);
        }
        info!("{} node types after reading {}", self.len(), file);
        Ok(())
    }

    pub fn from_file(file: &str) -> anyhow::Result<Self> {
        let mut ret = Self::default();
        ret.extend_from_file(file)?;
        Ok(ret)
    }
}

///////////////////////
// edge type lookups //
///////////////////////

#[derive(Debug, Clone)]
pub struct EdgeTypeRegistry {
    types: HashMap<Box<str>, EdgeType>,
}

impl Default for EdgeTypeRegistry {
    fn default() -> Self {
        let mut ret = Self {
            types: HashMap::default(),
        };
        for name in [
            "ECREL",
            "PPREL",
            "GEREL",
            "PCREL",
            "MAPLINK",
            "MGREL",
            "TFREL",
            OTHER_EDGE_TYPE,
        ] {
            ret.add(name);
        }
        ret
    }
}

impl EdgeTypeRegistry {
    pub fn add(&mut self, name: &str) -> EdgeType {
        let name = normalize(name);
        let ty = EdgeType { name: name.clone() };
        self.types.insert(name, ty.clone());
        ty
    }

    /// Look up an edge type, falling back to `OTHER`
    pub fn get(&self, name: &str) -> EdgeType {
        match self.types.get(&normalize(name)) {
            Some(ty) => ty.clone(),
            None => EdgeType {
                name: OTHER_EDGE_TYPE.into(),
            },
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(&normalize(name))
    }
}

//////////////////////////
// edge subtype lookups //
//////////////////////////

#[derive(Debug, Clone)]
pub struct EdgeSubTypeRegistry {
    subtypes: HashMap<Box<str>, EdgeSubType>,
}

impl Default for EdgeSubTypeRegistry {
    fn default() -> Self {
        let mut ret = Self {
            subtypes: HashMap::default(),
        };
        // signed interactions outrank descriptive ones
        for (name, weight, priority, symbol) in [
            ("ACTIVATION", 1.0, 1, "-->"),
            ("INHIBITION", -1.0, 1, "--|"),
            ("EXPRESSION", 1.0, 1, "->"),
            ("REPRESSION", -1.0, 1, "-|"),
            ("INDIRECT_EFFECT", 0.0, 0, "..>"),
            ("STATE_CHANGE", 0.0, 0, "..."),
            ("BINDING_ASSOCIATION", 0.0, 0, "---"),
            ("DISSOCIATION", 0.0, 0, "-+-"),
            ("MISSING_INTERACTION", 0.0, 0, "-/-"),
            ("PHOSPHORYLATION", 0.0, 0, "+p"),
            ("DEPHOSPHORYLATION", 0.0, 0, "-p"),
            ("GLYCOSYLATION", 0.0, 0, "+g"),
            ("UBIQUITINATION", 0.0, 0, "+u"),
            ("METHYLATION", 0.0, 0, "+m"),
            ("COMPOUND", 0.0, 0, "c"),
            ("HIDDEN_COMPOUND", 0.0, 0, "hc"),
            ("MIRNA_INHIBITION", -1.0, 1, "~|"),
            ("TFMIRNA_ACTIVATION", 1.0, 1, "~>"),
            ("TFMIRNA_INHIBITION", -1.0, 1, "~|"),
            (UNKNOWN_EDGE_SUBTYPE, 0.0, 0, "?"),
        ] {
            ret.add(name, weight, priority, symbol);
        }
        ret
    }
}

impl EdgeSubTypeRegistry {
    pub fn add(&mut self, name: &str, weight: f64, priority: i32, symbol: &str) -> EdgeSubType {
        let name = normalize(name);
        let sub = EdgeSubType {
            name: name.clone(),
            weight: if weight.is_finite() { weight } else { 0.0 },
            priority,
            symbol: symbol.into(),
        };
        self.subtypes.insert(name, sub.clone());
        sub
    }

    pub fn contains(&self, name: &str) -> bool {
        self.subtypes.contains_key(&normalize(name))
    }

    /// Look up an edge subtype, falling back to `UNKNOWN`
    pub fn get(&self, name: &str) -> EdgeSubType {
        match self.subtypes.get(&normalize(name)) {
            Some(sub) => sub.clone(),
            None => self.unknown(),
        }
    }

    pub fn unknown(&self) -> EdgeSubType {
        self.subtypes
            .get(UNKNOWN_EDGE_SUBTYPE)
            .cloned()
            .unwrap_or(EdgeSubType {
                name: UNKNOWN_EDGE_SUBTYPE.into(),
                weight: 0.0,
                priority: 0,
                symbol: "?".into(),
            })
    }

    /// The largest priority of all registered subtypes
    pub fn max_priority(&self) -> i32 {
        self.subtypes
            .values()
            .map(|s| s.priority)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.subtypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtypes.is_empty()
    }

    /// Add entries from `NAME<TAB>weight<TAB>priority<TAB>symbol` lines
    pub fn extend_from_file(&mut self, file: &str) -> anyhow::Result<()> {
        let rows = resource_rows(file, 3)?;
        for words in rows.iter() {
            let weight = parse_number::<f64>(file, &words[1])?;
            let priority = parse_number::<i32>(file, &words[2])?;
            let symbol = words.get(3).map(|s| s.as_ref()).unwrap_or("");
            if !weight.is_finite() {
                warn!("{}: non-finite weight for {}, using 0", file, words[0]);
            }
            self.add(&words[0], weight, priority, symbol);
        }
        info!("{} edge subtypes after reading {}", self.len(), file);
        Ok(())
    }

    pub fn from_file(file: &str) -> anyhow::Result<Self> {
        let mut ret = Self::default();
        ret.extend_from_file(file)?;
        Ok(ret)
    }
}

/// All three registries used while building a repository
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    pub node_types: NodeTypeRegistry,
    pub edge_types: EdgeTypeRegistry,
    pub edge_subtypes: EdgeSubTypeRegistry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_fall_back() {
        let reg = TypeRegistry::default();
        assert_eq!(reg.node_types.get("enzyme").name.as_ref(), OTHER_NODE_TYPE);
        assert_eq!(reg.edge_types.get("weird").name.as_ref(), OTHER_EDGE_TYPE);
        assert_eq!(
            reg.edge_subtypes.get("teleportation").name.as_ref(),
            UNKNOWN_EDGE_SUBTYPE
        );
    }

    #[test]
    fn names_are_normalized() {
        let reg = EdgeSubTypeRegistry::default();
        assert_eq!(
            reg.get("binding/association").name.as_ref(),
            "BINDING_ASSOCIATION"
        );
        assert_eq!(reg.get("indirect effect").name.as_ref(), "INDIRECT_EFFECT");
        assert_eq!(reg.get("activation").weight, 1.0);
        assert_eq!(reg.get("Inhibition").weight, -1.0);
    }

    #[test]
    fn runtime_additions() {
        let mut reg = NodeTypeRegistry::default();
        assert!(!reg.contains("lncRNA"));
        reg.add("lncRNA", -1.0);
        assert_eq!(reg.get("LNCRNA").sign, -1.0);

        let mut sub = EdgeSubTypeRegistry::default();
        sub.add("super_activation", f64::INFINITY, 2, "==>");
        assert_eq!(sub.get("SUPER_ACTIVATION").weight, 0.0);
        assert_eq!(sub.max_priority(), 2);
    }
}
