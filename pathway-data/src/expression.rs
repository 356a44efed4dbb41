use crate::common_io::read_lines_of_words_delim;
use crate::graph::WeightedGraph;
use fnv::FnvHashMap as HashMap;
use log::{info, warn};

/// Node identifier -> log-fold-change. Unobserved nodes read as 0.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionVector {
    values: HashMap<Box<str>, f64>,
}

impl ExpressionVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, value: f64) {
        self.values.insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> f64 {
        self.values.get(id).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_ref(), v))
    }

    /// Values aligned with the graph's node indices
    pub fn to_dense(&self, graph: &WeightedGraph) -> Vec<f64> {
        graph.nodes().iter().map(|n| self.get(&n.id)).collect()
    }

    /// Graph node indices with `|value| > threshold`
    pub fn differentially_expressed(&self, graph: &WeightedGraph, threshold: f64) -> Vec<usize> {
        differentially_expressed_nodes(&self.to_dense(graph), threshold)
    }
}

/// Indices of `dense` with `|value| > threshold`; NaN is never selected
pub fn differentially_expressed_nodes(dense: &[f64], threshold: f64) -> Vec<usize> {
    dense
        .iter()
        .enumerate()
        .filter(|(_, x)| x.abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Anything that can produce one expression vector
pub trait ExpressionSource {
    fn expression(&self) -> anyhow::Result<ExpressionVector>;
}

/// Parse a value; unparseable or non-finite tokens give `None`
fn parse_value(word: &str) -> Option<f64> {
    word.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

/// `id<TAB>value` lines
pub struct ExpressionFile {
    pub file: Box<str>,
}

impl ExpressionFile {
    pub fn new(file: &str) -> Self {
        Self { file: file.into() }
    }
}

impl ExpressionSource for ExpressionFile {
    fn expression(&self) -> anyhow::Result<ExpressionVector> {
        let out = read_lines_of_words_delim(&self.file, &['\t', ' ', ','], -1)?;
        let mut ret = ExpressionVector::new();
        let mut n_bad = 0;
        for words in out.lines.iter() {
            let words: Vec<&str> = words.iter().map(|w| w.as_ref()).filter(|w| !w.is_empty()).collect();
            if words.is_empty() {
                continue;
            }
            let value = match words.get(1).and_then(|w| parse_value(w)) {
                Some(x) => x,
                None => {
                    n_bad += 1;
                    0.0
                }
            };
            ret.insert(words[0], value);
        }
        if n_bad > 0 {
            warn!("{}: {} malformed values read as 0", self.file, n_bad);
        }
        info!("{} expression values from {}", ret.len(), self.file);
        Ok(ret)
    }
}

/// A node x sample table with a header row `id sample1 sample2 ...`
pub struct ExpressionMatrix {
    pub samples: Vec<Box<str>>,
    pub ids: Vec<Box<str>>,
    /// `values[sample][row]`
    pub values: Vec<Vec<f64>>,
}

impl ExpressionMatrix {
    pub fn from_file(file: &str) -> anyhow::Result<Self> {
        let out = read_lines_of_words_delim(file, "\t", 0)?;
        if out.header.len() < 2 {
            return Err(anyhow::anyhow!("{}: need an id column and samples", file));
        }
        let samples: Vec<Box<str>> = out.header[1..].to_vec();
        let mut ids = vec![];
        let mut values = vec![vec![]; samples.len()];
        let mut n_bad = 0;
        for words in out.lines.iter().filter(|w| !w[0].is_empty()) {
            ids.push(words[0].clone());
            for (s, column) in values.iter_mut().enumerate() {
                let x = match words.get(s + 1).and_then(|w| parse_value(w)) {
                    Some(x) => x,
                    None => {
                        n_bad += 1;
                        0.0
                    }
                };
                column.push(x);
            }
        }
        if n_bad > 0 {
            warn!("{}: {} malformed values read as 0", file, n_bad);
        }
        info!("{} x {} expression matrix from {}", ids.len(), samples.len(), file);
        Ok(Self {
            samples,
            ids,
            values,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn sample(&self, s: usize) -> ExpressionVector {
        let mut ret = ExpressionVector::new();
        for (id, &x) in self.ids.iter().zip(self.values[s].iter()) {
            ret.insert(id, x);
        }
        ret
    }

    /// Per-id rows (`ids[i]` -> values across samples)
    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.ids.len())
            .map(|i| self.values.iter().map(|col| col[i]).collect())
            .collect()
    }
}
