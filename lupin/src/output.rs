//! Tab-separated result writers

use crate::batch::BatchScores;
use crate::pathway_stats::{NodeResult, PathwayResult};
use crate::pipeline::OutputSink;
use crate::simulation::SimulationResult;

use pathway_data::common_io::{open_text_writer, write_lines, TextWriter};
use pathway_data::WeightedGraph;
use std::io::Write;
use std::marker::PhantomData;

/// A result that renders as one or more TSV lines
pub trait ToTsv {
    fn tsv_header() -> Vec<&'static str>;

    fn tsv_lines(&self) -> Vec<String>;
}

fn fmt_p(p: f64) -> String {
    format!("{:.6e}", p)
}

impl ToTsv for NodeResult {
    fn tsv_header() -> Vec<&'static str> {
        vec!["id", "name", "expression", "perturbation", "accumulator", "pvalue", "adjusted_pvalue"]
    }

    fn tsv_lines(&self) -> Vec<String> {
        vec![format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            self.name,
            self.expression,
            self.perturbation,
            self.accumulator,
            fmt_p(self.pvalue),
            fmt_p(self.adjusted_pvalue)
        )]
    }
}

impl ToTsv for PathwayResult {
    fn tsv_header() -> Vec<&'static str> {
        vec![
            "id",
            "name",
            "virtual",
            "n_nodes",
            "n_de",
            "accumulator",
            "total_perturbation",
            "impact_factor",
            "p_ora",
            "p_boot",
            "p_combined",
            "p_adjusted",
            "p_brown",
        ]
    }

    fn tsv_lines(&self) -> Vec<String> {
        let brown = self.p_brown.map(fmt_p).unwrap_or_else(|| "NA".into());
        vec![format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            self.name,
            self.is_virtual,
            self.n_nodes,
            self.n_de,
            self.accumulator,
            self.total_perturbation,
            self.impact_factor,
            fmt_p(self.p_ora),
            fmt_p(self.p_boot),
            fmt_p(self.p_combined),
            fmt_p(self.p_adjusted),
            brown
        )]
    }
}

impl ToTsv for SimulationResult {
    fn tsv_header() -> Vec<&'static str> {
        vec![
            "id",
            "name",
            "entity",
            "activated",
            "inhibited",
            "unaffected",
            "activity",
            "pvalue",
            "adjusted_pvalue",
        ]
    }

    fn tsv_lines(&self) -> Vec<String> {
        vec![format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            self.name,
            self.entity,
            self.activated,
            self.inhibited,
            self.unaffected,
            self.activity,
            fmt_p(self.pvalue),
            fmt_p(self.adjusted_pvalue)
        )]
    }
}

/// One line per sample and pathway
impl ToTsv for BatchScores {
    fn tsv_header() -> Vec<&'static str> {
        vec!["sample", "pathway", "accumulator", "total_perturbation"]
    }

    fn tsv_lines(&self) -> Vec<String> {
        self.pathways
            .iter()
            .zip(self.accumulator.iter().zip(self.total_perturbation.iter()))
            .map(|(id, (acc, tot))| format!("{}\t{}\t{}\t{}", self.sample, id, acc, tot))
            .collect()
    }
}

/// Write a header and all rows
pub fn write_tsv<T: ToTsv>(rows: &[T], file: &str) -> anyhow::Result<()> {
    let mut lines = vec![T::tsv_header().join("\t")];
    for r in rows {
        lines.extend(r.tsv_lines());
    }
    write_lines(&lines, file)
}

/// Streaming writer for the batch pipeline
pub struct TsvSink<T> {
    writer: TextWriter,
    _row: PhantomData<fn(T)>,
}

impl<T: ToTsv> TsvSink<T> {
    pub fn new(file: &str) -> anyhow::Result<Self> {
        let mut writer = open_text_writer(file)?;
        writeln!(writer, "{}", T::tsv_header().join("\t"))?;
        Ok(Self {
            writer,
            _row: PhantomData,
        })
    }
}

impl<T: ToTsv + Send> OutputSink<T> for TsvSink<T> {
    fn write(&mut self, record: T) -> anyhow::Result<()> {
        for line in record.tsv_lines() {
            writeln!(self.writer, "{}", line)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.writer.finish()?;
        Ok(())
    }
}

/// `source target weight subtypes` lines of every edge
pub fn write_edge_list(graph: &WeightedGraph, policy: &pathway_data::EdgeWeightPolicy, file: &str) -> anyhow::Result<()> {
    let mut lines = vec!["source\ttarget\tweight\tsubtypes".to_string()];
    for e in graph.edges() {
        let subtypes: Vec<&str> = e.descriptions.iter().map(|d| d.subtype.name.as_ref()).collect();
        lines.push(format!(
            "{}\t{}\t{}\t{}",
            graph.node(e.start).id,
            graph.node(e.end).id,
            e.compute_weight(policy),
            subtypes.join(",")
        ));
    }
    write_lines(&lines, file)
}
