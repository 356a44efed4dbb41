//! Per-sample pathway scores through the batch pipeline

use crate::pipeline::RecordProcessor;
use crate::propagation::{PropagationContext, Propagator};

use pathway_data::ExpressionMatrix;
use std::sync::Arc;

/// One sample's expression, aligned with node indices
#[derive(Debug, Clone)]
pub struct BatchRecord {
    pub sample: Box<str>,
    pub expression: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct BatchScores {
    pub sample: Box<str>,
    pub pathways: Arc<[Box<str>]>,
    pub accumulator: Vec<f64>,
    pub total_perturbation: Vec<f64>,
}

/// One record per sample of `matrix`
pub fn batch_records<'a>(
    matrix: &'a ExpressionMatrix,
    ctx: &'a PropagationContext,
) -> impl Iterator<Item = BatchRecord> + 'a {
    (0..matrix.num_samples()).map(move |s| BatchRecord {
        sample: matrix.samples[s].clone(),
        expression: matrix.sample(s).to_dense(&ctx.graph),
    })
}

/// Worker state: shared context plus a private propagator
pub struct PathwayScorer {
    ctx: Arc<PropagationContext>,
    ids: Arc<[Box<str>]>,
    sets: Arc<Vec<Vec<usize>>>,
    prop: Propagator,
}

impl PathwayScorer {
    pub fn new(ctx: Arc<PropagationContext>, ids: Arc<[Box<str>]>, sets: Arc<Vec<Vec<usize>>>) -> Self {
        Self {
            ctx,
            ids,
            sets,
            prop: Propagator::new(),
        }
    }
}

impl RecordProcessor for PathwayScorer {
    type Input = BatchRecord;
    type Output = BatchScores;

    fn process(&mut self, record: BatchRecord) -> anyhow::Result<BatchScores> {
        let res = self.prop.run(&self.ctx, &record.expression)?;
        let graph = &self.ctx.graph;
        Ok(BatchScores {
            sample: record.sample,
            pathways: self.ids.clone(),
            accumulator: self.sets.iter().map(|s| res.accumulator(graph, s)).collect(),
            total_perturbation: self
                .sets
                .iter()
                .map(|s| res.total_perturbation(graph, s))
                .collect(),
        })
    }
}
