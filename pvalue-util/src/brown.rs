//! Empirical Brown's method (Poole et al. 2016).
//!
//! Fisher's statistic assumes independent tests. Brown's method rescales
//! it with the covariance of `-2 ln F(x)`, where `F` is each variable's
//! empirical CDF over a reference data matrix.

use crate::combiners::{prepare, Admissible, Prepared};
use fnv::FnvHashMap as HashMap;
use nalgebra::DMatrix;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Reference data for Brown's covariance correction, owned by the
/// caller and passed into each combination.
#[derive(Debug, Clone)]
pub struct BrownContext {
    index: HashMap<Box<str>, usize>,
    /// transformed rows, centred
    centred: DMatrix<f64>,
    nsamples: usize,
}

/// `-2 ln ECDF(x)` of one row
fn transform_row(row: &[f64]) -> Vec<f64> {
    let n = row.len() as f64;
    let mut sorted = row.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    row.iter()
        .map(|x| {
            let rank = sorted.partition_point(|y| y <= x) as f64;
            -2.0 * (rank / n).ln()
        })
        .collect()
}

impl BrownContext {
    ///
    /// * `ids` - one identifier per row
    /// * `data` - variables x samples
    ///
    pub fn new(ids: Vec<Box<str>>, data: &DMatrix<f64>) -> anyhow::Result<Self> {
        if ids.len() != data.nrows() {
            return Err(anyhow::anyhow!(
                "{} ids for {} rows",
                ids.len(),
                data.nrows()
            ));
        }
        let nsamples = data.ncols();
        if nsamples < 2 {
            return Err(anyhow::anyhow!("need at least two samples"));
        }

        let mut centred = DMatrix::<f64>::zeros(data.nrows(), nsamples);
        for i in 0..data.nrows() {
            let row: Vec<f64> = data.row(i).iter().copied().collect();
            let w = transform_row(&row);
            let mu = w.iter().sum::<f64>() / nsamples as f64;
            for (j, x) in w.into_iter().enumerate() {
                centred[(i, j)] = x - mu;
            }
        }

        let index = ids.into_iter().enumerate().map(|(i, id)| (id, i)).collect();
        Ok(Self {
            index,
            centred,
            nsamples,
        })
    }

    /// Build from per-variable rows of equal length
    pub fn from_rows(ids: Vec<Box<str>>, rows: &[Vec<f64>]) -> anyhow::Result<Self> {
        let ncol = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != ncol) {
            return Err(anyhow::anyhow!("rows of different lengths"));
        }
        let data = DMatrix::from_fn(rows.len(), ncol, |i, j| rows[i][j]);
        Self::new(ids, &data)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Sample covariance of two transformed variables
    fn covariance(&self, i: usize, j: usize) -> f64 {
        self.centred.row(i).dot(&self.centred.row(j)) / (self.nsamples - 1) as f64
    }
}

///
/// Combine p-values with the empirical Brown's method
///
/// * `pvalues` - p-values to combine
/// * `filter` - identifier of each p-value's variable in `context`;
///   variables missing from the context are treated as independent
/// * `context` - reference data
///
pub fn empirical_brown(
    pvalues: &[f64],
    filter: &[&str],
    context: &BrownContext,
) -> anyhow::Result<f64> {
    if pvalues.len() != filter.len() {
        return Err(anyhow::anyhow!(
            "{} p-values but {} identifiers",
            pvalues.len(),
            filter.len()
        ));
    }

    if let Prepared::Done(p) = prepare(pvalues, Admissible::LeftOpen) {
        return Ok(p);
    }

    let (pv, rows): (Vec<f64>, Vec<Option<usize>>) = pvalues
        .iter()
        .zip(filter.iter())
        .filter(|(p, _)| **p > 0.0 && **p <= 1.0)
        .map(|(&p, id)| (p, context.index.get(*id).copied()))
        .unzip();

    let m = pv.len() as f64;
    let df_fisher = 2.0 * m;
    let expected = 2.0 * m;

    let mut cov_sum = 0.0;
    for a in 0..rows.len() {
        for b in (a + 1)..rows.len() {
            if let (Some(i), Some(j)) = (rows[a], rows[b]) {
                cov_sum += context.covariance(i, j);
            }
        }
    }

    let var = 4.0 * m + 2.0 * cov_sum;
    let (mut c, mut df) = if var > 0.0 {
        (var / (2.0 * expected), 2.0 * expected * expected / var)
    } else {
        (1.0, df_fisher)
    };
    if df > df_fisher {
        df = df_fisher;
        c = 1.0;
    }

    let x = 2.0 * pv.iter().map(|p| -p.ln()).sum::<f64>();
    let chisq = ChiSquared::new(df)?;
    Ok(chisq.sf(x / c).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combiners::fisher;
    use approx::assert_abs_diff_eq;

    fn ids(names: &[&str]) -> Vec<Box<str>> {
        names.iter().map(|&x| x.into()).collect()
    }

    #[test]
    fn ecdf_transform() {
        let w = transform_row(&[3.0, 1.0, 2.0, 2.0]);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1], -2.0 * 0.25f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(w[2], -2.0 * 0.75f64.ln(), epsilon = 1e-12);
        assert_eq!(w[2], w[3]);
    }

    #[test]
    fn single_and_empty() -> anyhow::Result<()> {
        let ctx = BrownContext::from_rows(ids(&["a", "b"]), &[vec![1., 2., 3.], vec![3., 1., 2.]])?;
        assert_eq!(empirical_brown(&[0.042], &["a"], &ctx)?, 0.042);
        assert_eq!(empirical_brown(&[], &[], &ctx)?, 1.0);
        assert_eq!(empirical_brown(&[0.0, 0.3], &["a", "b"], &ctx)?, 0.3);
        assert!(empirical_brown(&[0.1], &[], &ctx).is_err());
        Ok(())
    }

    #[test]
    fn unknown_ids_reduce_to_fisher() -> anyhow::Result<()> {
        let ctx = BrownContext::from_rows(ids(&["a"]), &[vec![1., 2., 3., 4.]])?;
        let p = [0.01, 0.2, 0.5];
        let brown = empirical_brown(&p, &["x", "y", "z"], &ctx)?;
        assert_abs_diff_eq!(brown, fisher(&p), epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn correlated_tests_are_less_significant() -> anyhow::Result<()> {
        let base: Vec<f64> = (0..50).map(|i| ((i * 37) % 50) as f64).collect();
        let near: Vec<f64> = base.iter().map(|x| x + 0.1).collect();
        let ctx = BrownContext::from_rows(ids(&["a", "b"]), &[base, near])?;
        let p = [0.01, 0.02];
        let brown = empirical_brown(&p, &["a", "b"], &ctx)?;
        assert!(brown > fisher(&p));
        assert!(brown < 1.0);
        Ok(())
    }
}
