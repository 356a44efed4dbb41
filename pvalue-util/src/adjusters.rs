//! Multiple-testing adjustment.
//!
//! Each method maps `n` p-values to `n` adjusted values in `[0, 1]`,
//! in the input order. Non-finite entries are passed through and do not
//! count towards `n`.

use log::warn;

/// Selectable adjustment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adjuster {
    None,
    Bonferroni,
    Holm,
    Hochberg,
    /// Benjamini-Hochberg
    #[default]
    BH,
    /// Benjamini-Yekutieli
    BY,
}

impl Adjuster {
    /// Select by name; unknown names fall back to BH
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "none" => Adjuster::None,
            "bonferroni" => Adjuster::Bonferroni,
            "holm" => Adjuster::Holm,
            "hochberg" => Adjuster::Hochberg,
            "bh" | "fdr" | "benjamini-hochberg" => Adjuster::BH,
            "by" | "benjamini-yekutieli" => Adjuster::BY,
            _ => {
                warn!("unknown adjuster `{}`, using BH", name);
                Adjuster::BH
            }
        }
    }

    pub fn adjust(&self, pvalues: &[f64]) -> Vec<f64> {
        match self {
            Adjuster::None => pvalues.to_vec(),
            Adjuster::Bonferroni => bonferroni(pvalues),
            Adjuster::Holm => holm(pvalues),
            Adjuster::Hochberg => hochberg(pvalues),
            Adjuster::BH => benjamini_hochberg(pvalues),
            Adjuster::BY => benjamini_yekutieli(pvalues),
        }
    }
}

/// Indices of finite entries, sorted by p-value
fn finite_order(pvalues: &[f64], descending: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pvalues.len())
        .filter(|&i| pvalues[i].is_finite())
        .collect();
    if descending {
        order.sort_by(|&a, &b| pvalues[b].total_cmp(&pvalues[a]));
    } else {
        order.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));
    }
    order
}

/// Walk `order`, scale each p-value by `factor(rank)`, and keep the
/// running max (step-down) or min (step-up)
fn stepwise<F>(pvalues: &[f64], descending: bool, factor: F) -> Vec<f64>
where
    F: Fn(usize, usize) -> f64,
{
    let mut ret = pvalues.to_vec();
    let order = finite_order(pvalues, descending);
    let n = order.len();
    if n <= 1 {
        return ret;
    }
    let mut running = if descending { f64::INFINITY } else { 0.0 };
    for (rank, &i) in order.iter().enumerate() {
        let q = (pvalues[i] * factor(rank, n)).min(1.0);
        running = if descending {
            running.min(q)
        } else {
            running.max(q)
        };
        ret[i] = running.clamp(0.0, 1.0);
    }
    ret
}

/// `min(1, n p)`
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.iter().filter(|p| p.is_finite()).count() as f64;
    pvalues
        .iter()
        .map(|&p| {
            if p.is_finite() {
                (n * p).clamp(0.0, 1.0)
            } else {
                p
            }
        })
        .collect()
}

/// Holm step-down: ascending p times `n - rank`, running max
pub fn holm(pvalues: &[f64]) -> Vec<f64> {
    stepwise(pvalues, false, |rank, n| (n - rank) as f64)
}

/// Hochberg step-up: descending p times `rank + 1`, running min
pub fn hochberg(pvalues: &[f64]) -> Vec<f64> {
    stepwise(pvalues, true, |rank, _| (rank + 1) as f64)
}

/// Benjamini-Hochberg: descending p times `n / (n - rank)`, running min
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    stepwise(pvalues, true, |rank, n| n as f64 / (n - rank) as f64)
}

/// Benjamini-Yekutieli: BH scaled by `q = Σ_{i=1}^{n} 1/i`
pub fn benjamini_yekutieli(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.iter().filter(|p| p.is_finite()).count();
    let q: f64 = (1..=n).map(|i| 1.0 / i as f64).sum();
    stepwise(pvalues, true, |rank, n| q * n as f64 / (n - rank) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [Adjuster; 6] = [
        Adjuster::None,
        Adjuster::Bonferroni,
        Adjuster::Holm,
        Adjuster::Hochberg,
        Adjuster::BH,
        Adjuster::BY,
    ];

    fn assert_vec_eq(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-10);
        }
    }

    #[test]
    fn single_value_is_unchanged() {
        for adj in ALL {
            assert_eq!(adj.adjust(&[0.013]), vec![0.013], "{:?}", adj);
            assert!(adj.adjust(&[]).is_empty());
        }
    }

    #[test]
    fn bonferroni_is_exact() {
        for n in 1..20 {
            for &p in &[0.0, 1e-6, 0.01, 0.049, 0.3, 1.0] {
                let out = bonferroni(&vec![p; n]);
                for q in out {
                    assert_eq!(q, (n as f64 * p).min(1.0));
                }
            }
        }
    }

    // reference values from R's p.adjust
    #[test]
    fn matches_reference() {
        let p = [0.01, 0.04, 0.03, 0.005, 0.2];
        assert_vec_eq(&holm(&p), &[0.04, 0.09, 0.09, 0.025, 0.2]);
        assert_vec_eq(&hochberg(&p), &[0.04, 0.08, 0.08, 0.025, 0.2]);
        assert_vec_eq(&benjamini_hochberg(&p), &[0.025, 0.05, 0.05, 0.025, 0.2]);
        let q = 1.0 + 0.5 + 1.0 / 3.0 + 0.25 + 0.2;
        assert_vec_eq(
            &benjamini_yekutieli(&p),
            &[0.025 * q, 0.05 * q, 0.05 * q, 0.025 * q, (0.2 * q).min(1.0)],
        );
    }

    #[test]
    fn bounded_and_monotone() {
        let p = [0.9, 0.001, 0.5, 0.02, 0.02, 0.7, 0.3, 1.0, 0.0];
        let order = finite_order(&p, false);
        for adj in ALL {
            let out = adj.adjust(&p);
            assert_eq!(out.len(), p.len());
            assert!(out.iter().all(|&x| (0.0..=1.0).contains(&x)));
            for w in order.windows(2) {
                assert!(out[w[0]] <= out[w[1]], "{:?}", adj);
            }
        }
    }

    #[test]
    fn nan_passes_through() {
        let out = benjamini_hochberg(&[0.01, f64::NAN, 0.02]);
        assert!(out[1].is_nan());
        assert_abs_diff_eq!(out[0], 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(out[2], 0.02, epsilon = 1e-12);
    }
}
