//! Combining several p-values into one.
//!
//! Every method shares the same edge-case policy:
//! - all inputs exactly 0 gives 0, all inputs exactly 1 gives 1
//!   (an empty input counts as all ones);
//! - inputs outside the method's admissible range are dropped;
//! - with a single admissible value left, that value is returned;
//!   with none left, 1 is returned.

use log::warn;
use statrs::distribution::{
    Beta, Binomial, ChiSquared, ContinuousCDF, DiscreteCDF, Normal, StudentsT,
};
use statrs::function::factorial::{ln_binomial, ln_factorial};

/// Which inputs a method can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admissible {
    /// `0 < p < 1`
    Open,
    /// `0 < p <= 1`
    LeftOpen,
    /// `0 <= p <= 1`
    Closed,
}

impl Admissible {
    fn contains(&self, p: f64) -> bool {
        match self {
            Admissible::Open => p > 0.0 && p < 1.0,
            Admissible::LeftOpen => p > 0.0 && p <= 1.0,
            Admissible::Closed => (0.0..=1.0).contains(&p),
        }
    }
}

pub(crate) enum Prepared {
    Done(f64),
    Values(Vec<f64>),
}

pub(crate) fn prepare(pvalues: &[f64], admissible: Admissible) -> Prepared {
    if pvalues.iter().all(|&p| p == 1.0) {
        return Prepared::Done(1.0);
    }
    if pvalues.iter().all(|&p| p == 0.0) {
        return Prepared::Done(0.0);
    }
    let kept: Vec<f64> = pvalues
        .iter()
        .copied()
        .filter(|&p| admissible.contains(p))
        .collect();
    match kept.len() {
        0 => Prepared::Done(1.0),
        1 => Prepared::Done(kept[0]),
        _ => Prepared::Values(kept),
    }
}

fn std_normal() -> Normal {
    Normal::standard()
}

fn chisq_upper(x: f64, df: f64) -> f64 {
    match ChiSquared::new(df) {
        Ok(d) => d.sf(x).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Fisher: `-2 Σ ln p ~ χ²(2k)`
pub fn fisher(pvalues: &[f64]) -> f64 {
    let pv = match prepare(pvalues, Admissible::LeftOpen) {
        Prepared::Done(p) => return p,
        Prepared::Values(pv) => pv,
    };
    let stat: f64 = -2.0 * pv.iter().map(|p| p.ln()).sum::<f64>();
    chisq_upper(stat, 2.0 * pv.len() as f64)
}

/// Stouffer: `Σ Φ⁻¹(1 - p) / √k ~ N(0,1)`
pub fn stouffer(pvalues: &[f64]) -> f64 {
    let pv = match prepare(pvalues, Admissible::Open) {
        Prepared::Done(p) => return p,
        Prepared::Values(pv) => pv,
    };
    let normal = std_normal();
    let z = pv.iter().map(|&p| normal.inverse_cdf(1.0 - p)).sum::<f64>()
        / (pv.len() as f64).sqrt();
    1.0 - normal.cdf(z)
}

/// Mean of p-values: `(0.5 - p̄) √(12k) ~ N(0,1)`
pub fn mean(pvalues: &[f64]) -> f64 {
    let pv = match prepare(pvalues, Admissible::Closed) {
        Prepared::Done(p) => return p,
        Prepared::Values(pv) => pv,
    };
    let k = pv.len() as f64;
    let pbar = pv.iter().sum::<f64>() / k;
    let z = (0.5 - pbar) * (12.0 * k).sqrt();
    1.0 - std_normal().cdf(z)
}

/// Logit (Mudholkar & George): `-C Σ ln(p/(1-p)) ~ t(5k+4)`,
/// `C = √(3(5k+4) / (k π² (5k+2)))`
pub fn logit(pvalues: &[f64]) -> f64 {
    let pv = match prepare(pvalues, Admissible::Open) {
        Prepared::Done(p) => return p,
        Prepared::Values(pv) => pv,
    };
    let k = pv.len() as f64;
    let pi2 = std::f64::consts::PI.powi(2);
    let c = (3.0 * (5.0 * k + 4.0) / (k * pi2 * (5.0 * k + 2.0))).sqrt();
    let t = -c * pv.iter().map(|&p| (p / (1.0 - p)).ln()).sum::<f64>();
    match StudentsT::new(0.0, 1.0, 5.0 * k + 4.0) {
        Ok(d) => (1.0 - d.cdf(t)).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Wilkinson: the `r`-th smallest p-value under `Beta(r, k + 1 - r)`.
/// `r` is clamped into `1..=k`.
pub fn wilkinson(pvalues: &[f64], r: usize) -> f64 {
    let mut pv = match prepare(pvalues, Admissible::Closed) {
        Prepared::Done(p) => return p,
        Prepared::Values(pv) => pv,
    };
    pv.sort_by(|a, b| a.total_cmp(b));
    let k = pv.len();
    let r = r.clamp(1, k);
    match Beta::new(r as f64, (k + 1 - r) as f64) {
        Ok(d) => d.cdf(pv[r - 1]).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Edgington's sum of p-values (Irwin-Hall tail):
/// `P(S' <= S) = (1/k!) Σ_{j=0}^{⌊S⌋} (-1)^j C(k,j) (S - j)^k`
pub fn sum_of_p(pvalues: &[f64]) -> f64 {
    let pv = match prepare(pvalues, Admissible::Closed) {
        Prepared::Done(p) => return p,
        Prepared::Values(pv) => pv,
    };
    let k = pv.len() as u64;
    let s: f64 = pv.iter().sum();
    let log_kfact = ln_factorial(k);
    let mut ret = 0.0;
    for j in 0..=(s.floor() as u64).min(k) {
        let gap = s - j as f64;
        if gap <= 0.0 {
            continue;
        }
        let term = (ln_binomial(k, j) + (k as f64) * gap.ln() - log_kfact).exp();
        if j % 2 == 0 {
            ret += term;
        } else {
            ret -= term;
        }
    }
    ret.clamp(0.0, 1.0)
}

/// Plain product of p-values
pub fn product(pvalues: &[f64]) -> f64 {
    match prepare(pvalues, Admissible::Closed) {
        Prepared::Done(p) => p,
        Prepared::Values(pv) => pv.iter().product(),
    }
}

/// Vote counting.
///
/// p-values below `min` vote for an effect, those above `max` vote
/// against it; the rest abstain. The result is the one-sided exact
/// binomial test of the positive votes against a fair coin.
pub fn vote_counting(pvalues: &[f64], min: f64, max: f64) -> anyhow::Result<f64> {
    if !(min > 0.0 && min < 1.0) || !(max > 0.0 && max < 1.0) {
        return Err(anyhow::anyhow!(
            "vote counting thresholds must lie in (0, 1): min = {}, max = {}",
            min,
            max
        ));
    }
    let pv = match prepare(pvalues, Admissible::Closed) {
        Prepared::Done(p) => return Ok(p),
        Prepared::Values(pv) => pv,
    };
    let positive = pv.iter().filter(|&&p| p < min).count() as u64;
    let negative = pv.iter().filter(|&&p| p > max).count() as u64;
    let n = positive + negative;
    if positive == 0 || n == 0 {
        return Ok(1.0);
    }
    let binom = Binomial::new(0.5, n)?;
    // P(X >= positive)
    Ok(binom.sf(positive - 1).clamp(0.0, 1.0))
}

/// Selectable combination method
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Combiner {
    Fisher,
    #[default]
    Stouffer,
    Mean,
    Logit,
    Wilkinson { r: usize },
    SumOfP,
    Product,
    VoteCounting { min: f64, max: f64 },
}

pub const DEFAULT_VOTE_MIN: f64 = 0.05;
pub const DEFAULT_VOTE_MAX: f64 = 0.95;

impl Combiner {
    /// Select by name; unknown names fall back to Stouffer
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "fisher" => Combiner::Fisher,
            "stouffer" => Combiner::Stouffer,
            "mean" => Combiner::Mean,
            "logit" => Combiner::Logit,
            "wilkinson" | "min" => Combiner::Wilkinson { r: 1 },
            "sump" | "sum" | "sum-of-p" | "edgington" => Combiner::SumOfP,
            "product" | "prod" => Combiner::Product,
            "vote" | "votecounting" | "vote-counting" => Combiner::VoteCounting {
                min: DEFAULT_VOTE_MIN,
                max: DEFAULT_VOTE_MAX,
            },
            _ => {
                warn!("unknown combiner `{}`, using stouffer", name);
                Combiner::Stouffer
            }
        }
    }

    pub fn combine(&self, pvalues: &[f64]) -> anyhow::Result<f64> {
        Ok(match self {
            Combiner::Fisher => fisher(pvalues),
            Combiner::Stouffer => stouffer(pvalues),
            Combiner::Mean => mean(pvalues),
            Combiner::Logit => logit(pvalues),
            Combiner::Wilkinson { r } => wilkinson(pvalues, *r),
            Combiner::SumOfP => sum_of_p(pvalues),
            Combiner::Product => product(pvalues),
            Combiner::VoteCounting { min, max } => vote_counting(pvalues, *min, *max)?,
        })
    }
}
