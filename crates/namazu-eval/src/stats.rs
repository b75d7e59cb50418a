//! Numeric helpers shared by the statistical tests

use rand::Rng;
use statrs::function::gamma::ln_gamma;

/// Floor applied to rates before taking logarithms. Keeps scores for
/// zero-rate bins finite (and therefore JSON-encodable) while still sinking
/// them far below any realistic value.
pub(crate) const RATE_FLOOR: f64 = 1e-300;

/// Joint Poisson log-likelihood of `observed` counts under `expected` rates.
pub fn poisson_log_likelihood(observed: &[u64], expected: &[f64]) -> f64 {
    debug_assert_eq!(observed.len(), expected.len());
    let mut ll = 0.0;
    for (&n, &lambda) in observed.iter().zip(expected) {
        let n_f = n as f64;
        ll += n_f * lambda.max(RATE_FLOOR).ln() - lambda - ln_gamma(n_f + 1.0);
    }
    ll
}

/// Fraction of `samples` at or below `x`. Caller guarantees `samples` is
/// non-empty.
pub fn empirical_fraction_leq(samples: &[f64], x: f64) -> f64 {
    debug_assert!(!samples.is_empty());
    let below = samples.iter().filter(|&&s| s <= x).count();
    below as f64 / samples.len() as f64
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Unbiased sample variance (n - 1 denominator); zero for fewer than two
/// samples.
pub fn sample_variance(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (n - 1) as f64
}

/// Scale `weights` so they sum to `total`. All-zero weights stay zero.
pub fn scale_to_total(weights: &[f64], total: f64) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return vec![0.0; weights.len()];
    }
    let factor = total / sum;
    weights.iter().map(|w| w * factor).collect()
}

/// Cumulative weight table for inverse-CDF index sampling.
pub struct CumulativeWeights {
    cum: Vec<f64>,
    total: f64,
}

impl CumulativeWeights {
    /// `None` when the weights carry no mass.
    pub fn new(weights: &[f64]) -> Option<Self> {
        let mut cum = Vec::with_capacity(weights.len());
        let mut running = 0.0;
        for &w in weights {
            if w > 0.0 {
                running += w;
            }
            cum.push(running);
        }
        if running > 0.0 {
            Some(Self {
                cum,
                total: running,
            })
        } else {
            None
        }
    }

    /// Draw one index with probability proportional to its weight.
    pub fn sample_index<R: Rng>(&self, rng: &mut R) -> usize {
        let u = rng.gen::<f64>() * self.total;
        // first index whose cumulative weight exceeds the draw; the `<=`
        // predicate skips any zero-weight prefix when u lands on 0.0
        let idx = self.cum.partition_point(|&c| c <= u);
        idx.min(self.cum.len() - 1)
    }
}
