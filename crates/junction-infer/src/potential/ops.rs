//! Binary combination and reduction operators over potentials.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Pointwise binary operator used by [`Potential::combine`](super::Potential::combine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombineOp {
    /// Pointwise product (linear-domain combination).
    Product,
    /// Pointwise sum (log-domain combination).
    Sum,
    Max,
    Min,
}

impl CombineOp {
    #[inline]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            CombineOp::Product => a * b,
            CombineOp::Sum => a + b,
            CombineOp::Max => a.max(b),
            CombineOp::Min => a.min(b),
        }
    }

    /// Neutral element: `apply(neutral, x) == x`.
    pub fn neutral(self) -> f64 {
        match self {
            CombineOp::Product => 1.0,
            CombineOp::Sum => 0.0,
            CombineOp::Max => f64::NEG_INFINITY,
            CombineOp::Min => f64::INFINITY,
        }
    }
}

/// Reduction used by [`Potential::project`](super::Potential::project).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectOp {
    /// Sum-marginalisation.
    Sum,
    /// Max-marginalisation (MAP / max-product).
    Max,
    Min,
    /// `ln Σ exp(x)`, the log-domain counterpart of `Sum`.
    LogSumExp,
}

impl ProjectOp {
    /// Reduce one lane of values.
    pub fn reduce(self, lane: ArrayView1<'_, f64>) -> f64 {
        match self {
            ProjectOp::Sum => lane.sum(),
            ProjectOp::Max => lane.iter().fold(f64::NEG_INFINITY, |acc, &x| acc.max(x)),
            ProjectOp::Min => lane.iter().fold(f64::INFINITY, |acc, &x| acc.min(x)),
            ProjectOp::LogSumExp => log_sum_exp(lane.iter().copied()),
        }
    }
}

/// Numerically stable `ln Σ exp(x)`; `-inf` for empty or all `-inf` input.
pub fn log_sum_exp<I>(values: I) -> f64
where
    I: Iterator<Item = f64> + Clone,
{
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    max + values.map(|x| (x - max).exp()).sum::<f64>().ln()
}
