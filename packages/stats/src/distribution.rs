//! Parametric distributions fitted by moments.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

const A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_690e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239e0,
];
const B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838e0,
    -2.549_732_539_343_734e0,
    4.374_664_141_464_968e0,
    2.938_163_982_698_783e0,
];
const D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996e0,
    3.754_408_661_907_416e0,
];

const P_LOW: f64 = 0.024_25;

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
///
/// Returns NaN outside `(0, 1)`.
#[must_use]
pub fn normal_quantile(p: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Mean and population standard deviation.
#[allow(clippy::cast_precision_loss)]
fn moments(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Distribution family used for a reference curve.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DistributionModel {
    /// Normal in log space. Only strictly positive values are eligible.
    #[default]
    LogNormal,
    /// Gumbel (type I extreme value) by the method of moments.
    ExtremeValueMoment,
}

impl DistributionModel {
    /// Fits the model to `values`, ignoring ineligible ones.
    ///
    /// Returns `None` when no value is eligible.
    #[must_use]
    pub fn fit(self, values: &[f64]) -> Option<FittedDistribution> {
        match self {
            Self::LogNormal => {
                let logs: Vec<f64> = values
                    .iter()
                    .filter(|v| v.is_finite() && **v > 0.0)
                    .map(|v| v.ln())
                    .collect();
                let (mean_log, std_log) = moments(&logs)?;
                Some(FittedDistribution::LogNormal { mean_log, std_log })
            }
            Self::ExtremeValueMoment => {
                let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
                let (mean, std) = moments(&finite)?;
                Some(FittedDistribution::ExtremeValue { mean, std })
            }
        }
    }
}

/// A fitted distribution, ready to evaluate quantiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FittedDistribution {
    /// Moments of the natural log of the sample.
    LogNormal { mean_log: f64, std_log: f64 },
    /// Moments of the sample itself, for the Gumbel moment estimator.
    ExtremeValue { mean: f64, std: f64 },
}

impl FittedDistribution {
    /// The value at cumulative probability `p` in `(0, 1)`.
    #[must_use]
    pub fn quantile(&self, p: f64) -> f64 {
        match *self {
            Self::LogNormal { mean_log, std_log } => {
                std_log.mul_add(normal_quantile(p), mean_log).exp()
            }
            Self::ExtremeValue { mean, std } => {
                let scale = 6.0_f64.sqrt() * std / std::f64::consts::PI;
                scale.mul_add(-(-p.ln()).ln(), mean)
            }
        }
    }
}
