//! Composite indices over groups of series.
//!
//! Each member is first rescaled on its own (z-score or min-max), then the
//! rescaled values are averaged per date over the members that have one.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use water_norms_series_models::{CompositeIndex, Series, TimeSeriesPoint};

/// How members are rescaled before averaging.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompositeStrategy {
    /// `(v - mean) / std`, with the sample standard deviation.
    #[default]
    Standardize,
    /// `(v - min) / (max - min)`.
    Normalize,
}

/// Affine rescaling `(v - offset) / scale`.
#[derive(Debug, Clone, Copy)]
struct Rescale {
    offset: f64,
    scale: f64,
}

impl Rescale {
    #[allow(clippy::cast_precision_loss)]
    fn fit(strategy: CompositeStrategy, values: &[f64]) -> Option<Self> {
        let (offset, scale) = match strategy {
            CompositeStrategy::Standardize => {
                if values.len() < 2 {
                    return None;
                }
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                (mean, var.sqrt())
            }
            CompositeStrategy::Normalize => {
                let min = values.iter().copied().reduce(f64::min)?;
                let max = values.iter().copied().reduce(f64::max)?;
                (min, max - min)
            }
        };

        (scale.is_finite() && scale > 0.0).then_some(Self { offset, scale })
    }

    fn apply(self, v: f64) -> f64 {
        (v - self.offset) / self.scale
    }
}

/// Combines `group` into one index.
///
/// The index covers the union of all member dates. Each date holds the mean
/// of the rescaled values present on that date, and is missing when no
/// member has one. Members that cannot be rescaled (fewer than two values
/// for [`CompositeStrategy::Standardize`], no spread) are left out with a
/// warning.
#[must_use]
pub fn combine(group: &[&Series], strategy: CompositeStrategy) -> CompositeIndex {
    let mut sums: BTreeMap<NaiveDate, (f64, u32)> = BTreeMap::new();

    for (i, series) in group.iter().enumerate() {
        for point in series.points() {
            sums.entry(point.date).or_insert((0.0, 0));
        }

        let values: Vec<f64> = series
            .values()
            .map(|(_, v)| v)
            .filter(|v| v.is_finite())
            .collect();
        let Some(rescale) = Rescale::fit(strategy, &values) else {
            log::warn!(
                "Composite member {i} has no usable spread ({} values); skipping it",
                values.len()
            );
            continue;
        };

        for (date, v) in series.values() {
            if !v.is_finite() {
                continue;
            }
            let entry = sums.entry(date).or_insert((0.0, 0));
            entry.0 += rescale.apply(v);
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(date, (sum, count))| {
            let value = (count > 0).then(|| sum / f64::from(count));
            TimeSeriesPoint::new(date, value)
        })
        .collect()
}
