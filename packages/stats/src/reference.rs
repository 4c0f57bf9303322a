//! Per-calendar-month reference curves.
//!
//! The values of every month of the selected window are pooled across
//! years, fitted with a [`DistributionModel`], and evaluated at each
//! requested percentile level.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Datelike;
use water_norms_series_models::{
    HistoricalWindow, PercentileLevel, ReferenceCurve, Series, TimeSeriesPoint,
};

use crate::distribution::DistributionModel;

/// Errors that prevent a reference curve from being computed at all.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum StatsError {
    /// A requested level is not strictly between 0 and 1.
    #[error("Invalid percentile level {0}: must lie strictly between 0 and 1")]
    InvalidPercentile(f64),
}

/// The series does not cover what the window requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientHistory {
    pub window: HistoricalWindow,
    /// First year of the series, `None` if it is empty.
    pub first_year: Option<i32>,
    /// Last year of the series, `None` if it is empty.
    pub last_year: Option<i32>,
}

impl fmt::Display for InsufficientHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first_year, self.last_year) {
            (Some(first), Some(last)) => write!(
                f,
                "history {first}-{last} does not satisfy window {}",
                self.window
            ),
            _ => write!(f, "empty history does not satisfy window {}", self.window),
        }
    }
}

/// Result of [`compute_reference_curve`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceOutcome {
    /// The window was satisfied. Months without a usable fit are absent.
    Available(ReferenceCurve),
    /// The series does not cover the window.
    Unavailable(InsufficientHistory),
}

impl ReferenceOutcome {
    #[must_use]
    pub const fn curve(&self) -> Option<&ReferenceCurve> {
        match self {
            Self::Available(curve) => Some(curve),
            Self::Unavailable(_) => None,
        }
    }

    #[must_use]
    pub fn into_curve(self) -> Option<ReferenceCurve> {
        match self {
            Self::Available(curve) => Some(curve),
            Self::Unavailable(_) => None,
        }
    }
}

/// Selects the points of `series` that `window` admits.
///
/// Points keep their order.
///
/// # Errors
///
/// Returns [`InsufficientHistory`] if the series does not cover what the
/// window requires:
/// * `BeforeYear`: the series is empty, `min_span_years` is negative, or
///   the series starts fewer than `min_span_years` years before `cutoff`
/// * `Period`: `min_year` is after `max_year`, or the series starts after
///   `min_year` or ends before `max_year`
pub fn select_window(
    series: &Series,
    window: HistoricalWindow,
) -> Result<Vec<&TimeSeriesPoint>, InsufficientHistory> {
    let first_year = series.first_year();
    let last_year = series.last_year();
    let insufficient = InsufficientHistory {
        window,
        first_year,
        last_year,
    };

    let points = series.points().iter();
    match window {
        HistoricalWindow::All => Ok(points.collect()),
        HistoricalWindow::BeforeYear {
            cutoff,
            min_span_years,
        } => match first_year {
            Some(first)
                if min_span_years >= 0
                    && i64::from(cutoff) - i64::from(first) >= i64::from(min_span_years) =>
            {
                Ok(points.filter(|p| p.date.year() < cutoff).collect())
            }
            _ => Err(insufficient),
        },
        HistoricalWindow::Period { min_year, max_year } => match (first_year, last_year) {
            (Some(first), Some(last))
                if min_year <= max_year && first <= min_year && last >= max_year =>
            {
                Ok(points
                    .filter(|p| (min_year..=max_year).contains(&p.date.year()))
                    .collect())
            }
            _ => Err(insufficient),
        },
    }
}

/// Validates requested levels, keeping their order.
fn validate_levels(levels: &[f64]) -> Result<Vec<PercentileLevel>, StatsError> {
    levels
        .iter()
        .map(|&p| PercentileLevel::new(p).map_err(|e| StatsError::InvalidPercentile(e.0)))
        .collect()
}

/// Computes the monthly reference curve of `series` over `window`.
///
/// Months without eligible values are left out of the curve. An empty
/// series with [`HistoricalWindow::All`] yields an available curve with
/// no months.
///
/// # Errors
///
/// Returns [`StatsError::InvalidPercentile`] if any level lies outside
/// `(0, 1)`.
pub fn compute_reference_curve(
    series: &Series,
    window: HistoricalWindow,
    levels: &[f64],
    model: DistributionModel,
) -> Result<ReferenceOutcome, StatsError> {
    let levels = validate_levels(levels)?;

    let points = match select_window(series, window) {
        Ok(points) => points,
        Err(insufficient) => {
            log::debug!("Reference curve unavailable: {insufficient}");
            return Ok(ReferenceOutcome::Unavailable(insufficient));
        }
    };

    let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for point in points {
        if let Some(value) = point.value {
            by_month.entry(point.date.month()).or_default().push(value);
        }
    }

    let mut curve = ReferenceCurve::new(levels);
    for (month, values) in by_month {
        let Some(fitted) = model.fit(&values) else {
            log::debug!("No eligible values for month {month} under {model}");
            continue;
        };
        let quantiles = curve
            .levels()
            .iter()
            .map(|&level| (level, fitted.quantile(level.value())))
            .collect();
        curve.insert_month(month, quantiles);
    }

    Ok(ReferenceOutcome::Available(curve))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const LEVELS: [f64; 5] = [0.95, 0.8, 0.5, 0.2, 0.05];

    /// Years `from..=to`, one value per day from `f(date)`.
    fn daily(from: i32, to: i32, f: impl Fn(NaiveDate) -> Option<f64>) -> Series {
        let start = NaiveDate::from_ymd_opt(from, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(to, 12, 31).unwrap();
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| TimeSeriesPoint::new(d, f(d)))
            .collect()
    }

    fn wavy(d: NaiveDate) -> Option<f64> {
        let x = f64::from(d.ordinal()) + f64::from(d.year() % 7) * 3.0;
        Some(10.0 + (x / 9.0).sin() * 4.0 + f64::from(d.day() % 5))
    }

    fn available(outcome: ReferenceOutcome) -> ReferenceCurve {
        outcome.into_curve().expect("curve available")
    }

    #[test]
    fn percentiles_are_monotonic_for_both_models() {
        let series = daily(2000, 2009, wavy);
        for model in [DistributionModel::LogNormal, DistributionModel::ExtremeValueMoment] {
            let curve = available(
                compute_reference_curve(&series, HistoricalWindow::All, &LEVELS, model).unwrap(),
            );
            for (month, values) in curve.months() {
                let ordered: Vec<f64> = values.values().copied().collect();
                assert!(
                    ordered.windows(2).all(|w| w[0] <= w[1]),
                    "month {month} not monotonic under {model}: {ordered:?}"
                );
            }
            assert_eq!(curve.months().count(), 12);
        }
    }

    #[test]
    fn constant_months_collapse_and_empty_month_is_absent() {
        let series = daily(2001, 2003, |d| (d.month() != 6).then_some(42.0));
        for model in [DistributionModel::LogNormal, DistributionModel::ExtremeValueMoment] {
            let curve = available(
                compute_reference_curve(&series, HistoricalWindow::All, &LEVELS, model).unwrap(),
            );
            assert!(curve.month(6).is_none());
            assert_eq!(curve.months().count(), 11);
            for (_, values) in curve.months() {
                for v in values.values() {
                    assert!((v - 42.0).abs() < 1e-9, "{model}: {v}");
                }
            }
        }
    }

    #[test]
    fn curve_keeps_requested_level_order() {
        let series = daily(2010, 2011, wavy);
        let curve = available(
            compute_reference_curve(
                &series,
                HistoricalWindow::All,
                &LEVELS,
                DistributionModel::LogNormal,
            )
            .unwrap(),
        );
        assert_eq!(
            curve.column_names(),
            vec![
                "percentile_95",
                "percentile_80",
                "percentile_50",
                "percentile_20",
                "percentile_05"
            ]
        );
    }

    #[test]
    fn lognormal_month_with_only_non_positive_values_is_absent() {
        let series = daily(2001, 2001, |d| Some(if d.month() == 2 { 0.0 } else { 5.0 }));
        let curve = available(
            compute_reference_curve(
                &series,
                HistoricalWindow::All,
                &LEVELS,
                DistributionModel::LogNormal,
            )
            .unwrap(),
        );
        assert!(curve.month(2).is_none());
        assert!(curve.month(3).is_some());
    }

    #[test]
    fn rejects_levels_outside_unit_interval() {
        let series = daily(2001, 2001, wavy);
        for bad in [0.0, 1.0, 1.5, -0.1] {
            let err = compute_reference_curve(
                &series,
                HistoricalWindow::All,
                &[0.5, bad],
                DistributionModel::LogNormal,
            )
            .unwrap_err();
            assert_eq!(err, StatsError::InvalidPercentile(bad));
        }
    }

    #[test]
    fn invalid_level_reported_even_when_window_unavailable() {
        let err = compute_reference_curve(
            &Series::empty(),
            HistoricalWindow::Period {
                min_year: 1990,
                max_year: 2020,
            },
            &[2.0],
            DistributionModel::LogNormal,
        )
        .unwrap_err();
        assert_eq!(err, StatsError::InvalidPercentile(2.0));
    }

    #[test]
    fn before_year_requires_minimum_span() {
        let series = daily(2005, 2020, wavy);
        let short = HistoricalWindow::BeforeYear {
            cutoff: 2010,
            min_span_years: 10,
        };
        assert_eq!(
            select_window(&series, short).unwrap_err(),
            InsufficientHistory {
                window: short,
                first_year: Some(2005),
                last_year: Some(2020),
            }
        );

        let exact = HistoricalWindow::BeforeYear {
            cutoff: 2015,
            min_span_years: 10,
        };
        let selected = select_window(&series, exact).unwrap();
        assert!(selected.iter().all(|p| p.date.year() < 2015));
        assert_eq!(selected.last().unwrap().date.year(), 2014);
    }

    #[test]
    fn before_year_with_extreme_cutoff_does_not_overflow() {
        let series = daily(2005, 2008, wavy);
        let window = |cutoff| HistoricalWindow::BeforeYear {
            cutoff,
            min_span_years: 1,
        };

        let outcome =
            compute_reference_curve(&series, window(i32::MIN), &[0.5], DistributionModel::LogNormal)
                .unwrap();
        assert!(matches!(outcome, ReferenceOutcome::Unavailable(_)));

        let outcome =
            compute_reference_curve(&series, window(i32::MAX), &[0.5], DistributionModel::LogNormal)
                .unwrap();
        assert_eq!(available(outcome).months().count(), 12);
    }

    #[test]
    fn before_year_with_negative_span_is_unavailable() {
        let series = daily(2005, 2020, wavy);
        let window = HistoricalWindow::BeforeYear {
            cutoff: 2000,
            min_span_years: -10,
        };
        assert!(select_window(&series, window).is_err());
    }

    #[test]
    fn before_year_on_empty_series_is_unavailable() {
        let outcome = compute_reference_curve(
            &Series::empty(),
            HistoricalWindow::BeforeYear {
                cutoff: 2010,
                min_span_years: 0,
            },
            &LEVELS,
            DistributionModel::LogNormal,
        )
        .unwrap();
        assert!(matches!(outcome, ReferenceOutcome::Unavailable(_)));
    }

    #[test]
    fn period_requires_full_coverage() {
        let series = daily(1995, 2020, wavy);
        let window = HistoricalWindow::Period {
            min_year: 1990,
            max_year: 2020,
        };
        let outcome =
            compute_reference_curve(&series, window, &LEVELS, DistributionModel::LogNormal)
                .unwrap();
        assert_eq!(
            outcome,
            ReferenceOutcome::Unavailable(InsufficientHistory {
                window,
                first_year: Some(1995),
                last_year: Some(2020),
            })
        );

        let inner = HistoricalWindow::Period {
            min_year: 2000,
            max_year: 2010,
        };
        let selected = select_window(&series, inner).unwrap();
        assert_eq!(selected.first().unwrap().date.year(), 2000);
        assert_eq!(selected.last().unwrap().date.year(), 2010);
    }

    #[test]
    fn inverted_period_is_unavailable() {
        let series = daily(1995, 2020, wavy);
        let window = HistoricalWindow::Period {
            min_year: 2010,
            max_year: 2000,
        };
        let outcome =
            compute_reference_curve(&series, window, &LEVELS, DistributionModel::LogNormal)
                .unwrap();
        assert_eq!(
            outcome,
            ReferenceOutcome::Unavailable(InsufficientHistory {
                window,
                first_year: Some(1995),
                last_year: Some(2020),
            })
        );
    }

    #[test]
    fn window_changes_the_curve() {
        // Level jumps from 10 to 20 in 2010.
        let series = daily(2000, 2019, |d| Some(if d.year() < 2010 { 10.0 } else { 20.0 }));
        let window = HistoricalWindow::BeforeYear {
            cutoff: 2010,
            min_span_years: 10,
        };
        let curve = available(
            compute_reference_curve(&series, window, &[0.5], DistributionModel::ExtremeValueMoment)
                .unwrap(),
        );
        let median = PercentileLevel::new(0.5).unwrap();
        assert!((curve.value(1, median).unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn empty_series_with_all_window_has_no_months() {
        let curve = available(
            compute_reference_curve(
                &Series::empty(),
                HistoricalWindow::All,
                &LEVELS,
                DistributionModel::ExtremeValueMoment,
            )
            .unwrap(),
        );
        assert!(curve.is_empty());
        assert_eq!(curve.levels().len(), 5);
    }
}
