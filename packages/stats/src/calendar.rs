//! Daily calendar alignment.
//!
//! Builds one row per calendar day from January 1 of the series' first
//! year to December 31 of its last year, whether or not the day was
//! observed, and attaches the reference values of the day's month.

use chrono::{Datelike, NaiveDate};
use water_norms_series_models::{AlignedRow, AlignedSeries, ReferenceCurve, Series};

/// What to do with February 29.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LeapDay {
    /// Omit it, so every year has exactly 365 rows.
    #[default]
    Drop,
    /// Keep it; leap years have 366 rows.
    Keep,
}

/// Aligns `series` on a 365-day calendar.
#[must_use]
pub fn align(series: &Series, curve: &ReferenceCurve) -> AlignedSeries {
    align_with(series, curve, LeapDay::Drop)
}

fn is_leap_day(date: NaiveDate) -> bool {
    date.month() == 2 && date.day() == 29
}

/// Aligns `series` on a daily calendar, handling February 29 as `leap_day`
/// says. An empty series gives an empty calendar.
#[must_use]
pub fn align_with(series: &Series, curve: &ReferenceCurve, leap_day: LeapDay) -> AlignedSeries {
    let levels = curve.levels().to_vec();

    let (Some(first_year), Some(last_year)) = (series.first_year(), series.last_year()) else {
        return AlignedSeries::new(levels, Vec::new());
    };
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(first_year, 1, 1),
        NaiveDate::from_ymd_opt(last_year, 12, 31),
    ) else {
        return AlignedSeries::new(levels, Vec::new());
    };

    // Walk the calendar and the points together; both ascend.
    let mut points = series.points().iter().peekable();
    let mut rows = Vec::new();

    for date in start.iter_days().take_while(|d| *d <= end) {
        let mut observed = None;
        while let Some(point) = points.next_if(|p| p.date <= date) {
            if point.date == date {
                observed = point.value;
            }
        }

        if leap_day == LeapDay::Drop && is_leap_day(date) {
            continue;
        }

        let month = curve.month(date.month());
        let reference = levels
            .iter()
            .map(|level| month.and_then(|m| m.get(level).copied()))
            .collect();

        rows.push(AlignedRow {
            date,
            observed,
            reference,
        });
    }

    AlignedSeries::new(levels, rows)
}
