#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical daily time series and reference curve types.
//!
//! Every ingestion path (river discharge, groundwater level) produces a
//! [`Series`] of [`TimeSeriesPoint`]s. Downstream statistics consume these
//! types and never touch raw service records.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The physical quantity a series measures, which also determines the
/// remote endpoint it is fetched from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SeriesKind {
    /// Daily mean river discharge at a hydrometric site.
    Discharge,
    /// Groundwater level at a piezometric station.
    GroundwaterLevel,
}

/// Status/method/quality labels attached to a measurement by the provider.
///
/// The values are opaque; only quality filtering looks at them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qualifiers {
    /// Validation status (e.g. "Donnée validée").
    pub status: Option<String>,
    /// Production method (e.g. "Mesurée").
    pub method: Option<String>,
    /// Quality label (e.g. "Correcte", "Bonne").
    pub quality: Option<String>,
}

impl Qualifiers {
    /// Qualifiers with no labels.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            status: None,
            method: None,
            quality: None,
        }
    }
}

/// A single daily measurement. `value` is `None` when the provider
/// reported the date without a usable number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    /// Calendar date of the measurement.
    pub date: NaiveDate,
    /// Measured value, if any.
    pub value: Option<f64>,
    /// Provider labels.
    #[serde(default)]
    pub qualifiers: Qualifiers,
}

impl TimeSeriesPoint {
    /// Creates a point without qualifiers.
    #[must_use]
    pub const fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self {
            date,
            value,
            qualifiers: Qualifiers::none(),
        }
    }
}

/// An immutable daily series, strictly ascending by date with at most one
/// point per date.
///
/// The only way to build one is [`Series::from_points`], which enforces the
/// ordering invariant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<TimeSeriesPoint>", from = "Vec<TimeSeriesPoint>")]
pub struct Series {
    points: Vec<TimeSeriesPoint>,
}

impl Series {
    /// Builds a series from points in any order.
    ///
    /// When several points share a date, the one that appears first in
    /// `points` is kept.
    #[must_use]
    pub fn from_points(mut points: Vec<TimeSeriesPoint>) -> Self {
        // Stable sort keeps input order among equal dates.
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self { points }
    }

    /// An empty series.
    #[must_use]
    pub const fn empty() -> Self {
        Self { points: Vec::new() }
    }

    /// All points in ascending date order.
    #[must_use]
    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    /// Number of dated points (including points with a missing value).
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Earliest date in the series.
    #[must_use]
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    /// Latest date in the series.
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Year of the earliest point.
    #[must_use]
    pub fn first_year(&self) -> Option<i32> {
        self.first_date().map(|d| d.year())
    }

    /// Year of the latest point.
    #[must_use]
    pub fn last_year(&self) -> Option<i32> {
        self.last_date().map(|d| d.year())
    }

    /// Latest date that carries an actual value.
    #[must_use]
    pub fn last_observation_date(&self) -> Option<NaiveDate> {
        self.points
            .iter()
            .rev()
            .find(|p| p.value.is_some())
            .map(|p| p.date)
    }

    /// The value observed on `date`, if the series has one.
    #[must_use]
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .and_then(|i| self.points[i].value)
    }

    /// Iterates over `(date, value)` for every point with a value.
    pub fn values(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.value.map(|v| (p.date, v)))
    }
}

impl From<Vec<TimeSeriesPoint>> for Series {
    fn from(points: Vec<TimeSeriesPoint>) -> Self {
        Self::from_points(points)
    }
}

impl From<Series> for Vec<TimeSeriesPoint> {
    fn from(series: Series) -> Self {
        series.points
    }
}

impl FromIterator<TimeSeriesPoint> for Series {
    fn from_iter<I: IntoIterator<Item = TimeSeriesPoint>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}

/// A composite series derived from a group of related series.
pub type CompositeIndex = Series;

/// Optional bounds on the dates requested from the remote service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive start date.
    pub start: Option<NaiveDate>,
    /// Inclusive end date.
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// No bounds: the full available history.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }
}

/// Which years of history feed a reference curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoricalWindow {
    /// Every year in the series.
    #[default]
    All,
    /// Only years strictly before `cutoff`. Requires the series to start at
    /// least `min_span_years` before `cutoff`.
    BeforeYear {
        /// First excluded year.
        cutoff: i32,
        /// Minimum number of years of history before `cutoff`.
        min_span_years: i32,
    },
    /// Only years in `[min_year, max_year]`. Requires the series to cover
    /// the whole range.
    Period {
        /// First included year.
        min_year: i32,
        /// Last included year.
        max_year: i32,
    },
}

impl fmt::Display for HistoricalWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all history"),
            Self::BeforeYear {
                cutoff,
                min_span_years,
            } => write!(f, "before {cutoff} (at least {min_span_years} years)"),
            Self::Period { min_year, max_year } => write!(f, "{min_year}-{max_year}"),
        }
    }
}

/// Returned when a percentile level lies outside `(0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelOutOfRange(pub f64);

impl fmt::Display for LevelOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "percentile level {} is outside (0, 1)", self.0)
    }
}

impl std::error::Error for LevelOutOfRange {}

/// A percentile level strictly between 0 and 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct PercentileLevel(f64);

impl PercentileLevel {
    /// Validates `level`.
    ///
    /// # Errors
    ///
    /// Returns [`LevelOutOfRange`] if `level` is not in `(0, 1)` (NaN
    /// included).
    pub fn new(level: f64) -> Result<Self, LevelOutOfRange> {
        if level > 0.0 && level < 1.0 {
            Ok(Self(level))
        } else {
            Err(LevelOutOfRange(level))
        }
    }

    /// The level as a probability.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Column label used for this level in exported tables, e.g.
    /// `percentile_95` for 0.95 and `percentile_05` for 0.05.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn column_name(self) -> String {
        format!("percentile_{:02}", (self.0 * 100.0).round() as u32)
    }
}

impl TryFrom<f64> for PercentileLevel {
    type Error = LevelOutOfRange;

    fn try_from(level: f64) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<PercentileLevel> for f64 {
    fn from(level: PercentileLevel) -> Self {
        level.0
    }
}

impl PartialEq for PercentileLevel {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PercentileLevel {}

impl PartialOrd for PercentileLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PercentileLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for PercentileLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-calendar-month percentile values.
///
/// Months without any eligible history are absent rather than filled
/// with a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceCurve {
    levels: Vec<PercentileLevel>,
    months: BTreeMap<u32, BTreeMap<PercentileLevel, f64>>,
}

impl ReferenceCurve {
    /// A curve for `levels` with no month filled yet. Levels keep the
    /// given order; repeated levels are dropped.
    #[must_use]
    pub fn new(levels: Vec<PercentileLevel>) -> Self {
        let mut unique = Vec::with_capacity(levels.len());
        for level in levels {
            if !unique.contains(&level) {
                unique.push(level);
            }
        }
        Self {
            levels: unique,
            months: BTreeMap::new(),
        }
    }

    /// Sets the values for `month` (1-12).
    pub fn insert_month(&mut self, month: u32, values: BTreeMap<PercentileLevel, f64>) {
        self.months.insert(month, values);
    }

    /// Requested levels, in request order.
    #[must_use]
    pub fn levels(&self) -> &[PercentileLevel] {
        &self.levels
    }

    /// Values for `month`, if that month had eligible history.
    #[must_use]
    pub fn month(&self, month: u32) -> Option<&BTreeMap<PercentileLevel, f64>> {
        self.months.get(&month)
    }

    /// The value for `month` at `level`.
    #[must_use]
    pub fn value(&self, month: u32, level: PercentileLevel) -> Option<f64> {
        self.months.get(&month)?.get(&level).copied()
    }

    /// Iterates over filled months in calendar order.
    pub fn months(&self) -> impl Iterator<Item = (u32, &BTreeMap<PercentileLevel, f64>)> {
        self.months.iter().map(|(m, v)| (*m, v))
    }

    /// Whether no month has values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Column labels for the requested levels.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.levels.iter().map(|l| l.column_name()).collect()
    }
}

/// One calendar day of an [`AlignedSeries`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    /// Calendar date.
    pub date: NaiveDate,
    /// The series value on this date.
    pub observed: Option<f64>,
    /// Reference values for the date's month, one per level in
    /// [`AlignedSeries::levels`] order.
    pub reference: Vec<Option<f64>>,
}

/// A complete daily calendar joining observations with reference values.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    levels: Vec<PercentileLevel>,
    rows: Vec<AlignedRow>,
}

impl AlignedSeries {
    /// Wraps rows produced in ascending date order.
    #[must_use]
    pub const fn new(levels: Vec<PercentileLevel>, rows: Vec<AlignedRow>) -> Self {
        Self { levels, rows }
    }

    /// Levels of the reference columns.
    #[must_use]
    pub fn levels(&self) -> &[PercentileLevel] {
        &self.levels
    }

    /// All rows in date order.
    #[must_use]
    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Year of the first row.
    #[must_use]
    pub fn first_year(&self) -> Option<i32> {
        self.rows.first().map(|r| r.date.year())
    }

    /// Year of the last row.
    #[must_use]
    pub fn last_year(&self) -> Option<i32> {
        self.rows.last().map(|r| r.date.year())
    }

    /// The rows belonging to `year`.
    #[must_use]
    pub fn year_rows(&self, year: i32) -> &[AlignedRow] {
        let start = self.rows.partition_point(|r| r.date.year() < year);
        let end = self.rows.partition_point(|r| r.date.year() <= year);
        &self.rows[start..end]
    }

    /// Column labels for the reference values.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.levels.iter().map(|l| l.column_name()).collect()
    }
}

/// Per-station information supplied by the metadata loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMetadata {
    /// Site code (discharge) or BSS code (groundwater level).
    pub id: String,
    /// Which quantity the station measures.
    pub kind: SeriesKind,
    /// Display title for charts.
    #[serde(default)]
    pub title: String,
    /// Named alert thresholds (e.g. `seuil_alerte`).
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
    /// Composite group (aquifer name) this station belongs to.
    #[serde(default)]
    pub group: Option<String>,
}

impl StationMetadata {
    /// The title, falling back to the station id.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// Everything the chart renderer needs besides the aligned rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    /// Chart title.
    pub title: String,
    /// Quantity plotted, if the chart is for a single station.
    pub kind: Option<SeriesKind>,
    /// Names of the reference columns in the aligned table.
    pub reference_columns: Vec<String>,
    /// Horizontal threshold lines.
    pub thresholds: BTreeMap<String, f64>,
    /// Year drawn as the current trajectory.
    pub focus_year: i32,
    /// Number of preceding years overlaid.
    pub past_years: u32,
    /// Date of the last actual measurement.
    pub last_measurement: Option<NaiveDate>,
    /// Whether every page of the underlying series was received.
    pub complete: bool,
}
