//! Raw records to canonical [`Series`].
//!
//! Filtering happens before deduplication, so a rejected record never
//! shadows an accepted one on the same date.

use water_norms_series_models::{Qualifiers, Series, SeriesKind, TimeSeriesPoint};

use crate::SourceError;
use crate::records::RawRecord;

/// The quality label Hub'Eau gives to validated groundwater measurements.
pub const CORRECT_QUALITY: &str = "Correcte";

/// Keeps only records whose quality label is one of `accepted`.
///
/// Records without a quality label never pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityFilter {
    accepted: Vec<String>,
}

impl QualityFilter {
    /// Accepts a single label.
    #[must_use]
    pub fn only(label: impl Into<String>) -> Self {
        Self {
            accepted: vec![label.into()],
        }
    }

    /// Accepts any of `labels`.
    #[must_use]
    pub fn any_of<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// The filter applied to `kind` unless configured otherwise.
    /// Discharge series are taken as published.
    #[must_use]
    pub fn default_for(kind: SeriesKind) -> Option<Self> {
        match kind {
            SeriesKind::Discharge => None,
            SeriesKind::GroundwaterLevel => Some(Self::only(CORRECT_QUALITY)),
        }
    }

    #[must_use]
    pub fn accepts(&self, qualifiers: &Qualifiers) -> bool {
        qualifiers
            .quality
            .as_deref()
            .is_some_and(|q| self.accepted.iter().any(|a| a == q))
    }
}

/// Filters, deduplicates (first occurrence wins) and sorts `records`.
///
/// Applying it to its own output changes nothing.
#[must_use]
pub fn normalize(records: Vec<RawRecord>, filter: Option<&QualityFilter>) -> Series {
    let points: Vec<TimeSeriesPoint> = records
        .into_iter()
        .filter(|r| filter.is_none_or(|f| f.accepts(&r.qualifiers)))
        .map(TimeSeriesPoint::from)
        .collect();

    Series::from_points(points)
}

/// Like [`normalize`], but an empty result is an error.
///
/// # Errors
///
/// Returns [`SourceError::EmptyInput`] if no record survives filtering.
pub fn normalize_required(
    entity_id: &str,
    records: Vec<RawRecord>,
    filter: Option<&QualityFilter>,
) -> Result<Series, SourceError> {
    let series = normalize(records, filter);
    if series.is_empty() {
        return Err(SourceError::EmptyInput {
            entity_id: entity_id.to_string(),
        });
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, value: f64, quality: Option<&str>) -> RawRecord {
        RawRecord {
            date,
            value: Some(value),
            qualifiers: Qualifiers {
                status: None,
                method: None,
                quality: quality.map(str::to_string),
            },
        }
    }

    #[test]
    fn sorts_and_keeps_first_duplicate() {
        let records = vec![
            record(day(2020, 1, 3), 3.0, None),
            record(day(2020, 1, 1), 1.0, None),
            record(day(2020, 1, 3), 99.0, None),
            record(day(2020, 1, 2), 2.0, None),
        ];
        let series = normalize(records, None);
        let values: Vec<f64> = series.values().map(|(_, v)| v).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert!(series.points().windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let records = vec![
            record(day(2001, 5, 1), 5.0, Some("Correcte")),
            record(day(2000, 5, 1), 4.0, Some("Correcte")),
            record(day(2000, 5, 1), 8.0, Some("Correcte")),
        ];
        let once = normalize(records, None);
        let again = normalize(
            once.points().iter().cloned().map(RawRecord::from).collect(),
            None,
        );
        assert_eq!(once, again);
    }

    #[test]
    fn quality_filter_runs_before_dedup() {
        let records = vec![
            record(day(2020, 1, 1), 1.0, Some("Incorrecte")),
            record(day(2020, 1, 1), 2.0, Some("Correcte")),
            record(day(2020, 1, 2), 3.0, None),
        ];
        let filter = QualityFilter::default_for(SeriesKind::GroundwaterLevel);
        let series = normalize(records, filter.as_ref());
        assert_eq!(series.len(), 1);
        assert_eq!(series.value_on(day(2020, 1, 1)), Some(2.0));
    }

    #[test]
    fn any_of_accepts_each_label() {
        let filter = QualityFilter::any_of(["Correcte", "Douteuse"]);
        let q = |s: &str| Qualifiers {
            status: None,
            method: None,
            quality: Some(s.to_string()),
        };
        assert!(filter.accepts(&q("Douteuse")));
        assert!(!filter.accepts(&q("Incorrecte")));
        assert!(!filter.accepts(&Qualifiers::none()));
    }

    #[test]
    fn discharge_has_no_default_filter() {
        assert!(QualityFilter::default_for(SeriesKind::Discharge).is_none());
    }

    #[test]
    fn required_rejects_empty_result() {
        let records = vec![record(day(2020, 1, 1), 1.0, Some("Incorrecte"))];
        let filter = QualityFilter::only(CORRECT_QUALITY);
        let err = normalize_required("BSS001", records, Some(&filter)).unwrap_err();
        assert!(matches!(err, SourceError::EmptyInput { entity_id } if entity_id == "BSS001"));
    }
}
