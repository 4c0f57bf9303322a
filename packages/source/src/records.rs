//! Typed decoding of raw Hub'Eau records.
//!
//! Each endpoint names its fields differently; this module is the only
//! place that knows those names.

use chrono::NaiveDate;
use serde::Deserialize;
use water_norms_series_models::{Qualifiers, SeriesKind, TimeSeriesPoint};

/// A raw record decoded into typed fields, before filtering and
/// deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Measurement date.
    pub date: NaiveDate,
    /// Measured value, if any.
    pub value: Option<f64>,
    /// Provider labels.
    pub qualifiers: Qualifiers,
}

impl From<RawRecord> for TimeSeriesPoint {
    fn from(record: RawRecord) -> Self {
        Self {
            date: record.date,
            value: record.value,
            qualifiers: record.qualifiers,
        }
    }
}

impl From<TimeSeriesPoint> for RawRecord {
    fn from(point: TimeSeriesPoint) -> Self {
        Self {
            date: point.date,
            value: point.value,
            qualifiers: point.qualifiers,
        }
    }
}

/// `hydrometrie/obs_elab` record.
#[derive(Debug, Deserialize)]
struct ElaboratedObservation {
    date_obs_elab: Option<String>,
    resultat_obs_elab: Option<f64>,
    libelle_statut: Option<String>,
    libelle_methode: Option<String>,
    libelle_qualification: Option<String>,
}

/// `niveaux_nappes/chroniques` record.
#[derive(Debug, Deserialize)]
struct GroundwaterMeasurement {
    date_mesure: Option<String>,
    niveau_nappe_eau: Option<f64>,
    statut: Option<String>,
    mode_obtention: Option<String>,
    qualification: Option<String>,
}

/// Parses the leading `YYYY-MM-DD` of a date or timestamp field.
fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

/// Decodes one record of `kind`. Returns `None` if the record is not an
/// object of the expected shape or has no parseable date.
#[must_use]
pub fn parse_record(kind: SeriesKind, record: &serde_json::Value) -> Option<RawRecord> {
    match kind {
        SeriesKind::Discharge => {
            let obs = ElaboratedObservation::deserialize(record).ok()?;
            Some(RawRecord {
                date: parse_day(obs.date_obs_elab.as_deref()?)?,
                value: obs.resultat_obs_elab,
                qualifiers: Qualifiers {
                    status: obs.libelle_statut,
                    method: obs.libelle_methode,
                    quality: obs.libelle_qualification,
                },
            })
        }
        SeriesKind::GroundwaterLevel => {
            let m = GroundwaterMeasurement::deserialize(record).ok()?;
            Some(RawRecord {
                date: parse_day(m.date_mesure.as_deref()?)?,
                value: m.niveau_nappe_eau,
                qualifiers: Qualifiers {
                    status: m.statut,
                    method: m.mode_obtention,
                    quality: m.qualification,
                },
            })
        }
    }
}

/// Decodes a batch of records, skipping (and counting) undecodable ones.
#[must_use]
pub fn parse_records(kind: SeriesKind, label: &str, records: &[serde_json::Value]) -> Vec<RawRecord> {
    let parsed: Vec<RawRecord> = records
        .iter()
        .filter_map(|r| parse_record(kind, r))
        .collect();

    let skipped = records.len() - parsed.len();
    if skipped > 0 {
        log::warn!("[{label}] Skipped {skipped} of {} records without a usable date", records.len());
    }

    parsed
}
