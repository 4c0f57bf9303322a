//! Output for the chart renderer.
//!
//! Each station or group produces `<name>.csv`, the 365-day aligned table
//! (`date,value,percentile_95,...`), and `<name>.json`, the
//! [`ChartRequest`] describing how to draw it.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Datelike as _;
use water_norms_series_models::{AlignedSeries, ChartRequest, StationMetadata};

use crate::IngestError;
use crate::config::ReferenceSettings;
use crate::pipeline::{BatchReport, ChartData};

/// A file-system-safe name for a station id or group name. BSS codes
/// contain `/`.
#[must_use]
pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Returns `stem`, or `stem_2`, `stem_3`, ... if it was already taken.
fn unique_stem(used: &mut HashSet<String>, name: &str, stem: String) -> String {
    if used.insert(stem.clone()) {
        return stem;
    }
    let unique = (2..)
        .map(|n| format!("{stem}_{n}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_default();
    log::warn!("[{name}] File name {stem} already used, writing {unique} instead");
    used.insert(unique.clone());
    unique
}

/// Builds the chart request for `chart`.
///
/// The focus year defaults to the last year of the aligned table.
/// `complete` tells the renderer whether the series was fully received.
#[must_use]
pub fn chart_request(
    title: &str,
    station: Option<&StationMetadata>,
    chart: &ChartData,
    settings: &ReferenceSettings,
    complete: bool,
) -> ChartRequest {
    let focus_year = settings
        .focus_year
        .or_else(|| chart.aligned.last_year())
        .unwrap_or_else(|| chrono::Utc::now().year());

    ChartRequest {
        title: title.to_string(),
        kind: station.map(|s| s.kind),
        reference_columns: chart.aligned.column_names(),
        thresholds: station.map(|s| s.thresholds.clone()).unwrap_or_default(),
        focus_year,
        past_years: settings.past_years,
        last_measurement: chart.series.last_observation_date(),
        complete,
    }
}

/// Writes `aligned` as CSV. Missing values are empty fields.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if the file cannot be created or written.
pub fn write_aligned_csv(path: &Path, aligned: &AlignedSeries) -> Result<(), IngestError> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["date".to_string(), "value".to_string()];
    header.extend(aligned.column_names());
    writer.write_record(&header)?;

    let field = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    for row in aligned.rows() {
        let mut record = Vec::with_capacity(2 + row.reference.len());
        record.push(row.date.format("%Y-%m-%d").to_string());
        record.push(field(row.observed));
        record.extend(row.reference.iter().copied().map(field));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes `<dir>/<stem>.csv` and `<dir>/<stem>.json`, returning both paths.
///
/// # Errors
///
/// Returns an [`IngestError`] if either file cannot be written.
pub fn export_chart(
    dir: &Path,
    stem: &str,
    chart: &ChartData,
    request: &ChartRequest,
) -> Result<(PathBuf, PathBuf), IngestError> {
    let csv_path = dir.join(format!("{stem}.csv"));
    let json_path = dir.join(format!("{stem}.json"));

    write_aligned_csv(&csv_path, &chart.aligned)?;
    fs::write(&json_path, serde_json::to_string_pretty(request)?)?;

    log::debug!("Wrote {} and {}", csv_path.display(), json_path.display());
    Ok((csv_path, json_path))
}

/// Exports every successful station and composite of `report` into `dir`,
/// creating it if needed. Returns the number of charts written.
///
/// Names that map to the same file stem get a numeric suffix, in report
/// order, so no chart overwrites another.
///
/// # Errors
///
/// Returns an [`IngestError`] on the first file that cannot be written.
pub fn export_batch(
    dir: &Path,
    report: &BatchReport,
    settings: &ReferenceSettings,
) -> Result<usize, IngestError> {
    fs::create_dir_all(dir)?;
    let mut written = 0;
    let mut used = HashSet::new();

    for station in &report.stations {
        let Ok(output) = &station.outcome else {
            continue;
        };
        let meta = &station.station;
        let request = chart_request(
            meta.display_title(),
            Some(meta),
            &output.chart,
            settings,
            output.is_complete(),
        );
        let stem = unique_stem(&mut used, &meta.id, file_stem(&meta.id));
        export_chart(dir, &stem, &output.chart, &request)?;
        written += 1;
    }

    for composite in &report.composites {
        let Ok(chart) = &composite.outcome else {
            continue;
        };
        let request = chart_request(&composite.group, None, chart, settings, composite.complete);
        let stem = unique_stem(
            &mut used,
            &composite.group,
            format!("group_{}", file_stem(&composite.group)),
        );
        export_chart(dir, &stem, chart, &request)?;
        written += 1;
    }

    log::info!("Exported {written} charts to {}", dir.display());
    Ok(written)
}

/// Threshold names across `stations`, for listing.
#[must_use]
pub fn threshold_names(stations: &[StationMetadata]) -> BTreeMap<&str, usize> {
    let mut names = BTreeMap::new();
    for name in stations.iter().flat_map(|s| s.thresholds.keys()) {
        *names.entry(name.as_str()).or_insert(0) += 1;
    }
    names
}
