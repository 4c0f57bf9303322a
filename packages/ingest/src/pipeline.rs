//! Per-station pipelines and the group barrier.
//!
//! Every station runs fetch, parse, normalize, reference curve and
//! alignment independently. Only once all of them have finished are the
//! grouped stations combined into composites.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt as _};
use water_norms_series_models::{
    AlignedSeries, HistoricalWindow, PercentileLevel, ReferenceCurve, Series, SeriesKind,
    StationMetadata,
};
use water_norms_source::fetcher::{FetchStatus, PaginatedFetcher};
use water_norms_source::normalize::{QualityFilter, normalize_required};
use water_norms_source::progress::ProgressCallback;
use water_norms_source::records::parse_records;
use water_norms_source::transport::PageTransport;
use water_norms_source::SeriesRequest;
use water_norms_stats::{
    CompositeStrategy, DistributionModel, ReferenceOutcome, align, combine,
    compute_reference_curve,
};

use crate::IngestError;
use crate::config::ReferenceSettings;

/// The model used for `kind` when none is configured.
#[must_use]
pub const fn default_model(kind: SeriesKind) -> DistributionModel {
    match kind {
        SeriesKind::Discharge => DistributionModel::LogNormal,
        SeriesKind::GroundwaterLevel => DistributionModel::ExtremeValueMoment,
    }
}

/// A series with its reference curve and daily calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub series: Series,
    pub reference: ReferenceOutcome,
    /// `series` laid over the reference calendar.
    pub aligned: AlignedSeries,
}

impl ChartData {
    /// Computes the curve of `series` and aligns it.
    ///
    /// When the window is not satisfied the calendar is still built, with
    /// every reference value missing.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Stats`] if a percentile level is invalid.
    pub fn compute(
        series: Series,
        window: HistoricalWindow,
        levels: &[f64],
        model: DistributionModel,
    ) -> Result<Self, IngestError> {
        let reference = compute_reference_curve(&series, window, levels, model)?;

        let aligned = match &reference {
            ReferenceOutcome::Available(curve) => align(&series, curve),
            ReferenceOutcome::Unavailable(_) => {
                // Levels were validated by compute_reference_curve.
                let levels = levels
                    .iter()
                    .filter_map(|&p| PercentileLevel::new(p).ok())
                    .collect();
                align(&series, &ReferenceCurve::new(levels))
            }
        };

        Ok(Self {
            series,
            reference,
            aligned,
        })
    }
}

/// A station's results.
#[derive(Debug, Clone, PartialEq)]
pub struct StationOutput {
    /// How fetching ended. A partial fetch still yields a chart.
    pub fetch: FetchStatus,
    pub chart: ChartData,
}

impl StationOutput {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.fetch, FetchStatus::Complete { .. })
    }
}

/// What happened to one configured station.
#[derive(Debug)]
pub struct StationReport {
    pub station: StationMetadata,
    pub outcome: Result<StationOutput, IngestError>,
}

/// The composite of one group.
#[derive(Debug)]
pub struct CompositeReport {
    /// Group name.
    pub group: String,
    /// Ids of the members that contributed a series.
    pub members: Vec<String>,
    /// Whether every member was fetched completely.
    pub complete: bool,
    pub outcome: Result<ChartData, IngestError>,
}

/// Everything a batch run produced.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One report per station, in input order.
    pub stations: Vec<StationReport>,
    /// One report per group, ordered by group name.
    pub composites: Vec<CompositeReport>,
}

impl BatchReport {
    /// Stations that produced no output.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.stations.iter().filter(|r| r.outcome.is_err()).count()
    }

    /// Stations whose output rests on a truncated fetch.
    #[must_use]
    pub fn partial(&self) -> usize {
        self.stations
            .iter()
            .filter(|r| r.outcome.as_ref().is_ok_and(|o| !o.is_complete()))
            .count()
    }
}

/// Fetches, normalizes and analyses one station.
///
/// Transport failures only shorten the series; the fetch status records
/// them.
///
/// # Errors
///
/// * [`IngestError::Source`] if the request URL cannot be built or no
///   usable record was received
/// * [`IngestError::Stats`] if a percentile level is invalid
pub async fn run_station<T: PageTransport>(
    fetcher: &PaginatedFetcher<T>,
    station: &StationMetadata,
    settings: &ReferenceSettings,
) -> Result<StationOutput, IngestError> {
    let label = station.id.as_str();
    let request = SeriesRequest::new(station.kind, station.id.clone());
    let fetched = fetcher.fetch(&request).await?;

    if let FetchStatus::Partial { last_error, .. } = &fetched.status {
        log::warn!("[{label}] Series is incomplete: {last_error}");
    }

    let records = parse_records(station.kind, label, &fetched.records);
    let filter = QualityFilter::default_for(station.kind);
    let series = normalize_required(label, records, filter.as_ref())?;

    log::info!(
        "[{label}] {} days from {} to {}",
        series.len(),
        series.first_year().unwrap_or_default(),
        series.last_year().unwrap_or_default()
    );

    let model = settings.model.unwrap_or_else(|| default_model(station.kind));
    let chart = ChartData::compute(series, settings.window, &settings.percentiles, model)?;

    if let ReferenceOutcome::Unavailable(insufficient) = &chart.reference {
        log::warn!("[{label}] No reference curve: {insufficient}");
    }

    Ok(StationOutput {
        fetch: fetched.status,
        chart,
    })
}

/// Combines one group's member series into a composite with its own
/// Gumbel curve over the whole history.
///
/// # Errors
///
/// Returns [`IngestError::Stats`] if a percentile level is invalid.
pub fn run_composite(
    members: &[&Series],
    strategy: CompositeStrategy,
    levels: &[f64],
) -> Result<ChartData, IngestError> {
    let index = combine(members, strategy);
    ChartData::compute(
        index,
        HistoricalWindow::All,
        levels,
        DistributionModel::ExtremeValueMoment,
    )
}

/// Runs every station with at most `concurrency` in flight, then builds
/// one composite per group from the stations that succeeded.
///
/// A failing station is reported and does not affect the others.
pub async fn run_batch<T: PageTransport>(
    fetcher: &PaginatedFetcher<T>,
    stations: &[StationMetadata],
    settings: &ReferenceSettings,
    concurrency: usize,
    progress: &Arc<dyn ProgressCallback>,
) -> BatchReport {
    progress.set_total(stations.len() as u64);

    let mut results: Vec<(usize, StationReport)> =
        stream::iter(stations.iter().enumerate().map(|(i, station)| async move {
            let outcome = run_station(fetcher, station, settings).await;
            if let Err(e) = &outcome {
                log::error!("[{}] Failed: {e}", station.id);
            }
            progress.set_message(station.id.clone());
            progress.inc(1);
            (
                i,
                StationReport {
                    station: station.clone(),
                    outcome,
                },
            )
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(i, _)| *i);
    let stations: Vec<StationReport> = results.into_iter().map(|(_, r)| r).collect();

    let composites = build_composites(&stations, settings);

    let failed = stations.iter().filter(|r| r.outcome.is_err()).count();
    progress.finish(format!("{} stations, {failed} failed", stations.len()));

    BatchReport {
        stations,
        composites,
    }
}

fn build_composites(stations: &[StationReport], settings: &ReferenceSettings) -> Vec<CompositeReport> {
    let mut groups: BTreeMap<&str, Vec<(&str, &StationOutput)>> = BTreeMap::new();
    for report in stations {
        let (Some(group), Ok(output)) = (report.station.group.as_deref(), &report.outcome) else {
            continue;
        };
        groups
            .entry(group)
            .or_default()
            .push((report.station.id.as_str(), output));
    }

    groups
        .into_iter()
        .map(|(group, members)| {
            log::info!("[{group}] Combining {} series", members.len());
            let series: Vec<&Series> = members.iter().map(|(_, o)| &o.chart.series).collect();
            let outcome = run_composite(&series, settings.composite, &settings.percentiles);
            CompositeReport {
                group: group.to_string(),
                members: members.iter().map(|(id, _)| (*id).to_string()).collect(),
                complete: members.iter().all(|(_, o)| o.is_complete()),
                outcome,
            }
        })
        .collect()
}
