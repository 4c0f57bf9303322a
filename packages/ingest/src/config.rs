//! TOML run configuration.
//!
//! ```toml
//! [fetch]
//! timeout_secs = 60
//! max_attempts = 1
//!
//! [reference]
//! percentiles = [0.95, 0.8, 0.5, 0.2, 0.05]
//! window = { type = "before_year", cutoff = 2010, min_span_years = 10 }
//!
//! [[stations]]
//! id = "07548X0009/F"
//! kind = "groundwater_level"
//! group = "Nappe du Dogger"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use water_norms_series_models::{HistoricalWindow, StationMetadata};
use water_norms_source::endpoint::DEFAULT_BASE_URL;
use water_norms_source::fetcher::{DEFAULT_PAGE_SIZE, FetchConfig};
use water_norms_stats::{CompositeStrategy, DistributionModel};

use crate::IngestError;

/// Percentile levels computed when none are configured.
pub const DEFAULT_PERCENTILES: [f64; 5] = [0.95, 0.8, 0.5, 0.2, 0.05];

/// Stations fetched at the same time when not configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Past years overlaid on the focus year when not configured.
pub const DEFAULT_PAST_YEARS: u32 = 4;

/// The `[fetch]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// Failures tolerated per page before the fetch is cut short.
    pub max_attempts: u32,
    pub page_size: u32,
    /// Delay before the first retry, doubled on each further failure.
    pub retry_backoff_ms: u64,
    /// Stations fetched concurrently.
    pub concurrency: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        let fetch = FetchConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: fetch.timeout.as_secs(),
            max_attempts: fetch.max_attempts,
            page_size: DEFAULT_PAGE_SIZE,
            retry_backoff_ms: u64::try_from(fetch.retry_backoff.as_millis()).unwrap_or(u64::MAX),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl FetchSettings {
    /// Converts to the fetcher's units.
    #[must_use]
    pub fn to_fetch_config(&self) -> FetchConfig {
        FetchConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
            page_size: self.page_size,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// The `[reference]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReferenceSettings {
    /// Levels in `(0, 1)`, in column order.
    pub percentiles: Vec<f64>,
    pub window: HistoricalWindow,
    /// Overrides the per-kind model (log-normal for discharge, Gumbel for
    /// groundwater levels).
    pub model: Option<DistributionModel>,
    /// How group members are rescaled before averaging.
    pub composite: CompositeStrategy,
    /// Year drawn as the current trajectory. Defaults to the last year of
    /// each series.
    pub focus_year: Option<i32>,
    pub past_years: u32,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            window: HistoricalWindow::All,
            model: None,
            composite: CompositeStrategy::Standardize,
            focus_year: None,
            past_years: DEFAULT_PAST_YEARS,
        }
    }
}

/// A whole run: fetch settings, reference settings and stations.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub fetch: FetchSettings,
    pub reference: ReferenceSettings,
    pub stations: Vec<StationMetadata>,
}

impl PipelineConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if `s` is not valid TOML or does not
    /// match the expected shape.
    pub fn from_toml_str(s: &str) -> Result<Self, IngestError> {
        Ok(toml::de::from_str(s)?)
    }

    /// Reads and parses the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Io`] if the file cannot be read, or
    /// [`IngestError::Config`] if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        log::info!(
            "Loaded {} stations from {}",
            config.stations.len(),
            path.display()
        );
        Ok(config)
    }

    /// Stations whose id is in `ids`, or all stations if `ids` is `None`.
    /// Unknown ids are logged and ignored.
    #[must_use]
    pub fn select_stations(&self, ids: Option<&[String]>) -> Vec<StationMetadata> {
        let Some(ids) = ids else {
            return self.stations.clone();
        };

        for id in ids {
            if !self.stations.iter().any(|s| &s.id == id) {
                log::warn!("Unknown station '{id}', skipping");
            }
        }

        self.stations
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use water_norms_series_models::SeriesKind;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.fetch.timeout_secs, 60);
        assert_eq!(config.fetch.max_attempts, 1);
        assert_eq!(config.fetch.page_size, 5000);
        assert_eq!(config.reference.percentiles, DEFAULT_PERCENTILES.to_vec());
        assert_eq!(config.reference.window, HistoricalWindow::All);
        assert!(config.stations.is_empty());

        let fetch = config.fetch.to_fetch_config();
        assert_eq!(fetch, FetchConfig::default());
    }

    #[test]
    fn parses_full_document() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [fetch]
            base_url = "https://example.org/api"
            timeout_secs = 5
            max_attempts = 3
            retry_backoff_ms = 0

            [reference]
            percentiles = [0.9, 0.1]
            window = { type = "period", min_year = 1990, max_year = 2020 }
            model = "extreme_value_moment"
            composite = "normalize"
            focus_year = 2023

            [[stations]]
            id = "07548X0009/F"
            kind = "groundwater_level"
            title = "Vienne - Poitiers"
            group = "Dogger"
            thresholds = { seuil_alerte = 95.2, seuil_crise = 93.0 }

            [[stations]]
            id = "L0010610"
            kind = "discharge"
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.to_fetch_config().timeout, Duration::from_secs(5));
        assert_eq!(config.fetch.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(
            config.reference.window,
            HistoricalWindow::Period {
                min_year: 1990,
                max_year: 2020
            }
        );
        assert_eq!(config.reference.model, Some(DistributionModel::ExtremeValueMoment));
        assert_eq!(config.reference.composite, CompositeStrategy::Normalize);
        assert_eq!(config.reference.past_years, DEFAULT_PAST_YEARS);

        let piezo = &config.stations[0];
        assert_eq!(piezo.kind, SeriesKind::GroundwaterLevel);
        assert_eq!(piezo.group.as_deref(), Some("Dogger"));
        assert_eq!(piezo.thresholds.get("seuil_crise"), Some(&93.0));

        let hydro = &config.stations[1];
        assert_eq!(hydro.kind, SeriesKind::Discharge);
        assert_eq!(hydro.display_title(), "L0010610");
        assert!(hydro.thresholds.is_empty());
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = PipelineConfig::from_toml_str(
            r#"
            [[stations]]
            id = "X"
            kind = "rainfall"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(PipelineConfig::from_toml_str("[fetch]\ntimeout = 3\n").is_err());
    }

    #[test]
    fn selects_requested_stations_in_config_order() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [[stations]]
            id = "A"
            kind = "discharge"
            [[stations]]
            id = "B"
            kind = "discharge"
            [[stations]]
            id = "C"
            kind = "discharge"
            "#,
        )
        .unwrap();

        let ids = vec!["C".to_string(), "A".to_string(), "Z".to_string()];
        let selected: Vec<String> = config
            .select_stations(Some(&ids))
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(selected, vec!["A", "C"]);
        assert_eq!(config.select_stations(None).len(), 3);
    }
}
