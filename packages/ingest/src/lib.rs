#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch computation of reference curves for configured Hub'Eau stations.
//!
//! [`config`] loads stations and settings from TOML, [`pipeline`] fetches
//! and analyses every station concurrently before combining groups into
//! composites, and [`export`] writes the tables and chart requests the
//! renderer consumes.

pub mod config;
pub mod export;
pub mod pipeline;

use water_norms_source::SourceError;
use water_norms_stats::StatsError;

/// Errors raised while configuring, running or exporting a batch.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The configuration file is not valid TOML or has the wrong shape.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Fetching or normalizing a series failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A reference curve could not be computed.
    #[error(transparent)]
    Stats(#[from] StatsError),
}
