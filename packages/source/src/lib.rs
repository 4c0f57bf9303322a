#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Time series ingestion from the Hub'Eau paginated JSON service.
//!
//! [`fetcher::PaginatedFetcher`] follows the service's `next` pointers
//! with a per-page retry budget, [`records`] turns raw JSON records into
//! typed [`records::RawRecord`]s, and [`normalize`] builds the canonical
//! [`Series`](water_norms_series_models::Series).

pub mod endpoint;
pub mod fetcher;
pub mod normalize;
pub mod progress;
pub mod records;
pub mod retry;
pub mod transport;

use water_norms_series_models::{DateRange, SeriesKind};

/// Errors that can occur while setting up a fetch or building a series.
///
/// Transport failures are not part of this enum: they are absorbed by the
/// fetch retry loop and reported through
/// [`fetcher::FetchStatus::Partial`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint URL could not be built.
    #[error("Invalid endpoint URL: {message}")]
    Url {
        /// Description of what went wrong.
        message: String,
    },

    /// Nothing was left after filtering and the caller required data.
    #[error("No usable records for {entity_id}")]
    EmptyInput {
        /// Station the records belonged to.
        entity_id: String,
    },
}

/// A recoverable failure of a single page request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// No connection could be established.
    #[error("connection failed: {0}")]
    ConnectionFailure(String),

    /// Any other failure (bad status, undecodable body, ...).
    #[error("request failed: {0}")]
    Unclassified(String),
}

/// What to fetch: one station's series, optionally bounded in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    /// Quantity (and therefore endpoint) to query.
    pub kind: SeriesKind,
    /// Site code or BSS code.
    pub entity_id: String,
    /// Optional date bounds.
    pub range: DateRange,
}

impl SeriesRequest {
    /// Requests the full history of `entity_id`.
    #[must_use]
    pub fn new(kind: SeriesKind, entity_id: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            range: DateRange::unbounded(),
        }
    }

    /// Restricts the request to `range`.
    #[must_use]
    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }
}
