//! Paginated fetching with a per-page retry budget.
//!
//! Pages are requested one after another, following each page's `next`
//! pointer. A failed page is retried up to
//! [`FetchConfig::max_attempts`] times; once the budget is exhausted the
//! records gathered so far are returned as a
//! [`FetchStatus::Partial`] outcome instead of an error.

use std::sync::Arc;
use std::time::Duration;

use crate::endpoint::{DEFAULT_BASE_URL, first_page_url};
use crate::progress::{ProgressCallback, null_progress};
use crate::retry::{DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::transport::{HttpTransport, PageTransport};
use crate::{SeriesRequest, SourceError, TransportError};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 5000;

/// Fetch settings shared by all stations of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Failures tolerated per page.
    pub max_attempts: u32,
    /// Records per page.
    pub page_size: u32,
    /// Base delay between retries of the same page.
    pub retry_backoff: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            page_size: DEFAULT_PAGE_SIZE,
            retry_backoff: DEFAULT_BACKOFF,
        }
    }
}

impl FetchConfig {
    /// The per-page retry budget described by this config.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_backoff)
    }
}

/// Whether the feed was followed to its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// The last page (no `next`) was reached.
    Complete {
        /// Pages received.
        pages: u32,
    },
    /// A page kept failing and fetching stopped early.
    Partial {
        /// Pages received before giving up.
        pages: u32,
        /// The page that could not be fetched.
        failed_target: String,
        /// The last failure on that page.
        last_error: TransportError,
    },
}

impl FetchStatus {
    /// Pages received, whether or not the feed was finished.
    #[must_use]
    pub const fn pages(&self) -> u32 {
        match self {
            Self::Complete { pages } | Self::Partial { pages, .. } => *pages,
        }
    }
}

/// Records of every received page, in page order, and how fetching ended.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Raw records, not yet parsed.
    pub records: Vec<serde_json::Value>,
    pub status: FetchStatus,
}

impl FetchOutcome {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.status, FetchStatus::Complete { .. })
    }
}

/// Follows a paginated feed to its end, or until a page exhausts its
/// retry budget.
pub struct PaginatedFetcher<T: PageTransport = HttpTransport> {
    transport: T,
    config: FetchConfig,
    progress: Arc<dyn ProgressCallback>,
}

impl PaginatedFetcher<HttpTransport> {
    /// Creates a fetcher over HTTP using `config.timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn http(config: FetchConfig) -> Result<Self, SourceError> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::new(transport, config))
    }
}

impl<T: PageTransport> PaginatedFetcher<T> {
    /// Creates a fetcher over any transport, without progress reporting.
    #[must_use]
    pub fn new(transport: T, config: FetchConfig) -> Self {
        Self {
            transport,
            config,
            progress: null_progress(),
        }
    }

    /// Reports received records to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Settings this fetcher was built with.
    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches every page of `request`.
    ///
    /// Transport failures never surface as errors: they are retried and,
    /// past the budget, end the fetch with [`FetchStatus::Partial`].
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Url`] if the first page URL cannot be built.
    pub async fn fetch(&self, request: &SeriesRequest) -> Result<FetchOutcome, SourceError> {
        let label = request.entity_id.as_str();
        let policy = self.config.retry_policy();
        let mut target = first_page_url(&self.config.base_url, request, self.config.page_size)?;

        log::info!("[{label}] Fetching {} from {target}", request.kind);

        let mut records = Vec::new();
        let mut pages: u32 = 0;
        let mut failures: u32 = 0;

        loop {
            match self.transport.get_page(&target).await {
                Ok(page) => {
                    failures = 0;
                    pages += 1;
                    let count = page.data.len();
                    records.extend(page.data);
                    self.progress.inc(count as u64);

                    log::debug!(
                        "[{label}] Page {pages}: {count} records (total: {})",
                        records.len()
                    );

                    match page.next {
                        Some(next) if !next.is_empty() => target = next,
                        _ => break,
                    }
                }
                Err(e) => {
                    failures += 1;
                    if matches!(e, TransportError::Timeout(_)) {
                        log::warn!(
                            "[{label}] Page {} timed out after {:?} (failure {failures})",
                            pages + 1,
                            self.config.timeout
                        );
                    } else {
                        log::warn!(
                            "[{label}] Page {} failed (failure {failures}): {e}",
                            pages + 1
                        );
                    }

                    if policy.exhausted(failures) {
                        log::error!(
                            "[{label}] Giving up after {failures} failures; keeping {} records from {pages} pages",
                            records.len()
                        );
                        return Ok(FetchOutcome {
                            records,
                            status: FetchStatus::Partial {
                                pages,
                                failed_target: target,
                                last_error: e,
                            },
                        });
                    }

                    let delay = policy.delay(failures);
                    if !delay.is_zero() {
                        log::info!("[{label}] Retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        log::info!("[{label}] Fetched {} records in {pages} pages", records.len());

        Ok(FetchOutcome {
            records,
            status: FetchStatus::Complete { pages },
        })
    }
}
