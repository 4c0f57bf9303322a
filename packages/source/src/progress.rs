//! Progress reporting for fetches and batch runs.
//!
//! The fetcher advances a [`ProgressCallback`] by the number of records in
//! each page; the batch runner advances it once per finished station. How
//! that is rendered is left to the binary.

use std::sync::Arc;

/// Receives progress updates. Shared across concurrent station tasks.
pub trait ProgressCallback: Send + Sync {
    /// Sets the expected number of units, when known.
    fn set_total(&self, total: u64);

    /// Advances by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the status message.
    fn set_message(&self, msg: String);

    /// Marks the work as done, leaving `msg` visible.
    fn finish(&self, msg: String);

    /// Marks the work as done and removes the indicator.
    fn finish_and_clear(&self);
}

/// Discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// A shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
