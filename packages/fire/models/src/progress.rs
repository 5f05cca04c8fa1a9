//! Progress reporting for long batch steps.
//!
//! Resolution and enrichment report through [`ProgressCallback`] so the
//! core crates never depend on a terminal backend. The CLI plugs in
//! `indicatif` bars; tests and library callers use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a batch step.
///
/// `Send + Sync` because enrichment reports from `rayon` worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Total units of work in this step.
    fn set_total(&self, total: u64);

    /// Advance by `delta` units.
    fn inc(&self, delta: u64);

    /// Replace the status message.
    fn set_message(&self, msg: String);

    /// Mark the step done with a final message.
    fn finish(&self, msg: String);
}

/// Discards all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Shared [`NullProgress`] handle.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
