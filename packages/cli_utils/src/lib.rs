#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the wildfire binaries.
//!
//! [`init_logger`] routes `log` output through an [`indicatif`]
//! [`MultiProgress`] so log lines never tear a progress bar, and
//! [`IndicatifProgress`] plugs those bars into the pipeline's
//! [`ProgressCallback`].

use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use wildfire_fire_models::progress::ProgressCallback;

pub use indicatif::{MultiProgress, ProgressDrawTarget};

/// An `indicatif` bar reporting one pipeline step.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied once the step reports its total.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// A spinner that turns into a bar with ETA when the step calls
    /// [`ProgressCallback::set_total`]. Used for detection and record
    /// loops whose size is only known once their input is loaded.
    #[must_use]
    pub fn records_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.red} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.red/dim} {pos}/{len} {percent}% [{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }

    /// A bar over the stages of a full run (load, resolve, filter, ...).
    #[must_use]
    pub fn stages_bar(multi: &MultiProgress, total: u64) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new(total));
        let bar_style = ProgressStyle::with_template(
            "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        bar.set_style(bar_style.clone());

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge`.
///
/// Every progress bar must be added to the returned [`MultiProgress`].
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A logger may already be installed in tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_bar_switches_to_known_length() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let progress = IndicatifProgress::records_bar(&multi, "Resolving");
        progress.set_total(10);
        progress.inc(4);
        progress.set_message("Resolving canonical fires".to_string());
        progress.finish("done".to_string());
    }

    #[test]
    fn stages_bar_counts_stages() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let stages = IndicatifProgress::stages_bar(&multi, 4);
        stages.set_message("Resolving".to_string());
        stages.inc(1);
        stages.inc(3);
        stages.finish("Run complete".to_string());
    }

    #[test]
    fn init_logger_is_idempotent() {
        let _first = init_logger();
        let _second = init_logger();
    }
}
