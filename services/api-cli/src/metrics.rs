//! Prometheus metrics exposition
//!
//! The client crates emit through the `metrics` facade; this installs the
//! recorder so `--metrics` can print the text exposition after a command.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// `api_refresh_waiters` gets explicit buckets so it renders as a histogram
/// rather than the default summary.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("api_refresh_waiters".to_string()),
            &[0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0],
        )
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}
