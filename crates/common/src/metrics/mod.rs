//! Metrics and observability utilities.
//!
//! Prometheus-style counters/histograms with SLO-aligned buckets, following
//! the teacher's naming conventions but re-keyed to the feed engine's hot
//! paths: poll ticks, processor tasks, upserts, searches, rewrites, and
//! fan-out search.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use crate::errors::{AppError, Result};

pub const METRICS_PREFIX: &str = "feedengine";

/// Installs the process-wide Prometheus recorder and starts its own
/// `/metrics` HTTP listener on `port` (no axum/tower router involved — this
/// workspace has no other HTTP surface, so the exporter's standalone
/// listener is the whole story). Call once per binary, before
/// [`register_metrics`].
pub fn install_exporter(port: u16) -> Result<()> {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::Configuration { message: format!("failed to install prometheus exporter: {e}") })?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

/// SLO-aligned latency buckets (seconds) for DB/search operations.
pub const LATENCY_BUCKETS: &[f64] =
    &[0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00];

/// Buckets for LLM/embedding calls, which run much slower.
pub const LLM_BUCKETS: &[f64] = &[0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 30.00];

pub fn register_metrics() {
    describe_counter!(
        format!("{METRICS_PREFIX}_poll_ticks_total"),
        Unit::Count,
        "Total source poll ticks executed"
    );
    describe_counter!(
        format!("{METRICS_PREFIX}_activities_dispatched_total"),
        Unit::Count,
        "Activities handed to the processor pool"
    );
    describe_counter!(
        format!("{METRICS_PREFIX}_activities_dropped_total"),
        Unit::Count,
        "Activities dropped after a poll-loop error"
    );
    describe_histogram!(
        format!("{METRICS_PREFIX}_processor_task_duration_seconds"),
        Unit::Seconds,
        "Activity processor task latency"
    );
    describe_counter!(
        format!("{METRICS_PREFIX}_processor_outcomes_total"),
        Unit::Count,
        "Processor task outcomes (written/skipped/error)"
    );
    describe_histogram!(
        format!("{METRICS_PREFIX}_upsert_duration_seconds"),
        Unit::Seconds,
        "Activity store upsert latency"
    );
    describe_histogram!(
        format!("{METRICS_PREFIX}_search_duration_seconds"),
        Unit::Seconds,
        "Activity store search latency by sort mode"
    );
    describe_histogram!(
        format!("{METRICS_PREFIX}_rewrite_duration_seconds"),
        Unit::Seconds,
        "Query rewrite latency"
    );
    describe_gauge!(
        format!("{METRICS_PREFIX}_rewrite_topic_count"),
        Unit::Count,
        "Number of topics produced by the last rewrite"
    );
    describe_histogram!(
        format!("{METRICS_PREFIX}_fanout_search_duration_seconds"),
        Unit::Seconds,
        "Feed planner fan-out search latency by path (rewrite/diversity)"
    );
    describe_counter!(
        format!("{METRICS_PREFIX}_topic_summary_cache_total"),
        Unit::Count,
        "Topic summary cache hits/misses"
    );

    tracing::info!("metrics registered");
}

/// Simple stopwatch; callers pick which histogram to record into once the
/// span completes (mirrors the teacher's `RequestMetrics::start`/`finish`
/// pattern).
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

pub fn record_processor_duration(duration_secs: f64, outcome: &str) {
    histogram!(format!("{METRICS_PREFIX}_processor_task_duration_seconds"), "outcome" => outcome.to_string())
        .record(duration_secs);
}

pub fn record_upsert_duration(duration_secs: f64) {
    histogram!(format!("{METRICS_PREFIX}_upsert_duration_seconds")).record(duration_secs);
}

pub fn record_rewrite(duration_secs: f64, topic_count: usize) {
    histogram!(format!("{METRICS_PREFIX}_rewrite_duration_seconds")).record(duration_secs);
    gauge!(format!("{METRICS_PREFIX}_rewrite_topic_count")).set(topic_count as f64);
}

pub fn record_fanout_search(duration_secs: f64, path: &str) {
    histogram!(format!("{METRICS_PREFIX}_fanout_search_duration_seconds"), "path" => path.to_string())
        .record(duration_secs);
}

pub fn record_poll_tick(source_type: &str) {
    counter!(format!("{METRICS_PREFIX}_poll_ticks_total"), "source_type" => source_type.to_string())
        .increment(1);
}

pub fn record_processor_outcome(outcome: &str) {
    counter!(format!("{METRICS_PREFIX}_processor_outcomes_total"), "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_search(duration_secs: f64, sort_mode: &str, result_count: usize) {
    histogram!(format!("{METRICS_PREFIX}_search_duration_seconds"), "sort_mode" => sort_mode.to_string())
        .record(duration_secs);
    gauge!(format!("{METRICS_PREFIX}_search_results_count"), "sort_mode" => sort_mode.to_string())
        .set(result_count as f64);
}

pub fn record_cache(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!(format!("{METRICS_PREFIX}_topic_summary_cache_total"), "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_buckets_are_sorted() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }
}
