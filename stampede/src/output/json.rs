use std::io::Write as _;
use std::sync::Arc;

use serde::Serialize;
use stampede_core::thresholds::ThresholdViolation;
use stampede_core::{ProgressFn, ProgressUpdate, RunSummary};
use stampede_metrics::HistogramSummary;

use super::OutputFormatter;
use crate::config::RunPlan;

/// NDJSON on stdout: one `progress` line per second, then one `summary` line.
pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _scenario: &str, _plan: &RunPlan) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(
        &self,
        summary: &RunSummary,
        violations: &[ThresholdViolation],
    ) -> anyhow::Result<()> {
        let line = build_summary_line(summary, violations);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub scenario: String,
    pub tick: u64,
    pub elapsed_secs: u64,
    pub duration_secs: u64,
    pub vus: u64,
    pub requests_per_sec: f64,
    pub requests_total: u64,
    pub iterations_total: u64,
    pub iterations_failed: u64,
    pub transport_errors_total: u64,
    pub checks_failed_total: u64,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        scenario: u.scenario.clone(),
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs(),
        duration_secs: u.duration.as_secs(),
        vus: u.vus,
        requests_per_sec: u.rps_now,
        requests_total: u.requests_total,
        iterations_total: u.iterations_total,
        iterations_failed: u.iterations_failed,
        transport_errors_total: u.transport_errors_total,
        checks_failed_total: u.checks_failed_total,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub scenario: String,
    pub vus: u64,
    pub elapsed_secs: f64,

    pub iterations_total: u64,
    pub iterations_failed: u64,
    pub requests_total: u64,
    pub requests_per_sec: f64,

    pub transport_errors_total: u64,
    pub transport_errors: Vec<JsonTransportErrors>,

    pub checks_passed_total: u64,
    pub checks_failed_total: u64,
    pub checks: Vec<JsonCheck>,

    pub latency: Option<JsonLatencySummary>,
    pub iteration_duration: Option<JsonLatencySummary>,
    pub requests: Vec<JsonRequest>,

    pub thresholds_failed: Vec<JsonThresholdViolation>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonTransportErrors {
    pub kind: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonCheck {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRequest {
    pub name: String,
    pub count: u64,
    pub latency: Option<JsonLatencySummary>,
}

/// Milliseconds.
#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub count: u64,
}

impl From<&HistogramSummary> for JsonLatencySummary {
    fn from(h: &HistogramSummary) -> Self {
        Self {
            p50: h.p50,
            p90: h.p90,
            p95: h.p95,
            p99: h.p99,
            min: h.min,
            max: h.max,
            mean: h.mean,
            stdev: h.stdev,
            count: h.count,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonThresholdViolation {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
}

fn build_summary_line(summary: &RunSummary, violations: &[ThresholdViolation]) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        scenario: summary.scenario.clone(),
        vus: summary.vus,
        elapsed_secs: summary.elapsed.as_secs_f64(),
        iterations_total: summary.iterations_total,
        iterations_failed: summary.iterations_failed,
        requests_total: summary.requests_total,
        requests_per_sec: summary.rps(),
        transport_errors_total: summary.transport_errors_total,
        transport_errors: summary
            .transport_errors_by_kind
            .iter()
            .map(|(kind, count)| JsonTransportErrors {
                kind: kind.clone(),
                count: *count,
            })
            .collect(),
        checks_passed_total: summary.checks_passed_total(),
        checks_failed_total: summary.checks_failed_total(),
        checks: summary
            .checks
            .iter()
            .map(|c| JsonCheck {
                name: c.name.clone(),
                passes: c.passes,
                fails: c.fails,
            })
            .collect(),
        latency: summary.latency.as_ref().map(JsonLatencySummary::from),
        iteration_duration: summary
            .iteration_duration
            .as_ref()
            .map(JsonLatencySummary::from),
        requests: summary
            .requests
            .iter()
            .map(|r| JsonRequest {
                name: r.name.clone(),
                count: r.count,
                latency: r.latency.as_ref().map(JsonLatencySummary::from),
            })
            .collect(),
        thresholds_failed: violations
            .iter()
            .map(|v| JsonThresholdViolation {
                metric: v.metric.clone(),
                expression: v.expression.clone(),
                observed: v.observed,
            })
            .collect(),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
