use std::sync::Arc;
use std::time::Duration;

use stampede_metrics::{MetricId, MetricKind, Registry, TagSet};

use crate::http::{Error as HttpError, HttpResponse};

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const TRANSPORT_ERRORS: &str = "transport_errors";
pub const CHECKS: &str = "checks";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";

pub const TAG_SCENARIO: &str = "scenario";
pub const TAG_NAME: &str = "name";
pub const TAG_KIND: &str = "kind";
pub const TAG_STATUS: &str = "status";

pub const STATUS_OK: &str = "ok";
pub const STATUS_FAILED: &str = "failed";

/// Built-in metrics of a run, registered up front so thresholds can find them by name.
#[derive(Debug)]
pub struct RunMetrics {
    registry: Arc<Registry>,
    pub http_reqs: MetricId,
    pub http_req_duration: MetricId,
    pub http_req_failed: MetricId,
    pub transport_errors: MetricId,
    pub checks: MetricId,
    pub iterations: MetricId,
    pub iteration_duration: MetricId,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new(Arc::new(Registry::default()))
    }
}

impl RunMetrics {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            http_reqs: registry.register(HTTP_REQS, MetricKind::Counter),
            http_req_duration: registry.register(HTTP_REQ_DURATION, MetricKind::Histogram),
            http_req_failed: registry.register(HTTP_REQ_FAILED, MetricKind::Rate),
            transport_errors: registry.register(TRANSPORT_ERRORS, MetricKind::Counter),
            checks: registry.register(CHECKS, MetricKind::Rate),
            iterations: registry.register(ITERATIONS, MetricKind::Counter),
            iteration_duration: registry.register(ITERATION_DURATION, MetricKind::Histogram),
            registry,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Every call counts toward `http_reqs`. Only completed calls feed `http_req_duration`.
    pub fn record_request(
        &self,
        scenario: &str,
        name: &str,
        outcome: std::result::Result<&HttpResponse, &HttpError>,
    ) {
        let named = TagSet::new(&[(TAG_SCENARIO, scenario), (TAG_NAME, name)]);
        if let Some(h) = self.registry.get_handle(self.http_reqs, named.clone()) {
            h.increment(1);
        }

        let failed = self
            .registry
            .get_handle(self.http_req_failed, TagSet::new(&[(TAG_SCENARIO, scenario)]));

        match outcome {
            Ok(res) => {
                if let Some(h) = self.registry.get_handle(self.http_req_duration, named) {
                    h.observe_duration(res.duration);
                }
                if let Some(h) = failed {
                    h.add_rate(false);
                }
            }
            Err(err) => {
                if let Some(h) = failed {
                    h.add_rate(true);
                }
                let kind = err.kind().to_string();
                let tags = TagSet::new(&[(TAG_SCENARIO, scenario), (TAG_KIND, &kind)]);
                if let Some(h) = self.registry.get_handle(self.transport_errors, tags) {
                    h.increment(1);
                }
            }
        }
    }

    pub fn record_check(&self, scenario: &str, name: &str, passed: bool) {
        let tags = TagSet::new(&[(TAG_SCENARIO, scenario), (TAG_NAME, name)]);
        if let Some(h) = self.registry.get_handle(self.checks, tags) {
            h.add_rate(passed);
        }
    }

    pub fn record_iteration(&self, scenario: &str, elapsed: Duration, ok: bool) {
        let status = if ok { STATUS_OK } else { STATUS_FAILED };
        let tags = TagSet::new(&[(TAG_SCENARIO, scenario), (TAG_STATUS, status)]);
        if let Some(h) = self.registry.get_handle(self.iterations, tags) {
            h.increment(1);
        }

        let tags = TagSet::new(&[(TAG_SCENARIO, scenario)]);
        if let Some(h) = self.registry.get_handle(self.iteration_duration, tags) {
            h.observe_duration(elapsed);
        }
    }

    pub fn requests_total(&self, scenario: &str) -> u64 {
        self.registry
            .fold_counter_sum(self.http_reqs, |t| t.contains(TAG_SCENARIO, scenario))
    }

    pub fn iterations_total(&self, scenario: &str) -> u64 {
        self.registry
            .fold_counter_sum(self.iterations, |t| t.contains(TAG_SCENARIO, scenario))
    }

    pub fn iterations_failed(&self, scenario: &str) -> u64 {
        self.registry.fold_counter_sum(self.iterations, |t| {
            t.contains(TAG_SCENARIO, scenario) && t.contains(TAG_STATUS, STATUS_FAILED)
        })
    }

    pub fn transport_errors_total(&self, scenario: &str) -> u64 {
        self.registry
            .fold_counter_sum(self.transport_errors, |t| t.contains(TAG_SCENARIO, scenario))
    }

    pub fn checks_failed_total(&self, scenario: &str) -> u64 {
        let (total, hits, _) = self
            .registry
            .fold_rate_sum(self.checks, |t| t.contains(TAG_SCENARIO, scenario));
        total.saturating_sub(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn response(ms: u64) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: Bytes::from_static(b"ok"),
            headers: Vec::new(),
            duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn requests_and_failures_are_counted_separately() {
        let m = RunMetrics::default();
        m.record_request("s", "GET /ok", Ok(&response(4)));
        m.record_request("s", "GET /ok", Ok(&response(6)));
        m.record_request(
            "s",
            "GET /ok",
            Err(&HttpError::InvalidUrl("nope".to_string())),
        );

        assert_eq!(m.requests_total("s"), 3);
        assert_eq!(m.transport_errors_total("s"), 1);
        assert_eq!(m.requests_total("other"), 0);

        let (total, hits, rate) = m.registry().fold_rate_sum(m.http_req_failed, |_| true);
        assert_eq!((total, hits), (3, 1));
        assert!(rate.is_some_and(|r| (r - 1.0 / 3.0).abs() < 1e-9));

        let latency = m.registry().fold_histogram_summary(m.http_req_duration, |_| true);
        assert_eq!(latency.map(|l| l.count), Some(2));
    }

    #[test]
    fn iterations_split_by_status() {
        let m = RunMetrics::default();
        m.record_iteration("s", Duration::from_millis(1), true);
        m.record_iteration("s", Duration::from_millis(1), false);
        m.record_iteration("s", Duration::from_millis(1), true);

        assert_eq!(m.iterations_total("s"), 3);
        assert_eq!(m.iterations_failed("s"), 1);
    }

    #[test]
    fn failed_checks_are_total_minus_passes() {
        let m = RunMetrics::default();
        m.record_check("s", "status is 200", true);
        m.record_check("s", "status is 200", false);
        m.record_check("s", "body is not empty", false);
        assert_eq!(m.checks_failed_total("s"), 2);
    }
}
