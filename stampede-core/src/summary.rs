use std::time::Duration;

use stampede_metrics::{HistogramSummary, TagSet};

use crate::metrics::{RunMetrics, TAG_KIND, TAG_NAME, TAG_SCENARIO};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestSummary {
    pub name: String,
    pub count: u64,
    pub latency: Option<HistogramSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub scenario: String,
    pub vus: u64,
    pub elapsed: Duration,
    pub iterations_total: u64,
    pub iterations_failed: u64,
    pub requests_total: u64,
    pub transport_errors_total: u64,
    pub transport_errors_by_kind: Vec<(String, u64)>,
    /// First-seen order.
    pub checks: Vec<CheckSummary>,
    /// `None` when no request completed.
    pub latency: Option<HistogramSummary>,
    pub iteration_duration: Option<HistogramSummary>,
    pub requests: Vec<RequestSummary>,
}

impl RunSummary {
    pub fn checks_passed_total(&self) -> u64 {
        self.checks.iter().map(|c| c.passes).sum()
    }

    pub fn checks_failed_total(&self) -> u64 {
        self.checks.iter().map(|c| c.fails).sum()
    }

    pub fn rps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.requests_total as f64 / secs
        } else {
            0.0
        }
    }
}

pub fn build_run_summary(
    scenario: &str,
    vus: u64,
    metrics: &RunMetrics,
    elapsed: Duration,
) -> RunSummary {
    let registry = metrics.registry();
    let in_scenario = |t: &TagSet| t.contains(TAG_SCENARIO, scenario);

    let checks = registry
        .series(metrics.checks)
        .into_iter()
        .filter(|(tags, _)| in_scenario(tags))
        .filter_map(|(tags, handle)| {
            let name = tags.get(TAG_NAME)?.to_string();
            let (total, hits) = handle.get_rate();
            Some(CheckSummary {
                name,
                passes: hits,
                fails: total.saturating_sub(hits),
            })
        })
        .collect();

    let transport_errors_by_kind = registry
        .series(metrics.transport_errors)
        .into_iter()
        .filter(|(tags, _)| in_scenario(tags))
        .filter_map(|(tags, handle)| Some((tags.get(TAG_KIND)?.to_string(), handle.get_counter())))
        .collect();

    let requests = registry
        .series(metrics.http_reqs)
        .into_iter()
        .filter(|(tags, _)| in_scenario(tags))
        .filter_map(|(tags, handle)| {
            let name = tags.get(TAG_NAME)?.to_string();
            let latency = registry.fold_histogram_summary(metrics.http_req_duration, |t| {
                in_scenario(t) && t.contains(TAG_NAME, &name)
            });
            Some(RequestSummary {
                count: handle.get_counter(),
                latency,
                name,
            })
        })
        .collect();

    RunSummary {
        scenario: scenario.to_string(),
        vus,
        elapsed,
        iterations_total: metrics.iterations_total(scenario),
        iterations_failed: metrics.iterations_failed(scenario),
        requests_total: metrics.requests_total(scenario),
        transport_errors_total: metrics.transport_errors_total(scenario),
        transport_errors_by_kind,
        checks,
        latency: registry.fold_histogram_summary(metrics.http_req_duration, in_scenario),
        iteration_duration: registry.fold_histogram_summary(metrics.iteration_duration, in_scenario),
        requests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Error as HttpError, HttpResponse};
    use bytes::Bytes;

    #[test]
    fn summary_groups_checks_and_requests() {
        let m = RunMetrics::default();
        let res = HttpResponse {
            status: 200,
            body: Bytes::from_static(b"{}"),
            headers: Vec::new(),
            duration: Duration::from_millis(12),
        };

        m.record_request("s", "POST /reports/app", Ok(&res));
        m.record_request("s", "GET /inmueble", Ok(&res));
        m.record_request("s", "GET /inmueble", Err(&HttpError::Timeout(Duration::from_secs(1))));
        m.record_check("s", "status is 200", true);
        m.record_check("s", "response body is not empty", false);
        m.record_check("s", "status is 200", false);
        m.record_check("other", "status is 200", false);
        m.record_iteration("s", Duration::from_millis(20), true);

        let summary = build_run_summary("s", 2, &m, Duration::from_secs(2));

        assert_eq!(summary.requests_total, 3);
        assert_eq!(summary.transport_errors_total, 1);
        assert_eq!(summary.transport_errors_by_kind, vec![("timeout".to_string(), 1)]);
        assert_eq!(
            summary.checks,
            vec![
                CheckSummary {
                    name: "status is 200".to_string(),
                    passes: 1,
                    fails: 1
                },
                CheckSummary {
                    name: "response body is not empty".to_string(),
                    passes: 0,
                    fails: 1
                },
            ]
        );
        assert_eq!(summary.checks_failed_total(), 2);
        assert_eq!(summary.latency.as_ref().map(|l| l.count), Some(2));
        assert_eq!(summary.requests.len(), 2);
        assert_eq!(summary.requests[1].name, "GET /inmueble");
        assert_eq!(summary.requests[1].count, 2);
        assert!((summary.rps() - 1.5).abs() < 1e-9);
    }
}
