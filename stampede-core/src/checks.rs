//! Named, non-fatal assertions over request results.

use std::sync::Arc;
use std::time::Duration;

use crate::http::HttpResponse;
use crate::metrics::RunMetrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
}

/// Tallies check outcomes into the run's `checks` rate, one series per check name.
#[derive(Debug, Clone)]
pub struct Validator {
    metrics: Arc<RunMetrics>,
    scenario: Arc<str>,
}

impl Validator {
    pub fn new(metrics: Arc<RunMetrics>, scenario: Arc<str>) -> Self {
        Self { metrics, scenario }
    }

    pub fn check<T: ?Sized>(
        &self,
        result: &T,
        name: &str,
        predicate: impl FnOnce(&T) -> bool,
    ) -> CheckResult {
        let passed = predicate(result);
        self.metrics.record_check(&self.scenario, name, passed);
        CheckResult {
            name: name.to_string(),
            passed,
        }
    }

    /// Runs every predicate against the same result. Output order follows `checks`.
    pub fn check_all<T: ?Sized>(
        &self,
        result: &T,
        checks: &[(&str, &dyn Fn(&T) -> bool)],
    ) -> Vec<CheckResult> {
        checks
            .iter()
            .map(|(name, predicate)| self.check(result, name, |r| predicate(r)))
            .collect()
    }
}

pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.passed)
}

pub fn status_is(code: u16) -> impl Fn(&HttpResponse) -> bool {
    move |res| res.status == code
}

pub fn duration_below(limit: Duration) -> impl Fn(&HttpResponse) -> bool {
    move |res| res.duration < limit
}

pub fn body_not_empty(res: &HttpResponse) -> bool {
    !res.body.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn validator() -> (Validator, Arc<RunMetrics>) {
        let metrics = Arc::new(RunMetrics::default());
        (Validator::new(metrics.clone(), Arc::from("s")), metrics)
    }

    fn response(status: u16, body: &'static [u8], ms: u64) -> HttpResponse {
        HttpResponse {
            status,
            body: Bytes::from_static(body),
            headers: Vec::new(),
            duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn check_records_pass_and_fail() {
        let (v, metrics) = validator();
        let ok = v.check(&response(200, b"x", 1), "status is 200", status_is(200));
        let bad = v.check(&response(500, b"x", 1), "status is 200", status_is(200));

        assert!(ok.passed);
        assert!(!bad.passed);
        assert_eq!(metrics.checks_failed_total("s"), 1);
    }

    #[test]
    fn check_all_keeps_input_order() {
        let (v, _) = validator();
        let res = response(200, b"", 1500);
        let results = v.check_all(
            &res,
            &[
                ("status is 200", &status_is(200)),
                (
                    "response time is less than 1000ms",
                    &duration_below(Duration::from_millis(1000)),
                ),
                ("response body is not empty", &body_not_empty),
            ],
        );

        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "status is 200",
                "response time is less than 1000ms",
                "response body is not empty"
            ]
        );
        let passed: Vec<bool> = results.iter().map(|r| r.passed).collect();
        assert_eq!(passed, vec![true, false, false]);
        assert!(!all_passed(&results));
    }

    #[test]
    fn predicates_work_on_any_value() {
        let (v, _) = validator();
        let r = v.check("abc", "three chars", |s: &str| s.len() == 3);
        assert!(r.passed);
    }
}
