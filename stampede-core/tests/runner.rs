use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use stampede_core::checks::{body_not_empty, duration_below, status_is};
use stampede_core::{
    Error, HttpRequest, RunContext, RunPhase, Scenario, ScenarioConfig, ScenarioError, VuContext,
    run_scenario,
};
use stampede_testserver::TestServer;

struct GetScenario {
    url: String,
    setup_calls: Arc<AtomicU64>,
    fail_setup: bool,
}

impl GetScenario {
    fn new(url: String) -> Self {
        Self {
            url,
            setup_calls: Arc::new(AtomicU64::new(0)),
            fail_setup: false,
        }
    }
}

impl Scenario for GetScenario {
    type Context = String;

    fn name(&self) -> &str {
        "get"
    }

    async fn setup(&self, _vu: &mut VuContext) -> Result<String, ScenarioError> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_setup {
            return Err(ScenarioError::Aborted("setup refused".to_string()));
        }
        Ok(self.url.clone())
    }

    async fn iteration(&self, vu: &mut VuContext, url: &String) -> Result<(), ScenarioError> {
        let res = vu.request(HttpRequest::get(url.as_str())).await?;
        vu.check(&res, "status is 200", status_is(200));
        Ok(())
    }
}

fn config(vus: u64, duration: Duration) -> ScenarioConfig {
    ScenarioConfig {
        vus,
        duration,
        ..ScenarioConfig::default()
    }
}

#[tokio::test]
async fn zero_vus_is_rejected_before_setup() {
    let scenario = Arc::new(GetScenario::new("http://127.0.0.1:9/".to_string()));
    let calls = scenario.setup_calls.clone();
    let run = RunContext::default();

    let err = match run_scenario(scenario, config(0, Duration::from_secs(1)), run.clone()).await
    {
        Ok(_) => panic!("vus=0 must be rejected"),
        Err(e) => e,
    };

    assert!(matches!(err, Error::InvalidVus));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(run.handle.phase(), RunPhase::Idle);
}

#[tokio::test]
async fn failing_setup_never_iterates() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let mut scenario = GetScenario::new(server.url("/ok"));
    scenario.fail_setup = true;
    let run = RunContext::default();

    let err = match run_scenario(
        Arc::new(scenario),
        config(5, Duration::from_millis(300)),
        run.clone(),
    )
    .await
    {
        Ok(_) => panic!("setup failure must abort the run"),
        Err(e) => e,
    };

    assert!(matches!(err, Error::Setup { .. }));
    assert_eq!(server.stats().requests_total(), 0);
    assert_eq!(run.metrics.iterations_total("get"), 0);
    assert_eq!(run.handle.phase(), RunPhase::Completed);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_vu_against_ok_endpoint() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let scenario = Arc::new(GetScenario::new(server.url("/ok")));
    let run = RunContext::default();

    let summary = run_scenario(scenario, config(1, Duration::from_secs(1)), run.clone())
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(summary.checks.len(), 1);
    assert_eq!(summary.checks[0].name, "status is 200");
    assert_eq!(summary.checks[0].fails, 0);
    assert!(summary.checks[0].passes >= 1);
    assert_eq!(summary.transport_errors_total, 0);
    assert_eq!(summary.iterations_failed, 0);

    let latency = summary
        .latency
        .unwrap_or_else(|| panic!("latency summary missing"));
    assert!(latency.min.is_some_and(|v| v >= 0.0));
    assert!(latency.mean.is_some_and(|v| v >= 0.0));
    assert!(latency.p95.is_some());
    assert_eq!(run.handle.phase(), RunPhase::Completed);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_errors_fail_checks_but_run_completes() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let scenario = Arc::new(GetScenario::new(server.url("/status/500")));

    let summary = run_scenario(
        scenario,
        config(2, Duration::from_millis(500)),
        RunContext::default(),
    )
    .await
    .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(summary.checks.len(), 1);
    assert_eq!(summary.checks[0].passes, 0);
    assert!(summary.checks[0].fails >= 1);
    // A 500 is a completed request, not a transport error.
    assert_eq!(summary.transport_errors_total, 0);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_check_counts_match_iterations() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let scenario = Arc::new(GetScenario::new(server.url("/ok")));

    let summary = run_scenario(
        scenario,
        config(50, Duration::from_millis(500)),
        RunContext::default(),
    )
    .await
    .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert!(summary.iterations_total > 0);
    assert_eq!(summary.checks[0].passes, summary.iterations_total);
    assert_eq!(summary.requests_total, summary.iterations_total);
    assert_eq!(server.stats().requests_total(), summary.requests_total);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn iteration_cap_bounds_total_work() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let scenario = Arc::new(GetScenario::new(server.url("/ok")));
    let cfg = ScenarioConfig {
        iterations: Some(7),
        ..config(3, Duration::from_secs(10))
    };

    let summary = run_scenario(scenario, cfg, RunContext::default())
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(summary.iterations_total, 7);
    assert!(summary.elapsed < Duration::from_secs(5));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_drains_early_and_cuts_pause_short() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let scenario = Arc::new(GetScenario::new(server.url("/ok")));
    let run = RunContext::default();
    let cfg = ScenarioConfig {
        pause: Some(Duration::from_secs(5)),
        ..config(2, Duration::from_secs(30))
    };

    let handle = run.handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.stop();
    });

    let summary = run_scenario(scenario, cfg, run.clone())
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert!(summary.elapsed < Duration::from_secs(3), "{:?}", summary.elapsed);
    assert_eq!(summary.iterations_total, 2);
    assert_eq!(run.handle.phase(), RunPhase::Completed);

    server.shutdown().await;
}

#[tokio::test]
async fn transport_errors_are_counted_by_kind() {
    // Nothing listens on the discard port.
    let scenario = Arc::new(GetScenario::new("http://127.0.0.1:9/".to_string()));
    let cfg = ScenarioConfig {
        iterations: Some(3),
        ..config(1, Duration::from_secs(5))
    };

    let summary = run_scenario(scenario, cfg, RunContext::default())
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(summary.iterations_total, 3);
    assert_eq!(summary.iterations_failed, 3);
    assert_eq!(summary.transport_errors_total, 3);
    assert_eq!(summary.requests_total, 3);
    assert!(summary.latency.is_none());
    assert!(summary.checks.is_empty());
}

struct TrioScenario {
    url: String,
}

impl Scenario for TrioScenario {
    type Context = ();

    fn name(&self) -> &str {
        "trio"
    }

    async fn setup(&self, _vu: &mut VuContext) -> Result<(), ScenarioError> {
        Ok(())
    }

    async fn iteration(&self, vu: &mut VuContext, _ctx: &()) -> Result<(), ScenarioError> {
        let res = vu
            .request(HttpRequest::get(self.url.as_str()).timeout(Duration::from_secs(2)))
            .await?;
        vu.check_all(
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
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn checks_are_reported_in_first_seen_order() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let scenario = Arc::new(TrioScenario {
        url: server.url("/ok"),
    });
    let cfg = ScenarioConfig {
        iterations: Some(4),
        ..config(2, Duration::from_secs(5))
    };

    let summary = run_scenario(scenario, cfg, RunContext::default())
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    let names: Vec<&str> = summary.checks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "status is 200",
            "response time is less than 1000ms",
            "response body is not empty"
        ]
    );
    assert!(summary.checks.iter().all(|c| c.passes == 4 && c.fails == 0));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_timeout_surfaces_as_transport_error() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let scenario = Arc::new(GetScenario::new(server.url("/slow?ms=500")));
    let cfg = ScenarioConfig {
        iterations: Some(1),
        request_timeout: Some(Duration::from_millis(50)),
        ..config(1, Duration::from_secs(5))
    };

    let summary = run_scenario(scenario, cfg, RunContext::default())
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(
        summary.transport_errors_by_kind,
        vec![("timeout".to_string(), 1)]
    );

    server.shutdown().await;
}
