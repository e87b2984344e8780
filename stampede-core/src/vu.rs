use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand_chacha::ChaCha8Rng;
use tokio::sync::Notify;

use crate::checks::{CheckResult, Validator};
use crate::http::{self, HttpClient, HttpRequest, HttpResponse};
use crate::metrics::RunMetrics;
use crate::random::vu_rng;

/// One-shot broadcast flag. Late waiters return immediately.
#[derive(Debug, Default)]
pub struct Signal {
    fired: AtomicBool,
    notify: Notify,
}

impl Signal {
    pub fn fire(&self) {
        self.fired.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        loop {
            // Register before checking the flag so a concurrent `fire` cannot be missed.
            let notified = self.notify.notified();
            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }
}

/// Per-VU state handed to every scenario call.
#[derive(Debug)]
pub struct VuContext {
    vu_id: u64,
    scenario: Arc<str>,
    client: Arc<HttpClient>,
    metrics: Arc<RunMetrics>,
    validator: Validator,
    rng: ChaCha8Rng,
    request_timeout: Option<Duration>,
}

impl VuContext {
    pub fn new(
        vu_id: u64,
        scenario: Arc<str>,
        client: Arc<HttpClient>,
        metrics: Arc<RunMetrics>,
        seed: Option<u64>,
        request_timeout: Option<Duration>,
    ) -> Self {
        let validator = Validator::new(metrics.clone(), scenario.clone());
        Self {
            vu_id,
            scenario,
            client,
            metrics,
            validator,
            rng: vu_rng(seed, vu_id),
            request_timeout,
        }
    }

    /// `0` during setup, `1..=vus` while running.
    pub fn vu_id(&self) -> u64 {
        self.vu_id
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub async fn request(&self, mut req: HttpRequest) -> http::Result<HttpResponse> {
        if req.timeout.is_none() {
            req.timeout = self.request_timeout;
        }
        let name = req.display_name();

        let outcome = self.client.execute(req).await;
        self.metrics
            .record_request(&self.scenario, &name, outcome.as_ref());
        outcome
    }

    pub(crate) fn record_iteration(&self, elapsed: Duration, ok: bool) {
        self.metrics.record_iteration(&self.scenario, elapsed, ok);
    }

    pub fn check<T: ?Sized>(
        &self,
        result: &T,
        name: &str,
        predicate: impl FnOnce(&T) -> bool,
    ) -> CheckResult {
        self.validator.check(result, name, predicate)
    }

    pub fn check_all<T: ?Sized>(
        &self,
        result: &T,
        checks: &[(&str, &dyn Fn(&T) -> bool)],
    ) -> Vec<CheckResult> {
        self.validator.check_all(result, checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_wakes_waiters_and_late_callers() {
        let signal = Arc::new(Signal::default());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::task::yield_now().await;
        signal.fire();

        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));

        // Already fired: returns without blocking.
        let late = tokio::time::timeout(Duration::from_millis(100), signal.wait()).await;
        assert!(late.is_ok());
    }

    #[test]
    fn same_seed_same_vu_same_stream() {
        use rand::Rng as _;

        let metrics = Arc::new(RunMetrics::default());
        let client = Arc::new(HttpClient::default());
        let mut a = VuContext::new(3, Arc::from("s"), client.clone(), metrics.clone(), Some(9), None);
        let mut b = VuContext::new(3, Arc::from("s"), client, metrics, Some(9), None);

        let xs: Vec<u32> = (0..4).map(|_| a.rng().gen_range(0..1000)).collect();
        let ys: Vec<u32> = (0..4).map(|_| b.rng().gen_range(0..1000)).collect();
        assert_eq!(xs, ys);
    }
}
