use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based).
    pub tick: u64,
    pub elapsed: Duration,
    pub duration: Duration,
    pub scenario: String,
    pub vus: u64,
    /// Requests/sec observed during the last interval.
    pub rps_now: f64,
    pub requests_total: u64,
    pub transport_errors_total: u64,
    pub checks_failed_total: u64,
    pub iterations_total: u64,
    pub iterations_failed: u64,
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
