use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Rate,
    Histogram,
}

/// Latency-style summary. Histograms record microseconds; every value here is milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramSummary {
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

pub(crate) fn new_default_histogram() -> Histogram<u64> {
    // Upper bound: 1 hour in microseconds.
    match Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3) {
        Ok(h) => h,
        Err(err) => panic!("failed to create histogram: {err}"),
    }
}

/// Value at quantile `q` (0.0..=1.0), in milliseconds.
pub(crate) fn quantile_ms(h: &Histogram<u64>, q: f64) -> f64 {
    h.value_at_quantile(q) as f64 / 1000.0
}

pub(crate) fn summarize_histogram(h: &Histogram<u64>) -> HistogramSummary {
    if h.is_empty() {
        return HistogramSummary::default();
    }
    let at = |q: f64| Some(quantile_ms(h, q));

    HistogramSummary {
        p50: at(0.50),
        p90: at(0.90),
        p95: at(0.95),
        p99: at(0.99),
        min: Some(h.min() as f64 / 1000.0),
        max: Some(h.max() as f64 / 1000.0),
        mean: Some(h.mean() / 1000.0),
        stdev: Some(h.stdev() / 1000.0),
        count: h.len(),
    }
}

#[derive(Debug, Default)]
pub struct Rate {
    pub total: AtomicU64,
    pub hits: AtomicU64,
}

impl Rate {
    /// `(total, hits)` snapshot.
    #[must_use]
    pub fn load(&self) -> (u64, u64) {
        (
            self.total.load(Ordering::Relaxed),
            self.hits.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug)]
pub(crate) enum MetricStorage {
    Counter(Arc<AtomicU64>),
    Rate(Arc<Rate>),
    Histogram(Arc<Mutex<Histogram<u64>>>),
}

impl MetricStorage {
    pub(crate) fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => MetricStorage::Counter(Arc::new(AtomicU64::new(0))),
            MetricKind::Rate => MetricStorage::Rate(Arc::new(Rate::default())),
            MetricKind::Histogram => {
                MetricStorage::Histogram(Arc::new(Mutex::new(new_default_histogram())))
            }
        }
    }

    pub(crate) fn handle(&self) -> MetricHandle {
        match self {
            MetricStorage::Counter(a) => MetricHandle::Counter(a.clone()),
            MetricStorage::Rate(a) => MetricHandle::Rate(a.clone()),
            MetricStorage::Histogram(a) => MetricHandle::Histogram(a.clone()),
        }
    }
}

// Public handle for writing metrics
#[derive(Debug, Clone)]
pub enum MetricHandle {
    Counter(Arc<AtomicU64>),
    Rate(Arc<Rate>),
    Histogram(Arc<Mutex<Histogram<u64>>>),
}

impl MetricHandle {
    #[inline]
    pub fn increment(&self, value: u64) {
        if let MetricHandle::Counter(c) = self {
            c.fetch_add(value, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn add_rate(&self, hit: bool) {
        if let MetricHandle::Rate(r) = self {
            if hit {
                r.hits.fetch_add(1, Ordering::Relaxed);
            }
            r.total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn observe_duration(&self, value: Duration) {
        if let MetricHandle::Histogram(h) = self {
            let micros: u64 = value.as_micros().try_into().unwrap_or(u64::MAX);
            // Values past the upper bound land in the top bucket.
            h.lock().saturating_record(micros.max(1));
        }
    }

    pub fn get_counter(&self) -> u64 {
        if let MetricHandle::Counter(c) = self {
            c.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    pub fn get_rate(&self) -> (u64, u64) {
        if let MetricHandle::Rate(r) = self {
            r.load()
        } else {
            (0, 0)
        }
    }

    pub fn summarize(&self) -> Option<HistogramSummary> {
        match self {
            MetricHandle::Histogram(h) => Some(summarize_histogram(&h.lock())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_summarizes_to_nothing() {
        let s = summarize_histogram(&new_default_histogram());
        assert_eq!(s.count, 0);
        assert!(s.p50.is_none());
        assert!(s.mean.is_none());
    }

    #[test]
    fn histogram_reports_milliseconds() {
        let handle = MetricStorage::new(MetricKind::Histogram).handle();
        handle.observe_duration(Duration::from_millis(20));
        handle.observe_duration(Duration::from_millis(40));

        let s = handle
            .summarize()
            .unwrap_or_else(|| panic!("histogram handle must summarize"));
        assert_eq!(s.count, 2);
        let min = s.min.unwrap_or_default();
        let max = s.max.unwrap_or_default();
        assert!((19.9..=20.1).contains(&min), "min={min}");
        assert!((39.9..=40.1).contains(&max), "max={max}");
    }

    #[test]
    fn samples_past_the_bound_are_clamped_not_dropped() {
        let handle = MetricStorage::new(MetricKind::Histogram).handle();
        handle.observe_duration(Duration::from_secs(2 * 3600));

        let s = handle
            .summarize()
            .unwrap_or_else(|| panic!("histogram handle must summarize"));
        assert_eq!(s.count, 1);
        let max = s.max.unwrap_or_default();
        assert!(max >= 3_590_000.0, "max={max}");
    }

    #[test]
    fn rate_counts_hits_and_total() {
        let handle = MetricStorage::new(MetricKind::Rate).handle();
        handle.add_rate(true);
        handle.add_rate(false);
        handle.add_rate(true);
        assert_eq!(handle.get_rate(), (3, 2));
    }
}
