use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use hdrhistogram::Histogram;

use crate::metrics::{
    HistogramSummary, MetricHandle, MetricKind, MetricStorage, new_default_histogram,
    quantile_ms, summarize_histogram,
};
use crate::tags::TagSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricId(u32);

#[derive(Debug)]
struct MetricDef {
    name: Arc<str>,
    kind: MetricKind,
}

type SeriesKey = (MetricId, TagSet);

/// Concurrent metric store. Series are created on first use and remembered in first-seen order.
#[derive(Debug, Default)]
pub struct Registry {
    defs: RwLock<Vec<MetricDef>>,
    storage: DashMap<SeriesKey, MetricStorage>,
    order: Mutex<Vec<SeriesKey>>,
}

impl Registry {
    pub fn register(&self, name: &str, kind: MetricKind) -> MetricId {
        let mut defs = self.defs.write();
        if let Some(idx) = defs.iter().position(|d| d.name.as_ref() == name) {
            return MetricId(idx as u32);
        }

        let id = MetricId(defs.len() as u32);
        defs.push(MetricDef {
            name: Arc::from(name),
            kind,
        });
        id
    }

    pub fn lookup_metric(&self, name: &str) -> Option<(MetricId, MetricKind)> {
        let defs = self.defs.read();
        defs.iter()
            .position(|d| d.name.as_ref() == name)
            .map(|idx| (MetricId(idx as u32), defs[idx].kind))
    }

    pub fn metric_kind(&self, metric: MetricId) -> Option<MetricKind> {
        self.defs.read().get(metric.0 as usize).map(|d| d.kind)
    }

    pub fn get_handle(&self, metric: MetricId, tags: TagSet) -> Option<MetricHandle> {
        let key = (metric, tags);
        if let Some(storage) = self.storage.get(&key) {
            return Some(storage.value().handle());
        }

        let kind = self.metric_kind(metric)?;
        let entry = self.storage.entry(key.clone()).or_insert_with(|| {
            self.order.lock().push(key);
            MetricStorage::new(kind)
        });
        Some(entry.value().handle())
    }

    /// All series of `metric`, in the order they were first written.
    pub fn series(&self, metric: MetricId) -> Vec<(TagSet, MetricHandle)> {
        // Snapshot the order first: writers take a shard lock before the order lock.
        let keys: Vec<SeriesKey> = self
            .order
            .lock()
            .iter()
            .filter(|(id, _)| *id == metric)
            .cloned()
            .collect();

        keys.into_iter()
            .filter_map(|key| {
                let handle = self.storage.get(&key)?.value().handle();
                Some((key.1, handle))
            })
            .collect()
    }

    pub fn fold_counter_sum(&self, metric: MetricId, filter: impl Fn(&TagSet) -> bool) -> u64 {
        self.series(metric)
            .into_iter()
            .filter(|(tags, _)| filter(tags))
            .fold(0u64, |acc, (_, h)| acc.saturating_add(h.get_counter()))
    }

    /// `(total, hits, hits / total)`; the rate is `None` when nothing was recorded.
    pub fn fold_rate_sum(
        &self,
        metric: MetricId,
        filter: impl Fn(&TagSet) -> bool,
    ) -> (u64, u64, Option<f64>) {
        let (total, hits) = self
            .series(metric)
            .into_iter()
            .filter(|(tags, _)| filter(tags))
            .fold((0u64, 0u64), |(t, h), (_, handle)| {
                let (dt, dh) = handle.get_rate();
                (t.saturating_add(dt), h.saturating_add(dh))
            });
        let rate = (total > 0).then(|| hits as f64 / total as f64);
        (total, hits, rate)
    }

    /// Merges every matching histogram series into one summary.
    pub fn fold_histogram_summary(
        &self,
        metric: MetricId,
        filter: impl Fn(&TagSet) -> bool,
    ) -> Option<HistogramSummary> {
        self.merged_histogram(metric, filter)
            .map(|h| summarize_histogram(&h))
    }

    /// Percentile `p` (0..=100) in milliseconds over every matching series.
    pub fn fold_histogram_percentile(
        &self,
        metric: MetricId,
        filter: impl Fn(&TagSet) -> bool,
        p: f64,
    ) -> Option<f64> {
        let merged = self.merged_histogram(metric, filter)?;
        (!merged.is_empty()).then(|| quantile_ms(&merged, (p / 100.0).clamp(0.0, 1.0)))
    }

    fn merged_histogram(
        &self,
        metric: MetricId,
        filter: impl Fn(&TagSet) -> bool,
    ) -> Option<Histogram<u64>> {
        let mut merged = new_default_histogram();
        let mut seen = false;

        for (tags, handle) in self.series(metric) {
            if !filter(&tags) {
                continue;
            }
            if let MetricHandle::Histogram(h) = handle {
                let _ = merged.add(&*h.lock());
                seen = true;
            }
        }

        seen.then_some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn register_is_idempotent_by_name() {
        let r = Registry::default();
        let a = r.register("http_reqs", MetricKind::Counter);
        let b = r.register("http_reqs", MetricKind::Counter);
        assert_eq!(a, b);
        assert_eq!(r.lookup_metric("http_reqs"), Some((a, MetricKind::Counter)));
        assert_eq!(r.lookup_metric("nope"), None);
    }

    #[test]
    fn series_keep_first_seen_order() {
        let r = Registry::default();
        let id = r.register("checks", MetricKind::Rate);
        for name in ["zeta", "alpha", "mid", "alpha"] {
            if let Some(h) = r.get_handle(id, TagSet::new(&[("name", name)])) {
                h.add_rate(true);
            }
        }

        let names: Vec<String> = r
            .series(id)
            .iter()
            .filter_map(|(tags, _)| tags.get("name").map(str::to_string))
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn fold_helpers_respect_filters() {
        let r = Registry::default();
        let counter = r.register("http_reqs", MetricKind::Counter);
        let hist = r.register("http_req_duration", MetricKind::Histogram);

        for scenario in ["a", "b"] {
            let tags = TagSet::new(&[("scenario", scenario)]);
            if let Some(h) = r.get_handle(counter, tags.clone()) {
                h.increment(2);
            }
            if let Some(h) = r.get_handle(hist, tags) {
                h.observe_duration(Duration::from_millis(5));
            }
        }

        assert_eq!(r.fold_counter_sum(counter, |_| true), 4);
        assert_eq!(r.fold_counter_sum(counter, |t| t.contains("scenario", "a")), 2);

        let all = r.fold_histogram_summary(hist, |_| true);
        assert_eq!(all.map(|s| s.count), Some(2));
        assert!(r.fold_histogram_summary(hist, |t| t.contains("scenario", "c")).is_none());
    }

    #[test]
    fn percentile_fold_covers_any_quantile() {
        let r = Registry::default();
        let hist = r.register("http_req_duration", MetricKind::Histogram);
        for (name, ms) in [("fast", 10u64), ("slow", 40u64)] {
            if let Some(h) = r.get_handle(hist, TagSet::new(&[("name", name)])) {
                for _ in 0..2 {
                    h.observe_duration(Duration::from_millis(ms));
                }
            }
        }

        let p25 = r.fold_histogram_percentile(hist, |_| true, 25.0).unwrap_or_default();
        let p75 = r.fold_histogram_percentile(hist, |_| true, 75.0).unwrap_or_default();
        assert!((9.9..=10.1).contains(&p25), "p25={p25}");
        assert!((39.9..=40.1).contains(&p75), "p75={p75}");
        assert!(r.fold_histogram_percentile(hist, |_| false, 75.0).is_none());
    }
}
