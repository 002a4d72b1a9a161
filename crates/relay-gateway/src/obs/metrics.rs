//! In-process metrics registry, dependency-free aside from `dashmap`.
//!
//! Counter/gauge/histogram types with dynamic labels, rendered in
//! Prometheus text exposition format. Retuned from the donor's gateway
//! counters to this domain's: WS upgrade/session counts, per-message-type
//! dispatch latency, handler errors, translation fan-out volume and retry
//! counts, and provider failures.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let mut key: Vec<(String, String)> =
            labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        key.sort();
        self.map.entry(key).or_insert_with(|| AtomicU64::new(0)).fetch_add(v, Ordering::Relaxed);
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for r in self.map.iter() {
            let label_str = r.key().iter().map(|(k, v)| format!("{k}=\"{}\"", escape_label(v))).collect::<Vec<_>>().join(",");
            let _ = writeln!(out, "{name}{{{label_str}}} {}", r.value().load(Ordering::Relaxed));
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<Vec<(String, String)>, AtomicI64>,
}

impl GaugeVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }
    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }
    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        let mut key: Vec<(String, String)> =
            labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        key.sort();
        self.map.entry(key).or_insert_with(|| AtomicI64::new(0)).fetch_add(v, Ordering::Relaxed);
    }
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} gauge");
        for r in self.map.iter() {
            let label_str = r.key().iter().map(|(k, v)| format!("{k}=\"{}\"", escape_label(v))).collect::<Vec<_>>().join(",");
            let _ = writeln!(out, "{name}{{{label_str}}} {}", r.value().load(Ordering::Relaxed));
        }
    }
}

const BUCKETS_MICROS: [u64; 9] = [100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000];

struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 9],
}

impl Default for AtomicHistogram {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            buckets: Default::default(),
        }
    }
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<Vec<(String, String)>, AtomicHistogram>,
}

impl HistogramVec {
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let mut key: Vec<(String, String)> =
            labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        key.sort();
        let hist = self.map.entry(key).or_insert_with(AtomicHistogram::default);
        let micros = duration.as_micros() as u64;
        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);
        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        for r in self.map.iter() {
            let key = r.key();
            let hist = r.value();
            let label_str = key.iter().map(|(k, v)| format!("{k}=\"{}\"", escape_label(v))).collect::<Vec<_>>().join(",");
            let prefix = if label_str.is_empty() { String::new() } else { format!("{label_str},") };
            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"{le}\"}} {count}");
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"+Inf\"}} {count}");
            let sum = hist.sum.load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_sum{{{label_str}}} {sum}");
            let _ = writeln!(out, "{name}_count{{{label_str}}} {count}");
        }
    }
}

#[derive(Default)]
pub struct GatewayMetrics {
    pub ws_upgrades: CounterVec,
    pub ws_active_connections: GaugeVec,
    pub dispatch_duration: HistogramVec,
    pub handler_errors: CounterVec,
    pub translation_fanout_total: CounterVec,
    pub translation_send_retries: CounterVec,
    pub translation_latency: HistogramVec,
    pub provider_failures: CounterVec,
    draining: std::sync::atomic::AtomicBool,
}

impl GatewayMetrics {
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    pub fn render(&self, extra: &[(&str, u64)]) -> String {
        let mut out = String::new();
        self.ws_upgrades.render("relay_ws_upgrades_total", &mut out);
        self.ws_active_connections.render("relay_ws_active_connections", &mut out);
        self.dispatch_duration.render("relay_dispatch_duration_micros", &mut out);
        self.handler_errors.render("relay_handler_errors_total", &mut out);
        self.translation_fanout_total.render("relay_translation_fanout_total", &mut out);
        self.translation_send_retries.render("relay_translation_send_retries_total", &mut out);
        self.translation_latency.render("relay_translation_latency_micros", &mut out);
        self.provider_failures.render("relay_provider_failures_total", &mut out);
        let _ = writeln!(
            out,
            "# TYPE relay_draining gauge\nrelay_draining {}",
            if self.is_draining() { 1 } else { 0 }
        );
        for (k, v) in extra {
            let _ = writeln!(out, "{k} {v}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_per_label_set() {
        let c = CounterVec::default();
        c.inc(&[("target_language", "es")]);
        c.inc(&[("target_language", "es")]);
        c.inc(&[("target_language", "fr")]);
        let mut out = String::new();
        c.render("x", &mut out);
        assert!(out.contains("target_language=\"es\"} 2"));
        assert!(out.contains("target_language=\"fr\"} 1"));
    }

    #[test]
    fn render_includes_draining_gauge() {
        let metrics = GatewayMetrics::default();
        metrics.set_draining();
        let body = metrics.render(&[]);
        assert!(body.contains("relay_draining 1"));
    }
}
