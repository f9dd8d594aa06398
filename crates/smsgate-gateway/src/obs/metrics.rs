//! Metrics registry for the gateway.
//!
//! Counter/gauge/histogram families with a fixed label schema, backed by
//! `DashMap` for per-series concurrency. Each series is a set of atomics, so
//! writers never take a global lock. Label values are passed in schema order.
//! Histogram observations are accumulated in integer microseconds and rendered
//! as seconds.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;

use smsgate_core::error::{Result, SmsGateError};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Name, help text and label schema of a metric family.
#[derive(Debug, Clone)]
pub struct Desc {
    pub name: String,
    pub help: String,
    pub labels: Vec<String>,
}

impl Desc {
    pub fn new(name: &str, help: &str, labels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Build a series key. Returns `None` (and logs) if the arity is wrong.
    fn key(&self, values: &[&str]) -> Option<Vec<String>> {
        if values.len() != self.labels.len() {
            tracing::warn!(
                metric = %self.name,
                expected = self.labels.len(),
                got = values.len(),
                "label arity mismatch, sample dropped"
            );
            return None;
        }
        Some(values.iter().map(|v| v.to_string()).collect())
    }

    fn label_str(&self, values: &[String]) -> String {
        self.labels
            .iter()
            .zip(values)
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn header(&self, kind: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, escape_help(&self.help));
        let _ = writeln!(out, "# TYPE {} {}", self.name, kind);
    }
}

fn series_name(name: &str, labels: &str) -> String {
    if labels.is_empty() {
        name.to_string()
    } else {
        format!("{}{{{}}}", name, labels)
    }
}

/// Sorted snapshot of series keys so output order is deterministic.
fn sorted_keys<V>(map: &DashMap<Vec<String>, V>) -> Vec<Vec<String>> {
    let mut keys: Vec<Vec<String>> = map.iter().map(|r| r.key().clone()).collect();
    keys.sort();
    keys
}

pub struct CounterVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicU64>,
}

impl CounterVec {
    pub fn new(desc: Desc) -> Self {
        Self { desc, map: DashMap::new() }
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[&str]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[&str], v: u64) {
        let Some(key) = self.desc.key(labels) else { return };
        // Fast path avoids the shard write lock once the series exists.
        if let Some(counter) = self.map.get(&key) {
            counter.fetch_add(v, Ordering::Relaxed);
            return;
        }
        let counter = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value of a series (0 if never touched).
    pub fn get(&self, labels: &[&str]) -> u64 {
        let values: Vec<String> = labels.iter().map(|v| v.to_string()).collect();
        self.map
            .get(&values)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        self.desc.header("counter", out);
        for key in sorted_keys(&self.map) {
            let Some(r) = self.map.get(&key) else { continue };
            let val = r.value().load(Ordering::Relaxed);
            let labels = self.desc.label_str(&key);
            let _ = writeln!(out, "{} {}", series_name(&self.desc.name, &labels), val);
        }
    }
}

/// Floating point gauge. The value is stored as `f64` bits.
pub struct GaugeVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicU64>,
}

impl GaugeVec {
    pub fn new(desc: Desc) -> Self {
        Self { desc, map: DashMap::new() }
    }

    /// Overwrite the current value.
    pub fn set(&self, labels: &[&str], v: f64) {
        let Some(key) = self.desc.key(labels) else { return };
        let gauge = self.map.entry(key).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        gauge.store(v.to_bits(), Ordering::Relaxed);
    }

    /// Current value of a series, if it has ever been set.
    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        let values: Vec<String> = labels.iter().map(|v| v.to_string()).collect();
        self.map
            .get(&values)
            .map(|g| f64::from_bits(g.load(Ordering::Relaxed)))
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        self.desc.header("gauge", out);
        for key in sorted_keys(&self.map) {
            let Some(r) = self.map.get(&key) else { continue };
            let val = f64::from_bits(r.value().load(Ordering::Relaxed));
            let labels = self.desc.label_str(&key);
            let _ = writeln!(out, "{} {}", series_name(&self.desc.name, &labels), val);
        }
    }
}

// Default client buckets (5ms .. 10s), held in microseconds.
const BUCKETS_MICROS: [u64; 11] = [
    5_000, 10_000, 25_000, 50_000, 100_000, 250_000, 500_000, 1_000_000, 2_500_000, 5_000_000,
    10_000_000,
];

struct AtomicHistogram {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: [AtomicU64; BUCKETS_MICROS.len()],
}

impl Default for AtomicHistogram {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

fn micros_as_secs(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

pub struct HistogramVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicHistogram>,
}

impl HistogramVec {
    pub fn new(desc: Desc) -> Self {
        Self { desc, map: DashMap::new() }
    }

    /// Observe a duration and increment cumulative buckets.
    pub fn observe(&self, labels: &[&str], duration: Duration) {
        let Some(key) = self.desc.key(labels) else { return };
        let hist = self.map.entry(key).or_default();
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum_micros.fetch_add(micros, Ordering::Relaxed);

        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of observations for a series (0 if never touched).
    pub fn count(&self, labels: &[&str]) -> u64 {
        let values: Vec<String> = labels.iter().map(|v| v.to_string()).collect();
        self.map
            .get(&values)
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format (unit: seconds).
    fn render(&self, out: &mut String) {
        self.desc.header("histogram", out);
        let name = &self.desc.name;
        for key in sorted_keys(&self.map) {
            let Some(r) = self.map.get(&key) else { continue };
            let hist = r.value();

            let label_str = self.desc.label_str(&key);
            let prefix = if label_str.is_empty() { String::new() } else { format!("{},", label_str) };

            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(
                    out,
                    "{}_bucket{{{}le=\"{}\"}} {}",
                    name,
                    prefix,
                    micros_as_secs(le),
                    count
                );
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = micros_as_secs(hist.sum_micros.load(Ordering::Relaxed));
            let _ = writeln!(out, "{} {}", series_name(&format!("{name}_sum"), &label_str), sum);
            let _ = writeln!(out, "{} {}", series_name(&format!("{name}_count"), &label_str), count);
        }
    }
}

enum Family {
    Counter(Arc<CounterVec>),
    Gauge(Arc<GaugeVec>),
    Histogram(Arc<HistogramVec>),
}

impl Family {
    fn name(&self) -> &str {
        match self {
            Family::Counter(c) => &c.desc.name,
            Family::Gauge(g) => &g.desc.name,
            Family::Histogram(h) => &h.desc.name,
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Family::Counter(c) => c.render(out),
            Family::Gauge(g) => g.render(out),
            Family::Histogram(h) => h.render(out),
        }
    }
}

/// Set of registered metric families.
///
/// Registration happens at startup and takes the write lock; rendering takes
/// the read lock. Sample updates go straight to the returned handles and never
/// touch the registry lock.
#[derive(Default)]
pub struct Registry {
    families: RwLock<Vec<Family>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, family: Family) -> Result<()> {
        let mut families = self.families.write();
        if families.iter().any(|f| f.name() == family.name()) {
            return Err(SmsGateError::DuplicateMetric(family.name().to_string()));
        }
        families.push(family);
        Ok(())
    }

    pub fn register_counter(&self, name: &str, help: &str, labels: &[&str]) -> Result<Arc<CounterVec>> {
        let c = Arc::new(CounterVec::new(Desc::new(name, help, labels)));
        self.register(Family::Counter(Arc::clone(&c)))?;
        Ok(c)
    }

    pub fn register_gauge(&self, name: &str, help: &str, labels: &[&str]) -> Result<Arc<GaugeVec>> {
        let g = Arc::new(GaugeVec::new(Desc::new(name, help, labels)));
        self.register(Family::Gauge(Arc::clone(&g)))?;
        Ok(g)
    }

    pub fn register_histogram(&self, name: &str, help: &str, labels: &[&str]) -> Result<Arc<HistogramVec>> {
        let h = Arc::new(HistogramVec::new(Desc::new(name, help, labels)));
        self.register(Family::Histogram(Arc::clone(&h)))?;
        Ok(h)
    }

    /// Render all registered families in registration order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for f in self.families.read().iter() {
            f.render(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_fails_fast() {
        let reg = Registry::new();
        reg.register_counter("jobs_total", "Jobs", &["kind"]).unwrap();
        let err = reg.register_gauge("jobs_total", "Jobs again", &[]).err().unwrap();
        assert!(matches!(err, SmsGateError::DuplicateMetric(name) if name == "jobs_total"));
    }

    #[test]
    fn counter_renders_help_type_and_sorted_series() {
        let reg = Registry::new();
        let c = reg.register_counter("hits_total", "Number of hits", &["method", "code"]).unwrap();
        c.inc(&["POST", "500"]);
        c.add(&["GET", "200"], 3);
        c.inc(&["GET", "200"]);

        let out = reg.render();
        let expected = "# HELP hits_total Number of hits\n\
                        # TYPE hits_total counter\n\
                        hits_total{method=\"GET\",code=\"200\"} 4\n\
                        hits_total{method=\"POST\",code=\"500\"} 1\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn label_arity_mismatch_is_dropped() {
        let c = CounterVec::new(Desc::new("x_total", "x", &["a", "b"]));
        c.inc(&["only-one"]);
        assert!(c.map.is_empty());
    }

    #[test]
    fn unlabeled_gauge_is_overwritten() {
        let reg = Registry::new();
        let g = reg.register_gauge("cpu", "CPU", &[]).unwrap();
        g.set(&[], 12.5);
        g.set(&[], 40.25);
        assert_eq!(g.get(&[]), Some(40.25));
        assert!(reg.render().contains("\ncpu 40.25\n"));
    }

    #[test]
    fn label_values_are_escaped() {
        let reg = Registry::new();
        let c = reg.register_counter("p_total", "p", &["path"]).unwrap();
        c.inc(&["a\"b\\c"]);
        assert!(reg.render().contains(r#"p_total{path="a\"b\\c"} 1"#));
    }

    #[test]
    fn histogram_buckets_are_cumulative_and_in_seconds() {
        let reg = Registry::new();
        let h = reg.register_histogram("lat_seconds", "Latency", &["m"]).unwrap();
        h.observe(&["GET"], Duration::from_millis(3));
        h.observe(&["GET"], Duration::from_millis(30));
        h.observe(&["GET"], Duration::from_secs(20));

        let out = reg.render();
        assert!(out.contains("# TYPE lat_seconds histogram\n"));
        assert!(out.contains("lat_seconds_bucket{m=\"GET\",le=\"0.005\"} 1\n"));
        assert!(out.contains("lat_seconds_bucket{m=\"GET\",le=\"0.05\"} 2\n"));
        assert!(out.contains("lat_seconds_bucket{m=\"GET\",le=\"10\"} 2\n"));
        assert!(out.contains("lat_seconds_bucket{m=\"GET\",le=\"+Inf\"} 3\n"));
        assert!(out.contains("lat_seconds_sum{m=\"GET\"} 20.033\n"));
        assert!(out.contains("lat_seconds_count{m=\"GET\"} 3\n"));
        assert_eq!(h.count(&["GET"]), 3);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let c = Arc::new(CounterVec::new(Desc::new("c_total", "c", &["k"])));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.inc(&["same"]);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(c.get(&["same"]), 8000);
    }
}
