use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Sorted, owned label pairs; the series identity within a metric family
pub type LabelSet = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Summary statistics over a set of histogram observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl HistogramStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Self {
            count,
            sum,
            min: sorted[0],
            max: sorted[count - 1],
            avg: sum / count as f64,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

/// Linear interpolation between the order statistics around `(n - 1) * p`.
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let k = (sorted.len() - 1) as f64 * p;
    let floor = k.floor() as usize;
    let ceil = (floor + 1).min(sorted.len() - 1);
    if floor == ceil {
        return sorted[floor];
    }
    sorted[floor] + (k - floor as f64) * (sorted[ceil] - sorted[floor])
}

#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub labels: LabelSet,
    pub value: f64,
}

/// Point-in-time copy of one metric family
#[derive(Debug, Clone, Serialize)]
pub struct MetricFamily {
    pub kind: MetricKind,
    pub help: String,
    /// Counter and gauge series; empty for histograms
    pub samples: Vec<Sample>,
    /// Histogram statistics across every series of the family
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<HistogramStats>,
    /// Raw histogram observations, used for bucketed exposition
    #[serde(skip)]
    pub observations: Vec<f64>,
}

struct Observation {
    value: f64,
    labels: LabelSet,
    at: Instant,
}

#[derive(Default)]
struct GaugeSeries {
    values: BTreeMap<LabelSet, f64>,
    last: f64,
}

#[derive(Default)]
struct Store {
    counters: HashMap<String, BTreeMap<LabelSet, f64>>,
    gauges: HashMap<String, GaugeSeries>,
    histograms: HashMap<String, Vec<Observation>>,
    kinds: BTreeMap<String, MetricKind>,
    help: HashMap<String, String>,
}

/// Thread-safe counters, gauges and histograms.
///
/// Every operation takes the same lock; write volume is bounded by step
/// counts so contention is not a concern. Histogram observations older than
/// the retention window are purged whenever the same metric is observed.
pub struct MetricsCollector {
    retention: Duration,
    store: Mutex<Store>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_retention(Duration::from_secs(3600))
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention,
            store: Mutex::new(Store::default()),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Attach help text to a metric; the first description wins
    pub fn describe(&self, name: &str, help: &str) {
        self.store
            .lock()
            .help
            .entry(name.to_string())
            .or_insert_with(|| help.to_string());
    }

    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let mut store = self.store.lock();
        store.kinds.insert(name.to_string(), MetricKind::Counter);
        *store
            .counters
            .entry(name.to_string())
            .or_default()
            .entry(label_set(labels))
            .or_insert(0.0) += value;
    }

    pub fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let mut store = self.store.lock();
        store.kinds.insert(name.to_string(), MetricKind::Gauge);
        let series = store.gauges.entry(name.to_string()).or_default();
        series.values.insert(label_set(labels), value);
        series.last = value;
    }

    pub fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let now = Instant::now();
        let retention = self.retention;

        let mut store = self.store.lock();
        store.kinds.insert(name.to_string(), MetricKind::Histogram);
        let observations = store.histograms.entry(name.to_string()).or_default();
        observations.push(Observation {
            value,
            labels: label_set(labels),
            at: now,
        });
        observations.retain(|o| now.duration_since(o.at) <= retention);
    }

    /// Value of one series, or the sum over every series when `labels` is `None`
    pub fn get_counter(&self, name: &str, labels: Option<&[(&str, &str)]>) -> f64 {
        let store = self.store.lock();
        let Some(series) = store.counters.get(name) else {
            return 0.0;
        };

        match labels {
            None => series.values().sum(),
            Some(labels) => series.get(&label_set(labels)).copied().unwrap_or(0.0),
        }
    }

    /// Value of one series, or the most recently written value when `labels` is `None`
    pub fn get_gauge(&self, name: &str, labels: Option<&[(&str, &str)]>) -> f64 {
        let store = self.store.lock();
        let Some(series) = store.gauges.get(name) else {
            return 0.0;
        };

        match labels {
            None => series.last,
            Some(labels) => series.values.get(&label_set(labels)).copied().unwrap_or(0.0),
        }
    }

    /// Observations whose labels include every pair in `labels`
    pub fn histogram_values(&self, name: &str, labels: Option<&[(&str, &str)]>) -> Vec<f64> {
        let store = self.store.lock();
        let Some(observations) = store.histograms.get(name) else {
            return Vec::new();
        };

        observations
            .iter()
            .filter(|o| labels.map_or(true, |wanted| matches_labels(&o.labels, wanted)))
            .map(|o| o.value)
            .collect()
    }

    pub fn histogram_stats(&self, name: &str, labels: Option<&[(&str, &str)]>) -> HistogramStats {
        HistogramStats::from_values(&self.histogram_values(name, labels))
    }

    /// Every metric family, ordered by name
    pub fn snapshot(&self) -> BTreeMap<String, MetricFamily> {
        let store = self.store.lock();

        store
            .kinds
            .iter()
            .map(|(name, kind)| {
                let help = store.help.get(name).cloned().unwrap_or_default();
                let family = match kind {
                    MetricKind::Counter => MetricFamily {
                        kind: *kind,
                        help,
                        samples: samples(store.counters.get(name)),
                        stats: None,
                        observations: Vec::new(),
                    },
                    MetricKind::Gauge => MetricFamily {
                        kind: *kind,
                        help,
                        samples: samples(store.gauges.get(name).map(|g| &g.values)),
                        stats: None,
                        observations: Vec::new(),
                    },
                    MetricKind::Histogram => {
                        let observations: Vec<f64> = store
                            .histograms
                            .get(name)
                            .map(|obs| obs.iter().map(|o| o.value).collect())
                            .unwrap_or_default();
                        MetricFamily {
                            kind: *kind,
                            help,
                            samples: Vec::new(),
                            stats: Some(HistogramStats::from_values(&observations)),
                            observations,
                        }
                    }
                };
                (name.clone(), family)
            })
            .collect()
    }

    pub fn reset(&self) {
        *self.store.lock() = Store::default();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn samples(series: Option<&BTreeMap<LabelSet, f64>>) -> Vec<Sample> {
    series
        .map(|series| {
            series
                .iter()
                .map(|(labels, value)| Sample {
                    labels: labels.clone(),
                    value: *value,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn label_set(labels: &[(&str, &str)]) -> LabelSet {
    let mut set: LabelSet = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    set.sort();
    set.dedup_by(|a, b| a.0 == b.0);
    set
}

fn matches_labels(have: &LabelSet, wanted: &[(&str, &str)]) -> bool {
    wanted
        .iter()
        .all(|(k, v)| have.iter().any(|(hk, hv)| hk == k && hv == v))
}

/// `k1=v1,k2=v2` rendering of a label set
pub fn label_key(labels: &LabelSet) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
