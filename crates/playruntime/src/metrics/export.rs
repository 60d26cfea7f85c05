use super::collector::{LabelSet, MetricKind, MetricsCollector};
use std::fmt::Write;
use std::sync::Arc;

const BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Renders a collector in the Prometheus text exposition format
pub struct PrometheusExporter {
    metrics: Arc<MetricsCollector>,
}

impl PrometheusExporter {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics }
    }

    pub fn export(&self) -> String {
        let mut out = String::new();

        for (name, family) in self.metrics.snapshot() {
            if !family.help.is_empty() {
                let _ = writeln!(out, "# HELP {} {}", name, family.help);
            }
            let _ = writeln!(out, "# TYPE {} {}", name, family.kind.as_str());

            match family.kind {
                MetricKind::Counter | MetricKind::Gauge => {
                    for sample in &family.samples {
                        let _ = writeln!(out, "{}{} {:?}", name, prometheus_labels(&sample.labels), sample.value);
                    }
                }
                MetricKind::Histogram => {
                    let stats = family.stats.unwrap_or_default();
                    for le in BUCKETS {
                        let count = family.observations.iter().filter(|v| **v <= le).count();
                        let _ = writeln!(out, "{}_bucket{{le=\"{:?}\"}} {}", name, le, count);
                    }
                    let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, stats.count);
                    let _ = writeln!(out, "{}_sum {:?}", name, stats.sum);
                    let _ = writeln!(out, "{}_count {}", name, stats.count);
                }
            }
            out.push('\n');
        }

        out
    }
}

fn prometheus_labels(labels: &LabelSet) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| {
            let escaped = v
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            format!("{}=\"{}\"", k, escaped)
        })
        .collect();
    format!("{{{}}}", pairs.join(","))
}

/// Pushes a collector's current values to a StatsD daemon over UDP
pub struct StatsdExporter {
    metrics: Arc<MetricsCollector>,
    host: String,
    port: u16,
    prefix: String,
}

impl StatsdExporter {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            metrics,
            host: "localhost".to_string(),
            port: 8125,
            prefix: "playbooks".to_string(),
        }
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Wire lines for the current snapshot, one datagram each
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for (name, family) in self.metrics.snapshot() {
            let full_name = format!("{}.{}", self.prefix, name);
            match family.kind {
                MetricKind::Counter => {
                    for sample in &family.samples {
                        lines.push(format!("{}:{}|c", format_metric_name(&full_name, &sample.labels), sample.value));
                    }
                }
                MetricKind::Gauge => {
                    for sample in &family.samples {
                        lines.push(format!("{}:{}|g", format_metric_name(&full_name, &sample.labels), sample.value));
                    }
                }
                MetricKind::Histogram => {
                    let stats = family.stats.unwrap_or_default();
                    lines.push(format!("{}.count:{}|c", full_name, stats.count));
                    lines.push(format!("{}.avg:{:.6}|g", full_name, stats.avg));
                    lines.push(format!("{}.p95:{:.6}|g", full_name, stats.p95));
                    lines.push(format!("{}.p99:{:.6}|g", full_name, stats.p99));
                }
            }
        }

        lines
    }

    /// Send every line; failures are logged and never reach the caller.
    /// Returns the number of datagrams sent.
    pub async fn flush(&self) -> usize {
        let socket = match tokio::net::UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::debug!("StatsD flush skipped: {}", e);
                return 0;
            }
        };

        let mut sent = 0;
        for line in self.lines() {
            match socket.send_to(line.as_bytes(), (self.host.as_str(), self.port)).await {
                Ok(_) => sent += 1,
                Err(e) => {
                    tracing::debug!("StatsD send to {}:{} failed: {}", self.host, self.port, e);
                    break;
                }
            }
        }
        sent
    }
}

/// `prefix.name` + labels as `.key.value` segments
pub fn format_metric_name(name: &str, labels: &LabelSet) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let parts: Vec<&str> = labels.iter().flat_map(|(k, v)| [k.as_str(), v.as_str()]).collect();
    format!("{}.{}", name, parts.join("."))
}
