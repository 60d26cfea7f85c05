use playruntime::metrics::{self, MetricsCollector, PrometheusExporter, StatsdExporter};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

#[test]
fn test_histogram_percentiles() {
    let metrics = MetricsCollector::new();
    for v in 1..=100 {
        metrics.observe_histogram("latency", v as f64, &[]);
    }

    let stats = metrics.histogram_stats("latency", None);
    assert_eq!(stats.count, 100);
    assert_eq!(stats.sum, 5050.0);
    assert_eq!(stats.min, 1.0);
    assert_eq!(stats.max, 100.0);
    assert_eq!(stats.avg, 50.5);
    assert!((stats.p50 - 50.5).abs() < 1e-9);
    assert!((94.0..=96.0).contains(&stats.p95));
    assert!((98.0..=100.0).contains(&stats.p99));
}

#[test]
fn test_empty_histogram_stats_are_zero() {
    let stats = MetricsCollector::new().histogram_stats("nothing", None);
    assert_eq!(stats.count, 0);
    assert_eq!(stats.p99, 0.0);
}

#[test]
fn test_counter_totals_and_label_lookup() {
    let metrics = MetricsCollector::new();
    metrics.increment_counter("runs", &[("status", "success")], 1.0);
    metrics.increment_counter("runs", &[("status", "success")], 1.0);
    metrics.increment_counter("runs", &[("status", "failure")], 1.0);

    assert_eq!(metrics.get_counter("runs", None), 3.0);
    assert_eq!(metrics.get_counter("runs", Some(&[("status", "success")])), 2.0);
    assert_eq!(metrics.get_counter("runs", Some(&[("status", "timeout")])), 0.0);
    assert_eq!(metrics.get_counter("unknown", None), 0.0);
}

#[test]
fn test_gauge_is_last_write_wins() {
    let metrics = MetricsCollector::new();
    metrics.set_gauge("queue_depth", 4.0, &[("queue", "a")]);
    metrics.set_gauge("queue_depth", 9.0, &[("queue", "b")]);
    metrics.set_gauge("queue_depth", 2.0, &[("queue", "a")]);

    assert_eq!(metrics.get_gauge("queue_depth", Some(&[("queue", "a")])), 2.0);
    assert_eq!(metrics.get_gauge("queue_depth", Some(&[("queue", "b")])), 9.0);
    assert_eq!(metrics.get_gauge("queue_depth", None), 2.0);
}

#[test]
fn test_histogram_label_filter_matches_subsets() {
    let metrics = MetricsCollector::new();
    metrics.observe_histogram("d", 1.0, &[("skill", "a"), ("region", "eu")]);
    metrics.observe_histogram("d", 2.0, &[("skill", "a"), ("region", "us")]);
    metrics.observe_histogram("d", 3.0, &[("skill", "b")]);

    assert_eq!(metrics.histogram_values("d", Some(&[("skill", "a")])), vec![1.0, 2.0]);
    assert_eq!(metrics.histogram_values("d", Some(&[("region", "us")])), vec![2.0]);
    assert_eq!(metrics.histogram_values("d", None).len(), 3);
}

#[test]
fn test_old_observations_are_purged_on_next_observe() {
    let metrics = MetricsCollector::with_retention(Duration::from_millis(50));
    metrics.observe_histogram("d", 1.0, &[]);
    std::thread::sleep(Duration::from_millis(80));
    metrics.observe_histogram("d", 2.0, &[]);

    assert_eq!(metrics.histogram_values("d", None), vec![2.0]);
}

#[test]
fn test_reset_clears_everything() {
    let metrics = MetricsCollector::new();
    metrics.increment_counter("c", &[], 1.0);
    metrics.observe_histogram("h", 1.0, &[]);
    metrics.reset();

    assert!(metrics.snapshot().is_empty());
    assert_eq!(metrics.get_counter("c", None), 0.0);
}

#[test]
fn test_prometheus_exposition() {
    let metrics = Arc::new(MetricsCollector::new());
    metrics::describe_engine_metrics(&metrics);
    metrics.increment_counter(
        metrics::PLAYBOOK_EXECUTIONS_TOTAL,
        &[("status", "success"), ("playbook", "demo")],
        1.0,
    );
    metrics.observe_histogram(metrics::PLAYBOOK_DURATION_SECONDS, 0.2, &[("playbook", "demo")]);
    metrics.observe_histogram(metrics::PLAYBOOK_DURATION_SECONDS, 3.0, &[("playbook", "demo")]);

    let text = PrometheusExporter::new(metrics).export();

    assert!(text.contains("# HELP playbook_executions_total Total playbook executions\n"));
    assert!(text.contains("# TYPE playbook_executions_total counter\n"));
    assert!(text.contains("playbook_executions_total{playbook=\"demo\",status=\"success\"} 1.0\n"));
    assert!(text.contains("# TYPE playbook_duration_seconds histogram\n"));
    assert!(text.contains("playbook_duration_seconds_bucket{le=\"0.1\"} 0\n"));
    assert!(text.contains("playbook_duration_seconds_bucket{le=\"0.25\"} 1\n"));
    assert!(text.contains("playbook_duration_seconds_bucket{le=\"5.0\"} 2\n"));
    assert!(text.contains("playbook_duration_seconds_bucket{le=\"+Inf\"} 2\n"));
    assert!(text.contains("playbook_duration_seconds_sum 3.2\n"));
    assert!(text.contains("playbook_duration_seconds_count 2\n"));
}

#[tokio::test]
async fn test_statsd_lines_and_flush() {
    let metrics = Arc::new(MetricsCollector::new());
    metrics.increment_counter("runs", &[("playbook", "demo"), ("status", "ok")], 2.0);
    metrics.set_gauge("depth", 7.0, &[]);
    for v in [1.0, 2.0, 3.0] {
        metrics.observe_histogram("latency", v, &[]);
    }

    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let exporter = StatsdExporter::new(metrics)
        .with_address("127.0.0.1", port)
        .with_prefix("pb");
    let lines = exporter.lines();

    assert!(lines.contains(&"pb.runs.playbook.demo.status.ok:2|c".to_string()));
    assert!(lines.contains(&"pb.depth:7|g".to_string()));
    assert!(lines.contains(&"pb.latency.count:3|c".to_string()));
    assert!(lines.contains(&"pb.latency.avg:2.000000|g".to_string()));

    assert_eq!(exporter.flush().await, lines.len());
    let mut buf = [0u8; 512];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert!(lines.contains(&String::from_utf8_lossy(&buf[..n]).to_string()));
}
