//! Execution metrics: an in-process collector plus Prometheus and StatsD
//! exporters. The engine records the families named below when a collector
//! is attached to it.

mod collector;
mod export;

pub use collector::{
    label_key, HistogramStats, LabelSet, MetricFamily, MetricKind, MetricsCollector, Sample,
};
pub use export::{format_metric_name, PrometheusExporter, StatsdExporter};

pub const PLAYBOOK_EXECUTIONS_TOTAL: &str = "playbook_executions_total";
pub const PLAYBOOK_DURATION_SECONDS: &str = "playbook_duration_seconds";
pub const SKILL_EXECUTIONS_TOTAL: &str = "skill_executions_total";
pub const SKILL_DURATION_SECONDS: &str = "skill_duration_seconds";
pub const DECISION_BRANCHES_TAKEN_TOTAL: &str = "decision_branches_taken_total";

/// Register help text for every family the engine records.
pub fn describe_engine_metrics(metrics: &MetricsCollector) {
    metrics.describe(PLAYBOOK_EXECUTIONS_TOTAL, "Total playbook executions");
    metrics.describe(PLAYBOOK_DURATION_SECONDS, "Playbook execution duration");
    metrics.describe(SKILL_EXECUTIONS_TOTAL, "Total skill executions");
    metrics.describe(SKILL_DURATION_SECONDS, "Skill execution duration");
    metrics.describe(DECISION_BRANCHES_TAKEN_TOTAL, "Total decision branches taken");
}
