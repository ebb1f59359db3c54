//! Flat metric export for shadow reports.

use serde::{Deserialize, Serialize};

use super::ShadowReport;

/// Metric kinds understood by the scrape endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Monotonic count.
    Counter,
    /// Point-in-time value.
    Gauge,
    /// Distribution summary (reported as its mean).
    Histogram,
}

impl MetricType {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
        }
    }

    /// Type name in Prometheus text exposition.
    ///
    /// Each histogram here is a single mean value with no buckets, which the
    /// exposition format can only carry as `untyped`.
    fn exposition_type(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "untyped",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Labels attached to every shadow metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricLabels {
    /// Agent type.
    pub agent: String,
    /// Tenant identifier.
    pub tenant: String,
}

/// One metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowMetric {
    /// Metric name.
    pub name: String,
    /// Metric kind.
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Sample value.
    pub value: f64,
    /// Sample labels.
    pub labels: MetricLabels,
}

impl ShadowMetric {
    fn new(name: &str, metric_type: MetricType, value: f64, report: &ShadowReport) -> Self {
        Self {
            name: name.to_string(),
            metric_type,
            value,
            labels: MetricLabels {
                agent: report.agent_type.to_string(),
                tenant: report.tenant_id.clone(),
            },
        }
    }
}

/// Five samples per report: decision count, match rate, both latencies and
/// SDK confidence.
pub fn flatten(reports: &[ShadowReport]) -> Vec<ShadowMetric> {
    reports
        .iter()
        .flat_map(|report| {
            [
                ShadowMetric::new(
                    "shadow_decisions_total",
                    MetricType::Counter,
                    report.total_decisions as f64,
                    report,
                ),
                ShadowMetric::new(
                    "shadow_match_rate",
                    MetricType::Gauge,
                    f64::from(report.match_rate),
                    report,
                ),
                ShadowMetric::new(
                    "shadow_sdk_latency_ms",
                    MetricType::Histogram,
                    report.sdk_avg_latency_ms as f64,
                    report,
                ),
                ShadowMetric::new(
                    "shadow_heuristic_latency_ms",
                    MetricType::Histogram,
                    report.heuristic_avg_latency_ms as f64,
                    report,
                ),
                ShadowMetric::new(
                    "shadow_sdk_confidence",
                    MetricType::Gauge,
                    f64::from(report.sdk_avg_confidence),
                    report,
                ),
            ]
        })
        .collect()
}

/// Render metrics in Prometheus text format.
///
/// Samples are grouped by name in first-seen order, each group preceded by a
/// single `# TYPE` line.
pub fn render_prometheus(metrics: &[ShadowMetric]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for metric in metrics {
        if !names.contains(&metric.name.as_str()) {
            names.push(&metric.name);
        }
    }

    let mut out = String::new();
    for name in names {
        let mut samples = metrics.iter().filter(|m| m.name == name).peekable();
        if let Some(first) = samples.peek() {
            out.push_str(&format!(
                "# TYPE {} {}\n",
                name,
                first.metric_type.exposition_type()
            ));
        }
        for metric in samples {
            out.push_str(&format!(
                "{}{{agent=\"{}\",tenant=\"{}\"}} {}\n",
                name,
                escape_label(&metric.labels.agent),
                escape_label(&metric.labels.tenant),
                metric.value
            ));
        }
    }
    out
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::AgentType;
    use pretty_assertions::assert_eq;

    fn report(agent_type: AgentType, total: u64) -> ShadowReport {
        ShadowReport {
            agent_type,
            tenant_id: "t1".to_string(),
            period_days: 30,
            total_decisions: total,
            match_rate: 92,
            identical: total,
            sdk_better: 0,
            heuristic_better: 0,
            sdk_avg_latency_ms: 140,
            heuristic_avg_latency_ms: 20,
            avg_latency_diff_ms: 120,
            sdk_avg_confidence: 81,
            heuristic_avg_confidence: 74,
            meets_promotion_criteria: false,
            promotion_blockers: vec![],
        }
    }

    #[test]
    fn test_flatten_five_metrics_per_report() {
        let metrics = flatten(&[report(AgentType::MessagingFlow, 12)]);
        let names: Vec<_> = metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "shadow_decisions_total",
                "shadow_match_rate",
                "shadow_sdk_latency_ms",
                "shadow_heuristic_latency_ms",
                "shadow_sdk_confidence",
            ]
        );
        assert_eq!(metrics[0].value, 12.0);
        assert_eq!(metrics[0].metric_type, MetricType::Counter);
        assert_eq!(metrics[2].metric_type, MetricType::Histogram);
        assert_eq!(metrics[4].value, 81.0);
        assert_eq!(metrics[0].labels.agent, "messaging-flow");
    }

    #[test]
    fn test_metric_serializes_type_field() {
        let metrics = flatten(&[report(AgentType::TaxFormGeneration, 3)]);
        let value = serde_json::to_value(&metrics[1]).unwrap();
        assert_eq!(value["type"], "gauge");
        assert_eq!(value["labels"]["tenant"], "t1");
    }

    #[test]
    fn test_render_prometheus_groups_by_name() {
        let metrics = flatten(&[
            report(AgentType::TransactionCategorization, 5),
            report(AgentType::MessagingFlow, 7),
        ]);
        let text = render_prometheus(&metrics);

        assert_eq!(text.matches("# TYPE shadow_decisions_total counter").count(), 1);
        assert_eq!(text.matches("# TYPE shadow_sdk_latency_ms untyped").count(), 1);
        assert!(text.contains(
            "shadow_decisions_total{agent=\"transaction-categorization\",tenant=\"t1\"} 5\n"
        ));
        assert!(text.contains(
            "shadow_decisions_total{agent=\"messaging-flow\",tenant=\"t1\"} 7\n"
        ));

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "# TYPE shadow_decisions_total counter");
        assert!(lines[1].starts_with("shadow_decisions_total{"));
        assert!(lines[2].starts_with("shadow_decisions_total{"));
        assert_eq!(lines[3], "# TYPE shadow_match_rate gauge");
    }

    #[test]
    fn test_render_escapes_label_values() {
        let mut r = report(AgentType::MessagingFlow, 1);
        r.tenant_id = "acme \"north\"".to_string();
        let text = render_prometheus(&flatten(&[r]));
        assert!(text.contains("tenant=\"acme \\\"north\\\"\""));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_prometheus(&[]), "");
    }
}
