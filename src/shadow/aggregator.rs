//! Aggregation of shadow comparisons into promotion reports.
//!
//! Reports are recomputed from storage on every call and never cached.
//! A storage read failure is logged and treated as an empty window, so a
//! report is always produced.
//!
//! # Promotion gate
//!
//! The learned path may be promoted only when all of these hold:
//!
//! - at least `min_samples` comparisons in the window
//! - the window spans at least `min_period_days`
//! - the match rate is at least `min_match_rate`
//! - mean SDK latency is at most `max_latency_ratio` × mean heuristic latency
//!
//! Every failed condition contributes its own blocker.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::metrics::{self, ShadowMetric};
use super::{AgentType, DashboardSummary, PromotionBlocker, ShadowComparisonRecord, ShadowReport};
use crate::config::{MetricsConfig, PromotionPolicy};
use crate::storage::ShadowComparisonStore;

/// Digests shadow-comparison history into promotion reports.
pub struct ShadowComparisonAggregator {
    store: Arc<dyn ShadowComparisonStore>,
    policy: PromotionPolicy,
    metrics: MetricsConfig,
}

impl ShadowComparisonAggregator {
    /// Create an aggregator over the given store.
    pub fn new(store: Arc<dyn ShadowComparisonStore>, policy: PromotionPolicy) -> Self {
        Self {
            store,
            policy,
            metrics: MetricsConfig::default(),
        }
    }

    /// Override the metrics export configuration.
    pub fn with_metrics_config(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = metrics;
        self
    }

    /// The promotion policy in force.
    pub fn policy(&self) -> &PromotionPolicy {
        &self.policy
    }

    /// Report for one agent type over the last `period_days` days.
    pub async fn generate_report(
        &self,
        agent_type: AgentType,
        tenant_id: &str,
        period_days: u32,
    ) -> ShadowReport {
        let since = window_start(period_days);

        let records = match self
            .store
            .list_comparisons(tenant_id, agent_type.as_str(), since)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    tenant_id = %tenant_id,
                    agent_type = %agent_type,
                    error = %e,
                    "Failed to read shadow comparisons; reporting empty window"
                );
                Vec::new()
            }
        };

        let report = summarize(agent_type, tenant_id, period_days, &records, &self.policy);
        debug!(
            tenant_id = %tenant_id,
            agent_type = %agent_type,
            total = report.total_decisions,
            match_rate = report.match_rate,
            promotable = report.meets_promotion_criteria,
            "Shadow report generated"
        );
        report
    }

    /// One report per agent type.
    pub async fn generate_all_reports(
        &self,
        tenant_id: &str,
        period_days: u32,
    ) -> Vec<ShadowReport> {
        let mut reports = Vec::with_capacity(AgentType::ALL.len());
        for agent_type in AgentType::ALL {
            reports.push(self.generate_report(agent_type, tenant_id, period_days).await);
        }
        reports
    }

    /// All reports flattened into scrape-ready metrics.
    pub async fn get_metrics(&self, tenant_id: &str) -> Vec<ShadowMetric> {
        let reports = self
            .generate_all_reports(tenant_id, self.metrics.period_days)
            .await;
        metrics::flatten(&reports)
    }

    /// Condensed per-agent view for the dashboard.
    pub async fn get_dashboard_summary(
        &self,
        tenant_id: &str,
        period_days: u32,
    ) -> Vec<DashboardSummary> {
        self.generate_all_reports(tenant_id, period_days)
            .await
            .iter()
            .map(DashboardSummary::from)
            .collect()
    }
}

/// Compute a report from an already-loaded window of records.
pub fn summarize(
    agent_type: AgentType,
    tenant_id: &str,
    period_days: u32,
    records: &[ShadowComparisonRecord],
    policy: &PromotionPolicy,
) -> ShadowReport {
    let total = records.len() as u64;

    let mut identical = 0u64;
    let mut sdk_better = 0u64;
    let mut heuristic_better = 0u64;
    let mut sdk_latency_sum = 0u128;
    let mut heuristic_latency_sum = 0u128;
    let mut sdk_confidence_sum = 0u64;
    let mut heuristic_confidence_sum = 0u64;

    for record in records {
        if record.results_match {
            identical += 1;
        } else if record.sdk_confidence > record.heuristic_confidence {
            sdk_better += 1;
        } else if record.heuristic_confidence > record.sdk_confidence {
            heuristic_better += 1;
        }
        // Equal confidence on a mismatch counts for neither side.

        sdk_latency_sum += u128::from(record.sdk_duration_ms);
        heuristic_latency_sum += u128::from(record.heuristic_duration_ms);
        sdk_confidence_sum += u64::from(record.sdk_confidence);
        heuristic_confidence_sum += u64::from(record.heuristic_confidence);
    }

    let match_rate = percentage(identical, total);
    let sdk_avg = mean(sdk_latency_sum as f64, total);
    let heuristic_avg = mean(heuristic_latency_sum as f64, total);

    let sdk_avg_latency_ms = sdk_avg.round() as u64;
    let heuristic_avg_latency_ms = heuristic_avg.round() as u64;

    let blockers = promotion_blockers(
        policy,
        total,
        period_days,
        match_rate,
        sdk_avg,
        heuristic_avg,
    );

    ShadowReport {
        agent_type,
        tenant_id: tenant_id.to_string(),
        period_days,
        total_decisions: total,
        match_rate,
        identical,
        sdk_better,
        heuristic_better,
        sdk_avg_latency_ms,
        heuristic_avg_latency_ms,
        avg_latency_diff_ms: sdk_avg_latency_ms as i64 - heuristic_avg_latency_ms as i64,
        sdk_avg_confidence: mean(sdk_confidence_sum as f64, total).round() as u8,
        heuristic_avg_confidence: mean(heuristic_confidence_sum as f64, total).round() as u8,
        meets_promotion_criteria: blockers.is_empty(),
        promotion_blockers: blockers.iter().map(ToString::to_string).collect(),
    }
}

/// Evaluate each gate condition independently.
pub fn promotion_blockers(
    policy: &PromotionPolicy,
    total: u64,
    period_days: u32,
    match_rate: u8,
    sdk_avg_ms: f64,
    heuristic_avg_ms: f64,
) -> Vec<PromotionBlocker> {
    let mut blockers = Vec::new();

    if total < policy.min_samples {
        blockers.push(PromotionBlocker::InsufficientSamples {
            required: policy.min_samples,
            actual: total,
        });
    }

    if period_days < policy.min_period_days {
        blockers.push(PromotionBlocker::PeriodTooShort {
            required: policy.min_period_days,
            actual: period_days,
        });
    }

    if match_rate < policy.min_match_rate {
        blockers.push(PromotionBlocker::MatchRateTooLow {
            required: policy.min_match_rate,
            actual: match_rate,
        });
    }

    if sdk_avg_ms > heuristic_avg_ms * policy.max_latency_ratio {
        blockers.push(PromotionBlocker::LatencyTooHigh {
            sdk_avg_ms,
            heuristic_avg_ms,
            max_ratio: policy.max_latency_ratio,
        });
    }

    blockers
}

/// Start of a window ending now. Windows reaching past the representable
/// range start at the earliest representable instant.
fn window_start(period_days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(period_days))
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn percentage(part: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (100.0 * part as f64 / total as f64).round() as u8
}

fn mean(sum: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
