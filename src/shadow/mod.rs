//! Shadow evaluation of the learned path.
//!
//! Both paths run for a sample of decisions; the results are logged as
//! [`ShadowComparisonRecord`]s. This module digests that log into
//! per-agent [`ShadowReport`]s, decides whether the learned path clears the
//! promotion gate, and exports the numbers as flat metrics.

pub mod aggregator;
pub mod metrics;

pub use aggregator::ShadowComparisonAggregator;
pub use metrics::{render_prometheus, MetricLabels, MetricType, ShadowMetric};

pub use crate::storage::ShadowComparisonRecord;

use serde::{Deserialize, Serialize};

/// The closed set of decision types that run in shadow mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    /// Categorizing bank transactions.
    TransactionCategorization,
    /// Generating tax forms.
    TaxFormGeneration,
    /// Extracting bank statements.
    BankStatementExtraction,
    /// Messaging-flow state transitions.
    MessagingFlow,
}

impl AgentType {
    /// Every agent type, in report order.
    pub const ALL: [AgentType; 4] = [
        AgentType::TransactionCategorization,
        AgentType::TaxFormGeneration,
        AgentType::BankStatementExtraction,
        AgentType::MessagingFlow,
    ];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::TransactionCategorization => "transaction-categorization",
            AgentType::TaxFormGeneration => "tax-form-generation",
            AgentType::BankStatementExtraction => "bank-statement-extraction",
            AgentType::MessagingFlow => "messaging-flow",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transaction-categorization" => Ok(AgentType::TransactionCategorization),
            "tax-form-generation" => Ok(AgentType::TaxFormGeneration),
            "bank-statement-extraction" => Ok(AgentType::BankStatementExtraction),
            "messaging-flow" => Ok(AgentType::MessagingFlow),
            _ => Err(format!("Unknown agent type: {}", s)),
        }
    }
}

/// Why the learned path is not yet eligible for promotion.
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionBlocker {
    /// Too few comparisons in the window.
    InsufficientSamples {
        /// Comparisons required
        required: u64,
        /// Comparisons observed
        actual: u64,
    },
    /// Observation window too short.
    PeriodTooShort {
        /// Days required
        required: u32,
        /// Days requested
        actual: u32,
    },
    /// Paths disagree too often.
    MatchRateTooLow {
        /// Minimum match rate (%)
        required: u8,
        /// Observed match rate (%)
        actual: u8,
    },
    /// Learned path is too slow relative to the heuristic.
    LatencyTooHigh {
        /// Mean SDK latency
        sdk_avg_ms: f64,
        /// Mean heuristic latency
        heuristic_avg_ms: f64,
        /// Allowed ratio
        max_ratio: f64,
    },
}

impl std::fmt::Display for PromotionBlocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromotionBlocker::InsufficientSamples { required, actual } => write!(
                f,
                "Insufficient comparisons: {} recorded, {} required",
                actual, required
            ),
            PromotionBlocker::PeriodTooShort { required, actual } => write!(
                f,
                "Period of {} days is shorter than the {}-day minimum",
                actual, required
            ),
            PromotionBlocker::MatchRateTooLow { required, actual } => write!(
                f,
                "Match rate {}% is below the {}% threshold",
                actual, required
            ),
            PromotionBlocker::LatencyTooHigh {
                sdk_avg_ms,
                heuristic_avg_ms,
                max_ratio,
            } => write!(
                f,
                "SDK latency {:.0}ms exceeds {}x heuristic latency ({:.0}ms)",
                sdk_avg_ms, max_ratio, heuristic_avg_ms
            ),
        }
    }
}

/// Agreement, latency, and promotion status for one agent type and tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowReport {
    /// Agent type reported on.
    pub agent_type: AgentType,
    /// Tenant reported on.
    pub tenant_id: String,
    /// Window length in days.
    pub period_days: u32,
    /// Comparisons in the window.
    pub total_decisions: u64,
    /// Percentage of comparisons where both paths agreed.
    pub match_rate: u8,
    /// Comparisons where both paths agreed.
    pub identical: u64,
    /// Disagreements where the SDK path was more confident.
    pub sdk_better: u64,
    /// Disagreements where the heuristic path was more confident.
    pub heuristic_better: u64,
    /// Mean SDK latency, rounded.
    pub sdk_avg_latency_ms: u64,
    /// Mean heuristic latency, rounded.
    pub heuristic_avg_latency_ms: u64,
    /// SDK minus heuristic mean latency.
    pub avg_latency_diff_ms: i64,
    /// Mean SDK confidence, rounded.
    pub sdk_avg_confidence: u8,
    /// Mean heuristic confidence, rounded.
    pub heuristic_avg_confidence: u8,
    /// Whether every promotion condition holds.
    pub meets_promotion_criteria: bool,
    /// Human-readable reasons promotion is blocked.
    pub promotion_blockers: Vec<String>,
}

/// Condensed per-agent view for the promotion dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// Agent type.
    pub agent_type: AgentType,
    /// Comparisons in the window.
    pub total_decisions: u64,
    /// Percentage agreement.
    pub match_rate: u8,
    /// Whether the promotion gate passes.
    pub meets_promotion_criteria: bool,
}

impl From<&ShadowReport> for DashboardSummary {
    fn from(report: &ShadowReport) -> Self {
        Self {
            agent_type: report.agent_type,
            total_decisions: report.total_decisions,
            match_rate: report.match_rate,
            meets_promotion_criteria: report.meets_promotion_criteria,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_type_round_trip_strings() {
        for agent in AgentType::ALL {
            let parsed: AgentType = agent.as_str().parse().unwrap();
            assert_eq!(parsed, agent);
        }
        assert!("payroll".parse::<AgentType>().is_err());
    }

    #[test]
    fn test_blocker_messages_name_their_condition() {
        let samples = PromotionBlocker::InsufficientSamples {
            required: 100,
            actual: 3,
        };
        assert!(samples.to_string().contains("comparisons"));

        let period = PromotionBlocker::PeriodTooShort {
            required: 7,
            actual: 2,
        };
        assert!(period.to_string().contains("Period"));

        let rate = PromotionBlocker::MatchRateTooLow {
            required: 90,
            actual: 67,
        };
        assert_eq!(rate.to_string(), "Match rate 67% is below the 90% threshold");

        let latency = PromotionBlocker::LatencyTooHigh {
            sdk_avg_ms: 300.0,
            heuristic_avg_ms: 100.0,
            max_ratio: 1.5,
        };
        assert_eq!(
            latency.to_string(),
            "SDK latency 300ms exceeds 1.5x heuristic latency (100ms)"
        );
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = ShadowReport {
            agent_type: AgentType::TaxFormGeneration,
            tenant_id: "t1".to_string(),
            period_days: 7,
            total_decisions: 0,
            match_rate: 0,
            identical: 0,
            sdk_better: 0,
            heuristic_better: 0,
            sdk_avg_latency_ms: 0,
            heuristic_avg_latency_ms: 0,
            avg_latency_diff_ms: 0,
            sdk_avg_confidence: 0,
            heuristic_avg_confidence: 0,
            meets_promotion_criteria: false,
            promotion_blockers: vec![],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["agentType"], "tax-form-generation");
        assert_eq!(value["meetsPromotionCriteria"], false);

        let summary = DashboardSummary::from(&report);
        assert_eq!(summary.agent_type, AgentType::TaxFormGeneration);
    }
}
