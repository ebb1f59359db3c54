//! CLI commands for inspecting shadow-mode promotion status.
//!
//! Every command reads shadow comparisons through the aggregator and prints
//! JSON, except `metrics --format prometheus` which prints the text
//! exposition format.

use clap::{Subcommand, ValueEnum};
use serde::Serialize;

use crate::shadow::{render_prometheus, AgentType, ShadowComparisonAggregator};

/// Operator subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Promotion report for one agent type
    Report {
        /// Agent type, e.g. transaction-categorization
        #[arg(long)]
        agent: String,

        /// Tenant identifier
        #[arg(long)]
        tenant: String,

        /// Observation window in days
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Promotion reports for every agent type
    Reports {
        /// Tenant identifier
        #[arg(long)]
        tenant: String,

        /// Observation window in days
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Condensed per-agent dashboard view
    Dashboard {
        /// Tenant identifier
        #[arg(long)]
        tenant: String,

        /// Observation window in days
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Flat metrics for a scrape endpoint
    Metrics {
        /// Tenant identifier
        #[arg(long)]
        tenant: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = MetricsFormat::Json)]
        format: MetricsFormat,
    },
}

/// Output format for the `metrics` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsFormat {
    /// JSON array of metric samples
    Json,
    /// Prometheus text exposition
    Prometheus,
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a CLI command.
pub async fn execute_command(
    command: Commands,
    aggregator: &ShadowComparisonAggregator,
) -> CliResult {
    match command {
        Commands::Report {
            agent,
            tenant,
            days,
        } => execute_report(aggregator, &agent, &tenant, days).await,
        Commands::Reports { tenant, days } => {
            json(&aggregator.generate_all_reports(&tenant, days).await)
        }
        Commands::Dashboard { tenant, days } => {
            json(&aggregator.get_dashboard_summary(&tenant, days).await)
        }
        Commands::Metrics { tenant, format } => {
            let metrics = aggregator.get_metrics(&tenant).await;
            match format {
                MetricsFormat::Json => json(&metrics),
                MetricsFormat::Prometheus => CliResult::success(render_prometheus(&metrics)),
            }
        }
    }
}

async fn execute_report(
    aggregator: &ShadowComparisonAggregator,
    agent: &str,
    tenant: &str,
    days: u32,
) -> CliResult {
    let agent_type: AgentType = match agent.parse() {
        Ok(agent_type) => agent_type,
        Err(e) => {
            let known: Vec<_> = AgentType::ALL.iter().map(AgentType::as_str).collect();
            return CliResult::error(format!("{} (expected one of: {})", e, known.join(", ")));
        }
    };
    json(&aggregator.generate_report(agent_type, tenant, days).await)
}

fn json<T: Serialize>(value: &T) -> CliResult {
    match serde_json::to_string_pretty(value) {
        Ok(text) => CliResult::success(text),
        Err(e) => CliResult::error(format!("Failed to serialize output: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromotionPolicy;
    use crate::storage::{MockShadowComparisonStore, ShadowComparisonRecord};
    use serde_json::json;
    use std::sync::Arc;

    fn aggregator() -> ShadowComparisonAggregator {
        let mut store = MockShadowComparisonStore::new();
        store.expect_list_comparisons().returning(|tenant, agent, _| {
            Ok(vec![ShadowComparisonRecord::new(tenant, agent, json!(1), json!(1))
                .with_confidences(90, 80)
                .with_durations(120, 40)])
        });
        ShadowComparisonAggregator::new(Arc::new(store), PromotionPolicy::default())
    }

    #[tokio::test]
    async fn test_report_prints_json() {
        let result = execute_command(
            Commands::Report {
                agent: "messaging-flow".to_string(),
                tenant: "t1".to_string(),
                days: 7,
            },
            &aggregator(),
        )
        .await;
        assert_eq!(result.exit_code, 0);
        let value: serde_json::Value = serde_json::from_str(&result.message).unwrap();
        assert_eq!(value["agentType"], "messaging-flow");
        assert_eq!(value["totalDecisions"], 1);
    }

    #[tokio::test]
    async fn test_report_rejects_unknown_agent() {
        let result = execute_command(
            Commands::Report {
                agent: "payroll".to_string(),
                tenant: "t1".to_string(),
                days: 7,
            },
            &aggregator(),
        )
        .await;
        assert_eq!(result.exit_code, 1);
        assert!(result.message.contains("transaction-categorization"));
    }

    #[tokio::test]
    async fn test_dashboard_lists_every_agent() {
        let result = execute_command(
            Commands::Dashboard {
                tenant: "t1".to_string(),
                days: 7,
            },
            &aggregator(),
        )
        .await;
        let value: serde_json::Value = serde_json::from_str(&result.message).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(AgentType::ALL.len()));
    }

    #[tokio::test]
    async fn test_metrics_prometheus_format() {
        let result = execute_command(
            Commands::Metrics {
                tenant: "t1".to_string(),
                format: MetricsFormat::Prometheus,
            },
            &aggregator(),
        )
        .await;
        assert_eq!(result.exit_code, 0);
        assert!(result.message.starts_with("# TYPE shadow_decisions_total counter"));
    }
}
